//! Common test utilities for building workflow definitions.
use henkan::prelude::*;

/// Input(1) -> Filter(2, `[Amount] > 100`) -> Output(3) on True, Browse(4) on False.
#[allow(dead_code)]
pub fn create_filter_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "Orders".to_string(),
        tools: vec![
            Tool::new(1, ToolType::Input).with_property("table", "orders"),
            Tool::new(2, ToolType::Filter).with_property("expression", "[Amount] > 100"),
            Tool::new(3, ToolType::Output).with_property("table", "big_orders"),
            Tool::new(4, ToolType::Browse),
        ],
        connections: vec![
            Connection::new(1, 2),
            Connection::new(2, 3).from_port(OutputPort::True),
            Connection::new(2, 4).from_port(OutputPort::False),
        ],
        ..Default::default()
    }
}

/// Two inputs joined, then summarized inside a container, then written out.
///
/// ```text
/// Input(1) --Left--> Join(3) --Join--> Summarize(4) -> Output(5)
/// Input(2) --Right-/
/// ```
/// Tools 3 and 4 live in container 100.
#[allow(dead_code)]
pub fn create_join_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "Customer totals".to_string(),
        tools: vec![
            Tool::new(1, ToolType::Input).with_property("table", "orders"),
            Tool::new(2, ToolType::Input).with_property("file", "customers.csv"),
            Tool::new(3, ToolType::Join)
                .with_property("left_keys", "CustomerId")
                .with_property("right_keys", "Id"),
            Tool::new(4, ToolType::Summarize)
                .with_property("group_by", "Region")
                .with_property("aggregations", "Sum(Amount) AS Total, Count(*)"),
            Tool::new(5, ToolType::Output).with_property("table", "reporting.totals"),
        ],
        connections: vec![
            Connection::new(1, 3).to_port(InputPort::Left),
            Connection::new(2, 3).to_port(InputPort::Right),
            Connection::new(3, 4).from_port(OutputPort::Join),
            Connection::new(4, 5),
        ],
        containers: vec![Container {
            id: 100,
            name: "Aggregation".to_string(),
            tools: vec![3, 4],
        }],
        ..Default::default()
    }
}

/// Input(1) -> Union(2) -> Formula(3) -> back into Union(2); Formula(3) -> Output(4).
#[allow(dead_code)]
pub fn create_cyclic_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "Loop".to_string(),
        tools: vec![
            Tool::new(1, ToolType::Input).with_property("table", "t"),
            Tool::new(2, ToolType::Union),
            Tool::new(3, ToolType::Formula).with_property("field.X", "[X] + 1"),
            Tool::new(4, ToolType::Output).with_property("table", "out"),
        ],
        connections: vec![
            Connection::new(1, 2).to_port(InputPort::Numbered(1)),
            Connection::new(2, 3),
            Connection::new(3, 2).to_port(InputPort::Numbered(2)),
            Connection::new(3, 4),
        ],
        ..Default::default()
    }
}

/// A linear chain `Input(1) -> Formula(2) -> ... -> Output(n)`.
#[allow(dead_code)]
pub fn create_chain(len: u32) -> WorkflowDefinition {
    let mut tools = vec![Tool::new(1, ToolType::Input).with_property("table", "t")];
    for id in 2..len {
        tools.push(Tool::new(id, ToolType::Formula).with_property("field.Step", &format!("{}", id)));
    }
    tools.push(Tool::new(len, ToolType::Output).with_property("table", "out"));
    WorkflowDefinition {
        name: "Chain".to_string(),
        tools,
        connections: (1..len).map(|id| Connection::new(id, id + 1)).collect(),
        ..Default::default()
    }
}

/// Counts lines carrying the review marker.
#[allow(dead_code)]
pub fn marker_lines(source: &str) -> usize {
    source
        .lines()
        .filter(|line| line.contains(REVIEW_MARKER))
        .count()
}
