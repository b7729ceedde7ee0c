//! Property tests over randomly wired acyclic workflows.
use henkan::codegen;
use henkan::graph;
use henkan::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Builds a DAG of Union tools from an upper-triangle edge mask.
///
/// Ids run backwards so that ascending-id tie-breaking never matches topological order by
/// accident.
fn dag(n: usize, mask: &[bool]) -> WorkflowDefinition {
    let id = |index: usize| ((n - index) * 10) as ToolId;
    let tools = (0..n).map(|i| Tool::new(id(i), ToolType::Union)).collect();

    let mut connections = Vec::new();
    let mut next_port = vec![1u32; n];
    let mut bit = mask.iter();
    for source in 0..n {
        for destination in source + 1..n {
            if bit.next().copied().unwrap_or(false) {
                connections.push(
                    Connection::new(id(source), id(destination))
                        .to_port(InputPort::Numbered(next_port[destination])),
                );
                next_port[destination] += 1;
            }
        }
    }
    WorkflowDefinition {
        name: "Random".to_string(),
        tools,
        connections,
        ..Default::default()
    }
}

/// Wires Union tools from a mask over every ordered pair of distinct tools, back edges included.
fn digraph(n: usize, mask: &[bool]) -> WorkflowDefinition {
    let id = |index: usize| ((index + 1) * 10) as ToolId;
    let tools = (0..n).map(|i| Tool::new(id(i), ToolType::Union)).collect();

    let mut connections = Vec::new();
    let mut next_port = vec![1u32; n];
    let pairs = (0..n).flat_map(|s| (0..n).filter(move |&d| d != s).map(move |d| (s, d)));
    for ((source, destination), &wired) in pairs.zip(mask) {
        if wired {
            connections.push(
                Connection::new(id(source), id(destination))
                    .to_port(InputPort::Numbered(next_port[destination])),
            );
            next_port[destination] += 1;
        }
    }
    WorkflowDefinition {
        name: "Tangled".to_string(),
        tools,
        connections,
        ..Default::default()
    }
}

/// Tools that can reach themselves through at least one other tool.
fn on_some_cycle(workflow: &WorkflowDefinition) -> BTreeSet<ToolId> {
    let ids: Vec<ToolId> = workflow.tools.iter().map(|t| t.id).collect();
    let at = |id: ToolId| ids.iter().position(|&x| x == id).unwrap();
    let n = ids.len();
    let mut reach = vec![vec![false; n]; n];
    for c in &workflow.connections {
        reach[at(c.source)][at(c.destination)] = true;
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if reach[i][k] && reach[k][j] {
                    reach[i][j] = true;
                }
            }
        }
    }
    (0..n)
        .filter(|&i| (0..n).any(|j| j != i && reach[i][j] && reach[j][i]))
        .map(|i| ids[i])
        .collect()
}

fn digraph_strategy() -> impl Strategy<Value = WorkflowDefinition> {
    (2usize..9).prop_flat_map(|n| {
        proptest::collection::vec(proptest::bool::weighted(0.3), n * (n - 1))
            .prop_map(move |mask| digraph(n, &mask))
    })
}

fn dag_strategy() -> impl Strategy<Value = WorkflowDefinition> {
    (2usize..14).prop_flat_map(|n| {
        proptest::collection::vec(any::<bool>(), n * (n - 1) / 2)
            .prop_map(move |mask| dag(n, &mask))
    })
}

proptest! {
    #[test]
    fn producers_always_precede_consumers(workflow in dag_strategy()) {
        let graph = graph::build(&workflow, CyclePolicy::BestEffort).unwrap();

        prop_assert_eq!(graph.order().len(), workflow.tools.len());
        prop_assert_eq!(graph.report().cycles().count(), 0);
        prop_assert!(graph.nodes().iter().all(|n| !n.unresolved));
        for c in &workflow.connections {
            prop_assert!(graph.position(c.source).unwrap() < graph.position(c.destination).unwrap());
        }
    }

    #[test]
    fn generation_is_deterministic_and_binds_every_port(workflow in dag_strategy()) {
        let graph = graph::build(&workflow, CyclePolicy::BestEffort).unwrap();
        let first = codegen::generate(&graph, &GenerationConfig::default()).unwrap();
        let second = Transpiler::builder(workflow.clone()).build().transpile().unwrap();

        prop_assert_eq!(&first.source, &second.generation.source);
        let declared: usize = graph.order().iter().map(|&id| graph.declared_ports(id).len()).sum();
        prop_assert_eq!(first.handles.len(), declared);
    }

    #[test]
    fn every_tool_on_a_cycle_is_reported(workflow in digraph_strategy()) {
        let expected = on_some_cycle(&workflow);
        for policy in [CyclePolicy::BestEffort, CyclePolicy::SkipCyclic] {
            let graph = graph::build(&workflow, policy).unwrap();

            let mut named = BTreeSet::new();
            for cycle in graph.report().cycles() {
                for id in cycle {
                    prop_assert!(named.insert(*id), "tool {} named by two cycles", id);
                }
            }
            prop_assert_eq!(&named, &expected);
            for node in graph.nodes() {
                prop_assert_eq!(node.cyclic, expected.contains(&node.id()));
            }
            prop_assert_eq!(graph.order().len(), workflow.tools.len());

            let generation = codegen::generate(&graph, &GenerationConfig::default());
            prop_assert!(generation.is_ok());
        }
    }
}
