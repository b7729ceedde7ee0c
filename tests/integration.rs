//! Integration tests for Henkan
//!
//! End-to-end tests that run a workflow through validation, ordering and generation.
mod common;
use common::*;
use henkan::error::ConversionError;
use henkan::prelude::*;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_filter_workflow_end_to_end() {
        let transpilation = Transpiler::builder(create_filter_workflow())
            .build()
            .transpile()
            .expect("Failed to transpile");

        assert_eq!(transpilation.graph.order(), vec![1, 2, 3, 4]);
        let handles = &transpilation.generation.handles;
        assert_eq!(handles.get(2, OutputPort::True).unwrap().as_str(), "df_2_true");
        assert_eq!(handles.get(2, OutputPort::False).unwrap().as_str(), "df_2_false");

        let source = transpilation.source();
        let filter_lines = source.lines().filter(|l| l.contains("df_1.filter(")).count();
        assert_eq!(filter_lines, 1);
        assert!(!source.contains(REVIEW_MARKER));
        assert!(transpilation.warnings().is_empty());
    }

    #[test]
    fn test_dangling_reference_aborts() {
        let mut workflow = create_filter_workflow();
        workflow.connections.push(Connection::new(42, 4));

        match Transpiler::builder(workflow).build().transpile() {
            Err(TranspileError::Structural(StructuralError::DanglingReference {
                missing_tool_id,
                ..
            })) => assert_eq!(missing_tool_id, 42),
            Err(other) => panic!("Expected DanglingReference, got {}", other),
            Ok(_) => panic!("Expected DanglingReference, got generated code"),
        }
    }

    #[test]
    fn test_cyclic_workflow_still_produces_a_notebook() {
        let transpilation = Transpiler::builder(create_cyclic_workflow())
            .build()
            .transpile()
            .expect("Cycles are reported, not fatal");

        let source = transpilation.source();
        for id in 1..=4 {
            assert!(source.contains(&format!("# Tool {}:", id)), "tool {} missing", id);
        }
        assert!(marker_lines(source) >= 1);
        assert_eq!(transpilation.warnings().len(), 1);
        assert!(transpilation.warnings()[0].contains("2 -> 3"));
    }

    #[test]
    fn test_config_cycle_policy_reaches_the_graph() {
        let config = GenerationConfig {
            cycle_policy: CyclePolicy::SkipCyclic,
            ..Default::default()
        };
        let transpilation = Transpiler::builder(create_cyclic_workflow())
            .with_config(config)
            .build()
            .transpile()
            .unwrap();

        assert_eq!(transpilation.graph.cycle_policy(), CyclePolicy::SkipCyclic);
        assert_eq!(transpilation.generation.tools_needing_review(), vec![2, 3]);
    }

    #[test]
    fn test_output_is_deterministic() {
        for workflow in [
            create_filter_workflow(),
            create_join_workflow(),
            create_cyclic_workflow(),
            create_chain(12),
        ] {
            let first = Transpiler::builder(workflow.clone()).build().transpile().unwrap();
            let second = Transpiler::builder(workflow).build().transpile().unwrap();
            assert_eq!(first.source(), second.source());
        }
    }

    #[test]
    fn test_tool_order_in_input_does_not_matter() {
        let workflow = create_join_workflow();
        let mut shuffled = workflow.clone();
        shuffled.tools.reverse();
        shuffled.connections.reverse();

        let a = Transpiler::builder(workflow).build().transpile().unwrap();
        let b = Transpiler::builder(shuffled).build().transpile().unwrap();
        assert_eq!(a.graph.order(), b.graph.order());
        assert_eq!(a.source(), b.source());
    }

    #[test]
    fn test_long_chain() {
        let transpilation = Transpiler::builder(create_chain(50))
            .build()
            .transpile()
            .unwrap();
        assert_eq!(transpilation.graph.order(), (1..=50).collect::<Vec<_>>());
        assert!(transpilation.source().contains("df_49.write.mode(\"overwrite\")"));
        assert_eq!(marker_lines(transpilation.source()), 0);
    }

    #[test]
    fn test_workflow_from_json() {
        let json = r##"{
            "name": "From JSON",
            "tools": [
                {"id": 1, "tool_type": "Input", "properties": {"table": "sales"}},
                {"id": 2, "tool_type": "Sample", "properties": {"n": 5}},
                {"id": 3, "tool_type": "Union"},
                {"id": 4, "tool_type": "Browse", "container": 9}
            ],
            "connections": [
                {"source": 1, "destination": 2},
                {"source": 2, "destination": 3, "destination_port": "#1"},
                {"source": 1, "destination": 3, "destination_port": "#2"},
                {"source": 3, "destination": 4}
            ],
            "containers": [{"id": 9, "name": "Preview"}],
            "constants": [{"name": "Env", "value": "dev"}]
        }"##;
        let workflow: WorkflowDefinition = serde_json::from_str(json).expect("Failed to parse");
        let transpilation = Transpiler::builder(workflow).build().transpile().unwrap();
        let source = transpilation.source();

        assert!(source.contains("df_2 = df_1.limit(5)"));
        assert!(source.contains("df_3 = df_2.unionByName(df_1, allowMissingColumns=True)"));
        assert!(source.contains("# MAGIC ## Container: Preview (9)"));
        assert!(source.contains("Env = \"dev\""));
    }

    struct Edge(u32, u32);

    struct EdgeList {
        edges: Vec<Edge>,
    }

    impl IntoWorkflow for EdgeList {
        fn into_workflow(self) -> std::result::Result<WorkflowDefinition, ConversionError> {
            if self.edges.is_empty() {
                return Err(ConversionError::ValidationError("no edges".to_string()));
            }
            let mut tools = vec![Tool::new(self.edges[0].0, ToolType::Input).with_property("table", "t")];
            for edge in &self.edges {
                tools.push(Tool::new(edge.1, ToolType::Sort).with_property("fields", "Id"));
            }
            let connections = self
                .edges
                .iter()
                .map(|e| Connection::new(e.0, e.1))
                .collect();
            Ok(WorkflowDefinition {
                name: "Edges".to_string(),
                tools,
                connections,
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_custom_records_via_into_workflow() {
        let records = EdgeList {
            edges: vec![Edge(1, 2), Edge(2, 3)],
        };
        let transpilation = Transpiler::from_records(records)
            .expect("Failed to convert records")
            .build()
            .transpile()
            .unwrap();
        assert_eq!(transpilation.graph.order(), vec![1, 2, 3]);
        assert!(transpilation.source().contains("df_3 = df_2.orderBy("));

        let empty = EdgeList { edges: vec![] };
        assert!(Transpiler::from_records(empty).is_err());
    }
}
