//! Tests for notebook generation: emitters, stubs, banners and the configuration cell.
mod common;
use common::*;
use henkan::codegen::{self, EmitContext};
use henkan::error::EmitError;
use henkan::graph;
use henkan::prelude::*;

fn generate(workflow: &WorkflowDefinition) -> Generation {
    let graph = graph::build(workflow, CyclePolicy::BestEffort).expect("Failed to build graph");
    codegen::generate(&graph, &GenerationConfig::default()).expect("Failed to generate")
}

/// `Input(1) -> tool(2) -> Browse(3)`, with the Browse fed from `port`.
fn single_tool(tool: Tool, port: OutputPort) -> String {
    let workflow = WorkflowDefinition {
        tools: vec![
            Tool::new(1, ToolType::Input).with_property("table", "t"),
            tool,
            Tool::new(3, ToolType::Browse),
        ],
        connections: vec![
            Connection::new(1, 2),
            Connection::new(2, 3).from_port(port),
        ],
        ..Default::default()
    };
    generate(&workflow).source
}

fn assert_has_line(source: &str, line: &str) {
    assert!(
        source.lines().any(|l| l == line),
        "Missing line:\n{}\n--- in ---\n{}",
        line,
        source
    );
}

#[test]
fn test_filter_workflow_code() {
    let generation = generate(&create_filter_workflow());
    let source = &generation.source;

    assert_has_line(source, r#"df_1 = spark.read.table("main.default.orders")"#);
    assert_has_line(source, r#"cond_2 = (F.col("Amount") > F.lit(100))"#);
    assert_has_line(
        source,
        "df_2_true, df_2_false = df_1.filter(cond_2), df_1.filter(~F.coalesce(cond_2, F.lit(False)))",
    );
    assert_has_line(
        source,
        r#"df_2_true.write.mode("overwrite").saveAsTable("main.default.big_orders")"#,
    );
    assert_has_line(source, "display(df_2_false)");
    assert_eq!(marker_lines(source), 0);
    assert!(generation.review.is_empty());
}

#[test]
fn test_notebook_layout() {
    let source = generate(&create_filter_workflow()).source;

    assert!(source.starts_with(
        "# Databricks notebook source\n# MAGIC %md\n# MAGIC # Orders\n# MAGIC\n# MAGIC - Tools: 4\n"
    ));
    assert_has_line(&source, "from pyspark.sql import functions as F");
    assert_has_line(&source, "from pyspark.sql import Window");
    // Header, imports, configuration, four tools, summary.
    assert_eq!(source.matches("# COMMAND ----------").count(), 7);
    assert_has_line(&source, "# Tool 2: Filter");
    assert_has_line(&source, "# MAGIC ## Execution summary");
    assert_has_line(&source, "# MAGIC - Tools needing review: 0");
    assert_has_line(&source, "# MAGIC - Validation warnings: 0");
    assert!(source.ends_with('\n'));
}

#[test]
fn test_every_declared_port_gets_a_handle() {
    for workflow in [
        create_filter_workflow(),
        create_join_workflow(),
        create_cyclic_workflow(),
    ] {
        let graph = graph::build(&workflow, CyclePolicy::BestEffort).unwrap();
        let generation = codegen::generate(&graph, &GenerationConfig::default()).unwrap();
        for node in graph.nodes() {
            let bound: Vec<OutputPort> = generation
                .handles
                .ports_of(node.id())
                .map(|(port, _)| port)
                .collect();
            assert_eq!(bound, graph.declared_ports(node.id()), "tool {}", node.id());
        }
    }
}

#[test]
fn test_join_workflow_with_container_banner() {
    let source = generate(&create_join_workflow()).source;

    assert_has_line(
        &source,
        r#"df_2 = spark.read.format("csv").option("header", True).load("/Volumes/main/default/files/customers.csv")"#,
    );
    assert_has_line(&source, "# MAGIC ## Container: Aggregation (100)");
    assert_has_line(&source, "# MAGIC Tools: 2 | Inputs: 2 | Outputs: 1");
    assert_has_line(&source, r#"on_3 = [(df_1["CustomerId"] == df_2["Id"])]"#);
    assert_has_line(&source, r#"df_3_join = df_1.join(df_2, on=on_3, how="inner")"#);
    assert_has_line(&source, r#"df_3_left = df_1.join(df_2, on=on_3, how="left_anti")"#);
    assert_has_line(&source, r#"df_3_right = df_2.join(df_1, on=on_3, how="left_anti")"#);
    assert_has_line(&source, r#"df_4 = df_3_join.groupBy("Region").agg("#);
    assert_has_line(&source, r#"    F.sum(F.col("Amount")).alias("Total"),"#);
    assert_has_line(&source, r#"    F.count(F.lit(1)).alias("Count"),"#);
    assert_has_line(
        &source,
        r#"df_4.write.mode("overwrite").saveAsTable("main.reporting.totals")"#,
    );

    let banner = source.find("## Container: Aggregation").unwrap();
    assert!(source.find("# Tool 2: Input").unwrap() < banner);
    assert!(banner < source.find("# Tool 3: Join").unwrap());
}

#[test]
fn test_equal_join_keys_use_a_name_list() {
    let workflow = WorkflowDefinition {
        tools: vec![
            Tool::new(1, ToolType::Input).with_property("table", "a"),
            Tool::new(2, ToolType::Input).with_property("table", "b"),
            Tool::new(3, ToolType::InDbJoin)
                .with_property("left_keys", "Id")
                .with_property("right_keys", "Id"),
            Tool::new(4, ToolType::Browse),
        ],
        connections: vec![
            Connection::new(1, 3).to_port(InputPort::Left),
            Connection::new(2, 3).to_port(InputPort::Right),
            Connection::new(3, 4),
        ],
        ..Default::default()
    };
    let source = generate(&workflow).source;
    assert_has_line(&source, r#"on_3 = ["Id"]"#);
    assert_has_line(&source, r#"df_3 = df_1.join(df_2, on=on_3, how="inner")"#);

    // With the right side missing the emitter fails and a stub takes its place.
    let mut workflow = workflow;
    workflow.connections.remove(1);
    let source = generate(&workflow).source;
    assert_has_line(
        &source,
        "# MANUAL-REVIEW: Tool 3 (InDbJoin) was not converted: required input 'Right' is not connected",
    );
    assert_has_line(&source, "df_3 = df_1");
}

#[test]
fn test_config_cell_and_constants() {
    let mut workflow = create_join_workflow();
    workflow.constants = vec![
        Constant {
            name: "2nd pass".to_string(),
            value: "yes".to_string(),
            scope: Some(100),
        },
        Constant {
            name: "Run Date".to_string(),
            value: "2024-01-01".to_string(),
            scope: None,
        },
    ];
    let config = GenerationConfig {
        input: TableLocation {
            catalog: "prod".to_string(),
            schema: "raw".to_string(),
            volume: "landing".to_string(),
        },
        preamble: vec!["spark.conf.set(\"spark.sql.shuffle.partitions\", 64)".to_string()],
        ..Default::default()
    };
    let graph = graph::build(&workflow, CyclePolicy::BestEffort).unwrap();
    let source = codegen::generate(&graph, &config).unwrap().source;

    assert_has_line(&source, r#"INPUT_CATALOG = "prod""#);
    assert_has_line(&source, r#"INPUT_VOLUME = "landing""#);
    assert_has_line(&source, r#"OUTPUT_CATALOG = "main""#);
    assert_has_line(&source, r#"spark.conf.set("spark.sql.shuffle.partitions", 64)"#);
    assert_has_line(&source, "# Workflow constants");
    assert_has_line(&source, r#"Run_Date = "2024-01-01""#);
    assert_has_line(&source, "# Constants for container Aggregation (100)");
    assert_has_line(&source, r#"_2nd_pass = "yes""#);
    assert!(source.find("Run_Date").unwrap() < source.find("_2nd_pass").unwrap());

    // Input tools resolve against the input location, outputs against the output one.
    assert_has_line(&source, r#"df_1 = spark.read.table("prod.raw.orders")"#);
    assert!(source.contains("/Volumes/prod/raw/landing/customers.csv"));
    assert!(source.contains(r#"saveAsTable("main.reporting.totals")"#));
}

#[test]
fn test_names_stay_inside_their_lines() {
    let mut workflow = create_join_workflow();
    workflow.name = "Quarterly\nClose".to_string();
    workflow.containers[0].name = "Monthly\n  Totals".to_string();
    workflow.constants = ["class", "F", "if"]
        .iter()
        .map(|name| Constant {
            name: name.to_string(),
            value: "x".to_string(),
            scope: Some(100),
        })
        .collect();
    let graph = graph::build(&workflow, CyclePolicy::BestEffort).unwrap();
    let source = codegen::generate(&graph, &GenerationConfig::default()).unwrap().source;

    assert_has_line(&source, "# MAGIC # Quarterly Close");
    assert_has_line(&source, "# MAGIC ## Container: Monthly Totals (100)");
    assert_has_line(&source, "# Constants for container Monthly Totals (100)");
    assert_has_line(&source, r#"class_ = "x""#);
    assert_has_line(&source, r#"F_ = "x""#);
    assert_has_line(&source, r#"if_ = "x""#);
    assert!(source.lines().all(|l| l != "Close" && l != "  Totals (100)"));
}

#[test]
fn test_dataframe_prefix_and_annotations() {
    let mut workflow = create_filter_workflow();
    workflow.tools[1].annotation = Some("Keep big orders\n\n  only  ".to_string());
    let config = GenerationConfig {
        dataframe_prefix: "sdf".to_string(),
        ..Default::default()
    };
    let graph = graph::build(&workflow, CyclePolicy::BestEffort).unwrap();
    let generation = codegen::generate(&graph, &config).unwrap();

    assert_has_line(&generation.source, "# Keep big orders");
    assert_has_line(&generation.source, "# only");
    assert_has_line(&generation.source, "display(sdf_2_false)");
    assert_eq!(generation.handles.prefix(), "sdf");
}

#[test]
fn test_macro_and_unsupported_tools_become_pass_through_stubs() {
    let workflow = WorkflowDefinition {
        tools: vec![
            Tool::new(1, ToolType::Input).with_property("table", "a"),
            Tool::new(2, ToolType::Macro).with_property("plugin", "Cleanup.yxmc"),
            Tool::new(3, ToolType::Browse),
            Tool::new(4, ToolType::Unsupported).with_property("plugin", "Spatial.Buffer"),
            Tool::new(5, ToolType::Output).with_property("table", "out"),
        ],
        connections: vec![
            Connection::new(1, 2),
            Connection::new(2, 3).from_port(OutputPort::Left),
            Connection::new(1, 4),
            Connection::new(4, 5),
        ],
        ..Default::default()
    };
    let generation = generate(&workflow);
    let source = &generation.source;

    assert_has_line(
        source,
        "# MANUAL-REVIEW: Tool 2 (Macro) was not converted: macro 'Cleanup.yxmc' must be converted manually",
    );
    assert_has_line(source, "df_2 = df_1");
    assert_has_line(source, "df_2_left = df_1");
    assert_has_line(source, "display(df_2_left)");
    assert_has_line(
        source,
        "# MANUAL-REVIEW: Tool 4 (Unsupported) was not converted: plugin 'Spatial.Buffer' has no dataframe equivalent",
    );
    assert_has_line(source, "df_4 = df_1");
    assert_has_line(source, r#"df_4.write.mode("overwrite").saveAsTable("main.default.out")"#);

    assert_eq!(generation.tools_needing_review(), vec![2, 4]);
    assert_eq!(marker_lines(source), 2);
    assert_has_line(source, "# MAGIC - Tools needing review: 2");
    assert_has_line(source, "# MAGIC   - Tool 2 (Macro): 1 marker(s)");
}

#[test]
fn test_malformed_config_becomes_a_stub() {
    let mut workflow = create_filter_workflow();
    workflow.tools[1] = Tool::new(2, ToolType::Filter);
    let generation = generate(&workflow);
    let source = &generation.source;

    assert_has_line(
        source,
        "# MANUAL-REVIEW: Tool 2 (Filter) was not converted: invalid configuration: missing required property 'expression'",
    );
    assert_has_line(source, "df_2_true = df_1");
    assert_has_line(source, "df_2_false = df_1");
    assert_has_line(source, "display(df_2_false)");
    assert_eq!(generation.report.len(), 1);
    assert_has_line(source, "# MAGIC - Validation warnings: 1");
}

#[test]
fn test_untranslatable_formula_degrades_to_review() {
    let source = single_tool(
        Tool::new(2, ToolType::Formula).with_property("field.Y", "[A] +"),
        OutputPort::Default,
    );
    assert_eq!(marker_lines(&source), 1);
    assert!(source.contains("# MANUAL-REVIEW: could not translate `[A] +`: Syntax error"));
    assert_has_line(&source, r#"df_2 = df_1.withColumn("Y", F.expr("[A] +"))"#);
    assert_has_line(&source, "display(df_2)");
}

#[test]
fn test_unknown_function_is_flagged_in_place() {
    let source = single_tool(
        Tool::new(2, ToolType::Filter).with_property("expression", "Spatial_Area([Shape]) > 10"),
        OutputPort::True,
    );
    assert_has_line(
        &source,
        "# MANUAL-REVIEW: Function 'Spatial_Area' with 1 argument(s) has no dataframe equivalent",
    );
    assert_has_line(
        &source,
        r#"cond_2 = (F.expr("Spatial_Area([Shape])") > F.lit(10))"#,
    );
}

#[test]
fn test_row_shaping_emitters() {
    let source = single_tool(
        Tool::new(2, ToolType::Sort).with_property("fields", "Amount DESC, Name"),
        OutputPort::Default,
    );
    assert_has_line(
        &source,
        r#"df_2 = df_1.orderBy(F.col("Amount").desc_nulls_last(), F.col("Name").asc_nulls_first())"#,
    );

    let source = single_tool(
        Tool::new(2, ToolType::Sample)
            .with_property("n", "10")
            .with_property("mode", "random")
            .with_property("seed", "7"),
        OutputPort::Default,
    );
    assert_has_line(&source, "df_2 = df_1.orderBy(F.rand(7)).limit(10)");

    let source = single_tool(
        Tool::new(2, ToolType::Sample)
            .with_property("n", "25")
            .with_property("mode", "percent"),
        OutputPort::Default,
    );
    assert_has_line(&source, "df_2 = df_1.sample(fraction=0.25)");

    let source = single_tool(
        Tool::new(2, ToolType::Unique).with_property("fields", "Id"),
        OutputPort::Duplicate,
    );
    assert_has_line(
        &source,
        r#"_window_2 = Window.partitionBy("Id").orderBy(F.monotonically_increasing_id())"#,
    );
    assert_has_line(
        &source,
        r#"df_2_unique = _ranked_2.filter(F.col("_row_2") == 1).drop("_row_2")"#,
    );
    assert_has_line(&source, "display(df_2_duplicate)");
}

#[test]
fn test_column_shaping_emitters() {
    let source = single_tool(
        Tool::new(2, ToolType::FindReplace)
            .with_property("field", "Name")
            .with_property("find", "a.b")
            .with_property("replace", "$1"),
        OutputPort::Default,
    );
    assert_has_line(
        &source,
        r#"df_2 = df_1.withColumn("Name", F.regexp_replace(F.col("Name"), "a\\.b", "\\$1"))"#,
    );

    let source = single_tool(
        Tool::new(2, ToolType::TextToColumns)
            .with_property("field", "Full")
            .with_property("delimiter", ",")
            .with_property("columns", "2"),
        OutputPort::Default,
    );
    assert_has_line(&source, r#"_parts_2 = F.split(F.col("Full"), ",")"#);
    assert!(source.contains(
        "df_2 = (\n    df_1\n    .withColumn(\"Full1\", _parts_2.getItem(0))\n    .withColumn(\"Full2\", _parts_2.getItem(1))\n)\n"
    ));

    let source = single_tool(
        Tool::new(2, ToolType::RegEx)
            .with_property("field", "Code")
            .with_property("pattern", r"(\d+)-(\d+)"),
        OutputPort::Default,
    );
    assert_has_line(
        &source,
        r#"    .withColumn("Code_parsed2", F.regexp_extract(F.col("Code"), "(\\d+)-(\\d+)", 2))"#,
    );

    let source = single_tool(
        Tool::new(2, ToolType::CrossTab)
            .with_property("group_by", "Region")
            .with_property("header", "Year")
            .with_property("value", "Sales"),
        OutputPort::Default,
    );
    assert_has_line(
        &source,
        r#"df_2 = df_1.groupBy("Region").pivot("Year").agg(F.sum(F.col("Sales")))"#,
    );
}

#[test]
fn test_source_emitters() {
    let workflow = WorkflowDefinition {
        tools: vec![
            Tool::new(1, ToolType::TextInput)
                .with_property("fields", "Code")
                .with_property("data", "A;B"),
            Tool::new(2, ToolType::Browse),
            Tool::new(3, ToolType::InDbSelect).with_property("query", "SELECT * FROM t"),
            Tool::new(4, ToolType::InDbFilter).with_property("expression", "x > 1"),
            Tool::new(5, ToolType::InDbStreamOut),
            Tool::new(6, ToolType::Browse),
            Tool::new(7, ToolType::Input).with_property("file", "data/sheet.xlsx"),
            Tool::new(8, ToolType::Browse),
        ],
        connections: vec![
            Connection::new(1, 2),
            Connection::new(3, 4),
            Connection::new(4, 5),
            Connection::new(5, 6),
            Connection::new(7, 8),
        ],
        ..Default::default()
    };
    let generation = generate(&workflow);
    let source = &generation.source;

    assert_has_line(source, "df_1 = spark.createDataFrame(");
    assert_has_line(source, r#"        ("A",),"#);
    assert_has_line(source, r#"    ["Code"],"#);
    assert_has_line(source, r#"df_3 = spark.sql("SELECT * FROM t")"#);
    assert_has_line(source, r#"df_4 = df_3.filter(F.expr("x > 1"))"#);
    assert_has_line(source, "df_5 = df_4.cache()");
    assert_has_line(
        source,
        "# MANUAL-REVIEW: format 'xlsx' has no built-in Spark reader",
    );
    assert_has_line(
        source,
        r#"df_7 = spark.read.format("xlsx").load("/Volumes/main/default/files/data/sheet.xlsx")"#,
    );
    assert_eq!(generation.tools_needing_review(), vec![7]);
}

struct CountingBrowse;

impl ToolEmitter for CountingBrowse {
    fn tool_type(&self) -> ToolType {
        ToolType::Browse
    }

    fn emit(&self, ctx: &mut EmitContext<'_>) -> std::result::Result<(), EmitError> {
        let source = ctx.input(InputPort::Default)?;
        ctx.line(format!("print({}.count())", source));
        Ok(())
    }
}

struct BrokenFilter;

impl ToolEmitter for BrokenFilter {
    fn tool_type(&self) -> ToolType {
        ToolType::Filter
    }

    fn emit(&self, ctx: &mut EmitContext<'_>) -> std::result::Result<(), EmitError> {
        ctx.line("half_written = 1");
        Err(EmitError::Unsupported("expression engine offline".to_string()))
    }
}

#[test]
fn test_custom_emitter_replaces_default() {
    let graph = graph::build(&create_filter_workflow(), CyclePolicy::BestEffort).unwrap();
    let generator = Generator::builder()
        .with_custom_emitter(Box::new(CountingBrowse))
        .build();
    let source = generator
        .generate(&graph, &GenerationConfig::default())
        .unwrap()
        .source;

    assert_has_line(&source, "print(df_2_false.count())");
    assert!(!source.contains("display("));
}

#[test]
fn test_failing_emitter_output_is_discarded() {
    let graph = graph::build(&create_filter_workflow(), CyclePolicy::BestEffort).unwrap();
    let generator = Generator::builder()
        .with_custom_emitter(Box::new(BrokenFilter))
        .build();
    let generation = generator
        .generate(&graph, &GenerationConfig::default())
        .unwrap();
    let source = &generation.source;

    assert!(!source.contains("half_written"));
    assert_has_line(
        source,
        "# MANUAL-REVIEW: Tool 2 (Filter) was not converted: expression engine offline",
    );
    assert_has_line(source, "df_2_true = df_1");
    assert_has_line(source, "display(df_2_false)");
    assert_eq!(generation.tools_needing_review(), vec![2]);
}

#[test]
fn test_best_effort_cycle_uses_forward_reference() {
    let generation = generate(&create_cyclic_workflow());
    let source = &generation.source;

    assert_has_line(
        source,
        "# MANUAL-REVIEW: df_3 is produced later by tool 3 (dependency cycle)",
    );
    assert_has_line(source, "df_2 = df_1.unionByName(df_3, allowMissingColumns=True)");
    assert_has_line(source, r#"df_3 = df_2.withColumn("X", (F.col("X") + F.lit(1)))"#);
    assert_has_line(source, r#"df_3.write.mode("overwrite").saveAsTable("main.default.out")"#);
    assert_eq!(marker_lines(source), 1);
    assert_eq!(generation.report.cycles().count(), 1);
    assert!(source.contains("# MAGIC   - Cycle detected through tools [2 -> 3]"));
}

#[test]
fn test_skip_cyclic_policy_stubs_cycle_members() {
    let graph = graph::build(&create_cyclic_workflow(), CyclePolicy::SkipCyclic).unwrap();
    let generation = codegen::generate(&graph, &GenerationConfig::default()).unwrap();
    let source = &generation.source;

    assert_has_line(
        source,
        "# MANUAL-REVIEW: Tool 2 (Union) was not converted: tool lies on a dependency cycle",
    );
    assert_has_line(source, "df_2 = df_1");
    assert_has_line(
        source,
        "# MANUAL-REVIEW: Tool 3 (Formula) was not converted: tool lies on a dependency cycle",
    );
    assert_has_line(source, "df_3 = df_2");
    assert!(!source.contains("withColumn"));
    assert_eq!(generation.tools_needing_review(), vec![2, 3]);
}
