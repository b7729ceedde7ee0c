use clap::{Parser, ValueEnum};
use henkan::error::ConversionError;
use henkan::prelude::*;
use henkan::workflow::Properties;
use serde::Deserialize;
use std::fs;
use std::time::Instant;

// --- JSON Deserialization Structs (Input Format Specific) ---
// These match the record dump produced by the workflow markup parser.

#[derive(Deserialize)]
struct RawWorkflow {
    #[serde(default)]
    name: String,
    nodes: Vec<RawNode>,
    #[serde(default)]
    connections: Vec<RawConnection>,
    #[serde(default)]
    containers: Vec<RawContainer>,
    #[serde(default)]
    constants: Vec<RawConstant>,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(alias = "ToolID")]
    tool_id: u32,
    #[serde(alias = "Plugin")]
    plugin: String,
    #[serde(default, alias = "Container")]
    container: Option<u32>,
    #[serde(default, alias = "Configuration")]
    properties: Properties,
    #[serde(default, alias = "Annotation")]
    annotation: Option<String>,
}

#[derive(Deserialize)]
struct RawEndpoint {
    #[serde(alias = "ToolID")]
    tool_id: u32,
    #[serde(default, alias = "Connection")]
    connection: String,
}

#[derive(Deserialize)]
struct RawConnection {
    #[serde(alias = "Origin")]
    origin: RawEndpoint,
    #[serde(alias = "Destination")]
    destination: RawEndpoint,
}

#[derive(Deserialize)]
struct RawContainer {
    #[serde(alias = "ToolID")]
    tool_id: u32,
    #[serde(default, alias = "Caption")]
    caption: String,
    #[serde(default, alias = "ChildNodes")]
    children: Vec<u32>,
}

#[derive(Deserialize)]
struct RawConstant {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "Value")]
    value: String,
    #[serde(default, alias = "Container")]
    container: Option<u32>,
}

/// CLI-side mirror of the library's cycle policy for clap.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CyclePolicyCli {
    BestEffort,
    SkipCyclic,
}

// --- Converter Implementation ---

impl IntoWorkflow for RawWorkflow {
    fn into_workflow(self) -> std::result::Result<WorkflowDefinition, ConversionError> {
        let tools = self
            .nodes
            .into_iter()
            .map(|node| {
                let tool_type = ToolType::from_plugin_name(&node.plugin);
                let mut properties = node.properties;
                // Keep the plugin name so the stub can say what was not converted.
                if tool_type == ToolType::Unsupported && properties.get("plugin").is_none() {
                    properties.insert("plugin", &node.plugin);
                }
                Tool {
                    id: node.tool_id,
                    tool_type,
                    container: node.container,
                    properties,
                    annotation: node.annotation,
                }
            })
            .collect();

        let connections = self
            .connections
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let source_port = raw.origin.connection.parse::<OutputPort>().map_err(|label| {
                    ConversionError::ValidationError(format!(
                        "connection #{}: unknown output port '{}'",
                        i, label
                    ))
                })?;
                let destination_port = raw.destination.connection.parse::<InputPort>().map_err(|label| {
                    ConversionError::ValidationError(format!(
                        "connection #{}: unknown input port '{}'",
                        i, label
                    ))
                })?;
                Ok(Connection {
                    source: raw.origin.tool_id,
                    source_port,
                    destination: raw.destination.tool_id,
                    destination_port,
                })
            })
            .collect::<std::result::Result<Vec<_>, ConversionError>>()?;

        let containers = self
            .containers
            .into_iter()
            .map(|raw| Container {
                id: raw.tool_id,
                name: raw.caption,
                tools: raw.children,
            })
            .collect();

        let constants = self
            .constants
            .into_iter()
            .map(|raw| Constant {
                name: raw.name,
                value: raw.value,
                scope: raw.container,
            })
            .collect();

        Ok(WorkflowDefinition {
            name: self.name,
            tools,
            connections,
            containers,
            constants,
        })
    }
}

/// Transpiles a workflow record dump into a PySpark notebook
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the workflow records JSON file
    workflow_path: String,

    /// Optional generation config JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Where to write the notebook source (stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,

    /// Overrides the cycle policy from the config file
    #[arg(long, value_enum)]
    cycle_policy: Option<CyclePolicyCli>,

    /// Overrides the dataframe variable prefix
    #[arg(long)]
    prefix: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. Loading ---
    let workflow_json = fs::read_to_string(&cli.workflow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read workflow file '{}': {}",
            cli.workflow_path, e
        ))
    });
    let mut config: GenerationConfig = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to read config file '{}': {}", path, e))
            });
            serde_json::from_str(&raw)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse config JSON: {}", e)))
        }
        None => GenerationConfig::default(),
    };
    if let Some(policy) = cli.cycle_policy {
        config.cycle_policy = match policy {
            CyclePolicyCli::BestEffort => CyclePolicy::BestEffort,
            CyclePolicyCli::SkipCyclic => CyclePolicy::SkipCyclic,
        };
    }
    if let Some(prefix) = cli.prefix {
        config.dataframe_prefix = prefix;
    }

    // --- 2. Parsing and Conversion ---
    let raw: RawWorkflow = serde_json::from_str(&workflow_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse workflow JSON: {}", e)));
    let workflow = raw
        .into_workflow()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to convert workflow records: {}", e)));

    // --- 3. Transpilation ---
    let transpile_start = Instant::now();
    let transpilation = Transpiler::builder(workflow)
        .with_config(config)
        .build()
        .transpile()
        .unwrap_or_else(|e| exit_with_error(&format!("Transpilation failed: {}", e)));
    let transpile_duration = transpile_start.elapsed();

    // --- 4. Output ---
    match &cli.output {
        Some(path) => fs::write(path, transpilation.source()).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to write notebook '{}': {}", path, e))
        }),
        None => print!("{}", transpilation.source()),
    }

    // --- 5. Summary (stderr, so stdout stays a clean notebook) ---
    let generation = &transpilation.generation;
    eprintln!("\n--- Transpilation Summary ---");
    eprintln!("Tools:               {}", transpilation.graph.nodes().len());
    eprintln!("Sections:            {}", transpilation.graph.sections().len());
    eprintln!("Handles bound:       {}", generation.handles.len());
    eprintln!(
        "Tools needing review: {:?}",
        generation.tools_needing_review()
    );
    let warnings = transpilation.warnings();
    eprintln!("Validation warnings: {}", warnings.len());
    for warning in &warnings {
        eprintln!("  - {}", warning);
    }
    eprintln!("Transpilation:       {:?}", transpile_duration);
    eprintln!("Total Execution:     {:?}", total_start.elapsed());
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
