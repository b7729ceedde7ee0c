//! Code generation: ordered graph in, notebook source out.

mod config;
mod context;
pub mod emitters;
pub mod formatting;
mod handles;

pub use config::{GenerationConfig, TableLocation};
pub use context::EmitContext;
pub use emitters::ToolEmitter;
pub use formatting::{Block, Notebook, REVIEW_MARKER};
pub use handles::{DataframeHandle, HandleMap};

use crate::error::{CodegenError, EmitError};
use crate::expr::python_str;
use crate::graph::{CyclePolicy, OrderedGraph, ToolNode, ValidationReport};
use crate::workflow::{ContainerId, InputPort, ToolConfig, ToolId, ToolType};
use ahash::AHashMap;
use emitters::register_default_emitters;
use formatting::{review_comment, single_line};
use std::collections::BTreeMap;

/// One tool whose generated code contains review markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub tool_id: ToolId,
    pub tool_type: ToolType,
    pub reason: String,
}

/// The result of one generation pass.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Notebook source text.
    pub source: String,
    /// Every handle bound during the pass.
    pub handles: HandleMap,
    /// Review markers, in emission order.
    pub review: Vec<ReviewItem>,
    pub report: ValidationReport,
}

impl Generation {
    /// Ids of tools with at least one review marker, in emission order.
    pub fn tools_needing_review(&self) -> Vec<ToolId> {
        let mut ids: Vec<ToolId> = Vec::new();
        for item in &self.review {
            if !ids.contains(&item.tool_id) {
                ids.push(item.tool_id);
            }
        }
        ids
    }
}

pub struct Generator {
    registry: AHashMap<ToolType, Box<dyn ToolEmitter>>,
}

pub struct GeneratorBuilder {
    registry: AHashMap<ToolType, Box<dyn ToolEmitter>>,
}

impl GeneratorBuilder {
    pub fn new() -> Self {
        let mut registry: AHashMap<ToolType, Box<dyn ToolEmitter>> = AHashMap::new();
        register_default_emitters(&mut registry);
        Self { registry }
    }

    /// Registers an emitter, replacing any existing one for the same tool type.
    pub fn with_custom_emitter(mut self, emitter: Box<dyn ToolEmitter>) -> Self {
        self.registry.insert(emitter.tool_type(), emitter);
        self
    }

    pub fn build(self) -> Generator {
        Generator {
            registry: self.registry,
        }
    }
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Generator {
    fn default() -> Self {
        GeneratorBuilder::new().build()
    }
}

/// Output of one tool before it is added to the notebook.
struct ToolCell {
    lines: Vec<String>,
    review: Vec<String>,
}

impl Generator {
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::new()
    }

    pub fn generate(
        &self,
        graph: &OrderedGraph,
        config: &GenerationConfig,
    ) -> Result<Generation, CodegenError> {
        log::info!(
            "Generating code for {} tools in {} sections",
            graph.nodes().len(),
            graph.sections().len()
        );

        let mut handles = HandleMap::new(&config.dataframe_prefix);
        let mut review: Vec<ReviewItem> = Vec::new();
        let mut notebook = Notebook::default();

        notebook.push(Block::Markdown(header_lines(graph)));
        notebook.push(Block::Code(import_lines()));
        notebook.push(Block::Code(config_lines(graph, config)));

        for section in graph.sections() {
            if let Some(container) = section.container {
                notebook.push(Block::Markdown(banner_lines(
                    graph,
                    container,
                    section.continued,
                )));
            }
            for &id in &section.tools {
                let Some(node) = graph.node(id) else {
                    continue;
                };
                let cell = self.emit_tool(graph, node, config, &mut handles)?;
                review.extend(cell.review.into_iter().map(|reason| ReviewItem {
                    tool_id: id,
                    tool_type: node.tool.tool_type,
                    reason,
                }));
                notebook.push(Block::Code(cell.lines));
            }
        }

        notebook.push(Block::Markdown(summary_lines(graph, &review)));

        log::info!(
            "Generated {} cells; {} review marker(s)",
            notebook.blocks().len(),
            review.len()
        );
        Ok(Generation {
            source: notebook.render(),
            handles,
            review,
            report: graph.report().clone(),
        })
    }

    fn emit_tool(
        &self,
        graph: &OrderedGraph,
        node: &ToolNode,
        config: &GenerationConfig,
        handles: &mut HandleMap,
    ) -> Result<ToolCell, CodegenError> {
        let id = node.id();
        let tool_type = node.tool.tool_type;
        log::debug!("Emitting tool {} ({})", id, tool_type);

        let mut lines = vec![format!("# Tool {}: {}", id, tool_type)];
        if let Some(annotation) = &node.tool.annotation {
            lines.extend(
                annotation
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| format!("# {}", l.trim())),
            );
        }
        let mut review = Vec::new();

        let mut inputs: BTreeMap<InputPort, DataframeHandle> = BTreeMap::new();
        for c in graph.incoming(id) {
            let handle = match handles.get(c.source, c.source_port) {
                Some(handle) => handle.clone(),
                None if node.unresolved => {
                    let forward = handles.name_for(c.source, c.source_port);
                    let reason = format!(
                        "{} is produced later by tool {} (dependency cycle)",
                        forward, c.source
                    );
                    lines.push(review_comment(&reason));
                    review.push(reason);
                    forward
                }
                None => {
                    return Err(CodegenError::MissingProducer {
                        consumer: id,
                        producer: c.source,
                        port: c.source_port,
                    });
                }
            };
            inputs.insert(c.destination_port, handle);
        }

        let skip_cyclic = node.cyclic && graph.cycle_policy() == CyclePolicy::SkipCyclic;
        let stub_reason = match (&node.config, self.registry.get(&tool_type)) {
            (ToolConfig::Malformed(error), _) => Some(format!("invalid configuration: {}", error)),
            _ if skip_cyclic => Some("tool lies on a dependency cycle".to_string()),
            (ToolConfig::Stub { reason }, None) => Some(reason.clone()),
            (_, None) => Some(EmitError::NoEmitter(tool_type).to_string()),
            (_, Some(emitter)) => {
                let mut ctx = EmitContext::new(node, config, inputs.clone());
                match emitter.emit(&mut ctx) {
                    Ok(()) => {
                        let (emitted, notes) = ctx.finish();
                        lines.extend(emitted);
                        review.extend(notes);
                        None
                    }
                    Err(e) => {
                        log::debug!("Emitter for tool {} failed: {}", id, e);
                        Some(e.to_string())
                    }
                }
            }
        };

        if let Some(reason) = stub_reason {
            let reason = format!("Tool {} ({}) was not converted: {}", id, tool_type, reason);
            lines.push(review_comment(&reason));
            review.push(reason);
            let passthrough = inputs
                .values()
                .next()
                .map_or_else(|| "None".to_string(), |h| h.to_string());
            for port in graph.declared_ports(id) {
                lines.push(format!("{} = {}", handles.name_for(id, port), passthrough));
            }
        }

        for port in graph.declared_ports(id) {
            handles.bind(id, port);
        }
        Ok(ToolCell { lines, review })
    }
}

/// Generates with the default emitters.
pub fn generate(
    graph: &OrderedGraph,
    config: &GenerationConfig,
) -> Result<Generation, CodegenError> {
    Generator::default().generate(graph, config)
}

fn header_lines(graph: &OrderedGraph) -> Vec<String> {
    let title = match single_line(graph.name()) {
        name if name.is_empty() => "Converted workflow".to_string(),
        name => name,
    };
    vec![
        format!("# {}", title),
        String::new(),
        format!("- Tools: {}", graph.nodes().len()),
        format!("- Connections: {}", graph.connection_count()),
        format!("- Containers: {}", graph.containers().len()),
        String::new(),
        "Review comments in the code cells mark statements that need a manual check.".to_string(),
    ]
}

fn import_lines() -> Vec<String> {
    vec![
        "from pyspark.sql import Window".to_string(),
        "from pyspark.sql import functions as F".to_string(),
    ]
}

fn config_lines(graph: &OrderedGraph, config: &GenerationConfig) -> Vec<String> {
    let mut lines = vec!["# Configuration".to_string()];
    for (prefix, location) in [("INPUT", &config.input), ("OUTPUT", &config.output)] {
        lines.push(format!("{}_CATALOG = {}", prefix, python_str(&location.catalog)));
        lines.push(format!("{}_SCHEMA = {}", prefix, python_str(&location.schema)));
        lines.push(format!("{}_VOLUME = {}", prefix, python_str(&location.volume)));
    }
    lines.extend(config.preamble.iter().cloned());

    let mut scoped: BTreeMap<Option<ContainerId>, Vec<String>> = BTreeMap::new();
    for constant in graph.constants() {
        scoped.entry(constant.scope).or_default().push(format!(
            "{} = {}",
            python_identifier(&constant.name),
            python_str(&constant.value)
        ));
    }
    for (scope, constants) in scoped {
        match scope {
            None => lines.push("# Workflow constants".to_string()),
            Some(container) => lines.push(format!(
                "# Constants for container {}",
                container_label(graph, container)
            )),
        }
        lines.extend(constants);
    }
    lines
}

/// Python keywords plus the names the notebook itself binds.
const RESERVED_NAMES: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "F", "Window", "spark", "dbutils", "display",
];

/// Replaces characters that cannot appear in a Python identifier.
///
/// Reserved words get a trailing underscore.
fn python_identifier(name: &str) -> String {
    let mut ident: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED_NAMES.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

fn container_label(graph: &OrderedGraph, id: ContainerId) -> String {
    match graph.container(id) {
        Some(container) if !container.name.trim().is_empty() => {
            format!("{} ({})", single_line(&container.name), id)
        }
        _ => id.to_string(),
    }
}

fn banner_lines(graph: &OrderedGraph, container: ContainerId, continued: bool) -> Vec<String> {
    let summary = graph.container_summary(container);
    let suffix = if continued { " (continued)" } else { "" };
    vec![
        format!(
            "## Container: {}{}",
            container_label(graph, container),
            suffix
        ),
        format!(
            "Tools: {} | Inputs: {} | Outputs: {}",
            summary.tools, summary.inputs, summary.outputs
        ),
    ]
}

fn summary_lines(graph: &OrderedGraph, review: &[ReviewItem]) -> Vec<String> {
    let mut lines = vec![
        "## Execution summary".to_string(),
        String::new(),
        format!("- Tools emitted: {}", graph.nodes().len()),
    ];

    let mut flagged: Vec<(ToolId, ToolType, usize)> = Vec::new();
    for item in review {
        match flagged.iter_mut().find(|(id, _, _)| *id == item.tool_id) {
            Some(entry) => entry.2 += 1,
            None => flagged.push((item.tool_id, item.tool_type, 1)),
        }
    }
    lines.push(format!("- Tools needing review: {}", flagged.len()));
    for (id, tool_type, count) in flagged {
        lines.push(format!("  - Tool {} ({}): {} marker(s)", id, tool_type, count));
    }

    let warnings = graph.report().messages();
    lines.push(format!("- Validation warnings: {}", warnings.len()));
    for warning in warnings {
        lines.push(format!("  - {}", warning));
    }
    lines
}
