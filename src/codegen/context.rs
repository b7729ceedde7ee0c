use super::config::GenerationConfig;
use super::formatting::review_comment;
use super::handles::DataframeHandle;
use crate::error::EmitError;
use crate::expr::{self, python_str};
use crate::graph::ToolNode;
use crate::workflow::{InputPort, OutputPort, ToolConfig, ToolId};
use std::collections::BTreeMap;

/// Everything an emitter may read or write while emitting one tool.
pub struct EmitContext<'a> {
    node: &'a ToolNode,
    config: &'a GenerationConfig,
    inputs: BTreeMap<InputPort, DataframeHandle>,
    lines: Vec<String>,
    review: Vec<String>,
}

impl<'a> EmitContext<'a> {
    pub(crate) fn new(
        node: &'a ToolNode,
        config: &'a GenerationConfig,
        inputs: BTreeMap<InputPort, DataframeHandle>,
    ) -> Self {
        Self {
            node,
            config,
            inputs,
            lines: Vec::new(),
            review: Vec::new(),
        }
    }

    pub fn node(&self) -> &'a ToolNode {
        self.node
    }

    pub fn tool_id(&self) -> ToolId {
        self.node.tool.id
    }

    pub fn tool_config(&self) -> &'a ToolConfig {
        &self.node.config
    }

    pub fn config(&self) -> &'a GenerationConfig {
        self.config
    }

    /// The handle connected to `port`.
    pub fn input(&self, port: InputPort) -> Result<DataframeHandle, EmitError> {
        self.inputs
            .get(&port)
            .cloned()
            .ok_or(EmitError::MissingInput(port))
    }

    /// All connected inputs, in port order.
    pub fn inputs(&self) -> impl Iterator<Item = (InputPort, &DataframeHandle)> {
        self.inputs.iter().map(|(port, handle)| (*port, handle))
    }

    /// The variable name this tool must assign for `port`.
    pub fn output(&self, port: OutputPort) -> DataframeHandle {
        DataframeHandle::name(&self.config.dataframe_prefix, self.tool_id(), port)
    }

    /// A tool-local helper variable, e.g. `cond_7`.
    pub fn local(&self, stem: &str) -> String {
        format!("{}_{}", stem, self.tool_id())
    }

    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Adds a review comment at the current position.
    pub fn review(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.lines.push(review_comment(&reason));
        self.review.push(reason);
    }

    /// Translates a formula, degrading to a review comment and a pass-through on failure.
    pub fn translate(&mut self, formula: &str) -> String {
        match expr::translate(formula) {
            Ok(target) => {
                for note in &target.review {
                    self.review(note.to_string());
                }
                target.code
            }
            Err(e) => {
                self.review(format!("could not translate `{}`: {}", formula.trim(), e));
                format!("F.expr({})", python_str(formula.trim()))
            }
        }
    }

    pub(crate) fn finish(self) -> (Vec<String>, Vec<String>) {
        (self.lines, self.review)
    }
}
