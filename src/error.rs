use crate::workflow::{ContainerId, InputPort, OutputPort, ToolId, ToolType};
use itertools::Itertools;
use thiserror::Error;

/// Problems with the shape of the workflow graph.
///
/// Only some variants stop the pipeline. `Cycle` and `OrphanTool` are collected into the
/// [`ValidationReport`](crate::graph::ValidationReport) and generation continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error(
        "Connection #{connection_index} references tool {missing_tool_id} as its {endpoint}, but no such tool exists"
    )]
    DanglingReference {
        connection_index: usize,
        missing_tool_id: ToolId,
        endpoint: Endpoint,
    },

    #[error("Cycle detected through tools [{}]", .tool_ids.iter().join(" -> "))]
    Cycle { tool_ids: Vec<ToolId> },

    #[error("Tool {tool_id} ({tool_type}) has no incoming or outgoing connections")]
    OrphanTool { tool_id: ToolId, tool_type: ToolType },

    #[error("Connection #{connection_index}: tool {tool_id} ({tool_type}) has no {direction} port '{port}'")]
    InvalidPort {
        connection_index: usize,
        tool_id: ToolId,
        tool_type: ToolType,
        direction: Endpoint,
        port: String,
    },

    #[error(
        "Tool {tool_id} receives more than one connection on input port '{port}' (connections #{first} and #{second})"
    )]
    DuplicateInput {
        tool_id: ToolId,
        port: InputPort,
        first: usize,
        second: usize,
    },

    #[error("Container {container_id} lists tool {tool_id}, which does not exist")]
    UnknownContainerMember {
        container_id: ContainerId,
        tool_id: ToolId,
    },

    #[error("Tool {tool_id} is claimed by containers {first} and {second}")]
    ConflictingMembership {
        tool_id: ToolId,
        first: ContainerId,
        second: ContainerId,
    },

    #[error("Tool id {0} is used by more than one tool")]
    DuplicateTool(ToolId),
}

impl StructuralError {
    /// Whether this error prevents code generation.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StructuralError::Cycle { .. } | StructuralError::OrphanTool { .. }
        )
    }
}

/// Which end of a connection an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Destination,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Source => write!(f, "source"),
            Endpoint::Destination => write!(f, "destination"),
        }
    }
}

/// A tool's properties do not fit the schema of its tool type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required property '{0}'")]
    MissingKey(String),

    #[error("property '{key}' has invalid value '{value}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors produced while translating a single formula.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Syntax error at position {position}: expected {expected}, found {found}")]
    SyntaxError {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Function '{name}' with {arity} argument(s) has no dataframe equivalent")]
    UnknownFunction { name: String, arity: usize },

    #[error("Argument {index} of '{name}' must be a constant, found an expression")]
    NonConstantArgument { name: String, index: usize },

    #[error("Numeric value {value} is outside the range of a double")]
    NonFiniteNumber { value: String },

    #[error("Argument {index} of '{name}' has unsupported value '{value}'")]
    UnsupportedArgument {
        name: String,
        index: usize,
        value: String,
    },
}

impl ExpressionError {
    pub(crate) fn syntax(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        ExpressionError::SyntaxError {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Failure of an emission rule for one tool. Always recovered by the generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("required input '{0}' is not connected")]
    MissingInput(InputPort),

    #[error("no emitter is registered for tool type {0}")]
    NoEmitter(ToolType),

    #[error("{0}")]
    Unsupported(String),
}

/// Internal-consistency faults during code generation.
///
/// These signal a bug in graph ordering rather than a workflow authoring mistake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error(
        "Internal error: tool {consumer} consumes port '{port}' of tool {producer}, which has not been emitted yet"
    )]
    MissingProducer {
        consumer: ToolId,
        producer: ToolId,
        port: OutputPort,
    },
}

/// Errors returned by the end-to-end [`Transpiler`](crate::transpiler::Transpiler).
#[derive(Error, Debug, Clone)]
pub enum TranspileError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Errors that can occur when converting a custom record format into a `WorkflowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Invalid workflow record: {0}")]
    ValidationError(String),
}
