//! Prelude module for convenient imports
//!
//! Re-exports the types needed to build a workflow, transpile it and inspect the result.
//!
//! # Example
//!
//! ```rust,no_run
//! use henkan::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/workflow.json")?;
//! let workflow: WorkflowDefinition = serde_json::from_str(&json)?;
//!
//! let transpilation = Transpiler::builder(workflow).build().transpile()?;
//! std::fs::write("notebook.py", transpilation.source())?;
//! # Ok(())
//! # }
//! ```

// Pipeline
pub use crate::codegen::{
    Generation, GenerationConfig, Generator, TableLocation, ToolEmitter, REVIEW_MARKER,
};
pub use crate::graph::{CyclePolicy, OrderedGraph, ValidationReport};
pub use crate::transpiler::{Transpilation, Transpiler};

// Workflow model
pub use crate::workflow::{
    Connection, Constant, Container, InputPort, IntoWorkflow, OutputPort, Tool, ToolId, ToolType,
    WorkflowDefinition,
};

// Expressions
pub use crate::expr::{translate, Expr};

// Error types
pub use crate::error::{ExpressionError, StructuralError, TranspileError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
