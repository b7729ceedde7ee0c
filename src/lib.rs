//! # Henkan - Workflow to Dataframe Transpiler
//!
//! **Henkan** translates visual dataflow workflows (typed tools wired together through
//! labeled ports and grouped into containers) into PySpark notebook source.
//!
//! ## Core Workflow
//!
//! The transpiler operates on a canonical record model, the [`WorkflowDefinition`](workflow::WorkflowDefinition).
//! The pipeline is:
//!
//! 1.  **Load Your Records**: Parse the workflow markup into your own structs, or deserialize
//!     a `WorkflowDefinition` directly from JSON.
//! 2.  **Convert**: Implement [`IntoWorkflow`](workflow::IntoWorkflow) for your structs.
//! 3.  **Validate and order**: [`graph::build`] checks the structure, reports cycles and
//!     orphans, and orders tools so every producer comes before its consumers.
//! 4.  **Generate**: [`codegen::generate`] runs one emitter per tool and assembles the notebook.
//!
//! [`Transpiler`](transpiler::Transpiler) chains steps 3 and 4.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use henkan::prelude::*;
//!
//! fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let workflow = WorkflowDefinition {
//!         name: "Big orders".to_string(),
//!         tools: vec![
//!             Tool::new(1, ToolType::Input).with_property("table", "orders"),
//!             Tool::new(2, ToolType::Filter).with_property("expression", "[Amount] > 100"),
//!             Tool::new(3, ToolType::Output).with_property("table", "big_orders"),
//!         ],
//!         connections: vec![
//!             Connection::new(1, 2),
//!             Connection::new(2, 3).from_port(OutputPort::True),
//!         ],
//!         ..Default::default()
//!     };
//!
//!     let transpilation = Transpiler::builder(workflow)
//!         .with_config(GenerationConfig::default())
//!         .build()
//!         .transpile()?;
//!
//!     println!("{}", transpilation.source());
//!     for warning in transpilation.warnings() {
//!         eprintln!("warning: {}", warning);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codegen;
pub mod error;
pub mod expr;
pub mod graph;
pub mod prelude;
pub mod transpiler;
pub mod workflow;
