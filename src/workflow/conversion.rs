use super::definition::WorkflowDefinition;
use crate::error::ConversionError;

/// A trait for custom record formats that can be converted into a `WorkflowDefinition`.
///
/// This is the seam between an external markup parser and the transpiler. Implement it
/// on whatever structs your parser produces and the rest of the pipeline stays untouched.
///
/// # Example
///
/// ```rust,no_run
/// use henkan::prelude::*;
/// use henkan::error::ConversionError;
///
/// struct ParsedNode { id: u32, plugin: String }
/// struct ParsedWorkflow { nodes: Vec<ParsedNode> }
///
/// impl IntoWorkflow for ParsedWorkflow {
///     fn into_workflow(self) -> std::result::Result<WorkflowDefinition, ConversionError> {
///         let tools = self
///             .nodes
///             .into_iter()
///             .map(|n| Tool::new(n.id, ToolType::from_plugin_name(&n.plugin)))
///             .collect();
///         Ok(WorkflowDefinition { tools, ..Default::default() })
///     }
/// }
/// ```
pub trait IntoWorkflow {
    /// Consumes the records and converts them into the canonical workflow model.
    fn into_workflow(self) -> Result<WorkflowDefinition, ConversionError>;
}

impl IntoWorkflow for WorkflowDefinition {
    fn into_workflow(self) -> Result<WorkflowDefinition, ConversionError> {
        Ok(self)
    }
}
