use crate::codegen::{Generation, GenerationConfig, Generator, GeneratorBuilder, ToolEmitter};
use crate::error::{ConversionError, TranspileError};
use crate::graph::{self, OrderedGraph};
use crate::workflow::{IntoWorkflow, WorkflowDefinition};

/// Everything produced by one end-to-end run.
#[derive(Debug, Clone)]
pub struct Transpilation {
    pub graph: OrderedGraph,
    pub generation: Generation,
}

impl Transpilation {
    pub fn source(&self) -> &str {
        &self.generation.source
    }

    pub fn warnings(&self) -> Vec<String> {
        self.generation.report.messages()
    }
}

/// Validates, orders and generates code for one workflow.
pub struct Transpiler {
    workflow: WorkflowDefinition,
    config: GenerationConfig,
    generator: Generator,
}

pub struct TranspilerBuilder {
    workflow: WorkflowDefinition,
    config: GenerationConfig,
    generator: GeneratorBuilder,
}

impl TranspilerBuilder {
    pub fn new(workflow: WorkflowDefinition) -> Self {
        Self {
            workflow,
            config: GenerationConfig::default(),
            generator: GeneratorBuilder::new(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_custom_emitter(mut self, emitter: Box<dyn ToolEmitter>) -> Self {
        self.generator = self.generator.with_custom_emitter(emitter);
        self
    }

    pub fn build(self) -> Transpiler {
        Transpiler {
            workflow: self.workflow,
            config: self.config,
            generator: self.generator.build(),
        }
    }
}

impl Transpiler {
    pub fn builder(workflow: WorkflowDefinition) -> TranspilerBuilder {
        TranspilerBuilder::new(workflow)
    }

    /// Starts a builder from any record format that converts into a workflow.
    pub fn from_records(records: impl IntoWorkflow) -> Result<TranspilerBuilder, ConversionError> {
        Ok(TranspilerBuilder::new(records.into_workflow()?))
    }

    pub fn transpile(&self) -> Result<Transpilation, TranspileError> {
        let graph = graph::build(&self.workflow, self.config.cycle_policy)?;
        let generation = self.generator.generate(&graph, &self.config)?;
        Ok(Transpilation { graph, generation })
    }
}
