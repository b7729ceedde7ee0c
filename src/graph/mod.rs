//! The validated, ordered workflow graph.
//!
//! [`build`] turns a [`WorkflowDefinition`] into an [`OrderedGraph`]: fatal structural
//! problems are returned as [`StructuralError`]s, everything else lands in the
//! [`ValidationReport`] and the graph is still produced.

mod builder;
mod ordering;
mod validation;

pub use builder::GraphBuilder;
pub use validation::{ValidationReport, ValidationWarning};

use crate::error::StructuralError;
use crate::workflow::{
    Connection, Constant, Container, ContainerId, OutputPort, Tool, ToolConfig, ToolId, ToolType,
    WorkflowDefinition,
};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How tools that sit on a dependency cycle are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Emit every tool in forced order; unresolved tools get a review marker.
    #[default]
    BestEffort,
    /// Emit tools on a cycle as stubs.
    SkipCyclic,
}

/// One tool with its parsed configuration and ordering facts.
#[derive(Debug, Clone)]
pub struct ToolNode {
    pub tool: Tool,
    pub config: ToolConfig,
    /// Effective container after merging both membership sources.
    pub container: Option<ContainerId>,
    /// Emitted before at least one of its producers.
    pub unresolved: bool,
    /// Lies on a reported cycle.
    pub cyclic: bool,
}

impl ToolNode {
    pub fn id(&self) -> ToolId {
        self.tool.id
    }
}

/// A contiguous run of tools emitted under one banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// `None` for top-level tools.
    pub container: Option<ContainerId>,
    /// Set when an earlier section already covered part of this container.
    pub continued: bool,
    pub tools: Vec<ToolId>,
}

/// Connection counts for a container banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub tools: usize,
    /// Connections entering the container from outside.
    pub inputs: usize,
    /// Connections leaving the container.
    pub outputs: usize,
}

/// A validated workflow with its tools in emission order.
#[derive(Debug, Clone)]
pub struct OrderedGraph {
    pub(crate) name: String,
    pub(crate) nodes: Vec<ToolNode>,
    pub(crate) index: AHashMap<ToolId, usize>,
    pub(crate) sections: Vec<Section>,
    pub(crate) containers: Vec<Container>,
    /// Per destination, sorted by input port.
    pub(crate) incoming: AHashMap<ToolId, Vec<Connection>>,
    /// Per source, sorted by (output port, destination).
    pub(crate) outgoing: AHashMap<ToolId, Vec<Connection>>,
    pub(crate) connection_count: usize,
    pub(crate) constants: Vec<Constant>,
    pub(crate) cycle_policy: CyclePolicy,
    pub(crate) report: ValidationReport,
}

impl OrderedGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool ids in emission order.
    pub fn order(&self) -> Vec<ToolId> {
        self.nodes.iter().map(ToolNode::id).collect()
    }

    pub fn nodes(&self) -> &[ToolNode] {
        &self.nodes
    }

    pub fn node(&self, id: ToolId) -> Option<&ToolNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Index of a tool in [`order`](Self::order).
    pub fn position(&self, id: ToolId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn incoming(&self, id: ToolId) -> &[Connection] {
        self.incoming.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn outgoing(&self, id: ToolId) -> &[Connection] {
        self.outgoing.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        self.cycle_policy
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Output ports a tool must bind a handle for.
    ///
    /// This is the tool type's declared set; pass-through stub types also get every port
    /// their outgoing connections use.
    pub fn declared_ports(&self, id: ToolId) -> Vec<OutputPort> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut ports: BTreeSet<OutputPort> =
            node.tool.tool_type.output_ports().iter().copied().collect();
        if matches!(node.tool.tool_type, ToolType::Macro | ToolType::Unsupported) {
            ports.extend(self.outgoing(id).iter().map(|c| c.source_port));
        }
        ports.into_iter().collect()
    }

    /// Tool and boundary-connection counts of one container.
    pub fn container_summary(&self, id: ContainerId) -> ContainerSummary {
        let inside = |tool: ToolId| self.node(tool).and_then(|n| n.container) == Some(id);
        let mut summary = ContainerSummary {
            tools: self.nodes.iter().filter(|n| n.container == Some(id)).count(),
            ..ContainerSummary::default()
        };
        for connections in self.outgoing.values() {
            for c in connections {
                match (inside(c.source), inside(c.destination)) {
                    (false, true) => summary.inputs += 1,
                    (true, false) => summary.outputs += 1,
                    _ => {}
                }
            }
        }
        summary
    }
}

/// Validates and orders a workflow.
pub fn build(
    workflow: &WorkflowDefinition,
    policy: CyclePolicy,
) -> Result<OrderedGraph, StructuralError> {
    GraphBuilder::new(workflow).with_cycle_policy(policy).build()
}
