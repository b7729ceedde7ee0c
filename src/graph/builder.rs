use super::ordering::{sections, topological_order};
use super::validation::{ValidationReport, ValidationWarning, find_cycles, find_orphans};
use super::{CyclePolicy, OrderedGraph, ToolNode};
use crate::error::{Endpoint, StructuralError};
use crate::workflow::{
    Connection, ContainerId, InputPort, OutputPort, Tool, ToolConfig, ToolId, ToolType,
    WorkflowDefinition,
};
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, BTreeSet};

/// Builds an [`OrderedGraph`] from a [`WorkflowDefinition`].
pub struct GraphBuilder<'a> {
    workflow: &'a WorkflowDefinition,
    cycle_policy: CyclePolicy,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(workflow: &'a WorkflowDefinition) -> Self {
        Self {
            workflow,
            cycle_policy: CyclePolicy::default(),
        }
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn build(self) -> Result<OrderedGraph, StructuralError> {
        let workflow = self.workflow;
        log::info!(
            "Building graph for '{}': {} tools, {} connections, {} containers",
            workflow.name,
            workflow.tools.len(),
            workflow.connections.len(),
            workflow.containers.len()
        );

        let tools = index_tools(&workflow.tools)?;
        check_connections(&workflow.connections, &tools)?;

        let mut report = ValidationReport::default();
        let membership = self.resolve_membership(&tools, &mut report)?;

        // Distinct producer/consumer sets; parallel connections count once.
        let tool_ids: BTreeSet<ToolId> = tools.keys().copied().collect();
        let mut producers: BTreeMap<ToolId, BTreeSet<ToolId>> = BTreeMap::new();
        let mut consumers: BTreeMap<ToolId, BTreeSet<ToolId>> = BTreeMap::new();
        let mut incoming: AHashMap<ToolId, Vec<Connection>> = AHashMap::new();
        let mut outgoing: AHashMap<ToolId, Vec<Connection>> = AHashMap::new();
        for c in &workflow.connections {
            producers.entry(c.destination).or_default().insert(c.source);
            consumers.entry(c.source).or_default().insert(c.destination);
            incoming.entry(c.destination).or_default().push(c.clone());
            outgoing.entry(c.source).or_default().push(c.clone());
        }
        for list in incoming.values_mut() {
            list.sort_by_key(|c| c.destination_port);
        }
        for list in outgoing.values_mut() {
            list.sort_by_key(|c| (c.source_port, c.destination, c.destination_port));
        }

        let cycles = find_cycles(&tool_ids, &consumers);
        let cyclic: AHashSet<ToolId> = cycles.iter().flatten().copied().collect();
        for tool_ids in cycles {
            report.push(ValidationWarning::Structural(StructuralError::Cycle {
                tool_ids,
            }));
        }

        let by_id = tool_ids.iter().map(|id| (*id, tools[id].tool_type));
        for (tool_id, tool_type) in find_orphans(by_id, &consumers, &producers) {
            report.push(ValidationWarning::Structural(StructuralError::OrphanTool {
                tool_id,
                tool_type,
            }));
        }

        let ordering = topological_order(&tool_ids, &producers, &consumers);
        let sections = sections(&ordering.order, &membership, &producers, &ordering.unresolved);

        let mut nodes = Vec::with_capacity(ordering.order.len());
        let mut index = AHashMap::with_capacity(ordering.order.len());
        for id in &ordering.order {
            let tool = tools[id];
            let config = match ToolConfig::parse(tool.tool_type, &tool.properties) {
                Ok(config) => config,
                Err(error) => {
                    report.push(ValidationWarning::Config {
                        tool_id: tool.id,
                        tool_type: tool.tool_type,
                        error: error.clone(),
                    });
                    ToolConfig::Malformed(error)
                }
            };
            index.insert(*id, nodes.len());
            nodes.push(ToolNode {
                tool: tool.clone(),
                config,
                container: membership.get(id).copied(),
                unresolved: ordering.unresolved.contains(id),
                cyclic: cyclic.contains(id),
            });
        }

        log::info!(
            "Ordered {} tools into {} sections ({} warnings)",
            nodes.len(),
            sections.len(),
            report.len()
        );
        log::debug!("Emission order: {:?}", ordering.order);

        Ok(OrderedGraph {
            name: workflow.name.clone(),
            nodes,
            index,
            sections,
            containers: workflow.containers.clone(),
            incoming,
            outgoing,
            connection_count: workflow.connections.len(),
            constants: workflow.constants.clone(),
            cycle_policy: self.cycle_policy,
            report,
        })
    }

    /// Merges container member lists with each tool's own `container` field.
    fn resolve_membership(
        &self,
        tools: &AHashMap<ToolId, &Tool>,
        report: &mut ValidationReport,
    ) -> Result<AHashMap<ToolId, ContainerId>, StructuralError> {
        let mut membership: AHashMap<ToolId, ContainerId> = AHashMap::new();
        let mut claim = |tool_id: ToolId, container: ContainerId| match membership.get(&tool_id) {
            Some(&first) if first != container => Err(StructuralError::ConflictingMembership {
                tool_id,
                first,
                second: container,
            }),
            _ => {
                membership.insert(tool_id, container);
                Ok(())
            }
        };

        for container in &self.workflow.containers {
            for &tool_id in &container.tools {
                if !tools.contains_key(&tool_id) {
                    return Err(StructuralError::UnknownContainerMember {
                        container_id: container.id,
                        tool_id,
                    });
                }
                claim(tool_id, container.id)?;
            }
        }

        let known: AHashSet<ContainerId> =
            self.workflow.containers.iter().map(|c| c.id).collect();
        for tool in &self.workflow.tools {
            let Some(container_id) = tool.container else {
                continue;
            };
            if known.contains(&container_id) {
                claim(tool.id, container_id)?;
            } else {
                report.push(ValidationWarning::UnknownContainer {
                    tool_id: tool.id,
                    container_id,
                });
            }
        }

        Ok(membership)
    }
}

fn index_tools(tools: &[Tool]) -> Result<AHashMap<ToolId, &Tool>, StructuralError> {
    let mut index = AHashMap::with_capacity(tools.len());
    for tool in tools {
        if index.insert(tool.id, tool).is_some() {
            return Err(StructuralError::DuplicateTool(tool.id));
        }
    }
    Ok(index)
}

/// Endpoint existence, port validity and single fan-in per input port.
fn check_connections(
    connections: &[Connection],
    tools: &AHashMap<ToolId, &Tool>,
) -> Result<(), StructuralError> {
    let mut fan_in: AHashMap<(ToolId, InputPort), usize> = AHashMap::new();

    for (connection_index, c) in connections.iter().enumerate() {
        let source = lookup(tools, c.source, connection_index, Endpoint::Source)?;
        let destination = lookup(tools, c.destination, connection_index, Endpoint::Destination)?;

        if !declares_output(source.tool_type, c.source_port) {
            return Err(StructuralError::InvalidPort {
                connection_index,
                tool_id: source.id,
                tool_type: source.tool_type,
                direction: Endpoint::Source,
                port: c.source_port.to_string(),
            });
        }
        if !destination.tool_type.accepts_input(&c.destination_port) {
            return Err(StructuralError::InvalidPort {
                connection_index,
                tool_id: destination.id,
                tool_type: destination.tool_type,
                direction: Endpoint::Destination,
                port: c.destination_port.to_string(),
            });
        }
        if let Some(first) = fan_in.insert((c.destination, c.destination_port), connection_index) {
            return Err(StructuralError::DuplicateInput {
                tool_id: c.destination,
                port: c.destination_port,
                first,
                second: connection_index,
            });
        }
    }
    Ok(())
}

fn lookup<'t>(
    tools: &AHashMap<ToolId, &'t Tool>,
    id: ToolId,
    connection_index: usize,
    endpoint: Endpoint,
) -> Result<&'t Tool, StructuralError> {
    tools
        .get(&id)
        .copied()
        .ok_or(StructuralError::DanglingReference {
            connection_index,
            missing_tool_id: id,
            endpoint,
        })
}

fn declares_output(tool_type: ToolType, port: OutputPort) -> bool {
    match tool_type {
        // Stubs pass their input through on whatever port the original used.
        ToolType::Macro | ToolType::Unsupported => true,
        _ => tool_type.output_ports().contains(&port),
    }
}
