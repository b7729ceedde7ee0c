use crate::error::{ConfigError, StructuralError};
use crate::workflow::{ContainerId, ToolId, ToolType};
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A non-fatal finding produced while building the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// `Cycle` or `OrphanTool`.
    Structural(StructuralError),
    /// The tool's properties did not fit its schema; it will be emitted as a stub.
    Config {
        tool_id: ToolId,
        tool_type: ToolType,
        error: ConfigError,
    },
    /// The tool names a container that does not exist; it is treated as top-level.
    UnknownContainer {
        tool_id: ToolId,
        container_id: ContainerId,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::Structural(e) => write!(f, "{}", e),
            ValidationWarning::Config {
                tool_id,
                tool_type,
                error,
            } => write!(f, "Tool {} ({}) is misconfigured: {}", tool_id, tool_type, error),
            ValidationWarning::UnknownContainer {
                tool_id,
                container_id,
            } => write!(
                f,
                "Tool {} references unknown container {}; treating it as top-level",
                tool_id, container_id
            ),
        }
    }
}

/// Ordered list of warnings returned alongside the generated code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub(crate) fn push(&mut self, warning: ValidationWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// The warnings rendered as strings, in the order they were found.
    pub fn messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }

    /// Every reported cycle, as the sequence of tool ids on it.
    pub fn cycles(&self) -> impl Iterator<Item = &[ToolId]> {
        self.warnings.iter().filter_map(|w| match w {
            ValidationWarning::Structural(StructuralError::Cycle { tool_ids }) => {
                Some(tool_ids.as_slice())
            }
            _ => None,
        })
    }

    pub fn orphans(&self) -> impl Iterator<Item = ToolId> + '_ {
        self.warnings.iter().filter_map(|w| match w {
            ValidationWarning::Structural(StructuralError::OrphanTool { tool_id, .. }) => {
                Some(*tool_id)
            }
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }
}

/// Tarjan bookkeeping for one tool: discovery index and lowest index reachable.
#[derive(Clone, Copy)]
struct Visit {
    index: usize,
    lowlink: usize,
}

#[derive(Default)]
struct Tarjan {
    visits: AHashMap<ToolId, Visit>,
    stack: Vec<ToolId>,
    on_stack: AHashSet<ToolId>,
    components: Vec<Vec<ToolId>>,
}

impl Tarjan {
    fn discover(&mut self, id: ToolId) {
        let index = self.visits.len();
        self.visits.insert(id, Visit { index, lowlink: index });
        self.stack.push(id);
        self.on_stack.insert(id);
    }

    fn lower(&mut self, id: ToolId, to: usize) {
        if let Some(visit) = self.visits.get_mut(&id) {
            visit.lowlink = visit.lowlink.min(to);
        }
    }

    fn visit(&self, id: ToolId) -> Option<Visit> {
        self.visits.get(&id).copied()
    }

    /// Pops the component rooted at `root` once its lowlink equals its index.
    fn close(&mut self, root: ToolId) {
        let Some(visit) = self.visit(root) else { return };
        if visit.lowlink != visit.index {
            return;
        }
        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(&member);
            component.push(member);
            if member == root {
                break;
            }
        }
        self.components.push(component);
    }
}

/// Finds cycles as the strongly connected components of the tool graph.
///
/// Every component with more than one tool, or a single tool feeding itself, is one cycle,
/// so each tool that can reach itself is named exactly once. Members are listed in walk
/// order from the smallest id, which for a simple ring is the ring itself.
pub(super) fn find_cycles(
    tool_ids: &BTreeSet<ToolId>,
    consumers: &BTreeMap<ToolId, BTreeSet<ToolId>>,
) -> Vec<Vec<ToolId>> {
    let empty = BTreeSet::new();
    let empty = &empty;
    let successors = move |id: ToolId| consumers.get(&id).unwrap_or(empty).iter();
    let mut tarjan = Tarjan::default();

    for &root in tool_ids {
        if tarjan.visits.contains_key(&root) {
            continue;
        }
        // Explicit call stack; long chains must not exhaust the thread stack.
        tarjan.discover(root);
        let mut calls = vec![(root, successors(root))];
        loop {
            let Some((node, pending)) = calls.last_mut() else { break };
            let node = *node;
            match pending.next().copied() {
                Some(next) => match tarjan.visit(next) {
                    None => {
                        tarjan.discover(next);
                        calls.push((next, successors(next)));
                    }
                    Some(seen) if tarjan.on_stack.contains(&next) => tarjan.lower(node, seen.index),
                    Some(_) => {}
                },
                None => {
                    calls.pop();
                    if let (Some((parent, _)), Some(done)) = (calls.last(), tarjan.visit(node)) {
                        let parent = *parent;
                        tarjan.lower(parent, done.lowlink);
                    }
                    tarjan.close(node);
                }
            }
        }
    }

    let feeds_itself = |id: &ToolId| consumers.get(id).is_some_and(|c| c.contains(id));
    let mut cycles: Vec<Vec<ToolId>> = tarjan
        .components
        .into_iter()
        .filter(|component| component.len() > 1 || component.iter().any(feeds_itself))
        .map(|component| walk_order(component.into_iter().collect(), consumers))
        .collect();
    cycles.sort();
    cycles
}

/// Depth-first preorder over one component, from its smallest id, staying inside it.
fn walk_order(
    members: BTreeSet<ToolId>,
    consumers: &BTreeMap<ToolId, BTreeSet<ToolId>>,
) -> Vec<ToolId> {
    let mut order = Vec::with_capacity(members.len());
    let mut placed: AHashSet<ToolId> = AHashSet::new();
    let mut stack: Vec<ToolId> = members.first().copied().into_iter().collect();
    while let Some(id) = stack.pop() {
        if !placed.insert(id) {
            continue;
        }
        order.push(id);
        if let Some(next) = consumers.get(&id) {
            // Reversed so the smallest consumer is walked first.
            stack.extend(
                next.iter()
                    .rev()
                    .filter(|n| members.contains(*n) && !placed.contains(*n)),
            );
        }
    }
    order
}

/// Tools with no connections at all, excluding legitimately sourceless or sinkless types.
pub(super) fn find_orphans<'a>(
    tools: impl Iterator<Item = (ToolId, ToolType)> + 'a,
    consumers: &'a BTreeMap<ToolId, BTreeSet<ToolId>>,
    producers: &'a BTreeMap<ToolId, BTreeSet<ToolId>>,
) -> impl Iterator<Item = (ToolId, ToolType)> + 'a {
    tools.filter(move |(id, tool_type)| {
        let connected = consumers.get(id).is_some_and(|c| !c.is_empty())
            || producers.get(id).is_some_and(|p| !p.is_empty());
        !connected && !tool_type.is_source() && !tool_type.is_sink()
    })
}
