use super::Section;
use crate::workflow::{ContainerId, ToolId};
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, BTreeSet};

/// Result of Kahn's algorithm with forced progress through cycles.
pub(super) struct Ordering {
    pub order: Vec<ToolId>,
    /// Tools emitted before all of their producers.
    pub unresolved: BTreeSet<ToolId>,
}

/// Kahn's algorithm over distinct producer/consumer edges.
///
/// Ready tools leave in ascending id order. When no tool is ready but some remain, the
/// smallest remaining id is forced out and marked unresolved, then the walk resumes.
pub(super) fn topological_order(
    tool_ids: &BTreeSet<ToolId>,
    producers: &BTreeMap<ToolId, BTreeSet<ToolId>>,
    consumers: &BTreeMap<ToolId, BTreeSet<ToolId>>,
) -> Ordering {
    let mut in_degree: AHashMap<ToolId, usize> = tool_ids
        .iter()
        .map(|id| (*id, producers.get(id).map_or(0, BTreeSet::len)))
        .collect();
    let mut ready: BTreeSet<ToolId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut emitted: AHashSet<ToolId> = AHashSet::with_capacity(tool_ids.len());
    let mut order = Vec::with_capacity(tool_ids.len());
    let mut unresolved = BTreeSet::new();
    let mut remaining = tool_ids.iter();

    while order.len() < tool_ids.len() {
        let next = match ready.pop_first() {
            Some(id) => id,
            None => {
                // `remaining` only moves forward: every id it skips has already been emitted.
                let Some(forced) = remaining.find(|id| !emitted.contains(*id)).copied() else {
                    break;
                };
                log::debug!("Forcing tool {} out of a cycle", forced);
                unresolved.insert(forced);
                forced
            }
        };

        emitted.insert(next);
        order.push(next);

        for consumer in consumers.get(&next).into_iter().flatten() {
            if emitted.contains(consumer) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(consumer) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(*consumer);
                }
            }
        }
    }

    Ordering { order, unresolved }
}

/// Groups the global order into sections.
///
/// A container section opens at its first unplaced member and pulls forward every later
/// member whose producers are already placed. Unresolved members stay where the global
/// order put them.
pub(super) fn sections(
    order: &[ToolId],
    membership: &AHashMap<ToolId, ContainerId>,
    producers: &BTreeMap<ToolId, BTreeSet<ToolId>>,
    unresolved: &BTreeSet<ToolId>,
) -> Vec<Section> {
    let mut placed: AHashSet<ToolId> = AHashSet::with_capacity(order.len());
    let mut opened: AHashSet<ContainerId> = AHashSet::new();
    let mut sections: Vec<Section> = Vec::new();

    for (position, &tool) in order.iter().enumerate() {
        if placed.contains(&tool) {
            continue;
        }

        let Some(&container) = membership.get(&tool) else {
            placed.insert(tool);
            match sections.last_mut() {
                Some(section) if section.container.is_none() => section.tools.push(tool),
                _ => sections.push(Section {
                    container: None,
                    continued: false,
                    tools: vec![tool],
                }),
            }
            continue;
        };

        let mut section = Section {
            container: Some(container),
            continued: !opened.insert(container),
            tools: vec![tool],
        };
        placed.insert(tool);

        for &candidate in &order[position + 1..] {
            if placed.contains(&candidate) || membership.get(&candidate) != Some(&container) {
                continue;
            }
            if unresolved.contains(&candidate) {
                continue;
            }
            let ready = producers
                .get(&candidate)
                .into_iter()
                .flatten()
                .all(|p| placed.contains(p));
            if ready {
                placed.insert(candidate);
                section.tools.push(candidate);
            }
        }
        sections.push(section);
    }

    sections
}
