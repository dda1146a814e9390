// src/instruction/order.rs

//! Replay ordering for initialize instructions
//!
//! The legacy repository loader replayed descriptor items one by one, so
//! their correctness depended on replay order. The declarative output has
//! no runtime ordering, so the order is fixed here, once.
//!
//! # Rules
//!
//! Pairwise, in precedence order ([`compare`]):
//!
//! 1. Two namespaces: by sequence, then name
//! 2. A namespace sorts before anything else
//! 3. Two node type resources: by sequence, then name
//! 4. A node type resource sorts before anything else that is left
//! 5. Lower sequence first
//! 6. The `contentdelete` half of a combined pair before its
//!    `contentresource` half
//! 7. Plain content before delta (`combine`/`overlay`) content
//! 8. Neither delta: upstream before downstream ([`is_downstream`])
//! 9. Otherwise by name
//!
//! # Total order
//!
//! Rules 8 and 9 mix a partial relation (path containment) with a name
//! comparison, so the pairwise comparator is not transitive in general:
//! `/a` (named `z`) < `/a/x` (named `a`) < `/c` (named `m`) < `/a`. Sorting
//! with it directly would give an input-dependent result. [`replay_order`]
//! instead builds a linear extension of the rules:
//!
//! - namespaces, then node type resources, each sorted by [`compare`]
//!   (rules 1 to 4 are transitive on their own)
//! - the remaining instructions grouped by sequence (rule 5)
//! - combined pairs kept together as one unit (rule 6)
//! - within a group, plain units in downstream order with name as the
//!   tie-break (Kahn's algorithm, rules 8 and 9), then delta units by name
//!   (rules 7 and 9)
//! - a loop of combined pairs, possible through their delete halves, is
//!   broken by name

use super::{Instruction, InstructionId, InstructionKind, InstructionSet};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Compare two instructions of a set by the replay rules
pub fn compare(set: &InstructionSet, a: InstructionId, b: InstructionId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (x, y) = (set.get(a), set.get(b));

    // Rules 1-4: namespaces, then node types
    for kind in [InstructionKind::Namespace, InstructionKind::NodeTypesResource] {
        match (x.kind() == kind, y.kind() == kind) {
            (true, true) => return by_sequence_then_name(x, y),
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
    }

    // Rule 5
    let sequence = x.sequence.total_cmp(&y.sequence);
    if sequence != Ordering::Equal {
        return sequence;
    }

    // Rule 6
    if set.are_combined(a, b) {
        return if x.kind() == InstructionKind::ContentDelete {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    // Rules 7-9
    match (x.is_delta(), y.is_delta()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => by_name(x, y),
        (false, false) => match (is_downstream(x, y), is_downstream(y, x)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => by_name(x, y),
        },
    }
}

/// Whether `downstream` must be replayed after `upstream`
///
/// True when `upstream` imports content and `downstream` touches that
/// content's path or something below it. An import at exactly the same
/// path as another import is only upstream of it when it is a `skip`
/// import. Resource bundles are downstream of everything.
pub fn is_downstream(upstream: &Instruction, downstream: &Instruction) -> bool {
    if downstream.kind() == InstructionKind::ResourceBundles {
        return true;
    }
    if upstream.kind() != InstructionKind::ContentResource {
        return false;
    }
    let (Some(up), Some(down)) = (&upstream.content_path, &downstream.content_path) else {
        return false;
    };

    if up == down {
        return downstream.kind() != InstructionKind::ContentResource || upstream.is_skip();
    }
    let prefix = if up == "/" {
        "/".to_string()
    } else {
        format!("{}/", up)
    };
    down.starts_with(&prefix)
}

fn by_name(x: &Instruction, y: &Instruction) -> Ordering {
    x.name.cmp(&y.name).then(x.kind().cmp(&y.kind()))
}

fn by_sequence_then_name(x: &Instruction, y: &Instruction) -> Ordering {
    x.sequence.total_cmp(&y.sequence).then_with(|| by_name(x, y))
}

/// Instructions replayed as one: a single instruction or a combined pair
#[derive(Debug)]
struct Unit {
    /// Members in replay order
    members: Vec<InstructionId>,
    /// Member that decides sequence, delta status and name
    lead: InstructionId,
}

/// Compute the replay order of every instruction in the set
///
/// The result is deterministic: it depends only on instruction content,
/// never on the order instructions were added to the set.
pub fn replay_order(set: &InstructionSet) -> Vec<InstructionId> {
    let mut namespaces = Vec::new();
    let mut node_types = Vec::new();
    let mut units = Vec::new();

    for id in set.ids() {
        let instruction = set.get(id);
        match instruction.kind() {
            InstructionKind::Namespace => namespaces.push(id),
            InstructionKind::NodeTypesResource => node_types.push(id),
            InstructionKind::ContentResource if instruction.combined_with.is_some() => {}
            InstructionKind::ContentDelete => match instruction.combined_with {
                Some(partner) => units.push(Unit {
                    members: vec![id, partner],
                    lead: partner,
                }),
                None => units.push(Unit {
                    members: vec![id],
                    lead: id,
                }),
            },
            _ => units.push(Unit {
                members: vec![id],
                lead: id,
            }),
        }
    }

    namespaces.sort_by(|a, b| compare(set, *a, *b));
    node_types.sort_by(|a, b| compare(set, *a, *b));

    let mut order = Vec::with_capacity(set.len());
    order.extend(namespaces);
    order.extend(node_types);

    units.sort_by(|a, b| {
        set.get(a.lead)
            .sequence
            .total_cmp(&set.get(b.lead).sequence)
    });

    let mut start = 0;
    while start < units.len() {
        let sequence = set.get(units[start].lead).sequence;
        let end = units[start..]
            .iter()
            .position(|u| set.get(u.lead).sequence.total_cmp(&sequence) != Ordering::Equal)
            .map_or(units.len(), |offset| start + offset);

        order_group(set, &units[start..end], &mut order);
        start = end;
    }

    debug!("Computed replay order for {} instructions", order.len());
    order
}

/// Order one group of units sharing a sequence number
fn order_group(set: &InstructionSet, group: &[Unit], order: &mut Vec<InstructionId>) {
    let (delta, plain): (Vec<&Unit>, Vec<&Unit>) =
        group.iter().partition(|u| set.get(u.lead).is_delta());

    for unit in downstream_order(set, &plain) {
        order.extend(unit.members.iter().copied());
    }

    let mut delta = delta;
    delta.sort_by(|a, b| by_name(set.get(a.lead), set.get(b.lead)));
    for unit in delta {
        order.extend(unit.members.iter().copied());
    }
}

fn unit_downstream(set: &InstructionSet, upstream: &Unit, downstream: &Unit) -> bool {
    upstream.members.iter().any(|u| {
        downstream
            .members
            .iter()
            .any(|d| is_downstream(set.get(*u), set.get(*d)))
    })
}

/// Topologically sort plain units so upstream units come first
///
/// Uses Kahn's algorithm; among units that are ready, the one with the
/// smallest name goes first. Mutual downstream relations cancel out and
/// leave the pair to the name comparison. When every remaining unit waits
/// on another one, a combined pair closes the loop through its delete half
/// and [`break_cycle`] releases one of them by name.
fn downstream_order<'u>(set: &InstructionSet, units: &[&'u Unit]) -> Vec<&'u Unit> {
    let n = units.len();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degrees = vec![0usize; n];

    for i in 0..n {
        for j in 0..n {
            if i != j
                && unit_downstream(set, units[i], units[j])
                && !unit_downstream(set, units[j], units[i])
            {
                dependents[i].push(j);
                in_degrees[j] += 1;
            }
        }
    }

    let key = |i: usize| {
        let lead = set.get(units[i].lead);
        (lead.name.clone(), lead.kind(), i)
    };

    // Units with no remaining upstream units, smallest name first
    let mut ready: BTreeSet<(String, InstructionKind, usize)> = (0..n)
        .filter(|&i| in_degrees[i] == 0)
        .map(key)
        .collect();
    let mut placed = vec![false; n];
    let mut result = Vec::with_capacity(n);

    while result.len() < n {
        let i = match ready.pop_first() {
            Some((_, _, i)) => i,
            None => {
                let Some(i) = break_cycle(units, &dependents, &placed, &key) else {
                    break;
                };
                warn!(
                    "Circular path dependency through item '{}', replaying it by name",
                    set.get(units[i].lead).name
                );
                i
            }
        };
        placed[i] = true;
        result.push(units[i]);
        for &j in &dependents[i] {
            if placed[j] {
                continue;
            }
            in_degrees[j] -= 1;
            if in_degrees[j] == 0 {
                ready.insert(key(j));
            }
        }
    }

    result
}

/// Pick the unit to release when no remaining unit is ready
///
/// Prefers the smallest-named combined pair on a cycle that no unit
/// outside the cycle waits for, so edges between single instructions are
/// never broken.
fn break_cycle(
    units: &[&Unit],
    dependents: &[Vec<usize>],
    placed: &[bool],
    key: &dyn Fn(usize) -> (String, InstructionKind, usize),
) -> Option<usize> {
    let n = units.len();
    let remaining: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();

    // reach[i][j]: j is reachable from i through unplaced units
    let mut reach = vec![Vec::new(); n];
    for &from in &remaining {
        let mut seen = vec![false; n];
        let mut stack = vec![from];
        while let Some(i) = stack.pop() {
            for &j in &dependents[i] {
                if !placed[j] && !seen[j] {
                    seen[j] = true;
                    stack.push(j);
                }
            }
        }
        reach[from] = seen;
    }

    let in_source_cycle = |i: usize| {
        reach[i][i] && remaining.iter().all(|&j| !reach[j][i] || reach[i][j])
    };

    remaining
        .iter()
        .copied()
        .filter(|&i| units[i].members.len() > 1 && in_source_cycle(i))
        .min_by_key(|&i| key(i))
        .or_else(|| remaining.iter().copied().min_by_key(|&i| key(i)))
}
