//! # Dominance Analysis
//!
//! Dominator sets by the standard iterative fixpoint: the entry dominates
//! only itself, every other block starts with the full block set, and each
//! round intersects over predecessors until nothing changes. Immediate
//! dominators and dominance frontiers are derived from the sets afterwards.

use rustc_hash::{FxHashMap, FxHashSet};

use super::cfg::EdgeMap;

/// Mapping from block label to the set of blocks that dominate it
/// (including itself).
pub type DomSets = FxHashMap<String, FxHashSet<String>>;

/// Blocks reachable from `entry`, in depth-first visit order.
fn reachable_order(succs: &EdgeMap, entry: &str) -> Vec<String> {
    let mut order = Vec::new();
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    let mut worklist = vec![entry];
    while let Some(label) = worklist.pop() {
        if !visited.insert(label) {
            continue;
        }
        order.push(label.to_string());
        if let Some(targets) = succs.get(label) {
            for target in targets {
                worklist.push(target);
            }
        }
    }
    order
}

/// Compute the dominator set of every block, given the successor map and
/// the entry label.
///
/// Unreachable blocks keep the full block set as their dominators; they
/// never take part in any loop or hoisting decision.
pub fn dominator_sets(succs: &EdgeMap, entry: &str) -> DomSets {
    let all: FxHashSet<String> = succs.keys().cloned().collect();

    let mut preds: EdgeMap = EdgeMap::default();
    for label in succs.keys() {
        preds.entry(label.clone()).or_default();
    }
    for (label, targets) in succs {
        for target in targets {
            preds.entry(target.clone()).or_default().push(label.clone());
        }
    }

    let mut doms: DomSets = DomSets::default();
    for label in succs.keys() {
        doms.insert(label.clone(), all.clone());
    }
    doms.insert(entry.to_string(), std::iter::once(entry.to_string()).collect());

    let order = reachable_order(succs, entry);

    let mut changed = true;
    while changed {
        changed = false;
        for label in order.iter().skip(1) {
            let mut new: Option<FxHashSet<String>> = None;
            for pred in &preds[label] {
                let pred_doms = &doms[pred];
                new = Some(match new {
                    Some(acc) => acc.intersection(pred_doms).cloned().collect(),
                    None => pred_doms.clone(),
                });
            }
            let mut new = new.unwrap_or_default();
            new.insert(label.clone());
            if new != doms[label] {
                doms.insert(label.clone(), new);
                changed = true;
            }
        }
    }

    doms
}

/// The immediate dominator of every reachable block: the strict dominator
/// whose own dominator set is largest. The entry has none.
pub fn immediate_dominators(doms: &DomSets, succs: &EdgeMap, entry: &str) -> FxHashMap<String, Option<String>> {
    let mut idoms = FxHashMap::default();
    for label in reachable_order(succs, entry) {
        if label == entry {
            idoms.insert(label, None);
            continue;
        }
        let idom = doms[&label]
            .iter()
            .filter(|d| *d != &label)
            .max_by_key(|d| doms[*d].len())
            .cloned();
        idoms.insert(label, idom);
    }
    idoms
}

/// Dominance frontiers, derived from the sets: `m` is in the frontier of
/// `d` when `d` dominates a predecessor of `m` but does not strictly
/// dominate `m` itself.
pub fn dominance_frontiers(doms: &DomSets, succs: &EdgeMap, entry: &str) -> FxHashMap<String, FxHashSet<String>> {
    let mut frontiers: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    let reachable = reachable_order(succs, entry);
    let reachable_set: FxHashSet<&String> = reachable.iter().collect();

    for label in &reachable {
        frontiers.entry(label.clone()).or_default();
    }
    for pred in &reachable {
        for target in succs.get(pred).map(Vec::as_slice).unwrap_or(&[]) {
            if !reachable_set.contains(target) {
                continue;
            }
            for d in &doms[pred] {
                if d == target || !doms[target].contains(d) {
                    frontiers.entry(d.clone()).or_default().insert(target.clone());
                }
            }
        }
    }
    frontiers
}
