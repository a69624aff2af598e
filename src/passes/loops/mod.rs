//! # Natural Loops
//!
//! Back-edge detection over the dominator sets and the loop transforms
//! built on it. Each back edge `pred -> header` with `header` dominating
//! `pred` yields one loop record; records sharing a header are deliberately
//! not merged, the passes over them are serialized instead so later records
//! see the already-transformed result of earlier ones.

pub mod invariant_motion;
pub mod normalize;

use rustc_hash::FxHashSet;

use crate::utils::{
    cfg::{BlockMap, EdgeMap},
    dominance::DomSets,
};

/// A natural loop: the header plus every block that can reach the back
/// edge's source without passing through the header.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    /// Member labels; the header is always first.
    pub blocks: Vec<String>,
    members: FxHashSet<String>,
}

impl NaturalLoop {
    fn collect(header: &str, back_edge_src: &str, preds: &EdgeMap) -> Self {
        let mut blocks = vec![header.to_string()];
        let mut members: FxHashSet<String> =
            std::iter::once(header.to_string()).collect();

        let mut worklist = vec![back_edge_src.to_string()];
        while let Some(node) = worklist.pop() {
            if members.insert(node.clone()) {
                blocks.push(node.clone());
                for pred in &preds[&node] {
                    if !members.contains(pred) {
                        worklist.push(pred.clone());
                    }
                }
            }
        }

        NaturalLoop { blocks, members }
    }

    pub fn header(&self) -> &str { &self.blocks[0] }

    pub fn contains(&self, label: &str) -> bool { self.members.contains(label) }
}

/// Find every natural loop: one record per back edge, in block order.
pub fn find_natural_loops(
    blocks: &BlockMap,
    preds: &EdgeMap,
    doms: &DomSets,
) -> Vec<NaturalLoop> {
    let mut loops = Vec::new();
    for header in blocks.labels() {
        for pred in &preds[header] {
            if doms[pred].contains(header) {
                loops.push(NaturalLoop::collect(header, pred, preds));
            }
        }
    }
    loops
}
