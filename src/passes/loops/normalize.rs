//! # Loop Normalization
//!
//! Per loop, synthesize a preheader holding a single jump to the header and
//! a return-only exit block, then rewrite edges so that every out-of-loop
//! predecessor of the header enters through the preheader and every in-loop
//! branch out of the loop funnels through the exit. The rewrite mutates
//! block contents in place; edges must be recomputed before any further
//! analysis.

use super::NaturalLoop;
use crate::{
    ir::Instr,
    utils::cfg::{BlockMap, EdgeMap},
};

/// The synthetic blocks created for one loop.
#[derive(Debug, Clone)]
pub struct NormalizedLoop {
    pub preheader: String,
    pub exit: String,
}

/// Normalize every loop, returning the synthetic block names parallel to
/// `loops`. The predecessor map is the one the loops were detected on;
/// earlier rewrites are not re-observed, which keeps records sharing a
/// header from redirecting each other's edges twice.
pub fn normalize_loops(
    blocks: &mut BlockMap,
    preds: &EdgeMap,
    loops: &[NaturalLoop],
) -> Vec<NormalizedLoop> {
    loops
        .iter()
        .map(|lp| normalize_loop(blocks, preds, lp))
        .collect()
}

fn normalize_loop(blocks: &mut BlockMap, preds: &EdgeMap, lp: &NaturalLoop) -> NormalizedLoop {
    let header = lp.header().to_string();

    let preheader = blocks.fresh_label(&format!("{header}_pred"));
    blocks.insert(preheader.clone(), vec![Instr::jmp(header.clone())]);

    let exit = blocks.fresh_label(&format!("{header}_exit"));
    blocks.insert(exit.clone(), vec![Instr::ret()]);

    // in-loop branch targets outside the loop now point at the exit
    for member in &lp.blocks {
        let Some(block) = blocks.get_mut(member) else { continue };
        if let Some(Instr::Ctrl { labels, .. }) = block.last_mut() {
            for label in labels.iter_mut() {
                if !lp.contains(label) {
                    *label = exit.clone();
                }
            }
        }
    }

    // out-of-loop predecessors of the header now jump to the preheader
    for pred in &preds[&header] {
        if lp.contains(pred) {
            continue;
        }
        let Some(block) = blocks.get_mut(pred) else { continue };
        if let Some(Instr::Ctrl { labels, .. }) = block.last_mut() {
            for label in labels.iter_mut() {
                if *label == header {
                    *label = preheader.clone();
                }
            }
        }
    }

    NormalizedLoop { preheader, exit }
}
