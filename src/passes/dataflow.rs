//! # Dataflow Engine
//!
//! A generic worklist driver for forward and backward analyses over the
//! block graph. The engine owns nothing beyond the call: facts live in the
//! returned result, the worklist in a local. Termination is the instance's
//! obligation: the meet must only shrink information over a finite-height
//! lattice and the transfer must be monotonic with respect to it.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ir::Instr,
    utils::cfg::{BlockMap, EdgeMap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A dataflow analysis instance: lattice seed, meet, and per-block
/// transfer.
pub trait Analysis {
    type Fact: Clone + PartialEq;

    fn direction(&self) -> Direction;

    /// The seed fact, also the meet of zero upstream facts.
    fn bottom(&self) -> Self::Fact;

    /// Combine the facts flowing in from multiple upstream blocks.
    fn meet(&self, facts: &[&Self::Fact]) -> Self::Fact;

    /// Push a fact through one block. The block is always given in forward
    /// instruction order; backward instances scan it themselves.
    fn transfer(&self, block: &[Instr], fact: &Self::Fact) -> Self::Fact;
}

/// Per-block facts at block entry and exit, in program order terms
/// regardless of the analysis direction.
pub struct DataflowResult<F> {
    pub in_facts: FxHashMap<String, F>,
    pub out_facts: FxHashMap<String, F>,
}

/// Run `analysis` to fixpoint over `blocks`.
///
/// Every block is seeded on the worklist; popping a block recomputes its
/// meet from the current upstream facts, applies the transfer, and pushes
/// the downstream blocks that are not already pending whenever the stored
/// fact changed.
pub fn run<A: Analysis>(
    analysis: &A,
    blocks: &BlockMap,
    preds: &EdgeMap,
    succs: &EdgeMap,
) -> DataflowResult<A::Fact> {
    let (upstream, downstream) = match analysis.direction() {
        Direction::Forward => (preds, succs),
        Direction::Backward => (succs, preds),
    };

    // `flow` holds each block's transfer output; `met` the meet it was
    // computed from.
    let mut flow: FxHashMap<String, A::Fact> = FxHashMap::default();
    let mut met: FxHashMap<String, A::Fact> = FxHashMap::default();
    for label in blocks.labels() {
        flow.insert(label.clone(), analysis.bottom());
        met.insert(label.clone(), analysis.bottom());
    }

    let mut worklist: VecDeque<String> = match analysis.direction() {
        Direction::Forward => blocks.labels().iter().cloned().collect(),
        Direction::Backward => blocks.labels().iter().rev().cloned().collect(),
    };
    let mut pending: FxHashSet<String> = worklist.iter().cloned().collect();

    while let Some(label) = worklist.pop_front() {
        pending.remove(&label);

        let incoming: Vec<&A::Fact> = upstream[&label].iter().map(|up| &flow[up]).collect();
        let in_fact = analysis.meet(&incoming);
        let block = blocks.get(&label).unwrap();
        let out_fact = analysis.transfer(block, &in_fact);

        met.insert(label.clone(), in_fact);
        if out_fact != flow[&label] {
            flow.insert(label.clone(), out_fact);
            for down in &downstream[&label] {
                if pending.insert(down.clone()) {
                    worklist.push_back(down.clone());
                }
            }
        }
    }

    match analysis.direction() {
        Direction::Forward => DataflowResult {
            in_facts: met,
            out_facts: flow,
        },
        Direction::Backward => DataflowResult {
            in_facts: flow,
            out_facts: met,
        },
    }
}
