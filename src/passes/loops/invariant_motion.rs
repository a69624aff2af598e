//! # Loop-Invariant Code Motion
//!
//! For each normalized loop, pure single-definition instructions whose
//! operands are defined outside the loop or are themselves invariant are
//! hoisted into the preheader, provided their block dominates every loop
//! exit. The dominance condition guarantees the hoisted computation would
//! have executed on every path through the loop, so moving it earlier never
//! runs it on a path that previously skipped it.
//!
//! Meaningful on single-assignment input: the single-definition check is
//! what [`ToSsa`](crate::passes::ssa::ToSsa) establishes.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    find_natural_loops,
    normalize::{normalize_loops, NormalizedLoop},
    NaturalLoop,
};
use crate::{
    ir::{Function, Instr, Program, ValueOp},
    passes::{
        GlobalPassMut, LocalPassMut, PassError, PassManager, PassResult, TransformPass,
    },
    utils::{
        cfg::{add_entry, add_terminators, edges, form_blocks, reassemble, successor_map, BlockMap, EdgeMap},
        dominance::{dominator_sets, DomSets},
    },
};

pub const LICM: &str = "licm";

#[derive(Default)]
pub struct Licm;

/// Whether `instr` may be hoisted at all: a pure computation with a
/// destination. `phi` is pinned to its block's predecessors and never
/// moves.
fn hoistable(instr: &Instr) -> bool {
    match instr {
        Instr::Const { .. } => true,
        Instr::Value {
            op,
            dest: Some(_),
            ..
        } => op.is_pure() && *op != ValueOp::Phi,
        Instr::Label { .. } | Instr::Value { .. } | Instr::Ctrl { .. } => false,
    }
}

fn process_loop(
    blocks: &mut BlockMap,
    lp: &NaturalLoop,
    norm: &NormalizedLoop,
    succs: &EdgeMap,
    doms: &DomSets,
) -> bool {
    // exit blocks: out-of-loop successors of loop members
    let mut exits: FxHashSet<&String> = FxHashSet::default();
    for member in &lp.blocks {
        for succ in &succs[member] {
            if !lp.contains(succ) {
                exits.insert(succ);
            }
        }
    }
    // a loop with no exit gets nothing hoisted; a guarded instruction in
    // its body may never have executed at all
    if exits.is_empty() {
        return false;
    }

    // static definition counts inside the loop body
    let mut def_count: FxHashMap<&str, usize> = FxHashMap::default();
    for member in &lp.blocks {
        for instr in blocks.get(member).unwrap() {
            if let Some(dest) = instr.dest() {
                *def_count.entry(dest).or_default() += 1;
            }
        }
    }

    // grow the invariant set to fixpoint: an operand defined in the loop is
    // acceptable only once its own definition is known invariant
    let mut invariant: FxHashSet<String> = FxHashSet::default();
    loop {
        let mut grew = false;
        for member in &lp.blocks {
            for instr in blocks.get(member).unwrap() {
                let Some(dest) = instr.dest() else { continue };
                if invariant.contains(dest) || !hoistable(instr) {
                    continue;
                }
                if def_count[dest] != 1 {
                    continue;
                }
                let args_invariant = instr.args().iter().all(|arg| {
                    !def_count.contains_key(arg.as_str()) || invariant.contains(arg)
                });
                if args_invariant {
                    invariant.insert(dest.to_string());
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }

    // legality: the defining block must dominate every loop exit. Members
    // are drained in program order so a chain split across blocks reaches
    // the preheader def-before-use.
    let mut hoisted: Vec<Instr> = Vec::new();
    let order: Vec<String> = blocks
        .labels()
        .iter()
        .filter(|label| lp.contains(label))
        .cloned()
        .collect();
    for member in &order {
        if !exits.iter().all(|exit| doms[*exit].contains(member)) {
            continue;
        }
        let block = blocks.get_mut(member).unwrap();
        let mut kept = Vec::with_capacity(block.len());
        for instr in block.drain(..) {
            let hoist = matches!(instr.dest(), Some(dest) if invariant.contains(dest));
            if hoist {
                hoisted.push(instr);
            } else {
                kept.push(instr);
            }
        }
        *block = kept;
    }

    if hoisted.is_empty() {
        return false;
    }

    // insert at the head of the preheader, in program order
    let preheader = blocks.get_mut(&norm.preheader).unwrap();
    preheader.splice(0..0, hoisted);
    true
}

impl LocalPassMut for Licm {
    type Output = ();

    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)> {
        let mut blocks = BlockMap::from_blocks(form_blocks(func.instrs.clone()));
        if blocks.labels().is_empty() {
            return Ok(((), false));
        }
        add_entry(&mut blocks);
        add_terminators(&mut blocks);

        // edge computation also validates the branch targets; it must run
        // before the dominance solver sees the graph
        let (preds, _) =
            edges(&blocks).map_err(|err| PassError::analysis_error(LICM, err.into()))?;
        let doms = dominator_sets(&successor_map(&blocks), blocks.entry());

        let loops = find_natural_loops(&blocks, &preds, &doms);
        if loops.is_empty() {
            func.instrs = reassemble(&blocks);
            return Ok(((), false));
        }

        let normalized = normalize_loops(&mut blocks, &preds, &loops);

        // the rewrite changed the edges; everything below runs on the
        // normalized graph
        let (_, succs) =
            edges(&blocks).map_err(|err| PassError::analysis_error(LICM, err.into()))?;
        let doms = dominator_sets(&succs, blocks.entry());

        let mut changed = false;
        for (lp, norm) in loops.iter().zip(&normalized) {
            changed |= process_loop(&mut blocks, lp, norm, &succs, &doms);
        }

        func.instrs = reassemble(&blocks);
        Ok(((), changed))
    }
}

impl GlobalPassMut for Licm {
    type Output = ();

    fn run(&mut self, program: &mut Program) -> PassResult<(Self::Output, bool)> {
        let mut changed = false;
        for func in &mut program.functions {
            let ((), local_changed) = LocalPassMut::run(self, func)?;
            changed |= local_changed;
        }
        Ok(((), changed))
    }
}

impl TransformPass for Licm {
    fn register(passman: &mut PassManager) { passman.register_transform(LICM, Licm); }
}
