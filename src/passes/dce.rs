//! # Liveness Analysis and Dead Code Elimination
//!
//! Backward dataflow instance: the fact is the set of variables live at a
//! program point, met by union over successors. After the fixpoint a single
//! backward scan per block deletes pure instructions whose destination is
//! dead. Control transfers and instructions with observable effects are
//! never deleted, live or not.
//!
//! Two cheaper companions are also provided: [`TrivialDce`], which deletes
//! pure definitions never used anywhere in the stream, and [`LocalDce`],
//! which removes definitions overwritten within their own block before any
//! use.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    dataflow::{self, Analysis, DataflowResult, Direction},
    GlobalPassMut, LocalPass, LocalPassMut, PassError, PassManager, PassResult, TransformPass,
};
use crate::{
    ir::{Function, Instr, Program},
    utils::cfg::{add_terminators, edges, form_blocks, reassemble, BlockMap},
};

pub const DCE: &str = "dce";
pub const TRIVIAL_DCE: &str = "trivial-dce";
pub const LOCAL_DCE: &str = "local-dce";

pub type LiveSet = FxHashSet<String>;

/// Upward-exposed uses and definitions of a block, in forward scan order: a
/// use counts only if the variable has not been defined earlier in the
/// block.
fn uses_defs(block: &[Instr]) -> (LiveSet, LiveSet) {
    let mut uses = LiveSet::default();
    let mut defs = LiveSet::default();
    for instr in block {
        for arg in instr.args() {
            if !defs.contains(arg) {
                uses.insert(arg.clone());
            }
        }
        if let Some(dest) = instr.dest() {
            defs.insert(dest.to_string());
        }
    }
    (uses, defs)
}

pub struct LiveVars;

impl Analysis for LiveVars {
    type Fact = LiveSet;

    fn direction(&self) -> Direction { Direction::Backward }

    fn bottom(&self) -> LiveSet { LiveSet::default() }

    fn meet(&self, facts: &[&LiveSet]) -> LiveSet {
        let mut met = LiveSet::default();
        for fact in facts {
            met.extend(fact.iter().cloned());
        }
        met
    }

    fn transfer(&self, block: &[Instr], live_out: &LiveSet) -> LiveSet {
        let (uses, defs) = uses_defs(block);
        let mut live_in = uses;
        live_in.extend(live_out.difference(&defs).cloned());
        live_in
    }
}

impl LocalPass for LiveVars {
    type Output = (BlockMap, DataflowResult<LiveSet>);

    fn run(&mut self, func: &Function) -> PassResult<Self::Output> { analyze(func) }
}

/// Run the liveness analysis over a function.
pub fn analyze(func: &Function) -> Result<(BlockMap, DataflowResult<LiveSet>), PassError> {
    let mut blocks = BlockMap::from_blocks(form_blocks(func.instrs.clone()));
    add_terminators(&mut blocks);
    let (preds, succs) =
        edges(&blocks).map_err(|err| PassError::analysis_error(DCE, err.into()))?;
    let result = dataflow::run(&LiveVars, &blocks, &preds, &succs);
    Ok((blocks, result))
}

/// Liveness-driven dead code elimination.
#[derive(Default)]
pub struct Dce;

impl LocalPassMut for Dce {
    type Output = ();

    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)> {
        let (mut blocks, result) = analyze(func)?;

        let mut changed = false;
        for label in blocks.labels().to_vec() {
            let mut alive = result.out_facts[&label].clone();
            let block = blocks.get_mut(&label).unwrap();

            let mut kept: Vec<Instr> = Vec::with_capacity(block.len());
            for instr in block.drain(..).rev() {
                let dead = matches!(instr.dest(), Some(dest) if !alive.contains(dest))
                    && instr.is_pure();
                if dead {
                    changed = true;
                    continue;
                }
                if let Some(dest) = instr.dest() {
                    alive.remove(dest);
                }
                alive.extend(instr.args().iter().cloned());
                kept.push(instr);
            }
            kept.reverse();
            *block = kept;
        }

        func.instrs = reassemble(&blocks);
        Ok(((), changed))
    }
}

impl GlobalPassMut for Dce {
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

impl TransformPass for Dce {
    fn register(passman: &mut PassManager) { passman.register_transform(DCE, Dce); }
}

/// Whole-stream dead code elimination: delete pure definitions whose
/// destination is used by no instruction anywhere in the function, and
/// iterate until nothing more falls out.
#[derive(Default)]
pub struct TrivialDce;

impl LocalPassMut for TrivialDce {
    type Output = ();

    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)> {
        let mut changed = false;
        loop {
            let mut used: FxHashSet<&str> = FxHashSet::default();
            for instr in &func.instrs {
                used.extend(instr.args().iter().map(String::as_str));
            }

            let before = func.instrs.len();
            let kept: Vec<Instr> = func
                .instrs
                .iter()
                .filter(|instr| {
                    !matches!(instr.dest(), Some(dest) if !used.contains(dest))
                        || !instr.is_pure()
                })
                .cloned()
                .collect();

            if kept.len() == before {
                break;
            }
            func.instrs = kept;
            changed = true;
        }
        Ok(((), changed))
    }
}

impl GlobalPassMut for TrivialDce {
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

impl TransformPass for TrivialDce {
    fn register(passman: &mut PassManager) {
        passman.register_transform(TRIVIAL_DCE, TrivialDce);
    }
}

/// Per-block dead store elimination: a pure definition overwritten later in
/// the same block with no intervening use is deleted.
#[derive(Default)]
pub struct LocalDce;

fn local_dce_block(block: &mut Vec<Instr>) -> bool {
    let mut changed = false;
    loop {
        let mut to_remove: FxHashSet<usize> = FxHashSet::default();
        // last unremoved pure definition of each variable
        let mut unused: FxHashMap<&str, usize> = FxHashMap::default();

        for (i, instr) in block.iter().enumerate() {
            for arg in instr.args() {
                unused.remove(arg.as_str());
            }
            if let Some(dest) = instr.dest() {
                if let Some(prev) = unused.remove(dest) {
                    to_remove.insert(prev);
                }
                if instr.is_pure() {
                    unused.insert(dest, i);
                }
            }
        }

        if to_remove.is_empty() {
            break;
        }
        let mut index = 0;
        block.retain(|_| {
            let keep = !to_remove.contains(&index);
            index += 1;
            keep
        });
        changed = true;
    }
    changed
}

impl LocalPassMut for LocalDce {
    type Output = ();

    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)> {
        let mut changed = false;
        let mut instrs = Vec::with_capacity(func.instrs.len());
        for mut block in form_blocks(std::mem::take(&mut func.instrs)) {
            changed |= local_dce_block(&mut block);
            instrs.extend(block);
        }
        func.instrs = instrs;
        Ok(((), changed))
    }
}

impl GlobalPassMut for LocalDce {
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

impl TransformPass for LocalDce {
    fn register(passman: &mut PassManager) { passman.register_transform(LOCAL_DCE, LocalDce); }
}
