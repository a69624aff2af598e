//! # Single-Assignment Conversion
//!
//! Rewrites a function so every variable has exactly one static
//! definition: phi insertion at the dominance frontier of every definition
//! site, then renaming along the dominator tree. Variables with no
//! definition on some incoming path materialize the distinguished name
//! `__undefined`.
//!
//! The conversion is a one-shot canonicalization run before the loop
//! passes; it is what makes the single-definition check of
//! [`invariant_motion`](crate::passes::loops::invariant_motion) meaningful.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    GlobalPassMut, LocalPassMut, PassError, PassManager, PassResult, TransformPass,
};
use crate::{
    ir::{Function, Instr, Program, Type, ValueOp},
    utils::{
        cfg::{add_entry, add_terminators, edges, form_blocks, reassemble, successor_map, BlockMap, EdgeMap},
        dominance::{dominance_frontiers, dominator_sets, immediate_dominators},
    },
};

pub const TO_SSA: &str = "to-ssa";

/// The operand name for a variable undefined on an incoming path.
pub const UNDEFINED: &str = "__undefined";

#[derive(Debug)]
struct PhiNode {
    /// The pre-SSA variable this phi merges.
    orig: String,
    /// The renamed destination, fixed during renaming.
    dest: String,
    ty: Option<Type>,
    /// One (predecessor label, renamed operand) pair per visited
    /// predecessor.
    args: Vec<(String, String)>,
}

#[derive(Default)]
pub struct ToSsa;

struct Renamer {
    blocks: BlockMap,
    succs: EdgeMap,
    children: FxHashMap<String, Vec<String>>,
    phis: FxHashMap<String, Vec<PhiNode>>,
    stacks: FxHashMap<String, Vec<String>>,
    counters: FxHashMap<String, usize>,
}

fn fresh(counters: &mut FxHashMap<String, usize>, var: &str) -> String {
    let counter = counters.entry(var.to_string()).or_default();
    *counter += 1;
    format!("{var}.{counter}")
}

fn top_of(stacks: &FxHashMap<String, Vec<String>>, var: &str) -> String {
    stacks
        .get(var)
        .and_then(|stack| stack.last())
        .cloned()
        .unwrap_or_else(|| UNDEFINED.to_string())
}

impl Renamer {
    fn rename_block(&mut self, label: &str) {
        // remember what this frame pushed so it can be popped on the way
        // back up the dominator tree
        let mut pushed: Vec<String> = Vec::new();

        if let Some(phis) = self.phis.get_mut(label) {
            for phi in phis.iter_mut() {
                let name = fresh(&mut self.counters, &phi.orig);
                self.stacks
                    .entry(phi.orig.clone())
                    .or_default()
                    .push(name.clone());
                pushed.push(phi.orig.clone());
                phi.dest = name;
            }
        }

        let block = self.blocks.get_mut(label).unwrap();
        for instr in block.iter_mut() {
            match instr {
                Instr::Value { args, .. } | Instr::Ctrl { args, .. } => {
                    for arg in args.iter_mut() {
                        *arg = top_of(&self.stacks, arg);
                    }
                }
                Instr::Label { .. } | Instr::Const { .. } => {}
            }
            match instr {
                Instr::Const { dest, .. }
                | Instr::Value {
                    dest: Some(dest), ..
                } => {
                    let name = fresh(&mut self.counters, dest);
                    self.stacks
                        .entry(dest.clone())
                        .or_default()
                        .push(name.clone());
                    pushed.push(std::mem::replace(dest, name));
                }
                Instr::Label { .. } | Instr::Value { dest: None, .. } | Instr::Ctrl { .. } => {}
            }
        }

        for succ in self.succs[label].clone() {
            if let Some(phis) = self.phis.get_mut(&succ) {
                for phi in phis.iter_mut() {
                    let name = top_of(&self.stacks, &phi.orig);
                    phi.args.push((label.to_string(), name));
                }
            }
        }

        for child in self.children.get(label).cloned().unwrap_or_default() {
            self.rename_block(&child);
        }

        for var in pushed.into_iter().rev() {
            self.stacks.get_mut(&var).unwrap().pop();
        }
    }
}

fn convert_function(func: &mut Function) -> Result<(), PassError> {
    let mut blocks = BlockMap::from_blocks(form_blocks(func.instrs.clone()));
    if blocks.labels().is_empty() {
        return Ok(());
    }
    add_entry(&mut blocks);
    add_terminators(&mut blocks);

    // validate the branch targets before the dominance solver sees the
    // graph; the conversion itself never needs the predecessor map
    edges(&blocks).map_err(|err| PassError::analysis_error(TO_SSA, err.into()))?;

    let succs = successor_map(&blocks);
    let entry = blocks.entry().to_string();
    let doms = dominator_sets(&succs, &entry);
    let idoms = immediate_dominators(&doms, &succs, &entry);
    let frontiers = dominance_frontiers(&doms, &succs, &entry);

    // definition sites and declared types, function parameters included
    let mut defs: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    let mut types: FxHashMap<String, Option<Type>> = FxHashMap::default();
    for param in &func.args {
        defs.entry(param.name.clone()).or_default().insert(entry.clone());
        types.entry(param.name.clone()).or_insert(Some(param.ty));
    }
    for (label, block) in blocks.iter() {
        for instr in block {
            let ty = match instr {
                Instr::Const { ty, .. } | Instr::Value { ty, .. } => *ty,
                Instr::Label { .. } | Instr::Ctrl { .. } => None,
            };
            if let Some(dest) = instr.dest() {
                defs.entry(dest.to_string()).or_default().insert(label.clone());
                let slot = types.entry(dest.to_string()).or_insert(ty);
                if slot.is_none() {
                    *slot = ty;
                }
            }
        }
    }

    // phi insertion at the iterated dominance frontier of each variable's
    // definition sites
    let mut phis: FxHashMap<String, Vec<PhiNode>> = FxHashMap::default();
    let mut vars: Vec<&String> = defs.keys().collect();
    vars.sort();
    for var in vars {
        let def_blocks = &defs[var];
        let mut placed: FxHashSet<String> = FxHashSet::default();
        let mut worklist: Vec<String> = def_blocks.iter().cloned().collect();
        worklist.sort();
        while let Some(d) = worklist.pop() {
            let Some(frontier) = frontiers.get(&d) else { continue };
            let mut frontier: Vec<&String> = frontier.iter().collect();
            frontier.sort();
            for f in frontier {
                if placed.insert(f.clone()) {
                    phis.entry(f.clone()).or_default().push(PhiNode {
                        orig: var.clone(),
                        dest: var.clone(),
                        ty: types.get(var).copied().flatten(),
                        args: Vec::new(),
                    });
                    if !def_blocks.contains(f) {
                        worklist.push(f.clone());
                    }
                }
            }
        }
    }

    // rename along the dominator tree
    let mut children: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for (label, idom) in &idoms {
        if let Some(idom) = idom {
            children.entry(idom.clone()).or_default().push(label.clone());
        }
    }
    for siblings in children.values_mut() {
        siblings.sort();
    }

    let mut stacks: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for param in &func.args {
        stacks.insert(param.name.clone(), vec![param.name.clone()]);
    }

    let mut renamer = Renamer {
        blocks,
        succs,
        children,
        phis,
        stacks,
        counters: FxHashMap::default(),
    };
    renamer.rename_block(&entry);

    // materialize the phis at the head of their blocks, keyed by the
    // predecessor labels recorded during renaming
    let Renamer {
        mut blocks, phis, ..
    } = renamer;
    for (label, nodes) in phis {
        let mut head: Vec<Instr> = Vec::with_capacity(nodes.len());
        for phi in nodes {
            let (labels, args): (Vec<String>, Vec<String>) = phi.args.into_iter().unzip();
            head.push(Instr::Value {
                op: ValueOp::Phi,
                dest: Some(phi.dest),
                ty: phi.ty,
                args,
                funcs: Vec::new(),
                labels,
            });
        }
        let block = blocks.get_mut(&label).unwrap();
        block.splice(0..0, head);
    }

    func.instrs = reassemble(&blocks);
    Ok(())
}

impl LocalPassMut for ToSsa {
    type Output = ();

    /// Runs once; the conversion renames unconditionally, so it reports no
    /// change and pipelines do not re-run it.
    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)> {
        convert_function(func)?;
        Ok(((), false))
    }
}

impl GlobalPassMut for ToSsa {
    type Output = ();

    fn run(&mut self, program: &mut Program) -> PassResult<(Self::Output, bool)> {
        for func in &mut program.functions {
            let ((), _) = LocalPassMut::run(self, func)?;
        }
        Ok(((), false))
    }
}

impl TransformPass for ToSsa {
    fn register(passman: &mut PassManager) { passman.register_transform(TO_SSA, ToSsa); }
}
