//! # Constant Propagation
//!
//! Forward dataflow instance: the fact is a mapping from variable to its
//! known literal value, absence meaning "not constant". The meet keeps a
//! (variable, value) entry only when every predecessor agrees on it
//! exactly; an entry missing on any side or bound to a different value is
//! dropped. The transform rewrites arithmetic whose result the analysis
//! proved into the equivalent `const`.

use rustc_hash::FxHashMap;

use super::{
    dataflow::{self, Analysis, DataflowResult, Direction},
    GlobalPassMut, LocalPass, LocalPassMut, PassError, PassManager, PassResult, TransformPass,
};
use crate::{
    ir::{Function, Instr, Literal, Program, Type, ValueOp},
    utils::cfg::{add_terminators, edges, form_blocks, reassemble, BlockMap},
};

pub const CONST_PROP: &str = "const-prop";

/// Known constants at a program point.
pub type ConstMap = FxHashMap<String, Literal>;

/// Evaluate one arithmetic operation on known operands.
///
/// Division floors toward negative infinity. Division by zero and overflow
/// yield `None`: the destination becomes not-constant, the analysis
/// continues unaffected.
fn eval(op: ValueOp, lhs: Literal, rhs: Literal) -> Option<Literal> {
    let (x, y) = match (lhs, rhs) {
        (Literal::Int(x), Literal::Int(y)) => (x, y),
        (Literal::Bool(_), _) | (_, Literal::Bool(_)) => return None,
    };
    let result = match op {
        ValueOp::Add => x.checked_add(y)?,
        ValueOp::Sub => x.checked_sub(y)?,
        ValueOp::Mul => x.checked_mul(y)?,
        ValueOp::Div => floor_div(x, y)?,
        ValueOp::Eq
        | ValueOp::Lt
        | ValueOp::Gt
        | ValueOp::Le
        | ValueOp::Ge
        | ValueOp::Not
        | ValueOp::And
        | ValueOp::Or
        | ValueOp::Id
        | ValueOp::Call
        | ValueOp::Phi
        | ValueOp::Print
        | ValueOp::Nop => return None,
    };
    Some(Literal::Int(result))
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    if y == 0 {
        return None;
    }
    let q = x.checked_div(y)?;
    if x % y != 0 && (x < 0) != (y < 0) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn is_arith(op: ValueOp) -> bool {
    matches!(op, ValueOp::Add | ValueOp::Sub | ValueOp::Mul | ValueOp::Div)
}

/// Push the constant map through one block in instruction order.
pub fn fold_block(block: &[Instr], in_map: &ConstMap) -> ConstMap {
    let mut out = in_map.clone();
    for instr in block {
        match instr {
            Instr::Const { dest, value, .. } => {
                out.insert(dest.clone(), *value);
            }
            Instr::Value {
                op,
                dest: Some(dest),
                args,
                ..
            } if is_arith(*op) => {
                let known: Option<Vec<Literal>> =
                    args.iter().map(|arg| out.get(arg).copied()).collect();
                let folded = match known.as_deref() {
                    Some([lhs, rhs]) => eval(*op, *lhs, *rhs),
                    Some(_) | None => None,
                };
                match folded {
                    Some(value) => {
                        out.insert(dest.clone(), value);
                    }
                    None => {
                        out.remove(dest);
                    }
                }
            }
            Instr::Value { dest, .. } => {
                // anything else writing a destination makes it not-constant
                if let Some(dest) = dest {
                    out.remove(dest);
                }
            }
            Instr::Label { .. } | Instr::Ctrl { .. } => {}
        }
    }
    out
}

pub struct ConstAnalysis;

impl Analysis for ConstAnalysis {
    type Fact = ConstMap;

    fn direction(&self) -> Direction { Direction::Forward }

    fn bottom(&self) -> ConstMap { ConstMap::default() }

    fn meet(&self, facts: &[&ConstMap]) -> ConstMap {
        let Some((first, rest)) = facts.split_first() else {
            return ConstMap::default();
        };
        let mut met = (*first).clone();
        met.retain(|var, value| rest.iter().all(|fact| fact.get(var) == Some(value)));
        met
    }

    fn transfer(&self, block: &[Instr], fact: &ConstMap) -> ConstMap {
        fold_block(block, fact)
    }
}

impl LocalPass for ConstAnalysis {
    type Output = (BlockMap, DataflowResult<ConstMap>);

    fn run(&mut self, func: &Function) -> PassResult<Self::Output> { analyze(func) }
}

/// Run the analysis over a function and return the per-block entry/exit
/// constant maps.
pub fn analyze(func: &Function) -> Result<(BlockMap, DataflowResult<ConstMap>), PassError> {
    let mut blocks = BlockMap::from_blocks(form_blocks(func.instrs.clone()));
    add_terminators(&mut blocks);
    let (preds, succs) =
        edges(&blocks).map_err(|err| PassError::analysis_error(CONST_PROP, err.into()))?;
    let result = dataflow::run(&ConstAnalysis, &blocks, &preds, &succs);
    Ok((blocks, result))
}

/// The constant propagation transform: fold arithmetic into `const`.
#[derive(Default)]
pub struct ConstProp;

impl LocalPassMut for ConstProp {
    type Output = ();

    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)> {
        let (mut blocks, result) = analyze(func)?;

        let mut changed = false;
        for label in blocks.labels().to_vec() {
            let mut known = result.in_facts[&label].clone();
            let block = blocks.get_mut(&label).unwrap();
            for instr in block.iter_mut() {
                let replacement = match instr {
                    Instr::Value {
                        op,
                        dest: Some(dest),
                        ty,
                        args,
                        ..
                    } if is_arith(*op) => {
                        let lhs = args.first().and_then(|a| known.get(a).copied());
                        let rhs = args.get(1).and_then(|a| known.get(a).copied());
                        match (lhs, rhs) {
                            (Some(lhs), Some(rhs)) => eval(*op, lhs, rhs).map(|value| {
                                Instr::Const {
                                    dest: dest.clone(),
                                    ty: ty.or(Some(Type::Int)),
                                    value,
                                }
                            }),
                            (None, _) | (_, None) => None,
                        }
                    }
                    Instr::Label { .. }
                    | Instr::Const { .. }
                    | Instr::Value { .. }
                    | Instr::Ctrl { .. } => None,
                };
                if let Some(replacement) = replacement {
                    *instr = replacement;
                    changed = true;
                }
                known = fold_block(std::slice::from_ref(instr), &known);
            }
        }

        func.instrs = reassemble(&blocks);
        Ok(((), changed))
    }
}

impl GlobalPassMut for ConstProp {
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

impl TransformPass for ConstProp {
    fn register(passman: &mut PassManager) { passman.register_transform(CONST_PROP, ConstProp); }
}
