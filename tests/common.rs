#![allow(dead_code)]

use tacopt::ir::{Function, Instr, Program};

/// Parse a test program from literal JSON.
pub fn parse_program(value: serde_json::Value) -> Program {
    serde_json::from_value(value).expect("test program should parse")
}

/// Parse a single function from literal JSON.
pub fn parse_fn(value: serde_json::Value) -> Function {
    serde_json::from_value(value).expect("test function should parse")
}

/// The operation name of every instruction in stream order, labels
/// included as `"label"`.
pub fn op_names(func: &Function) -> Vec<&'static str> {
    func.instrs
        .iter()
        .map(|instr| match instr {
            Instr::Label { .. } => "label",
            Instr::Const { .. } => "const",
            Instr::Value { op, .. } => op.as_str(),
            Instr::Ctrl { op, .. } => op.as_str(),
        })
        .collect()
}

/// Every destination written in the function, in stream order.
pub fn dests(func: &Function) -> Vec<String> {
    func.instrs
        .iter()
        .filter_map(|instr| instr.dest().map(str::to_string))
        .collect()
}

/// Whether some instruction in the function writes `dest`.
pub fn defines(func: &Function, dest: &str) -> bool {
    func.instrs.iter().any(|instr| instr.dest() == Some(dest))
}

/// The instructions of the block introduced by `label`, up to the next
/// label marker.
pub fn block_of<'a>(func: &'a Function, label: &str) -> Vec<&'a Instr> {
    let mut in_block = false;
    let mut instrs = Vec::new();
    for instr in &func.instrs {
        match instr {
            Instr::Label { label: l } => in_block = l == label,
            Instr::Const { .. } | Instr::Value { .. } | Instr::Ctrl { .. } => {
                if in_block {
                    instrs.push(instr);
                }
            }
        }
    }
    instrs
}
