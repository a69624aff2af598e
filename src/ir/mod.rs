//! # Three-Address Intermediate Representation
//!
//! The IR is a flat, unstructured instruction stream. A program is a set of
//! functions, each function an ordered sequence of instructions. Structure
//! (basic blocks, edges) is derived on demand by the utilities in
//! [`crate::utils::cfg`] and discarded after each pass reassembles the
//! stream.

mod inst;
mod parse;

pub use inst::{CtrlOp, Instr, Literal, Type, ValueOp};
pub use parse::{read_program, write_program, MalformedProgram};

use serde::{Deserialize, Serialize};

/// A formal parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// A function: a name plus a flat instruction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<FuncParam>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    pub instrs: Vec<Instr>,
}

/// A whole program document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
}
