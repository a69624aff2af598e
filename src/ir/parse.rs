//! JSON (de)serialization of program documents.
//!
//! Instructions travel through [`RawInstr`], an all-optional-fields mirror
//! of the wire format. Conversion into the typed [`Instr`] rejects missing
//! required fields and unknown operations instead of letting them flow into
//! the passes.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    inst::{CtrlOp, Instr, Literal, Type, ValueOp},
    Program,
};

/// A fatal shape error in a program document.
#[derive(Debug, Error)]
pub enum MalformedProgram {
    #[error("instruction missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown operation `{0}`")]
    UnknownOp(String),

    #[error("control transfer targets unknown label `{0}`")]
    DanglingLabel(String),

    #[error("malformed program document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The wire shape of an instruction: every field optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawInstr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dest: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    ty: Option<Type>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    funcs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl TryFrom<RawInstr> for Instr {
    type Error = MalformedProgram;

    fn try_from(raw: RawInstr) -> Result<Self, MalformedProgram> {
        if let Some(label) = raw.label {
            return Ok(Instr::Label { label });
        }

        let op = raw.op.ok_or(MalformedProgram::MissingField("op"))?;

        if op == "const" {
            let dest = raw.dest.ok_or(MalformedProgram::MissingField("dest"))?;
            let value = raw.value.ok_or(MalformedProgram::MissingField("value"))?;
            return Ok(Instr::Const {
                dest,
                ty: raw.ty,
                value,
            });
        }

        if let Some(op) = CtrlOp::from_str(&op) {
            return Ok(Instr::Ctrl {
                op,
                args: raw.args,
                labels: raw.labels,
            });
        }

        let op = ValueOp::from_str(&op).ok_or(MalformedProgram::UnknownOp(op))?;
        // pure computations must name their result; only effectful ops and
        // `nop` legitimately write nothing
        if raw.dest.is_none() && op.is_pure() && op != ValueOp::Nop {
            return Err(MalformedProgram::MissingField("dest"));
        }
        Ok(Instr::Value {
            op,
            dest: raw.dest,
            ty: raw.ty,
            args: raw.args,
            funcs: raw.funcs,
            labels: raw.labels,
        })
    }
}

impl From<Instr> for RawInstr {
    fn from(instr: Instr) -> Self {
        let mut raw = RawInstr {
            op: None,
            dest: None,
            ty: None,
            args: Vec::new(),
            funcs: Vec::new(),
            labels: Vec::new(),
            value: None,
            label: None,
        };
        match instr {
            Instr::Label { label } => raw.label = Some(label),
            Instr::Const { dest, ty, value } => {
                raw.op = Some("const".into());
                raw.dest = Some(dest);
                raw.ty = ty;
                raw.value = Some(value);
            }
            Instr::Value {
                op,
                dest,
                ty,
                args,
                funcs,
                labels,
            } => {
                raw.op = Some(op.as_str().into());
                raw.dest = dest;
                raw.ty = ty;
                raw.args = args;
                raw.funcs = funcs;
                raw.labels = labels;
            }
            Instr::Ctrl { op, args, labels } => {
                raw.op = Some(op.as_str().into());
                raw.args = args;
                raw.labels = labels;
            }
        }
        raw
    }
}

/// Read one full program document from `reader`.
pub fn read_program(reader: impl io::Read) -> Result<Program, MalformedProgram> {
    Ok(serde_json::from_reader(reader)?)
}

/// Write one full program document to `writer`.
pub fn write_program(writer: impl io::Write, program: &Program) -> Result<(), MalformedProgram> {
    serde_json::to_writer_pretty(writer, program)?;
    Ok(())
}
