use serde::{Deserialize, Serialize};

use super::parse::RawInstr;

/// A literal constant value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
}

/// A primitive type annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    Bool,
}

/// Operations that compute (or produce an effect through) values.
///
/// `call` and `print` are the impure ones; everything else is free of
/// externally observable effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Not,
    And,
    Or,
    Id,
    Call,
    Phi,
    Print,
    Nop,
}

impl ValueOp {
    pub fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "add" => Self::Add,
            "sub" => Self::Sub,
            "mul" => Self::Mul,
            "div" => Self::Div,
            "eq" => Self::Eq,
            "lt" => Self::Lt,
            "gt" => Self::Gt,
            "le" => Self::Le,
            "ge" => Self::Ge,
            "not" => Self::Not,
            "and" => Self::And,
            "or" => Self::Or,
            "id" => Self::Id,
            "call" => Self::Call,
            "phi" => Self::Phi,
            "print" => Self::Print,
            "nop" => Self::Nop,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Eq => "eq",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
            Self::Id => "id",
            Self::Call => "call",
            Self::Phi => "phi",
            Self::Print => "print",
            Self::Nop => "nop",
        }
    }

    /// Whether the operation has no externally observable effect.
    pub fn is_pure(self) -> bool { !matches!(self, Self::Call | Self::Print) }
}

/// Control transfer operations. Every normalized block ends with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlOp {
    Jmp,
    Br,
    Ret,
}

impl CtrlOp {
    pub fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "jmp" => Self::Jmp,
            "br" => Self::Br,
            "ret" => Self::Ret,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jmp => "jmp",
            Self::Br => "br",
            Self::Ret => "ret",
        }
    }
}

/// A single IR instruction, a closed sum over the four syntactic kinds.
///
/// Unknown operations are rejected at parse time as
/// [`MalformedProgram`](super::MalformedProgram); the rest of the crate can
/// match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInstr", into = "RawInstr")]
pub enum Instr {
    /// A label marker in the flat stream.
    Label { label: String },
    /// A literal definition.
    Const {
        dest: String,
        ty: Option<Type>,
        value: Literal,
    },
    /// A computation; `dest` is absent for effect-only ops like `print`.
    Value {
        op: ValueOp,
        dest: Option<String>,
        ty: Option<Type>,
        args: Vec<String>,
        funcs: Vec<String>,
        /// Predecessor labels, carried by `phi` only.
        labels: Vec<String>,
    },
    /// A control transfer: `jmp`, `br`, or `ret`.
    Ctrl {
        op: CtrlOp,
        args: Vec<String>,
        labels: Vec<String>,
    },
}

impl Instr {
    /// An unconditional jump to `target`.
    pub fn jmp(target: impl Into<String>) -> Self {
        Self::Ctrl {
            op: CtrlOp::Jmp,
            args: Vec::new(),
            labels: vec![target.into()],
        }
    }

    /// A bare return.
    pub fn ret() -> Self {
        Self::Ctrl {
            op: CtrlOp::Ret,
            args: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// The destination variable, if this instruction writes one.
    pub fn dest(&self) -> Option<&str> {
        match self {
            Self::Const { dest, .. } => Some(dest),
            Self::Value { dest, .. } => dest.as_deref(),
            Self::Label { .. } | Self::Ctrl { .. } => None,
        }
    }

    /// The operand variables read by this instruction.
    pub fn args(&self) -> &[String] {
        match self {
            Self::Value { args, .. } | Self::Ctrl { args, .. } => args,
            Self::Label { .. } | Self::Const { .. } => &[],
        }
    }

    pub fn is_ctrl(&self) -> bool { matches!(self, Self::Ctrl { .. }) }

    /// Whether deleting this instruction can never change observable
    /// behavior on its own. Control transfers are never pure.
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Label { .. } | Self::Const { .. } => true,
            Self::Value { op, .. } => op.is_pure(),
            Self::Ctrl { .. } => false,
        }
    }
}
