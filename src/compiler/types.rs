use anyhow::bail;
use serde::{Deserialize, Serialize};

/// The family of scalar values an expression can evaluate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Int,
    UInt,
    Float,
    Bool,
}

/// The type of an expression in the IR. Only equality is ever checked at
/// definition time; the bit width is carried for the storage allocated by the
/// code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub kind: ScalarKind,
    pub bits: u8,
}
impl Type {
    pub const fn int(bits: u8) -> Self {
        Type {
            kind: ScalarKind::Int,
            bits,
        }
    }
    pub const fn uint(bits: u8) -> Self {
        Type {
            kind: ScalarKind::UInt,
            bits,
        }
    }
    pub const fn float(bits: u8) -> Self {
        Type {
            kind: ScalarKind::Float,
            bits,
        }
    }
    pub const fn bool() -> Self {
        Type {
            kind: ScalarKind::Bool,
            bits: 1,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.kind, ScalarKind::Bool)
    }
    pub fn is_float(&self) -> bool {
        matches!(self.kind, ScalarKind::Float)
    }
    pub fn is_int(&self) -> bool {
        matches!(self.kind, ScalarKind::Int | ScalarKind::UInt)
    }

    /// The number of bytes a single element of this type occupies in a buffer
    pub fn bytes(&self) -> usize {
        (self.bits as usize + 7) / 8
    }
}
impl Default for Type {
    fn default() -> Self {
        Type::int(32)
    }
}
impl std::convert::TryFrom<&str> for Type {
    type Error = anyhow::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let s = s.to_lowercase();
        if s == "bool" {
            return Ok(Type::bool());
        }
        let (kind, width) = if let Some(w) = s.strip_prefix("uint") {
            (ScalarKind::UInt, w)
        } else if let Some(w) = s.strip_prefix("int") {
            (ScalarKind::Int, w)
        } else if let Some(w) = s.strip_prefix("float") {
            (ScalarKind::Float, w)
        } else {
            bail!("unknown type: `{}`", s)
        };
        match width.parse::<u8>() {
            Ok(bits @ (8 | 16 | 32 | 64)) => Ok(Type { kind, bits }),
            _ => bail!("invalid bit width in `{}`", s),
        }
    }
}
impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.kind {
            ScalarKind::Int => write!(f, "int{}", self.bits),
            ScalarKind::UInt => write!(f, "uint{}", self.bits),
            ScalarKind::Float => write!(f, "float{}", self.bits),
            ScalarKind::Bool => write!(f, "bool"),
        }
    }
}
