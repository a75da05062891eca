//! Variable tree model
//!
//! A savegame is a tree of named variables. Blocks hold ordered children,
//! leaves hold a single typed scalar.

use serde::Serialize;
use std::fmt;

/// Record tag a leaf was stored under
///
/// The tag does not change how the value is interpreted, but the writer needs
/// it to reproduce the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeafTag {
    /// `VL` record
    Vl,
    /// `OP` record
    Op,
    /// `AVAL` record with its opaque extra word
    Aval(u32),
    /// `PORP` record (value length stored inline)
    Porp,
}

impl LeafTag {
    pub fn magic(&self) -> &'static [u8] {
        match self {
            LeafTag::Vl => b"VL",
            LeafTag::Op => b"OP",
            LeafTag::Aval(_) => b"AVAL",
            LeafTag::Porp => b"PORP",
        }
    }
}

/// Scalar payload of a leaf variable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    String(String),
    /// Interned name, resolved through the string table
    CName(String),
    /// Payload of a type the reader does not interpret (only possible when
    /// the record declares its own length)
    Raw { type_name: String, bytes: Vec<u8> },
}

impl Value {
    /// Type name as it appears in the savegame string table
    pub fn type_name(&self) -> &str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int8(_) => "Int8",
            Value::UInt8(_) => "Uint8",
            Value::Int16(_) => "Int16",
            Value::UInt16(_) => "Uint16",
            Value::Int32(_) => "Int32",
            Value::UInt32(_) => "Uint32",
            Value::Int64(_) => "Int64",
            Value::UInt64(_) => "Uint64",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::CName(_) => "CName",
            Value::Raw { type_name, .. } => type_name,
        }
    }

    /// Interpret the scalar as a 32-bit signed integer
    ///
    /// Narrower integers widen; wider ones only convert when they fit.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int8(v) => Some(v as i32),
            Value::UInt8(v) => Some(v as i32),
            Value::Int16(v) => Some(v as i32),
            Value::UInt16(v) => Some(v as i32),
            Value::Int32(v) => Some(v),
            Value::UInt32(v) => i32::try_from(v).ok(),
            Value::Int64(v) => i32::try_from(v).ok(),
            Value::UInt64(v) => i32::try_from(v).ok(),
            Value::Bool(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::CName(_)
            | Value::Raw { .. } => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::CName(v) => write!(f, "'{v}'"),
            Value::Raw { bytes, .. } => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// A named node in the savegame tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Variable {
    Block {
        name: String,
        children: Vec<Variable>,
    },
    Leaf {
        name: String,
        tag: LeafTag,
        value: Value,
    },
}

impl Variable {
    pub fn block(name: impl Into<String>, children: Vec<Variable>) -> Self {
        Variable::Block {
            name: name.into(),
            children,
        }
    }

    /// Leaf stored as a plain `VL` record
    pub fn leaf(name: impl Into<String>, value: Value) -> Self {
        Variable::Leaf {
            name: name.into(),
            tag: LeafTag::Vl,
            value,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Variable::Block { name, .. } | Variable::Leaf { name, .. } => name,
        }
    }

    pub fn children(&self) -> Option<&[Variable]> {
        match self {
            Variable::Block { children, .. } => Some(children),
            Variable::Leaf { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Variable::Block { .. } => None,
            Variable::Leaf { value, .. } => Some(value),
        }
    }

    /// Total number of nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        match self {
            Variable::Block { children, .. } => {
                1 + children.iter().map(Variable::node_count).sum::<usize>()
            }
            Variable::Leaf { .. } => 1,
        }
    }
}

/// A decoded savegame: the header type codes and the top-level sections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveGame {
    pub type_codes: [u32; 3],
    pub sections: Vec<Variable>,
}

impl SaveGame {
    pub fn new(sections: Vec<Variable>) -> Self {
        SaveGame {
            type_codes: [0; 3],
            sections,
        }
    }

    pub fn section(&self, position: usize) -> Option<&Variable> {
        self.sections.get(position)
    }

    pub fn node_count(&self) -> usize {
        self.sections.iter().map(Variable::node_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_i32_widening_and_range() {
        assert_eq!(Value::UInt8(200).as_i32(), Some(200));
        assert_eq!(Value::Int16(-3).as_i32(), Some(-3));
        assert_eq!(Value::UInt32(7).as_i32(), Some(7));
        assert_eq!(Value::UInt32(u32::MAX).as_i32(), None);
        assert_eq!(Value::Int64(i64::MIN).as_i32(), None);
        assert_eq!(Value::Float(1.0).as_i32(), None);
        assert_eq!(Value::CName("cardIndex".into()).as_i32(), None);
    }

    #[test]
    fn test_node_count() {
        let tree = Variable::block(
            "root",
            vec![
                Variable::leaf("a", Value::Int32(1)),
                Variable::block("inner", vec![Variable::leaf("b", Value::Bool(true))]),
            ],
        );
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.children().map(|c| c.len()), Some(2));
        assert!(tree.value().is_none());
    }
}
