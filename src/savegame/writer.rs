//! Savegame stream writer
//!
//! Encodes a [`SaveGame`] into the uncompressed stream layout read by
//! [`parse_savegame`](crate::savegame::reader::parse_savegame). Used to build
//! fixtures and test data.

use crate::savegame::variable::{LeafTag, SaveGame, Value, Variable};
use crate::{Result, TrackerError};
use rustc_hash::FxHashMap;

/// Interned names and type names, in first-seen order
#[derive(Default)]
struct StringTable {
    strings: Vec<String>,
    lookup: FxHashMap<String, u16>,
}

impl StringTable {
    fn intern(&mut self, s: &str) -> Result<u16> {
        if let Some(&index) = self.lookup.get(s) {
            return Ok(index);
        }
        if s.len() > u8::MAX as usize {
            return Err(TrackerError::layout(format!(
                "name '{s}' is longer than 255 bytes"
            )));
        }
        let index = u16::try_from(self.strings.len())
            .map_err(|_| TrackerError::layout("more than 65536 distinct names"))?;
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), index);
        Ok(index)
    }

    fn index(&self, s: &str) -> u16 {
        self.lookup[s]
    }

    fn collect(&mut self, variable: &Variable) -> Result<()> {
        match variable {
            Variable::Block { name, children } => {
                self.intern(name)?;
                for child in children {
                    self.collect(child)?;
                }
            }
            Variable::Leaf { name, value, .. } => {
                self.intern(name)?;
                self.intern(value.type_name())?;
                if let Value::CName(target) = value {
                    self.intern(target)?;
                }
            }
        }
        Ok(())
    }
}

struct Writer {
    out: Vec<u8>,
    table: StringTable,
}

impl Writer {
    fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn name(&mut self, s: &str) {
        let index = self.table.index(s);
        self.u16(index);
    }

    fn len32(len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| TrackerError::layout("record larger than 4 GiB"))
    }

    fn variable(&mut self, variable: &Variable) -> Result<()> {
        match variable {
            Variable::Block { name, children } => {
                self.out.extend_from_slice(b"BLCK");
                self.name(name);
                let size_at = self.out.len();
                self.u32(0);
                let body_start = self.out.len();
                for child in children {
                    self.variable(child)?;
                }
                let size = Self::len32(self.out.len() - body_start)?;
                self.out[size_at..size_at + 4].copy_from_slice(&size.to_le_bytes());
            }
            Variable::Leaf { name, tag, value } => {
                self.out.extend_from_slice(tag.magic());
                self.name(name);
                self.name(value.type_name());
                match *tag {
                    LeafTag::Vl | LeafTag::Op => self.value(value)?,
                    LeafTag::Aval(extra) => {
                        self.u32(extra);
                        self.value(value)?;
                    }
                    LeafTag::Porp => {
                        let size_at = self.out.len();
                        self.u32(0);
                        let start = self.out.len();
                        self.value(value)?;
                        let size = Self::len32(self.out.len() - start)?;
                        self.out[size_at..size_at + 4].copy_from_slice(&size.to_le_bytes());
                    }
                }
            }
        }
        Ok(())
    }

    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Bool(v) => self.out.push(u8::from(*v)),
            Value::Int8(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt8(v) => self.out.push(*v),
            Value::Int16(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt16(v) => self.u16(*v),
            Value::Int32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt32(v) => self.u32(*v),
            Value::Int64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Value::Float(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Value::String(s) => {
                let len = u16::try_from(s.len())
                    .map_err(|_| TrackerError::layout("string value longer than 65535 bytes"))?;
                self.u16(len);
                self.out.extend_from_slice(s.as_bytes());
            }
            Value::CName(target) => self.name(target),
            Value::Raw { bytes, .. } => self.out.extend_from_slice(bytes),
        }
        Ok(())
    }
}

/// Encode a savegame tree as an uncompressed stream
pub fn encode(save: &SaveGame) -> Result<Vec<u8>> {
    let mut table = StringTable::default();
    for section in &save.sections {
        table.collect(section)?;
    }

    let mut w = Writer {
        out: Vec::new(),
        table,
    };
    w.out.extend_from_slice(b"SAV3");
    for code in save.type_codes {
        w.u32(code);
    }

    let mut index = Vec::with_capacity(save.sections.len());
    for section in &save.sections {
        let start = w.out.len();
        w.variable(section)?;
        index.push((Writer::len32(start)?, Writer::len32(w.out.len() - start)?));
    }

    let strings_at = Writer::len32(w.out.len())?;
    w.out.extend_from_slice(b"MANU");
    w.u32(Writer::len32(w.table.strings.len())?);
    w.u32(0);
    let strings = std::mem::take(&mut w.table.strings);
    for s in &strings {
        w.out.push(s.len() as u8);
        w.out.extend_from_slice(s.as_bytes());
    }
    w.out.extend_from_slice(b"ENOD");

    let index_at = Writer::len32(w.out.len())?;
    w.out.extend_from_slice(b"RB");
    w.u32(Writer::len32(index.len())?);
    for (offset, size) in index {
        w.u32(offset);
        w.u32(size);
    }

    w.u32(strings_at);
    w.u32(index_at);
    w.out.extend_from_slice(b"SE");

    Ok(w.out)
}

impl SaveGame {
    /// Encode this tree as an uncompressed savegame stream
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_markers() {
        let save = SaveGame::new(vec![Variable::block(
            "inventory",
            vec![Variable::leaf("cardIndex", Value::Int32(7))],
        )]);
        let bytes = encode(&save).unwrap();

        assert!(bytes.starts_with(b"SAV3"));
        assert!(bytes.ends_with(b"SE"));
        // BLCK, name index 0, size = one VL record (2 + 2 + 2 + 4)
        assert_eq!(&bytes[16..20], b"BLCK");
        assert_eq!(&bytes[20..22], &0u16.to_le_bytes());
        assert_eq!(&bytes[22..26], &10u32.to_le_bytes());
        assert_eq!(&bytes[26..28], b"VL");
    }

    #[test]
    fn test_names_are_interned_once() {
        let save = SaveGame::new(vec![
            Variable::leaf("numCopies", Value::Int32(1)),
            Variable::leaf("numCopies", Value::Int32(2)),
        ]);
        let bytes = encode(&save).unwrap();
        let count = bytes
            .windows("numCopies".len())
            .filter(|w| *w == b"numCopies")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let save = SaveGame::new(vec![Variable::leaf("x".repeat(300), Value::Bool(true))]);
        assert!(encode(&save).is_err());
    }
}
