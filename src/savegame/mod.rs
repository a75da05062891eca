//! Savegame decoding
//!
//! A savegame file is an optional chunked LZ4 [`container`] around a stream
//! with this layout (integers little-endian):
//!
//! ```text
//! header        "SAV3" type_code1:u32 type_code2:u32 type_code3:u32
//! payload       top-level variable records
//! string table  "MANU" count:u32 reserved:u32 count*(len:u8 bytes) "ENOD"
//! var index     "RB" count:u32 count*(offset:u32 size:u32)
//! footer        string_table_offset:u32 variable_index_offset:u32 "SE"
//! ```
//!
//! Variable records reference names and type names by string-table index:
//!
//! ```text
//! "BLCK" name:u16 size:u32 children[size]
//! "VL"   name:u16 type:u16 value
//! "OP"   name:u16 type:u16 value
//! "AVAL" name:u16 type:u16 extra:u32 value
//! "PORP" name:u16 type:u16 size:u32 value[size]
//! ```
//!
//! The section markers above are the ones the game writes. Three details are
//! assumptions that have not been checked against a decoder for real saves:
//! name indices count from 0, string-table entries carry a u8 length, and
//! `String` values carry a u16 length. If saves from the game fail with
//! "name index ... outside string table" or a UTF-8 error, revisit these
//! first.

pub mod container;
pub mod inventory;
pub mod reader;
pub mod variable;
pub mod writer;

pub use inventory::{extract_inventory, CardInventoryEntry};
pub use reader::parse_savegame;
pub use variable::{LeafTag, SaveGame, Value, Variable};

use crate::Result;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File extension the game uses for savegames
pub const SAVE_EXTENSION: &str = "sav";

impl SaveGame {
    /// Decode a savegame from raw file contents (compressed or not)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let stream = container::unpack(data)?;
        parse_savegame(&stream)
    }

    /// Read and decode a savegame file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "read savegame");
        Self::from_bytes(&data)
    }
}

/// Read a savegame and pull out its card inventory
///
/// The decoded tree is dropped once the entries are extracted.
pub fn read_inventory(path: &Path) -> Result<Vec<CardInventoryEntry>> {
    let save = SaveGame::load(path)?;
    extract_inventory(&save)
}

/// Find the most recently modified savegame under `dir`
pub fn latest_save(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Savegame folder not found: {}", dir.display()),
        )
        .into());
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in jwalk::WalkDir::new(dir).skip_hidden(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry while scanning saves: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(SAVE_EXTENSION) {
            continue;
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_save_requires_directory() {
        let missing = std::env::temp_dir().join("gwent-tracker-no-such-dir");
        assert!(latest_save(&missing).is_err());
    }

    #[test]
    fn test_from_bytes_accepts_compressed_container() {
        let save = SaveGame::new(vec![Variable::leaf("x", Value::Int32(4))]);
        let stream = save.to_bytes().unwrap();
        let packed = container::compress(&stream, 16);
        assert_eq!(SaveGame::from_bytes(&packed).unwrap(), save);
    }
}
