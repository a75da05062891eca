//! Card inventory extraction
//!
//! The Gwent collection lives in a fixed top-level section of the savegame.
//! Its children start with two metadata entries, followed by one
//! `cardIndex`/`numCopies` pair per owned card (interleaved with other per-card
//! fields), and end where the deck section begins at `SBSelectedDeckIndex`.

use crate::savegame::variable::{SaveGame, Variable};
use crate::{Result, TrackerError};
use serde::Serialize;

/// Position of the card collection among the top-level sections
pub const INVENTORY_SECTION: usize = 11;

/// Leading children of the collection section that precede the cards
pub const INVENTORY_HEADER_LEN: usize = 2;

/// First child after the card list
pub const INVENTORY_END_MARKER: &str = "SBSelectedDeckIndex";

pub const CARD_INDEX: &str = "cardIndex";
pub const NUM_COPIES: &str = "numCopies";

/// One owned card: its catalog index and how many copies the player holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CardInventoryEntry {
    pub index: i32,
    pub copies: i32,
}

impl CardInventoryEntry {
    pub fn new(index: i32, copies: i32) -> Self {
        CardInventoryEntry { index, copies }
    }
}

fn int_value(variable: &Variable, role: &str, position: usize) -> Result<i32> {
    match variable {
        Variable::Leaf { value, .. } => value.as_i32().ok_or_else(|| {
            TrackerError::layout(format!(
                "{role} at card slot {position} holds {} {value}, not a 32-bit integer",
                value.type_name()
            ))
        }),
        Variable::Block { name, .. } => Err(TrackerError::layout(format!(
            "{role} at card slot {position} is a block ('{name}'), expected a value"
        ))),
    }
}

/// Extract the owned cards, in file order
pub fn extract_inventory(save: &SaveGame) -> Result<Vec<CardInventoryEntry>> {
    let section = save.section(INVENTORY_SECTION).ok_or_else(|| {
        TrackerError::layout(format!(
            "savegame has {} top-level sections, card collection expected at \
             position {INVENTORY_SECTION}",
            save.sections.len()
        ))
    })?;

    let children = match section {
        Variable::Block { children, .. } => children,
        Variable::Leaf { name, .. } => {
            return Err(TrackerError::layout(format!(
                "section {INVENTORY_SECTION} ('{name}') is a value, \
                 expected the card collection block"
            )))
        }
    };

    let fields: Vec<&Variable> = children
        .iter()
        .skip(INVENTORY_HEADER_LEN)
        .take_while(|child| child.name() != INVENTORY_END_MARKER)
        .filter(|child| matches!(child.name(), CARD_INDEX | NUM_COPIES))
        .collect();

    if fields.len() % 2 != 0 {
        return Err(TrackerError::layout(format!(
            "card collection has {} {CARD_INDEX}/{NUM_COPIES} fields, which do not pair up",
            fields.len()
        )));
    }

    let entries = fields
        .chunks_exact(2)
        .enumerate()
        .map(|(slot, pair)| {
            Ok(CardInventoryEntry {
                index: int_value(pair[0], CARD_INDEX, slot)?,
                copies: int_value(pair[1], NUM_COPIES, slot)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(cards = entries.len(), "extracted card inventory");
    Ok(entries)
}
