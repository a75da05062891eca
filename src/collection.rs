//! Player collection state
//!
//! Combines the static catalog with the inventory decoded from a savegame.

use crate::catalog::{CardRecord, Catalog, Deck, MissableGroup, MissableStatus};
use crate::savegame::CardInventoryEntry;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Ownership of one card as seen by the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardStatus {
    pub obtained: bool,
    pub copies: Option<i32>,
}

/// What an inventory merge touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MergeSummary {
    /// Entries that matched a catalog record
    pub matched: usize,
    /// Entries whose index is not in the catalog
    pub unknown: usize,
}

/// Criteria for listing cards; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub name: Option<String>,
    pub deck: Option<Deck>,
    pub obtained: Option<bool>,
}

impl CardFilter {
    pub fn matches(&self, card: &CardRecord) -> bool {
        self.name.as_deref().map_or(true, |n| card.name_matches(n))
            && self.deck.as_ref().map_or(true, |d| *d == card.deck)
            && self.obtained.map_or(true, |o| o == card.obtained)
    }
}

#[derive(Debug, Clone)]
pub struct Collection {
    cards: Vec<CardRecord>,
    by_index: FxHashMap<i32, usize>,
    missables: Vec<MissableGroup>,
    /// Missable statuses as loaded, before any savegame was applied
    loaded_status: Vec<MissableStatus>,
}

impl Collection {
    pub fn new(catalog: Catalog) -> Self {
        let by_index = catalog
            .cards
            .iter()
            .enumerate()
            .map(|(pos, card)| (card.index, pos))
            .collect();
        let loaded_status = catalog.missables.iter().map(|g| g.status).collect();

        Collection {
            cards: catalog.cards,
            by_index,
            missables: catalog.missables,
            loaded_status,
        }
    }

    /// Overwrite ownership with a decoded inventory
    ///
    /// Every card is first reset to not obtained, so applying the same
    /// inventory twice gives the same state as applying it once.
    pub fn apply_inventory(&mut self, entries: &[CardInventoryEntry]) -> MergeSummary {
        for card in &mut self.cards {
            card.obtained = false;
            card.owned = None;
        }

        let mut summary = MergeSummary::default();
        for entry in entries {
            match self.by_index.get(&entry.index) {
                Some(&pos) => {
                    let card = &mut self.cards[pos];
                    card.obtained = true;
                    card.owned = Some(entry.copies);
                    summary.matched += 1;
                }
                None => {
                    tracing::debug!(index = entry.index, "inventory card not in catalog");
                    summary.unknown += 1;
                }
            }
        }

        let by_index = &self.by_index;
        let cards = &self.cards;
        let is_obtained =
            |index: i32| by_index.get(&index).map_or(false, |&pos| cards[pos].obtained);
        for (group, &loaded) in self.missables.iter_mut().zip(&self.loaded_status) {
            group.refresh(loaded, &is_obtained);
        }

        tracing::info!(
            matched = summary.matched,
            unknown = summary.unknown,
            obtained = self.obtained_count(),
            total = self.cards.len(),
            "applied card inventory"
        );
        summary
    }

    pub fn card(&self, index: i32) -> Option<&CardRecord> {
        self.by_index.get(&index).map(|&pos| &self.cards[pos])
    }

    pub fn cards(&self) -> &[CardRecord] {
        &self.cards
    }

    pub fn missables(&self) -> &[MissableGroup] {
        &self.missables
    }

    pub fn obtained_count(&self) -> usize {
        self.cards.iter().filter(|c| c.obtained).count()
    }

    pub fn missing(&self) -> impl Iterator<Item = &CardRecord> {
        self.cards.iter().filter(|c| !c.obtained)
    }

    pub fn filter<'a>(
        &'a self,
        filter: &'a CardFilter,
    ) -> impl Iterator<Item = &'a CardRecord> + 'a {
        self.cards.iter().filter(move |c| filter.matches(c))
    }

    /// Ownership keyed by card index, for the UI layer
    pub fn status_map(&self) -> FxHashMap<i32, CardStatus> {
        self.cards
            .iter()
            .map(|c| {
                (
                    c.index,
                    CardStatus {
                        obtained: c.obtained,
                        copies: c.owned,
                    },
                )
            })
            .collect()
    }
}
