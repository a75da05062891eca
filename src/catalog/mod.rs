//! Static card catalog
//!
//! Loads card definitions and missable groups from YAML files. Paths come from
//! a [`CatalogConfig`] rather than being fixed in code.

pub mod card;
pub mod missable;

pub use card::{CardRecord, Deck};
pub use missable::{MissableGroup, MissableStatus};

use crate::{Result, TrackerError};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

/// Where the catalog files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub cards_path: PathBuf,
    pub missables_path: PathBuf,
}

impl CatalogConfig {
    /// `cards.yml` and `missable.yml` inside `dir`
    pub fn from_data_dir(dir: &Path) -> Self {
        CatalogConfig {
            cards_path: dir.join("cards.yml"),
            missables_path: dir.join("missable.yml"),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::from_data_dir(Path::new("data"))
    }
}

/// Card definitions and missable groups, as shipped
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub cards: Vec<CardRecord>,
    pub missables: Vec<MissableGroup>,
}

fn parse_yaml<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    serde_yaml::from_str(content).map_err(|e| TrackerError::CatalogParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

impl Catalog {
    /// Load both catalog files
    pub fn load(config: &CatalogConfig) -> Result<Self> {
        let cards = std::fs::read_to_string(&config.cards_path)?;
        let missables = std::fs::read_to_string(&config.missables_path)?;
        let catalog = Self::parse(&config.cards_path, &cards, &config.missables_path, &missables)?;

        tracing::info!(
            cards = catalog.cards.len(),
            missables = catalog.missables.len(),
            "loaded card catalog"
        );
        Ok(catalog)
    }

    /// Parse catalog contents that are already in memory
    pub fn from_yaml_str(cards: &str, missables: &str) -> Result<Self> {
        Self::parse(Path::new("<cards>"), cards, Path::new("<missables>"), missables)
    }

    fn parse(
        cards_path: &Path,
        cards: &str,
        missables_path: &Path,
        missables: &str,
    ) -> Result<Self> {
        let cards: Vec<CardRecord> = parse_yaml(cards_path, cards)?;
        let missables: Vec<MissableGroup> = if missables.trim().is_empty() {
            Vec::new()
        } else {
            parse_yaml(missables_path, missables)?
        };

        let mut seen = FxHashSet::default();
        for card in &cards {
            if !seen.insert(card.index) {
                return Err(TrackerError::CatalogParse {
                    path: cards_path.to_path_buf(),
                    reason: format!("duplicate card index {} ('{}')", card.index, card.name),
                });
            }
        }

        for group in &missables {
            for index in group.cards.iter().filter(|i| !seen.contains(*i)) {
                tracing::warn!(
                    group = %group.name,
                    index,
                    "missable group references a card that is not in the catalog"
                );
            }
        }

        Ok(Catalog { cards, missables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARDS: &str = r#"
- index: 1
  name: Geralt of Rivia
  flavor: If that's what it takes to save the world, it's better to let that world die.
  copies: 1
  deck: Neutral
  type: Hero
  locations: [Starting deck]
- index: 2
  name: Yennefer of Vengerberg
  deck: neutral
"#;

    const MISSABLES: &str = r#"
- id: 1
  name: Collect 'Em All
  cards: [1, 2]
  status: Active
- id: 2
  name: Lost forever
  cards: [99]
  status: Missed
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_yaml_str(CARDS, MISSABLES).unwrap();
        assert_eq!(catalog.cards.len(), 2);
        assert_eq!(catalog.cards[1].copies, 1);
        assert!(catalog.cards[1].locations.is_empty());
        assert_eq!(catalog.missables[1].status, MissableStatus::Missed);
    }

    #[test]
    fn test_empty_missable_file() {
        let catalog = Catalog::from_yaml_str(CARDS, "").unwrap();
        assert!(catalog.missables.is_empty());
    }

    #[test]
    fn test_duplicate_index_is_rejected() {
        let cards = "- {index: 4, name: A, deck: Monsters}\n\
                     - {index: 4, name: B, deck: Monsters}\n";
        match Catalog::from_yaml_str(cards, "") {
            Err(TrackerError::CatalogParse { reason, .. }) => {
                assert!(reason.contains("duplicate card index 4"), "{reason}");
            }
            other => panic!("expected CatalogParse, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_catalog_error() {
        let err = Catalog::from_yaml_str("- index: [not a number\n", "").unwrap_err();
        assert!(matches!(err, TrackerError::CatalogParse { .. }), "{err}");
    }

    #[test]
    fn test_default_paths() {
        let config = CatalogConfig::default();
        assert_eq!(config.cards_path, PathBuf::from("data/cards.yml"));
        assert_eq!(config.missables_path, PathBuf::from("data/missable.yml"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = std::env::temp_dir().join("gwent-tracker-missing");
        let config = CatalogConfig::from_data_dir(&dir);
        assert!(matches!(Catalog::load(&config), Err(TrackerError::Io(_))));
    }
}
