//! Card catalog records

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Faction deck a card belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Deck {
    Neutral,
    NorthernRealms,
    Nilfgaard,
    Scoiatael,
    Monsters,
    Skellige,
    /// A deck name this build does not know about
    Other(String),
}

/// Lowercase ASCII letters and digits only, so "Scoia'tael" and "scoiatael" compare equal
pub(crate) fn fold(s: &str) -> String {
    deunicode::deunicode(s)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl From<String> for Deck {
    fn from(s: String) -> Self {
        match fold(&s).as_str() {
            "neutral" => Deck::Neutral,
            "northernrealms" | "northern" => Deck::NorthernRealms,
            "nilfgaard" | "nilfgaardianempire" => Deck::Nilfgaard,
            "scoiatael" => Deck::Scoiatael,
            "monsters" => Deck::Monsters,
            "skellige" => Deck::Skellige,
            _ => Deck::Other(s),
        }
    }
}

impl std::str::FromStr for Deck {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Deck::from(s.to_string()))
    }
}

impl From<Deck> for String {
    fn from(deck: Deck) -> Self {
        deck.to_string()
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Deck::Neutral => "Neutral",
            Deck::NorthernRealms => "Northern Realms",
            Deck::Nilfgaard => "Nilfgaard",
            Deck::Scoiatael => "Scoia'tael",
            Deck::Monsters => "Monsters",
            Deck::Skellige => "Skellige",
            Deck::Other(name) => name,
        };
        f.write_str(name)
    }
}

fn default_copies() -> i32 {
    1
}

/// Static definition of one collectible card
///
/// `obtained` and `owned` are runtime fields filled in from a savegame; they
/// are never read from or written to the catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub index: i32,
    pub name: String,
    #[serde(default)]
    pub flavor: String,
    /// Copies shown in the catalog (how many exist to collect)
    #[serde(default = "default_copies")]
    pub copies: i32,
    pub deck: Deck,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    #[serde(default)]
    pub locations: SmallVec<[String; 2]>,

    #[serde(skip)]
    pub obtained: bool,
    /// Copies the player holds, from the last applied savegame
    #[serde(skip)]
    pub owned: Option<i32>,
}

impl CardRecord {
    pub fn new(index: i32, name: impl Into<String>, deck: Deck) -> Self {
        CardRecord {
            index,
            name: name.into(),
            flavor: String::new(),
            copies: default_copies(),
            deck,
            card_type: None,
            locations: SmallVec::new(),
            obtained: false,
            owned: None,
        }
    }

    /// Case- and accent-insensitive substring match on the card name
    pub fn name_matches(&self, needle: &str) -> bool {
        fold(&self.name).contains(&fold(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_names_fold() {
        assert_eq!(Deck::from("Scoia'tael".to_string()), Deck::Scoiatael);
        assert_eq!(Deck::from("northern realms".to_string()), Deck::NorthernRealms);
        assert_eq!("Skellige".parse::<Deck>().unwrap(), Deck::Skellige);
        assert_eq!(
            Deck::from("Syndicate".to_string()),
            Deck::Other("Syndicate".to_string())
        );
        assert_eq!(Deck::Scoiatael.to_string(), "Scoia'tael");
    }

    #[test]
    fn test_name_matches_ignores_case_and_accents() {
        let card = CardRecord::new(7, "Cirilla Fiona Elen Riannon", Deck::Neutral);
        assert!(card.name_matches("fiona"));
        assert!(card.name_matches("ELEN RI"));
        assert!(!card.name_matches("Geralt"));

        let card = CardRecord::new(8, "Éibhear Hattori", Deck::Scoiatael);
        assert!(card.name_matches("eibhear"));
    }

    #[test]
    fn test_record_yaml_shape() {
        let yaml = r#"
index: 12
name: Yennefer of Vengerberg
flavor: Magic is chaos, art and science.
copies: 1
deck: Neutral
type: Hero
locations:
  - Quest reward
"#;
        let card: CardRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(card.index, 12);
        assert_eq!(card.deck, Deck::Neutral);
        assert_eq!(card.card_type.as_deref(), Some("Hero"));
        assert_eq!(card.locations.as_slice(), ["Quest reward".to_string()]);
        assert!(!card.obtained);
        assert_eq!(card.owned, None);
    }
}
