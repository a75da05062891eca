//! Missable card groups
//!
//! Some cards can be permanently lost if the player progresses past a quest
//! without collecting them. A group lists those cards together.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissableStatus {
    /// Still collectable
    #[default]
    Active,
    /// Every card in the group is owned
    Obtained,
    /// The chance to collect has passed
    Missed,
}

impl fmt::Display for MissableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissableStatus::Active => "Active",
            MissableStatus::Obtained => "Obtained",
            MissableStatus::Missed => "Missed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissableGroup {
    pub id: u32,
    pub name: String,
    pub cards: Vec<i32>,
    #[serde(default)]
    pub status: MissableStatus,
}

impl MissableGroup {
    /// Recompute the status from card ownership
    ///
    /// Only `Obtained` is derived here. Whether a group was missed depends on
    /// quest progress, which the savegame reader does not track, so an
    /// incomplete group falls back to the status it was loaded with.
    pub fn refresh(&mut self, loaded: MissableStatus, is_obtained: impl Fn(i32) -> bool) {
        let complete = !self.cards.is_empty() && self.cards.iter().all(|&index| is_obtained(index));
        self.status = if complete {
            MissableStatus::Obtained
        } else {
            loaded
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(status: MissableStatus) -> MissableGroup {
        MissableGroup {
            id: 1,
            name: "A Matter of Life and Death".to_string(),
            cards: vec![3, 4],
            status,
        }
    }

    #[test]
    fn test_refresh_requires_every_card() {
        let mut g = group(MissableStatus::Active);
        g.refresh(MissableStatus::Active, |i| i == 3);
        assert_eq!(g.status, MissableStatus::Active);

        g.refresh(MissableStatus::Active, |i| i == 3 || i == 4);
        assert_eq!(g.status, MissableStatus::Obtained);

        // A later save without the cards reverts to the loaded status
        g.refresh(MissableStatus::Active, |_| false);
        assert_eq!(g.status, MissableStatus::Active);
    }

    #[test]
    fn test_refresh_keeps_missed_when_incomplete() {
        let mut g = group(MissableStatus::Missed);
        g.refresh(MissableStatus::Missed, |_| false);
        assert_eq!(g.status, MissableStatus::Missed);
    }

    #[test]
    fn test_status_defaults_to_active() {
        let g: MissableGroup = serde_yaml::from_str("id: 2\nname: Test\ncards: [1]\n").unwrap();
        assert_eq!(g.status, MissableStatus::Active);
    }
}
