//! Gwent Tracker - Witcher 3 Gwent card collection tracker
//!
//! Decodes the game's binary savegames, extracts the player's Gwent card
//! inventory and merges it into a static card catalog to show which cards
//! are obtained and which are still missing.

pub mod catalog;
pub mod collection;
pub mod error;
pub mod savegame;
pub mod tracker;
pub mod watch;

pub use error::{Result, TrackerError};
