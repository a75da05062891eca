//! Savegame decode requests and result application
//!
//! Decodes run on the blocking thread pool so the caller's event loop stays
//! responsive. Each request gets a sequence number; only the result of the
//! most recently issued request is ever applied, so a slow decode for an old
//! path cannot overwrite the state produced for a newer one.

use crate::collection::{CardStatus, Collection, MergeSummary};
use crate::savegame::{self, CardInventoryEntry};
use crate::{Result, TrackerError};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

/// Sink for short human-readable status and error messages
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

/// Forwards notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notification: Notification) {
        match notification.severity {
            Severity::Info => tracing::info!("{}", notification.message),
            Severity::Error => tracing::error!("{}", notification.message),
        }
    }
}

/// Collects notifications in memory
impl Notifier for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// A decode that has been issued but not yet applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    pub seq: u64,
    pub path: PathBuf,
}

/// Outcome of decoding one savegame
#[derive(Debug)]
pub struct DecodeResult {
    pub seq: u64,
    pub path: PathBuf,
    pub inventory: Result<Vec<CardInventoryEntry>>,
}

/// What [`Tracker::apply_decode_result`] did with a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(MergeSummary),
    /// A newer request was issued; the result was dropped
    Stale { seq: u64, latest: u64 },
    /// Decoding failed; the previous state was kept
    Failed,
}

/// Decode a savegame on the blocking pool
pub async fn decode(request: DecodeRequest) -> DecodeResult {
    let DecodeRequest { seq, path } = request;
    let task_path = path.clone();
    let inventory = tokio::task::spawn_blocking(move || savegame::read_inventory(&task_path))
        .await
        .map_err(TrackerError::Join)
        .and_then(|r| r);
    DecodeResult {
        seq,
        path,
        inventory,
    }
}

fn describe_failure(path: &Path, err: &TrackerError) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match err {
        TrackerError::Io(e) => format!("Could not read savegame {file}: {e}"),
        TrackerError::CorruptSavegame { .. } => format!("Savegame {file} is damaged: {err}"),
        TrackerError::UnexpectedLayout(reason) => format!(
            "Savegame {file} has an unsupported layout (game update?): {reason}"
        ),
        other => format!("Failed to load savegame {file}: {other}"),
    }
}

/// Owns the collection state and serializes updates to it
pub struct Tracker<N: Notifier> {
    collection: Collection,
    notifier: N,
    next_seq: u64,
    applied: Option<DecodeRequest>,
}

impl<N: Notifier> Tracker<N> {
    pub fn new(collection: Collection, notifier: N) -> Self {
        Tracker {
            collection,
            notifier,
            next_seq: 0,
            applied: None,
        }
    }

    /// Issue a new request, superseding any still in flight
    pub fn begin(&mut self, path: PathBuf) -> DecodeRequest {
        self.next_seq += 1;
        tracing::debug!(seq = self.next_seq, path = %path.display(), "issued savegame decode");
        DecodeRequest {
            seq: self.next_seq,
            path,
        }
    }

    /// Issue a request and start decoding it on the blocking pool
    pub fn request_decode(&mut self, path: PathBuf) -> JoinHandle<DecodeResult> {
        let request = self.begin(path);
        tokio::spawn(decode(request))
    }

    /// Sequence number of the newest issued request
    pub fn latest_seq(&self) -> u64 {
        self.next_seq
    }

    /// Merge a finished decode into the collection, unless it is stale or failed
    pub fn apply_decode_result(&mut self, result: DecodeResult) -> ApplyOutcome {
        if result.seq != self.next_seq {
            tracing::debug!(
                seq = result.seq,
                latest = self.next_seq,
                path = %result.path.display(),
                "discarding stale savegame decode"
            );
            return ApplyOutcome::Stale {
                seq: result.seq,
                latest: self.next_seq,
            };
        }

        match result.inventory {
            Ok(entries) => {
                let summary = self.collection.apply_inventory(&entries);
                self.notifier.notify(Notification {
                    severity: Severity::Info,
                    message: format!(
                        "Loaded {}: {} of {} cards obtained",
                        result.path.display(),
                        self.collection.obtained_count(),
                        self.collection.cards().len()
                    ),
                });
                self.applied = Some(DecodeRequest {
                    seq: result.seq,
                    path: result.path,
                });
                ApplyOutcome::Applied(summary)
            }
            Err(err) => {
                if err.is_format_drift() {
                    tracing::warn!(path = %result.path.display(), "savegame layout drift: {err}");
                } else {
                    tracing::warn!(path = %result.path.display(), "savegame decode failed: {err}");
                }
                self.notifier.notify(Notification {
                    severity: Severity::Error,
                    message: describe_failure(&result.path, &err),
                });
                ApplyOutcome::Failed
            }
        }
    }

    /// Decode `path` and apply the result
    pub async fn load(&mut self, path: PathBuf) -> ApplyOutcome {
        let request = self.begin(path);
        let result = decode(request).await;
        self.apply_decode_result(result)
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// The request whose result the collection currently reflects
    pub fn applied(&self) -> Option<&DecodeRequest> {
        self.applied.as_ref()
    }

    pub fn status_map(&self) -> FxHashMap<i32, CardStatus> {
        self.collection.status_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CardRecord, Catalog, Deck};

    fn tracker() -> Tracker<Vec<Notification>> {
        let catalog = Catalog {
            cards: vec![
                CardRecord::new(1, "Geralt", Deck::Neutral),
                CardRecord::new(2, "Yennefer", Deck::Neutral),
            ],
            missables: vec![],
        };
        Tracker::new(Collection::new(catalog), Vec::new())
    }

    fn finished(request: &DecodeRequest, entries: Vec<CardInventoryEntry>) -> DecodeResult {
        DecodeResult {
            seq: request.seq,
            path: request.path.clone(),
            inventory: Ok(entries),
        }
    }

    #[test]
    fn test_out_of_order_completion_keeps_newest() {
        let mut tracker = tracker();
        let first = tracker.begin(PathBuf::from("old.sav"));
        let second = tracker.begin(PathBuf::from("new.sav"));

        let entries = vec![CardInventoryEntry::new(2, 1)];
        let outcome = tracker.apply_decode_result(finished(&second, entries));
        assert!(matches!(outcome, ApplyOutcome::Applied(_)));

        let entries = vec![CardInventoryEntry::new(1, 1)];
        let outcome = tracker.apply_decode_result(finished(&first, entries));
        assert_eq!(outcome, ApplyOutcome::Stale { seq: 1, latest: 2 });

        assert!(!tracker.collection().card(1).unwrap().obtained);
        assert!(tracker.collection().card(2).unwrap().obtained);
        assert_eq!(tracker.applied().unwrap().path, PathBuf::from("new.sav"));
    }

    #[test]
    fn test_result_arriving_before_newer_request_completes_is_stale() {
        let mut tracker = tracker();
        let first = tracker.begin(PathBuf::from("a.sav"));
        let _second = tracker.begin(PathBuf::from("b.sav"));

        let entries = vec![CardInventoryEntry::new(1, 1)];
        let outcome = tracker.apply_decode_result(finished(&first, entries));
        assert!(matches!(outcome, ApplyOutcome::Stale { .. }));
        assert!(tracker.applied().is_none());
        assert!(tracker.notifier().is_empty());
    }

    #[test]
    fn test_failure_keeps_previous_state() {
        let mut tracker = tracker();
        let ok = tracker.begin(PathBuf::from("good.sav"));
        tracker.apply_decode_result(finished(&ok, vec![CardInventoryEntry::new(1, 2)]));

        let bad = tracker.begin(PathBuf::from("bad.sav"));
        let outcome = tracker.apply_decode_result(DecodeResult {
            seq: bad.seq,
            path: bad.path.clone(),
            inventory: Err(TrackerError::layout("section 11 is missing")),
        });

        assert_eq!(outcome, ApplyOutcome::Failed);
        assert_eq!(tracker.collection().card(1).unwrap().owned, Some(2));
        assert_eq!(tracker.applied().unwrap().path, PathBuf::from("good.sav"));

        let last = tracker.notifier().last().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert!(last.message.contains("bad.sav"), "{}", last.message);
        assert!(last.message.contains("unsupported layout"), "{}", last.message);
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_not_fatal() {
        let mut tracker = tracker();
        let path = std::env::temp_dir().join("gwent-tracker-missing.sav");
        let outcome = tracker.load(path).await;

        assert_eq!(outcome, ApplyOutcome::Failed);
        let last = tracker.notifier().last().unwrap();
        assert!(last.message.starts_with("Could not read savegame"), "{}", last.message);
    }
}
