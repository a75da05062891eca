//! Savegame change detection by polling modification time

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Default polling period for [`SaveWatcher`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Yields whenever a file's modification time changes
pub struct SaveWatcher {
    path: PathBuf,
    ticker: Interval,
    last_seen: Option<SystemTime>,
}

async fn modified(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok()
}

impl SaveWatcher {
    /// Start watching `path`; the current state counts as already seen
    pub async fn new(path: PathBuf, period: Duration) -> Self {
        let last_seen = modified(&path).await;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        SaveWatcher {
            path,
            ticker,
            last_seen,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until the file has a modification time different from the last one seen
    ///
    /// A file that is temporarily missing (the game replaces saves by
    /// rename) is not a change; polling continues until it reappears.
    pub async fn changed(&mut self) -> SystemTime {
        loop {
            self.ticker.tick().await;
            match modified(&self.path).await {
                Some(stamp) if Some(stamp) != self.last_seen => {
                    tracing::debug!(path = %self.path.display(), "savegame changed");
                    self.last_seen = Some(stamp);
                    return stamp;
                }
                Some(_) => {}
                None => tracing::trace!(path = %self.path.display(), "savegame not present"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detects_rewrite() {
        let dir = std::env::temp_dir().join(format!("gwent-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("QuickSave.sav");
        std::fs::write(&path, b"one").unwrap();

        let mut watcher = SaveWatcher::new(path.clone(), Duration::from_millis(10)).await;

        let file = std::fs::File::options().write(true).open(&path).unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        file.set_modified(later).unwrap();
        drop(file);

        let stamp = tokio::time::timeout(Duration::from_secs(5), watcher.changed())
            .await
            .expect("watcher did not fire");
        assert!(stamp > SystemTime::now());

        std::fs::remove_dir_all(&dir).ok();
    }
}
