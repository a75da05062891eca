//! End-to-end tests for the tracker
//!
//! Loads the catalog, decodes savegames from disk on the blocking pool and
//! checks that only the newest request ever reaches the collection.

use gwent_tracker::{
    catalog::{Catalog, CatalogConfig, MissableStatus},
    collection::Collection,
    savegame::{SaveGame, Value, Variable},
    tracker::{ApplyOutcome, Notification, Severity, Tracker},
    Result,
};
use std::path::{Path, PathBuf};

const CARDS: &str = r#"
- {index: 1, name: Geralt of Rivia, deck: Neutral, type: Hero}
- {index: 2, name: Yennefer of Vengerberg, deck: Neutral, type: Hero}
- {index: 3, name: Triss Merigold, deck: Neutral, type: Hero}
"#;

const MISSABLES: &str = r#"
- id: 1
  name: A Matter of Life and Death
  cards: [2, 3]
"#;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gwent-e2e-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a savegame owning the given (index, copies) cards
fn write_save(path: &Path, cards: &[(i32, i32)]) -> Result<()> {
    let mut collection = vec![
        Variable::leaf("version", Value::Int32(2)),
        Variable::leaf("count", Value::Int32(cards.len() as i32)),
    ];
    for &(index, copies) in cards {
        collection.push(Variable::leaf("cardIndex", Value::Int32(index)));
        collection.push(Variable::leaf("numCopies", Value::Int32(copies)));
    }
    collection.push(Variable::leaf("SBSelectedDeckIndex", Value::Int32(0)));

    let mut sections: Vec<Variable> = (0..11)
        .map(|i| Variable::block(format!("section{i}"), vec![]))
        .collect();
    sections.push(Variable::block("CollectionManager", collection));

    std::fs::write(path, SaveGame::new(sections).to_bytes()?)?;
    Ok(())
}

fn tracker() -> Result<Tracker<Vec<Notification>>> {
    let catalog = Catalog::from_yaml_str(CARDS, MISSABLES)?;
    Ok(Tracker::new(Collection::new(catalog), Vec::new()))
}

#[tokio::test]
async fn test_last_request_wins() -> Result<()> {
    let dir = temp_dir("last-wins");
    let old = dir.join("old.sav");
    let new = dir.join("new.sav");
    write_save(&old, &[(1, 1)])?;
    write_save(&new, &[(2, 1), (3, 2)])?;

    let mut tracker = tracker()?;
    let first = tracker.request_decode(old);
    let second = tracker.request_decode(new.clone());

    // Apply in completion order reversed: the newer result lands first
    let second = second.await?;
    let first = first.await?;
    assert!(matches!(tracker.apply_decode_result(second), ApplyOutcome::Applied(_)));
    assert_eq!(
        tracker.apply_decode_result(first),
        ApplyOutcome::Stale { seq: 1, latest: 2 }
    );

    let collection = tracker.collection();
    assert!(!collection.card(1).unwrap().obtained);
    assert_eq!(collection.card(3).unwrap().owned, Some(2));
    assert_eq!(collection.missables()[0].status, MissableStatus::Obtained);
    assert_eq!(tracker.applied().unwrap().path, new);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[tokio::test]
async fn test_older_result_never_applies() -> Result<()> {
    let dir = temp_dir("older");
    let old = dir.join("old.sav");
    let new = dir.join("new.sav");
    write_save(&old, &[(1, 1)])?;
    write_save(&new, &[(2, 1)])?;

    let mut tracker = tracker()?;
    let first = tracker.request_decode(old);
    let second = tracker.request_decode(new);

    let first = first.await?;
    assert!(matches!(
        tracker.apply_decode_result(first),
        ApplyOutcome::Stale { .. }
    ));
    assert!(tracker.applied().is_none());

    let second = second.await?;
    assert!(matches!(tracker.apply_decode_result(second), ApplyOutcome::Applied(_)));
    assert!(tracker.collection().card(2).unwrap().obtained);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[tokio::test]
async fn test_bad_file_keeps_previous_collection() -> Result<()> {
    let dir = temp_dir("bad");
    let good = dir.join("good.sav");
    let bad = dir.join("bad.sav");
    write_save(&good, &[(1, 3)])?;
    std::fs::write(&bad, b"this is not a savegame")?;

    let mut tracker = tracker()?;
    assert!(matches!(tracker.load(good).await, ApplyOutcome::Applied(_)));
    let before = tracker.status_map();

    assert_eq!(tracker.load(bad).await, ApplyOutcome::Failed);
    assert_eq!(tracker.status_map(), before);

    let messages = tracker.notifier();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].severity, Severity::Info);
    assert_eq!(messages[1].severity, Severity::Error);
    assert!(messages[1].message.contains("bad.sav"), "{}", messages[1].message);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[tokio::test]
async fn test_shipped_catalog_loads() -> Result<()> {
    let config = CatalogConfig::default();
    if !config.cards_path.exists() {
        return Ok(()); // Skip if data/ not present
    }

    let catalog = Catalog::load(&config)?;
    assert!(!catalog.cards.is_empty());

    let dir = temp_dir("shipped");
    let save = dir.join("QuickSave.sav");
    write_save(&save, &[(1, 1), (6, 1)])?;

    let mut tracker = Tracker::new(Collection::new(catalog), Vec::new());
    match tracker.load(save).await {
        ApplyOutcome::Applied(summary) => assert_eq!(summary.matched, 2),
        other => panic!("expected the save to apply, got {other:?}"),
    }

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}
