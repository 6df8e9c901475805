//! Persistence
//!
//! The lab file is a flat JSON dump of the books and operator choices,
//! rewritten after every tick. Executed trades are additionally appended to
//! a SQLite journal that survives book resets.

mod journal;

pub use journal::{JournalEntry, TradeJournal};

use crate::error::Result;
use crate::lab::PersistedLab;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// JSON file holding the persisted lab
///
/// Clones share one write lock, so the engine and the dashboard never
/// interleave a write and its rename.
#[derive(Debug, Clone)]
pub struct LabStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LabStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved lab, `None` when the file does not exist yet
    pub async fn load(&self) -> Result<Option<PersistedLab>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write the lab, replacing the previous file atomically
    pub async fn save(&self, lab: &PersistedLab) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(lab)?;
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Saved lab state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::LabState;
    use crate::strategy::StrategyKind;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let store = LabStore::new(dir.path().join("lab_data.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = LabStore::new(dir.path().join("nested").join("lab_data.json"));

        let mut lab = LabState::new(dec!(100));
        lab.book_mut(StrategyKind::RsiPure)
            .simulate_buy(dec!(65000), dec!(11), dec!(0.001));
        lab.select_strategy(StrategyKind::Aggressive);

        store.save(&lab.to_persisted()).await.unwrap();
        let saved = store.load().await.unwrap().unwrap();

        assert_eq!(saved.selected_strategy, StrategyKind::Aggressive);
        assert!(!saved.is_live);
        assert!(saved.last_save.is_some());
        assert_eq!(saved.strategies[&StrategyKind::RsiPure].trades.len(), 1);
        assert_eq!(saved.strategies[&StrategyKind::RsiPure].balance, dec!(89));
    }

    #[tokio::test]
    async fn test_saved_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lab_data.json");
        let store = LabStore::new(&path);
        store
            .save(&LabState::new(dec!(100)).to_persisted())
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["strategies"]["conservative"].is_object());
        assert_eq!(raw["selected_strategy"], "conservative");
        assert_eq!(raw["is_live"], false);
        assert!(raw["last_save"].is_string());
        // market and account data are not persisted
        assert!(raw.get("current_price").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_all_succeed() {
        let dir = tempdir().unwrap();
        let store = LabStore::new(dir.path().join("lab_data.json"));
        let lab = LabState::new(dec!(100)).to_persisted();

        for _ in 0..50 {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = store.clone();
                    let lab = lab.clone();
                    tokio::spawn(async move { store.save(&lab).await })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        assert!(store.load().await.unwrap().is_some());
        // no temp files left behind
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path() != store.path())
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_separate_stores_on_one_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lab_data.json");
        let lab = LabState::new(dec!(100)).to_persisted();

        let a = LabStore::new(&path);
        let b = LabStore::new(&path);
        let (ra, rb) = tokio::join!(a.save(&lab), b.save(&lab));
        ra.unwrap();
        rb.unwrap();
        assert!(a.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lab_data.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(LabStore::new(&path).load().await.is_err());
    }
}
