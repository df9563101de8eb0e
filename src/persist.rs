//! Durable copy of the plant collection.
//!
//! The collection lives in one named slot: a JSON file inside the data
//! directory. Writes always replace the whole file. Nothing in here is
//! allowed to take the application down; callers that cannot act on a
//! failure use the `_or_log` variants.

use crate::error::Result;
use crate::record::Plant;
use crate::store::PlantStore;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::{self, JoinHandle};

pub const PLANTS_SLOT: &str = "geotag-plants";
const SLOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SlotOut<'a> {
    version: u32,
    plants: &'a [Plant],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotIn {
    Versioned { version: u32, plants: Vec<Plant> },
    // Files written before the format carried a version are a bare array.
    Bare(Vec<Plant>),
}

#[derive(Debug, Clone)]
pub struct Slot {
    path: PathBuf,
}

impl Slot {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn plants(dir: impl AsRef<Path>) -> Self {
        Self::new(dir, PLANTS_SLOT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, plants: &[Plant]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec(&SlotOut {
            version: SLOT_VERSION,
            plants,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote {} plants to {}", plants.len(), self.path.display());
        Ok(())
    }

    /// An absent slot reads as an empty collection.
    pub fn load(&self) -> Result<Vec<Plant>> {
        let body = match fs::read(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<SlotIn>(&body)? {
            SlotIn::Versioned { version, plants } => {
                if version > SLOT_VERSION {
                    info!(
                        "Slot {} has version {}, newer than {}; reading known fields",
                        self.path.display(),
                        version,
                        SLOT_VERSION
                    );
                }
                Ok(plants)
            }
            SlotIn::Bare(plants) => Ok(plants),
        }
    }

    pub fn save_or_log(&self, plants: &[Plant]) {
        if let Err(e) = self.save(plants) {
            error!("Failed to save plants to {}: {}", self.path.display(), e);
        }
    }

    pub fn load_or_empty(&self) -> Vec<Plant> {
        self.load().unwrap_or_else(|e| {
            error!("Failed to load plants from {}: {}", self.path.display(), e);
            Vec::new()
        })
    }
}

/// Seed the store from the slot. An empty or unreadable slot leaves the store untouched.
pub fn restore(store: &PlantStore, slot: &Slot) -> usize {
    let plants = slot.load_or_empty();
    let count = plants.len();
    if count > 0 {
        store.load_plants_from_storage(plants);
        info!("Loaded {} plants from {}", count, slot.path().display());
    }
    count
}

/// Rewrite the slot after every change to the canonical list.
///
/// Nothing is written until the list has held at least one plant, so an
/// empty store never overwrites saved data. The task ends once the store is
/// dropped, after flushing the last change it saw.
pub fn spawn_mirror(store: &PlantStore, slot: Slot) -> JoinHandle<()> {
    let mut rx = store.subscribe();
    let (mut written, mut seen_plants) = {
        let state = rx.borrow_and_update();
        (state.revision, !state.plants.is_empty())
    };

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let (revision, plants) = {
                let state = rx.borrow_and_update();
                (state.revision, state.plants.clone())
            };
            if revision == written {
                continue;
            }
            written = revision;

            if plants.is_empty() && !seen_plants {
                continue;
            }
            seen_plants = true;

            // Writes stay in order: the next change waits for this one.
            let writer = slot.clone();
            if let Err(e) = task::spawn_blocking(move || writer.save_or_log(&plants)).await {
                error!("Writer for {} stopped: {}", slot.path().display(), e);
            }
        }
        debug!("Plant store closed, mirror for {} stopped", slot.path().display());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::plant;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        let plants = vec![
            plant("a", "rose.jpg", 0, 20.123456, 77.654321),
            plant("b", "tulip.jpg", 5, -1.5, 0.0),
        ];

        slot.save(&plants).unwrap();
        assert_eq!(slot.load().unwrap(), plants);
    }

    #[test]
    fn test_missing_slot_is_empty() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path().join("nested"));
        assert!(slot.load().unwrap().is_empty());
    }

    #[test]
    fn test_reads_unversioned_array() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        fs::write(
            slot.path(),
            r#"[{"id":"k1","imageName":"leaf.png","imageUrl":"u","latitude":18.5,"longitude":73.8,"uploadedAt":"2024-06-01T12:00:00.000Z"}]"#,
        )
        .unwrap();

        let plants = slot.load().unwrap();
        assert_eq!(plants.len(), 1);
        assert_eq!(plants[0].image_name, "leaf.png");
    }

    #[test]
    fn test_corrupt_slot_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        fs::write(slot.path(), "{not json").unwrap();

        assert!(slot.load().is_err());
        assert!(slot.load_or_empty().is_empty());

        let store = PlantStore::new();
        assert_eq!(restore(&store, &slot), 0);
        assert!(store.plants().is_empty());
    }

    #[test]
    fn test_restore_loads_into_store() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        slot.save(&[plant("a", "rose.jpg", 0, 1.0, 1.0)]).unwrap();

        let store = PlantStore::new();
        assert_eq!(restore(&store, &slot), 1);
        assert_eq!(store.filtered_plants().len(), 1);
    }

    #[tokio::test]
    async fn test_mirror_writes_every_list_change() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        let store = PlantStore::new();
        let handle = spawn_mirror(&store, slot.clone());

        store.add_plant(plant("a", "rose.jpg", 0, 1.0, 1.0));
        settle().await;
        store.add_plant(plant("b", "tulip.jpg", 1, 2.0, 2.0));
        store.set_search_term("rose");
        drop(store);
        handle.await.unwrap();

        let saved = slot.load().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].id.0, "b");
    }

    #[tokio::test]
    async fn test_mirror_skips_until_non_empty_then_records_clear() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        slot.save(&[plant("old", "old.jpg", 0, 1.0, 1.0)]).unwrap();

        let store = PlantStore::new();
        let handle = spawn_mirror(&store, slot.clone());
        store.delete_all_plants();
        settle().await;
        assert_eq!(slot.load().unwrap().len(), 1);

        store.add_plant(plant("a", "rose.jpg", 0, 1.0, 1.0));
        settle().await;
        store.delete_all_plants();
        drop(store);
        handle.await.unwrap();

        assert!(slot.load().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mirror_last_write_wins_across_threads() {
        let dir = TempDir::new().unwrap();
        let slot = Slot::plants(dir.path());
        let store = PlantStore::new();
        let handle = spawn_mirror(&store, slot.clone());

        for i in 0..20 {
            store.add_plant(plant(&format!("p{}", i), "leaf.jpg", i, 1.0, 1.0));
            tokio::task::yield_now().await;
        }
        drop(store);
        handle.await.unwrap();

        let saved = slot.load().unwrap();
        assert_eq!(saved.len(), 20);
        assert!(!slot.path().with_extension("json.tmp").exists());
    }
}
