//! The plant collection and its filtered/sorted view.
//!
//! `PlantStore` owns the canonical, insertion-ordered list of plants. Every
//! command changes the list or one view parameter and then rebuilds
//! `filtered_plants` through [`derive_view`] inside the same `send_modify`
//! call, so subscribers never see a view that lags its inputs.

use crate::record::{Plant, PlantId};
use clap::ValueEnum;
use std::cmp::Ordering;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    #[default]
    Date,
    Location,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantState {
    pub plants: Vec<Plant>,
    pub filtered_plants: Vec<Plant>,
    pub search_term: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// Bumped on every change to `plants`, not on view-parameter changes.
    pub revision: u64,
}

impl PlantState {
    fn refresh(&mut self) {
        self.filtered_plants =
            derive_view(&self.plants, &self.search_term, self.sort_by, self.sort_order);
    }
}

/// Filter by case-insensitive name match, then stable-sort.
pub fn derive_view(
    plants: &[Plant],
    search_term: &str,
    sort_by: SortBy,
    sort_order: SortOrder,
) -> Vec<Plant> {
    let needle = search_term.to_lowercase();
    let mut view: Vec<Plant> = plants
        .iter()
        .filter(|p| needle.is_empty() || p.image_name.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    view.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Date => a.uploaded_at.cmp(&b.uploaded_at),
            SortBy::Location => a
                .coordinate_magnitude()
                .partial_cmp(&b.coordinate_magnitude())
                .unwrap_or(Ordering::Equal),
        };
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    view
}

pub struct PlantStore {
    state: watch::Sender<PlantState>,
}

impl PlantStore {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(PlantState::default()),
        }
    }

    pub fn snapshot(&self) -> PlantState {
        self.state.borrow().clone()
    }

    pub fn plants(&self) -> Vec<Plant> {
        self.state.borrow().plants.clone()
    }

    pub fn filtered_plants(&self) -> Vec<Plant> {
        self.state.borrow().filtered_plants.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlantState> {
        self.state.subscribe()
    }

    pub fn add_plant(&self, plant: Plant) {
        self.state.send_modify(|s| {
            s.plants.push(plant);
            s.revision += 1;
            s.refresh();
        });
    }

    pub fn remove_plant(&self, id: &PlantId) -> bool {
        let mut removed = false;
        self.state.send_if_modified(|s| {
            let before = s.plants.len();
            s.plants.retain(|p| &p.id != id);
            removed = s.plants.len() != before;
            if removed {
                s.revision += 1;
                s.refresh();
            }
            removed
        });
        removed
    }

    pub fn delete_all_plants(&self) {
        self.state.send_modify(|s| {
            s.plants.clear();
            s.filtered_plants.clear();
            s.revision += 1;
        });
    }

    pub fn set_search_term(&self, term: impl Into<String>) {
        let term = term.into();
        self.state.send_modify(|s| {
            s.search_term = term;
            s.refresh();
        });
    }

    pub fn set_sort_by(&self, sort_by: SortBy) {
        self.state.send_modify(|s| {
            s.sort_by = sort_by;
            s.refresh();
        });
    }

    pub fn set_sort_order(&self, sort_order: SortOrder) {
        self.state.send_modify(|s| {
            s.sort_order = sort_order;
            s.refresh();
        });
    }

    /// Replace the canonical list wholesale. Used once at startup.
    pub fn load_plants_from_storage(&self, plants: Vec<Plant>) {
        self.state.send_modify(|s| {
            s.plants = plants;
            s.revision += 1;
            s.refresh();
        });
    }
}

impl Default for PlantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn plant(id: &str, name: &str, minutes: i64, lat: f64, lng: f64) -> Plant {
        Plant {
            id: PlantId(id.to_string()),
            image_name: name.to_string(),
            image_url: format!("https://img.example/{}", name),
            latitude: lat,
            longitude: lng,
            uploaded_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    fn ids(plants: &[Plant]) -> Vec<&str> {
        plants.iter().map(|p| p.id.0.as_str()).collect()
    }

    fn assert_view_consistent(store: &PlantStore) {
        let s = store.snapshot();
        assert_eq!(
            s.filtered_plants,
            derive_view(&s.plants, &s.search_term, s.sort_by, s.sort_order)
        );
    }

    #[test]
    fn test_defaults_sort_newest_first() {
        let store = PlantStore::new();
        store.add_plant(plant("a", "a.jpg", 0, 0.0, 0.0));
        store.add_plant(plant("b", "b.jpg", 10, 0.0, 0.0));
        store.add_plant(plant("c", "c.jpg", 5, 0.0, 0.0));

        assert_eq!(ids(&store.filtered_plants()), vec!["b", "c", "a"]);
        assert_eq!(ids(&store.plants()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_view_tracks_every_command() {
        let store = PlantStore::new();
        store.add_plant(plant("a", "Red-Rose.jpg", 3, 20.0, 70.0));
        assert_view_consistent(&store);
        store.add_plant(plant("b", "tulip.png", 1, 30.0, 90.0));
        assert_view_consistent(&store);
        store.set_search_term("ROSE");
        assert_view_consistent(&store);
        store.set_sort_by(SortBy::Location);
        assert_view_consistent(&store);
        store.set_sort_order(SortOrder::Asc);
        assert_view_consistent(&store);
        store.remove_plant(&PlantId("a".to_string()));
        assert_view_consistent(&store);
        store.set_search_term("");
        assert_view_consistent(&store);
        store.load_plants_from_storage(vec![plant("z", "z.jpg", 0, 1.0, 1.0)]);
        assert_view_consistent(&store);
        store.delete_all_plants();
        assert_view_consistent(&store);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let store = PlantStore::new();
        store.add_plant(plant("a", "red-rose.jpg", 0, 0.0, 0.0));
        store.add_plant(plant("b", "tulip.jpg", 1, 0.0, 0.0));

        store.set_search_term("ROSE");
        let upper = store.filtered_plants();
        store.set_search_term("rose");
        let lower = store.filtered_plants();

        assert_eq!(upper, lower);
        assert_eq!(ids(&upper), vec!["a"]);
    }

    #[test]
    fn test_add_then_remove_restores_list() {
        let store = PlantStore::new();
        store.add_plant(plant("a", "a.jpg", 0, 0.0, 0.0));
        let before = store.plants();

        let p = plant("b", "b.jpg", 1, 0.0, 0.0);
        store.add_plant(p.clone());
        assert!(store.remove_plant(&p.id));
        assert_eq!(store.plants(), before);

        assert!(!store.remove_plant(&p.id));
    }

    #[test]
    fn test_date_ties_keep_insertion_order() {
        let store = PlantStore::new();
        store.add_plant(plant("first", "x.jpg", 0, 0.0, 0.0));
        store.add_plant(plant("second", "y.jpg", 0, 0.0, 0.0));
        store.add_plant(plant("third", "z.jpg", 0, 0.0, 0.0));

        store.set_sort_order(SortOrder::Asc);
        let once = store.filtered_plants();
        store.set_sort_order(SortOrder::Asc);
        assert_eq!(once, store.filtered_plants());
        assert_eq!(ids(&once), vec!["first", "second", "third"]);

        store.set_sort_order(SortOrder::Desc);
        assert_eq!(ids(&store.filtered_plants()), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_location_sort_uses_coordinate_magnitude() {
        let plants = vec![
            plant("far", "far.jpg", 0, 30.0, 90.0),
            plant("origin", "origin.jpg", 1, 0.0, 0.0),
            plant("negative", "neg.jpg", 2, -3.0, -4.0),
        ];

        let asc = derive_view(&plants, "", SortBy::Location, SortOrder::Asc);
        assert_eq!(ids(&asc), vec!["origin", "negative", "far"]);

        let desc = derive_view(&plants, "", SortBy::Location, SortOrder::Desc);
        assert_eq!(ids(&desc), vec!["far", "negative", "origin"]);
    }

    #[test]
    fn test_delete_all_clears_both_lists() {
        let store = PlantStore::new();
        store.add_plant(plant("a", "a.jpg", 0, 0.0, 0.0));
        store.delete_all_plants();

        let s = store.snapshot();
        assert!(s.plants.is_empty());
        assert!(s.filtered_plants.is_empty());
    }

    #[test]
    fn test_revision_counts_list_changes_only() {
        let store = PlantStore::new();
        store.add_plant(plant("a", "a.jpg", 0, 0.0, 0.0));
        store.set_search_term("a");
        store.set_sort_by(SortBy::Location);
        assert_eq!(store.snapshot().revision, 1);

        store.remove_plant(&PlantId("missing".to_string()));
        assert_eq!(store.snapshot().revision, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_consistent_snapshots() {
        let store = PlantStore::new();
        let mut rx = store.subscribe();

        store.add_plant(plant("a", "rose.jpg", 0, 0.0, 0.0));
        rx.changed().await.unwrap();
        {
            let s = rx.borrow_and_update();
            assert_eq!(s.plants.len(), 1);
            assert_eq!(s.filtered_plants.len(), 1);
        }

        store.set_search_term("tulip");
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().filtered_plants.is_empty());
    }
}
