//! Session state for collectible points and the player's inventory.
//!
//! `CollectionManager` owns the points generated for the running session and
//! a cached copy of every collected item. The store is the durable owner of
//! items; the cache only changes after a write has been committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    geo::haversine_m,
    models::{
        CollectibleItem, CollectiblePoint, CollectionStats, Coordinate, SpecialRouteType,
    },
    poi::PoiRefinement,
    store::{ItemStore, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("a {0} collectible within range of this spot is already collected")]
    AlreadyCollected(String),

    #[error("no collectible with id {0} in the current session")]
    UnknownPoint(Uuid),

    #[error("could not save collected item: {0}")]
    StoreWriteFailed(#[from] StoreError),
}

pub struct CollectionManager {
    store: Arc<dyn ItemStore>,
    config: EngineConfig,
    available: Vec<CollectiblePoint>,
    collected: Vec<CollectibleItem>,
    current_location: Option<Coordinate>,
    current_heading: Option<f64>,
    session_id: Option<Uuid>,
    theme: SpecialRouteType,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn ItemStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            available: Vec::new(),
            collected: Vec::new(),
            current_location: None,
            current_heading: None,
            session_id: None,
            theme: SpecialRouteType::None,
        }
    }

    /// Replace the cached items with the store's contents. A failed read
    /// leaves the manager usable with an empty inventory.
    pub async fn load_persisted(&mut self) {
        match self.store.fetch_all().await {
            Ok(items) => {
                tracing::info!("loaded {} collected item(s)", items.len());
                self.collected = items;
            }
            Err(err) => {
                tracing::warn!("could not load collected items, starting empty: {err}");
                self.collected = Vec::new();
            }
        }
        self.refresh();
    }

    pub fn begin_session(
        &mut self,
        theme: SpecialRouteType,
        points: Vec<CollectiblePoint>,
    ) -> Uuid {
        let session_id = Uuid::new_v4();
        tracing::info!(
            "session {session_id} started: {theme} route with {} collectible(s)",
            points.len()
        );
        self.session_id = Some(session_id);
        self.theme = theme;
        self.available = points;
        self.refresh();
        session_id
    }

    pub fn end_session(&mut self) {
        if let Some(session_id) = self.session_id.take() {
            tracing::info!("session {session_id} ended");
        }
        self.available.clear();
        self.theme = SpecialRouteType::None;
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn theme(&self) -> SpecialRouteType {
        self.theme
    }

    pub fn set_location(&mut self, coordinate: Coordinate, heading: Option<f64>) {
        self.current_location = Some(coordinate);
        if heading.is_some() {
            self.current_heading = heading;
        }
    }

    pub fn current_location(&self) -> Option<Coordinate> {
        self.current_location
    }

    pub fn current_heading(&self) -> Option<f64> {
        self.current_heading
    }

    /// Uncollected points within the collection radius of `coordinate`.
    pub fn in_range(&self, coordinate: Coordinate) -> Vec<CollectiblePoint> {
        self.available
            .iter()
            .filter(|point| {
                !point.is_collected
                    && haversine_m(coordinate, point.coordinate) <= self.config.collection_radius_m
            })
            .cloned()
            .collect()
    }

    /// Promote `point` into a persisted item.
    ///
    /// # Errors
    /// `AlreadyCollected` when an item of the same category lies within the
    /// dedup radius (nothing is written), `StoreWriteFailed` when the store
    /// rejects the write (in-memory state is untouched).
    pub async fn collect(
        &mut self,
        point: &CollectiblePoint,
        theme: SpecialRouteType,
    ) -> Result<CollectibleItem, CollectError> {
        if self.matches_collected(point) {
            tracing::debug!("{} ({}) already collected nearby", point.name, point.category);
            return Err(CollectError::AlreadyCollected(point.category.to_string()));
        }

        let description = if point.description.is_empty() {
            point.category.default_description().to_string()
        } else {
            point.description.clone()
        };
        let item = CollectibleItem {
            id: Uuid::new_v4(),
            name: point.name.clone(),
            category: point.category,
            latitude: point.coordinate.lat,
            longitude: point.coordinate.lon,
            collected_at: Utc::now(),
            route_type_tag: theme.as_str().to_string(),
            description,
            icon_key: point.category.icon_key().to_string(),
        };

        self.store.insert(item.clone()).await?;
        if let Err(err) = self.store.commit().await {
            tracing::error!("commit of {} failed: {err}", item.name);
            return Err(err.into());
        }

        tracing::info!("collected {} ({})", item.name, item.category);
        self.collected.insert(0, item.clone());
        self.refresh();
        Ok(item)
    }

    pub async fn collect_by_id(&mut self, point_id: Uuid) -> Result<CollectibleItem, CollectError> {
        let point = self
            .available
            .iter()
            .find(|point| point.id == point_id)
            .cloned()
            .ok_or(CollectError::UnknownPoint(point_id))?;
        let theme = self.theme;
        self.collect(&point, theme).await
    }

    /// Rebuild every available point with `is_collected` derived from the
    /// collected items.
    pub fn refresh(&mut self) {
        let refreshed: Vec<CollectiblePoint> = self
            .available
            .iter()
            .map(|point| CollectiblePoint {
                is_collected: self.matches_collected(point),
                ..point.clone()
            })
            .collect();
        self.available = refreshed;
    }

    pub fn stats(&self) -> CollectionStats {
        let mut by_category = BTreeMap::new();
        for item in &self.collected {
            *by_category.entry(item.category).or_insert(0) += 1;
        }
        CollectionStats {
            total: self.collected.len(),
            by_category,
        }
    }

    /// Patch a point with a resolved place name. Returns false for
    /// refinements from another session or for points no longer available.
    pub fn apply_refinement(&mut self, refinement: &PoiRefinement) -> bool {
        if self.session_id != Some(refinement.session_id) {
            tracing::debug!(
                "discarding stale refinement for {} from session {}",
                refinement.point_id,
                refinement.session_id
            );
            return false;
        }

        let Some(point) = self
            .available
            .iter_mut()
            .find(|point| point.id == refinement.point_id)
        else {
            return false;
        };
        point.name = refinement.name.clone();
        point.description = refinement.description.clone();
        true
    }

    pub fn available(&self) -> &[CollectiblePoint] {
        &self.available
    }

    pub fn collected(&self) -> &[CollectibleItem] {
        &self.collected
    }

    fn matches_collected(&self, point: &CollectiblePoint) -> bool {
        self.collected.iter().any(|item| {
            item.category == point.category
                && haversine_m(item.coordinate(), point.coordinate) < self.config.dedup_radius_m
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::geo::offset_coordinate;
    use crate::models::CollectibleCategory;
    use crate::store::MemoryItemStore;

    /// Store that counts writes and can be told to fail them.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryItemStore,
        fail_commit: bool,
        fail_read: bool,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl ItemStore for FlakyStore {
        async fn insert(&self, item: CollectibleItem) -> Result<(), StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(item).await
        }

        async fn commit(&self) -> Result<(), StoreError> {
            if self.fail_commit {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.commit().await
        }

        async fn fetch_all(&self) -> Result<Vec<CollectibleItem>, StoreError> {
            if self.fail_read {
                return Err(StoreError::Unavailable("locked".into()));
            }
            self.inner.fetch_all().await
        }
    }

    fn origin() -> Coordinate {
        Coordinate { lat: 39.90, lon: 116.40 }
    }

    fn point_at(category: CollectibleCategory, coordinate: Coordinate) -> CollectiblePoint {
        CollectiblePoint {
            id: Uuid::new_v4(),
            name: "街角面馆".into(),
            category,
            coordinate,
            description: category.default_description().into(),
            is_collected: false,
        }
    }

    fn manager(store: Arc<dyn ItemStore>) -> CollectionManager {
        CollectionManager::new(store, EngineConfig::default())
    }

    #[tokio::test]
    async fn nearby_same_category_is_already_collected() {
        let store = Arc::new(FlakyStore::default());
        let mut manager = manager(store.clone());
        let p = point_at(CollectibleCategory::Food, origin());
        let q = point_at(
            CollectibleCategory::Food,
            offset_coordinate(origin(), 30.0, 1.0),
        );
        manager.begin_session(SpecialRouteType::Food, vec![p.clone(), q.clone()]);

        let item = manager.collect(&p, SpecialRouteType::Food).await.unwrap();
        assert_eq!(item.route_type_tag, "food");
        assert_eq!(item.icon_key, "fork.knife");

        let second = manager.collect(&q, SpecialRouteType::Food).await;
        assert!(matches!(second, Err(CollectError::AlreadyCollected(_))));
        assert_eq!(manager.stats().total, 1);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn collecting_the_same_point_twice_writes_once() {
        let store = Arc::new(FlakyStore::default());
        let mut manager = manager(store.clone());
        let p = point_at(CollectibleCategory::Scenic, origin());
        manager.begin_session(SpecialRouteType::Scenic, vec![p.clone()]);

        manager.collect_by_id(p.id).await.unwrap();
        assert!(matches!(
            manager.collect_by_id(p.id).await,
            Err(CollectError::AlreadyCollected(_))
        ));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert!(manager.available()[0].is_collected);
    }

    #[tokio::test]
    async fn different_category_at_same_spot_is_collectable() {
        let mut manager = manager(Arc::new(MemoryItemStore::new()));
        let food = point_at(CollectibleCategory::Food, origin());
        let culture = point_at(CollectibleCategory::Culture, origin());
        manager.begin_session(SpecialRouteType::Food, vec![food.clone(), culture.clone()]);

        manager.collect(&food, SpecialRouteType::Food).await.unwrap();
        manager.collect(&culture, SpecialRouteType::Food).await.unwrap();

        let stats = manager.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_category[&CollectibleCategory::Food], 1);
        assert_eq!(stats.by_category[&CollectibleCategory::Culture], 1);
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_unchanged() {
        let store = Arc::new(FlakyStore {
            fail_commit: true,
            ..Default::default()
        });
        let mut manager = manager(store);
        let p = point_at(CollectibleCategory::Landmark, origin());
        manager.begin_session(SpecialRouteType::Scenic, vec![p.clone()]);

        let result = manager.collect(&p, SpecialRouteType::Scenic).await;
        assert!(matches!(result, Err(CollectError::StoreWriteFailed(_))));
        assert!(manager.collected().is_empty());
        assert!(!manager.available()[0].is_collected);
        assert_eq!(manager.in_range(origin()).len(), 1);
    }

    #[tokio::test]
    async fn unknown_point_id_is_reported() {
        let mut manager = manager(Arc::new(MemoryItemStore::new()));
        let missing = Uuid::new_v4();
        let result = manager.collect_by_id(missing).await;
        assert!(matches!(result, Err(CollectError::UnknownPoint(id)) if id == missing));
    }

    #[tokio::test]
    async fn failed_read_starts_with_empty_inventory() {
        let store = Arc::new(FlakyStore {
            fail_read: true,
            ..Default::default()
        });
        let mut manager = manager(store);
        manager.load_persisted().await;
        assert_eq!(manager.stats().total, 0);

        let p = point_at(CollectibleCategory::Food, origin());
        manager.begin_session(SpecialRouteType::Food, vec![p.clone()]);
        assert_eq!(manager.in_range(origin()).len(), 1);
    }

    #[tokio::test]
    async fn persisted_items_mark_points_collected() {
        let mut seed = manager(Arc::new(MemoryItemStore::new()));
        let p = point_at(CollectibleCategory::Attraction, origin());
        seed.begin_session(SpecialRouteType::Attractions, vec![p.clone()]);
        let item = seed.collect(&p, SpecialRouteType::Attractions).await.unwrap();

        let mut manager = manager(Arc::new(MemoryItemStore::with_items(vec![item])));
        manager.load_persisted().await;
        let fresh = point_at(
            CollectibleCategory::Attraction,
            offset_coordinate(origin(), 10.0, 0.0),
        );
        manager.begin_session(SpecialRouteType::Attractions, vec![fresh]);
        assert!(manager.available()[0].is_collected);
        assert!(manager.in_range(origin()).is_empty());
    }

    #[test]
    fn in_range_respects_radius() {
        let mut manager = manager(Arc::new(MemoryItemStore::new()));
        let near = point_at(CollectibleCategory::Scenic, offset_coordinate(origin(), 80.0, 0.5));
        let far = point_at(CollectibleCategory::Scenic, offset_coordinate(origin(), 150.0, 0.5));
        manager.begin_session(SpecialRouteType::Scenic, vec![near.clone(), far]);

        let in_range = manager.in_range(origin());
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, near.id);
    }

    #[test]
    fn end_session_clears_points_only() {
        let mut manager = manager(Arc::new(MemoryItemStore::new()));
        manager.begin_session(
            SpecialRouteType::Food,
            vec![point_at(CollectibleCategory::Food, origin())],
        );
        manager.set_location(origin(), Some(90.0));
        manager.end_session();

        assert!(manager.available().is_empty());
        assert_eq!(manager.session_id(), None);
        assert_eq!(manager.theme(), SpecialRouteType::None);
        assert_eq!(manager.current_location(), Some(origin()));
        assert_eq!(manager.current_heading(), Some(90.0));
    }

    #[test]
    fn refinements_apply_only_to_active_session() {
        let mut manager = manager(Arc::new(MemoryItemStore::new()));
        let p = point_at(CollectibleCategory::Food, origin());
        let old_session = manager.begin_session(SpecialRouteType::Food, vec![p.clone()]);
        let session = manager.begin_session(SpecialRouteType::Food, vec![p.clone()]);

        let stale = PoiRefinement {
            session_id: old_session,
            point_id: p.id,
            name: "旧名字".into(),
            description: String::new(),
        };
        assert!(!manager.apply_refinement(&stale));
        assert_eq!(manager.available()[0].name, "街角面馆");

        let fresh = PoiRefinement {
            session_id: session,
            point_id: p.id,
            name: "四季民福".into(),
            description: "电话：010-12345678".into(),
        };
        assert!(manager.apply_refinement(&fresh));
        assert_eq!(manager.available()[0].name, "四季民福");
        assert_eq!(manager.available()[0].description, "电话：010-12345678");

        let unknown = PoiRefinement {
            point_id: Uuid::new_v4(),
            ..fresh
        };
        assert!(!manager.apply_refinement(&unknown));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_in_range_never_returns_far_or_collected(
                offsets in prop::collection::vec((0.0f64..400.0, 0.0f64..std::f64::consts::TAU, any::<bool>()), 0..30),
                radius in 10.0f64..300.0,
            ) {
                let config = EngineConfig { collection_radius_m: radius, ..EngineConfig::default() };
                let mut manager = CollectionManager::new(Arc::new(MemoryItemStore::new()), config);
                let points: Vec<_> = offsets
                    .iter()
                    .map(|&(distance, bearing, _)| point_at(CollectibleCategory::Scenic, offset_coordinate(origin(), distance, bearing)))
                    .collect();
                manager.begin_session(SpecialRouteType::Scenic, points);
                for (point, &(_, _, collected)) in manager.available.iter_mut().zip(&offsets) {
                    point.is_collected = collected;
                }

                for point in manager.in_range(origin()) {
                    prop_assert!(!point.is_collected);
                    prop_assert!(haversine_m(origin(), point.coordinate) <= radius);
                }
            }
        }
    }
}
