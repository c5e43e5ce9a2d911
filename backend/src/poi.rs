//! Nearby place lookup used to give generated collectibles real names.

use std::{num::NonZeroUsize, sync::Arc, sync::Mutex, time::Duration};

use async_trait::async_trait;
use lru::LruCache;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::{
    models::{CollectiblePoint, Coordinate},
    policy::category_search_keywords,
};

const MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PoiItem {
    pub name: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PoiError {
    #[error("place search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("place search rejected the query: {0}")]
    Api(String),
}

#[async_trait]
pub trait PoiSearchProvider: Send + Sync {
    async fn search_nearby(
        &self,
        keyword: &str,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Vec<PoiItem>, PoiError>;
}

/// Named features from an Overpass API endpoint.
pub struct OverpassPoiSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl OverpassPoiSearch {
    pub fn new(endpoint: &str) -> Result<Self, PoiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(8))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    fn query(keyword: &str, center: Coordinate, radius_m: f64) -> String {
        let pattern: String = keyword
            .chars()
            .filter(|c| !matches!(c, '"' | '\\'))
            .collect();
        format!(
            "[out:json][timeout:5];nwr(around:{:.0},{},{})[\"name\"~\"{}\",i];out tags {};",
            radius_m, center.lat, center.lon, pattern, MAX_RESULTS
        )
    }
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
    remark: Option<String>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(default)]
    tags: std::collections::HashMap<String, String>,
}

impl OverpassResponse {
    fn into_items(self) -> Vec<PoiItem> {
        self.elements
            .into_iter()
            .filter_map(|mut element| {
                let name = element.tags.remove("name")?;
                let phone_number = element
                    .tags
                    .remove("phone")
                    .or_else(|| element.tags.remove("contact:phone"));
                Some(PoiItem { name, phone_number })
            })
            .take(MAX_RESULTS)
            .collect()
    }
}

#[async_trait]
impl PoiSearchProvider for OverpassPoiSearch {
    async fn search_nearby(
        &self,
        keyword: &str,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Vec<PoiItem>, PoiError> {
        let query = Self::query(keyword, center, radius_m);
        let response: OverpassResponse = self
            .client
            .post(&self.endpoint)
            .form(&[("data", query)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.elements.is_empty() {
            if let Some(remark) = &response.remark {
                return Err(PoiError::Api(remark.clone()));
            }
        }
        Ok(response.into_items())
    }
}

type CacheKey = (String, i64, i64);

/// LRU cache in front of another provider. Only successful lookups are kept.
pub struct CachedPoiSearch {
    inner: Arc<dyn PoiSearchProvider>,
    cache: Mutex<LruCache<CacheKey, Vec<PoiItem>>>,
}

impl CachedPoiSearch {
    pub fn new(inner: Arc<dyn PoiSearchProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(keyword: &str, center: Coordinate) -> CacheKey {
        // ~11 m buckets
        (
            keyword.to_string(),
            (center.lat * 10_000.0).round() as i64,
            (center.lon * 10_000.0).round() as i64,
        )
    }
}

#[async_trait]
impl PoiSearchProvider for CachedPoiSearch {
    async fn search_nearby(
        &self,
        keyword: &str,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Vec<PoiItem>, PoiError> {
        let key = Self::key(keyword, center);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let items = self.inner.search_nearby(keyword, center, radius_m).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, items.clone());
        }
        Ok(items)
    }
}

/// A resolved real-world name for a generated point, tagged with the session
/// that requested it.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiRefinement {
    pub session_id: Uuid,
    pub point_id: Uuid,
    pub name: String,
    pub description: String,
}

/// Fire-and-forget resolution of generated points against nearby places.
#[derive(Clone)]
pub struct PoiRefiner {
    search: Arc<dyn PoiSearchProvider>,
    radius_m: f64,
}

impl PoiRefiner {
    pub fn new(search: Arc<dyn PoiSearchProvider>, radius_m: f64) -> Self {
        Self { search, radius_m }
    }

    /// Spawn one lookup per point. Results arrive on `sender` whenever they
    /// resolve; misses and failures are dropped and the fallback name stays.
    pub fn spawn(
        &self,
        session_id: Uuid,
        points: &[CollectiblePoint],
        sender: UnboundedSender<PoiRefinement>,
    ) {
        let lookups: Vec<(Uuid, CollectiblePoint, &'static str)> = {
            let mut rng = rand::thread_rng();
            points
                .iter()
                .filter_map(|point| {
                    let keyword = category_search_keywords(point.category).choose(&mut rng)?;
                    Some((point.id, point.clone(), *keyword))
                })
                .collect()
        };

        for (point_id, point, keyword) in lookups {
            let refiner = self.clone();
            let sender = sender.clone();
            tokio::spawn(async move {
                let Some(refinement) = refiner.resolve(session_id, &point, keyword).await else {
                    return;
                };
                if sender.send(refinement).is_err() {
                    tracing::debug!("refinement for {point_id} dropped: listener gone");
                }
            });
        }
    }

    async fn resolve(
        &self,
        session_id: Uuid,
        point: &CollectiblePoint,
        keyword: &str,
    ) -> Option<PoiRefinement> {
        let items = match self
            .search
            .search_nearby(keyword, point.coordinate, self.radius_m)
            .await
        {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!("place search for {keyword:?} near {} failed: {err}", point.id);
                return None;
            }
        };

        let item = items.into_iter().next()?;
        let description = match item.phone_number {
            Some(phone) => format!("电话：{phone}"),
            None => point.category.default_description().to_string(),
        };
        tracing::debug!("resolved {} to {:?}", point.id, item.name);
        Some(PoiRefinement {
            session_id,
            point_id: point.id,
            name: item.name,
            description,
        })
    }
}
