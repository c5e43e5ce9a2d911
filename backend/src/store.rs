use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::CollectibleItem;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid collectible row: {0}")]
    InvalidData(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of collected items.
///
/// Writes are two-phase: `insert` stages an item and `commit` persists every
/// staged item at once. A failed commit discards what was staged, so callers
/// can retry from scratch.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, item: CollectibleItem) -> Result<(), StoreError>;

    async fn commit(&self) -> Result<(), StoreError>;

    /// Every stored item, most recently collected first.
    async fn fetch_all(&self) -> Result<Vec<CollectibleItem>, StoreError>;
}

/// In-process store, used when no database is configured.
#[derive(Default)]
pub struct MemoryItemStore {
    pending: Mutex<Vec<CollectibleItem>>,
    committed: Mutex<Vec<CollectibleItem>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CollectibleItem>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            committed: Mutex::new(items),
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn insert(&self, item: CollectibleItem) -> Result<(), StoreError> {
        self.pending.lock().map_err(poisoned)?.push(item);
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let staged: Vec<_> = self.pending.lock().map_err(poisoned)?.drain(..).collect();
        self.committed.lock().map_err(poisoned)?.extend(staged);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<CollectibleItem>, StoreError> {
        let mut items = self.committed.lock().map_err(poisoned)?.clone();
        items.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::CollectibleCategory;

    fn item(name: &str, minutes_ago: i64) -> CollectibleItem {
        CollectibleItem {
            id: Uuid::new_v4(),
            name: name.into(),
            category: CollectibleCategory::Landmark,
            latitude: 39.9,
            longitude: 116.4,
            collected_at: Utc::now() - Duration::minutes(minutes_ago),
            route_type_tag: "scenic".into(),
            description: "打卡城市地标".into(),
            icon_key: "building.columns.fill".into(),
        }
    }

    #[tokio::test]
    async fn staged_items_are_invisible_until_commit() {
        let store = MemoryItemStore::new();
        store.insert(item("钟楼", 0)).await.unwrap();
        assert!(store.fetch_all().await.unwrap().is_empty());

        store.commit().await.unwrap();
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_all_is_newest_first() {
        let store = MemoryItemStore::with_items(vec![
            item("古城门", 30),
            item("钟楼", 5),
            item("纪念碑", 60),
        ]);
        let names: Vec<_> = store
            .fetch_all()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["钟楼", "古城门", "纪念碑"]);
    }
}
