// Postgres-backed item store
// Staged inserts are flushed in a single transaction on commit

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{CollectibleCategory, CollectibleItem};
use crate::store::{ItemStore, StoreError};

/// Row shape of `collectible_items`
#[derive(Debug, Clone, FromRow)]
struct CollectibleItemRow {
    id: Uuid,
    name: String,
    category: String,
    latitude: f64,
    longitude: f64,
    collected_at: DateTime<Utc>,
    route_type_tag: String,
    description: String,
    icon_key: String,
}

impl TryFrom<CollectibleItemRow> for CollectibleItem {
    type Error = StoreError;

    fn try_from(row: CollectibleItemRow) -> Result<Self, Self::Error> {
        let category = row
            .category
            .parse::<CollectibleCategory>()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(CollectibleItem {
            id: row.id,
            name: row.name,
            category,
            latitude: row.latitude,
            longitude: row.longitude,
            collected_at: row.collected_at,
            route_type_tag: row.route_type_tag,
            description: row.description,
            icon_key: row.icon_key,
        })
    }
}

pub struct PgItemStore {
    pool: PgPool,
    pending: Mutex<Vec<CollectibleItem>>,
}

impl PgItemStore {
    /// Connect to `database_url`
    ///
    /// # Errors
    /// Returns StoreError if the connection fails
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        if database_url.trim().is_empty() {
            return Err(StoreError::ConfigError("database url is empty".to_string()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool created");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Create the `collectible_items` table if needed
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;

        let migration_sql = include_str!("../migrations/20260110_create_collectible_items.sql");

        sqlx::raw_sql(migration_sql).execute(&mut *conn).await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, item: CollectibleItem) -> Result<(), StoreError> {
        self.pending.lock().await.push(item);
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let staged: Vec<CollectibleItem> = self.pending.lock().await.drain(..).collect();
        if staged.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for item in &staged {
            sqlx::query(
                r#"
                INSERT INTO collectible_items (
                    id, name, category, latitude, longitude,
                    collected_at, route_type_tag, description, icon_key
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id)
            .bind(&item.name)
            .bind(item.category.as_str())
            .bind(item.latitude)
            .bind(item.longitude)
            .bind(item.collected_at)
            .bind(&item.route_type_tag)
            .bind(&item.description)
            .bind(&item.icon_key)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!("Committed {} collectible item(s)", staged.len());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<CollectibleItem>, StoreError> {
        let rows = sqlx::query_as::<_, CollectibleItemRow>(
            "SELECT * FROM collectible_items ORDER BY collected_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::info!("Retrieved {} collectible items", rows.len());
        rows.into_iter().map(CollectibleItem::try_from).collect()
    }
}
