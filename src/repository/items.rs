//! Items repository: read-only catalog lookups for circulation

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{error::AppResult, services::catalog::CatalogLookup};

#[derive(Clone)]
pub struct PgCatalogLookup {
    pool: Pool<Postgres>,
}

impl PgCatalogLookup {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogLookup for PgCatalogLookup {
    async fn item_exists(&self, item_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn is_digital(&self, item_id: i32) -> AppResult<bool> {
        let digital: Option<bool> = sqlx::query_scalar("SELECT is_digital FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(digital.unwrap_or(false))
    }

    async fn title(&self, item_id: i32) -> AppResult<Option<String>> {
        let title: Option<String> = sqlx::query_scalar("SELECT title FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(title)
    }
}
