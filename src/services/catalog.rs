//! Read-only view of the catalog used by circulation

use async_trait::async_trait;

use crate::error::AppResult;

/// Item metadata provider. The circulation core never writes through it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn item_exists(&self, item_id: i32) -> AppResult<bool>;

    async fn is_digital(&self, item_id: i32) -> AppResult<bool>;

    async fn title(&self, item_id: i32) -> AppResult<Option<String>>;
}
