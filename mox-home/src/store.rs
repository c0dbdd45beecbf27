//! Accessory store seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mox_protocol::{AccessoryKey, AccessoryKind};

use crate::model::{Accessory, House, HouseId};

/// Errors reported by an accessory store backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store is not connected")]
    NotConnected,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence for houses, accessories and unregistered sightings
///
/// Implementations must be safe to call from several workers at once.
/// `connect` and `close` may be called more than once.
#[async_trait]
pub trait AccessoryStore: Send + Sync {
    async fn connect(&self) -> StoreResult<()>;

    async fn close(&self) -> StoreResult<()>;

    async fn find_house(&self, id: &HouseId) -> StoreResult<Option<House>>;

    /// Looks up an accessory by key, optionally requiring a kind
    async fn find_by_key(
        &self,
        key: AccessoryKey,
        kind: Option<AccessoryKind>,
    ) -> StoreResult<Option<Accessory>>;

    /// Records a sighting of an unregistered key, creating the record on
    /// first sight and refreshing `last_seen_at` afterwards
    async fn upsert_missing_sighting(
        &self,
        key: AccessoryKey,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn save(&self, accessory: &Accessory) -> StoreResult<()>;

    /// Accessories whose `updated_at` is strictly before `older_than`
    async fn find_stale(&self, older_than: DateTime<Utc>) -> StoreResult<Vec<Accessory>>;
}
