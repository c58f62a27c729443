//! Parcel store gateway
//!
//! All persistence flows through the [`ParcelStore`] trait. The production
//! implementation is [`PgParcelStore`]; [`MemoryStore`] provides the same
//! contract in memory for unit tests.
//!
//! # Transaction contract
//!
//! Every logical operation runs inside one store transaction: callers invoke
//! [`ParcelStore::begin`], perform their reads and writes, then
//! [`ParcelStore::commit`] or [`ParcelStore::rollback`]. Implementations may
//! require an open transaction for data operations.

pub mod memory;
pub mod model;
pub mod postgres;

pub use memory::MemoryStore;
pub use model::{Bag, District, ManifestUpdate, NewParcel, NewTransition, Parcel, TransitionRecord};
pub use postgres::PgParcelStore;

use async_trait::async_trait;
use thiserror::Error;

/// Store-level errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    NotFound(String),

    /// Persisted data that no longer parses (e.g. an unknown state code)
    #[error("Corrupt store data: {0}")]
    Corrupt(String),

    #[error("Transaction misuse: {0}")]
    Transaction(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The narrow persistence gateway the domain operations are written against.
#[async_trait]
pub trait ParcelStore: Send {
    // -- transaction boundary --------------------------------------------

    async fn begin(&mut self) -> StoreResult<()>;
    async fn commit(&mut self) -> StoreResult<()>;
    async fn rollback(&mut self) -> StoreResult<()>;

    // -- parcels ----------------------------------------------------------

    async fn find_by_tracking_code(&mut self, tracking: &str) -> StoreResult<Option<Parcel>>;
    async fn exists_by_tracking_code(&mut self, tracking: &str) -> StoreResult<bool>;

    /// Insert a new parcel in the initial lifecycle state. Fails with
    /// [`StoreError::Duplicate`] when the tracking code already exists.
    async fn insert_parcel(&mut self, parcel: NewParcel) -> StoreResult<Parcel>;

    /// Persist every mutable field of an existing parcel.
    async fn update_parcel(&mut self, parcel: &Parcel) -> StoreResult<()>;

    /// Insert many parcels, silently skipping tracking codes that already
    /// exist. Returns the tracking codes actually inserted.
    async fn batch_insert_ignore(&mut self, parcels: &[NewParcel]) -> StoreResult<Vec<String>>;

    /// Apply manifest merge updates: bag, district, received timestamp and
    /// actor always win; observations and responsible only overwrite when
    /// the incoming value is present.
    async fn batch_update_manifest(&mut self, updates: &[ManifestUpdate]) -> StoreResult<()>;

    /// Delete parcels by tracking code, returning how many went away.
    /// Ledger entries must be purged first.
    async fn delete_parcels(&mut self, trackings: &[String]) -> StoreResult<u64>;

    // -- bags and districts ----------------------------------------------

    async fn find_or_create_bag(&mut self, seal: &str) -> StoreResult<Bag>;
    async fn find_bag_by_seal(&mut self, seal: &str) -> StoreResult<Option<Bag>>;
    async fn delete_bag(&mut self, bag_id: i64) -> StoreResult<()>;
    async fn count_by_bag(&mut self, bag_id: i64) -> StoreResult<i64>;

    async fn find_or_create_district(&mut self, name: &str) -> StoreResult<District>;
    async fn find_district_by_name(&mut self, name: &str) -> StoreResult<Option<District>>;

    // -- audit ledger ----------------------------------------------------

    async fn append_transition(&mut self, transition: NewTransition) -> StoreResult<()>;

    /// Ledger entries for one parcel, most recent first
    /// (`changed_at` descending, id breaking ties).
    async fn transitions_for_parcel(&mut self, parcel_id: i64)
        -> StoreResult<Vec<TransitionRecord>>;

    /// Bulk purge of ledger entries, used only when deleting parcels.
    async fn purge_transitions(&mut self, parcel_ids: &[i64]) -> StoreResult<()>;
}
