//! Bag management
//!
//! Bags are identified by their seal number. Creation is idempotent;
//! deletion refuses while any parcel still references the bag.

use serde::{Deserialize, Serialize};

use crate::store::{Bag, ParcelStore, StoreError};

/// Command to create (or fetch) a bag by seal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBagCommand {
    pub seal: String,
}

/// Command to delete an empty bag by seal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteBagCommand {
    pub seal: String,
}

/// Errors from bag operations
#[derive(Debug, thiserror::Error)]
pub enum BagError {
    #[error("Seal number is required")]
    SealRequired,

    #[error("Bag with seal '{0}' not found")]
    NotFound(String),

    #[error("Bag with seal '{0}' still holds {1} parcel(s)")]
    NotEmpty(String, i64),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[tracing::instrument(skip(store), fields(seal = %command.seal))]
pub async fn create(
    store: &mut impl ParcelStore,
    command: CreateBagCommand,
) -> Result<Bag, BagError> {
    if command.seal.trim().is_empty() {
        return Err(BagError::SealRequired);
    }

    store.begin().await?;
    let result = store.find_or_create_bag(command.seal.trim()).await;
    match result {
        Ok(bag) => {
            store.commit().await?;
            Ok(bag)
        },
        Err(err) => {
            let _ = store.rollback().await;
            Err(err.into())
        },
    }
}

#[tracing::instrument(skip(store), fields(seal = %command.seal))]
pub async fn delete_empty(
    store: &mut impl ParcelStore,
    command: DeleteBagCommand,
) -> Result<(), BagError> {
    if command.seal.trim().is_empty() {
        return Err(BagError::SealRequired);
    }

    store.begin().await?;
    let result = delete_inner(store, command.seal.trim()).await;
    match result {
        Ok(()) => {
            store.commit().await?;
            Ok(())
        },
        Err(err) => {
            let _ = store.rollback().await;
            Err(err)
        },
    }
}

async fn delete_inner(store: &mut impl ParcelStore, seal: &str) -> Result<(), BagError> {
    let bag = store
        .find_bag_by_seal(seal)
        .await?
        .ok_or_else(|| BagError::NotFound(seal.to_string()))?;
    let count = store.count_by_bag(bag.id).await?;
    if count > 0 {
        return Err(BagError::NotEmpty(seal.to_string(), count));
    }
    store.delete_bag(bag.id).await?;
    tracing::info!(seal, "bag deleted");
    Ok(())
}
