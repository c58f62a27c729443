//! Bulk parcel deletion
//!
//! Removes parcels and their ledger entries in one transaction. Unknown
//! trackings are reported back rather than failing the request.

use serde::{Deserialize, Serialize};

use crate::store::{ParcelStore, StoreError};

/// Command to delete a batch of parcels by tracking code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteParcelsCommand {
    pub trackings: Vec<String>,
}

/// Deletion report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteParcelsSummary {
    pub requested: usize,
    pub deleted: u64,
    pub not_found: Vec<String>,
}

/// Errors from bulk deletion
#[derive(Debug, thiserror::Error)]
pub enum DeleteParcelsError {
    #[error("{0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for bulk deletion. Ledger entries go first so no orphaned
/// history survives the parcels.
#[tracing::instrument(skip(store, command), fields(count = command.trackings.len()))]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: DeleteParcelsCommand,
) -> Result<DeleteParcelsSummary, DeleteParcelsError> {
    if command.trackings.is_empty() {
        return Err(DeleteParcelsError::Validation(
            "tracking list is empty".into(),
        ));
    }

    store.begin().await?;
    let result = delete(store, &command.trackings).await;
    match result {
        Ok(summary) => {
            store.commit().await?;
            tracing::info!(
                requested = summary.requested,
                deleted = summary.deleted,
                "parcels deleted"
            );
            Ok(summary)
        },
        Err(err) => {
            let _ = store.rollback().await;
            Err(err)
        },
    }
}

async fn delete<S: ParcelStore>(
    store: &mut S,
    trackings: &[String],
) -> Result<DeleteParcelsSummary, DeleteParcelsError> {
    let mut normalized: Vec<String> = Vec::with_capacity(trackings.len());
    let mut parcel_ids = Vec::new();
    let mut not_found = Vec::new();
    for tracking in trackings {
        let code = tracking.trim().to_uppercase();
        match store.find_by_tracking_code(&code).await? {
            Some(parcel) => {
                parcel_ids.push(parcel.id);
                normalized.push(code);
            },
            None => not_found.push(tracking.clone()),
        }
    }

    store.purge_transitions(&parcel_ids).await?;
    let deleted = store.delete_parcels(&normalized).await?;
    Ok(DeleteParcelsSummary {
        requested: trackings.len(),
        deleted,
        not_found,
    })
}
