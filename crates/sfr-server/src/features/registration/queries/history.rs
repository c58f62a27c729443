//! Per-parcel transition history
//!
//! Reads the append-only ledger for one parcel, newest first.

use serde::Serialize;

use sfr_common::{ParcelState, TrackingCode};

use crate::store::{ParcelStore, StoreError, TransitionRecord};

/// Query for one parcel's ledger
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub tracking: String,
}

/// Ledger read result, newest entry first
#[derive(Debug, Clone, Serialize)]
pub struct ParcelHistory {
    pub tracking: String,
    pub state: ParcelState,
    pub transitions: Vec<TransitionRecord>,
}

/// Errors from history reads
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Invalid tracking code: {0}")]
    InvalidTracking(String),

    #[error("Parcel '{0}' not found")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[tracing::instrument(skip(store), fields(tracking = %query.tracking))]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    query: HistoryQuery,
) -> Result<ParcelHistory, HistoryError> {
    let tracking = TrackingCode::parse(&query.tracking)
        .map_err(|_| HistoryError::InvalidTracking(query.tracking.clone()))?;

    store.begin().await?;
    let result = read(store, &tracking).await;
    match result {
        Ok(history) => {
            store.commit().await?;
            Ok(history)
        },
        Err(err) => {
            let _ = store.rollback().await;
            Err(err)
        },
    }
}

async fn read<S: ParcelStore>(
    store: &mut S,
    tracking: &TrackingCode,
) -> Result<ParcelHistory, HistoryError> {
    let parcel = store
        .find_by_tracking_code(tracking.as_str())
        .await?
        .ok_or_else(|| HistoryError::NotFound(tracking.as_str().to_string()))?;
    let transitions = store.transitions_for_parcel(parcel.id).await?;
    Ok(ParcelHistory {
        tracking: tracking.as_str().to_string(),
        state: parcel.state,
        transitions,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::features::transitions::commands::{apply, TransitionCommand};
    use crate::features::registration::commands::preregister::{self, PreregisterCommand};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_history_newest_first() {
        let mut store = MemoryStore::new();
        preregister::handle(
            &mut store,
            PreregisterCommand {
                tracking: "HZCR1".to_string(),
                seal: None,
                district: None,
                received_at: None,
                actor: "desk".to_string(),
            },
        )
        .await
        .unwrap();
        apply::handle(
            &mut store,
            TransitionCommand {
                tracking: "HZCR1".to_string(),
                target: ParcelState::DeliveredToLocalCarrier,
                motive: None,
                actor: "ops".to_string(),
                when: None,
                force: false,
                return_subtype: None,
            },
        )
        .await
        .unwrap();

        let history = handle(
            &mut store,
            HistoryQuery {
                tracking: "hzcr1".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(history.state, ParcelState::DeliveredToLocalCarrier);
        assert_eq!(history.transitions.len(), 2);
        assert_eq!(
            history.transitions[0].to_state,
            ParcelState::DeliveredToLocalCarrier
        );
        assert_eq!(history.transitions[1].from_state, None);
    }

    #[tokio::test]
    async fn test_unknown_parcel() {
        let mut store = MemoryStore::new();
        let err = handle(
            &mut store,
            HistoryQuery {
                tracking: "CR404".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(_)));
    }
}
