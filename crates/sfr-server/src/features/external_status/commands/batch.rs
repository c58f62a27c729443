//! Batch external-status updates
//!
//! Same item-isolation contract as batch transitions: every tracking gets
//! its own store transaction and its own result entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sfr_common::tracking::extract_tracking_codes;

use super::apply::{self, ExternalStatusCommand, StatusClassification};
use crate::store::ParcelStore;

/// Command to record one carrier status for many parcels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusCommand {
    pub trackings: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_at: Option<DateTime<Utc>>,
    pub actor: String,
}

/// Per-item result in a status batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusItem {
    pub tracking: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<StatusClassification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch result: `total == ok + fail`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusOutcome {
    pub total: usize,
    pub ok: usize,
    pub fail: usize,
    pub items: Vec<BatchStatusItem>,
    pub changed_by: String,
}

/// Errors from batch status updates
#[derive(Debug, thiserror::Error)]
pub enum BatchStatusError {
    #[error("{0}")]
    Validation(String),
}

#[tracing::instrument(
    skip(store, command),
    fields(count = command.trackings.len(), actor = %command.actor)
)]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: BatchStatusCommand,
) -> Result<BatchStatusOutcome, BatchStatusError> {
    if command.trackings.is_empty() {
        return Err(BatchStatusError::Validation("tracking list is empty".into()));
    }
    if command.status.trim().is_empty() {
        return Err(BatchStatusError::Validation("status text is required".into()));
    }

    let mut items = Vec::with_capacity(command.trackings.len());
    let mut ok = 0;
    for tracking in &command.trackings {
        let item_command = ExternalStatusCommand {
            tracking: tracking.clone(),
            status: command.status.clone(),
            status_at: command.status_at,
            actor: command.actor.clone(),
        };
        match apply::handle(store, item_command).await {
            Ok(outcome) => {
                ok += 1;
                items.push(BatchStatusItem {
                    tracking: tracking.clone(),
                    ok: true,
                    classification: Some(outcome.classification),
                    error: None,
                });
            },
            // every failure is item-level; the per-item transaction has
            // already rolled its own work back
            Err(err) => {
                items.push(BatchStatusItem {
                    tracking: tracking.clone(),
                    ok: false,
                    classification: None,
                    error: Some(err.to_string()),
                });
            },
        }
    }

    let total = items.len();
    let fail = total - ok;
    tracing::info!(total, ok, fail, "batch status finished");
    Ok(BatchStatusOutcome {
        total,
        ok,
        fail,
        items,
        changed_by: command.actor,
    })
}

/// Command carrying pasted free text instead of a list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStatusCommand {
    pub text: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_at: Option<DateTime<Utc>>,
    pub actor: String,
}

#[tracing::instrument(skip(store, command), fields(actor = %command.actor))]
pub async fn handle_text<S: ParcelStore>(
    store: &mut S,
    command: TextStatusCommand,
) -> Result<BatchStatusOutcome, BatchStatusError> {
    let codes = extract_tracking_codes(&command.text);
    if codes.is_empty() {
        return Err(BatchStatusError::Validation(
            "no tracking codes found in text".into(),
        ));
    }
    handle(
        store,
        BatchStatusCommand {
            trackings: codes.into_iter().map(|c| c.into_inner()).collect(),
            status: command.status,
            status_at: command.status_at,
            actor: command.actor,
        },
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewParcel};

    async fn seeded_store(trackings: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        let bag = store.find_or_create_bag("PENDIENTE").await.unwrap();
        let district = store.find_or_create_district("PENDIENTE").await.unwrap();
        for tracking in trackings {
            store
                .insert_parcel(NewParcel {
                    tracking_code: tracking.to_string(),
                    bag_id: bag.id,
                    district_id: district.id,
                    received_at: Utc::now(),
                    changed_by: "seed".to_string(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_mixed_batch() {
        let mut store = seeded_store(&["HZCR1", "HZCR2"]).await;
        let outcome = handle(
            &mut store,
            BatchStatusCommand {
                trackings: vec!["HZCR1".into(), "HZCR2".into(), "HZCR3".into()],
                status: "Entregado en sucursal".into(),
                status_at: None,
                actor: "feed".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.ok, 2);
        assert_eq!(outcome.fail, 1);
        assert_eq!(
            outcome.items[0].classification,
            Some(StatusClassification::DeliveredLike)
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_item_level() {
        let mut store = seeded_store(&["HZCR1", "HZCR2"]).await;
        store.break_parcel("HZCR1");
        let outcome = handle(
            &mut store,
            BatchStatusCommand {
                trackings: vec!["HZCR1".into(), "HZCR2".into()],
                status: "Push".into(),
                status_at: None,
                actor: "feed".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.ok, 1);
        assert_eq!(outcome.fail, 1);
        assert!(outcome.items[0].error.is_some());

        let healthy = store.find_by_tracking_code("HZCR2").await.unwrap().unwrap();
        assert_eq!(healthy.external_status.as_deref(), Some("Push"));
    }

    #[tokio::test]
    async fn test_blank_status_rejected_up_front() {
        let mut store = seeded_store(&["HZCR1"]).await;
        let err = handle(
            &mut store,
            BatchStatusCommand {
                trackings: vec!["HZCR1".into()],
                status: " ".into(),
                status_at: None,
                actor: "feed".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BatchStatusError::Validation(_)));
    }

    #[tokio::test]
    async fn test_text_form() {
        let mut store = seeded_store(&["HZCR1"]).await;
        let outcome = handle_text(
            &mut store,
            TextStatusCommand {
                text: "pendientes: hzcr1".into(),
                status: "Almacenaje vencido".into(),
                status_at: None,
                actor: "feed".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.total, 1);
        assert_eq!(
            outcome.items[0].classification,
            Some(StatusClassification::ReturnLike)
        );
    }
}
