//! Batch lifecycle transitions
//!
//! Applies the same target state to a list of parcels, or to every tracking
//! code extracted from pasted free text. Items are isolated: one parcel's
//! failure is recorded and the batch continues. Each item commits in its own
//! store transaction, so partial progress survives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sfr_common::tracking::extract_tracking_codes;
use sfr_common::{ParcelState, ReturnSubtype};

use super::apply::{self, TransitionCommand};
use crate::store::ParcelStore;

/// Command to transition many parcels at once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransitionCommand {
    pub trackings: Vec<String>,
    pub target: ParcelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motive: Option<String>,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<DateTime<Utc>>,
    #[serde(default)]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_subtype: Option<ReturnSubtype>,
}

/// Per-item result in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransitionItem {
    pub tracking: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<ParcelState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch result: `total == ok + fail`, one item per input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransitionOutcome {
    pub total: usize,
    pub ok: usize,
    pub fail: usize,
    pub items: Vec<BatchTransitionItem>,
    pub changed_by: String,
}

/// Errors from batch transitions
#[derive(Debug, thiserror::Error)]
pub enum BatchTransitionError {
    #[error("{0}")]
    Validation(String),
}

/// Handler for an explicit tracking list.
#[tracing::instrument(
    skip(store, command),
    fields(count = command.trackings.len(), target = %command.target, actor = %command.actor)
)]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: BatchTransitionCommand,
) -> Result<BatchTransitionOutcome, BatchTransitionError> {
    if command.trackings.is_empty() {
        return Err(BatchTransitionError::Validation(
            "tracking list is empty".into(),
        ));
    }

    let mut items = Vec::with_capacity(command.trackings.len());
    let mut ok = 0;
    for tracking in &command.trackings {
        let item_command = TransitionCommand {
            tracking: tracking.clone(),
            target: command.target,
            motive: command.motive.clone(),
            actor: command.actor.clone(),
            when: command.when,
            force: command.force,
            return_subtype: command.return_subtype,
        };
        match apply::handle(store, item_command).await {
            Ok(outcome) => {
                ok += 1;
                items.push(BatchTransitionItem {
                    tracking: tracking.clone(),
                    ok: true,
                    new_state: Some(outcome.new_state),
                    changed: Some(outcome.changed),
                    error: None,
                });
            },
            // every failure is item-level; the per-item transaction has
            // already rolled its own work back
            Err(err) => {
                items.push(BatchTransitionItem {
                    tracking: tracking.clone(),
                    ok: false,
                    new_state: None,
                    changed: None,
                    error: Some(err.to_string()),
                });
            },
        }
    }

    let total = items.len();
    let fail = total - ok;
    tracing::info!(total, ok, fail, "batch transition finished");
    Ok(BatchTransitionOutcome {
        total,
        ok,
        fail,
        items,
        changed_by: command.actor,
    })
}

/// Command carrying pasted free text instead of a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTransitionCommand {
    pub text: String,
    pub target: ParcelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motive: Option<String>,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<DateTime<Utc>>,
    #[serde(default)]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_subtype: Option<ReturnSubtype>,
}

/// Handler for free text: extract tracking codes, then run the batch.
#[tracing::instrument(skip(store, command), fields(target = %command.target, actor = %command.actor))]
pub async fn handle_text<S: ParcelStore>(
    store: &mut S,
    command: TextTransitionCommand,
) -> Result<BatchTransitionOutcome, BatchTransitionError> {
    let codes = extract_tracking_codes(&command.text);
    if codes.is_empty() {
        return Err(BatchTransitionError::Validation(
            "no tracking codes found in text".into(),
        ));
    }
    handle(
        store,
        BatchTransitionCommand {
            trackings: codes.into_iter().map(|c| c.into_inner()).collect(),
            target: command.target,
            motive: command.motive,
            actor: command.actor,
            when: command.when,
            force: command.force,
            return_subtype: command.return_subtype,
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

    fn batch(trackings: &[&str]) -> BatchTransitionCommand {
        BatchTransitionCommand {
            trackings: trackings.iter().map(|t| t.to_string()).collect(),
            target: ParcelState::DeliveredToLocalCarrier,
            motive: None,
            actor: "ops".to_string(),
            when: None,
            force: false,
            return_subtype: None,
        }
    }

    #[tokio::test]
    async fn test_counts_add_up() {
        let mut store = seeded_store(&["HZCR1", "HZCR2"]).await;
        // HZCR3 unknown, "bad" malformed
        let outcome = handle(&mut store, batch(&["HZCR1", "HZCR2", "HZCR3", "bad"]))
            .await
            .unwrap();
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.ok, 2);
        assert_eq!(outcome.fail, 2);
        assert_eq!(outcome.ok + outcome.fail, outcome.total);
        assert_eq!(outcome.items.len(), 4);
        assert!(outcome.items[2].error.is_some());
        assert!(outcome.items[3].error.is_some());
    }

    #[tokio::test]
    async fn test_partial_progress_survives() {
        let mut store = seeded_store(&["HZCR1"]).await;
        handle(&mut store, batch(&["HZCR1", "HZCR404"])).await.unwrap();
        let parcel = store.find_by_tracking_code("HZCR1").await.unwrap().unwrap();
        assert_eq!(parcel.state, ParcelState::DeliveredToLocalCarrier);
    }

    #[tokio::test]
    async fn test_store_failure_is_item_level() {
        let mut store = seeded_store(&["HZCR1", "HZCR2"]).await;
        store.break_parcel("HZCR1");
        let outcome = handle(&mut store, batch(&["HZCR1", "HZCR2"])).await.unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.ok, 1);
        assert_eq!(outcome.fail, 1);
        assert!(!outcome.items[0].ok);
        assert!(outcome.items[0].error.is_some());

        // the healthy parcel still transitioned
        let parcel = store.find_by_tracking_code("HZCR2").await.unwrap().unwrap();
        assert_eq!(parcel.state, ParcelState::DeliveredToLocalCarrier);
    }

    #[tokio::test]
    async fn test_empty_list_rejected() {
        let mut store = seeded_store(&[]).await;
        assert!(matches!(
            handle(&mut store, batch(&[])).await,
            Err(BatchTransitionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_text_extraction_batch() {
        let mut store = seeded_store(&["HZCR1", "HZCR2"]).await;
        let outcome = handle_text(
            &mut store,
            TextTransitionCommand {
                text: "salen hoy: hzcr1, HZCR2 y hzcr1 otra vez".to_string(),
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
        // duplicates collapse during extraction
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.ok, 2);
    }

    #[tokio::test]
    async fn test_text_without_codes_rejected() {
        let mut store = seeded_store(&[]).await;
        let err = handle_text(
            &mut store,
            TextTransitionCommand {
                text: "nada que ver".to_string(),
                target: ParcelState::NotDeliverable,
                motive: None,
                actor: "ops".to_string(),
                when: None,
                force: false,
                return_subtype: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BatchTransitionError::Validation(_)));
    }
}
