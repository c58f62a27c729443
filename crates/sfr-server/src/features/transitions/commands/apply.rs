//! Apply a single lifecycle transition
//!
//! The core state machine. A transition names the parcel, the target state,
//! the acting operator and an optional explicit timestamp. The same-state
//! case is a recognized no-op; the one exception is a *forced* move into the
//! initial state, which resets the delivery/return timestamps even when the
//! parcel is already there.
//!
//! Exactly one ledger entry is appended per effective transition; no-ops
//! leave the ledger untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sfr_common::{ParcelState, ReturnSubtype, TrackingCode};

use crate::store::{NewTransition, ParcelStore, StoreError};

/// Command to apply one lifecycle transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionCommand {
    pub tracking: String,

    /// Target lifecycle state
    pub target: ParcelState,

    /// Free-text motive recorded in the ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motive: Option<String>,

    /// Acting operator, recorded on the parcel and in the ledger
    pub actor: String,

    /// Effective timestamp; the current instant when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<DateTime<Utc>>,

    /// Force a timestamp reset when the target is the initial state
    #[serde(default)]
    pub force: bool,

    /// Return subtype for the not-deliverable state (default: out of route)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_subtype: Option<ReturnSubtype>,
}

/// Snapshot returned after a transition attempt, effective or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub tracking: String,
    pub previous_state: ParcelState,
    pub new_state: ParcelState,
    pub changed: bool,
    pub changed_at: DateTime<Utc>,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<DateTime<Utc>>,
    pub return_subtype: ReturnSubtype,
}

/// Errors from applying a transition
#[derive(Debug, thiserror::Error)]
pub enum ApplyTransitionError {
    #[error("Invalid tracking code: {0}")]
    InvalidTracking(String),

    #[error("Parcel '{0}' not found")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for applying one transition. Runs inside its own store
/// transaction.
#[tracing::instrument(
    skip(store, command),
    fields(
        tracking = %command.tracking,
        target = %command.target,
        actor = %command.actor,
        force = command.force
    )
)]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: TransitionCommand,
) -> Result<TransitionOutcome, ApplyTransitionError> {
    let tracking = TrackingCode::parse(&command.tracking)
        .map_err(|_| ApplyTransitionError::InvalidTracking(command.tracking.clone()))?;

    store.begin().await?;
    let result = apply(store, &tracking, command).await;
    match result {
        Ok(outcome) => {
            store.commit().await?;
            Ok(outcome)
        },
        Err(err) => {
            let _ = store.rollback().await;
            Err(err)
        },
    }
}

async fn apply<S: ParcelStore>(
    store: &mut S,
    tracking: &TrackingCode,
    command: TransitionCommand,
) -> Result<TransitionOutcome, ApplyTransitionError> {
    let mut parcel = store
        .find_by_tracking_code(tracking.as_str())
        .await?
        .ok_or_else(|| ApplyTransitionError::NotFound(tracking.as_str().to_string()))?;

    let when = command.when.unwrap_or_else(Utc::now);
    let previous = parcel.state;
    let target = command.target;

    let forced_reset = command.force && target == ParcelState::AwaitingRecipientAvailable;
    let effective = previous != target || forced_reset;

    if !effective {
        tracing::debug!(state = %previous, "transition is a no-op");
        return Ok(outcome_of(&parcel, previous, false, when, command.actor));
    }

    match target {
        state if state.is_delivery() => {
            parcel.delivered_at = Some(when);
        },
        ParcelState::NotDeliverable => {
            parcel.returned_at = Some(when);
            parcel.return_subtype = command.return_subtype.unwrap_or_default();
        },
        ParcelState::AwaitingRecipientAvailable if command.force => {
            parcel.delivered_at = None;
            parcel.returned_at = None;
        },
        _ => {},
    }

    parcel.state = target;
    parcel.last_state_change_at = when;
    parcel.last_changed_by = Some(command.actor.clone());

    store.update_parcel(&parcel).await?;
    store
        .append_transition(NewTransition {
            parcel_id: parcel.id,
            from_state: Some(previous),
            to_state: target,
            changed_at: when,
            motive: command.motive,
            changed_by: command.actor.clone(),
        })
        .await?;

    tracing::info!(from = %previous, to = %target, "transition applied");
    Ok(outcome_of(&parcel, previous, true, when, command.actor))
}

fn outcome_of(
    parcel: &crate::store::Parcel,
    previous: ParcelState,
    changed: bool,
    when: DateTime<Utc>,
    actor: String,
) -> TransitionOutcome {
    TransitionOutcome {
        tracking: parcel.tracking_code.clone(),
        previous_state: previous,
        new_state: parcel.state,
        changed,
        changed_at: when,
        actor,
        delivered_at: parcel.delivered_at,
        returned_at: parcel.returned_at,
        return_subtype: parcel.return_subtype,
    }
}
