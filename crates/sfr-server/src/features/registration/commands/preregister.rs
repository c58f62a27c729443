//! Single-parcel pre-registration
//!
//! Registers a parcel ahead of its manifest row. Unlike the manifest
//! import, a named bag or district must already exist; omitting them falls
//! back to the PENDIENTE sentinels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sfr_common::district::PENDING;
use sfr_common::{ParcelState, TrackingCode};

use crate::store::{NewParcel, NewTransition, ParcelStore, StoreError};

/// Command to pre-register one parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreregisterCommand {
    pub tracking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    pub actor: String,
}

/// Result of a pre-registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreregisterOutcome {
    pub tracking: String,
    pub state: ParcelState,
    pub bag_seal: String,
    pub district: String,
    pub received_at: DateTime<Utc>,
}

/// Errors from pre-registration
#[derive(Debug, thiserror::Error)]
pub enum PreregisterError {
    #[error("Invalid tracking code: {0}")]
    InvalidTracking(String),

    #[error("Parcel '{0}' already exists")]
    AlreadyExists(String),

    #[error("Bag with seal '{0}' not found")]
    BagNotFound(String),

    #[error("District '{0}' not found")]
    DistrictNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for pre-registration. Runs inside its own store transaction.
#[tracing::instrument(skip(store, command), fields(tracking = %command.tracking, actor = %command.actor))]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: PreregisterCommand,
) -> Result<PreregisterOutcome, PreregisterError> {
    let tracking = TrackingCode::parse(&command.tracking)
        .map_err(|_| PreregisterError::InvalidTracking(command.tracking.clone()))?;

    store.begin().await?;
    let result = register(store, &tracking, command).await;
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

async fn register<S: ParcelStore>(
    store: &mut S,
    tracking: &TrackingCode,
    command: PreregisterCommand,
) -> Result<PreregisterOutcome, PreregisterError> {
    if store.exists_by_tracking_code(tracking.as_str()).await? {
        return Err(PreregisterError::AlreadyExists(tracking.as_str().to_string()));
    }

    let bag = match command.seal.as_deref() {
        Some(seal) => store
            .find_bag_by_seal(seal)
            .await?
            .ok_or_else(|| PreregisterError::BagNotFound(seal.to_string()))?,
        None => store.find_or_create_bag(PENDING).await?,
    };
    let district = match command.district.as_deref() {
        Some(name) => store
            .find_district_by_name(name)
            .await?
            .ok_or_else(|| PreregisterError::DistrictNotFound(name.to_string()))?,
        None => store.find_or_create_district(PENDING).await?,
    };

    let received_at = command.received_at.unwrap_or_else(Utc::now);
    let parcel = store
        .insert_parcel(NewParcel {
            tracking_code: tracking.as_str().to_string(),
            bag_id: bag.id,
            district_id: district.id,
            received_at,
            changed_by: command.actor.clone(),
        })
        .await
        .map_err(|err| match err {
            StoreError::Duplicate(_) => {
                PreregisterError::AlreadyExists(tracking.as_str().to_string())
            },
            other => PreregisterError::Store(other),
        })?;

    store
        .append_transition(NewTransition {
            parcel_id: parcel.id,
            from_state: None,
            to_state: ParcelState::INITIAL,
            changed_at: received_at,
            motive: None,
            changed_by: command.actor,
        })
        .await?;

    tracing::info!(tracking = %tracking, "parcel pre-registered");
    Ok(PreregisterOutcome {
        tracking: tracking.as_str().to_string(),
        state: parcel.state,
        bag_seal: bag.seal,
        district: district.name,
        received_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn command(tracking: &str) -> PreregisterCommand {
        PreregisterCommand {
            tracking: tracking.to_string(),
            seal: None,
            district: None,
            received_at: None,
            actor: "desk".to_string(),
        }
    }

    #[tokio::test]
    async fn test_preregister_with_sentinels() {
        let mut store = MemoryStore::new();
        let outcome = handle(&mut store, command("hzcr50")).await.unwrap();
        assert_eq!(outcome.tracking, "HZCR50");
        assert_eq!(outcome.state, ParcelState::INITIAL);
        assert_eq!(outcome.bag_seal, PENDING);
        assert_eq!(outcome.district, PENDING);

        let parcel = store.find_by_tracking_code("HZCR50").await.unwrap().unwrap();
        assert_eq!(store.ledger_len(parcel.id), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let mut store = MemoryStore::new();
        handle(&mut store, command("HZCR50")).await.unwrap();
        let err = handle(&mut store, command("HZCR50")).await.unwrap_err();
        assert!(matches!(err, PreregisterError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_named_bag_must_exist() {
        let mut store = MemoryStore::new();
        let mut cmd = command("HZCR50");
        cmd.seal = Some("12345".to_string());
        let err = handle(&mut store, cmd).await.unwrap_err();
        assert!(matches!(err, PreregisterError::BagNotFound(_)));

        store.find_or_create_bag("12345").await.unwrap();
        let mut cmd = command("HZCR50");
        cmd.seal = Some("12345".to_string());
        let outcome = handle(&mut store, cmd).await.unwrap();
        assert_eq!(outcome.bag_seal, "12345");
    }

    #[tokio::test]
    async fn test_named_district_must_exist() {
        let mut store = MemoryStore::new();
        let mut cmd = command("CR7");
        cmd.district = Some("Roxana".to_string());
        let err = handle(&mut store, cmd).await.unwrap_err();
        assert!(matches!(err, PreregisterError::DistrictNotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_tracking() {
        let mut store = MemoryStore::new();
        let err = handle(&mut store, command("ABC123")).await.unwrap_err();
        assert!(matches!(err, PreregisterError::InvalidTracking(_)));
    }
}
