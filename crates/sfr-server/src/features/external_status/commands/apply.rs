//! Single external-status update
//!
//! Stores the carrier's status text verbatim and classifies it using the
//! keyword sets the operations team relies on. Accented vowels are folded
//! before matching so "Devolución" and "Devolucion" land in the same bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sfr_common::TrackingCode;

use crate::store::{ParcelStore, StoreError};

/// Advisory bucket for a carrier status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClassification {
    DeliveredLike,
    ReturnLike,
    Informational,
}

const DELIVERED_CONTAINS: &[&str] = &["prueba de entrega", "proof of delivery"];
const DELIVERED_PREFIXES: &[&str] = &["entregado", "en entrega", "delivered"];
const RETURN_CONTAINS: &[&str] = &["transito a bodegas", "in transit to warehouse"];
const RETURN_PREFIXES: &[&str] = &[
    "devolucion",
    "devoluciones",
    "devuelto",
    "almacenaje",
    "return",
    "returned",
    "storage",
];

fn fold_accents(c: char) -> char {
    match c {
        'á' => 'a',
        'é' => 'e',
        'í' => 'i',
        'ó' => 'o',
        'ú' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

/// Classifies a raw carrier status line. Never fails; unrecognized text is
/// `Informational`.
pub fn classify_status(raw: &str) -> StatusClassification {
    let normalized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(fold_accents)
        .collect();

    if DELIVERED_CONTAINS.iter().any(|kw| normalized.contains(kw))
        || DELIVERED_PREFIXES.iter().any(|kw| normalized.starts_with(kw))
    {
        return StatusClassification::DeliveredLike;
    }
    if RETURN_CONTAINS.iter().any(|kw| normalized.contains(kw))
        || RETURN_PREFIXES.iter().any(|kw| normalized.starts_with(kw))
    {
        return StatusClassification::ReturnLike;
    }
    StatusClassification::Informational
}

/// Command to record a carrier status for one parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalStatusCommand {
    pub tracking: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_at: Option<DateTime<Utc>>,
    pub actor: String,
}

/// Result of recording a carrier status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalStatusOutcome {
    pub tracking: String,
    pub status: String,
    pub classification: StatusClassification,
    pub status_at: DateTime<Utc>,
    pub actor: String,
}

/// Errors from external-status updates
#[derive(Debug, thiserror::Error)]
pub enum ApplyStatusError {
    #[error("Invalid tracking code: {0}")]
    InvalidTracking(String),

    #[error("Status text is required")]
    BlankStatus,

    #[error("Parcel '{0}' not found")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for a single status update. Runs inside its own store
/// transaction.
#[tracing::instrument(skip(store, command), fields(tracking = %command.tracking, actor = %command.actor))]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: ExternalStatusCommand,
) -> Result<ExternalStatusOutcome, ApplyStatusError> {
    let tracking = TrackingCode::parse(&command.tracking)
        .map_err(|_| ApplyStatusError::InvalidTracking(command.tracking.clone()))?;
    if command.status.trim().is_empty() {
        return Err(ApplyStatusError::BlankStatus);
    }

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
    command: ExternalStatusCommand,
) -> Result<ExternalStatusOutcome, ApplyStatusError> {
    let mut parcel = store
        .find_by_tracking_code(tracking.as_str())
        .await?
        .ok_or_else(|| ApplyStatusError::NotFound(tracking.as_str().to_string()))?;

    let status_at = command.status_at.unwrap_or_else(Utc::now);
    let status = command.status.trim().to_string();
    let classification = classify_status(&status);

    parcel.external_status = Some(status.clone());
    parcel.external_status_at = Some(status_at);
    parcel.last_changed_by = Some(command.actor.clone());
    store.update_parcel(&parcel).await?;

    tracing::debug!(
        tracking = %tracking,
        classification = ?classification,
        "external status recorded"
    );

    Ok(ExternalStatusOutcome {
        tracking: tracking.as_str().to_string(),
        status,
        classification,
        status_at,
        actor: command.actor,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewParcel};
    use sfr_common::ParcelState;

    async fn seeded_store(tracking: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        let bag = store.find_or_create_bag("PENDIENTE").await.unwrap();
        let district = store.find_or_create_district("PENDIENTE").await.unwrap();
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
        store
    }

    #[test]
    fn test_delivered_like() {
        assert_eq!(
            classify_status("Prueba de entrega"),
            StatusClassification::DeliveredLike
        );
        assert_eq!(
            classify_status("Entregado al destinatario"),
            StatusClassification::DeliveredLike
        );
        assert_eq!(
            classify_status("Se adjunta PRUEBA DE ENTREGA firmada"),
            StatusClassification::DeliveredLike
        );
        assert_eq!(
            classify_status("Delivered - front desk"),
            StatusClassification::DeliveredLike
        );
    }

    #[test]
    fn test_return_like() {
        assert_eq!(
            classify_status("En transito a bodegas Aeropost"),
            StatusClassification::ReturnLike
        );
        assert_eq!(
            classify_status("Devolución solicitada por el cliente"),
            StatusClassification::ReturnLike
        );
        assert_eq!(
            classify_status("En tránsito a bodegas centrales"),
            StatusClassification::ReturnLike
        );
        assert_eq!(
            classify_status("Returned to sender"),
            StatusClassification::ReturnLike
        );
    }

    #[test]
    fn test_informational() {
        assert_eq!(classify_status("Push"), StatusClassification::Informational);
        assert_eq!(
            classify_status("Saldrá en ruta mañana"),
            StatusClassification::Informational
        );
        assert_eq!(classify_status(""), StatusClassification::Informational);
    }

    #[tokio::test]
    async fn test_status_persisted_verbatim() {
        let mut store = seeded_store("HZCR100").await;
        let outcome = handle(
            &mut store,
            ExternalStatusCommand {
                tracking: "hzcr100".to_string(),
                status: "  En tránsito a bodegas  ".to_string(),
                status_at: None,
                actor: "feed".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.classification, StatusClassification::ReturnLike);

        let parcel = store
            .find_by_tracking_code("HZCR100")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parcel.external_status.as_deref(), Some("En tránsito a bodegas"));
        assert!(parcel.external_status_at.is_some());
        assert_eq!(parcel.last_changed_by.as_deref(), Some("feed"));
    }

    #[tokio::test]
    async fn test_state_never_mutated() {
        let mut store = seeded_store("HZCR100").await;
        handle(
            &mut store,
            ExternalStatusCommand {
                tracking: "HZCR100".to_string(),
                status: "Entregado".to_string(),
                status_at: None,
                actor: "feed".to_string(),
            },
        )
        .await
        .unwrap();
        let parcel = store
            .find_by_tracking_code("HZCR100")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parcel.state, ParcelState::INITIAL);
        assert_eq!(store.ledger_len(parcel.id), 0);
    }

    #[tokio::test]
    async fn test_blank_status_rejected() {
        let mut store = seeded_store("HZCR100").await;
        let err = handle(
            &mut store,
            ExternalStatusCommand {
                tracking: "HZCR100".to_string(),
                status: "   ".to_string(),
                status_at: None,
                actor: "feed".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApplyStatusError::BlankStatus));
    }

    #[tokio::test]
    async fn test_unknown_parcel() {
        let mut store = seeded_store("HZCR100").await;
        let err = handle(
            &mut store,
            ExternalStatusCommand {
                tracking: "CR999".to_string(),
                status: "Entregado".to_string(),
                status_at: None,
                actor: "feed".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApplyStatusError::NotFound(_)));
    }
}
