//! Receiving-manifest import
//!
//! Create-or-update over the parsed manifest entries. New trackings get a
//! parcel in the initial state plus a creation ledger entry; every tracking
//! gets its bag, district and received-at refreshed. Rows without a seal or
//! district fall back to the PENDIENTE sentinel bag and district.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use sfr_common::district::PENDING;
use sfr_common::ParcelState;
use sfr_ingest::{Grid, ManifestParser, ParsedManifest};

use crate::store::{ManifestUpdate, NewParcel, NewTransition, ParcelStore, StoreError};

const MAX_OBSERVATIONS_CHARS: usize = 500;
const MAX_RESPONSIBLE_CHARS: usize = 100;

/// Command to reconcile one manifest upload
#[derive(Debug)]
pub struct ManifestImportCommand {
    pub grid: Grid,
    pub actor: String,
}

/// Summary returned to the caller after a manifest import
#[derive(Debug, Clone, Serialize)]
pub struct ManifestImportSummary {
    /// Distinct tracking codes on the sheet
    pub total: usize,
    /// Parcels created by this upload
    pub created: usize,
    /// Parcels that already existed and were refreshed
    pub updated: usize,
    pub with_markers: usize,
    pub without_markers: usize,
    pub elapsed_ms: u64,
    pub actor: String,
}

/// Errors from manifest imports
#[derive(Debug, thiserror::Error)]
pub enum ManifestImportError {
    #[error("{0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for a manifest upload. The whole sheet is applied in one store
/// transaction; any store failure rolls everything back.
#[tracing::instrument(skip(store, command), fields(actor = %command.actor))]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: ManifestImportCommand,
) -> Result<ManifestImportSummary, ManifestImportError> {
    let started = Instant::now();
    let parsed = ManifestParser::new().parse(&command.grid);
    if parsed.entries.is_empty() {
        return Err(ManifestImportError::Validation(
            "no tracking codes found in manifest".into(),
        ));
    }

    store.begin().await?;
    let result = apply(store, &parsed, &command.actor).await;
    match result {
        Ok((created, updated)) => {
            store.commit().await?;
            let summary = ManifestImportSummary {
                total: parsed.entries.len(),
                created,
                updated,
                with_markers: parsed.with_markers(),
                without_markers: parsed.without_markers(),
                elapsed_ms: started.elapsed().as_millis() as u64,
                actor: command.actor,
            };
            tracing::info!(
                total = summary.total,
                created = summary.created,
                updated = summary.updated,
                elapsed_ms = summary.elapsed_ms,
                "manifest import finished"
            );
            Ok(summary)
        },
        Err(err) => {
            let _ = store.rollback().await;
            Err(err)
        },
    }
}

async fn apply<S: ParcelStore>(
    store: &mut S,
    parsed: &ParsedManifest,
    actor: &str,
) -> Result<(usize, usize), ManifestImportError> {
    let pending_bag = store.find_or_create_bag(PENDING).await?;
    let pending_district = store.find_or_create_district(PENDING).await?;

    // Resolve every distinct seal and district once
    let mut bag_ids: HashMap<&str, i64> = HashMap::new();
    let mut district_ids: HashMap<&str, i64> = HashMap::new();
    for entry in &parsed.entries {
        if let Some(seal) = entry.seal.as_deref() {
            if !bag_ids.contains_key(seal) {
                let bag = store.find_or_create_bag(seal).await?;
                bag_ids.insert(seal, bag.id);
            }
        }
        if let Some(district) = entry.district {
            if !district_ids.contains_key(district) {
                let found = store.find_or_create_district(district).await?;
                district_ids.insert(district, found.id);
            }
        }
    }

    let now = Utc::now();
    let new_parcels: Vec<NewParcel> = parsed
        .entries
        .iter()
        .map(|entry| NewParcel {
            tracking_code: entry.tracking.clone(),
            bag_id: entry
                .seal
                .as_deref()
                .and_then(|seal| bag_ids.get(seal).copied())
                .unwrap_or(pending_bag.id),
            district_id: entry
                .district
                .and_then(|district| district_ids.get(district).copied())
                .unwrap_or(pending_district.id),
            received_at: entry.received_at.unwrap_or(now),
            changed_by: actor.to_string(),
        })
        .collect();

    let inserted = store.batch_insert_ignore(&new_parcels).await?;
    for tracking in &inserted {
        let parcel = store
            .find_by_tracking_code(tracking)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("inserted parcel '{tracking}' missing")))?;
        store
            .append_transition(NewTransition {
                parcel_id: parcel.id,
                from_state: None,
                to_state: ParcelState::INITIAL,
                changed_at: parcel.received_at,
                motive: None,
                changed_by: actor.to_string(),
            })
            .await?;
    }

    let updates: Vec<ManifestUpdate> = parsed
        .entries
        .iter()
        .zip(&new_parcels)
        .map(|(entry, new_parcel)| ManifestUpdate {
            tracking_code: entry.tracking.clone(),
            bag_id: new_parcel.bag_id,
            district_id: new_parcel.district_id,
            received_at: new_parcel.received_at,
            changed_by: actor.to_string(),
            observations: entry
                .observations
                .as_deref()
                .map(|text| clip(text, MAX_OBSERVATIONS_CHARS)),
            responsible: entry
                .responsible
                .as_deref()
                .map(|text| clip(text, MAX_RESPONSIBLE_CHARS)),
        })
        .collect();
    store.batch_update_manifest(&updates).await?;

    let created = inserted.len();
    let updated = parsed.entries.len() - created;
    Ok((created, updated))
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manifest_grid() -> Grid {
        Grid::from_rows(vec![
            vec![
                "FECHA".into(),
                "TRACKING".into(),
                "MARCHAMO".into(),
                "DISTRITO".into(),
                "OBSERVACIONES".into(),
            ],
            vec![
                "02/01/2025".into(),
                "HZCR1001".into(),
                "12345".into(),
                "Roxana".into(),
                "caja abierta".into(),
            ],
            vec![
                "02/01/2025".into(),
                "CR200123".into(),
                "".into(),
                "".into(),
                "".into(),
            ],
        ])
    }

    fn command() -> ManifestImportCommand {
        ManifestImportCommand {
            grid: manifest_grid(),
            actor: "ops".to_string(),
        }
    }

    #[tokio::test]
    async fn test_creates_parcels_with_markers_and_sentinels() {
        let mut store = MemoryStore::new();
        let summary = handle(&mut store, command()).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.with_markers, 1);
        assert_eq!(summary.without_markers, 1);

        let marked = store.find_by_tracking_code("HZCR1001").await.unwrap().unwrap();
        let bag = store.find_bag_by_seal("12345").await.unwrap().unwrap();
        assert_eq!(marked.bag_id, bag.id);
        assert_eq!(marked.observations.as_deref(), Some("caja abierta"));
        assert_eq!(store.ledger_len(marked.id), 1);

        let pending = store.find_by_tracking_code("CR200123").await.unwrap().unwrap();
        let sentinel = store.find_bag_by_seal(PENDING).await.unwrap().unwrap();
        assert_eq!(pending.bag_id, sentinel.id);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let mut store = MemoryStore::new();
        handle(&mut store, command()).await.unwrap();
        let summary = handle(&mut store, command()).await.unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 2);

        // still exactly one creation entry per parcel
        let parcel = store.find_by_tracking_code("HZCR1001").await.unwrap().unwrap();
        assert_eq!(store.ledger_len(parcel.id), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_observations_when_blank() {
        let mut store = MemoryStore::new();
        handle(&mut store, command()).await.unwrap();

        // second sheet moves the parcel to a new bag, says nothing else
        let grid = Grid::from_rows(vec![
            vec!["FECHA".into(), "TRACKING".into(), "MARCHAMO".into()],
            vec!["03/01/2025".into(), "HZCR1001".into(), "67890".into()],
        ]);
        handle(
            &mut store,
            ManifestImportCommand {
                grid,
                actor: "ops".to_string(),
            },
        )
        .await
        .unwrap();

        let parcel = store.find_by_tracking_code("HZCR1001").await.unwrap().unwrap();
        let bag = store.find_bag_by_seal("67890").await.unwrap().unwrap();
        assert_eq!(parcel.bag_id, bag.id);
        assert_eq!(parcel.observations.as_deref(), Some("caja abierta"));
    }

    #[tokio::test]
    async fn test_empty_sheet_rejected() {
        let mut store = MemoryStore::new();
        let grid = Grid::from_rows(vec![vec!["FECHA".into(), "TRACKING".into()]]);
        let err = handle(
            &mut store,
            ManifestImportCommand {
                grid,
                actor: "ops".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ManifestImportError::Validation(_)));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip("ñandú", 3), "ñan");
        assert_eq!(clip("corto", 500), "corto");
    }
}
