//! Carrier detail-feed import
//!
//! Update-only merge: rows for unknown trackings are counted and skipped,
//! never created. Non-empty feed fields overwrite the stored values; a row
//! with no recognizable district leaves the parcel's district alone. Status
//! text is routed through the external-status classifier so the summary can
//! report delivered-like and return-like tallies.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use sfr_ingest::{DetailFeedParser, DetailRow, Grid, ParsedDetailFeed};

use crate::features::external_status::commands::{classify_status, StatusClassification};
use crate::store::{ParcelStore, StoreError};

/// Command to reconcile one detail-feed upload
#[derive(Debug)]
pub struct DetailImportCommand {
    pub grid: Grid,
    pub actor: String,
}

/// Summary returned to the caller after a detail-feed import
#[derive(Debug, Clone, Serialize)]
pub struct DetailImportSummary {
    /// Every feed row, accepted or not
    pub total: usize,
    /// Rows whose status classified as delivered-like
    pub delivered_like: usize,
    /// Rows whose status classified as return-like
    pub return_like: usize,
    /// Rows merged with no status or an informational one
    pub updated: usize,
    /// Rows referencing trackings not in the store
    pub missing: usize,
    /// Rows the parser rejected plus rows that failed mid-merge
    pub rejected: usize,
    /// Per-row failure notes, processing continued past each
    pub errors: Vec<String>,
    pub elapsed_ms: u64,
    pub actor: String,
}

/// Errors from detail-feed imports
#[derive(Debug, thiserror::Error)]
pub enum DetailImportError {
    #[error("{0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for a detail-feed upload. One store transaction for the whole
/// feed; row-level problems, store failures included, become summary
/// entries. Only transaction control failures roll everything back.
#[tracing::instrument(skip(store, command), fields(actor = %command.actor))]
pub async fn handle<S: ParcelStore>(
    store: &mut S,
    command: DetailImportCommand,
) -> Result<DetailImportSummary, DetailImportError> {
    let started = Instant::now();
    let parsed = DetailFeedParser::new().parse(&command.grid);
    if parsed.rows.is_empty() && parsed.rejected.is_empty() {
        return Err(DetailImportError::Validation(
            "no data rows found in detail feed".into(),
        ));
    }

    store.begin().await?;
    let result = apply(store, &parsed, &command.actor).await;
    match result {
        Ok(mut summary) => {
            store.commit().await?;
            summary.elapsed_ms = started.elapsed().as_millis() as u64;
            summary.actor = command.actor;
            tracing::info!(
                total = summary.total,
                updated = summary.updated,
                missing = summary.missing,
                rejected = summary.rejected,
                elapsed_ms = summary.elapsed_ms,
                "detail feed import finished"
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
    parsed: &ParsedDetailFeed,
    actor: &str,
) -> Result<DetailImportSummary, DetailImportError> {
    let mut summary = DetailImportSummary {
        total: parsed.rows.len() + parsed.rejected.len(),
        delivered_like: 0,
        return_like: 0,
        updated: 0,
        missing: 0,
        rejected: parsed.rejected.len(),
        errors: parsed.rejected.clone(),
        elapsed_ms: 0,
        actor: String::new(),
    };

    for row in &parsed.rows {
        if let Err(err) = merge_row(store, row, actor, &mut summary).await {
            summary.rejected += 1;
            summary.errors.push(format!(
                "row {} ({}): {}",
                row.row_number, row.tracking, err
            ));
        }
    }

    Ok(summary)
}

async fn merge_row<S: ParcelStore>(
    store: &mut S,
    row: &DetailRow,
    actor: &str,
    summary: &mut DetailImportSummary,
) -> Result<(), StoreError> {
    let Some(mut parcel) = store.find_by_tracking_code(row.tracking.as_str()).await? else {
        summary.missing += 1;
        summary.errors.push(format!(
            "row {} ({}): not in store, skipped",
            row.row_number, row.tracking
        ));
        return Ok(());
    };

    if let Some(name) = &row.recipient_name {
        parcel.recipient_name = Some(name.clone());
    }
    if let Some(address) = &row.recipient_address {
        parcel.recipient_address = Some(address.clone());
    }
    if let Some(phone) = &row.recipient_phone {
        parcel.recipient_phone = Some(phone.clone());
    }
    if let Some(value) = row.declared_value {
        parcel.declared_value = Some(value);
    }
    if let Some(content) = &row.content_description {
        parcel.content_description = Some(content.clone());
    }
    if let Some(district) = row.district {
        let found = store.find_or_create_district(district).await?;
        parcel.district_id = found.id;
    }
    if let Some(status) = &row.status {
        parcel.external_status = Some(status.clone());
        parcel.external_status_at = Some(row.status_at.unwrap_or_else(Utc::now));
    }
    parcel.last_changed_by = Some(actor.to_string());

    store.update_parcel(&parcel).await?;

    // one counter per merged row
    match row.status.as_deref().map(classify_status) {
        Some(StatusClassification::DeliveredLike) => summary.delivered_like += 1,
        Some(StatusClassification::ReturnLike) => summary.return_like += 1,
        Some(StatusClassification::Informational) | None => summary.updated += 1,
    }

    Ok(())
}
