use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use sfr_ingest::Grid;

use super::commands::{
    DetailImportCommand, DetailImportError, ManifestImportCommand, ManifestImportError,
};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::{api::response::ApiResponse, store::PgParcelStore};

const DEFAULT_ACTOR: &str = "api";

pub fn imports_routes() -> Router<FeatureState> {
    Router::new()
        .route("/manifest", post(import_manifest))
        .route("/detail-feed", post(import_detail_feed))
}

/// Extracted multipart payload: the uploaded file plus an optional actor
struct Upload {
    bytes: Vec<u8>,
    actor: String,
}

async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut actor = DEFAULT_ACTOR.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file bytes: {}", e))
                })?;
                if data.len() > max_bytes {
                    return Err(AppError::Validation(format!(
                        "upload exceeds the {} byte limit",
                        max_bytes
                    )));
                }
                bytes = Some(data.to_vec());
            },
            "actor" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read actor field: {}", e))
                })?;
                if !text.trim().is_empty() {
                    actor = text.trim().to_string();
                }
            },
            _ => {},
        }
    }

    let bytes = bytes
        .ok_or_else(|| AppError::Validation("no file field found in multipart data".into()))?;
    Ok(Upload { bytes, actor })
}

#[tracing::instrument(skip(state, multipart))]
async fn import_manifest(
    State(state): State<FeatureState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart, state.imports.max_upload_bytes).await?;
    let grid = Grid::from_delimited_bytes(&upload.bytes)
        .map_err(|e| AppError::BadRequest(format!("Unreadable manifest file: {}", e)))?;

    let mut store = PgParcelStore::new(state.db.clone());
    let summary = super::commands::manifest::handle(
        &mut store,
        ManifestImportCommand {
            grid,
            actor: upload.actor,
        },
    )
    .await?;

    tracing::info!(
        total = summary.total,
        created = summary.created,
        "Manifest imported via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(summary))).into_response())
}

#[tracing::instrument(skip(state, multipart))]
async fn import_detail_feed(
    State(state): State<FeatureState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart, state.imports.max_upload_bytes).await?;
    let grid = Grid::from_delimited_bytes(&upload.bytes)
        .map_err(|e| AppError::BadRequest(format!("Unreadable detail feed: {}", e)))?;

    let mut store = PgParcelStore::new(state.db.clone());
    let summary = super::commands::detail::handle(
        &mut store,
        DetailImportCommand {
            grid,
            actor: upload.actor,
        },
    )
    .await?;

    tracing::info!(
        total = summary.total,
        updated = summary.updated,
        missing = summary.missing,
        "Detail feed imported via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(summary))).into_response())
}

impl From<ManifestImportError> for AppError {
    fn from(err: ManifestImportError) -> Self {
        match err {
            ManifestImportError::Validation(msg) => AppError::Validation(msg),
            ManifestImportError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<DetailImportError> for AppError {
    fn from(err: DetailImportError) -> Self {
        match err {
            DetailImportError::Validation(msg) => AppError::Validation(msg),
            DetailImportError::Store(err) => AppError::Store(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: AppError = ManifestImportError::Validation("empty".into()).into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_routes_structure() {
        let router = imports_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }
}
