use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::commands::batch::TextStatusCommand;
use super::commands::{
    ApplyStatusError, BatchStatusCommand, BatchStatusError, ExternalStatusCommand,
};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::{api::response::ApiResponse, store::PgParcelStore};

pub fn external_status_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(apply_status))
        .route("/batch", post(batch_status))
        .route("/text", post(text_status))
}

#[tracing::instrument(skip(state, command), fields(tracking = %command.tracking))]
async fn apply_status(
    State(state): State<FeatureState>,
    Json(command): Json<ExternalStatusCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::apply::handle(&mut store, command).await?;

    tracing::info!(
        tracking = %outcome.tracking,
        classification = ?outcome.classification,
        "External status recorded via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))).into_response())
}

#[tracing::instrument(skip(state, command), fields(count = command.trackings.len()))]
async fn batch_status(
    State(state): State<FeatureState>,
    Json(command): Json<BatchStatusCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::batch::handle(&mut store, command).await?;

    tracing::info!(
        total = outcome.total,
        ok = outcome.ok,
        fail = outcome.fail,
        "Batch external status recorded via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))).into_response())
}

#[tracing::instrument(skip(state, command))]
async fn text_status(
    State(state): State<FeatureState>,
    Json(command): Json<TextStatusCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::batch::handle_text(&mut store, command).await?;

    tracing::info!(
        total = outcome.total,
        ok = outcome.ok,
        fail = outcome.fail,
        "Text external status recorded via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))).into_response())
}

impl From<ApplyStatusError> for AppError {
    fn from(err: ApplyStatusError) -> Self {
        match err {
            ApplyStatusError::InvalidTracking(msg) => AppError::Validation(msg),
            ApplyStatusError::BlankStatus => {
                AppError::Validation("status text is required".to_string())
            },
            ApplyStatusError::NotFound(tracking) => {
                AppError::NotFound(format!("Parcel '{}' not found", tracking))
            },
            ApplyStatusError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<BatchStatusError> for AppError {
    fn from(err: BatchStatusError) -> Self {
        match err {
            BatchStatusError::Validation(msg) => AppError::Validation(msg),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: AppError = ApplyStatusError::BlankStatus.into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = ApplyStatusError::NotFound("CR1".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_routes_structure() {
        let router = external_status_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }
}
