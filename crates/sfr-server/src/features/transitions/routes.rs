use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::commands::batch::TextTransitionCommand;
use super::commands::{
    ApplyTransitionError, BatchTransitionCommand, BatchTransitionError, TransitionCommand,
};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::{api::response::ApiResponse, store::PgParcelStore};

pub fn transitions_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(apply_transition))
        .route("/batch", post(batch_transition))
        .route("/text", post(text_transition))
}

#[tracing::instrument(skip(state, command), fields(tracking = %command.tracking, target = %command.target))]
async fn apply_transition(
    State(state): State<FeatureState>,
    Json(command): Json<TransitionCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::apply::handle(&mut store, command).await?;

    tracing::info!(
        tracking = %outcome.tracking,
        new_state = %outcome.new_state,
        changed = outcome.changed,
        "Transition applied via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))).into_response())
}

#[tracing::instrument(skip(state, command), fields(count = command.trackings.len(), target = %command.target))]
async fn batch_transition(
    State(state): State<FeatureState>,
    Json(command): Json<BatchTransitionCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::batch::handle(&mut store, command).await?;

    tracing::info!(
        total = outcome.total,
        ok = outcome.ok,
        fail = outcome.fail,
        "Batch transition applied via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))).into_response())
}

#[tracing::instrument(skip(state, command), fields(target = %command.target))]
async fn text_transition(
    State(state): State<FeatureState>,
    Json(command): Json<TextTransitionCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::batch::handle_text(&mut store, command).await?;

    tracing::info!(
        total = outcome.total,
        ok = outcome.ok,
        fail = outcome.fail,
        "Text transition applied via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))).into_response())
}

impl From<ApplyTransitionError> for AppError {
    fn from(err: ApplyTransitionError) -> Self {
        match err {
            ApplyTransitionError::InvalidTracking(msg) => AppError::Validation(msg),
            ApplyTransitionError::NotFound(tracking) => {
                AppError::NotFound(format!("Parcel '{}' not found", tracking))
            },
            ApplyTransitionError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<BatchTransitionError> for AppError {
    fn from(err: BatchTransitionError) -> Self {
        match err {
            BatchTransitionError::Validation(msg) => AppError::Validation(msg),
        }
    }
}
