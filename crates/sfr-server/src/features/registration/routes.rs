use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

use super::commands::{
    BagError, CreateBagCommand, DeleteBagCommand, DeleteParcelsCommand, DeleteParcelsError,
    PreregisterCommand, PreregisterError,
};
use super::queries::{HistoryError, HistoryQuery};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::{api::response::ApiResponse, store::PgParcelStore};

pub fn registration_routes() -> Router<FeatureState> {
    Router::new()
        .route("/parcels", post(preregister_parcel))
        .route("/parcels/delete-batch", post(delete_parcels))
        .route("/parcels/:tracking/history", get(parcel_history))
        .route("/bags", post(create_bag))
        .route("/bags/:seal", delete(delete_bag))
}

#[tracing::instrument(skip(state, command), fields(tracking = %command.tracking))]
async fn preregister_parcel(
    State(state): State<FeatureState>,
    Json(command): Json<PreregisterCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let outcome = super::commands::preregister::handle(&mut store, command).await?;

    tracing::info!(tracking = %outcome.tracking, "Parcel pre-registered via API");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))).into_response())
}

#[tracing::instrument(skip(state, command), fields(count = command.trackings.len()))]
async fn delete_parcels(
    State(state): State<FeatureState>,
    Json(command): Json<DeleteParcelsCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let summary = super::commands::delete::handle(&mut store, command).await?;

    tracing::info!(
        requested = summary.requested,
        deleted = summary.deleted,
        "Parcels deleted via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(summary))).into_response())
}

#[tracing::instrument(skip(state), fields(tracking = %tracking))]
async fn parcel_history(
    State(state): State<FeatureState>,
    Path(tracking): Path<String>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let history =
        super::queries::history::handle(&mut store, HistoryQuery { tracking }).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(history))).into_response())
}

#[tracing::instrument(skip(state, command), fields(seal = %command.seal))]
async fn create_bag(
    State(state): State<FeatureState>,
    Json(command): Json<CreateBagCommand>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    let bag = super::commands::bags::create(&mut store, command).await?;

    tracing::info!(seal = %bag.seal, "Bag created via API");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(bag))).into_response())
}

#[tracing::instrument(skip(state), fields(seal = %seal))]
async fn delete_bag(
    State(state): State<FeatureState>,
    Path(seal): Path<String>,
) -> Result<Response, AppError> {
    let mut store = PgParcelStore::new(state.db.clone());
    super::commands::bags::delete_empty(&mut store, DeleteBagCommand { seal: seal.clone() })
        .await?;

    tracing::info!(seal = %seal, "Bag deleted via API");

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({ "seal": seal }))),
    )
        .into_response())
}

impl From<PreregisterError> for AppError {
    fn from(err: PreregisterError) -> Self {
        match err {
            PreregisterError::InvalidTracking(msg) => AppError::Validation(msg),
            PreregisterError::AlreadyExists(tracking) => {
                AppError::Conflict(format!("Parcel '{}' already exists", tracking))
            },
            PreregisterError::BagNotFound(seal) => {
                AppError::NotFound(format!("Bag with seal '{}' not found", seal))
            },
            PreregisterError::DistrictNotFound(name) => {
                AppError::NotFound(format!("District '{}' not found", name))
            },
            PreregisterError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<BagError> for AppError {
    fn from(err: BagError) -> Self {
        match err {
            BagError::SealRequired => AppError::Validation("seal number is required".to_string()),
            BagError::NotFound(seal) => {
                AppError::NotFound(format!("Bag with seal '{}' not found", seal))
            },
            BagError::NotEmpty(seal, count) => AppError::Conflict(format!(
                "Bag with seal '{}' still holds {} parcel(s)",
                seal, count
            )),
            BagError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<DeleteParcelsError> for AppError {
    fn from(err: DeleteParcelsError) -> Self {
        match err {
            DeleteParcelsError::Validation(msg) => AppError::Validation(msg),
            DeleteParcelsError::Store(err) => AppError::Store(err),
        }
    }
}

impl From<HistoryError> for AppError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::InvalidTracking(msg) => AppError::Validation(msg),
            HistoryError::NotFound(tracking) => {
                AppError::NotFound(format!("Parcel '{}' not found", tracking))
            },
            HistoryError::Store(err) => AppError::Store(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: AppError = PreregisterError::AlreadyExists("HZCR1".to_string()).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = BagError::NotEmpty("12345".to_string(), 3).into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_routes_structure() {
        let router = registration_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }
}
