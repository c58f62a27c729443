//! Feature modules implementing the SFR API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes:
//!
//! - **transitions**: lifecycle state changes, single and batched
//! - **external_status**: carrier status capture and classification
//! - **imports**: manifest and detail-feed reconciliation uploads
//! - **registration**: pre-registration, bag management, bulk delete,
//!   transition history
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations (where the feature has any)
//! - `routes.rs` - HTTP route definitions
//!
//! Command handlers are standalone async functions generic over
//! [`crate::store::ParcelStore`], so every handler is unit-testable against
//! the in-memory store.

pub mod external_status;
pub mod imports;
pub mod registration;
pub mod transitions;

use axum::Router;

use crate::config::ImportConfig;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for store operations
    pub db: sqlx::PgPool,
    /// Upload limits for the import endpoints
    pub imports: ImportConfig,
}

/// Creates the main API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest(
            "/transitions",
            transitions::transitions_routes().with_state(state.clone()),
        )
        .nest(
            "/external-status",
            external_status::external_status_routes().with_state(state.clone()),
        )
        .nest(
            "/imports",
            imports::imports_routes().with_state(state.clone()),
        )
        .merge(registration::registration_routes().with_state(state))
}
