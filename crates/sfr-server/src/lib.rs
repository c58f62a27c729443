//! SFR Server Library
//!
//! HTTP service for parcel lifecycle tracking and bulk reconciliation.
//!
//! # Overview
//!
//! Parcels arrive at the hub inside sealed bags, get routed to a destination
//! district and move through a small lifecycle until delivered or returned.
//! This crate provides:
//!
//! - **Lifecycle transitions** with an append-only audit ledger
//! - **Batch transitions** over explicit lists or pasted free text
//! - **External carrier status** capture and advisory classification
//! - **Reconciliation imports**: receiving manifests (create-or-update) and
//!   per-parcel detail feeds (update-only)
//! - **Registration**: pre-registering parcels, bag management, bulk delete
//!
//! # Architecture
//!
//! Features are vertical slices under [`features`], each with `commands/`,
//! optional `queries/` and a `routes.rs`. All persistence goes through the
//! [`store::ParcelStore`] trait; [`store::PgParcelStore`] is the production
//! implementation and [`store::MemoryStore`] backs the unit tests.
//!
//! Every write operation receives the acting operator and an optional
//! explicit timestamp; nothing is taken from ambient state.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod store;

pub use error::{AppError, AppResult};
