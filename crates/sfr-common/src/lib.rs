//! SFR Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the SFR parcel service.
//!
//! # Overview
//!
//! This crate provides common functionality used across all SFR workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Tracing-based logging setup shared by every binary
//! - **Domain Types**: Parcel lifecycle states and return subtypes
//! - **Identifiers**: Tracking code validation and free-text extraction
//! - **Districts**: Canonical destination district names and fuzzy matching
//!
//! # Example
//!
//! ```
//! use sfr_common::tracking::extract_tracking_codes;
//!
//! let codes = extract_tracking_codes("recibidos: hzcr123, CR456 y HZCR123 otra vez");
//! assert_eq!(codes.len(), 2);
//! assert_eq!(codes[0].as_str(), "HZCR123");
//! ```

pub mod district;
pub mod error;
pub mod logging;
pub mod tracking;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SfrError};
pub use tracking::TrackingCode;
pub use types::{ParcelState, ReturnSubtype};
