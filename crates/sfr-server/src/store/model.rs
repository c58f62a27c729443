//! Store data model
//!
//! Rust-side view of the parcel tables. The underlying schema keeps the
//! warehouse vocabulary (`paquetes`, `sacos`, `distritos`,
//! `historial_paquetes`); these structs expose it with domain names.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sfr_common::{ParcelState, ReturnSubtype};

/// A sealed bag, identified by its seal number ("marchamo").
#[derive(Debug, Clone, Serialize)]
pub struct Bag {
    pub id: i64,
    pub seal: String,
}

/// A destination district.
#[derive(Debug, Clone, Serialize)]
pub struct District {
    pub id: i64,
    pub name: String,
}

/// A parcel with its full lifecycle and recipient data.
#[derive(Debug, Clone, Serialize)]
pub struct Parcel {
    pub id: i64,
    pub tracking_code: String,
    pub state: ParcelState,
    pub return_subtype: ReturnSubtype,
    pub bag_id: i64,
    pub district_id: i64,
    pub recipient_name: Option<String>,
    pub recipient_address: Option<String>,
    pub recipient_phone: Option<String>,
    pub declared_value: Option<f64>,
    pub content_description: Option<String>,
    pub observations: Option<String>,
    /// Responsible operator recorded on the receiving manifest
    pub manifest_responsible: Option<String>,
    pub received_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub last_state_change_at: DateTime<Utc>,
    /// Last raw status text reported by the external carrier, verbatim
    pub external_status: Option<String>,
    pub external_status_at: Option<DateTime<Utc>>,
    /// Operator behind the most recent change
    pub last_changed_by: Option<String>,
}

/// A new parcel entering the system in the initial state.
#[derive(Debug, Clone)]
pub struct NewParcel {
    pub tracking_code: String,
    pub bag_id: i64,
    pub district_id: i64,
    pub received_at: DateTime<Utc>,
    pub changed_by: String,
}

/// One append-only ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionRecord {
    pub id: i64,
    pub parcel_id: i64,
    /// `None` for the creation entry
    pub from_state: Option<ParcelState>,
    pub to_state: ParcelState,
    pub changed_at: DateTime<Utc>,
    pub motive: Option<String>,
    pub changed_by: String,
}

/// Ledger entry to append.
#[derive(Debug, Clone)]
pub struct NewTransition {
    pub parcel_id: i64,
    pub from_state: Option<ParcelState>,
    pub to_state: ParcelState,
    pub changed_at: DateTime<Utc>,
    pub motive: Option<String>,
    pub changed_by: String,
}

/// Manifest merge payload for one existing parcel.
#[derive(Debug, Clone)]
pub struct ManifestUpdate {
    pub tracking_code: String,
    pub bag_id: i64,
    pub district_id: i64,
    pub received_at: DateTime<Utc>,
    pub changed_by: String,
    /// Only overwrites the stored value when present
    pub observations: Option<String>,
    /// Only overwrites the stored value when present
    pub responsible: Option<String>,
}
