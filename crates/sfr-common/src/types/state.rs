//! Parcel lifecycle states
//!
//! The lifecycle is a closed set of four states. String codes are the
//! persisted representation and the wire representation; they are kept
//! verbatim from the operational vocabulary the warehouse teams use.

use serde::{Deserialize, Serialize};

use crate::error::SfrError;

/// Lifecycle state of a parcel.
///
/// A parcel enters the system as [`ParcelState::AwaitingRecipientAvailable`]
/// and moves between states through audited transitions. `NotDeliverable` is
/// the return path and carries a [`ReturnSubtype`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelState {
    /// Handed to the local carrier for a first delivery attempt
    #[serde(rename = "ENTREGADO_A_TRANSPORTISTA_LOCAL")]
    DeliveredToLocalCarrier,

    /// Handed to the local carrier for a second delivery attempt
    #[serde(rename = "ENTREGADO_A_TRANSPORTISTA_LOCAL_2DO_INTENTO")]
    DeliveredToLocalCarrierSecondAttempt,

    /// In the warehouse, waiting for the recipient to be available (initial state)
    #[serde(rename = "NO_ENTREGADO_CONSIGNATARIO_DISPONIBLE")]
    AwaitingRecipientAvailable,

    /// Delivery abandoned; parcel is on the return path
    #[serde(rename = "NO_ENTREGABLE")]
    NotDeliverable,
}

impl ParcelState {
    /// The state every new parcel starts in.
    pub const INITIAL: ParcelState = ParcelState::AwaitingRecipientAvailable;

    pub const ALL: [ParcelState; 4] = [
        ParcelState::DeliveredToLocalCarrier,
        ParcelState::DeliveredToLocalCarrierSecondAttempt,
        ParcelState::AwaitingRecipientAvailable,
        ParcelState::NotDeliverable,
    ];

    /// Persisted/wire string code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelState::DeliveredToLocalCarrier => "ENTREGADO_A_TRANSPORTISTA_LOCAL",
            ParcelState::DeliveredToLocalCarrierSecondAttempt => {
                "ENTREGADO_A_TRANSPORTISTA_LOCAL_2DO_INTENTO"
            },
            ParcelState::AwaitingRecipientAvailable => "NO_ENTREGADO_CONSIGNATARIO_DISPONIBLE",
            ParcelState::NotDeliverable => "NO_ENTREGABLE",
        }
    }

    /// True for the two delivery-attempt states.
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            ParcelState::DeliveredToLocalCarrier
                | ParcelState::DeliveredToLocalCarrierSecondAttempt
        )
    }
}

impl std::str::FromStr for ParcelState {
    type Err = SfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENTREGADO_A_TRANSPORTISTA_LOCAL" => Ok(ParcelState::DeliveredToLocalCarrier),
            "ENTREGADO_A_TRANSPORTISTA_LOCAL_2DO_INTENTO" => {
                Ok(ParcelState::DeliveredToLocalCarrierSecondAttempt)
            },
            "NO_ENTREGADO_CONSIGNATARIO_DISPONIBLE" => Ok(ParcelState::AwaitingRecipientAvailable),
            "NO_ENTREGABLE" => Ok(ParcelState::NotDeliverable),
            other => Err(SfrError::Parse(format!("unknown parcel state: {other}"))),
        }
    }
}

impl std::fmt::Display for ParcelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a parcel became not deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReturnSubtype {
    /// Destination is outside the delivery routes
    #[default]
    #[serde(rename = "FUERA_DE_RUTA")]
    OutOfRoute,

    /// Holding period expired
    #[serde(rename = "VENCIDOS")]
    Expired,

    /// Two failed delivery attempts
    #[serde(rename = "DOS_INTENTOS")]
    TwoAttempts,
}

impl ReturnSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnSubtype::OutOfRoute => "FUERA_DE_RUTA",
            ReturnSubtype::Expired => "VENCIDOS",
            ReturnSubtype::TwoAttempts => "DOS_INTENTOS",
        }
    }
}

impl std::str::FromStr for ReturnSubtype {
    type Err = SfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FUERA_DE_RUTA" => Ok(ReturnSubtype::OutOfRoute),
            "VENCIDOS" => Ok(ReturnSubtype::Expired),
            "DOS_INTENTOS" => Ok(ReturnSubtype::TwoAttempts),
            other => Err(SfrError::Parse(format!("unknown return subtype: {other}"))),
        }
    }
}

impl std::fmt::Display for ReturnSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
