//! External-status write operations

pub mod apply;
pub mod batch;

pub use apply::{
    classify_status, ApplyStatusError, ExternalStatusCommand, ExternalStatusOutcome,
    StatusClassification,
};
pub use batch::{BatchStatusCommand, BatchStatusError, BatchStatusOutcome};
