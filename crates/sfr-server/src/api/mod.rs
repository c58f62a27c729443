//! API surface helpers

pub mod response;
