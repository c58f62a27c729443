//! Registration write operations

pub mod bags;
pub mod delete;
pub mod preregister;

pub use bags::{BagError, CreateBagCommand, DeleteBagCommand};
pub use delete::{DeleteParcelsCommand, DeleteParcelsError, DeleteParcelsSummary};
pub use preregister::{PreregisterCommand, PreregisterError, PreregisterOutcome};
