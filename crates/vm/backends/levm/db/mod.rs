pub mod logger;
pub mod store;
pub mod witness;

pub use logger::DatabaseLogger;
pub use store::StoreVmDatabase;
pub use witness::GuestProgramStateWrapper;
