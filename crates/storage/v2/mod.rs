pub mod backend;
pub mod domain;
pub mod schema;

pub use backend::StorageBackend;
pub use domain::DomainStore;
