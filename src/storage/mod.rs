pub mod store;
pub mod schema;
pub mod manager;
pub mod patients;
pub mod handlers;
pub mod repository;

pub use store::{BlobStore, MemoryStore};
pub use manager::DuckDbStore;
pub use patients::PatientStore;
pub use handlers::run_storage_handler;
pub use repository::{Repository, StorageClient, StorageService};
