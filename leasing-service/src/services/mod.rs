//! Stores, file storage and metrics for leasing-service.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod storage;
pub mod store;

pub use database::PgLeaseStore;
pub use memory::MemoryLeaseStore;
pub use metrics::{get_metrics, init_metrics};
pub use storage::{FileCategory, FileStorage, LocalFileStorage};
pub use store::{LeaseStore, UnitOfWork};
