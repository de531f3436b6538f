//! Leasing service: apartments, lease contracts, rent invoice schedules,
//! payments and tenant-billed maintenance.

pub mod config;
pub mod domain;
pub mod error;
pub mod grpc;
pub mod models;
pub mod services;
pub mod startup;
