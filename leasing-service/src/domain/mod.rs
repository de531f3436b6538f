//! Billing and lease lifecycle engine.
//!
//! [`LeaseEngine`] owns every multi-entity operation. Each operation opens a
//! single unit of work, re-reads the rows it depends on, validates, writes,
//! and commits; any error drops the unit and nothing is persisted.

pub mod apartments;
pub mod clock;
pub mod invoices;
pub mod lifecycle;
pub mod maintenance;
pub mod numbering;
pub mod payments;
pub mod schedule;
mod store_ext;
pub mod validation;

use std::sync::Arc;

use crate::services::{FileStorage, LeaseStore};

pub use clock::{Clock, FixedClock, SystemClock};

#[derive(Clone)]
pub struct LeaseEngine {
    store: Arc<dyn LeaseStore>,
    files: Arc<dyn FileStorage>,
    clock: Arc<dyn Clock>,
}

impl LeaseEngine {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        files: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            files,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn LeaseStore> {
        &self.store
    }
}
