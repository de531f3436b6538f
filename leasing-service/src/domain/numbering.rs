//! Invoice and receipt number generation.
//!
//! Numbers start with the creation time in milliseconds so they sort by
//! issue order; schedule invoices add the zero-padded position within the
//! batch, and every number ends in a random suffix so concurrent requests in
//! the same millisecond cannot collide.

use chrono::{DateTime, Utc};
use rand::Rng;

fn suffix() -> String {
    format!("{:04X}", rand::thread_rng().gen::<u16>())
}

/// Number for the `index`-th invoice of one generation batch.
pub fn schedule_invoice_number(now: DateTime<Utc>, index: usize) -> String {
    format!(
        "INV-{}-{:03}-{}",
        now.timestamp_millis(),
        index + 1,
        suffix()
    )
}

/// Number for a one-off invoice issued by hand.
pub fn manual_invoice_number(now: DateTime<Utc>) -> String {
    format!("INV-{}-{}", now.timestamp_millis(), suffix())
}

/// Number for a maintenance charge billed to the tenant.
pub fn maintenance_invoice_number(now: DateTime<Utc>) -> String {
    format!("INV-M-{}-{}", now.timestamp_millis(), suffix())
}

pub fn receipt_number(now: DateTime<Utc>) -> String {
    format!("RCPT-{}-{}", now.timestamp_millis(), suffix())
}
