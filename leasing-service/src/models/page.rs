//! Cursor pagination shared by every list operation.

use uuid::Uuid;

use super::{Apartment, Contract, Invoice, Maintenance, Payment};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 100;

/// Row with a stable id usable as a page cursor.
pub trait Keyed {
    fn key(&self) -> Uuid;
}

impl Keyed for Apartment {
    fn key(&self) -> Uuid {
        self.apartment_id
    }
}

impl Keyed for Contract {
    fn key(&self) -> Uuid {
        self.contract_id
    }
}

impl Keyed for Invoice {
    fn key(&self) -> Uuid {
        self.invoice_id
    }
}

impl Keyed for Payment {
    fn key(&self) -> Uuid {
        self.payment_id
    }
}

impl Keyed for Maintenance {
    fn key(&self) -> Uuid {
        self.maintenance_id
    }
}

/// Number of rows per page; non-positive sizes mean the default.
pub fn page_limit(page_size: i32) -> usize {
    if page_size <= 0 {
        DEFAULT_PAGE_SIZE as usize
    } else {
        page_size.clamp(1, MAX_PAGE_SIZE) as usize
    }
}

/// One page of rows plus the cursor for the next one.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<Uuid>,
}

impl<T: Keyed> Page<T> {
    /// Build a page from rows fetched with `limit + 1`; the extra row only
    /// signals that another page exists.
    pub fn from_overfetch(mut rows: Vec<T>, limit: usize) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_page_token = if has_more {
            rows.last().map(Keyed::key)
        } else {
            None
        };
        Self {
            items: rows,
            next_page_token,
        }
    }

    /// Paginate rows that are already filtered and in list order. The page
    /// starts right after the row whose key equals `page_token`; an unknown
    /// cursor yields an empty page.
    pub fn paginate<I>(rows: I, page_size: i32, page_token: Option<Uuid>) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let limit = page_limit(page_size);
        let mut rows = rows.into_iter();

        if let Some(cursor) = page_token {
            if !rows.by_ref().any(|row| row.key() == cursor) {
                return Self {
                    items: Vec::new(),
                    next_page_token: None,
                };
            }
        }

        Self::from_overfetch(rows.take(limit + 1).collect(), limit)
    }
}
