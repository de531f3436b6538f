//! Rent schedule computation.
//!
//! Everything here is pure: given contract terms (and "today" for
//! regeneration) it returns what the invoice set should look like. Writing
//! the result is the lifecycle manager's job.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{ContractTerms, Invoice, InvoiceStatus};

/// Minor currency unit precision for every generated amount.
pub const MONEY_SCALE: u32 = 2;

/// One rent period of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Installment {
    pub period_index: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// `date + months`, clamped to the last day of the target month
/// (Jan 31 + 1 month = Feb 28, or Feb 29 in a leap year).
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// First day of the month after `date`.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    add_months(first, 1)
}

/// End date implied by the lease duration.
pub fn default_end_date(start_date: NaiveDate, duration_years: u32) -> NaiveDate {
    add_months(start_date, duration_years * 12)
}

pub fn period_count(terms: &ContractTerms) -> u32 {
    terms.duration_years * terms.frequency.periods_per_year()
}

/// Amount due for period `index` out of `periods`.
///
/// Every period gets the total divided evenly and truncated to the minor
/// unit; the last period also carries the truncation remainder so a full
/// schedule sums to `total` exactly.
pub fn installment_amount(total: Decimal, periods: u32, index: u32) -> Decimal {
    if periods == 0 {
        return Decimal::ZERO;
    }
    let base = (total / Decimal::from(periods))
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    if index + 1 == periods {
        total - base * Decimal::from(periods - 1)
    } else {
        base
    }
}

/// Full schedule anchored at `anchor`: due dates are always
/// `anchor + i × step`, never chained from the previous due date.
fn schedule_from(terms: &ContractTerms, anchor: NaiveDate) -> Vec<Installment> {
    let periods = period_count(terms);
    let step = terms.frequency.step_months();

    (0..periods)
        .map(|i| Installment {
            period_index: i,
            due_date: add_months(anchor, i * step),
            amount: installment_amount(terms.total_amount, periods, i),
        })
        .collect()
}

/// Schedule for a new contract, starting at its start date. Installments
/// falling due after the contract's end date are not issued.
pub fn build_schedule(terms: &ContractTerms) -> Vec<Installment> {
    schedule_from(terms, terms.start_date)
        .into_iter()
        .filter(|inst| inst.due_date <= terms.end_date)
        .collect()
}

/// Human description of a rent invoice, e.g. "Rent payment for A-12 - Mar 2026".
pub fn rent_description(apartment_number: &str, due_date: NaiveDate) -> String {
    format!(
        "Rent payment for {} - {}",
        apartment_number,
        due_date.format("%b %Y")
    )
}

/// Which kind of rework a terms change calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermsChange {
    Unchanged,
    /// Only the total changed: reprice unpaid invoices in place.
    AmountOnly,
    /// Duration, start or end moved: rebuild future unpaid invoices.
    Reschedule,
    /// Frequency changed: rebuild every unpaid invoice from next month.
    Frequency,
}

pub fn classify_change(old: &ContractTerms, new: &ContractTerms) -> TermsChange {
    if old.frequency != new.frequency {
        TermsChange::Frequency
    } else if old.duration_years != new.duration_years
        || old.start_date != new.start_date
        || old.end_date != new.end_date
    {
        TermsChange::Reschedule
    } else if old.total_amount != new.total_amount {
        TermsChange::AmountOnly
    } else {
        TermsChange::Unchanged
    }
}

/// Writes needed to bring a contract's schedule invoices in line with new terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegenerationPlan {
    pub delete: Vec<Uuid>,
    pub reprice: Vec<(Uuid, Decimal)>,
    pub create: Vec<Installment>,
}

impl RegenerationPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.reprice.is_empty() && self.create.is_empty()
    }
}

/// Plan the regeneration of a contract's schedule after its terms changed.
///
/// Only Unpaid schedule invoices are ever deleted or repriced; settled,
/// manual and maintenance invoices are left exactly as they are. New
/// installments due on or before `today` or after the end date are skipped.
pub fn plan_regeneration(
    existing: &[Invoice],
    old: &ContractTerms,
    new: &ContractTerms,
    today: NaiveDate,
) -> RegenerationPlan {
    let unpaid_scheduled = |inv: &&Invoice| {
        inv.is_scheduled() && inv.status() == InvoiceStatus::Unpaid
    };
    let in_range = |inst: &Installment| inst.due_date > today && inst.due_date <= new.end_date;

    match classify_change(old, new) {
        TermsChange::Unchanged => RegenerationPlan::default(),

        TermsChange::AmountOnly => {
            let periods = period_count(new);
            let reprice = existing
                .iter()
                .filter(unpaid_scheduled)
                .filter_map(|inv| {
                    let index = u32::try_from(inv.period_index?).ok()?;
                    (index < periods).then(|| {
                        (
                            inv.invoice_id,
                            installment_amount(new.total_amount, periods, index),
                        )
                    })
                })
                .filter(|(id, amount)| {
                    existing
                        .iter()
                        .any(|inv| inv.invoice_id == *id && inv.amount != *amount)
                })
                .collect();

            RegenerationPlan {
                reprice,
                ..Default::default()
            }
        }

        TermsChange::Reschedule => {
            let delete: Vec<Uuid> = existing
                .iter()
                .filter(unpaid_scheduled)
                .filter(|inv| inv.due_date > today)
                .map(|inv| inv.invoice_id)
                .collect();

            // Period indices shift with the start date, so a kept invoice
            // only covers the installment falling due on the same day.
            let covered: HashSet<NaiveDate> = existing
                .iter()
                .filter(|inv| inv.is_scheduled() && !delete.contains(&inv.invoice_id))
                .map(|inv| inv.due_date)
                .collect();

            let create = build_schedule(new)
                .into_iter()
                .filter(in_range)
                .filter(|inst| !covered.contains(&inst.due_date))
                .collect();

            RegenerationPlan {
                delete,
                create,
                ..Default::default()
            }
        }

        TermsChange::Frequency => {
            let delete = existing
                .iter()
                .filter(unpaid_scheduled)
                .map(|inv| inv.invoice_id)
                .collect();

            let create = schedule_from(new, first_of_next_month(today))
                .into_iter()
                .filter(in_range)
                .collect();

            RegenerationPlan {
                delete,
                create,
                ..Default::default()
            }
        }
    }
}
