//! Invoice model for leasing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Settlement state of an invoice, always derived from paid vs. due amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Unpaid,
        }
    }

    /// Status as a pure function of the running paid total.
    pub fn derive(paid_amount: Decimal, amount: Decimal) -> Self {
        if paid_amount <= Decimal::ZERO {
            InvoiceStatus::Unpaid
        } else if paid_amount >= amount {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        }
    }

    /// PartiallyPaid or Paid.
    pub fn is_settled(&self) -> bool {
        !matches!(self, InvoiceStatus::Unpaid)
    }
}

/// Billing obligation for one rent period or a one-off charge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub contract_id: Uuid,
    pub apartment_id: Uuid,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub due_date: NaiveDate,
    pub status: String,
    pub description: String,
    pub period_index: Option<i32>,
    pub maintenance_related: bool,
    pub maintenance_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn balance(&self) -> Decimal {
        (self.amount - self.paid_amount).max(Decimal::ZERO)
    }

    /// Generated by the contract's rent schedule (not manual, not maintenance).
    pub fn is_scheduled(&self) -> bool {
        self.period_index.is_some() && !self.maintenance_related
    }

    /// Set the paid total and re-derive the status from it.
    pub fn apply_paid_amount(&mut self, paid_amount: Decimal) {
        self.paid_amount = paid_amount;
        self.status = InvoiceStatus::derive(self.paid_amount, self.amount)
            .as_str()
            .to_string();
    }
}

/// Input for issuing a one-off invoice against a contract.
#[derive(Debug, Clone, Validate)]
pub struct CreateInvoice {
    pub contract_id: Uuid,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    #[validate(length(min = 1, max = 500, message = "Invoice description is required"))]
    pub description: String,
}

/// Input for editing an invoice. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateInvoice {
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500, message = "Invoice description cannot be empty"))]
    pub description: Option<String>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub contract_id: Option<Uuid>,
    pub apartment_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
