//! Payment model for leasing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// How the tenant paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Check,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "cash" => PaymentMethod::Cash,
            "bank_transfer" => PaymentMethod::BankTransfer,
            "check" => PaymentMethod::Check,
            _ => PaymentMethod::Other,
        }
    }
}

/// Funds applied against one invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
    pub receipt_number: String,
    pub description: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Payment {
    pub fn method(&self) -> PaymentMethod {
        PaymentMethod::from_string(&self.method)
    }
}

/// Input for applying a payment.
#[derive(Debug, Clone, Validate)]
pub struct CreatePayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    #[validate(length(max = 500, message = "Payment description is too long"))]
    pub description: Option<String>,
}

/// Editable payment fields. Invoice, amount and receipt number are fixed.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdatePayment {
    pub method: Option<PaymentMethod>,
    pub payment_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "Payment description is too long"))]
    pub description: Option<String>,
}

/// Filter parameters for listing payments.
#[derive(Debug, Clone, Default)]
pub struct ListPaymentsFilter {
    pub invoice_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
