//! Lease contract model for leasing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// How often rent is invoiced within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentFrequency {
    #[serde(rename = "yearly")]
    Yearly,
    #[serde(rename = "bi-annually")]
    BiAnnually,
    #[serde(rename = "quarterly")]
    Quarterly,
    #[serde(rename = "monthly")]
    Monthly,
}

impl PaymentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFrequency::Yearly => "yearly",
            PaymentFrequency::BiAnnually => "bi-annually",
            PaymentFrequency::Quarterly => "quarterly",
            PaymentFrequency::Monthly => "monthly",
        }
    }

    /// Strict parse; unknown values are a validation failure, not a default.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "yearly" => Some(PaymentFrequency::Yearly),
            "bi-annually" => Some(PaymentFrequency::BiAnnually),
            "quarterly" => Some(PaymentFrequency::Quarterly),
            "monthly" => Some(PaymentFrequency::Monthly),
            _ => None,
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Yearly => 1,
            PaymentFrequency::BiAnnually => 2,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::Monthly => 12,
        }
    }

    /// Months between two consecutive due dates.
    pub fn step_months(&self) -> u32 {
        12 / self.periods_per_year()
    }
}

/// Lease agreement between the property and a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub contract_id: Uuid,
    pub apartment_id: Uuid,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub tenant_id_image_path: Option<String>,
    pub contract_file_path: Option<String>,
    pub duration_years: i32,
    pub payment_frequency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_amount: Decimal,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Contract {
    /// Stored frequency; rows are constrained to valid values, yearly is the fallback.
    pub fn frequency(&self) -> PaymentFrequency {
        PaymentFrequency::parse(&self.payment_frequency).unwrap_or(PaymentFrequency::Yearly)
    }

    /// Terms that drive the invoice schedule.
    pub fn terms(&self) -> ContractTerms {
        ContractTerms {
            duration_years: self.duration_years as u32,
            frequency: self.frequency(),
            start_date: self.start_date,
            end_date: self.end_date,
            total_amount: self.total_amount,
        }
    }
}

/// Schedule-relevant subset of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractTerms {
    pub duration_years: u32,
    pub frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_amount: Decimal,
}

/// Input for creating a contract.
#[derive(Debug, Clone, Validate)]
pub struct CreateContract {
    pub apartment_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Tenant name is required"))]
    pub tenant_name: String,
    #[validate(length(min = 1, max = 64, message = "Tenant phone is required"))]
    pub tenant_phone: String,
    pub tenant_id_image_path: Option<String>,
    pub contract_file_path: Option<String>,
    #[validate(range(min = 1, max = 99, message = "Duration must be a whole number of years greater than 0"))]
    pub duration_years: i32,
    pub payment_frequency: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_amount: Decimal,
}

/// Input for updating a contract. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateContract {
    pub apartment_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Tenant name cannot be empty"))]
    pub tenant_name: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Tenant phone cannot be empty"))]
    pub tenant_phone: Option<String>,
    #[validate(range(min = 1, max = 99, message = "Duration must be a whole number of years greater than 0"))]
    pub duration_years: Option<i32>,
    pub payment_frequency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Filter parameters for listing contracts.
#[derive(Debug, Clone, Default)]
pub struct ListContractsFilter {
    pub apartment_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
