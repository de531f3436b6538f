//! Maintenance record model for leasing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Owner-side settlement of the provider's bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Pending,
    PaidByOwner,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Pending => "pending",
            MaintenanceStatus::PaidByOwner => "paid_by_owner",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid_by_owner" => MaintenanceStatus::PaidByOwner,
            _ => MaintenanceStatus::Pending,
        }
    }
}

/// Maintenance event on an apartment, optionally billed to the tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Maintenance {
    pub maintenance_id: Uuid,
    pub apartment_id: Uuid,
    pub description: String,
    pub cost: Decimal,
    pub maintenance_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub provider_name: String,
    pub provider_contact: String,
    pub provider_company: Option<String>,
    pub status: String,
    pub bill_to_tenant: bool,
    pub invoice_id: Option<Uuid>,
    pub invoice_file_path: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Maintenance {
    pub fn status(&self) -> MaintenanceStatus {
        MaintenanceStatus::from_string(&self.status)
    }
}

/// Input for recording maintenance.
#[derive(Debug, Clone, Validate)]
pub struct CreateMaintenance {
    pub apartment_id: Uuid,
    #[validate(length(min = 1, max = 1000, message = "Maintenance description is required"))]
    pub description: String,
    pub cost: Decimal,
    pub maintenance_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 255, message = "Service provider name is required"))]
    pub provider_name: String,
    #[validate(length(min = 1, max = 255, message = "Service provider contact is required"))]
    pub provider_contact: String,
    #[validate(length(max = 255, message = "Service provider company is too long"))]
    pub provider_company: Option<String>,
    pub status: MaintenanceStatus,
    pub bill_to_tenant: bool,
}

/// Input for updating maintenance. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateMaintenance {
    #[validate(length(min = 1, max = 1000, message = "Maintenance description cannot be empty"))]
    pub description: Option<String>,
    pub cost: Option<Decimal>,
    pub maintenance_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 255, message = "Service provider name cannot be empty"))]
    pub provider_name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Service provider contact cannot be empty"))]
    pub provider_contact: Option<String>,
    #[validate(length(max = 255, message = "Service provider company is too long"))]
    pub provider_company: Option<String>,
    pub status: Option<MaintenanceStatus>,
    pub bill_to_tenant: Option<bool>,
}

/// Filter parameters for listing maintenance.
#[derive(Debug, Clone, Default)]
pub struct ListMaintenanceFilter {
    pub apartment_id: Option<Uuid>,
    pub status: Option<MaintenanceStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
