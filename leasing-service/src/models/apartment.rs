//! Apartment model for leasing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Occupancy state of an apartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApartmentStatus {
    Available,
    Occupied,
    UnderMaintenance,
}

impl ApartmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApartmentStatus::Available => "available",
            ApartmentStatus::Occupied => "occupied",
            ApartmentStatus::UnderMaintenance => "under_maintenance",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "occupied" => ApartmentStatus::Occupied,
            "under_maintenance" => ApartmentStatus::UnderMaintenance,
            _ => ApartmentStatus::Available,
        }
    }
}

/// Rentable unit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Apartment {
    pub apartment_id: Uuid,
    pub number: String,
    pub location: String,
    pub level: Option<i32>,
    pub rooms: Option<i32>,
    pub amenities: Vec<String>,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Apartment {
    pub fn status(&self) -> ApartmentStatus {
        ApartmentStatus::from_string(&self.status)
    }
}

/// Input for registering an apartment.
#[derive(Debug, Clone, Validate)]
pub struct CreateApartment {
    #[validate(length(min = 1, max = 50, message = "Apartment number is required"))]
    pub number: String,
    #[validate(length(min = 1, max = 255, message = "Apartment location is required"))]
    pub location: String,
    pub level: Option<i32>,
    #[validate(range(min = 0, message = "Rooms cannot be negative"))]
    pub rooms: Option<i32>,
    pub amenities: Vec<String>,
    pub status: ApartmentStatus,
}

/// Patch for an apartment; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateApartment {
    #[validate(length(min = 1, max = 50, message = "Apartment number cannot be empty"))]
    pub number: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Apartment location cannot be empty"))]
    pub location: Option<String>,
    pub level: Option<i32>,
    #[validate(range(min = 0, message = "Rooms cannot be negative"))]
    pub rooms: Option<i32>,
    pub amenities: Option<Vec<String>>,
    pub status: Option<ApartmentStatus>,
}

/// Filter parameters for listing apartments.
#[derive(Debug, Clone, Default)]
pub struct ListApartmentsFilter {
    pub status: Option<ApartmentStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
