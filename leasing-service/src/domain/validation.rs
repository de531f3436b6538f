//! Input validation.
//!
//! Each function takes an input struct by value (or a patch by reference)
//! and returns either a command that is safe to execute or the first
//! problem found. Nothing here touches the store.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use super::schedule::{default_end_date, MONEY_SCALE};
use crate::error::LeaseError;
use crate::models::{
    ApartmentStatus, ContractTerms, CreateApartment, CreateContract, CreateInvoice,
    CreateMaintenance, CreatePayment, PaymentFrequency, UpdateApartment, UpdateContract,
    UpdateInvoice, UpdateMaintenance, UpdatePayment,
};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2999;

/// Contract creation request that passed validation.
#[derive(Debug, Clone)]
pub struct ContractCommand {
    pub apartment_id: Uuid,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub tenant_id_image_path: Option<String>,
    pub contract_file_path: Option<String>,
    pub terms: ContractTerms,
}

/// Positive amount with at most two decimal places.
pub fn money(field: &str, amount: Decimal) -> Result<Decimal, LeaseError> {
    if amount <= Decimal::ZERO {
        return Err(LeaseError::InvalidAmount(format!(
            "{} must be greater than 0",
            field
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LeaseError::InvalidAmount(format!(
            "{} cannot have more than {} decimal places",
            field, MONEY_SCALE
        )));
    }
    Ok(amount)
}

fn calendar_date(field: &str, date: NaiveDate) -> Result<NaiveDate, LeaseError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(LeaseError::Validation(format!(
            "{} must be between {} and {}",
            field, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(date)
}

pub fn frequency(value: &str) -> Result<PaymentFrequency, LeaseError> {
    PaymentFrequency::parse(value).ok_or_else(|| {
        LeaseError::Validation(format!(
            "Invalid payment frequency '{}', expected yearly, bi-annually, quarterly or monthly",
            value
        ))
    })
}

fn end_not_before_start(start: NaiveDate, end: NaiveDate) -> Result<(), LeaseError> {
    if end < start {
        return Err(LeaseError::Validation(format!(
            "End date {} cannot be before start date {}",
            end, start
        )));
    }
    Ok(())
}

pub fn create_apartment(input: CreateApartment) -> Result<CreateApartment, LeaseError> {
    input.validate()?;
    if input.status == ApartmentStatus::Occupied {
        return Err(LeaseError::Validation(
            "Apartments become occupied only through a contract".to_string(),
        ));
    }
    Ok(input)
}

pub fn update_apartment(patch: UpdateApartment) -> Result<UpdateApartment, LeaseError> {
    patch.validate()?;
    if patch.status == Some(ApartmentStatus::Occupied) {
        return Err(LeaseError::Validation(
            "Apartments become occupied only through a contract".to_string(),
        ));
    }
    Ok(patch)
}

pub fn create_contract(input: CreateContract) -> Result<ContractCommand, LeaseError> {
    input.validate()?;

    let frequency = frequency(&input.payment_frequency)?;
    let total_amount = money("Contract amount", input.total_amount)?;
    let start_date = calendar_date("Start date", input.start_date)?;
    let duration_years = input.duration_years as u32;

    let end_date = match input.end_date {
        Some(end) => calendar_date("End date", end)?,
        None => default_end_date(start_date, duration_years),
    };
    end_not_before_start(start_date, end_date)?;

    Ok(ContractCommand {
        apartment_id: input.apartment_id,
        tenant_name: input.tenant_name.trim().to_string(),
        tenant_phone: input.tenant_phone.trim().to_string(),
        tenant_id_image_path: input.tenant_id_image_path.filter(|p| !p.is_empty()),
        contract_file_path: input.contract_file_path.filter(|p| !p.is_empty()),
        terms: ContractTerms {
            duration_years,
            frequency,
            start_date,
            end_date,
            total_amount,
        },
    })
}

/// Terms after applying `patch` to `current`.
///
/// The end date follows duration and start date unless the patch sets it
/// explicitly; an untouched explicit end date is kept when neither moves.
pub fn contract_terms_update(
    current: &ContractTerms,
    patch: &UpdateContract,
) -> Result<ContractTerms, LeaseError> {
    patch.validate()?;

    let frequency = match &patch.payment_frequency {
        Some(value) => frequency(value)?,
        None => current.frequency,
    };
    let total_amount = match patch.total_amount {
        Some(amount) => money("Contract amount", amount)?,
        None => current.total_amount,
    };
    let start_date = match patch.start_date {
        Some(date) => calendar_date("Start date", date)?,
        None => current.start_date,
    };
    let duration_years = patch
        .duration_years
        .map(|d| d as u32)
        .unwrap_or(current.duration_years);

    let end_date = match patch.end_date {
        Some(end) => calendar_date("End date", end)?,
        None if duration_years != current.duration_years || start_date != current.start_date => {
            default_end_date(start_date, duration_years)
        }
        None => current.end_date,
    };
    end_not_before_start(start_date, end_date)?;

    Ok(ContractTerms {
        duration_years,
        frequency,
        start_date,
        end_date,
        total_amount,
    })
}

pub fn create_invoice(input: CreateInvoice) -> Result<CreateInvoice, LeaseError> {
    input.validate()?;
    money("Invoice amount", input.amount)?;
    calendar_date("Due date", input.due_date)?;
    Ok(input)
}

pub fn invoice_update(patch: &UpdateInvoice) -> Result<(), LeaseError> {
    patch.validate()?;
    if let Some(amount) = patch.amount {
        money("Invoice amount", amount)?;
    }
    if let Some(due_date) = patch.due_date {
        calendar_date("Due date", due_date)?;
    }
    Ok(())
}

pub fn create_payment(input: CreatePayment) -> Result<CreatePayment, LeaseError> {
    input.validate()?;
    money("Payment amount", input.amount)?;
    calendar_date("Payment date", input.payment_date)?;
    Ok(input)
}

pub fn payment_update(patch: &UpdatePayment) -> Result<(), LeaseError> {
    patch.validate()?;
    if let Some(date) = patch.payment_date {
        calendar_date("Payment date", date)?;
    }
    Ok(())
}

pub fn create_maintenance(input: CreateMaintenance) -> Result<CreateMaintenance, LeaseError> {
    input.validate()?;
    money("Maintenance cost", input.cost)?;
    calendar_date("Maintenance date", input.maintenance_date)?;
    if let Some(done) = input.completion_date {
        if done < input.maintenance_date {
            return Err(LeaseError::Validation(
                "Completion date cannot be before maintenance date".to_string(),
            ));
        }
    }
    Ok(input)
}

pub fn maintenance_update(patch: &UpdateMaintenance) -> Result<(), LeaseError> {
    patch.validate()?;
    if let Some(cost) = patch.cost {
        money("Maintenance cost", cost)?;
    }
    if let Some(date) = patch.maintenance_date {
        calendar_date("Maintenance date", date)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn contract_input() -> CreateContract {
        CreateContract {
            apartment_id: Uuid::new_v4(),
            tenant_name: "  Maya Haddad ".to_string(),
            tenant_phone: "+961 70 000 000".to_string(),
            tenant_id_image_path: Some(String::new()),
            contract_file_path: None,
            duration_years: 2,
            payment_frequency: "quarterly".to_string(),
            start_date: date("2026-03-01"),
            end_date: None,
            total_amount: "24000".parse().unwrap(),
        }
    }

    #[test]
    fn test_create_contract_derives_end_date() {
        let cmd = create_contract(contract_input()).unwrap();
        assert_eq!(cmd.terms.end_date, date("2028-03-01"));
        assert_eq!(cmd.terms.frequency, PaymentFrequency::Quarterly);
        assert_eq!(cmd.tenant_name, "Maya Haddad");
        assert!(cmd.tenant_id_image_path.is_none());
    }

    #[test]
    fn test_create_contract_rejects_bad_terms() {
        let mut input = contract_input();
        input.duration_years = 0;
        assert_eq!(create_contract(input).unwrap_err().kind(), ErrorKind::Validation);

        let mut input = contract_input();
        input.payment_frequency = "weekly".to_string();
        assert!(matches!(
            create_contract(input),
            Err(LeaseError::Validation(_))
        ));

        let mut input = contract_input();
        input.total_amount = Decimal::ZERO;
        assert!(matches!(
            create_contract(input),
            Err(LeaseError::InvalidAmount(_))
        ));

        let mut input = contract_input();
        input.tenant_phone = String::new();
        assert!(create_contract(input).is_err());

        let mut input = contract_input();
        input.end_date = Some(date("2026-02-28"));
        assert!(matches!(
            create_contract(input),
            Err(LeaseError::Validation(_))
        ));
    }

    #[test]
    fn test_money_precision() {
        assert!(money("Amount", "10.50".parse().unwrap()).is_ok());
        assert!(money("Amount", "10.500".parse().unwrap()).is_ok());
        assert!(money("Amount", "10.505".parse().unwrap()).is_err());
        assert!(money("Amount", "-1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_terms_update_recomputes_end_date() {
        let current = create_contract(contract_input()).unwrap().terms;

        let longer = contract_terms_update(
            &current,
            &UpdateContract {
                duration_years: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(longer.end_date, date("2029-03-01"));

        let repriced = contract_terms_update(
            &current,
            &UpdateContract {
                total_amount: Some("30000".parse().unwrap()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(repriced.end_date, current.end_date);
        assert_eq!(repriced.frequency, current.frequency);
    }

    #[test]
    fn test_occupied_apartment_cannot_be_registered() {
        let input = CreateApartment {
            number: "B-2".to_string(),
            location: "Beirut".to_string(),
            level: Some(2),
            rooms: Some(3),
            amenities: vec![],
            status: ApartmentStatus::Occupied,
        };
        assert!(create_apartment(input).is_err());
    }
}
