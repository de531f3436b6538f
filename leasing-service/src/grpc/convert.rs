//! Conversions between domain models and protobuf messages.

use chrono::{DateTime, NaiveDate, Utc};
use prost_types::Timestamp;
use rust_decimal::Decimal;
use std::str::FromStr;
use tonic::Status;
use uuid::Uuid;

use super::proto;
use crate::models::{
    Apartment, ApartmentStatus, Contract, Invoice, InvoiceStatus, Maintenance, MaintenanceStatus,
    Payment, PaymentFrequency, PaymentMethod,
};
use crate::services::metrics::GRPC_REQUESTS_TOTAL;

const DATE_FORMAT: &str = "%Y-%m-%d";

// -----------------------------------------------------------------------------
// Request parsing. Every failure counts as an invalid_argument request.
// -----------------------------------------------------------------------------

#[allow(clippy::result_large_err)]
pub(crate) fn invalid(method: &str, message: String) -> Status {
    GRPC_REQUESTS_TOTAL
        .with_label_values(&[method, "invalid_argument"])
        .inc();
    Status::invalid_argument(message)
}

#[allow(clippy::result_large_err)]
pub(crate) fn parse_uuid(method: &str, field: &str, value: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(value)
        .map_err(|_| invalid(method, format!("Invalid {} format: '{}'", field, value)))
}

/// Empty string means "not set".
#[allow(clippy::result_large_err)]
pub(crate) fn parse_optional_uuid(
    method: &str,
    field: &str,
    value: &str,
) -> Result<Option<Uuid>, Status> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_uuid(method, field, value).map(Some)
}

#[allow(clippy::result_large_err)]
pub(crate) fn parse_decimal(method: &str, field: &str, value: &str) -> Result<Decimal, Status> {
    Decimal::from_str(value.trim())
        .map_err(|_| invalid(method, format!("Invalid {} format: '{}'", field, value)))
}

#[allow(clippy::result_large_err)]
pub(crate) fn parse_date(method: &str, field: &str, value: &str) -> Result<NaiveDate, Status> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        invalid(
            method,
            format!("Invalid {} format (expected YYYY-MM-DD): '{}'", field, value),
        )
    })
}

#[allow(clippy::result_large_err)]
pub(crate) fn parse_optional_date(
    method: &str,
    field: &str,
    value: &str,
) -> Result<Option<NaiveDate>, Status> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_date(method, field, value).map(Some)
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn timestamp(dt: DateTime<Utc>) -> Option<Timestamp> {
    Some(Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Money with exactly two decimal places, e.g. "1200.00".
fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

// -----------------------------------------------------------------------------
// Enums
// -----------------------------------------------------------------------------

pub(crate) fn apartment_status_from_proto(value: i32) -> Option<ApartmentStatus> {
    match proto::ApartmentStatus::try_from(value).ok()? {
        proto::ApartmentStatus::Available => Some(ApartmentStatus::Available),
        proto::ApartmentStatus::Occupied => Some(ApartmentStatus::Occupied),
        proto::ApartmentStatus::UnderMaintenance => Some(ApartmentStatus::UnderMaintenance),
        proto::ApartmentStatus::Unspecified => None,
    }
}

fn apartment_status_to_proto(status: ApartmentStatus) -> i32 {
    match status {
        ApartmentStatus::Available => proto::ApartmentStatus::Available as i32,
        ApartmentStatus::Occupied => proto::ApartmentStatus::Occupied as i32,
        ApartmentStatus::UnderMaintenance => proto::ApartmentStatus::UnderMaintenance as i32,
    }
}

pub(crate) fn frequency_from_proto(value: i32) -> Option<PaymentFrequency> {
    match proto::PaymentFrequency::try_from(value).ok()? {
        proto::PaymentFrequency::Yearly => Some(PaymentFrequency::Yearly),
        proto::PaymentFrequency::BiAnnually => Some(PaymentFrequency::BiAnnually),
        proto::PaymentFrequency::Quarterly => Some(PaymentFrequency::Quarterly),
        proto::PaymentFrequency::Monthly => Some(PaymentFrequency::Monthly),
        proto::PaymentFrequency::Unspecified => None,
    }
}

fn frequency_to_proto(frequency: PaymentFrequency) -> i32 {
    match frequency {
        PaymentFrequency::Yearly => proto::PaymentFrequency::Yearly as i32,
        PaymentFrequency::BiAnnually => proto::PaymentFrequency::BiAnnually as i32,
        PaymentFrequency::Quarterly => proto::PaymentFrequency::Quarterly as i32,
        PaymentFrequency::Monthly => proto::PaymentFrequency::Monthly as i32,
    }
}

pub(crate) fn invoice_status_from_proto(value: i32) -> Option<InvoiceStatus> {
    match proto::InvoiceStatus::try_from(value).ok()? {
        proto::InvoiceStatus::Unpaid => Some(InvoiceStatus::Unpaid),
        proto::InvoiceStatus::PartiallyPaid => Some(InvoiceStatus::PartiallyPaid),
        proto::InvoiceStatus::Paid => Some(InvoiceStatus::Paid),
        proto::InvoiceStatus::Unspecified => None,
    }
}

fn invoice_status_to_proto(status: InvoiceStatus) -> i32 {
    match status {
        InvoiceStatus::Unpaid => proto::InvoiceStatus::Unpaid as i32,
        InvoiceStatus::PartiallyPaid => proto::InvoiceStatus::PartiallyPaid as i32,
        InvoiceStatus::Paid => proto::InvoiceStatus::Paid as i32,
    }
}

pub(crate) fn method_from_proto(value: i32) -> Option<PaymentMethod> {
    match proto::PaymentMethod::try_from(value).ok()? {
        proto::PaymentMethod::Cash => Some(PaymentMethod::Cash),
        proto::PaymentMethod::BankTransfer => Some(PaymentMethod::BankTransfer),
        proto::PaymentMethod::Check => Some(PaymentMethod::Check),
        proto::PaymentMethod::Other => Some(PaymentMethod::Other),
        proto::PaymentMethod::Unspecified => None,
    }
}

fn method_to_proto(method: PaymentMethod) -> i32 {
    match method {
        PaymentMethod::Cash => proto::PaymentMethod::Cash as i32,
        PaymentMethod::BankTransfer => proto::PaymentMethod::BankTransfer as i32,
        PaymentMethod::Check => proto::PaymentMethod::Check as i32,
        PaymentMethod::Other => proto::PaymentMethod::Other as i32,
    }
}

pub(crate) fn maintenance_status_from_proto(value: i32) -> Option<MaintenanceStatus> {
    match proto::MaintenanceStatus::try_from(value).ok()? {
        proto::MaintenanceStatus::Pending => Some(MaintenanceStatus::Pending),
        proto::MaintenanceStatus::PaidByOwner => Some(MaintenanceStatus::PaidByOwner),
        proto::MaintenanceStatus::Unspecified => None,
    }
}

fn maintenance_status_to_proto(status: MaintenanceStatus) -> i32 {
    match status {
        MaintenanceStatus::Pending => proto::MaintenanceStatus::Pending as i32,
        MaintenanceStatus::PaidByOwner => proto::MaintenanceStatus::PaidByOwner as i32,
    }
}

// -----------------------------------------------------------------------------
// Resources
// -----------------------------------------------------------------------------

pub(crate) fn apartment_to_proto(apartment: &Apartment) -> proto::Apartment {
    proto::Apartment {
        apartment_id: apartment.apartment_id.to_string(),
        number: apartment.number.clone(),
        location: apartment.location.clone(),
        level: apartment.level.unwrap_or_default(),
        rooms: apartment.rooms.unwrap_or_default(),
        amenities: apartment.amenities.clone(),
        status: apartment_status_to_proto(apartment.status()),
        created_at: timestamp(apartment.created_utc),
        updated_at: timestamp(apartment.updated_utc),
    }
}

pub(crate) fn contract_to_proto(contract: &Contract) -> proto::Contract {
    proto::Contract {
        contract_id: contract.contract_id.to_string(),
        apartment_id: contract.apartment_id.to_string(),
        tenant_name: contract.tenant_name.clone(),
        tenant_phone: contract.tenant_phone.clone(),
        tenant_id_image_path: contract.tenant_id_image_path.clone().unwrap_or_default(),
        contract_file_path: contract.contract_file_path.clone().unwrap_or_default(),
        duration_years: contract.duration_years,
        payment_frequency: frequency_to_proto(contract.frequency()),
        start_date: format_date(contract.start_date),
        end_date: format_date(contract.end_date),
        total_amount: format_money(contract.total_amount),
        is_active: contract.is_active,
        created_at: timestamp(contract.created_utc),
        updated_at: timestamp(contract.updated_utc),
    }
}

pub(crate) fn invoice_to_proto(invoice: &Invoice) -> proto::Invoice {
    proto::Invoice {
        invoice_id: invoice.invoice_id.to_string(),
        invoice_number: invoice.invoice_number.clone(),
        contract_id: invoice.contract_id.to_string(),
        apartment_id: invoice.apartment_id.to_string(),
        tenant_name: invoice.tenant_name.clone(),
        tenant_phone: invoice.tenant_phone.clone(),
        amount: format_money(invoice.amount),
        paid_amount: format_money(invoice.paid_amount),
        balance: format_money(invoice.balance()),
        due_date: format_date(invoice.due_date),
        status: invoice_status_to_proto(invoice.status()),
        description: invoice.description.clone(),
        period_index: invoice.period_index,
        maintenance_related: invoice.maintenance_related,
        maintenance_id: invoice
            .maintenance_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
        created_at: timestamp(invoice.created_utc),
        updated_at: timestamp(invoice.updated_utc),
    }
}

pub(crate) fn payment_to_proto(payment: &Payment) -> proto::Payment {
    proto::Payment {
        payment_id: payment.payment_id.to_string(),
        invoice_id: payment.invoice_id.to_string(),
        amount: format_money(payment.amount),
        payment_date: format_date(payment.payment_date),
        method: method_to_proto(payment.method()),
        receipt_number: payment.receipt_number.clone(),
        description: payment.description.clone(),
        created_at: timestamp(payment.created_utc),
        updated_at: timestamp(payment.updated_utc),
    }
}

pub(crate) fn maintenance_to_proto(maintenance: &Maintenance) -> proto::Maintenance {
    proto::Maintenance {
        maintenance_id: maintenance.maintenance_id.to_string(),
        apartment_id: maintenance.apartment_id.to_string(),
        description: maintenance.description.clone(),
        cost: format_money(maintenance.cost),
        maintenance_date: format_date(maintenance.maintenance_date),
        completion_date: maintenance
            .completion_date
            .map(format_date)
            .unwrap_or_default(),
        provider_name: maintenance.provider_name.clone(),
        provider_contact: maintenance.provider_contact.clone(),
        provider_company: maintenance.provider_company.clone().unwrap_or_default(),
        status: maintenance_status_to_proto(maintenance.status()),
        bill_to_tenant: maintenance.bill_to_tenant,
        invoice_id: maintenance
            .invoice_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
        invoice_file_path: maintenance.invoice_file_path.clone().unwrap_or_default(),
        created_at: timestamp(maintenance.created_utc),
        updated_at: timestamp(maintenance.updated_utc),
    }
}

pub(crate) fn page_token(token: Option<Uuid>) -> String {
    token.map(|t| t.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_always_has_two_places() {
        assert_eq!(format_money(Decimal::from(1200)), "1200.00");
        assert_eq!(format_money(Decimal::new(8337, 2)), "83.37");
        assert_eq!(format_money(Decimal::new(5, 1)), "0.50");
    }

    #[test]
    fn test_unspecified_enums_map_to_none() {
        assert_eq!(apartment_status_from_proto(0), None);
        assert_eq!(frequency_from_proto(0), None);
        assert_eq!(invoice_status_from_proto(0), None);
        assert_eq!(method_from_proto(0), None);
        assert_eq!(maintenance_status_from_proto(0), None);
        assert_eq!(frequency_from_proto(99), None);
    }

    #[test]
    fn test_enum_round_trip_through_proto() {
        for f in [
            PaymentFrequency::Yearly,
            PaymentFrequency::BiAnnually,
            PaymentFrequency::Quarterly,
            PaymentFrequency::Monthly,
        ] {
            assert_eq!(frequency_from_proto(frequency_to_proto(f)), Some(f));
        }
        assert_eq!(
            invoice_status_from_proto(invoice_status_to_proto(InvoiceStatus::PartiallyPaid)),
            Some(InvoiceStatus::PartiallyPaid)
        );
    }

    #[test]
    fn test_optional_fields_treat_empty_as_unset() {
        assert_eq!(parse_optional_uuid("Test", "id", "").unwrap(), None);
        assert_eq!(parse_optional_date("Test", "date", "").unwrap(), None);
        assert!(parse_date("Test", "date", "2024-13-01").is_err());
        assert!(parse_decimal("Test", "amount", "12,50").is_err());
        assert_eq!(non_empty("  ".to_string()), None);
    }
}
