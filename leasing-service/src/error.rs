//! Domain error taxonomy for the leasing engine.

use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::grpc::IntoStatus;
use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::Status;
use uuid::Uuid;

/// gRPC metadata key carrying [`ErrorKind::as_str`].
pub const ERROR_KIND_KEY: &str = "x-error-kind";

/// gRPC metadata key carrying [`LeaseError::code`].
pub const ERROR_CODE_KEY: &str = "x-error-code";

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    StateConflict,
    TransactionFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::TransactionFailure => "transaction_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("Apartment not found with id of {0}")]
    ApartmentNotFound(Uuid),

    #[error("Apartment {apartment_id} is not available (status: {status})")]
    ApartmentNotAvailable { apartment_id: Uuid, status: String },

    #[error("Apartment {0} is occupied by an active contract")]
    ApartmentOccupied(Uuid),

    #[error("Apartment {0} still has contracts or maintenance records")]
    ApartmentInUse(Uuid),

    #[error("Contract not found with id of {0}")]
    ContractNotFound(Uuid),

    #[error("Invoice not found with id of {0}")]
    InvoiceNotFound(Uuid),

    #[error("Payment not found with id of {0}")]
    PaymentNotFound(Uuid),

    #[error("Maintenance record not found with id of {0}")]
    MaintenanceNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invoice {0} is already fully paid")]
    AlreadyPaid(Uuid),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Payment amount {amount} exceeds remaining balance {balance}")]
    AmountExceedsBalance { amount: Decimal, balance: Decimal },

    #[error("Invoice amount {amount} cannot be lower than the amount already paid {paid}")]
    AmountBelowPaid { amount: Decimal, paid: Decimal },

    #[error("Contract {contract_id} has {count} paid or partially paid invoice(s)")]
    OutstandingSettledInvoices { contract_id: Uuid, count: usize },

    #[error("Invoice {invoice_id} is {status}; only unpaid invoices can be changed this way")]
    InvoiceNotUnpaid { invoice_id: Uuid, status: String },

    #[error("Cannot bill to tenant: no active contract for apartment {0}")]
    NoActiveContract(Uuid),

    #[error("Cannot remove tenant billing for maintenance {0}: invoice already exists")]
    InvoiceAlreadyExists(Uuid),

    #[error("Cannot delete maintenance {maintenance_id}: tenant invoice {invoice_id} has payments")]
    LinkedInvoicePaid {
        maintenance_id: Uuid,
        invoice_id: Uuid,
    },

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<validator::ValidationErrors> for LeaseError {
    fn from(errors: validator::ValidationErrors) -> Self {
        LeaseError::Validation(errors.to_string())
    }
}

impl LeaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeaseError::ApartmentNotFound(_)
            | LeaseError::ContractNotFound(_)
            | LeaseError::InvoiceNotFound(_)
            | LeaseError::PaymentNotFound(_)
            | LeaseError::MaintenanceNotFound(_) => ErrorKind::NotFound,
            LeaseError::Validation(_) | LeaseError::InvalidAmount(_) => ErrorKind::Validation,
            LeaseError::ApartmentNotAvailable { .. }
            | LeaseError::ApartmentOccupied(_)
            | LeaseError::ApartmentInUse(_)
            | LeaseError::AlreadyPaid(_)
            | LeaseError::AmountExceedsBalance { .. }
            | LeaseError::AmountBelowPaid { .. }
            | LeaseError::OutstandingSettledInvoices { .. }
            | LeaseError::InvoiceNotUnpaid { .. }
            | LeaseError::NoActiveContract(_)
            | LeaseError::InvoiceAlreadyExists(_)
            | LeaseError::LinkedInvoicePaid { .. } => ErrorKind::StateConflict,
            LeaseError::Store(_) => ErrorKind::TransactionFailure,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LeaseError::ApartmentNotFound(_) => "APARTMENT_NOT_FOUND",
            LeaseError::ApartmentNotAvailable { .. } => "APARTMENT_NOT_AVAILABLE",
            LeaseError::ApartmentOccupied(_) => "APARTMENT_OCCUPIED",
            LeaseError::ApartmentInUse(_) => "APARTMENT_IN_USE",
            LeaseError::ContractNotFound(_) => "CONTRACT_NOT_FOUND",
            LeaseError::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            LeaseError::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            LeaseError::MaintenanceNotFound(_) => "MAINTENANCE_NOT_FOUND",
            LeaseError::Validation(_) => "VALIDATION_ERROR",
            LeaseError::AlreadyPaid(_) => "ALREADY_PAID",
            LeaseError::InvalidAmount(_) => "INVALID_AMOUNT",
            LeaseError::AmountExceedsBalance { .. } => "AMOUNT_EXCEEDS_BALANCE",
            LeaseError::AmountBelowPaid { .. } => "AMOUNT_BELOW_PAID",
            LeaseError::OutstandingSettledInvoices { .. } => "OUTSTANDING_SETTLED_INVOICES",
            LeaseError::InvoiceNotUnpaid { .. } => "INVOICE_NOT_UNPAID",
            LeaseError::NoActiveContract(_) => "NO_ACTIVE_CONTRACT",
            LeaseError::InvoiceAlreadyExists(_) => "INVOICE_ALREADY_EXISTS",
            LeaseError::LinkedInvoicePaid { .. } => "LINKED_INVOICE_PAID",
            LeaseError::Store(AppError::TransactionAborted(_)) => "TRANSACTION_ABORTED",
            LeaseError::Store(_) => "STORE_ERROR",
        }
    }

    /// Label used for the errors counter.
    pub fn metric_label(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl From<LeaseError> for Status {
    fn from(err: LeaseError) -> Self {
        let kind = err.kind();
        let code = err.code();

        let mut status = match (kind, err) {
            (ErrorKind::NotFound, err) => Status::not_found(err.to_string()),
            (ErrorKind::Validation, err) => Status::invalid_argument(err.to_string()),
            (ErrorKind::StateConflict, err) => Status::failed_precondition(err.to_string()),
            (ErrorKind::TransactionFailure, LeaseError::Store(app)) => app.into_status(),
            (ErrorKind::TransactionFailure, err) => Status::internal(err.to_string()),
        };

        status
            .metadata_mut()
            .insert(ERROR_KIND_KEY, MetadataValue::from_static(kind.as_str()));
        status
            .metadata_mut()
            .insert(ERROR_CODE_KEY, MetadataValue::from_static(code));
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_not_available_is_state_conflict() {
        let err = LeaseError::ApartmentNotAvailable {
            apartment_id: Uuid::nil(),
            status: "occupied".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let status: Status = err.into();
        assert_eq!(status.code(), Code::FailedPrecondition);
        assert_eq!(
            status.metadata().get(ERROR_KIND_KEY).unwrap(),
            "state_conflict"
        );
        assert_eq!(
            status.metadata().get(ERROR_CODE_KEY).unwrap(),
            "APARTMENT_NOT_AVAILABLE"
        );
    }

    #[test]
    fn test_not_found_carries_missing_id() {
        let id = Uuid::new_v4();
        let status: Status = LeaseError::InvoiceNotFound(id).into();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains(&id.to_string()));
    }

    #[test]
    fn test_validation_maps_to_invalid_argument() {
        let status: Status = LeaseError::InvalidAmount("must be positive".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.metadata().get(ERROR_KIND_KEY).unwrap(), "validation");
    }

    #[test]
    fn test_aborted_transaction_is_retryable_failure() {
        let err = LeaseError::Store(AppError::TransactionAborted(anyhow::anyhow!(
            "could not serialize access"
        )));
        assert_eq!(err.kind(), ErrorKind::TransactionFailure);
        assert_eq!(err.code(), "TRANSACTION_ABORTED");

        let status: Status = err.into();
        assert_eq!(status.code(), Code::Aborted);
        assert_eq!(
            status.metadata().get(ERROR_KIND_KEY).unwrap(),
            "transaction_failure"
        );
    }
}
