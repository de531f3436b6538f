//! Record store abstraction.
//!
//! Every engine operation runs inside one [`UnitOfWork`]: reads see the
//! unit's own writes, and nothing becomes visible to other operations until
//! [`UnitOfWork::commit`]. Dropping a unit without committing discards all
//! of its staged changes.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    Apartment, ApartmentStatus, Contract, Invoice, ListApartmentsFilter, ListContractsFilter,
    ListInvoicesFilter, ListMaintenanceFilter, ListPaymentsFilter, Maintenance, Page, Payment,
};

#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Open a read-write unit of work. Rows read through it are locked
    /// against concurrent writers until it commits or is dropped.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;

    /// Open a read-only unit of work; it never locks and is never committed.
    async fn snapshot(&self) -> Result<Box<dyn UnitOfWork>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Transaction handle threaded through every step of one operation.
#[async_trait]
pub trait UnitOfWork: Send {
    // Apartments
    async fn insert_apartment(&mut self, apartment: &Apartment) -> Result<(), AppError>;
    async fn get_apartment(&mut self, apartment_id: Uuid) -> Result<Option<Apartment>, AppError>;
    async fn set_apartment_status(
        &mut self,
        apartment_id: Uuid,
        status: ApartmentStatus,
    ) -> Result<(), AppError>;
    async fn list_apartments(
        &mut self,
        filter: &ListApartmentsFilter,
    ) -> Result<Page<Apartment>, AppError>;
    /// Overwrite the descriptive fields and status of an apartment.
    async fn update_apartment(&mut self, apartment: &Apartment) -> Result<(), AppError>;
    async fn delete_apartment(&mut self, apartment_id: Uuid) -> Result<(), AppError>;
    /// Whether any contract or maintenance record points at the apartment.
    async fn apartment_has_records(&mut self, apartment_id: Uuid) -> Result<bool, AppError>;

    // Contracts
    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), AppError>;
    async fn get_contract(&mut self, contract_id: Uuid) -> Result<Option<Contract>, AppError>;
    async fn update_contract(&mut self, contract: &Contract) -> Result<(), AppError>;
    async fn delete_contract(&mut self, contract_id: Uuid) -> Result<(), AppError>;
    /// Active contracts for an apartment, most recent start first.
    async fn active_contracts_for_apartment(
        &mut self,
        apartment_id: Uuid,
    ) -> Result<Vec<Contract>, AppError>;
    async fn list_contracts(
        &mut self,
        filter: &ListContractsFilter,
    ) -> Result<Page<Contract>, AppError>;

    // Invoices
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError>;
    async fn get_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;
    /// Every invoice of a contract ordered by due date.
    async fn invoices_for_contract(&mut self, contract_id: Uuid)
        -> Result<Vec<Invoice>, AppError>;
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError>;
    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<(), AppError>;
    /// Invoices ordered by due date, then id.
    async fn list_invoices(&mut self, filter: &ListInvoicesFilter)
        -> Result<Page<Invoice>, AppError>;

    // Payments
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError>;
    async fn get_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), AppError>;
    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<(), AppError>;
    /// Payments newest payment date first.
    async fn list_payments(&mut self, filter: &ListPaymentsFilter)
        -> Result<Page<Payment>, AppError>;

    // Maintenance
    async fn insert_maintenance(&mut self, maintenance: &Maintenance) -> Result<(), AppError>;
    async fn get_maintenance(
        &mut self,
        maintenance_id: Uuid,
    ) -> Result<Option<Maintenance>, AppError>;
    async fn maintenance_for_invoice(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Option<Maintenance>, AppError>;
    async fn update_maintenance(&mut self, maintenance: &Maintenance) -> Result<(), AppError>;
    async fn delete_maintenance(&mut self, maintenance_id: Uuid) -> Result<(), AppError>;
    /// Maintenance newest maintenance date first.
    async fn list_maintenance(
        &mut self,
        filter: &ListMaintenanceFilter,
    ) -> Result<Page<Maintenance>, AppError>;

    /// Make every staged change visible at once.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
