//! Domain models for leasing-service.

mod apartment;
mod contract;
mod invoice;
mod maintenance;
mod page;
mod payment;

pub use apartment::{
    Apartment, ApartmentStatus, CreateApartment, ListApartmentsFilter, UpdateApartment,
};
pub use contract::{
    Contract, ContractTerms, CreateContract, ListContractsFilter, PaymentFrequency,
    UpdateContract,
};
pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, UpdateInvoice};
pub use maintenance::{
    CreateMaintenance, ListMaintenanceFilter, Maintenance, MaintenanceStatus, UpdateMaintenance,
};
pub use page::{page_limit, Keyed, Page};
pub use payment::{CreatePayment, ListPaymentsFilter, Payment, PaymentMethod, UpdatePayment};
