//! In-memory record store.
//!
//! A read-write unit of work holds the store's mutex for its whole life and
//! works on a private copy of the tables; commit swaps the copy in. Writers
//! are therefore fully serialized and an uncommitted unit leaves no trace.

use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;
use uuid::Uuid;

use super::store::{LeaseStore, UnitOfWork};
use crate::models::{
    Apartment, ApartmentStatus, Contract, Invoice, ListApartmentsFilter, ListContractsFilter,
    ListInvoicesFilter, ListMaintenanceFilter, ListPaymentsFilter, Maintenance, Page, Payment,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    apartments: HashMap<Uuid, Apartment>,
    contracts: HashMap<Uuid, Contract>,
    invoices: HashMap<Uuid, Invoice>,
    payments: HashMap<Uuid, Payment>,
    maintenance: HashMap<Uuid, Maintenance>,
}

#[derive(Clone, Default)]
pub struct MemoryLeaseStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard: Some(guard),
            staged,
        }))
    }

    async fn snapshot(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let staged = self.tables.lock().await.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard: None,
            staged,
        }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<Tables>>,
    staged: Tables,
}

fn missing(entity: &str, id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} {} does not exist", entity, id))
}

fn duplicate(what: &str, value: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!("{} '{}' already exists", what, value))
}

impl MemoryUnitOfWork {
    fn write_guard(&self) -> Result<(), AppError> {
        if self.guard.is_none() {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Write attempted through a read-only unit of work"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_apartment(&mut self, apartment: &Apartment) -> Result<(), AppError> {
        self.write_guard()?;
        self.staged
            .apartments
            .insert(apartment.apartment_id, apartment.clone());
        Ok(())
    }

    async fn get_apartment(&mut self, apartment_id: Uuid) -> Result<Option<Apartment>, AppError> {
        Ok(self.staged.apartments.get(&apartment_id).cloned())
    }

    async fn set_apartment_status(
        &mut self,
        apartment_id: Uuid,
        status: ApartmentStatus,
    ) -> Result<(), AppError> {
        self.write_guard()?;
        let apartment = self
            .staged
            .apartments
            .get_mut(&apartment_id)
            .ok_or_else(|| missing("Apartment", apartment_id))?;
        apartment.status = status.as_str().to_string();
        apartment.updated_utc = Utc::now();
        Ok(())
    }

    async fn list_apartments(
        &mut self,
        filter: &ListApartmentsFilter,
    ) -> Result<Page<Apartment>, AppError> {
        let mut rows: Vec<Apartment> = self
            .staged
            .apartments
            .values()
            .filter(|a| filter.status.map_or(true, |s| a.status() == s))
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.apartment_id);
        Ok(Page::paginate(rows, filter.page_size, filter.page_token))
    }

    async fn update_apartment(&mut self, apartment: &Apartment) -> Result<(), AppError> {
        self.write_guard()?;
        let slot = self
            .staged
            .apartments
            .get_mut(&apartment.apartment_id)
            .ok_or_else(|| missing("Apartment", apartment.apartment_id))?;
        *slot = apartment.clone();
        Ok(())
    }

    async fn delete_apartment(&mut self, apartment_id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        if self.apartment_has_records(apartment_id).await? {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Apartment {} is still referenced",
                apartment_id
            )));
        }
        self.staged
            .apartments
            .remove(&apartment_id)
            .map(|_| ())
            .ok_or_else(|| missing("Apartment", apartment_id))
    }

    async fn apartment_has_records(&mut self, apartment_id: Uuid) -> Result<bool, AppError> {
        let tables = &self.staged;
        Ok(tables.contracts.values().any(|c| c.apartment_id == apartment_id)
            || tables
                .maintenance
                .values()
                .any(|m| m.apartment_id == apartment_id))
    }

    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), AppError> {
        self.write_guard()?;
        if !self.staged.apartments.contains_key(&contract.apartment_id) {
            return Err(missing("Apartment", contract.apartment_id));
        }
        self.staged
            .contracts
            .insert(contract.contract_id, contract.clone());
        Ok(())
    }

    async fn get_contract(&mut self, contract_id: Uuid) -> Result<Option<Contract>, AppError> {
        Ok(self.staged.contracts.get(&contract_id).cloned())
    }

    async fn update_contract(&mut self, contract: &Contract) -> Result<(), AppError> {
        self.write_guard()?;
        let slot = self
            .staged
            .contracts
            .get_mut(&contract.contract_id)
            .ok_or_else(|| missing("Contract", contract.contract_id))?;
        *slot = contract.clone();
        Ok(())
    }

    async fn delete_contract(&mut self, contract_id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        if self
            .staged
            .invoices
            .values()
            .any(|i| i.contract_id == contract_id)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Contract {} still has invoices",
                contract_id
            )));
        }
        self.staged
            .contracts
            .remove(&contract_id)
            .map(|_| ())
            .ok_or_else(|| missing("Contract", contract_id))
    }

    async fn active_contracts_for_apartment(
        &mut self,
        apartment_id: Uuid,
    ) -> Result<Vec<Contract>, AppError> {
        let mut rows: Vec<Contract> = self
            .staged
            .contracts
            .values()
            .filter(|c| c.apartment_id == apartment_id && c.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|c| Reverse((c.start_date, c.contract_id)));
        Ok(rows)
    }

    async fn list_contracts(
        &mut self,
        filter: &ListContractsFilter,
    ) -> Result<Page<Contract>, AppError> {
        let mut rows: Vec<Contract> = self
            .staged
            .contracts
            .values()
            .filter(|c| filter.apartment_id.map_or(true, |id| c.apartment_id == id))
            .filter(|c| filter.is_active.map_or(true, |active| c.is_active == active))
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.contract_id);
        Ok(Page::paginate(rows, filter.page_size, filter.page_token))
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        self.write_guard()?;
        if !self.staged.contracts.contains_key(&invoice.contract_id) {
            return Err(missing("Contract", invoice.contract_id));
        }
        if self
            .staged
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(duplicate("Invoice number", &invoice.invoice_number));
        }
        self.staged
            .invoices
            .insert(invoice.invoice_id, invoice.clone());
        Ok(())
    }

    async fn get_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.staged.invoices.get(&invoice_id).cloned())
    }

    async fn invoices_for_contract(
        &mut self,
        contract_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        let mut rows: Vec<Invoice> = self
            .staged
            .invoices
            .values()
            .filter(|i| i.contract_id == contract_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.due_date, i.invoice_id));
        Ok(rows)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        self.write_guard()?;
        let slot = self
            .staged
            .invoices
            .get_mut(&invoice.invoice_id)
            .ok_or_else(|| missing("Invoice", invoice.invoice_id))?;
        *slot = invoice.clone();
        Ok(())
    }

    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        let referenced = self
            .staged
            .payments
            .values()
            .any(|p| p.invoice_id == invoice_id)
            || self
                .staged
                .maintenance
                .values()
                .any(|m| m.invoice_id == Some(invoice_id));
        if referenced {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} is still referenced",
                invoice_id
            )));
        }
        self.staged
            .invoices
            .remove(&invoice_id)
            .map(|_| ())
            .ok_or_else(|| missing("Invoice", invoice_id))
    }

    async fn list_invoices(
        &mut self,
        filter: &ListInvoicesFilter,
    ) -> Result<Page<Invoice>, AppError> {
        let mut rows: Vec<Invoice> = self
            .staged
            .invoices
            .values()
            .filter(|i| filter.contract_id.map_or(true, |id| i.contract_id == id))
            .filter(|i| filter.apartment_id.map_or(true, |id| i.apartment_id == id))
            .filter(|i| filter.status.map_or(true, |s| i.status() == s))
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.due_date, i.invoice_id));
        Ok(Page::paginate(rows, filter.page_size, filter.page_token))
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        self.write_guard()?;
        if !self.staged.invoices.contains_key(&payment.invoice_id) {
            return Err(missing("Invoice", payment.invoice_id));
        }
        if self
            .staged
            .payments
            .values()
            .any(|p| p.receipt_number == payment.receipt_number)
        {
            return Err(duplicate("Receipt number", &payment.receipt_number));
        }
        self.staged
            .payments
            .insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn get_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.staged.payments.get(&payment_id).cloned())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        self.write_guard()?;
        let slot = self
            .staged
            .payments
            .get_mut(&payment.payment_id)
            .ok_or_else(|| missing("Payment", payment.payment_id))?;
        *slot = payment.clone();
        Ok(())
    }

    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        self.staged
            .payments
            .remove(&payment_id)
            .map(|_| ())
            .ok_or_else(|| missing("Payment", payment_id))
    }

    async fn list_payments(
        &mut self,
        filter: &ListPaymentsFilter,
    ) -> Result<Page<Payment>, AppError> {
        let mut rows: Vec<Payment> = self
            .staged
            .payments
            .values()
            .filter(|p| filter.invoice_id.map_or(true, |id| p.invoice_id == id))
            .cloned()
            .collect();
        rows.sort_by_key(|p| Reverse((p.payment_date, p.created_utc, p.payment_id)));
        Ok(Page::paginate(rows, filter.page_size, filter.page_token))
    }

    async fn insert_maintenance(&mut self, maintenance: &Maintenance) -> Result<(), AppError> {
        self.write_guard()?;
        if !self.staged.apartments.contains_key(&maintenance.apartment_id) {
            return Err(missing("Apartment", maintenance.apartment_id));
        }
        self.staged
            .maintenance
            .insert(maintenance.maintenance_id, maintenance.clone());
        Ok(())
    }

    async fn get_maintenance(
        &mut self,
        maintenance_id: Uuid,
    ) -> Result<Option<Maintenance>, AppError> {
        Ok(self.staged.maintenance.get(&maintenance_id).cloned())
    }

    async fn maintenance_for_invoice(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Option<Maintenance>, AppError> {
        Ok(self
            .staged
            .maintenance
            .values()
            .find(|m| m.invoice_id == Some(invoice_id))
            .cloned())
    }

    async fn update_maintenance(&mut self, maintenance: &Maintenance) -> Result<(), AppError> {
        self.write_guard()?;
        let slot = self
            .staged
            .maintenance
            .get_mut(&maintenance.maintenance_id)
            .ok_or_else(|| missing("Maintenance", maintenance.maintenance_id))?;
        *slot = maintenance.clone();
        Ok(())
    }

    async fn delete_maintenance(&mut self, maintenance_id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        self.staged
            .maintenance
            .remove(&maintenance_id)
            .map(|_| ())
            .ok_or_else(|| missing("Maintenance", maintenance_id))
    }

    async fn list_maintenance(
        &mut self,
        filter: &ListMaintenanceFilter,
    ) -> Result<Page<Maintenance>, AppError> {
        let mut rows: Vec<Maintenance> = self
            .staged
            .maintenance
            .values()
            .filter(|m| filter.apartment_id.map_or(true, |id| m.apartment_id == id))
            .filter(|m| filter.status.map_or(true, |s| m.status() == s))
            .cloned()
            .collect();
        rows.sort_by_key(|m| Reverse((m.maintenance_date, m.maintenance_id)));
        Ok(Page::paginate(rows, filter.page_size, filter.page_token))
    }

    #[instrument(skip(self))]
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        match this.guard {
            Some(mut guard) => {
                *guard = this.staged;
                Ok(())
            }
            None => Err(AppError::InternalError(anyhow::anyhow!(
                "Cannot commit a read-only unit of work"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn apartment(number: &str) -> Apartment {
        Apartment {
            apartment_id: Uuid::new_v4(),
            number: number.to_string(),
            location: "Hamra".to_string(),
            level: Some(1),
            rooms: Some(2),
            amenities: vec!["balcony".to_string()],
            status: ApartmentStatus::Available.as_str().to_string(),
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = MemoryLeaseStore::new();
        let apt = apartment("A-1");

        let mut uow = store.begin().await.unwrap();
        uow.insert_apartment(&apt).await.unwrap();
        assert!(uow.get_apartment(apt.apartment_id).await.unwrap().is_some());
        drop(uow);

        let mut read = store.snapshot().await.unwrap();
        assert!(read.get_apartment(apt.apartment_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_publishes_all_changes() {
        let store = MemoryLeaseStore::new();
        let apt = apartment("A-2");

        let mut uow = store.begin().await.unwrap();
        uow.insert_apartment(&apt).await.unwrap();
        uow.set_apartment_status(apt.apartment_id, ApartmentStatus::Occupied)
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let mut read = store.snapshot().await.unwrap();
        let stored = read.get_apartment(apt.apartment_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ApartmentStatus::Occupied);
    }

    #[tokio::test]
    async fn test_snapshot_is_read_only() {
        let store = MemoryLeaseStore::new();
        let mut read = store.snapshot().await.unwrap();
        assert!(read.insert_apartment(&apartment("A-3")).await.is_err());
        assert!(read.commit().await.is_err());
    }
}
