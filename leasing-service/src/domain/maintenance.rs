//! Maintenance billing bridge.
//!
//! A maintenance record billed to the tenant owns a link to one invoice,
//! issued against the apartment's active contract. The invoice is written
//! before the record that points to it and removed after it.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::invoices::maintenance_invoice;
use super::{validation, LeaseEngine};
use crate::error::LeaseError;
use crate::models::{
    CreateMaintenance, Invoice, InvoiceStatus, ListMaintenanceFilter, Maintenance, Page,
    UpdateMaintenance,
};
use crate::services::metrics::{INVOICES_TOTAL, MAINTENANCE_TOTAL};
use crate::services::{FileCategory, UnitOfWork};

/// Issue the tenant invoice for `maintenance` against the apartment's
/// active contract.
async fn bill_tenant(
    uow: &mut dyn UnitOfWork,
    maintenance: &Maintenance,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Invoice, LeaseError> {
    let contract = uow
        .active_contracts_for_apartment(maintenance.apartment_id)
        .await?
        .into_iter()
        .next()
        .ok_or(LeaseError::NoActiveContract(maintenance.apartment_id))?;

    let invoice = maintenance_invoice(
        &contract,
        maintenance.maintenance_id,
        maintenance.cost,
        &maintenance.description,
        now,
    );
    uow.insert_invoice(&invoice).await?;
    Ok(invoice)
}

fn billed_label(bill_to_tenant: bool) -> &'static str {
    if bill_to_tenant {
        "true"
    } else {
        "false"
    }
}

impl LeaseEngine {
    #[instrument(skip(self, input), fields(apartment_id = %input.apartment_id, bill_to_tenant = input.bill_to_tenant))]
    pub async fn create_maintenance(
        &self,
        input: CreateMaintenance,
    ) -> Result<(Maintenance, Option<Invoice>), LeaseError> {
        let input = validation::create_maintenance(input)?;
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        uow.get_apartment(input.apartment_id)
            .await?
            .ok_or(LeaseError::ApartmentNotFound(input.apartment_id))?;

        let mut maintenance = Maintenance {
            maintenance_id: Uuid::new_v4(),
            apartment_id: input.apartment_id,
            description: input.description.trim().to_string(),
            cost: input.cost,
            maintenance_date: input.maintenance_date,
            completion_date: input.completion_date,
            provider_name: input.provider_name.trim().to_string(),
            provider_contact: input.provider_contact.trim().to_string(),
            provider_company: input
                .provider_company
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            status: input.status.as_str().to_string(),
            bill_to_tenant: input.bill_to_tenant,
            invoice_id: None,
            invoice_file_path: None,
            created_utc: now,
            updated_utc: now,
        };

        let invoice = if maintenance.bill_to_tenant {
            let invoice = bill_tenant(uow.as_mut(), &maintenance, now).await?;
            maintenance.invoice_id = Some(invoice.invoice_id);
            Some(invoice)
        } else {
            None
        };
        uow.insert_maintenance(&maintenance).await?;
        uow.commit().await?;

        MAINTENANCE_TOTAL
            .with_label_values(&["created", billed_label(maintenance.bill_to_tenant)])
            .inc();
        if invoice.is_some() {
            INVOICES_TOTAL
                .with_label_values(&["maintenance", "created"])
                .inc();
        }
        info!(
            maintenance_id = %maintenance.maintenance_id,
            invoice_id = ?maintenance.invoice_id,
            cost = %maintenance.cost,
            "Maintenance recorded"
        );
        Ok((maintenance, invoice))
    }

    /// Apply a patch. Switching tenant billing on issues the invoice once;
    /// switching it off is refused while the invoice exists. Cost edits
    /// never touch an invoice already issued.
    #[instrument(skip(self, patch))]
    pub async fn update_maintenance(
        &self,
        maintenance_id: Uuid,
        patch: UpdateMaintenance,
    ) -> Result<(Maintenance, Option<Invoice>), LeaseError> {
        validation::maintenance_update(&patch)?;
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        let mut maintenance = uow
            .get_maintenance(maintenance_id)
            .await?
            .ok_or(LeaseError::MaintenanceNotFound(maintenance_id))?;

        if let Some(description) = patch.description {
            maintenance.description = description.trim().to_string();
        }
        if let Some(cost) = patch.cost {
            maintenance.cost = cost;
        }
        if let Some(date) = patch.maintenance_date {
            maintenance.maintenance_date = date;
        }
        if let Some(date) = patch.completion_date {
            maintenance.completion_date = Some(date);
        }
        if let Some(name) = patch.provider_name {
            maintenance.provider_name = name.trim().to_string();
        }
        if let Some(contact) = patch.provider_contact {
            maintenance.provider_contact = contact.trim().to_string();
        }
        if let Some(company) = patch.provider_company {
            let company = company.trim().to_string();
            maintenance.provider_company = (!company.is_empty()).then_some(company);
        }
        if let Some(status) = patch.status {
            maintenance.status = status.as_str().to_string();
        }
        if let Some(done) = maintenance.completion_date {
            if done < maintenance.maintenance_date {
                return Err(LeaseError::Validation(
                    "Completion date cannot be before maintenance date".to_string(),
                ));
            }
        }

        let mut issued = None;
        match (patch.bill_to_tenant, maintenance.invoice_id) {
            (Some(true), None) => {
                let invoice = bill_tenant(uow.as_mut(), &maintenance, now).await?;
                maintenance.invoice_id = Some(invoice.invoice_id);
                maintenance.bill_to_tenant = true;
                issued = Some(invoice);
            }
            (Some(false), Some(invoice_id)) => {
                warn!(
                    maintenance_id = %maintenance_id,
                    invoice_id = %invoice_id,
                    "Tenant billing cannot be removed once invoiced"
                );
                return Err(LeaseError::InvoiceAlreadyExists(maintenance_id));
            }
            (Some(bill), _) => maintenance.bill_to_tenant = bill,
            (None, _) => {}
        }
        maintenance.updated_utc = now;

        uow.update_maintenance(&maintenance).await?;
        let invoice = match (&issued, maintenance.invoice_id) {
            (Some(invoice), _) => Some(invoice.clone()),
            (None, Some(invoice_id)) => uow.get_invoice(invoice_id).await?,
            (None, None) => None,
        };
        uow.commit().await?;

        MAINTENANCE_TOTAL
            .with_label_values(&["updated", billed_label(maintenance.bill_to_tenant)])
            .inc();
        if issued.is_some() {
            INVOICES_TOTAL
                .with_label_values(&["maintenance", "created"])
                .inc();
        }
        info!(
            maintenance_id = %maintenance_id,
            invoice_id = ?maintenance.invoice_id,
            "Maintenance updated"
        );
        Ok((maintenance, invoice))
    }

    /// Delete a maintenance record and its tenant invoice. Refused once the
    /// invoice has any payment.
    #[instrument(skip(self))]
    pub async fn delete_maintenance(&self, maintenance_id: Uuid) -> Result<(), LeaseError> {
        let mut uow = self.store.begin().await?;
        let maintenance = uow
            .get_maintenance(maintenance_id)
            .await?
            .ok_or(LeaseError::MaintenanceNotFound(maintenance_id))?;

        let invoice = match maintenance.invoice_id {
            Some(invoice_id) => uow.get_invoice(invoice_id).await?,
            None => None,
        };
        if let Some(invoice) = &invoice {
            if invoice.status() != InvoiceStatus::Unpaid {
                return Err(LeaseError::LinkedInvoicePaid {
                    maintenance_id,
                    invoice_id: invoice.invoice_id,
                });
            }
        }

        uow.delete_maintenance(maintenance_id).await?;
        if let Some(invoice) = &invoice {
            uow.delete_invoice(invoice.invoice_id).await?;
        }
        uow.commit().await?;

        MAINTENANCE_TOTAL
            .with_label_values(&["deleted", billed_label(maintenance.bill_to_tenant)])
            .inc();
        if invoice.is_some() {
            INVOICES_TOTAL
                .with_label_values(&["maintenance", "deleted"])
                .inc();
        }
        info!(maintenance_id = %maintenance_id, "Maintenance deleted");
        Ok(())
    }

    /// Maintenance record plus its tenant invoice, if issued.
    #[instrument(skip(self))]
    pub async fn get_maintenance(
        &self,
        maintenance_id: Uuid,
    ) -> Result<(Maintenance, Option<Invoice>), LeaseError> {
        let mut uow = self.store.snapshot().await?;
        let maintenance = uow
            .get_maintenance(maintenance_id)
            .await?
            .ok_or(LeaseError::MaintenanceNotFound(maintenance_id))?;
        let invoice = match maintenance.invoice_id {
            Some(invoice_id) => uow.get_invoice(invoice_id).await?,
            None => None,
        };
        Ok((maintenance, invoice))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_maintenance(
        &self,
        filter: &ListMaintenanceFilter,
    ) -> Result<Page<Maintenance>, LeaseError> {
        let mut uow = self.store.snapshot().await?;
        Ok(uow.list_maintenance(filter).await?)
    }

    /// Store the provider's invoice document and record its path.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn attach_maintenance_invoice_file(
        &self,
        maintenance_id: Uuid,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Maintenance, LeaseError> {
        if content.is_empty() {
            return Err(LeaseError::Validation("File content cannot be empty".to_string()));
        }
        self.get_maintenance(maintenance_id).await?;
        let path = self
            .files
            .store(FileCategory::MaintenanceInvoice, file_name, content)
            .await?;

        let mut uow = self.store.begin().await?;
        let mut maintenance = uow
            .get_maintenance(maintenance_id)
            .await?
            .ok_or(LeaseError::MaintenanceNotFound(maintenance_id))?;
        maintenance.invoice_file_path = Some(path);
        maintenance.updated_utc = self.clock.now();
        uow.update_maintenance(&maintenance).await?;
        uow.commit().await?;

        info!(maintenance_id = %maintenance_id, "Maintenance invoice file attached");
        Ok(maintenance)
    }
}
