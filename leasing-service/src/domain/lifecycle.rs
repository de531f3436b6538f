//! Lease lifecycle manager.
//!
//! Contract create, update and delete each run as one unit of work covering
//! the apartment status, the contract row and the contract's invoice set.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::invoices::scheduled_invoice;
use super::store_ext::detach_maintenance;
use super::schedule::{build_schedule, plan_regeneration};
use super::{validation, LeaseEngine};
use crate::error::LeaseError;
use crate::models::{
    ApartmentStatus, Contract, CreateContract, Invoice, ListContractsFilter, Page,
    UpdateContract,
};
use crate::services::metrics::{CONTRACTS_TOTAL, INVOICES_TOTAL};
use crate::services::FileCategory;

impl LeaseEngine {
    /// Create a contract against an available apartment, occupy the
    /// apartment and issue the full rent schedule.
    #[instrument(skip(self, input), fields(apartment_id = %input.apartment_id))]
    pub async fn create_contract(
        &self,
        input: CreateContract,
    ) -> Result<(Contract, Vec<Invoice>), LeaseError> {
        let command = validation::create_contract(input)?;
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        let apartment = uow
            .get_apartment(command.apartment_id)
            .await?
            .ok_or(LeaseError::ApartmentNotFound(command.apartment_id))?;

        if apartment.status() != ApartmentStatus::Available {
            warn!(
                apartment_id = %apartment.apartment_id,
                status = %apartment.status,
                "Contract rejected: apartment not available"
            );
            return Err(LeaseError::ApartmentNotAvailable {
                apartment_id: apartment.apartment_id,
                status: apartment.status.clone(),
            });
        }

        uow.set_apartment_status(apartment.apartment_id, ApartmentStatus::Occupied)
            .await?;

        let terms = command.terms;
        let contract = Contract {
            contract_id: Uuid::new_v4(),
            apartment_id: apartment.apartment_id,
            tenant_name: command.tenant_name,
            tenant_phone: command.tenant_phone,
            tenant_id_image_path: command.tenant_id_image_path,
            contract_file_path: command.contract_file_path,
            duration_years: terms.duration_years as i32,
            payment_frequency: terms.frequency.as_str().to_string(),
            start_date: terms.start_date,
            end_date: terms.end_date,
            total_amount: terms.total_amount,
            is_active: true,
            created_utc: now,
            updated_utc: now,
        };
        uow.insert_contract(&contract).await?;

        let invoices: Vec<Invoice> = build_schedule(&terms)
            .iter()
            .map(|installment| scheduled_invoice(&contract, &apartment, installment, now))
            .collect();
        for invoice in &invoices {
            uow.insert_invoice(invoice).await?;
        }
        uow.commit().await?;

        CONTRACTS_TOTAL.with_label_values(&["created"]).inc();
        INVOICES_TOTAL
            .with_label_values(&["schedule", "created"])
            .inc_by(invoices.len() as f64);
        info!(
            contract_id = %contract.contract_id,
            apartment_id = %contract.apartment_id,
            frequency = %contract.payment_frequency,
            total_amount = %contract.total_amount,
            invoice_count = invoices.len(),
            "Contract created"
        );
        Ok((contract, invoices))
    }

    /// Apply a patch to a contract.
    ///
    /// Moving to another apartment or re-activating requires the target
    /// apartment to be available; deactivating or moving away releases the
    /// old one. Term changes rework only unpaid schedule invoices.
    #[instrument(skip(self, patch))]
    pub async fn update_contract(
        &self,
        contract_id: Uuid,
        patch: UpdateContract,
    ) -> Result<(Contract, Vec<Invoice>), LeaseError> {
        let now = self.clock.now();
        let today = self.clock.today();

        let mut uow = self.store.begin().await?;
        let mut contract = uow
            .get_contract(contract_id)
            .await?
            .ok_or(LeaseError::ContractNotFound(contract_id))?;

        let old_terms = contract.terms();
        let new_terms = validation::contract_terms_update(&old_terms, &patch)?;

        let target_apartment_id = patch.apartment_id.unwrap_or(contract.apartment_id);
        let target_active = patch.is_active.unwrap_or(contract.is_active);
        let moving = target_apartment_id != contract.apartment_id;

        let apartment = uow
            .get_apartment(target_apartment_id)
            .await?
            .ok_or(LeaseError::ApartmentNotFound(target_apartment_id))?;

        if contract.is_active && (moving || !target_active) {
            uow.set_apartment_status(contract.apartment_id, ApartmentStatus::Available)
                .await?;
        }
        if target_active && (moving || !contract.is_active) {
            if apartment.status() != ApartmentStatus::Available {
                return Err(LeaseError::ApartmentNotAvailable {
                    apartment_id: apartment.apartment_id,
                    status: apartment.status.clone(),
                });
            }
            uow.set_apartment_status(apartment.apartment_id, ApartmentStatus::Occupied)
                .await?;
        }

        if let Some(name) = &patch.tenant_name {
            contract.tenant_name = name.trim().to_string();
        }
        if let Some(phone) = &patch.tenant_phone {
            contract.tenant_phone = phone.trim().to_string();
        }
        contract.apartment_id = target_apartment_id;
        contract.is_active = target_active;
        contract.duration_years = new_terms.duration_years as i32;
        contract.payment_frequency = new_terms.frequency.as_str().to_string();
        contract.start_date = new_terms.start_date;
        contract.end_date = new_terms.end_date;
        contract.total_amount = new_terms.total_amount;
        contract.updated_utc = now;
        uow.update_contract(&contract).await?;

        let existing = uow.invoices_for_contract(contract_id).await?;
        let plan = plan_regeneration(&existing, &old_terms, &new_terms, today);
        if !plan.is_empty() {
            for invoice_id in &plan.delete {
                uow.delete_invoice(*invoice_id).await?;
            }
            for (invoice_id, amount) in &plan.reprice {
                if let Some(invoice) = existing.iter().find(|i| i.invoice_id == *invoice_id) {
                    let mut invoice = invoice.clone();
                    invoice.amount = *amount;
                    invoice.apply_paid_amount(invoice.paid_amount);
                    invoice.updated_utc = now;
                    uow.update_invoice(&invoice).await?;
                }
            }
            for installment in &plan.create {
                uow.insert_invoice(&scheduled_invoice(&contract, &apartment, installment, now))
                    .await?;
            }
            INVOICES_TOTAL
                .with_label_values(&["schedule", "deleted"])
                .inc_by(plan.delete.len() as f64);
            INVOICES_TOTAL
                .with_label_values(&["schedule", "repriced"])
                .inc_by(plan.reprice.len() as f64);
            INVOICES_TOTAL
                .with_label_values(&["schedule", "created"])
                .inc_by(plan.create.len() as f64);
        }

        let invoices = uow.invoices_for_contract(contract_id).await?;
        uow.commit().await?;

        let event = match (old_terms == new_terms, target_active) {
            (_, false) => "terminated",
            (true, true) => "updated",
            (false, true) => "regenerated",
        };
        CONTRACTS_TOTAL.with_label_values(&[event]).inc();
        info!(
            contract_id = %contract_id,
            is_active = contract.is_active,
            deleted = plan.delete.len(),
            repriced = plan.reprice.len(),
            created = plan.create.len(),
            "Contract updated"
        );
        Ok((contract, invoices))
    }

    /// Delete a contract with all of its invoices.
    ///
    /// Refused while any invoice carries a payment; settled invoices are
    /// never destroyed. Returns the number of invoices removed.
    #[instrument(skip(self))]
    pub async fn delete_contract(&self, contract_id: Uuid) -> Result<usize, LeaseError> {
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        let contract = uow
            .get_contract(contract_id)
            .await?
            .ok_or(LeaseError::ContractNotFound(contract_id))?;

        let invoices = uow.invoices_for_contract(contract_id).await?;
        let settled = invoices.iter().filter(|i| i.status().is_settled()).count();
        if settled > 0 {
            warn!(
                contract_id = %contract_id,
                settled = settled,
                "Contract deletion refused: settled invoices"
            );
            return Err(LeaseError::OutstandingSettledInvoices {
                contract_id,
                count: settled,
            });
        }

        for invoice in &invoices {
            if invoice.maintenance_id.is_some() {
                detach_maintenance(uow.as_mut(), invoice.invoice_id, now).await?;
            }
            uow.delete_invoice(invoice.invoice_id).await?;
        }
        if contract.is_active {
            uow.set_apartment_status(contract.apartment_id, ApartmentStatus::Available)
                .await?;
        }
        uow.delete_contract(contract_id).await?;
        uow.commit().await?;

        CONTRACTS_TOTAL.with_label_values(&["deleted"]).inc();
        INVOICES_TOTAL
            .with_label_values(&["schedule", "deleted"])
            .inc_by(invoices.len() as f64);
        info!(
            contract_id = %contract_id,
            apartment_id = %contract.apartment_id,
            deleted_invoices = invoices.len(),
            "Contract deleted"
        );
        Ok(invoices.len())
    }

    /// Contract plus its invoices ordered by due date.
    #[instrument(skip(self))]
    pub async fn get_contract(
        &self,
        contract_id: Uuid,
    ) -> Result<(Contract, Vec<Invoice>), LeaseError> {
        let mut uow = self.store.snapshot().await?;
        let contract = uow
            .get_contract(contract_id)
            .await?
            .ok_or(LeaseError::ContractNotFound(contract_id))?;
        let invoices = uow.invoices_for_contract(contract_id).await?;
        Ok((contract, invoices))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_contracts(
        &self,
        filter: &ListContractsFilter,
    ) -> Result<Page<Contract>, LeaseError> {
        let mut uow = self.store.snapshot().await?;
        Ok(uow.list_contracts(filter).await?)
    }

    /// Store a signed contract document and record its path.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn attach_contract_file(
        &self,
        contract_id: Uuid,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Contract, LeaseError> {
        self.attach_to_contract(contract_id, FileCategory::Contract, file_name, content)
            .await
    }

    /// Store the tenant's ID document image and record its path.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn attach_tenant_id(
        &self,
        contract_id: Uuid,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Contract, LeaseError> {
        self.attach_to_contract(contract_id, FileCategory::TenantId, file_name, content)
            .await
    }

    async fn attach_to_contract(
        &self,
        contract_id: Uuid,
        category: FileCategory,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Contract, LeaseError> {
        if content.is_empty() {
            return Err(LeaseError::Validation("File content cannot be empty".to_string()));
        }
        // Fail before writing anything for an unknown contract.
        self.get_contract(contract_id).await?;
        let path = self.files.store(category, file_name, content).await?;

        let mut uow = self.store.begin().await?;
        let mut contract = uow
            .get_contract(contract_id)
            .await?
            .ok_or(LeaseError::ContractNotFound(contract_id))?;
        match category {
            FileCategory::TenantId => contract.tenant_id_image_path = Some(path),
            _ => contract.contract_file_path = Some(path),
        }
        contract.updated_utc = self.clock.now();
        uow.update_contract(&contract).await?;
        uow.commit().await?;

        info!(contract_id = %contract_id, category = category.dir_name(), "File attached");
        Ok(contract)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{CreatePayment, InvoiceStatus, PaymentMethod};
    use rust_decimal::Decimal;

    async fn pay(fx: &Fixture, invoice: &Invoice, amount: &str) {
        fx.engine
            .record_payment(CreatePayment {
                invoice_id: invoice.invoice_id,
                amount: dec(amount),
                payment_date: date("2024-01-05"),
                method: PaymentMethod::Cash,
                description: None,
            })
            .await
            .unwrap();
    }

    async fn status_of(fx: &Fixture, apartment_id: Uuid) -> ApartmentStatus {
        fx.engine.get_apartment(apartment_id).await.unwrap().0.status()
    }

    #[tokio::test]
    async fn test_monthly_contract_schedule() {
        let fx = engine_on("2024-01-01").await;
        let apt = apartment(&fx.engine, "A-12").await;

        let (contract, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-15", 1, "1200"))
            .await
            .unwrap();

        assert_eq!(contract.end_date, date("2025-01-15"));
        assert!(contract.is_active);
        assert_eq!(invoices.len(), 12);
        for (i, invoice) in invoices.iter().enumerate() {
            assert_eq!(invoice.amount, dec("100"));
            assert_eq!(invoice.period_index, Some(i as i32));
            assert_eq!(invoice.status(), InvoiceStatus::Unpaid);
        }
        assert_eq!(invoices[0].due_date, date("2024-01-15"));
        assert_eq!(invoices[1].due_date, date("2024-02-15"));
        assert_eq!(invoices[11].due_date, date("2024-12-15"));
        assert_eq!(invoices[2].description, "Rent payment for A-12 - Mar 2024");

        let sum: Decimal = invoices.iter().map(|i| i.amount).sum();
        assert_eq!(sum, dec("1200"));
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Occupied);

        let (apartment, active) = fx.engine.get_apartment(apt).await.unwrap();
        assert_eq!(apartment.status(), ApartmentStatus::Occupied);
        assert_eq!(active.map(|c| c.contract_id), Some(contract.contract_id));
    }

    #[tokio::test]
    async fn test_uneven_total_sums_exactly() {
        let fx = engine_on("2024-01-01").await;
        let apt = apartment(&fx.engine, "A-1").await;

        let (_, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "quarterly", "2024-01-31", 1, "1000"))
            .await
            .unwrap();

        let amounts: Vec<Decimal> = invoices.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![dec("250"), dec("250"), dec("250"), dec("250")]);
        assert_eq!(invoices[1].due_date, date("2024-04-30"));

        let apt = apartment(&fx.engine, "A-2").await;
        let (_, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 1, "1000"))
            .await
            .unwrap();
        assert_eq!(invoices[0].amount, dec("83.33"));
        assert_eq!(invoices[11].amount, dec("83.37"));
        let sum: Decimal = invoices.iter().map(|i| i.amount).sum();
        assert_eq!(sum, dec("1000"));
    }

    #[tokio::test]
    async fn test_contract_on_unavailable_apartment_rejected() {
        let fx = engine_on("2024-01-01").await;
        let apt = apartment(&fx.engine, "A-1").await;
        fx.engine
            .create_contract(contract_input(apt, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();

        let err = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-02-01", 1, "1200"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentNotAvailable { .. }));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Occupied);

        let page = fx
            .engine
            .list_contracts(&ListContractsFilter {
                apartment_id: Some(apt),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_contract_validation_and_missing_apartment() {
        let fx = engine_on("2024-01-01").await;
        let apt = apartment(&fx.engine, "A-1").await;

        let err = fx
            .engine
            .create_contract(contract_input(apt, "weekly", "2024-01-01", 1, "1200"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 0, "1200"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = fx
            .engine
            .create_contract(contract_input(Uuid::new_v4(), "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentNotFound(_)));
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Available);
    }

    #[tokio::test]
    async fn test_delete_refused_with_settled_invoice() {
        let fx = engine_on("2024-01-20").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();
        pay(&fx, &invoices[0], "40").await;

        let err = fx
            .engine
            .delete_contract(contract.contract_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LeaseError::OutstandingSettledInvoices { count: 1, .. }
        ));

        let (stored, stored_invoices) = fx.engine.get_contract(contract.contract_id).await.unwrap();
        assert!(stored.is_active);
        assert_eq!(stored_invoices.len(), 12);
        assert_eq!(stored_invoices[0].paid_amount, dec("40"));
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Occupied);
    }

    #[tokio::test]
    async fn test_delete_releases_apartment_and_invoices() {
        let fx = engine_on("2024-01-20").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "quarterly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();

        let deleted = fx.engine.delete_contract(contract.contract_id).await.unwrap();
        assert_eq!(deleted, 4);
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Available);

        let err = fx.engine.get_contract(contract.contract_id).await.unwrap_err();
        assert!(matches!(err, LeaseError::ContractNotFound(_)));
        let err = fx.engine.get_invoice(invoices[0].invoice_id).await.unwrap_err();
        assert!(matches!(err, LeaseError::InvoiceNotFound(_)));
    }

    #[tokio::test]
    async fn test_frequency_change_keeps_settled_invoices() {
        let fx = engine_on("2024-03-15").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();
        pay(&fx, &invoices[0], "100").await;
        pay(&fx, &invoices[1], "30").await;

        let (updated, after) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    payment_frequency: Some("quarterly".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.payment_frequency, "quarterly");
        assert_eq!(after.len(), 6);

        let kept: Vec<&Invoice> = after
            .iter()
            .filter(|i| i.status() != InvoiceStatus::Unpaid)
            .collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].invoice_id, invoices[0].invoice_id);
        assert_eq!(kept[0].amount, dec("100"));
        assert_eq!(kept[0].status(), InvoiceStatus::Paid);
        assert_eq!(kept[1].invoice_id, invoices[1].invoice_id);
        assert_eq!(kept[1].paid_amount, dec("30"));

        let fresh: Vec<&Invoice> = after
            .iter()
            .filter(|i| i.status() == InvoiceStatus::Unpaid)
            .collect();
        let due: Vec<_> = fresh.iter().map(|i| i.due_date).collect();
        assert_eq!(
            due,
            vec![
                date("2024-04-01"),
                date("2024-07-01"),
                date("2024-10-01"),
                date("2025-01-01"),
            ]
        );
        assert!(fresh.iter().all(|i| i.amount == dec("300")));

        // Settled invoices sit on top of a full new schedule.
        let billed: Decimal = after.iter().map(|i| i.amount).sum();
        assert_eq!(billed, dec("1400"));
    }

    #[tokio::test]
    async fn test_amount_change_reprices_unpaid_in_place() {
        let fx = engine_on("2024-01-10").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();
        pay(&fx, &invoices[0], "100").await;

        let (_, after) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    total_amount: Some(dec("2400")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(after.len(), 12);
        assert_eq!(after[0].amount, dec("100"));
        assert_eq!(after[0].status(), InvoiceStatus::Paid);
        for (before, now) in invoices.iter().zip(after.iter()).skip(1) {
            assert_eq!(now.invoice_id, before.invoice_id);
            assert_eq!(now.amount, dec("200"));
        }
    }

    #[tokio::test]
    async fn test_duration_change_rebuilds_future_unpaid() {
        let fx = engine_on("2024-01-10").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, invoices) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();

        let (updated, after) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    duration_years: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.end_date, date("2026-01-01"));
        assert_eq!(after.len(), 24);
        // due on or before today, kept as is
        assert_eq!(after[0].invoice_id, invoices[0].invoice_id);
        assert_eq!(after[0].amount, dec("100"));
        assert!(after[1..].iter().all(|i| i.amount == dec("50")));
        assert_eq!(after[23].due_date, date("2025-12-01"));
    }

    #[tokio::test]
    async fn test_start_date_move_invoices_every_new_period() {
        let fx = engine_on("2024-03-15").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, _) = fx
            .engine
            .create_contract(contract_input(apt, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();

        let (updated, after) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    start_date: Some(date("2024-03-01")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.end_date, date("2025-03-01"));
        let mut due: Vec<_> = after.iter().map(|i| i.due_date).collect();
        due.sort();
        // Jan to Mar were already due and stay; Apr 2024 to Feb 2025 are reissued.
        assert_eq!(due.len(), 14);
        assert!(due.contains(&date("2024-04-01")));
        assert!(due.contains(&date("2024-05-01")));
        assert_eq!(due[13], date("2025-02-01"));
        assert!(due.iter().all(|d| *d <= updated.end_date));
    }

    #[tokio::test]
    async fn test_explicit_end_date_limits_schedule() {
        let fx = engine_on("2024-01-01").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let mut input = contract_input(apt, "monthly", "2024-01-01", 1, "1200");
        input.end_date = Some(date("2024-06-30"));

        let (contract, invoices) = fx.engine.create_contract(input).await.unwrap();

        assert_eq!(contract.end_date, date("2024-06-30"));
        assert_eq!(invoices.len(), 6);
        assert!(invoices.iter().all(|i| i.due_date <= contract.end_date));
        assert!(invoices.iter().all(|i| i.amount == dec("100")));
    }

    #[tokio::test]
    async fn test_terminate_and_reactivate() {
        let fx = engine_on("2024-01-10").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, _) = fx
            .engine
            .create_contract(contract_input(apt, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();

        let (terminated, _) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!terminated.is_active);
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Available);

        let (reactivated, _) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(reactivated.is_active);
        assert_eq!(status_of(&fx, apt).await, ApartmentStatus::Occupied);
    }

    #[tokio::test]
    async fn test_move_to_other_apartment() {
        let fx = engine_on("2024-01-10").await;
        let first = apartment(&fx.engine, "A-1").await;
        let second = apartment(&fx.engine, "A-2").await;
        let taken = apartment(&fx.engine, "A-3").await;
        let (contract, _) = fx
            .engine
            .create_contract(contract_input(first, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();
        fx.engine
            .create_contract(contract_input(taken, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();

        let err = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    apartment_id: Some(taken),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(status_of(&fx, first).await, ApartmentStatus::Occupied);

        let (moved, _) = fx
            .engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    apartment_id: Some(second),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.apartment_id, second);
        assert_eq!(status_of(&fx, first).await, ApartmentStatus::Available);
        assert_eq!(status_of(&fx, second).await, ApartmentStatus::Occupied);
    }

    #[tokio::test]
    async fn test_attach_files() {
        let fx = engine_on("2024-01-10").await;
        let apt = apartment(&fx.engine, "A-1").await;
        let (contract, _) = fx
            .engine
            .create_contract(contract_input(apt, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();

        let updated = fx
            .engine
            .attach_contract_file(contract.contract_id, "lease.pdf", b"%PDF".to_vec())
            .await
            .unwrap();
        let path = updated.contract_file_path.unwrap();
        assert!(path.starts_with("contracts/"));

        let updated = fx
            .engine
            .attach_tenant_id(contract.contract_id, "id.jpg", vec![0xFF, 0xD8])
            .await
            .unwrap();
        assert!(updated.tenant_id_image_path.unwrap().starts_with("tenant-ids/"));
        assert_eq!(updated.contract_file_path.as_deref(), Some(path.as_str()));

        let err = fx
            .engine
            .attach_tenant_id(Uuid::new_v4(), "id.jpg", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::ContractNotFound(_)));
    }
}
