//! Invoice issuing, editing and deletion outside the rent schedule.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use super::numbering::{maintenance_invoice_number, manual_invoice_number, schedule_invoice_number};
use super::schedule::{rent_description, Installment};
use super::store_ext::{all_payments, detach_maintenance};
use super::{validation, LeaseEngine};
use crate::error::LeaseError;
use crate::models::{
    Apartment, Contract, CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, Page,
    Payment, UpdateInvoice,
};
use crate::services::metrics::INVOICES_TOTAL;

/// Days between issuing a maintenance invoice and its due date.
pub const MAINTENANCE_DUE_DAYS: i64 = 14;

fn unpaid_invoice(
    contract: &Contract,
    invoice_number: String,
    amount: Decimal,
    due_date: NaiveDate,
    description: String,
    now: DateTime<Utc>,
) -> Invoice {
    Invoice {
        invoice_id: Uuid::new_v4(),
        invoice_number,
        contract_id: contract.contract_id,
        apartment_id: contract.apartment_id,
        tenant_name: contract.tenant_name.clone(),
        tenant_phone: contract.tenant_phone.clone(),
        amount,
        paid_amount: Decimal::ZERO,
        due_date,
        status: InvoiceStatus::Unpaid.as_str().to_string(),
        description,
        period_index: None,
        maintenance_related: false,
        maintenance_id: None,
        created_utc: now,
        updated_utc: now,
    }
}

/// Rent invoice for one installment, numbered by its period.
pub(crate) fn scheduled_invoice(
    contract: &Contract,
    apartment: &Apartment,
    installment: &Installment,
    now: DateTime<Utc>,
) -> Invoice {
    let mut invoice = unpaid_invoice(
        contract,
        schedule_invoice_number(now, installment.period_index as usize),
        installment.amount,
        installment.due_date,
        rent_description(&apartment.number, installment.due_date),
        now,
    );
    invoice.period_index = Some(installment.period_index as i32);
    invoice
}

/// Tenant charge for a maintenance event, due two weeks after issue.
pub(crate) fn maintenance_invoice(
    contract: &Contract,
    maintenance_id: Uuid,
    cost: Decimal,
    description: &str,
    now: DateTime<Utc>,
) -> Invoice {
    let due_date = now.date_naive() + Duration::days(MAINTENANCE_DUE_DAYS);
    let mut invoice = unpaid_invoice(
        contract,
        maintenance_invoice_number(now),
        cost,
        due_date,
        format!("Maintenance: {}", description),
        now,
    );
    invoice.maintenance_related = true;
    invoice.maintenance_id = Some(maintenance_id);
    invoice
}

impl LeaseEngine {
    /// Issue a one-off invoice against an existing contract.
    #[instrument(skip(self, input), fields(contract_id = %input.contract_id))]
    pub async fn create_invoice(&self, input: CreateInvoice) -> Result<Invoice, LeaseError> {
        let input = validation::create_invoice(input)?;
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        let contract = uow
            .get_contract(input.contract_id)
            .await?
            .ok_or(LeaseError::ContractNotFound(input.contract_id))?;

        let invoice = unpaid_invoice(
            &contract,
            manual_invoice_number(now),
            input.amount,
            input.due_date,
            input.description.trim().to_string(),
            now,
        );
        uow.insert_invoice(&invoice).await?;
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&["manual", "created"]).inc();
        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            amount = %invoice.amount,
            "Invoice issued"
        );
        Ok(invoice)
    }

    /// Invoice plus every payment applied to it, newest first.
    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<(Invoice, Vec<Payment>), LeaseError> {
        let mut uow = self.store.snapshot().await?;
        let invoice = uow
            .get_invoice(invoice_id)
            .await?
            .ok_or(LeaseError::InvoiceNotFound(invoice_id))?;
        let payments = all_payments(uow.as_mut(), invoice_id).await?;
        Ok((invoice, payments))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Page<Invoice>, LeaseError> {
        let mut uow = self.store.snapshot().await?;
        Ok(uow.list_invoices(filter).await?)
    }

    /// Edit amount, due date or description. The paid amount is never
    /// edited directly; the status is re-derived from it.
    #[instrument(skip(self, patch))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        patch: UpdateInvoice,
    ) -> Result<Invoice, LeaseError> {
        validation::invoice_update(&patch)?;

        let mut uow = self.store.begin().await?;
        let mut invoice = uow
            .get_invoice(invoice_id)
            .await?
            .ok_or(LeaseError::InvoiceNotFound(invoice_id))?;

        if let Some(amount) = patch.amount {
            if amount < invoice.paid_amount {
                return Err(LeaseError::AmountBelowPaid {
                    amount,
                    paid: invoice.paid_amount,
                });
            }
            invoice.amount = amount;
        }
        if let Some(due_date) = patch.due_date {
            invoice.due_date = due_date;
        }
        if let Some(description) = patch.description {
            invoice.description = description.trim().to_string();
        }
        invoice.apply_paid_amount(invoice.paid_amount);
        invoice.updated_utc = self.clock.now();

        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&[origin(&invoice), "updated"]).inc();
        info!(invoice_id = %invoice_id, status = %invoice.status, "Invoice updated");
        Ok(invoice)
    }

    /// Delete an invoice that has no payments. A maintenance record billed
    /// through it loses the link and stops billing the tenant.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<(), LeaseError> {
        let mut uow = self.store.begin().await?;
        let invoice = uow
            .get_invoice(invoice_id)
            .await?
            .ok_or(LeaseError::InvoiceNotFound(invoice_id))?;

        if invoice.status() != InvoiceStatus::Unpaid {
            return Err(LeaseError::InvoiceNotUnpaid {
                invoice_id,
                status: invoice.status.clone(),
            });
        }

        detach_maintenance(uow.as_mut(), invoice_id, self.clock.now()).await?;
        uow.delete_invoice(invoice_id).await?;
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&[origin(&invoice), "deleted"]).inc();
        info!(invoice_id = %invoice_id, "Invoice deleted");
        Ok(())
    }
}

pub(crate) fn origin(invoice: &Invoice) -> &'static str {
    if invoice.maintenance_related {
        "maintenance"
    } else if invoice.period_index.is_some() {
        "schedule"
    } else {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{CreatePayment, PaymentMethod};

    async fn contract_with_manual_invoice(fx: &Fixture) -> (Uuid, Invoice) {
        let apt = apartment(&fx.engine, "B-2").await;
        let (contract, _) = fx
            .engine
            .create_contract(contract_input(apt, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();
        let invoice = fx
            .engine
            .create_invoice(CreateInvoice {
                contract_id: contract.contract_id,
                amount: dec("500"),
                due_date: date("2024-02-15"),
                description: "Key replacement".to_string(),
            })
            .await
            .unwrap();
        (contract.contract_id, invoice)
    }

    async fn pay(fx: &Fixture, invoice_id: Uuid, amount: &str) {
        fx.engine
            .record_payment(CreatePayment {
                invoice_id,
                amount: dec(amount),
                payment_date: date("2024-02-01"),
                method: PaymentMethod::Cash,
                description: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_manual_invoice_snapshots_contract() {
        let fx = engine_on("2024-01-10").await;
        let (contract_id, invoice) = contract_with_manual_invoice(&fx).await;

        assert_eq!(invoice.contract_id, contract_id);
        assert_eq!(invoice.tenant_name, "Amina Yusuf");
        assert_eq!(invoice.status(), InvoiceStatus::Unpaid);
        assert!(invoice.period_index.is_none());
        assert!(invoice.invoice_number.starts_with("INV-"));
    }

    #[tokio::test]
    async fn test_manual_invoice_for_unknown_contract() {
        let fx = engine_on("2024-01-10").await;
        let err = fx
            .engine
            .create_invoice(CreateInvoice {
                contract_id: Uuid::new_v4(),
                amount: dec("10"),
                due_date: date("2024-02-15"),
                description: "Late fee".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_amount_recomputes_status() {
        let fx = engine_on("2024-01-10").await;
        let (_, invoice) = contract_with_manual_invoice(&fx).await;
        pay(&fx, invoice.invoice_id, "200").await;

        let updated = fx
            .engine
            .update_invoice(
                invoice.invoice_id,
                UpdateInvoice {
                    amount: Some(dec("200")),
                    due_date: None,
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status(), InvoiceStatus::Paid);
        assert_eq!(updated.paid_amount, dec("200"));
    }

    #[tokio::test]
    async fn test_update_amount_below_paid_rejected() {
        let fx = engine_on("2024-01-10").await;
        let (_, invoice) = contract_with_manual_invoice(&fx).await;
        pay(&fx, invoice.invoice_id, "300").await;

        let err = fx
            .engine
            .update_invoice(
                invoice.invoice_id,
                UpdateInvoice {
                    amount: Some(dec("250")),
                    due_date: None,
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::AmountBelowPaid { .. }));

        let (stored, _) = fx.engine.get_invoice(invoice.invoice_id).await.unwrap();
        assert_eq!(stored.amount, dec("500"));
    }

    #[tokio::test]
    async fn test_delete_only_while_unpaid() {
        let fx = engine_on("2024-01-10").await;
        let (_, invoice) = contract_with_manual_invoice(&fx).await;
        pay(&fx, invoice.invoice_id, "100").await;

        let err = fx.engine.delete_invoice(invoice.invoice_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let (_, payments) = fx.engine.get_invoice(invoice.invoice_id).await.unwrap();
        fx.engine
            .delete_payment(payments[0].payment_id)
            .await
            .unwrap();
        fx.engine.delete_invoice(invoice.invoice_id).await.unwrap();

        let err = fx.engine.get_invoice(invoice.invoice_id).await.unwrap_err();
        assert!(matches!(err, LeaseError::InvoiceNotFound(_)));
    }
}
