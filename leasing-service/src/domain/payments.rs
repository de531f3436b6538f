//! Payment ledger: applies and reverses payments against invoices.
//!
//! The invoice is read through the read-write unit of work, so two payments
//! against the same invoice are serialized and the second one validates
//! against the balance the first one left behind.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use super::numbering::receipt_number;
use super::{validation, LeaseEngine};
use crate::error::LeaseError;
use crate::models::{CreatePayment, Invoice, ListPaymentsFilter, Page, Payment, UpdatePayment};
use crate::services::metrics::{PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL};

impl LeaseEngine {
    /// Record a payment and raise the invoice's paid amount by it.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id, amount = %input.amount))]
    pub async fn record_payment(
        &self,
        input: CreatePayment,
    ) -> Result<(Payment, Invoice), LeaseError> {
        let input = validation::create_payment(input)?;
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        let mut invoice = uow
            .get_invoice(input.invoice_id)
            .await?
            .ok_or(LeaseError::InvoiceNotFound(input.invoice_id))?;

        if invoice.paid_amount >= invoice.amount {
            return Err(LeaseError::AlreadyPaid(invoice.invoice_id));
        }
        let balance = invoice.balance();
        if input.amount > balance {
            return Err(LeaseError::AmountExceedsBalance {
                amount: input.amount,
                balance,
            });
        }

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            invoice_id: invoice.invoice_id,
            amount: input.amount,
            payment_date: input.payment_date,
            method: input.method.as_str().to_string(),
            receipt_number: receipt_number(now),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            created_utc: now,
            updated_utc: now,
        };
        uow.insert_payment(&payment).await?;

        invoice.apply_paid_amount(invoice.paid_amount + payment.amount);
        invoice.updated_utc = now;
        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        PAYMENTS_TOTAL
            .with_label_values(&["recorded", input.method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&["recorded"])
            .inc_by(payment.amount.to_f64().unwrap_or(0.0));
        info!(
            payment_id = %payment.payment_id,
            receipt_number = %payment.receipt_number,
            paid_amount = %invoice.paid_amount,
            status = %invoice.status,
            "Payment recorded"
        );
        Ok((payment, invoice))
    }

    /// Reverse a payment: the invoice's paid amount drops by exactly the
    /// payment amount (never below zero) and the payment is removed.
    #[instrument(skip(self))]
    pub async fn delete_payment(&self, payment_id: Uuid) -> Result<Invoice, LeaseError> {
        let mut uow = self.store.begin().await?;
        let payment = uow
            .get_payment(payment_id)
            .await?
            .ok_or(LeaseError::PaymentNotFound(payment_id))?;
        let mut invoice = uow
            .get_invoice(payment.invoice_id)
            .await?
            .ok_or(LeaseError::InvoiceNotFound(payment.invoice_id))?;

        let paid = (invoice.paid_amount - payment.amount).max(Decimal::ZERO);
        invoice.apply_paid_amount(paid);
        invoice.updated_utc = self.clock.now();

        uow.delete_payment(payment_id).await?;
        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        PAYMENTS_TOTAL
            .with_label_values(&["reversed", payment.method().as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&["reversed"])
            .inc_by(payment.amount.to_f64().unwrap_or(0.0));
        info!(
            payment_id = %payment_id,
            invoice_id = %invoice.invoice_id,
            paid_amount = %invoice.paid_amount,
            status = %invoice.status,
            "Payment reversed"
        );
        Ok(invoice)
    }

    /// Edit method, date or description; amount and invoice are fixed.
    #[instrument(skip(self, patch))]
    pub async fn update_payment(
        &self,
        payment_id: Uuid,
        patch: UpdatePayment,
    ) -> Result<Payment, LeaseError> {
        validation::payment_update(&patch)?;

        let mut uow = self.store.begin().await?;
        let mut payment = uow
            .get_payment(payment_id)
            .await?
            .ok_or(LeaseError::PaymentNotFound(payment_id))?;

        if let Some(method) = patch.method {
            payment.method = method.as_str().to_string();
        }
        if let Some(date) = patch.payment_date {
            payment.payment_date = date;
        }
        if let Some(description) = patch.description {
            payment.description = description.trim().to_string();
        }
        payment.updated_utc = self.clock.now();

        uow.update_payment(&payment).await?;
        uow.commit().await?;

        info!(payment_id = %payment_id, "Payment updated");
        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, LeaseError> {
        let mut uow = self.store.snapshot().await?;
        uow.get_payment(payment_id)
            .await?
            .ok_or(LeaseError::PaymentNotFound(payment_id))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_payments(
        &self,
        filter: &ListPaymentsFilter,
    ) -> Result<Page<Payment>, LeaseError> {
        let mut uow = self.store.snapshot().await?;
        Ok(uow.list_payments(filter).await?)
    }
}
