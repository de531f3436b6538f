//! Multi-step helpers over a unit of work shared by several operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LeaseError;
use crate::models::{ListPaymentsFilter, Payment};
use crate::services::UnitOfWork;

const PAGE: i32 = 100;

/// Every payment recorded against `invoice_id`, newest first.
pub(crate) async fn all_payments(
    uow: &mut dyn UnitOfWork,
    invoice_id: Uuid,
) -> Result<Vec<Payment>, LeaseError> {
    let mut payments = Vec::new();
    let mut filter = ListPaymentsFilter {
        invoice_id: Some(invoice_id),
        page_size: PAGE,
        page_token: None,
    };
    loop {
        let page = uow.list_payments(&filter).await?;
        payments.extend(page.items);
        match page.next_page_token {
            Some(token) => filter.page_token = Some(token),
            None => return Ok(payments),
        }
    }
}

/// Clear the maintenance record billed through `invoice_id`, if any.
pub(crate) async fn detach_maintenance(
    uow: &mut dyn UnitOfWork,
    invoice_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), LeaseError> {
    if let Some(mut maintenance) = uow.maintenance_for_invoice(invoice_id).await? {
        maintenance.invoice_id = None;
        maintenance.bill_to_tenant = false;
        maintenance.updated_utc = now;
        uow.update_maintenance(&maintenance).await?;
    }
    Ok(())
}
