//! Maintenance billing integration tests.

mod common;

use common::{admin, create_apartment, create_contract, error_code, start_year, viewer, TestApp};
use leasing_service::grpc::proto::{
    AttachMaintenanceInvoiceFileRequest, CreateMaintenanceRequest, DeleteMaintenanceRequest,
    GetInvoiceRequest, GetMaintenanceRequest, InvoiceStatus, ListMaintenanceRequest,
    MaintenanceStatus, PaymentFrequency, PaymentMethod, RecordPaymentRequest,
    UpdateMaintenanceRequest,
};
use tonic::Code;

fn maintenance(apartment_id: &str, cost: &str, bill_to_tenant: bool) -> CreateMaintenanceRequest {
    CreateMaintenanceRequest {
        apartment_id: apartment_id.to_string(),
        description: "Replace kitchen tap".to_string(),
        cost: cost.to_string(),
        maintenance_date: format!("{}-02-01", start_year()),
        completion_date: String::new(),
        provider_name: "Joseph Kamau".to_string(),
        provider_contact: "+254700000002".to_string(),
        provider_company: "Kamau Plumbing".to_string(),
        status: MaintenanceStatus::Pending as i32,
        bill_to_tenant,
    }
}

#[tokio::test]
async fn billed_maintenance_invoices_active_tenant() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let apartment_id = create_apartment(&mut client, "M-301").await;
    let contract = create_contract(&mut client, &apartment_id, PaymentFrequency::Yearly, "6000")
        .await
        .contract
        .unwrap();

    let created = client
        .create_maintenance(admin(maintenance(&apartment_id, "150.50", true)))
        .await
        .unwrap()
        .into_inner();

    let record = created.maintenance.unwrap();
    let invoice = created.invoice.unwrap();
    assert!(record.bill_to_tenant);
    assert_eq!(record.invoice_id, invoice.invoice_id);
    assert!(invoice.maintenance_related);
    assert_eq!(invoice.maintenance_id, record.maintenance_id);
    assert_eq!(invoice.contract_id, contract.contract_id);
    assert_eq!(invoice.amount, "150.50");
    assert_eq!(invoice.status, InvoiceStatus::Unpaid as i32);
    assert!(invoice.invoice_number.starts_with("INV-M-"));
    assert!(invoice.period_index.is_none());

    let fetched = client
        .get_maintenance(viewer(GetMaintenanceRequest {
            maintenance_id: record.maintenance_id,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(fetched.invoice.unwrap().invoice_id, invoice.invoice_id);
}

#[tokio::test]
async fn billing_without_active_contract_is_refused() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let apartment_id = create_apartment(&mut client, "M-302").await;

    let status = client
        .create_maintenance(admin(maintenance(&apartment_id, "80", true)))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_code(&status), "NO_ACTIVE_CONTRACT");

    let listed = client
        .list_maintenance(viewer(ListMaintenanceRequest {
            apartment_id: apartment_id.clone(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(listed.maintenance.is_empty());
}

#[tokio::test]
async fn enabling_billing_later_creates_invoice_once() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let apartment_id = create_apartment(&mut client, "M-303").await;
    create_contract(&mut client, &apartment_id, PaymentFrequency::Yearly, "6000").await;

    let created = client
        .create_maintenance(admin(maintenance(&apartment_id, "90", false)))
        .await
        .unwrap()
        .into_inner();
    assert!(created.invoice.is_none());
    let maintenance_id = created.maintenance.unwrap().maintenance_id;

    let updated = client
        .update_maintenance(admin(UpdateMaintenanceRequest {
            maintenance_id: maintenance_id.clone(),
            bill_to_tenant: Some(true),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    let invoice = updated.invoice.unwrap();
    assert_eq!(invoice.amount, "90.00");
    assert_eq!(updated.maintenance.unwrap().invoice_id, invoice.invoice_id);

    let status = client
        .update_maintenance(admin(UpdateMaintenanceRequest {
            maintenance_id,
            bill_to_tenant: Some(false),
            ..Default::default()
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_code(&status), "INVOICE_ALREADY_EXISTS");
}

#[tokio::test]
async fn deleting_maintenance_removes_unpaid_invoice_only() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let apartment_id = create_apartment(&mut client, "M-304").await;
    create_contract(&mut client, &apartment_id, PaymentFrequency::Yearly, "6000").await;

    // Unpaid: both go
    let unpaid = client
        .create_maintenance(admin(maintenance(&apartment_id, "60", true)))
        .await
        .unwrap()
        .into_inner();
    let unpaid_invoice = unpaid.invoice.unwrap().invoice_id;
    client
        .delete_maintenance(admin(DeleteMaintenanceRequest {
            maintenance_id: unpaid.maintenance.unwrap().maintenance_id,
        }))
        .await
        .unwrap();
    let status = client
        .get_invoice(viewer(GetInvoiceRequest {
            invoice_id: unpaid_invoice,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    // Paid: refused
    let paid = client
        .create_maintenance(admin(maintenance(&apartment_id, "60", true)))
        .await
        .unwrap()
        .into_inner();
    client
        .record_payment(admin(RecordPaymentRequest {
            invoice_id: paid.invoice.unwrap().invoice_id,
            amount: "20".to_string(),
            payment_date: format!("{}-02-10", start_year()),
            method: PaymentMethod::Cash as i32,
            description: String::new(),
        }))
        .await
        .unwrap();
    let status = client
        .delete_maintenance(admin(DeleteMaintenanceRequest {
            maintenance_id: paid.maintenance.unwrap().maintenance_id,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_code(&status), "LINKED_INVOICE_PAID");
}

#[tokio::test]
async fn provider_invoice_file_is_stored_under_uploads() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let apartment_id = create_apartment(&mut client, "M-305").await;

    let record = client
        .create_maintenance(admin(maintenance(&apartment_id, "45", false)))
        .await
        .unwrap()
        .into_inner()
        .maintenance
        .unwrap();

    let attached = client
        .attach_maintenance_invoice_file(admin(AttachMaintenanceInvoiceFileRequest {
            maintenance_id: record.maintenance_id,
            file_name: "plumber-receipt.pdf".to_string(),
            content: b"%PDF-1.4 receipt".to_vec(),
        }))
        .await
        .unwrap()
        .into_inner()
        .maintenance
        .unwrap();

    let path = attached.invoice_file_path;
    assert!(path.starts_with("maintenance-invoices/"));
    assert!(path.ends_with("plumber-receipt.pdf"));
    let stored = std::fs::read(app.uploads.path().join(&path)).unwrap();
    assert_eq!(stored, b"%PDF-1.4 receipt");
}
