//! Payment ledger integration tests: partial and full settlement, balance
//! guards, reversal and receipt listing.

mod common;

use common::{admin, create_apartment, create_contract, error_code, start_year, viewer, TestApp};
use leasing_service::grpc::proto::{
    leasing_service_client::LeasingServiceClient, DeletePaymentRequest, GetInvoiceRequest,
    InvoiceStatus, ListInvoicesRequest, ListPaymentsRequest, PaymentFrequency, PaymentMethod,
    RecordPaymentRequest, RecordPaymentResponse, UpdatePaymentRequest,
};
use tonic::transport::Channel;
use tonic::Code;

fn payment(invoice_id: &str, amount: &str) -> RecordPaymentRequest {
    RecordPaymentRequest {
        invoice_id: invoice_id.to_string(),
        amount: amount.to_string(),
        payment_date: format!("{}-01-10", start_year()),
        method: PaymentMethod::Cash as i32,
        description: "Front desk".to_string(),
    }
}

async fn pay(
    client: &mut LeasingServiceClient<Channel>,
    invoice_id: &str,
    amount: &str,
) -> Result<RecordPaymentResponse, tonic::Status> {
    client
        .record_payment(admin(payment(invoice_id, amount)))
        .await
        .map(|r| r.into_inner())
}

/// First invoice of a fresh quarterly contract worth 1000.00.
async fn quarterly_invoice(client: &mut LeasingServiceClient<Channel>, number: &str) -> String {
    let apartment_id = create_apartment(client, number).await;
    let created = create_contract(client, &apartment_id, PaymentFrequency::Quarterly, "4000").await;
    created
        .invoices
        .iter()
        .find(|i| i.period_index == Some(0))
        .expect("first period missing")
        .invoice_id
        .clone()
}

#[tokio::test]
async fn partial_then_full_payment_settles_invoice() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let invoice_id = quarterly_invoice(&mut client, "P-201").await;

    let first = pay(&mut client, &invoice_id, "400").await.unwrap();
    let receipt = first.payment.unwrap();
    assert!(receipt.receipt_number.starts_with("RCPT-"));
    assert_eq!(receipt.amount, "400.00");
    let invoice = first.invoice.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid as i32);
    assert_eq!(invoice.paid_amount, "400.00");
    assert_eq!(invoice.balance, "600.00");

    let second = pay(&mut client, &invoice_id, "600").await.unwrap();
    let invoice = second.invoice.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid as i32);
    assert_eq!(invoice.balance, "0.00");

    let fetched = client
        .get_invoice(viewer(GetInvoiceRequest {
            invoice_id: invoice_id.clone(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(fetched.payments.len(), 2);

    let paid = client
        .list_invoices(viewer(ListInvoicesRequest {
            status: InvoiceStatus::Paid as i32,
            page_size: 50,
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(paid.invoices.iter().any(|i| i.invoice_id == invoice_id));
}

#[tokio::test]
async fn payments_cannot_exceed_balance() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let invoice_id = quarterly_invoice(&mut client, "P-202").await;

    pay(&mut client, &invoice_id, "400").await.unwrap();

    let status = pay(&mut client, &invoice_id, "700").await.unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_code(&status), "AMOUNT_EXCEEDS_BALANCE");

    pay(&mut client, &invoice_id, "600").await.unwrap();

    let status = pay(&mut client, &invoice_id, "1").await.unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_code(&status), "ALREADY_PAID");
}

#[tokio::test]
async fn invalid_amounts_are_rejected() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let invoice_id = quarterly_invoice(&mut client, "P-203").await;

    let status = pay(&mut client, &invoice_id, "0").await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(error_code(&status), "INVALID_AMOUNT");

    let status = pay(&mut client, &invoice_id, "ten").await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let mut request = payment(&invoice_id, "10");
    request.method = PaymentMethod::Unspecified as i32;
    let status = client.record_payment(admin(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn deleting_payment_restores_balance() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let invoice_id = quarterly_invoice(&mut client, "P-204").await;

    let first = pay(&mut client, &invoice_id, "400").await.unwrap();
    pay(&mut client, &invoice_id, "600").await.unwrap();

    let reversed = client
        .delete_payment(admin(DeletePaymentRequest {
            payment_id: first.payment.unwrap().payment_id,
        }))
        .await
        .unwrap()
        .into_inner()
        .invoice
        .unwrap();

    assert_eq!(reversed.paid_amount, "600.00");
    assert_eq!(reversed.balance, "400.00");
    assert_eq!(reversed.status, InvoiceStatus::PartiallyPaid as i32);
}

#[tokio::test]
async fn payment_details_can_be_corrected() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let invoice_id = quarterly_invoice(&mut client, "P-205").await;
    let recorded = pay(&mut client, &invoice_id, "250").await.unwrap();
    let original = recorded.payment.unwrap();

    let updated = client
        .update_payment(admin(UpdatePaymentRequest {
            payment_id: original.payment_id.clone(),
            method: Some(PaymentMethod::BankTransfer as i32),
            payment_date: None,
            description: Some("Wire reference 8812".to_string()),
        }))
        .await
        .unwrap()
        .into_inner()
        .payment
        .unwrap();

    assert_eq!(updated.method, PaymentMethod::BankTransfer as i32);
    assert_eq!(updated.description, "Wire reference 8812");
    assert_eq!(updated.amount, original.amount);
    assert_eq!(updated.receipt_number, original.receipt_number);
}

#[tokio::test]
async fn list_payments_pages_through_receipts() {
    let app = TestApp::spawn().await;
    let mut client = app.grpc_client().await;
    let invoice_id = quarterly_invoice(&mut client, "P-206").await;

    for amount in ["100", "200", "300"] {
        pay(&mut client, &invoice_id, amount).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut token = String::new();
    loop {
        let page = client
            .list_payments(viewer(ListPaymentsRequest {
                invoice_id: invoice_id.clone(),
                page_size: 2,
                page_token: token.clone(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(page.payments.len() <= 2);
        seen.extend(page.payments.into_iter().map(|p| p.payment_id));
        if page.next_page_token.is_empty() {
            break;
        }
        token = page.next_page_token;
    }

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 3);
}
