//! LeasingService gRPC implementation.

use tonic::{Request, Response, Status};
use tracing::{error, info, instrument, warn};

use super::convert::{
    apartment_status_from_proto, apartment_to_proto, contract_to_proto, frequency_from_proto,
    invalid, invoice_status_from_proto, invoice_to_proto, maintenance_status_from_proto,
    maintenance_to_proto, method_from_proto, non_empty, page_token, parse_date, parse_decimal,
    parse_optional_date, parse_optional_uuid, parse_uuid, payment_to_proto,
};
use super::proto::{self, leasing_service_server::LeasingService};
use crate::domain::LeaseEngine;
use crate::error::{ErrorKind, LeaseError};
use crate::models::{
    ApartmentStatus, CreateApartment, CreateContract, CreateInvoice, CreateMaintenance,
    CreatePayment, ListApartmentsFilter, ListContractsFilter, ListInvoicesFilter,
    ListMaintenanceFilter, ListPaymentsFilter, MaintenanceStatus, PaymentFrequency,
    PaymentMethod, UpdateApartment, UpdateContract, UpdateInvoice, UpdateMaintenance,
    UpdatePayment,
};
use crate::services::metrics::{ERRORS_TOTAL, GRPC_REQUESTS_TOTAL, GRPC_REQUEST_DURATION};
use service_core::grpc::CallerGate;

/// LeasingService implementation.
pub struct LeasingServiceImpl {
    engine: LeaseEngine,
    gate: CallerGate,
}

impl LeasingServiceImpl {
    /// Create a new LeasingService instance.
    pub fn new(engine: LeaseEngine, gate: CallerGate) -> Self {
        Self { engine, gate }
    }

    /// Mutations need the admin role.
    #[allow(clippy::result_large_err)]
    fn authorize_admin<T>(&self, method: &str, request: &Request<T>) -> Result<(), Status> {
        self.gate
            .require_admin(request)
            .map(|_| ())
            .map_err(|status| rejected(method, status))
    }

    /// Reads need any known caller.
    #[allow(clippy::result_large_err)]
    fn authorize_caller<T>(&self, method: &str, request: &Request<T>) -> Result<(), Status> {
        self.gate
            .require_caller(request)
            .map(|_| ())
            .map_err(|status| rejected(method, status))
    }
}

fn rejected(method: &str, status: Status) -> Status {
    let label = match status.code() {
        tonic::Code::Unauthenticated => "unauthenticated",
        _ => "permission_denied",
    };
    GRPC_REQUESTS_TOTAL.with_label_values(&[method, label]).inc();
    status
}

/// Count, log and convert an engine failure.
fn engine_error(method: &str, err: LeaseError) -> Status {
    let kind = err.kind();
    if kind == ErrorKind::TransactionFailure {
        error!(method, code = err.code(), error = %err, "Leasing operation failed");
    } else {
        warn!(method, code = err.code(), error = %err, "Leasing operation rejected");
    }
    GRPC_REQUESTS_TOTAL
        .with_label_values(&[method, kind.as_str()])
        .inc();
    ERRORS_TOTAL.with_label_values(&[err.code()]).inc();
    err.into()
}

fn succeeded(method: &str) {
    GRPC_REQUESTS_TOTAL.with_label_values(&[method, "ok"]).inc();
}

#[tonic::async_trait]
impl LeasingService for LeasingServiceImpl {
    // =========================================================================
    // Apartments
    // =========================================================================

    #[instrument(skip(self, request), fields(number = %request.get_ref().number))]
    async fn create_apartment(
        &self,
        request: Request<proto::CreateApartmentRequest>,
    ) -> Result<Response<proto::CreateApartmentResponse>, Status> {
        const METHOD: &str = "CreateApartment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let status = if req.status == proto::ApartmentStatus::Unspecified as i32 {
            ApartmentStatus::Available
        } else {
            apartment_status_from_proto(req.status)
                .ok_or_else(|| invalid(METHOD, "Invalid apartment status".to_string()))?
        };

        let input = CreateApartment {
            number: req.number,
            location: req.location,
            level: Some(req.level),
            rooms: Some(req.rooms),
            amenities: req.amenities,
            status,
        };

        let apartment = self
            .engine
            .create_apartment(input)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(apartment_id = %apartment.apartment_id, "Apartment created");

        Ok(Response::new(proto::CreateApartmentResponse {
            apartment: Some(apartment_to_proto(&apartment)),
        }))
    }

    #[instrument(skip(self, request), fields(apartment_id = %request.get_ref().apartment_id))]
    async fn get_apartment(
        &self,
        request: Request<proto::GetApartmentRequest>,
    ) -> Result<Response<proto::GetApartmentResponse>, Status> {
        const METHOD: &str = "GetApartment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let apartment_id = parse_uuid(METHOD, "apartment_id", &req.apartment_id)?;
        let (apartment, active_contract) = self
            .engine
            .get_apartment(apartment_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::GetApartmentResponse {
            apartment: Some(apartment_to_proto(&apartment)),
            active_contract: active_contract.as_ref().map(contract_to_proto),
        }))
    }

    #[instrument(skip(self, request))]
    async fn list_apartments(
        &self,
        request: Request<proto::ListApartmentsRequest>,
    ) -> Result<Response<proto::ListApartmentsResponse>, Status> {
        const METHOD: &str = "ListApartments";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let filter = ListApartmentsFilter {
            status: apartment_status_from_proto(req.status),
            page_size: req.page_size,
            page_token: parse_optional_uuid(METHOD, "page_token", &req.page_token)?,
        };

        let page = self
            .engine
            .list_apartments(&filter)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::ListApartmentsResponse {
            apartments: page.items.iter().map(apartment_to_proto).collect(),
            next_page_token: page_token(page.next_page_token),
        }))
    }

    #[instrument(skip(self, request), fields(apartment_id = %request.get_ref().apartment_id))]
    async fn update_apartment(
        &self,
        request: Request<proto::UpdateApartmentRequest>,
    ) -> Result<Response<proto::UpdateApartmentResponse>, Status> {
        const METHOD: &str = "UpdateApartment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let apartment_id = parse_uuid(METHOD, "apartment_id", &req.apartment_id)?;
        let patch = UpdateApartment {
            number: req.number,
            location: req.location,
            level: req.level,
            rooms: req.rooms,
            amenities: req.replace_amenities.then_some(req.amenities),
            status: req
                .status
                .map(|value| {
                    apartment_status_from_proto(value)
                        .ok_or_else(|| invalid(METHOD, "Invalid apartment status".to_string()))
                })
                .transpose()?,
        };

        let apartment = self
            .engine
            .update_apartment(apartment_id, patch)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::UpdateApartmentResponse {
            apartment: Some(apartment_to_proto(&apartment)),
        }))
    }

    #[instrument(skip(self, request), fields(apartment_id = %request.get_ref().apartment_id))]
    async fn delete_apartment(
        &self,
        request: Request<proto::DeleteApartmentRequest>,
    ) -> Result<Response<proto::DeleteApartmentResponse>, Status> {
        const METHOD: &str = "DeleteApartment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let apartment_id = parse_uuid(METHOD, "apartment_id", &req.apartment_id)?;
        self.engine
            .delete_apartment(apartment_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::DeleteApartmentResponse {}))
    }

    // =========================================================================
    // Contracts
    // =========================================================================

    #[instrument(skip(self, request), fields(apartment_id = %request.get_ref().apartment_id))]
    async fn create_contract(
        &self,
        request: Request<proto::CreateContractRequest>,
    ) -> Result<Response<proto::CreateContractResponse>, Status> {
        const METHOD: &str = "CreateContract";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let frequency: PaymentFrequency = frequency_from_proto(req.payment_frequency)
            .ok_or_else(|| invalid(METHOD, "payment_frequency is required".to_string()))?;

        let input = CreateContract {
            apartment_id: parse_uuid(METHOD, "apartment_id", &req.apartment_id)?,
            tenant_name: req.tenant_name,
            tenant_phone: req.tenant_phone,
            tenant_id_image_path: non_empty(req.tenant_id_image_path),
            contract_file_path: non_empty(req.contract_file_path),
            duration_years: req.duration_years,
            payment_frequency: frequency.as_str().to_string(),
            start_date: parse_date(METHOD, "start_date", &req.start_date)?,
            end_date: parse_optional_date(METHOD, "end_date", &req.end_date)?,
            total_amount: parse_decimal(METHOD, "total_amount", &req.total_amount)?,
        };

        let (contract, invoices) = self
            .engine
            .create_contract(input)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(
            contract_id = %contract.contract_id,
            invoice_count = invoices.len(),
            "Contract created"
        );

        Ok(Response::new(proto::CreateContractResponse {
            contract: Some(contract_to_proto(&contract)),
            invoices: invoices.iter().map(invoice_to_proto).collect(),
        }))
    }

    #[instrument(skip(self, request), fields(contract_id = %request.get_ref().contract_id))]
    async fn get_contract(
        &self,
        request: Request<proto::GetContractRequest>,
    ) -> Result<Response<proto::GetContractResponse>, Status> {
        const METHOD: &str = "GetContract";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let contract_id = parse_uuid(METHOD, "contract_id", &req.contract_id)?;
        let (contract, invoices) = self
            .engine
            .get_contract(contract_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::GetContractResponse {
            contract: Some(contract_to_proto(&contract)),
            invoices: invoices.iter().map(invoice_to_proto).collect(),
        }))
    }

    #[instrument(skip(self, request))]
    async fn list_contracts(
        &self,
        request: Request<proto::ListContractsRequest>,
    ) -> Result<Response<proto::ListContractsResponse>, Status> {
        const METHOD: &str = "ListContracts";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let filter = ListContractsFilter {
            apartment_id: parse_optional_uuid(METHOD, "apartment_id", &req.apartment_id)?,
            is_active: req.is_active,
            page_size: req.page_size,
            page_token: parse_optional_uuid(METHOD, "page_token", &req.page_token)?,
        };

        let page = self
            .engine
            .list_contracts(&filter)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::ListContractsResponse {
            contracts: page.items.iter().map(contract_to_proto).collect(),
            next_page_token: page_token(page.next_page_token),
        }))
    }

    #[instrument(skip(self, request), fields(contract_id = %request.get_ref().contract_id))]
    async fn update_contract(
        &self,
        request: Request<proto::UpdateContractRequest>,
    ) -> Result<Response<proto::UpdateContractResponse>, Status> {
        const METHOD: &str = "UpdateContract";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let contract_id = parse_uuid(METHOD, "contract_id", &req.contract_id)?;
        let payment_frequency = req
            .payment_frequency
            .map(|value| {
                frequency_from_proto(value)
                    .map(|f| f.as_str().to_string())
                    .ok_or_else(|| invalid(METHOD, "Invalid payment_frequency".to_string()))
            })
            .transpose()?;

        let patch = UpdateContract {
            apartment_id: req
                .apartment_id
                .as_deref()
                .map(|id| parse_uuid(METHOD, "apartment_id", id))
                .transpose()?,
            tenant_name: req.tenant_name,
            tenant_phone: req.tenant_phone,
            duration_years: req.duration_years,
            payment_frequency,
            start_date: req
                .start_date
                .as_deref()
                .map(|d| parse_date(METHOD, "start_date", d))
                .transpose()?,
            end_date: req
                .end_date
                .as_deref()
                .map(|d| parse_date(METHOD, "end_date", d))
                .transpose()?,
            total_amount: req
                .total_amount
                .as_deref()
                .map(|a| parse_decimal(METHOD, "total_amount", a))
                .transpose()?,
            is_active: req.is_active,
        };

        let (contract, invoices) = self
            .engine
            .update_contract(contract_id, patch)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(contract_id = %contract.contract_id, "Contract updated");

        Ok(Response::new(proto::UpdateContractResponse {
            contract: Some(contract_to_proto(&contract)),
            invoices: invoices.iter().map(invoice_to_proto).collect(),
        }))
    }

    #[instrument(skip(self, request), fields(contract_id = %request.get_ref().contract_id))]
    async fn delete_contract(
        &self,
        request: Request<proto::DeleteContractRequest>,
    ) -> Result<Response<proto::DeleteContractResponse>, Status> {
        const METHOD: &str = "DeleteContract";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let contract_id = parse_uuid(METHOD, "contract_id", &req.contract_id)?;
        let deleted = self
            .engine
            .delete_contract(contract_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(%contract_id, deleted_invoices = deleted, "Contract deleted");

        Ok(Response::new(proto::DeleteContractResponse {
            deleted_invoice_count: deleted as i32,
        }))
    }

    #[instrument(skip(self, request), fields(contract_id = %request.get_ref().contract_id))]
    async fn attach_contract_file(
        &self,
        request: Request<proto::AttachContractFileRequest>,
    ) -> Result<Response<proto::AttachContractFileResponse>, Status> {
        const METHOD: &str = "AttachContractFile";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let contract_id = parse_uuid(METHOD, "contract_id", &req.contract_id)?;
        let contract = self
            .engine
            .attach_contract_file(contract_id, &req.file_name, req.content)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::AttachContractFileResponse {
            contract: Some(contract_to_proto(&contract)),
        }))
    }

    #[instrument(skip(self, request), fields(contract_id = %request.get_ref().contract_id))]
    async fn attach_tenant_id(
        &self,
        request: Request<proto::AttachTenantIdRequest>,
    ) -> Result<Response<proto::AttachTenantIdResponse>, Status> {
        const METHOD: &str = "AttachTenantId";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let contract_id = parse_uuid(METHOD, "contract_id", &req.contract_id)?;
        let contract = self
            .engine
            .attach_tenant_id(contract_id, &req.file_name, req.content)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::AttachTenantIdResponse {
            contract: Some(contract_to_proto(&contract)),
        }))
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    #[instrument(skip(self, request), fields(contract_id = %request.get_ref().contract_id))]
    async fn create_invoice(
        &self,
        request: Request<proto::CreateInvoiceRequest>,
    ) -> Result<Response<proto::CreateInvoiceResponse>, Status> {
        const METHOD: &str = "CreateInvoice";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let input = CreateInvoice {
            contract_id: parse_uuid(METHOD, "contract_id", &req.contract_id)?,
            amount: parse_decimal(METHOD, "amount", &req.amount)?,
            due_date: parse_date(METHOD, "due_date", &req.due_date)?,
            description: req.description,
        };

        let invoice = self
            .engine
            .create_invoice(input)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );

        Ok(Response::new(proto::CreateInvoiceResponse {
            invoice: Some(invoice_to_proto(&invoice)),
        }))
    }

    #[instrument(skip(self, request), fields(invoice_id = %request.get_ref().invoice_id))]
    async fn get_invoice(
        &self,
        request: Request<proto::GetInvoiceRequest>,
    ) -> Result<Response<proto::GetInvoiceResponse>, Status> {
        const METHOD: &str = "GetInvoice";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let invoice_id = parse_uuid(METHOD, "invoice_id", &req.invoice_id)?;
        let (invoice, payments) = self
            .engine
            .get_invoice(invoice_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::GetInvoiceResponse {
            invoice: Some(invoice_to_proto(&invoice)),
            payments: payments.iter().map(payment_to_proto).collect(),
        }))
    }

    #[instrument(skip(self, request))]
    async fn list_invoices(
        &self,
        request: Request<proto::ListInvoicesRequest>,
    ) -> Result<Response<proto::ListInvoicesResponse>, Status> {
        const METHOD: &str = "ListInvoices";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let filter = ListInvoicesFilter {
            contract_id: parse_optional_uuid(METHOD, "contract_id", &req.contract_id)?,
            apartment_id: parse_optional_uuid(METHOD, "apartment_id", &req.apartment_id)?,
            status: invoice_status_from_proto(req.status),
            page_size: req.page_size,
            page_token: parse_optional_uuid(METHOD, "page_token", &req.page_token)?,
        };

        let page = self
            .engine
            .list_invoices(&filter)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::ListInvoicesResponse {
            invoices: page.items.iter().map(invoice_to_proto).collect(),
            next_page_token: page_token(page.next_page_token),
        }))
    }

    #[instrument(skip(self, request), fields(invoice_id = %request.get_ref().invoice_id))]
    async fn update_invoice(
        &self,
        request: Request<proto::UpdateInvoiceRequest>,
    ) -> Result<Response<proto::UpdateInvoiceResponse>, Status> {
        const METHOD: &str = "UpdateInvoice";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let invoice_id = parse_uuid(METHOD, "invoice_id", &req.invoice_id)?;
        let patch = UpdateInvoice {
            amount: req
                .amount
                .as_deref()
                .map(|a| parse_decimal(METHOD, "amount", a))
                .transpose()?,
            due_date: req
                .due_date
                .as_deref()
                .map(|d| parse_date(METHOD, "due_date", d))
                .transpose()?,
            description: req.description,
        };

        let invoice = self
            .engine
            .update_invoice(invoice_id, patch)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::UpdateInvoiceResponse {
            invoice: Some(invoice_to_proto(&invoice)),
        }))
    }

    #[instrument(skip(self, request), fields(invoice_id = %request.get_ref().invoice_id))]
    async fn delete_invoice(
        &self,
        request: Request<proto::DeleteInvoiceRequest>,
    ) -> Result<Response<proto::DeleteInvoiceResponse>, Status> {
        const METHOD: &str = "DeleteInvoice";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let invoice_id = parse_uuid(METHOD, "invoice_id", &req.invoice_id)?;
        self.engine
            .delete_invoice(invoice_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(%invoice_id, "Invoice deleted");

        Ok(Response::new(proto::DeleteInvoiceResponse {}))
    }

    // =========================================================================
    // Payments
    // =========================================================================

    #[instrument(skip(self, request), fields(invoice_id = %request.get_ref().invoice_id))]
    async fn record_payment(
        &self,
        request: Request<proto::RecordPaymentRequest>,
    ) -> Result<Response<proto::RecordPaymentResponse>, Status> {
        const METHOD: &str = "RecordPayment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let method: PaymentMethod = method_from_proto(req.method)
            .ok_or_else(|| invalid(METHOD, "Payment method is required".to_string()))?;

        let input = CreatePayment {
            invoice_id: parse_uuid(METHOD, "invoice_id", &req.invoice_id)?,
            amount: parse_decimal(METHOD, "amount", &req.amount)?,
            payment_date: parse_date(METHOD, "payment_date", &req.payment_date)?,
            method,
            description: non_empty(req.description),
        };

        let (payment, invoice) = self
            .engine
            .record_payment(input)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(
            payment_id = %payment.payment_id,
            receipt_number = %payment.receipt_number,
            invoice_status = invoice.status().as_str(),
            "Payment recorded"
        );

        Ok(Response::new(proto::RecordPaymentResponse {
            payment: Some(payment_to_proto(&payment)),
            invoice: Some(invoice_to_proto(&invoice)),
        }))
    }

    #[instrument(skip(self, request), fields(payment_id = %request.get_ref().payment_id))]
    async fn get_payment(
        &self,
        request: Request<proto::GetPaymentRequest>,
    ) -> Result<Response<proto::GetPaymentResponse>, Status> {
        const METHOD: &str = "GetPayment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let payment_id = parse_uuid(METHOD, "payment_id", &req.payment_id)?;
        let payment = self
            .engine
            .get_payment(payment_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::GetPaymentResponse {
            payment: Some(payment_to_proto(&payment)),
        }))
    }

    #[instrument(skip(self, request))]
    async fn list_payments(
        &self,
        request: Request<proto::ListPaymentsRequest>,
    ) -> Result<Response<proto::ListPaymentsResponse>, Status> {
        const METHOD: &str = "ListPayments";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let filter = ListPaymentsFilter {
            invoice_id: parse_optional_uuid(METHOD, "invoice_id", &req.invoice_id)?,
            page_size: req.page_size,
            page_token: parse_optional_uuid(METHOD, "page_token", &req.page_token)?,
        };

        let page = self
            .engine
            .list_payments(&filter)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::ListPaymentsResponse {
            payments: page.items.iter().map(payment_to_proto).collect(),
            next_page_token: page_token(page.next_page_token),
        }))
    }

    #[instrument(skip(self, request), fields(payment_id = %request.get_ref().payment_id))]
    async fn update_payment(
        &self,
        request: Request<proto::UpdatePaymentRequest>,
    ) -> Result<Response<proto::UpdatePaymentResponse>, Status> {
        const METHOD: &str = "UpdatePayment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let payment_id = parse_uuid(METHOD, "payment_id", &req.payment_id)?;
        let patch = UpdatePayment {
            method: req
                .method
                .map(|value| {
                    method_from_proto(value)
                        .ok_or_else(|| invalid(METHOD, "Invalid payment method".to_string()))
                })
                .transpose()?,
            payment_date: req
                .payment_date
                .as_deref()
                .map(|d| parse_date(METHOD, "payment_date", d))
                .transpose()?,
            description: req.description,
        };

        let payment = self
            .engine
            .update_payment(payment_id, patch)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::UpdatePaymentResponse {
            payment: Some(payment_to_proto(&payment)),
        }))
    }

    #[instrument(skip(self, request), fields(payment_id = %request.get_ref().payment_id))]
    async fn delete_payment(
        &self,
        request: Request<proto::DeletePaymentRequest>,
    ) -> Result<Response<proto::DeletePaymentResponse>, Status> {
        const METHOD: &str = "DeletePayment";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let payment_id = parse_uuid(METHOD, "payment_id", &req.payment_id)?;
        let invoice = self
            .engine
            .delete_payment(payment_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(%payment_id, invoice_id = %invoice.invoice_id, "Payment reversed");

        Ok(Response::new(proto::DeletePaymentResponse {
            invoice: Some(invoice_to_proto(&invoice)),
        }))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    #[instrument(skip(self, request), fields(apartment_id = %request.get_ref().apartment_id))]
    async fn create_maintenance(
        &self,
        request: Request<proto::CreateMaintenanceRequest>,
    ) -> Result<Response<proto::CreateMaintenanceResponse>, Status> {
        const METHOD: &str = "CreateMaintenance";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let status = if req.status == proto::MaintenanceStatus::Unspecified as i32 {
            MaintenanceStatus::Pending
        } else {
            maintenance_status_from_proto(req.status)
                .ok_or_else(|| invalid(METHOD, "Invalid maintenance status".to_string()))?
        };

        let input = CreateMaintenance {
            apartment_id: parse_uuid(METHOD, "apartment_id", &req.apartment_id)?,
            description: req.description,
            cost: parse_decimal(METHOD, "cost", &req.cost)?,
            maintenance_date: parse_date(METHOD, "maintenance_date", &req.maintenance_date)?,
            completion_date: parse_optional_date(METHOD, "completion_date", &req.completion_date)?,
            provider_name: req.provider_name,
            provider_contact: req.provider_contact,
            provider_company: non_empty(req.provider_company),
            status,
            bill_to_tenant: req.bill_to_tenant,
        };

        let (maintenance, invoice) = self
            .engine
            .create_maintenance(input)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(
            maintenance_id = %maintenance.maintenance_id,
            billed = invoice.is_some(),
            "Maintenance recorded"
        );

        Ok(Response::new(proto::CreateMaintenanceResponse {
            maintenance: Some(maintenance_to_proto(&maintenance)),
            invoice: invoice.as_ref().map(invoice_to_proto),
        }))
    }

    #[instrument(skip(self, request), fields(maintenance_id = %request.get_ref().maintenance_id))]
    async fn get_maintenance(
        &self,
        request: Request<proto::GetMaintenanceRequest>,
    ) -> Result<Response<proto::GetMaintenanceResponse>, Status> {
        const METHOD: &str = "GetMaintenance";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let maintenance_id = parse_uuid(METHOD, "maintenance_id", &req.maintenance_id)?;
        let (maintenance, invoice) = self
            .engine
            .get_maintenance(maintenance_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::GetMaintenanceResponse {
            maintenance: Some(maintenance_to_proto(&maintenance)),
            invoice: invoice.as_ref().map(invoice_to_proto),
        }))
    }

    #[instrument(skip(self, request))]
    async fn list_maintenance(
        &self,
        request: Request<proto::ListMaintenanceRequest>,
    ) -> Result<Response<proto::ListMaintenanceResponse>, Status> {
        const METHOD: &str = "ListMaintenance";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_caller(METHOD, &request)?;
        let req = request.into_inner();

        let filter = ListMaintenanceFilter {
            apartment_id: parse_optional_uuid(METHOD, "apartment_id", &req.apartment_id)?,
            status: maintenance_status_from_proto(req.status),
            page_size: req.page_size,
            page_token: parse_optional_uuid(METHOD, "page_token", &req.page_token)?,
        };

        let page = self
            .engine
            .list_maintenance(&filter)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::ListMaintenanceResponse {
            maintenance: page.items.iter().map(maintenance_to_proto).collect(),
            next_page_token: page_token(page.next_page_token),
        }))
    }

    #[instrument(skip(self, request), fields(maintenance_id = %request.get_ref().maintenance_id))]
    async fn update_maintenance(
        &self,
        request: Request<proto::UpdateMaintenanceRequest>,
    ) -> Result<Response<proto::UpdateMaintenanceResponse>, Status> {
        const METHOD: &str = "UpdateMaintenance";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let maintenance_id = parse_uuid(METHOD, "maintenance_id", &req.maintenance_id)?;
        let patch = UpdateMaintenance {
            description: req.description,
            cost: req
                .cost
                .as_deref()
                .map(|c| parse_decimal(METHOD, "cost", c))
                .transpose()?,
            maintenance_date: req
                .maintenance_date
                .as_deref()
                .map(|d| parse_date(METHOD, "maintenance_date", d))
                .transpose()?,
            completion_date: req
                .completion_date
                .as_deref()
                .map(|d| parse_date(METHOD, "completion_date", d))
                .transpose()?,
            provider_name: req.provider_name,
            provider_contact: req.provider_contact,
            provider_company: req.provider_company,
            status: req
                .status
                .map(|value| {
                    maintenance_status_from_proto(value)
                        .ok_or_else(|| invalid(METHOD, "Invalid maintenance status".to_string()))
                })
                .transpose()?,
            bill_to_tenant: req.bill_to_tenant,
        };

        let (maintenance, invoice) = self
            .engine
            .update_maintenance(maintenance_id, patch)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::UpdateMaintenanceResponse {
            maintenance: Some(maintenance_to_proto(&maintenance)),
            invoice: invoice.as_ref().map(invoice_to_proto),
        }))
    }

    #[instrument(skip(self, request), fields(maintenance_id = %request.get_ref().maintenance_id))]
    async fn delete_maintenance(
        &self,
        request: Request<proto::DeleteMaintenanceRequest>,
    ) -> Result<Response<proto::DeleteMaintenanceResponse>, Status> {
        const METHOD: &str = "DeleteMaintenance";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let maintenance_id = parse_uuid(METHOD, "maintenance_id", &req.maintenance_id)?;
        self.engine
            .delete_maintenance(maintenance_id)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();
        info!(%maintenance_id, "Maintenance deleted");

        Ok(Response::new(proto::DeleteMaintenanceResponse {}))
    }

    #[instrument(skip(self, request), fields(maintenance_id = %request.get_ref().maintenance_id))]
    async fn attach_maintenance_invoice_file(
        &self,
        request: Request<proto::AttachMaintenanceInvoiceFileRequest>,
    ) -> Result<Response<proto::AttachMaintenanceInvoiceFileResponse>, Status> {
        const METHOD: &str = "AttachMaintenanceInvoiceFile";
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[METHOD])
            .start_timer();
        self.authorize_admin(METHOD, &request)?;
        let req = request.into_inner();

        let maintenance_id = parse_uuid(METHOD, "maintenance_id", &req.maintenance_id)?;
        let maintenance = self
            .engine
            .attach_maintenance_invoice_file(maintenance_id, &req.file_name, req.content)
            .await
            .map_err(|e| engine_error(METHOD, e))?;

        succeeded(METHOD);
        timer.observe_duration();

        Ok(Response::new(proto::AttachMaintenanceInvoiceFileResponse {
            maintenance: Some(maintenance_to_proto(&maintenance)),
        }))
    }
}
