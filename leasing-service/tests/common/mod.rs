//! Test helper module for leasing-service integration tests.
//!
//! Every test app runs over the in-memory store with uploads in a temp dir.

#![allow(dead_code)]

use chrono::{Datelike, Utc};
use leasing_service::config::{LeasingConfig, StoreBackend};
use leasing_service::grpc::proto::{
    leasing_service_client::LeasingServiceClient, CreateApartmentRequest,
    CreateContractRequest, CreateContractResponse, PaymentFrequency,
};
use leasing_service::services::{init_metrics, MemoryLeaseStore};
use leasing_service::startup::Application;
use service_core::config::Config as CoreConfig;
use service_core::grpc::{USER_ID_KEY, USER_ROLE_KEY};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tonic::transport::Channel;
use tonic::Request;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn,leasing_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub http_address: String,
    pub grpc_address: String,
    pub uploads: TempDir,
}

impl TestApp {
    /// Spawn a new test application on random ports with role enforcement on.
    pub async fn spawn() -> Self {
        init_tracing();
        init_metrics();

        let uploads = tempfile::tempdir().expect("Failed to create upload dir");
        let common = CoreConfig {
            port: 0,
            environment: "test".to_string(),
        };
        let mut config =
            LeasingConfig::from_lookup(common, |_| None).expect("Failed to build config");
        config.service_name = "leasing-service-test".to_string();
        config.log_level = "warn".to_string();
        config.store = StoreBackend::Memory;
        config.storage_path = uploads.path().to_path_buf();
        config.enforce_roles = true;

        let app = Application::build_with_store(config, Arc::new(MemoryLeaseStore::new()))
            .await
            .expect("Failed to build test application");

        let http_address = format!("http://127.0.0.1:{}", app.http_port());
        let grpc_address = format!("http://127.0.0.1:{}", app.grpc_port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            grpc_address,
            uploads,
        }
    }

    /// Create a gRPC client connected to this test app.
    pub async fn grpc_client(&self) -> LeasingServiceClient<Channel> {
        let mut attempts = 0;
        loop {
            match LeasingServiceClient::connect(self.grpc_address.clone()).await {
                Ok(client) => break client,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
            }
        }
    }
}

/// Request carrying admin caller metadata.
pub fn admin<T>(message: T) -> Request<T> {
    with_role(message, "admin")
}

/// Request carrying a non-admin caller.
pub fn viewer<T>(message: T) -> Request<T> {
    with_role(message, "user")
}

fn with_role<T>(message: T, role: &'static str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(USER_ID_KEY, "user-1".parse().unwrap());
    request
        .metadata_mut()
        .insert(USER_ROLE_KEY, role.parse().unwrap());
    request
}

/// Value of the `x-error-code` metadata on a failed call.
pub fn error_code(status: &tonic::Status) -> String {
    status
        .metadata()
        .get("x-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn create_apartment(client: &mut LeasingServiceClient<Channel>, number: &str) -> String {
    client
        .create_apartment(admin(CreateApartmentRequest {
            number: number.to_string(),
            location: "Block A".to_string(),
            level: 2,
            rooms: 3,
            amenities: vec!["parking".to_string()],
            status: 0,
        }))
        .await
        .expect("Failed to create apartment")
        .into_inner()
        .apartment
        .expect("apartment missing")
        .apartment_id
}

/// Contracts start on January 1st of next year so every period is still ahead.
pub fn start_year() -> i32 {
    Utc::now().year() + 1
}

pub fn contract_request(
    apartment_id: &str,
    frequency: PaymentFrequency,
    years: i32,
    total: &str,
) -> CreateContractRequest {
    CreateContractRequest {
        apartment_id: apartment_id.to_string(),
        tenant_name: "Amina Yusuf".to_string(),
        tenant_phone: "+254700000001".to_string(),
        tenant_id_image_path: String::new(),
        contract_file_path: String::new(),
        duration_years: years,
        payment_frequency: frequency as i32,
        start_date: format!("{}-01-01", start_year()),
        end_date: String::new(),
        total_amount: total.to_string(),
    }
}

pub async fn create_contract(
    client: &mut LeasingServiceClient<Channel>,
    apartment_id: &str,
    frequency: PaymentFrequency,
    total: &str,
) -> CreateContractResponse {
    client
        .create_contract(admin(contract_request(apartment_id, frequency, 1, total)))
        .await
        .expect("Failed to create contract")
        .into_inner()
}
