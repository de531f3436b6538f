//! gRPC module for leasing-service.

mod convert;
mod service;

pub use service::LeasingServiceImpl;
pub use service_core::grpc::{trace_context_interceptor, CallerGate};

/// Generated protobuf code.
pub mod proto {
    tonic::include_proto!("rentals.leasing.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("leasing_descriptor");
}
