//! gRPC utilities shared by the rental services.
//!
//! This module provides:
//! - Error conversion between `AppError` and `tonic::Status`
//! - Interceptors for trace context propagation
//! - The caller gate that resolves identity and role from request metadata

pub mod caller;
pub mod error;
pub mod interceptors;

pub use caller::{CallerContext, CallerGate, Role, USER_ID_KEY, USER_ROLE_KEY, extract_caller};
pub use error::{GrpcResult, IntoStatus};
pub use interceptors::{
    REQUEST_ID_KEY, extract_request_id, extract_traceparent, inject_trace_context,
    inject_trace_context_with_request_id, trace_context_interceptor,
};

// Re-export commonly used tonic types
pub use tonic::{Code, Request, Response, Status};
