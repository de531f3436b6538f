//! Caller identity and role gate for services behind the trusted frontend.
//!
//! The frontend authenticates the user and forwards the identity as gRPC
//! metadata (`x-user-id`, `x-user-role`). Services only check the role.
//! When enforcement is disabled every caller without identity headers is
//! treated as the `system` administrator, which keeps local tooling usable.

use tonic::{Request, Status};

/// Metadata key carrying the authenticated user id.
pub const USER_ID_KEY: &str = "x-user-id";

/// Metadata key carrying the authenticated user role.
pub const USER_ROLE_KEY: &str = "x-user-role";

/// Role attached to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Identity attached to an incoming request.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: String,
    pub role: Role,
}

impl CallerContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Gate that extracts the caller and enforces role requirements.
#[derive(Debug, Clone)]
pub struct CallerGate {
    enforced: bool,
}

impl CallerGate {
    /// Create a gate. With `enforced = false` missing identity headers fall
    /// back to the `system` administrator.
    pub fn new(enforced: bool) -> Self {
        if enforced {
            tracing::info!("Caller role enforcement enabled");
        } else {
            tracing::info!("Caller role enforcement disabled (trusted frontend model)");
        }
        Self { enforced }
    }

    /// Create a disabled gate.
    pub fn disabled() -> Self {
        Self { enforced: false }
    }

    /// Check if role enforcement is enabled.
    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Resolve the caller for a read-only operation.
    #[allow(clippy::result_large_err)]
    pub fn require_caller<T>(&self, request: &Request<T>) -> Result<CallerContext, Status> {
        match extract_caller(request) {
            Some(caller) => Ok(caller),
            None if !self.enforced => Ok(CallerContext {
                user_id: "system".to_string(),
                role: Role::Admin,
            }),
            None => Err(Status::unauthenticated("Missing caller identity")),
        }
    }

    /// Resolve the caller and require the admin role (all mutating operations).
    #[allow(clippy::result_large_err)]
    pub fn require_admin<T>(&self, request: &Request<T>) -> Result<CallerContext, Status> {
        let caller = self.require_caller(request)?;
        if !caller.is_admin() {
            tracing::warn!(
                user_id = %caller.user_id,
                role = caller.role.as_str(),
                "Permission denied: admin role required"
            );
            return Err(Status::permission_denied("Admin role required"));
        }
        Ok(caller)
    }
}

/// Extract caller identity from trusted frontend metadata.
pub fn extract_caller<T>(request: &Request<T>) -> Option<CallerContext> {
    let user_id = request
        .metadata()
        .get(USER_ID_KEY)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())?
        .to_string();

    let role = request
        .metadata()
        .get(USER_ROLE_KEY)
        .and_then(|v| v.to_str().ok())
        .map(Role::from_string)
        .unwrap_or(Role::User);

    Some(CallerContext { user_id, role })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(user: Option<&str>, role: Option<&str>) -> Request<()> {
        let mut request = Request::new(());
        if let Some(user) = user {
            request
                .metadata_mut()
                .insert(USER_ID_KEY, user.parse().unwrap());
        }
        if let Some(role) = role {
            request
                .metadata_mut()
                .insert(USER_ROLE_KEY, role.parse().unwrap());
        }
        request
    }

    #[test]
    fn test_disabled_gate_defaults_to_system_admin() {
        let gate = CallerGate::disabled();
        let caller = gate.require_admin(&request_with(None, None)).unwrap();
        assert_eq!(caller.user_id, "system");
        assert!(caller.is_admin());
    }

    #[test]
    fn test_enforced_gate_rejects_missing_identity() {
        let gate = CallerGate::new(true);
        let status = gate.require_caller(&request_with(None, None)).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn test_non_admin_cannot_mutate() {
        let gate = CallerGate::new(true);
        let request = request_with(Some("user-1"), Some("user"));
        assert!(gate.require_caller(&request).is_ok());
        let status = gate.require_admin(&request).unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }

    #[test]
    fn test_role_header_is_case_insensitive() {
        let gate = CallerGate::new(true);
        let caller = gate
            .require_admin(&request_with(Some("owner-7"), Some("ADMIN")))
            .unwrap();
        assert_eq!(caller.user_id, "owner-7");
        assert_eq!(caller.role, Role::Admin);
    }

    #[test]
    fn test_missing_role_header_is_plain_user() {
        let caller = extract_caller(&request_with(Some("user-2"), None)).unwrap();
        assert_eq!(caller.role, Role::User);
    }
}
