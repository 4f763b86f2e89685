//! Organization routing
//!
//! Every pipeline operation runs on behalf of exactly one organization.
//! Which one depends on who is calling: system-internal callers (the cron
//! scheduler, other services) act on a target organization they name
//! explicitly, while end users always act on their own organization.

use crate::suite::ExecutionType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization identifier for multi-tenant isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(pub String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrganizationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrganizationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of the caller of a pipeline operation
#[derive(Clone, Default)]
pub struct AuthContext {
    /// Organization the caller belongs to, absent for system callers
    pub caller_org_id: Option<String>,
    pub is_system_internal: bool,
    /// Bearer credential forwarded to downstream services
    pub jwt: String,
}

impl AuthContext {
    /// Context for an end user of `organization`
    pub fn user(organization: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            caller_org_id: Some(organization.into()),
            is_system_internal: false,
            jwt: jwt.into(),
        }
    }

    /// Context for a system-internal caller
    pub fn system(jwt: impl Into<String>) -> Self {
        Self {
            caller_org_id: None,
            is_system_internal: true,
            jwt: jwt.into(),
        }
    }
}

// The credential must never reach logs.
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("caller_org_id", &self.caller_org_id)
            .field("is_system_internal", &self.is_system_internal)
            .field("jwt", &"[REDACTED]")
            .finish()
    }
}

/// Routing validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("Target organization id is required for system-internal calls")]
    MissingTargetOrganization,

    #[error("Caller organization id is required for non-system calls")]
    MissingCallerOrganization,

    #[error("Automatic executions require a target organization id")]
    AutomaticWithoutTarget,
}

/// Resolve the organization an operation acts on
///
/// Runs before any I/O. Blank ids count as missing.
pub fn resolve_organization(
    auth: &AuthContext,
    target_org_id: Option<&str>,
    execution_type: Option<ExecutionType>,
) -> Result<OrganizationId, RoutingError> {
    let target = non_blank(target_org_id);
    let caller = non_blank(auth.caller_org_id.as_deref());

    let resolved = if auth.is_system_internal {
        target.ok_or(RoutingError::MissingTargetOrganization)?
    } else {
        caller.ok_or(RoutingError::MissingCallerOrganization)?
    };

    if execution_type == Some(ExecutionType::Automatic) && target.is_none() {
        return Err(RoutingError::AutomaticWithoutTarget);
    }

    Ok(OrganizationId::new(resolved))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
