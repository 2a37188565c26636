//! Tenant Execution Context
//!
//! One `TenantContext` is resolved per operation from the authenticated
//! principal and passed explicitly to every scoped read/write. There is no
//! process-wide current tenant and no fallback tenant: an unbound context
//! reads the empty set and refuses every write.

use campus_common::TenantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated principal, as supplied by the external auth layer
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    /// User ID
    pub user_id: Uuid,
    /// Tenant the user belongs to, if any
    pub institute: Option<TenantId>,
    /// Authorization role
    pub role: Role,
}

/// Authorization role of a principal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// Platform operator, may touch global rows
    Superuser,
    /// Administers one institute
    InstituteAdmin,
    /// Regular staff member
    Staff,
    /// Read-only access
    ReadOnly,
}

/// Capabilities checked at the core's seams. Policy mapping roles to
/// capabilities lives here; enforcement points are in the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create/edit rows shared by all tenants
    ManageGlobalTaxonomy,
    /// Trigger the period rollover
    ExecuteRollover,
    /// Create/edit person records
    ManagePeople,
}

impl Role {
    /// Whether this role holds the capability
    pub fn can(&self, cap: Capability) -> bool {
        match self {
            Self::Superuser => true,
            Self::InstituteAdmin => matches!(
                cap,
                Capability::ExecuteRollover | Capability::ManagePeople
            ),
            Self::Staff => matches!(cap, Capability::ManagePeople),
            Self::ReadOnly => false,
        }
    }
}

/// Per-operation tenant binding
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    tenant: Option<TenantId>,
}

impl TenantContext {
    /// Resolve the context from the authenticated principal. Principals
    /// without an institute produce an unbound context.
    pub fn resolve(principal: &AuthPrincipal) -> Self {
        Self {
            tenant: principal.institute,
        }
    }

    /// Context bound directly to a tenant (bootstrap and tests)
    pub fn for_tenant(tenant: TenantId) -> Self {
        Self {
            tenant: Some(tenant),
        }
    }

    /// Context with no tenant bound
    pub fn unbound() -> Self {
        Self { tenant: None }
    }

    /// The bound tenant, if any. Scoped reads filter on this and yield
    /// the empty set when unbound.
    pub fn bound(&self) -> Option<TenantId> {
        self.tenant
    }

    /// The bound tenant, required. Scoped writes call this first.
    pub fn require(&self) -> Result<TenantId, ContextError> {
        self.tenant.ok_or(ContextError::NoTenant)
    }

    /// Reject any row that belongs to a different tenant than the one
    /// bound here. Cross-tenant references are a write-time error.
    pub fn check_owned(&self, row_tenant: TenantId) -> Result<(), ContextError> {
        let bound = self.require()?;
        if bound != row_tenant {
            return Err(ContextError::ForeignTenant);
        }
        Ok(())
    }
}

/// Context binding errors - always a configuration or programming defect,
/// never tolerated with a fallback.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    /// Scoped write attempted with no tenant bound
    #[error("no tenant bound to the current operation")]
    NoTenant,
    /// Row belongs to a different tenant
    #[error("row belongs to a different tenant")]
    ForeignTenant,
    /// Caller lacks the required capability
    #[error("caller is not authorized for this operation")]
    NotAuthorized,
}
