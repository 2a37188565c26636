//! Tenant Data Model

use campus_common::TenantId;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Tenant (institute) definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant ID
    pub tenant_id: TenantId,
    /// Display name, unique across the system
    pub name: String,
    /// Business year start (optional)
    pub business_year_start: Option<NaiveDate>,
    /// Business year end (optional)
    pub business_year_end: Option<NaiveDate>,
    /// Lifecycle status
    pub status: TenantStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Create new tenant
    pub fn new(name: &str) -> Self {
        Self {
            tenant_id: Uuid::new_v4(),
            name: name.to_string(),
            business_year_start: None,
            business_year_end: None,
            status: TenantStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// Tenant status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenantStatus {
    /// Serving requests
    Active,
    /// Access disabled, data retained
    Suspended,
}

/// Tenant registry
pub struct TenantRegistry {
    tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
}

impl TenantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tenants: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create new tenant; names are unique
    pub fn create(&self, name: &str) -> Result<Tenant, TenantError> {
        let mut tenants = self.tenants.write();
        if tenants.values().any(|t| t.name == name) {
            return Err(TenantError::NameTaken(name.to_string()));
        }
        let tenant = Tenant::new(name);
        tenants.insert(tenant.tenant_id, tenant.clone());
        Ok(tenant)
    }

    /// Get tenant
    pub fn get(&self, tenant_id: &TenantId) -> Option<Tenant> {
        self.tenants.read().get(tenant_id).cloned()
    }

    /// List all tenants
    pub fn list(&self) -> Vec<Tenant> {
        self.tenants.read().values().cloned().collect()
    }

    /// Suspend tenant
    pub fn suspend(&self, tenant_id: &TenantId) -> Result<(), TenantError> {
        let mut tenants = self.tenants.write();
        let tenant = tenants.get_mut(tenant_id).ok_or(TenantError::NotFound)?;
        tenant.status = TenantStatus::Suspended;
        Ok(())
    }

    /// Get tenant count
    pub fn count(&self) -> usize {
        self.tenants.read().len()
    }
}

impl Default for TenantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tenant registry errors
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// No tenant with that ID
    #[error("tenant not found")]
    NotFound,
    /// Name already in use
    #[error("tenant name already taken: {0}")]
    NameTaken(String),
}
