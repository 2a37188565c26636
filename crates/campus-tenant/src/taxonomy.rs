//! Optionally-Scoped Taxonomy
//!
//! Staff function titles may be tenant-specific or shared globally
//! (`tenant: None`). Scoped reads return the union of the bound tenant's
//! rows and the global rows; this union is an explicit method, never an
//! implicit default on every query.

use crate::context::{Capability, ContextError, Role, TenantContext};
use campus_common::TenantId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Default global titles seeded at process start
pub const DEFAULT_TITLES: &[&str] = &["Instructor", "Administrator", "Accountant"];

/// A staff function title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionTitle {
    /// Row ID
    pub id: Uuid,
    /// Owning tenant; `None` means shared globally
    pub tenant: Option<TenantId>,
    /// Title text, unique within its scope
    pub name: String,
}

/// Store for optionally-scoped function titles
pub struct TaxonomyStore {
    titles: Arc<RwLock<Vec<FunctionTitle>>>,
}

impl TaxonomyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            titles: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Idempotent bootstrap: create-if-missing the default global titles.
    /// Invoked once at process start; safe to call repeatedly.
    pub fn bootstrap_defaults(&self) {
        let mut titles = self.titles.write();
        for name in DEFAULT_TITLES {
            if titles.iter().any(|t| t.tenant.is_none() && t.name == *name) {
                continue;
            }
            titles.push(FunctionTitle {
                id: Uuid::new_v4(),
                tenant: None,
                name: name.to_string(),
            });
            tracing::info!(title = name, "seeded default function title");
        }
    }

    /// Union read: {rows of the bound tenant} ∪ {global rows}. An unbound
    /// context sees only the global rows.
    pub fn list_for(&self, ctx: &TenantContext) -> Vec<FunctionTitle> {
        let bound = ctx.bound();
        self.titles
            .read()
            .iter()
            .filter(|t| t.tenant.is_none() || t.tenant == bound)
            .cloned()
            .collect()
    }

    /// Create a tenant-scoped title
    pub fn create_scoped(
        &self,
        ctx: &TenantContext,
        name: &str,
    ) -> Result<FunctionTitle, ContextError> {
        let tenant = ctx.require()?;
        self.insert(Some(tenant), name)
    }

    /// Create a global title. Writes to the global subset require the
    /// elevated capability.
    pub fn create_global(&self, role: Role, name: &str) -> Result<FunctionTitle, ContextError> {
        if !role.can(Capability::ManageGlobalTaxonomy) {
            return Err(ContextError::NotAuthorized);
        }
        self.insert(None, name)
    }

    fn insert(
        &self,
        tenant: Option<TenantId>,
        name: &str,
    ) -> Result<FunctionTitle, ContextError> {
        let mut titles = self.titles.write();
        // Unique within scope; global duplicates are treated as the
        // create-if-missing no-op the bootstrap relies on.
        if let Some(existing) = titles
            .iter()
            .find(|t| t.tenant == tenant && t.name == name)
        {
            return Ok(existing.clone());
        }
        let title = FunctionTitle {
            id: Uuid::new_v4(),
            tenant,
            name: name.to_string(),
        };
        titles.push(title.clone());
        Ok(title)
    }
}

impl Default for TaxonomyStore {
    fn default() -> Self {
        Self::new()
    }
}
