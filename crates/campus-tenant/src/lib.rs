//! Multi-Tenant Isolation
//!
//! Every entity in the system belongs to exactly one tenant (institute).
//! This crate provides the tenant registry, the per-operation execution
//! context that confines reads and writes to the bound tenant, and the
//! optionally-scoped taxonomy store for rows that may be tenant-specific
//! or shared globally.

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod context;
pub mod model;
pub mod taxonomy;

pub use context::{AuthPrincipal, Capability, ContextError, Role, TenantContext};
pub use model::{Tenant, TenantError, TenantRegistry, TenantStatus};
pub use taxonomy::{FunctionTitle, TaxonomyStore};
