//! OpenCampus Shared Substrate
//!
//! Typed identifiers and the named advisory-lock registry used by every
//! other crate in the workspace.

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod ids;
pub mod lock;

pub use ids::{OfferingId, PeriodId, PersonId, TenantId};
pub use lock::{AdvisoryGuard, AdvisoryLocks};
