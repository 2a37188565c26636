//! Typed Identifiers

use uuid::Uuid;

/// Tenant (institute) ID - the unit of data isolation
pub type TenantId = Uuid;

/// Person (student/employee) ID
pub type PersonId = Uuid;

/// Class-offering ID
pub type OfferingId = Uuid;

/// Academic period ID
pub type PeriodId = Uuid;
