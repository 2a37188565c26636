//! OpenCampus Transactional Core
//!
//! The concurrency- and invariant-bearing core of the institute backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        REGISTRAR CORE                           │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │   Sequence   │  │   Periods    │  │  Lifecycle Machine   │  │
//! │  │  Allocator   │  │ T{YYYY}_{N}  │  │  append-only rows,   │  │
//! │  │  (PIN mint)  │  │ advisory-    │  │  one active per pair │  │
//! │  │              │  │ locked names │  │                      │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────┬───────────┘  │
//! │         │                 │                     │              │
//! │  ┌──────▼─────────────────▼─────────────────────▼───────────┐  │
//! │  │   Person Directory          Rollover Coordinator         │  │
//! │  │   dual duplicate guards     once per period, windowed    │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! │                                                                 │
//! │   Every read/write confined to the TenantContext bound to      │
//! │   the operation; post-commit notifications fire-and-forget.    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod lifecycle;
pub mod notify;
pub mod periods;
pub mod persons;
pub mod rollover;
pub mod sequence;

use campus_common::{AdvisoryLocks, OfferingId};
use campus_tenant::TenantContext;
use chrono::NaiveDate;
use std::sync::Arc;

pub use lifecycle::{ClassOffering, EnrollStatus, EnrollmentRow, LifecycleEngine, LifecycleError};
pub use notify::{Dispatcher, Notification, NotificationSink, SinkError, TracingSink};
pub use periods::{Period, PeriodDirectory, PeriodError};
pub use persons::{EmployeeRecord, PersonDirectory, PersonError, StudentRecord};
pub use rollover::{RolloverCoordinator, RolloverError, RolloverRecord, RolloverSummary};
pub use sequence::{CounterKey, SequenceAllocator, SequenceKind};

/// Wires the core services together and hosts the admission flows that
/// span more than one of them.
pub struct Registrar {
    /// Sequence counters
    pub sequences: Arc<SequenceAllocator>,
    /// Academic periods
    pub periods: Arc<PeriodDirectory>,
    /// Student/employee records
    pub persons: Arc<PersonDirectory>,
    /// Enrollment lifecycle
    pub lifecycle: Arc<LifecycleEngine>,
    /// Period rollover
    pub rollover: RolloverCoordinator,
    dispatcher: Dispatcher,
}

impl Registrar {
    /// Build the core over the given notification dispatcher
    pub fn new(dispatcher: Dispatcher) -> Self {
        let locks = Arc::new(AdvisoryLocks::new());
        let sequences = Arc::new(SequenceAllocator::new());
        let periods = Arc::new(PeriodDirectory::new(locks));
        let persons = Arc::new(PersonDirectory::new(sequences.clone(), periods.clone()));
        let lifecycle = Arc::new(LifecycleEngine::new(persons.clone(), periods.clone()));
        let rollover =
            RolloverCoordinator::new(lifecycle.clone(), periods.clone(), dispatcher.clone());
        Self {
            sequences,
            periods,
            persons,
            lifecycle,
            rollover,
            dispatcher,
        }
    }

    /// Build the core with the default tracing sink
    pub fn with_tracing_sink() -> Self {
        Self::new(Dispatcher::tracing())
    }

    /// Admit a student: duplicate guard, record creation with PIN mint,
    /// optional admissions enquiry in `offering`, welcome notification
    /// after the commit.
    ///
    /// The guard blocks when a same-named (either name order),
    /// same-birth-date student of the tenant holds an active Enquire,
    /// Accepted or Active status. This is deliberately a different
    /// policy than the employee one.
    pub fn admit_student(
        &self,
        ctx: &TenantContext,
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
        today: NaiveDate,
        offering: Option<OfferingId>,
    ) -> Result<StudentRecord, RegistrarError> {
        let like = self
            .persons
            .find_students_like(ctx, first_name, last_name, date_of_birth);
        if self.lifecycle.has_blocking_status(ctx, &like) {
            return Err(PersonError::DuplicateStudent.into());
        }

        let student = self
            .persons
            .create_student(ctx, first_name, last_name, date_of_birth, today)?;

        if let Some(offering) = offering {
            let effective = today.and_time(chrono::NaiveTime::MIN).and_utc();
            self.lifecycle
                .open_enquiry(ctx, student.id, offering, None, effective)?;
        }

        self.dispatcher.fire(Notification::Welcome {
            tenant: student.tenant,
            pin: student.pin.clone(),
            name: format!("{} {}", student.first_name, student.last_name),
        });
        Ok(student)
    }

    /// Hire an employee: the employee duplicate guard lives in the person
    /// directory (blocked only while a namesake is still employed).
    pub fn hire_employee(
        &self,
        ctx: &TenantContext,
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
        today: NaiveDate,
    ) -> Result<EmployeeRecord, RegistrarError> {
        Ok(self
            .persons
            .create_employee(ctx, first_name, last_name, date_of_birth, today)?)
    }
}

/// Errors from the cross-service admission flows
#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    /// Person record failure
    #[error(transparent)]
    Person(#[from] PersonError),
    /// Lifecycle failure
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
