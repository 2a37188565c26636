//! Person Directory
//!
//! Student and employee records. The entry/exit date fields are
//! denormalized enrollment-window markers mutated only by lifecycle side
//! effects, never by direct edit.
//!
//! The two duplicate-detection policies differ on purpose and are kept
//! independent: an employee blocks re-creation only while still employed,
//! while a student blocks on an active Enquire/Accepted/Active status
//! (that check lives in the lifecycle engine and is applied by the
//! admission flow in `lib.rs`).

use crate::periods::PeriodError;
use crate::sequence::{SequenceAllocator, SequenceKind};
use crate::PeriodDirectory;
use campus_common::{PersonId, TenantId};
use campus_tenant::{ContextError, TenantContext};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Student record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Person ID
    pub id: PersonId,
    /// Owning tenant
    pub tenant: TenantId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Date of birth
    pub date_of_birth: NaiveDate,
    /// Generated student PIN, immutable
    pub pin: String,
    /// Enrollment window open marker
    pub entry_date: Option<NaiveDate>,
    /// Enrollment window close marker
    pub exit_date: Option<NaiveDate>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Employee record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// Person ID
    pub id: PersonId,
    /// Owning tenant
    pub tenant: TenantId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Date of birth
    pub date_of_birth: NaiveDate,
    /// Generated employee PIN, immutable
    pub pin: String,
    /// Employment start marker
    pub entry_date: Option<NaiveDate>,
    /// Employment end marker
    pub exit_date: Option<NaiveDate>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Name match in either order: people get registered with first and last
/// name swapped often enough that both orders count as the same person.
fn same_person_like(first: &str, last: &str, a_first: &str, a_last: &str) -> bool {
    let direct = a_first.trim().eq_ignore_ascii_case(first.trim())
        && a_last.trim().eq_ignore_ascii_case(last.trim());
    let swapped = a_first.trim().eq_ignore_ascii_case(last.trim())
        && a_last.trim().eq_ignore_ascii_case(first.trim());
    direct || swapped
}

/// Store for student and employee records
pub struct PersonDirectory {
    students: Arc<RwLock<HashMap<PersonId, StudentRecord>>>,
    employees: Arc<RwLock<HashMap<PersonId, EmployeeRecord>>>,
    sequences: Arc<SequenceAllocator>,
    periods: Arc<PeriodDirectory>,
}

impl PersonDirectory {
    /// Create an empty directory wired to the sequence allocator and the
    /// period directory (the student PIN carries a period number).
    pub fn new(sequences: Arc<SequenceAllocator>, periods: Arc<PeriodDirectory>) -> Self {
        Self {
            students: Arc::new(RwLock::new(HashMap::new())),
            employees: Arc::new(RwLock::new(HashMap::new())),
            sequences,
            periods,
        }
    }

    /// Create a student record, minting its PIN. The period number comes
    /// from the period closest to `today`; the admission flow applies the
    /// status-based duplicate guard before calling this.
    pub fn create_student(
        &self,
        ctx: &TenantContext,
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
        today: NaiveDate,
    ) -> Result<StudentRecord, PersonError> {
        let tenant = ctx.require()?;

        let period = self.periods.nearest(ctx, today)?;
        let period_number = period.period_number().unwrap_or(1);
        let year2 = SequenceAllocator::year2(today);
        let ordinal =
            self.sequences
                .next_ordinal(ctx, SequenceKind::Student, year2, Some(period_number))?;

        let student = StudentRecord {
            id: Uuid::new_v4(),
            tenant,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            date_of_birth,
            pin: SequenceAllocator::student_pin(year2, period_number, ordinal),
            entry_date: None,
            exit_date: None,
            created_at: Utc::now(),
        };
        self.students.write().insert(student.id, student.clone());
        Ok(student)
    }

    /// Create an employee record, minting its PIN. Blocked while another
    /// employee with the same name and date of birth is still employed
    /// (exit date unset).
    pub fn create_employee(
        &self,
        ctx: &TenantContext,
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
        today: NaiveDate,
    ) -> Result<EmployeeRecord, PersonError> {
        let tenant = ctx.require()?;

        let mut employees = self.employees.write();
        let blocked = employees.values().any(|e| {
            e.tenant == tenant
                && e.date_of_birth == date_of_birth
                && e.exit_date.is_none()
                && same_person_like(first_name, last_name, &e.first_name, &e.last_name)
        });
        if blocked {
            return Err(PersonError::DuplicateEmployee);
        }

        let year2 = SequenceAllocator::year2(today);
        let ordinal = self
            .sequences
            .next_ordinal(ctx, SequenceKind::Employee, year2, None)?;

        let employee = EmployeeRecord {
            id: Uuid::new_v4(),
            tenant,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            date_of_birth,
            pin: SequenceAllocator::employee_pin(year2, ordinal),
            entry_date: None,
            exit_date: None,
            created_at: Utc::now(),
        };
        employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    /// IDs of the bound tenant's students matching (first, last, dob),
    /// case-insensitively and in either name order. Input to the
    /// admission duplicate guard.
    pub fn find_students_like(
        &self,
        ctx: &TenantContext,
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
    ) -> Vec<PersonId> {
        let Some(bound) = ctx.bound() else {
            return Vec::new();
        };
        self.students
            .read()
            .values()
            .filter(|s| {
                s.tenant == bound
                    && s.date_of_birth == date_of_birth
                    && same_person_like(first_name, last_name, &s.first_name, &s.last_name)
            })
            .map(|s| s.id)
            .collect()
    }

    /// Get a student, confined to the bound tenant
    pub fn get_student(&self, ctx: &TenantContext, id: &PersonId) -> Option<StudentRecord> {
        let bound = ctx.bound()?;
        self.students
            .read()
            .get(id)
            .filter(|s| s.tenant == bound)
            .cloned()
    }

    /// Get an employee, confined to the bound tenant
    pub fn get_employee(&self, ctx: &TenantContext, id: &PersonId) -> Option<EmployeeRecord> {
        let bound = ctx.bound()?;
        self.employees
            .read()
            .get(id)
            .filter(|e| e.tenant == bound)
            .cloned()
    }

    /// Whether the person exists under the tenant (as student or employee)
    pub fn owns(&self, tenant: TenantId, person: &PersonId) -> bool {
        self.students
            .read()
            .get(person)
            .map(|s| s.tenant == tenant)
            .unwrap_or(false)
            || self
                .employees
                .read()
                .get(person)
                .map(|e| e.tenant == tenant)
                .unwrap_or(false)
    }

    /// Lifecycle side effect: entering Active opens the enrollment window.
    /// Sets the entry date if unset and clears any exit date.
    pub fn open_window(&self, person: &PersonId, date: NaiveDate) {
        if let Some(s) = self.students.write().get_mut(person) {
            s.entry_date.get_or_insert(date);
            s.exit_date = None;
            return;
        }
        if let Some(e) = self.employees.write().get_mut(person) {
            e.entry_date.get_or_insert(date);
            e.exit_date = None;
        }
    }

    /// Lifecycle side effect: a terminal outcome closes the window with
    /// the class-offering's end date.
    pub fn close_window(&self, person: &PersonId, date: NaiveDate) {
        if let Some(s) = self.students.write().get_mut(person) {
            s.exit_date = Some(date);
            return;
        }
        if let Some(e) = self.employees.write().get_mut(person) {
            e.exit_date = Some(date);
        }
    }
}

/// Person record errors
#[derive(Debug, thiserror::Error)]
pub enum PersonError {
    /// Context binding failure
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Student PIN needs a period to resolve its period number
    #[error(transparent)]
    Period(#[from] PeriodError),
    /// A same-named student with an active admissions or enrollment status exists
    #[error("a student with the same name and birth date is already in the admissions funnel")]
    DuplicateStudent,
    /// A same-named employee is still employed
    #[error("an employee with the same name and birth date is still employed")]
    DuplicateEmployee,
    /// Person not found under the bound tenant
    #[error("person not found")]
    UnknownPerson,
}
