//! Enrollment Lifecycle State Machine
//!
//! Gates and records status transitions for a person's participation in
//! one class-offering. Status history is append-only: a transition always
//! means inserting a new row and flipping the previous active row's flag
//! in the same critical section; no row is otherwise mutated after
//! creation. At most one row per (tenant, person, offering) is active.

use crate::periods::PeriodDirectory;
use crate::persons::PersonDirectory;
use campus_common::{OfferingId, PeriodId, PersonId, TenantId};
use campus_tenant::{ContextError, TenantContext};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Enrollment status codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnrollStatus {
    /// Admissions enquiry received
    Enquire,
    /// Accepted, not yet enrolled
    Accepted,
    /// Accepted but never turned up (terminal)
    NoShow,
    /// Enrolled and attending
    Active,
    /// Repeating the offering
    Retake,
    /// Failed the offering
    Failed,
    /// Graduated (terminal)
    Graduate,
    /// Dropped out (terminal)
    DropOut,
    /// Expelled (terminal)
    Expelled,
    /// Application rejected (terminal)
    NotAccepted,
}

impl EnrollStatus {
    /// Terminal states have no outgoing transitions within the same
    /// class-offering.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Graduate | Self::DropOut | Self::Expelled | Self::NotAccepted | Self::NoShow
        )
    }

    /// In-funnel statuses: a person holding one of these actively is
    /// either applying or enrolled, so the student duplicate guard
    /// blocks re-admission. NoShow does not count; a no-show may apply
    /// again.
    pub fn blocks_readmission(&self) -> bool {
        matches!(self, Self::Enquire | Self::Accepted | Self::Active)
    }

    /// Allowed-transition check keyed by the previous status of the same
    /// (person, offering) pair. Absent previous means first enrollment:
    /// only `Active` is allowed.
    pub fn can_transition(prev: Option<EnrollStatus>, next: EnrollStatus) -> bool {
        use EnrollStatus::*;
        match prev {
            None => next == Active,
            Some(s) if s.is_terminal() => false,
            Some(Enquire) => matches!(next, Accepted | NotAccepted | DropOut),
            Some(Accepted) => matches!(next, Active | NoShow | DropOut),
            Some(Active) => matches!(next, Retake | Failed | Graduate | DropOut | Expelled),
            Some(Retake) => matches!(next, Active | Failed | Graduate | DropOut | Expelled),
            Some(Failed) => matches!(next, Retake | DropOut),
            Some(_) => false,
        }
    }
}

/// One immutable status history row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRow {
    /// Monotonic row ID, tiebreaker for latest-row ordering
    pub id: u64,
    /// Owning tenant
    pub tenant: TenantId,
    /// Person the status belongs to
    pub person: PersonId,
    /// Class-offering the status is scoped to
    pub offering: OfferingId,
    /// Status code
    pub status: EnrollStatus,
    /// Current-pointer flag; flipped to false when superseded
    pub is_active: bool,
    /// Free-text note
    pub note: Option<String>,
    /// When the status takes effect
    pub effective_at: DateTime<Utc>,
}

/// A specific instance of a course a person can be enrolled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassOffering {
    /// Offering ID
    pub id: OfferingId,
    /// Owning tenant
    pub tenant: TenantId,
    /// Display name
    pub name: String,
    /// Period the offering runs in
    pub period: PeriodId,
}

/// State machine and status history store.
///
/// The store-wide write latch is the transaction boundary: validation and
/// all mutation steps of one transition run inside a single critical
/// section, so concurrent transitions for the same pair are serialized
/// and a failed validation leaves the prior active row untouched.
pub struct LifecycleEngine {
    rows: Arc<RwLock<Vec<EnrollmentRow>>>,
    next_row_id: AtomicU64,
    offerings: Arc<RwLock<HashMap<OfferingId, ClassOffering>>>,
    persons: Arc<PersonDirectory>,
    periods: Arc<PeriodDirectory>,
}

impl LifecycleEngine {
    /// Create an engine over the given person and period directories
    pub fn new(persons: Arc<PersonDirectory>, periods: Arc<PeriodDirectory>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            next_row_id: AtomicU64::new(1),
            offerings: Arc::new(RwLock::new(HashMap::new())),
            persons,
            periods,
        }
    }

    /// Register a class-offering under the bound tenant
    pub fn register_offering(
        &self,
        ctx: &TenantContext,
        name: &str,
        period: PeriodId,
    ) -> Result<ClassOffering, LifecycleError> {
        let tenant = ctx.require()?;
        if self.periods.get(ctx, &period).is_none() {
            return Err(LifecycleError::UnknownPeriod);
        }
        let offering = ClassOffering {
            id: Uuid::new_v4(),
            tenant,
            name: name.to_string(),
            period,
        };
        self.offerings.write().insert(offering.id, offering.clone());
        Ok(offering)
    }

    /// Get an offering, confined to the bound tenant
    pub fn get_offering(&self, ctx: &TenantContext, id: &OfferingId) -> Option<ClassOffering> {
        let bound = ctx.bound()?;
        self.offerings
            .read()
            .get(id)
            .filter(|o| o.tenant == bound)
            .cloned()
    }

    /// Apply a status transition for (person, offering). All five steps -
    /// read latest, validate, flip previous, insert, person side effects -
    /// are one atomic unit; validation failure mutates nothing.
    pub fn apply_transition(
        &self,
        ctx: &TenantContext,
        person: PersonId,
        offering: OfferingId,
        new_status: EnrollStatus,
        note: Option<&str>,
        effective_at: DateTime<Utc>,
    ) -> Result<EnrollmentRow, LifecycleError> {
        let tenant = ctx.require()?;
        let off = self
            .get_offering(ctx, &offering)
            .ok_or(LifecycleError::UnknownOffering)?;
        if !self.persons.owns(tenant, &person) {
            return Err(LifecycleError::UnknownPerson);
        }

        let mut rows = self.rows.write();

        let prev = latest_index(&rows, tenant, &person, &offering);
        let prev_status = prev.map(|i| rows[i].status);
        if !EnrollStatus::can_transition(prev_status, new_status) {
            return Err(LifecycleError::InvalidTransition {
                from: prev_status,
                to: new_status,
            });
        }

        // Mutation phase: infallible from here on
        if let Some(i) = prev {
            if rows[i].is_active {
                rows[i].is_active = false;
            }
        }
        let row = self.push_row(&mut rows, tenant, person, offering, new_status, note, effective_at);

        match new_status {
            // Retake clears any exit date left by a preceding Failed
            EnrollStatus::Active | EnrollStatus::Retake => {
                self.persons.open_window(&person, effective_at.date_naive());
            }
            // Failed closes the window like a terminal outcome, but the
            // person may still come back via Retake
            s if s == EnrollStatus::Failed || s.is_terminal() => {
                let end = self
                    .periods
                    .get(ctx, &off.period)
                    .map(|p| p.end_date)
                    .unwrap_or_else(|| effective_at.date_naive());
                self.persons.close_window(&person, end);
            }
            _ => {}
        }

        Ok(row)
    }

    /// Admissions intake: create the initial `Enquire` row directly,
    /// outside the transition gate. Fails once the pair has any history.
    pub fn open_enquiry(
        &self,
        ctx: &TenantContext,
        person: PersonId,
        offering: OfferingId,
        note: Option<&str>,
        effective_at: DateTime<Utc>,
    ) -> Result<EnrollmentRow, LifecycleError> {
        let tenant = ctx.require()?;
        let off = self
            .get_offering(ctx, &offering)
            .ok_or(LifecycleError::UnknownOffering)?;
        if !self.persons.owns(tenant, &person) {
            return Err(LifecycleError::UnknownPerson);
        }

        let mut rows = self.rows.write();
        if latest_index(&rows, tenant, &person, &offering).is_some() {
            return Err(LifecycleError::AlreadyEnrolled);
        }
        let row = self.push_row(
            &mut rows,
            tenant,
            person,
            offering,
            EnrollStatus::Enquire,
            note,
            effective_at,
        );

        // An enquiry already marks the person's entry with the class start
        if let Some(p) = self.periods.get(ctx, &off.period) {
            self.persons.open_window(&person, p.start_date);
        }
        Ok(row)
    }

    /// Second life: a person terminal in offering A may be granted
    /// `Active` in a different offering B. Validates the overall latest
    /// status (across all offerings) is terminal and that B differs.
    /// The `Active` row is inserted directly, bypassing the per-pair
    /// transition table: any active row the person still holds in B
    /// (a stale enquiry, say) is deactivated rather than consulted.
    pub fn grant_second_life(
        &self,
        ctx: &TenantContext,
        person: PersonId,
        offering_b: OfferingId,
        note: Option<&str>,
        effective_at: DateTime<Utc>,
    ) -> Result<EnrollmentRow, LifecycleError> {
        let tenant = ctx.require()?;
        if self.get_offering(ctx, &offering_b).is_none() {
            return Err(LifecycleError::UnknownOffering);
        }
        if !self.persons.owns(tenant, &person) {
            return Err(LifecycleError::UnknownPerson);
        }

        let mut rows = self.rows.write();
        let overall =
            overall_latest(&rows, tenant, &person).map(|r| (r.status, r.offering));
        let (status, terminated_in) = overall.ok_or(LifecycleError::NotTerminal)?;
        if !status.is_terminal() {
            return Err(LifecycleError::NotTerminal);
        }
        if terminated_in == offering_b {
            return Err(LifecycleError::SameOffering);
        }

        if let Some(i) = latest_index(&rows, tenant, &person, &offering_b) {
            if rows[i].is_active {
                rows[i].is_active = false;
            }
        }
        let row = self.push_row(
            &mut rows,
            tenant,
            person,
            offering_b,
            EnrollStatus::Active,
            note,
            effective_at,
        );
        self.persons.open_window(&person, effective_at.date_naive());
        Ok(row)
    }

    /// Full status history for a pair, newest first
    pub fn history(
        &self,
        ctx: &TenantContext,
        person: &PersonId,
        offering: &OfferingId,
    ) -> Vec<EnrollmentRow> {
        let Some(bound) = ctx.bound() else {
            return Vec::new();
        };
        let mut out: Vec<EnrollmentRow> = self
            .rows
            .read()
            .iter()
            .filter(|r| r.tenant == bound && r.person == *person && r.offering == *offering)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        out
    }

    /// The active row for a pair, if any
    pub fn active_row(
        &self,
        ctx: &TenantContext,
        person: &PersonId,
        offering: &OfferingId,
    ) -> Option<EnrollmentRow> {
        let bound = ctx.bound()?;
        self.rows
            .read()
            .iter()
            .find(|r| {
                r.tenant == bound && r.person == *person && r.offering == *offering && r.is_active
            })
            .cloned()
    }

    /// Whether any of the given persons holds an active Enquire,
    /// Accepted or Active status. The student duplicate guard's
    /// predicate.
    pub fn has_blocking_status(&self, ctx: &TenantContext, persons: &[PersonId]) -> bool {
        let Some(bound) = ctx.bound() else {
            return false;
        };
        let set: HashSet<&PersonId> = persons.iter().collect();
        self.rows.read().iter().any(|r| {
            r.tenant == bound
                && r.is_active
                && r.status.blocks_readmission()
                && set.contains(&r.person)
        })
    }

    /// Bulk advance for the rollover coordinator: every pair of the bound
    /// tenant whose latest-active row is `Active` gets that row flipped
    /// and a fresh `Active` row for the same offering effective at
    /// `effective`. Runs as one critical section; returns the moved count.
    pub fn roll_active(
        &self,
        ctx: &TenantContext,
        effective: NaiveDate,
    ) -> Result<u32, LifecycleError> {
        let tenant = ctx.require()?;
        let effective_at = effective
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();

        let mut rows = self.rows.write();
        let pairs: HashSet<(PersonId, OfferingId)> = rows
            .iter()
            .filter(|r| r.tenant == tenant)
            .map(|r| (r.person, r.offering))
            .collect();

        let mut to_move = Vec::new();
        for (person, offering) in pairs {
            if let Some(i) = latest_index(&rows, tenant, &person, &offering) {
                if rows[i].is_active && rows[i].status == EnrollStatus::Active {
                    to_move.push((i, person, offering));
                }
            }
        }

        let moved = to_move.len() as u32;
        for (i, person, offering) in to_move {
            rows[i].is_active = false;
            self.push_row(
                &mut rows,
                tenant,
                person,
                offering,
                EnrollStatus::Active,
                None,
                effective_at,
            );
        }
        Ok(moved)
    }

    fn push_row(
        &self,
        rows: &mut Vec<EnrollmentRow>,
        tenant: TenantId,
        person: PersonId,
        offering: OfferingId,
        status: EnrollStatus,
        note: Option<&str>,
        effective_at: DateTime<Utc>,
    ) -> EnrollmentRow {
        let row = EnrollmentRow {
            id: self.next_row_id.fetch_add(1, Ordering::SeqCst),
            tenant,
            person,
            offering,
            status,
            is_active: true,
            note: note.map(|s| s.to_string()),
            effective_at,
        };
        rows.push(row.clone());
        row
    }
}

/// Most recent row for a pair: is_active desc, effective_at desc, id desc
fn latest_index(
    rows: &[EnrollmentRow],
    tenant: TenantId,
    person: &PersonId,
    offering: &OfferingId,
) -> Option<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, r)| r.tenant == tenant && r.person == *person && r.offering == *offering)
        .max_by_key(|(_, r)| (r.is_active, r.effective_at, r.id))
        .map(|(i, _)| i)
}

/// Most recent row for a person across all offerings
fn overall_latest<'a>(
    rows: &'a [EnrollmentRow],
    tenant: TenantId,
    person: &PersonId,
) -> Option<&'a EnrollmentRow> {
    rows.iter()
        .filter(|r| r.tenant == tenant && r.person == *person)
        .max_by_key(|r| (r.is_active, r.effective_at, r.id))
}

/// Lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Context binding failure
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Requested status not reachable from the current one
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Previous status, `None` for first enrollment
        from: Option<EnrollStatus>,
        /// Requested status
        to: EnrollStatus,
    },
    /// Offering not found under the bound tenant
    #[error("class-offering not found")]
    UnknownOffering,
    /// Period not found under the bound tenant
    #[error("period not found")]
    UnknownPeriod,
    /// Person not found under the bound tenant
    #[error("person not found")]
    UnknownPerson,
    /// Pair already has status history
    #[error("person already has status history in this offering")]
    AlreadyEnrolled,
    /// Second life requires a terminal overall status
    #[error("person's latest status is not terminal")]
    NotTerminal,
    /// Second life must target a different offering
    #[error("second life must target a different class-offering")]
    SameOffering,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceAllocator;
    use campus_common::AdvisoryLocks;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ts(y: i32, m: u32, day: u32) -> DateTime<Utc> {
        d(y, m, day).and_time(chrono::NaiveTime::MIN).and_utc()
    }

    struct Fixture {
        ctx: TenantContext,
        engine: LifecycleEngine,
        persons: Arc<PersonDirectory>,
        offering: ClassOffering,
        offering_b: ClassOffering,
        student: PersonId,
    }

    fn fixture() -> Fixture {
        let ctx = TenantContext::for_tenant(Uuid::new_v4());
        let periods = Arc::new(PeriodDirectory::new(Arc::new(AdvisoryLocks::new())));
        let p1 = periods
            .create(&ctx, 2025, d(2025, 1, 10), d(2025, 5, 30))
            .unwrap();
        let persons = Arc::new(PersonDirectory::new(
            Arc::new(SequenceAllocator::new()),
            periods.clone(),
        ));
        let engine = LifecycleEngine::new(persons.clone(), periods);
        let offering = engine.register_offering(&ctx, "Welding 1A", p1.id).unwrap();
        let offering_b = engine.register_offering(&ctx, "Tailoring 1A", p1.id).unwrap();
        let student = persons
            .create_student(&ctx, "Amina", "Okello", d(2006, 4, 2), d(2025, 1, 15))
            .unwrap()
            .id;
        Fixture {
            ctx,
            engine,
            persons,
            offering,
            offering_b,
            student,
        }
    }

    #[test]
    fn test_first_enrollment_must_be_active() {
        let f = fixture();
        let err = f
            .engine
            .apply_transition(
                &f.ctx,
                f.student,
                f.offering.id,
                EnrollStatus::Graduate,
                None,
                ts(2025, 1, 20),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition { from: None, to: EnrollStatus::Graduate }
        ));

        f.engine
            .apply_transition(
                &f.ctx,
                f.student,
                f.offering.id,
                EnrollStatus::Active,
                None,
                ts(2025, 1, 20),
            )
            .unwrap();
    }

    #[test]
    fn test_single_active_row_invariant() {
        let f = fixture();
        for (status, day) in [
            (EnrollStatus::Active, 20),
            (EnrollStatus::Failed, 21),
            (EnrollStatus::Retake, 22),
            (EnrollStatus::Active, 23),
        ] {
            f.engine
                .apply_transition(&f.ctx, f.student, f.offering.id, status, None, ts(2025, 1, day))
                .unwrap();
        }

        let history = f.engine.history(&f.ctx, &f.student, &f.offering.id);
        assert_eq!(history.len(), 4);
        assert_eq!(history.iter().filter(|r| r.is_active).count(), 1);
        assert_eq!(history[0].status, EnrollStatus::Active);
        assert!(history[0].is_active);
    }

    #[test]
    fn test_failed_validation_leaves_active_row_untouched() {
        let f = fixture();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Active, None, ts(2025, 1, 20))
            .unwrap();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Failed, None, ts(2025, 1, 21))
            .unwrap();

        // Failed -> Graduate is not in the table
        assert!(f
            .engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Graduate, None, ts(2025, 1, 22))
            .is_err());

        let active = f.engine.active_row(&f.ctx, &f.student, &f.offering.id).unwrap();
        assert_eq!(active.status, EnrollStatus::Failed);
        assert_eq!(f.engine.history(&f.ctx, &f.student, &f.offering.id).len(), 2);
    }

    #[test]
    fn test_terminal_rejected_and_second_life() {
        let f = fixture();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Active, None, ts(2025, 1, 20))
            .unwrap();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Graduate, None, ts(2025, 5, 30))
            .unwrap();

        // Same offering: rejected
        assert!(matches!(
            f.engine.apply_transition(
                &f.ctx,
                f.student,
                f.offering.id,
                EnrollStatus::Active,
                None,
                ts(2025, 6, 1)
            ),
            Err(LifecycleError::InvalidTransition { .. })
        ));

        // Same offering via the second-life path: also rejected
        assert!(matches!(
            f.engine
                .grant_second_life(&f.ctx, f.student, f.offering.id, None, ts(2025, 6, 1)),
            Err(LifecycleError::SameOffering)
        ));

        // Different offering: succeeds
        let row = f
            .engine
            .grant_second_life(&f.ctx, f.student, f.offering_b.id, None, ts(2025, 6, 1))
            .unwrap();
        assert_eq!(row.status, EnrollStatus::Active);
        assert!(row.is_active);
    }

    #[test]
    fn test_second_life_requires_terminal() {
        let f = fixture();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Active, None, ts(2025, 1, 20))
            .unwrap();
        assert!(matches!(
            f.engine
                .grant_second_life(&f.ctx, f.student, f.offering_b.id, None, ts(2025, 2, 1)),
            Err(LifecycleError::NotTerminal)
        ));
    }

    #[test]
    fn test_admissions_funnel() {
        let f = fixture();
        f.engine
            .open_enquiry(&f.ctx, f.student, f.offering.id, Some("walk-in"), ts(2025, 1, 5))
            .unwrap();
        // Enquiry only opens once
        assert!(matches!(
            f.engine
                .open_enquiry(&f.ctx, f.student, f.offering.id, None, ts(2025, 1, 6)),
            Err(LifecycleError::AlreadyEnrolled)
        ));

        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Accepted, None, ts(2025, 1, 8))
            .unwrap();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Active, None, ts(2025, 1, 10))
            .unwrap();

        let history = f.engine.history(&f.ctx, &f.student, &f.offering.id);
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().filter(|r| r.is_active).count(), 1);
    }

    #[test]
    fn test_entry_exit_side_effects() {
        let f = fixture();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Active, None, ts(2025, 1, 20))
            .unwrap();
        let s = f.persons.get_student(&f.ctx, &f.student).unwrap();
        assert_eq!(s.entry_date, Some(d(2025, 1, 20)));
        assert_eq!(s.exit_date, None);

        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::DropOut, None, ts(2025, 3, 3))
            .unwrap();
        let s = f.persons.get_student(&f.ctx, &f.student).unwrap();
        // Closed with the offering period's end date, not the drop date
        assert_eq!(s.exit_date, Some(d(2025, 5, 30)));
    }

    #[test]
    fn test_formal_date_side_effects() {
        let f = fixture();
        // The enquiry alone marks entry with the class period's start
        f.engine
            .open_enquiry(&f.ctx, f.student, f.offering.id, None, ts(2025, 1, 5))
            .unwrap();
        let s = f.persons.get_student(&f.ctx, &f.student).unwrap();
        assert_eq!(s.entry_date, Some(d(2025, 1, 10)));

        for (status, month, day) in [
            (EnrollStatus::Accepted, 1, 8),
            (EnrollStatus::Active, 1, 20),
            (EnrollStatus::Failed, 5, 20),
        ] {
            f.engine
                .apply_transition(&f.ctx, f.student, f.offering.id, status, None, ts(2025, month, day))
                .unwrap();
        }
        // Failed closes the window with the period end, like a terminal
        let s = f.persons.get_student(&f.ctx, &f.student).unwrap();
        assert_eq!(s.entry_date, Some(d(2025, 1, 10)));
        assert_eq!(s.exit_date, Some(d(2025, 5, 30)));

        // Retake reopens it
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Retake, None, ts(2025, 6, 1))
            .unwrap();
        let s = f.persons.get_student(&f.ctx, &f.student).unwrap();
        assert_eq!(s.exit_date, None);
    }

    #[test]
    fn test_second_life_supersedes_stale_history_in_new_offering() {
        let f = fixture();
        // Stale enquiry in B, then a terminal outcome in A
        f.engine
            .open_enquiry(&f.ctx, f.student, f.offering_b.id, None, ts(2025, 1, 5))
            .unwrap();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Active, None, ts(2025, 1, 20))
            .unwrap();
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Expelled, None, ts(2025, 3, 1))
            .unwrap();

        // Second life into B succeeds even though Enquire -> Active is
        // not a table edge; the stale enquiry row gets deactivated
        let row = f
            .engine
            .grant_second_life(&f.ctx, f.student, f.offering_b.id, None, ts(2025, 3, 2))
            .unwrap();
        assert_eq!(row.status, EnrollStatus::Active);

        let history = f.engine.history(&f.ctx, &f.student, &f.offering_b.id);
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|r| r.is_active).count(), 1);
        assert_eq!(
            f.engine.active_row(&f.ctx, &f.student, &f.offering_b.id).unwrap().status,
            EnrollStatus::Active
        );
    }

    #[test]
    fn test_unknown_offering_and_person() {
        let f = fixture();
        assert!(matches!(
            f.engine.apply_transition(
                &f.ctx,
                f.student,
                Uuid::new_v4(),
                EnrollStatus::Active,
                None,
                ts(2025, 1, 20)
            ),
            Err(LifecycleError::UnknownOffering)
        ));
        assert!(matches!(
            f.engine.apply_transition(
                &f.ctx,
                Uuid::new_v4(),
                f.offering.id,
                EnrollStatus::Active,
                None,
                ts(2025, 1, 20)
            ),
            Err(LifecycleError::UnknownPerson)
        ));
    }

    #[test]
    fn test_blocking_status_predicate() {
        let f = fixture();
        f.engine
            .open_enquiry(&f.ctx, f.student, f.offering.id, None, ts(2025, 1, 5))
            .unwrap();
        // Enquire is in the funnel: blocks
        assert!(f.engine.has_blocking_status(&f.ctx, &[f.student]));

        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::Accepted, None, ts(2025, 1, 8))
            .unwrap();
        assert!(f.engine.has_blocking_status(&f.ctx, &[f.student]));

        // A no-show left the funnel and may apply again
        f.engine
            .apply_transition(&f.ctx, f.student, f.offering.id, EnrollStatus::NoShow, None, ts(2025, 2, 1))
            .unwrap();
        assert!(!f.engine.has_blocking_status(&f.ctx, &[f.student]));
    }

    fn any_status() -> impl Strategy<Value = EnrollStatus> {
        prop_oneof![
            Just(EnrollStatus::Enquire),
            Just(EnrollStatus::Accepted),
            Just(EnrollStatus::NoShow),
            Just(EnrollStatus::Active),
            Just(EnrollStatus::Retake),
            Just(EnrollStatus::Failed),
            Just(EnrollStatus::Graduate),
            Just(EnrollStatus::DropOut),
            Just(EnrollStatus::Expelled),
            Just(EnrollStatus::NotAccepted),
        ]
    }

    proptest! {
        #[test]
        fn prop_terminal_states_have_no_outgoing(prev in any_status(), next in any_status()) {
            if prev.is_terminal() {
                prop_assert!(!EnrollStatus::can_transition(Some(prev), next));
            }
        }

        #[test]
        fn prop_first_enrollment_only_active(next in any_status()) {
            prop_assert_eq!(
                EnrollStatus::can_transition(None, next),
                next == EnrollStatus::Active
            );
        }
    }
}
