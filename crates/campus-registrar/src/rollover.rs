//! Period Rollover Coordinator
//!
//! At most once per period, advances every currently-Active enrollment of
//! the tenant into the next period's timeline. The rollover record is
//! written exactly once at execution time; a retried call observes it and
//! fails fast with the original result instead of re-scanning.

use crate::lifecycle::{LifecycleEngine, LifecycleError};
use crate::notify::{Dispatcher, Notification};
use crate::periods::PeriodDirectory;
use campus_common::PeriodId;
use campus_tenant::{Capability, ContextError, Role, TenantContext};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Days after the period's end during which the rollover may run
const WINDOW_DAYS: i64 = 7;

/// Single-shot execution record, one-to-one with a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverRecord {
    /// The rolled period
    pub period: PeriodId,
    /// Execution timestamp; immutable once set
    pub executed_at: DateTime<Utc>,
    /// Caller identity
    pub executed_by: Uuid,
    /// Enrollments moved
    pub moved_count: u32,
    /// Name of the period the enrollments were moved into
    pub next_period_name: String,
}

/// Result reported to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolloverSummary {
    /// Enrollments moved
    pub moved_count: u32,
    /// Name of the target period
    pub next_period_name: String,
    /// Execution timestamp
    pub executed_at: DateTime<Utc>,
}

impl From<&RolloverRecord> for RolloverSummary {
    fn from(r: &RolloverRecord) -> Self {
        Self {
            moved_count: r.moved_count,
            next_period_name: r.next_period_name.clone(),
            executed_at: r.executed_at,
        }
    }
}

/// Coordinates the once-per-period bulk advancement
pub struct RolloverCoordinator {
    records: Arc<RwLock<HashMap<PeriodId, RolloverRecord>>>,
    lifecycle: Arc<LifecycleEngine>,
    periods: Arc<PeriodDirectory>,
    dispatcher: Dispatcher,
}

impl RolloverCoordinator {
    /// Coordinator over the lifecycle engine and period directory
    pub fn new(
        lifecycle: Arc<LifecycleEngine>,
        periods: Arc<PeriodDirectory>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            lifecycle,
            periods,
            dispatcher,
        }
    }

    /// Execute the rollover for `period_id` as of `today`. All
    /// preconditions are checked before any row is touched; any failure
    /// leaves every enrollment unchanged.
    pub fn execute(
        &self,
        ctx: &TenantContext,
        role: Role,
        period_id: PeriodId,
        executed_by: Uuid,
        today: NaiveDate,
    ) -> Result<RolloverSummary, RolloverError> {
        if !role.can(Capability::ExecuteRollover) {
            return Err(RolloverError::NotAuthorized);
        }
        let tenant = ctx.require()?;
        let period = self
            .periods
            .get(ctx, &period_id)
            .ok_or(RolloverError::UnknownPeriod)?;

        // Held for the whole run so two concurrent calls cannot both pass
        // the single-shot check.
        let mut records = self.records.write();
        if let Some(existing) = records.get(&period_id) {
            return Err(RolloverError::AlreadyExecuted(existing.into()));
        }

        if today < period.end_date {
            return Err(RolloverError::TooEarly);
        }
        if today > period.end_date + Duration::days(WINDOW_DAYS) {
            return Err(RolloverError::WindowExpired);
        }

        let next = self
            .periods
            .next_after(ctx, &period)
            .map_err(|_| RolloverError::NoUpcomingPeriod)?;

        let moved_count = self.lifecycle.roll_active(ctx, next.start_date)?;

        let record = RolloverRecord {
            period: period_id,
            executed_at: Utc::now(),
            executed_by,
            moved_count,
            next_period_name: next.name.clone(),
        };
        let summary = RolloverSummary::from(&record);
        records.insert(period_id, record);
        drop(records);

        tracing::info!(
            tenant = %tenant,
            period = %period.name,
            next = %next.name,
            moved = moved_count,
            "period rollover executed"
        );

        self.dispatcher.fire(Notification::RolloverCompleted {
            tenant,
            period: period.name.clone(),
            moved_count,
            executed_at: summary.executed_at,
        });
        let remaining = self.periods.future_count(ctx, today);
        if remaining < 2 {
            self.dispatcher
                .fire(Notification::LowPeriodCount { tenant, remaining });
        }

        Ok(summary)
    }

    /// The execution record for a period, if the rollover has run
    pub fn record(&self, period_id: &PeriodId) -> Option<RolloverRecord> {
        self.records.read().get(period_id).cloned()
    }
}

/// Rollover errors
#[derive(Debug, thiserror::Error)]
pub enum RolloverError {
    /// Context binding failure
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Caller's role may not trigger rollovers
    #[error("caller is not authorized to execute a rollover")]
    NotAuthorized,
    /// Period not found under the bound tenant
    #[error("period not found")]
    UnknownPeriod,
    /// Rollover already ran; the original result is reported
    #[error("rollover already executed at {}", .0.executed_at)]
    AlreadyExecuted(RolloverSummary),
    /// Invoked before the period's end date
    #[error("rollover invoked before the period has ended")]
    TooEarly,
    /// Invoked after the window closed; no retry helps
    #[error("rollover window of {WINDOW_DAYS} days has expired")]
    WindowExpired,
    /// No chronologically next period configured
    #[error("no upcoming period configured")]
    NoUpcomingPeriod,
    /// Bulk advancement failure
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
