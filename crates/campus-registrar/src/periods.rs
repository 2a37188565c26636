//! Academic Periods
//!
//! Period names are derived by scanning existing names rather than from a
//! counter row, so generation and insert run under a tenant+year advisory
//! lock: naive concurrent scans could otherwise compute the same "next"
//! ordinal twice.

use campus_common::{AdvisoryLocks, PeriodId, TenantId};
use campus_tenant::{ContextError, TenantContext};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// An academic term with a fixed date range and generated name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    /// Period ID
    pub id: PeriodId,
    /// Owning tenant
    pub tenant: TenantId,
    /// Generated name `T{YYYY}_{N}`, immutable and unique per tenant
    pub name: String,
    /// First day of the term
    pub start_date: NaiveDate,
    /// Last day of the term
    pub end_date: NaiveDate,
}

impl Period {
    /// Parse the 1-based ordinal out of a `T{year}_{n}` name
    pub fn ordinal_for_year(name: &str, year: i32) -> Option<u32> {
        name.strip_prefix(&format!("T{}_", year))?.parse().ok()
    }

    /// The ordinal component of this period's name, whatever its year
    pub fn period_number(&self) -> Option<u32> {
        let rest = self.name.strip_prefix('T')?;
        let (_, n) = rest.split_once('_')?;
        n.parse().ok()
    }
}

/// Store and name generator for academic periods
pub struct PeriodDirectory {
    periods: Arc<RwLock<HashMap<PeriodId, Period>>>,
    locks: Arc<AdvisoryLocks>,
}

impl PeriodDirectory {
    /// Create an empty directory using the given advisory-lock registry
    pub fn new(locks: Arc<AdvisoryLocks>) -> Self {
        Self {
            periods: Arc::new(RwLock::new(HashMap::new())),
            locks,
        }
    }

    /// Create a period for `year`, generating the next unused `T{year}_{n}`
    /// name. Recomputation and insert are serialized per (tenant, year) by
    /// the advisory lock; validation failure creates nothing.
    pub fn create(
        &self,
        ctx: &TenantContext,
        year: i32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Period, PeriodError> {
        let tenant = ctx.require()?;

        let _guard = self.locks.acquire(&format!("periods:{}:{}", tenant, year));

        if end_date < start_date {
            return Err(PeriodError::InvalidPeriodDates);
        }

        let mut periods = self.periods.write();
        for existing in periods.values().filter(|p| p.tenant == tenant) {
            // Inclusive [start, end] ranges must not intersect
            if start_date <= existing.end_date && existing.start_date <= end_date {
                return Err(PeriodError::OverlappingPeriod(existing.name.clone()));
            }
        }

        let next = periods
            .values()
            .filter(|p| p.tenant == tenant)
            .filter_map(|p| Period::ordinal_for_year(&p.name, year))
            .max()
            .unwrap_or(0)
            + 1;

        let period = Period {
            id: Uuid::new_v4(),
            tenant,
            name: format!("T{}_{}", year, next),
            start_date,
            end_date,
        };
        periods.insert(period.id, period.clone());
        tracing::debug!(tenant = %tenant, name = %period.name, "created period");
        Ok(period)
    }

    /// Get a period, confined to the bound tenant
    pub fn get(&self, ctx: &TenantContext, id: &PeriodId) -> Option<Period> {
        let bound = ctx.bound()?;
        self.periods
            .read()
            .get(id)
            .filter(|p| p.tenant == bound)
            .cloned()
    }

    /// All periods of the bound tenant; empty for an unbound context
    pub fn list(&self, ctx: &TenantContext) -> Vec<Period> {
        let Some(bound) = ctx.bound() else {
            return Vec::new();
        };
        let mut out: Vec<Period> = self
            .periods
            .read()
            .values()
            .filter(|p| p.tenant == bound)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.start_date);
        out
    }

    /// Closeness rule: the period whose window contains `reference`; else
    /// the most recent one already started; else the nearest future one.
    pub fn nearest(
        &self,
        ctx: &TenantContext,
        reference: NaiveDate,
    ) -> Result<Period, PeriodError> {
        let all = self.list(ctx);
        if all.is_empty() {
            return Err(PeriodError::NoPeriodsConfigured);
        }
        if let Some(containing) = all
            .iter()
            .find(|p| p.start_date <= reference && reference <= p.end_date)
        {
            return Ok(containing.clone());
        }
        if let Some(started) = all
            .iter()
            .filter(|p| p.start_date <= reference)
            .max_by_key(|p| p.start_date)
        {
            return Ok(started.clone());
        }
        all.iter()
            .filter(|p| p.start_date > reference)
            .min_by_key(|p| p.start_date)
            .cloned()
            .ok_or(PeriodError::NoPeriodsConfigured)
    }

    /// The chronologically next period: smallest start date strictly after
    /// the given period's start date.
    pub fn next_after(
        &self,
        ctx: &TenantContext,
        period: &Period,
    ) -> Result<Period, PeriodError> {
        self.list(ctx)
            .into_iter()
            .filter(|p| p.start_date > period.start_date)
            .min_by_key(|p| p.start_date)
            .ok_or(PeriodError::NoUpcomingPeriod)
    }

    /// Count of periods starting strictly after `reference`
    pub fn future_count(&self, ctx: &TenantContext, reference: NaiveDate) -> usize {
        self.list(ctx)
            .iter()
            .filter(|p| p.start_date > reference)
            .count()
    }
}

/// Period creation and lookup errors
#[derive(Debug, thiserror::Error)]
pub enum PeriodError {
    /// No tenant bound
    #[error(transparent)]
    Context(#[from] ContextError),
    /// End date precedes start date
    #[error("period end date precedes start date")]
    InvalidPeriodDates,
    /// Date range intersects an existing period
    #[error("period overlaps existing period {0}")]
    OverlappingPeriod(String),
    /// Tenant has no periods at all
    #[error("no periods configured for this tenant")]
    NoPeriodsConfigured,
    /// No period starts after the given one
    #[error("no upcoming period configured")]
    NoUpcomingPeriod,
}
