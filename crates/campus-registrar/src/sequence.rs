//! Sequence Allocation
//!
//! Monotonic, gap-tolerant counters scoped by (tenant, kind, year,
//! period), used to mint human-readable PINs. Concurrent callers for the
//! same key are strictly serialized by an exclusive per-key lock; distinct
//! keys never contend. Ordinals start at 1, never reset mid-year and are
//! never reused, even if the record they were minted for is later deleted.

use campus_common::TenantId;
use campus_tenant::{ContextError, TenantContext};
use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a counter issues ordinals for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    /// Employee PINs (no period component)
    Employee,
    /// Student PINs (keyed by admission period)
    Student,
}

/// Counter row key. Exactly one counter exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// Owning tenant
    pub tenant: TenantId,
    /// Person kind
    pub kind: SequenceKind,
    /// Two-digit year (calendar year mod 100)
    pub year2: u8,
    /// Period ordinal within the year, student counters only
    pub period_number: Option<u32>,
}

/// Issues unique, strictly increasing ordinals per counter key.
pub struct SequenceAllocator {
    // One lazily created row per key; the Mutex is the exclusive row lock.
    counters: DashMap<CounterKey, Arc<Mutex<u32>>>,
}

impl SequenceAllocator {
    /// Create an allocator with no counter rows
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Increment and return the next ordinal for the key. The counter row
    /// is created at 0 on first use; the returned value is never 0.
    pub fn next_ordinal(
        &self,
        ctx: &TenantContext,
        kind: SequenceKind,
        year2: u8,
        period_number: Option<u32>,
    ) -> Result<u32, ContextError> {
        let tenant = ctx.require()?;
        let key = CounterKey {
            tenant,
            kind,
            year2,
            period_number,
        };
        let row = self
            .counters
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .value()
            .clone();
        let mut last = row.lock();
        *last += 1;
        Ok(*last)
    }

    /// Last ordinal issued for the key, 0 if none yet.
    pub fn last_issued(
        &self,
        ctx: &TenantContext,
        kind: SequenceKind,
        year2: u8,
        period_number: Option<u32>,
    ) -> Result<u32, ContextError> {
        let tenant = ctx.require()?;
        let key = CounterKey {
            tenant,
            kind,
            year2,
            period_number,
        };
        Ok(self.counters.get(&key).map(|row| *row.lock()).unwrap_or(0))
    }

    /// Calendar year modulo 100
    pub fn year2(date: NaiveDate) -> u8 {
        (date.year().rem_euclid(100)) as u8
    }

    /// Employee PIN: `E{YY}{SEQ:03}`. Widens naturally past 999.
    pub fn employee_pin(year2: u8, ordinal: u32) -> String {
        format!("E{:02}{:03}", year2, ordinal)
    }

    /// Student PIN: `S{YY}{PERIOD_NUM}{SEQ:03}`
    pub fn student_pin(year2: u8, period_number: u32, ordinal: u32) -> String {
        format!("S{:02}{}{:03}", year2, period_number, ordinal)
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn test_first_and_150th_employee_pin() {
        let alloc = SequenceAllocator::new();
        let ctx = TenantContext::for_tenant(Uuid::new_v4());

        let first = alloc
            .next_ordinal(&ctx, SequenceKind::Employee, 25, None)
            .unwrap();
        assert_eq!(SequenceAllocator::employee_pin(25, first), "E25001");

        let mut last = first;
        for _ in 1..150 {
            last = alloc
                .next_ordinal(&ctx, SequenceKind::Employee, 25, None)
                .unwrap();
        }
        assert_eq!(SequenceAllocator::employee_pin(25, last), "E25150");
    }

    #[test]
    fn test_student_pin_format() {
        assert_eq!(SequenceAllocator::student_pin(25, 2, 7), "S252007");
        // Past 999 the ordinal simply widens
        assert_eq!(SequenceAllocator::student_pin(25, 1, 1000), "S2511000");
    }

    #[test]
    fn test_year2() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(SequenceAllocator::year2(d), 25);
    }

    #[test]
    fn test_concurrent_allocation_no_duplicates_no_gaps() {
        let alloc = Arc::new(SequenceAllocator::new());
        let tenant = Uuid::new_v4();
        let n = 64;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let alloc = alloc.clone();
                std::thread::spawn(move || {
                    let ctx = TenantContext::for_tenant(tenant);
                    alloc
                        .next_ordinal(&ctx, SequenceKind::Student, 25, Some(1))
                        .unwrap()
                })
            })
            .collect();

        let issued: HashSet<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(issued, (1..=n).collect::<HashSet<u32>>());
    }

    #[test]
    fn test_distinct_keys_independent() {
        let alloc = SequenceAllocator::new();
        let ctx_a = TenantContext::for_tenant(Uuid::new_v4());
        let ctx_b = TenantContext::for_tenant(Uuid::new_v4());

        assert_eq!(
            alloc
                .next_ordinal(&ctx_a, SequenceKind::Employee, 25, None)
                .unwrap(),
            1
        );
        assert_eq!(
            alloc
                .next_ordinal(&ctx_b, SequenceKind::Employee, 25, None)
                .unwrap(),
            1
        );
        // Different period number is a different counter
        assert_eq!(
            alloc
                .next_ordinal(&ctx_a, SequenceKind::Student, 25, Some(1))
                .unwrap(),
            1
        );
        assert_eq!(
            alloc
                .next_ordinal(&ctx_a, SequenceKind::Student, 25, Some(2))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_unbound_context_refused() {
        let alloc = SequenceAllocator::new();
        let ctx = TenantContext::unbound();
        assert_eq!(
            alloc
                .next_ordinal(&ctx, SequenceKind::Employee, 25, None)
                .unwrap_err(),
            ContextError::NoTenant
        );
    }
}
