//! Rolling per-user request quotas.
//!
//! Counters are reset lazily: each check or increment first compares the
//! account's last reset against the current period boundary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, Utc};

use crate::config::{QuotaConfig, QuotaPeriod};
use crate::media::MediaKind;
use crate::session::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub movies: u32,
    pub tv: u32,
    pub last_reset: DateTime<Utc>,
}

impl Usage {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            movies: 0,
            tv: 0,
            last_reset: now,
        }
    }

    pub fn count(&self, kind: MediaKind) -> u32 {
        match kind {
            MediaKind::Movie => self.movies,
            MediaKind::TvShow => self.tv,
            MediaKind::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied {
        kind: MediaKind,
        used: u32,
        limit: u32,
        period: QuotaPeriod,
    },
}

impl QuotaDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }
}

pub struct QuotaTracker {
    config: QuotaConfig,
    usage: Mutex<HashMap<String, Usage>>,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            usage: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    pub fn limit(&self, kind: MediaKind) -> u32 {
        match kind {
            MediaKind::Movie => self.config.movie_limit,
            MediaKind::TvShow => self.config.tv_limit,
            MediaKind::Unknown => 0,
        }
    }

    /// Does not count anything; see [`QuotaTracker::record`].
    pub fn check(&self, account: &str, kind: MediaKind, is_admin: bool) -> QuotaDecision {
        if !self.config.enabled || (is_admin && self.config.exempt_admins) {
            return QuotaDecision::Allowed;
        }
        let limit = self.limit(kind);
        if limit == 0 {
            return QuotaDecision::Allowed;
        }
        let used = self.usage(account).count(kind);
        if used >= limit {
            QuotaDecision::Denied {
                kind,
                used,
                limit,
                period: self.config.period,
            }
        } else {
            QuotaDecision::Allowed
        }
    }

    /// Counts one committed request.
    pub fn record(&self, account: &str, kind: MediaKind) {
        self.with_usage(account, |usage| match kind {
            MediaKind::Movie => usage.movies += 1,
            MediaKind::TvShow => usage.tv += 1,
            MediaKind::Unknown => {}
        });
    }

    /// Current-period usage. Accounts with nothing recorded read as zero and
    /// are not added to the table.
    pub fn usage(&self, account: &str) -> Usage {
        let now = self.clock.now();
        match self.lock().get_mut(account) {
            Some(entry) => {
                if rolled_over(self.config.period, entry.last_reset, now) {
                    *entry = Usage::fresh(now);
                }
                *entry
            }
            None => Usage::fresh(now),
        }
    }

    /// Every tracked account, rolled over to the current period, by name.
    pub fn snapshot(&self) -> Vec<(String, Usage)> {
        let now = self.clock.now();
        let period = self.config.period;
        let mut usage = self.lock();
        let mut rows: Vec<(String, Usage)> = usage
            .iter_mut()
            .map(|(account, entry)| {
                if rolled_over(period, entry.last_reset, now) {
                    *entry = Usage::fresh(now);
                }
                (account.clone(), *entry)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Clears an account's counters. Returns whether it was tracked.
    pub fn reset(&self, account: &str) -> bool {
        let now = self.clock.now();
        match self.lock().get_mut(account) {
            Some(entry) => {
                *entry = Usage::fresh(now);
                true
            }
            None => false,
        }
    }

    fn with_usage(&self, account: &str, f: impl FnOnce(&mut Usage)) {
        let now = self.clock.now();
        let period = self.config.period;
        let mut usage = self.lock();
        let entry = usage
            .entry(account.to_string())
            .or_insert_with(|| Usage::fresh(now));
        if rolled_over(period, entry.last_reset, now) {
            *entry = Usage::fresh(now);
        }
        f(entry);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Usage>> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether `now` falls in a later period than `last_reset` (UTC calendar).
pub fn rolled_over(period: QuotaPeriod, last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if now <= last_reset {
        return false;
    }
    match period {
        QuotaPeriod::Daily => now.date_naive() != last_reset.date_naive(),
        QuotaPeriod::Weekly => now.iso_week() != last_reset.iso_week(),
        QuotaPeriod::Monthly => (now.year(), now.month()) != (last_reset.year(), last_reset.month()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::session::ManualClock;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn tracker(config: QuotaConfig) -> (QuotaTracker, Arc<ManualClock>) {
        // Monday
        let clock = Arc::new(ManualClock::new(at(2026, 1, 5, 9)));
        (QuotaTracker::new(config, clock.clone()), clock)
    }

    fn limited(period: QuotaPeriod) -> QuotaConfig {
        QuotaConfig {
            enabled: true,
            period,
            movie_limit: 2,
            tv_limit: 0,
            exempt_admins: true,
        }
    }

    #[test]
    fn disabled_quota_always_allows() {
        let (quota, _) = tracker(QuotaConfig::default());
        for _ in 0..10 {
            quota.record("alice", MediaKind::Movie);
        }
        assert!(quota.check("alice", MediaKind::Movie, false).is_allowed());
    }

    #[test]
    fn denies_at_limit_without_counting() {
        let (quota, _) = tracker(limited(QuotaPeriod::Weekly));
        quota.record("bob", MediaKind::Movie);
        assert!(quota.check("bob", MediaKind::Movie, false).is_allowed());
        quota.record("bob", MediaKind::Movie);

        let decision = quota.check("bob", MediaKind::Movie, false);
        assert_eq!(
            decision,
            QuotaDecision::Denied {
                kind: MediaKind::Movie,
                used: 2,
                limit: 2,
                period: QuotaPeriod::Weekly,
            }
        );
        quota.check("bob", MediaKind::Movie, false);
        assert_eq!(quota.usage("bob").movies, 2);
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let (quota, _) = tracker(limited(QuotaPeriod::Weekly));
        for _ in 0..5 {
            quota.record("bob", MediaKind::TvShow);
        }
        assert!(quota.check("bob", MediaKind::TvShow, false).is_allowed());
    }

    #[test]
    fn exempt_admins_bypass_limits() {
        let (quota, _) = tracker(limited(QuotaPeriod::Weekly));
        quota.record("alice", MediaKind::Movie);
        quota.record("alice", MediaKind::Movie);
        assert!(quota.check("alice", MediaKind::Movie, true).is_allowed());
        assert!(!quota.check("alice", MediaKind::Movie, false).is_allowed());
    }

    #[test]
    fn weekly_counters_reset_on_next_iso_week() {
        let (quota, clock) = tracker(limited(QuotaPeriod::Weekly));
        quota.record("bob", MediaKind::Movie);
        quota.record("bob", MediaKind::Movie);

        // Sunday of the same week.
        clock.advance(Duration::from_secs(6 * 24 * 3600));
        assert!(!quota.check("bob", MediaKind::Movie, false).is_allowed());

        // Following Monday.
        clock.advance(Duration::from_secs(24 * 3600));
        assert!(quota.check("bob", MediaKind::Movie, false).is_allowed());
        assert_eq!(quota.usage("bob").movies, 0);
    }

    #[test]
    fn rollover_boundaries() {
        let start = at(2026, 1, 31, 23);
        assert!(rolled_over(QuotaPeriod::Daily, start, at(2026, 2, 1, 0)));
        assert!(!rolled_over(QuotaPeriod::Daily, start, at(2026, 1, 31, 23)));
        assert!(rolled_over(QuotaPeriod::Monthly, start, at(2026, 2, 1, 0)));
        assert!(!rolled_over(QuotaPeriod::Monthly, at(2026, 2, 1, 0), at(2026, 2, 28, 0)));
        assert!(!rolled_over(QuotaPeriod::Weekly, at(2026, 1, 5, 0), at(2026, 1, 11, 23)));
        assert!(rolled_over(QuotaPeriod::Weekly, at(2026, 1, 11, 23), at(2026, 1, 12, 0)));
    }

    #[test]
    fn reset_and_snapshot() {
        let (quota, _) = tracker(limited(QuotaPeriod::Daily));
        quota.record("bob", MediaKind::Movie);
        quota.record("alice", MediaKind::TvShow);

        let rows = quota.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "alice");
        assert_eq!(rows[0].1.tv, 1);

        assert!(quota.reset("bob"));
        assert!(!quota.reset("carol"));
        assert_eq!(quota.usage("bob").movies, 0);
    }

    #[test]
    fn reads_do_not_create_rows() {
        let (quota, _) = tracker(limited(QuotaPeriod::Weekly));
        assert!(quota.check("dave", MediaKind::Movie, false).is_allowed());
        assert_eq!(quota.usage("dave").movies, 0);
        assert!(quota.snapshot().is_empty());
        assert!(!quota.reset("dave"));

        quota.record("dave", MediaKind::Movie);
        let rows = quota.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "dave");
    }
}
