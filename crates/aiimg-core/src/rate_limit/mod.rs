//! Per-group sliding-window admission control.
//!
//! Each group keeps the instants of its admitted requests within the trailing
//! window. Admission prunes expired instants first, so a group can never
//! exceed `limit` admissions in any window-length interval, including across
//! window boundaries.


use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use aiimg_types::GroupKey;

/// Trailing window length.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Admission checks between sweeps of idle groups.
pub const DEFAULT_PURGE_INTERVAL: u64 = 256;

pub(crate) fn duration_to_secs_ceil(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Result of [`GroupRateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// `remaining` is `None` when the limiter is disabled.
    Allowed { remaining: Option<u32> },
    /// Time until the oldest admission leaves the window.
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }

    /// Whole seconds to wait, rounded up, at least 1. Zero when allowed.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Admission::Allowed { .. } => 0,
            Admission::Denied { retry_after } => duration_to_secs_ceil(*retry_after).max(1),
        }
    }
}

pub struct GroupRateLimiter {
    limit: u32,
    window: Duration,
    buckets: DashMap<GroupKey, VecDeque<Instant>>,
    purge_interval: u64,
    checks: AtomicU64,
}

impl GroupRateLimiter {
    /// `limit` admissions per group per minute; 0 disables limiting.
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: DashMap::new(),
            purge_interval: DEFAULT_PURGE_INTERVAL,
            checks: AtomicU64::new(0),
        }
    }

    /// Sweep idle groups every `interval` admission checks; 0 disables sweeping.
    pub fn with_purge_interval(mut self, interval: u64) -> Self {
        self.purge_interval = interval;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn admit(&self, group: &GroupKey) -> Admission {
        self.admit_at(group, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    pub fn admit_at(&self, group: &GroupKey, now: Instant) -> Admission {
        if !self.is_enabled() {
            return Admission::Allowed { remaining: None };
        }

        // Sweep before taking an entry guard: retain locks every shard
        if self.purge_interval > 0 {
            let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
            if checks % self.purge_interval == 0 {
                let purged = self.purge_idle(now);
                if purged > 0 {
                    tracing::debug!(purged, tracked = self.buckets.len(), "Purged idle rate-limit groups");
                }
            }
        }

        // The entry guard serializes read-modify-write for this group.
        let mut bucket = self.buckets.entry(group.clone()).or_default();
        self.prune(&mut bucket, now);

        if bucket.len() >= self.limit as usize {
            let retry_after = bucket
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            tracing::debug!(
                group = %group,
                in_window = bucket.len(),
                limit = self.limit,
                "Admission denied, retry in {:?}",
                retry_after
            );
            return Admission::Denied { retry_after };
        }

        bucket.push_back(now);
        let remaining = self.limit.saturating_sub(bucket.len() as u32);
        Admission::Allowed { remaining: Some(remaining) }
    }

    /// Admissions currently counted against `group`.
    pub fn in_window(&self, group: &GroupKey, now: Instant) -> usize {
        self.buckets
            .get(group)
            .map(|b| b.iter().filter(|ts| now.saturating_duration_since(**ts) < self.window).count())
            .unwrap_or(0)
    }

    /// Groups currently holding a bucket.
    pub fn tracked_groups(&self) -> usize {
        self.buckets.len()
    }

    /// Drop groups with no admissions left in the window. Returns groups removed.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            bucket.back().is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });
        before - self.buckets.len()
    }

    fn prune(&self, bucket: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = bucket.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }
    }
}
