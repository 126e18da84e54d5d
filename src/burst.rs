// src/burst.rs
//! Flood control for story clusters. Every hard admission is counted against
//! the cluster's sliding window of per-minute buckets; once the window holds
//! the configured maximum, further articles in that cluster are downranked or
//! suppressed until older buckets slide out. Only admissions count, so a
//! burst of overflow traffic can never extend its own penalty.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::text::stable_hash64;

const SHARDS: usize = 16;

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    Downrank,
    Suppress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BurstConfig {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
    #[serde(default = "default_max_admissions")]
    pub max_admissions: u32,
    #[serde(default = "default_overflow")]
    pub overflow: OverflowPolicy,
    /// Multiplier applied to the score of downranked articles.
    #[serde(default = "default_downrank_factor")]
    pub downrank_factor: f32,
}

fn default_window_minutes() -> u64 {
    60
}
fn default_max_admissions() -> u32 {
    10
}
fn default_overflow() -> OverflowPolicy {
    OverflowPolicy::Downrank
}
fn default_downrank_factor() -> f32 {
    0.5
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            max_admissions: default_max_admissions(),
            overflow: default_overflow(),
            downrank_factor: default_downrank_factor(),
        }
    }
}

impl BurstConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_minutes == 0 {
            return Err(anyhow::anyhow!("burst: window_minutes must be at least 1"));
        }
        if self.max_admissions == 0 {
            return Err(anyhow::anyhow!("burst: max_admissions must be at least 1"));
        }
        if !self.downrank_factor.is_finite()
            || self.downrank_factor <= 0.0
            || self.downrank_factor > 1.0
        {
            return Err(anyhow::anyhow!(
                "burst: downrank_factor must be within (0.0, 1.0]"
            ));
        }
        Ok(())
    }
}

/* ----------------------------
Controller
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstOutcome {
    Admit,
    Downrank,
    Suppress,
}

#[derive(Debug, Default)]
struct ClusterWindow {
    /// `(minute index, admissions)`, front = oldest.
    buckets: VecDeque<(u64, u32)>,
}

impl ClusterWindow {
    fn evict_before(&mut self, cutoff_minute: u64) {
        while self.buckets.front().map_or(false, |b| b.0 < cutoff_minute) {
            self.buckets.pop_front();
        }
    }

    fn admitted(&self) -> u32 {
        self.buckets.iter().map(|b| b.1).sum()
    }

    fn bump(&mut self, minute: u64) {
        match self.buckets.back_mut() {
            Some(last) if last.0 == minute => last.1 += 1,
            _ => self.buckets.push_back((minute, 1)),
        }
    }
}

#[derive(Debug)]
pub struct BurstController {
    window_minutes: u64,
    max_admissions: u32,
    overflow: OverflowPolicy,
    shards: Vec<Mutex<HashMap<String, ClusterWindow>>>,
}

impl BurstController {
    pub fn new(cfg: &BurstConfig) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            window_minutes: cfg.window_minutes.max(1),
            max_admissions: cfg.max_admissions.max(1),
            overflow: cfg.overflow,
            shards,
        }
    }

    /// Count-and-decide for one article in `cluster_key`'s window. The
    /// counter moves only on `Admit`; overflow outcomes leave it untouched.
    pub fn admit(&self, cluster_key: &str, now: DateTime<Utc>) -> BurstOutcome {
        let minute = now.timestamp().max(0) as u64 / 60;
        let cutoff = (minute + 1).saturating_sub(self.window_minutes);

        let mut shard = self.shard_for(cluster_key).lock().expect("burst shard mutex poisoned");
        let window = shard.entry(cluster_key.to_string()).or_default();
        window.evict_before(cutoff);

        if window.admitted() < self.max_admissions {
            window.bump(minute);
            return BurstOutcome::Admit;
        }
        match self.overflow {
            OverflowPolicy::Downrank => BurstOutcome::Downrank,
            OverflowPolicy::Suppress => BurstOutcome::Suppress,
        }
    }

    /// Drop clusters whose newest bucket is already behind the window.
    /// Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let minute = now.timestamp().max(0) as u64 / 60;
        let cutoff = (minute + 1).saturating_sub(self.window_minutes);
        let mut removed = 0usize;
        for shard in &self.shards {
            let mut map = shard.lock().expect("burst shard mutex poisoned");
            let before = map.len();
            map.retain(|_, w| w.buckets.back().map_or(false, |b| b.0 >= cutoff));
            removed += before - map.len();
        }
        removed
    }

    /// Clusters currently tracked, swept or not.
    pub fn active_clusters(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("burst shard mutex poisoned").len())
            .sum()
    }

    fn shard_for(&self, cluster_key: &str) -> &Mutex<HashMap<String, ClusterWindow>> {
        let idx = (stable_hash64(cluster_key) % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn controller(max: u32, window: u64, overflow: OverflowPolicy) -> BurstController {
        BurstController::new(&BurstConfig {
            window_minutes: window,
            max_admissions: max,
            overflow,
            downrank_factor: 0.5,
        })
    }

    #[test]
    fn admissions_up_to_the_limit_then_downrank() {
        let c = controller(3, 60, OverflowPolicy::Downrank);
        for i in 0..3 {
            assert_eq!(c.admit("humanitarian|aden", at(i)), BurstOutcome::Admit);
        }
        assert_eq!(c.admit("humanitarian|aden", at(3)), BurstOutcome::Downrank);
        assert_eq!(c.admit("humanitarian|aden", at(4)), BurstOutcome::Downrank);
    }

    #[test]
    fn suppress_policy_changes_the_overflow_outcome() {
        let c = controller(1, 60, OverflowPolicy::Suppress);
        assert_eq!(c.admit("security|aden", at(0)), BurstOutcome::Admit);
        assert_eq!(c.admit("security|aden", at(1)), BurstOutcome::Suppress);
    }

    #[test]
    fn overflow_does_not_extend_the_window() {
        let c = controller(2, 10, OverflowPolicy::Downrank);
        assert_eq!(c.admit("k", at(0)), BurstOutcome::Admit);
        assert_eq!(c.admit("k", at(0)), BurstOutcome::Admit);
        // A stream of rejected attempts right up to the boundary.
        for m in 1..10 {
            assert_eq!(c.admit("k", at(m)), BurstOutcome::Downrank);
        }
        // Minute 10: the minute-0 bucket leaves the 10-minute window.
        assert_eq!(c.admit("k", at(10)), BurstOutcome::Admit);
    }

    #[test]
    fn window_slides_per_minute_bucket() {
        let c = controller(2, 60, OverflowPolicy::Downrank);
        assert_eq!(c.admit("k", at(0)), BurstOutcome::Admit);
        assert_eq!(c.admit("k", at(30)), BurstOutcome::Admit);
        assert_eq!(c.admit("k", at(59)), BurstOutcome::Downrank);
        // Minute 60 drops the minute-0 admission, minute 30 still counts.
        assert_eq!(c.admit("k", at(60)), BurstOutcome::Admit);
        assert_eq!(c.admit("k", at(61)), BurstOutcome::Downrank);
    }

    #[test]
    fn clusters_are_throttled_independently() {
        let c = controller(1, 60, OverflowPolicy::Downrank);
        assert_eq!(c.admit("humanitarian|aden", at(0)), BurstOutcome::Admit);
        assert_eq!(c.admit("security|taiz", at(0)), BurstOutcome::Admit);
        assert_eq!(c.admit("humanitarian|aden", at(1)), BurstOutcome::Downrank);
        assert_eq!(c.admit("security|taiz", at(1)), BurstOutcome::Downrank);
    }

    #[test]
    fn sweep_removes_idle_clusters_only() {
        let c = controller(5, 60, OverflowPolicy::Downrank);
        c.admit("old", at(0));
        c.admit("fresh", at(70));
        assert_eq!(c.active_clusters(), 2);
        assert_eq!(c.sweep_expired(at(75)), 1, "only `old` is idle");
        assert_eq!(c.active_clusters(), 1);
        // The surviving cluster keeps its count.
        assert_eq!(c.admit("fresh", at(76)), BurstOutcome::Admit);
    }
}
