// Copyright (c) 2026 Namechain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Provider reputation for block transfers.
//!
//! Serving a verified block earns credit; serving mismatched bytes or failing a
//! request costs it. Providers at or below the ban threshold are skipped for a
//! backoff period that doubles on each repeat.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

/// Scoring parameters.
#[derive(Clone, Debug)]
pub struct ScoreParams {
    /// <= this => ban.
    pub ban_threshold: i32,
    /// Max clamp.
    pub max_score: i32,
    /// Min clamp.
    pub min_score: i32,
    /// Decay per minute toward 0.
    pub decay_per_min: i32,
    /// Base ban time.
    pub ban_base_secs: u64,
    /// Max ban time.
    pub ban_max_secs: u64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            ban_threshold: -100,
            max_score: 200,
            min_score: -200,
            decay_per_min: 2,
            ban_base_secs: 60,
            ban_max_secs: 3600,
        }
    }
}

/// Credit for a block served and verified.
pub const SERVED_BLOCK: i32 = 10;
/// Penalty for a failed or refused request.
pub const FAILED_REQUEST: i32 = 20;
/// Penalty for bytes that do not hash to the requested content id.
pub const BAD_CONTENT: i32 = 150;

#[derive(Clone, Debug)]
struct Entry {
    score: i32,
    last_decay: Instant,
    banned_until: Option<Instant>,
    ban_level: u32,
}

/// Enforcement decision after an observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Keep using.
    Allow,
    /// Use only when nothing better is available.
    Deprioritize,
    /// Skip until the ban expires.
    Ban,
}

/// Reputation table keyed by provider id.
pub struct ProviderScore<K: Ord + Clone> {
    params: ScoreParams,
    entries: BTreeMap<K, Entry>,
}

impl<K: Ord + Clone> ProviderScore<K> {
    /// Create a table with the given parameters.
    pub fn new(params: ScoreParams) -> Self {
        Self {
            params,
            entries: BTreeMap::new(),
        }
    }

    /// True if `p` is currently banned.
    pub fn is_banned(&mut self, p: &K, now: Instant) -> bool {
        if let Some(e) = self.entries.get_mut(p) {
            decay(&self.params, e, now);
        }
        matches!(self.entries.get(p).and_then(|e| e.banned_until), Some(t) if now < t)
    }

    /// Record good behaviour.
    pub fn observe_good(&mut self, p: K, now: Instant, delta: i32) -> Decision {
        self.apply(p, now, delta.max(0))
    }

    /// Record bad behaviour.
    pub fn observe_bad(&mut self, p: K, now: Instant, delta: i32) -> Decision {
        self.apply(p, now, -delta.abs())
    }

    /// Current score after decay.
    pub fn score(&mut self, p: &K, now: Instant) -> i32 {
        match self.entries.get_mut(p) {
            Some(e) => {
                decay(&self.params, e, now);
                e.score
            }
            None => 0,
        }
    }

    /// Unbanned candidates, best first. Ties keep their input order.
    pub fn rank(&mut self, candidates: impl IntoIterator<Item = K>, now: Instant) -> Vec<K> {
        let mut scored: Vec<(i32, K)> = Vec::new();
        for c in candidates {
            if self.is_banned(&c, now) {
                continue;
            }
            scored.push((self.score(&c, now), c));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, c)| c).collect()
    }

    fn apply(&mut self, p: K, now: Instant, delta: i32) -> Decision {
        let params = &self.params;
        let e = self.entries.entry(p).or_insert_with(|| Entry {
            score: 0,
            last_decay: now,
            banned_until: None,
            ban_level: 0,
        });
        decay(params, e, now);

        if let Some(until) = e.banned_until {
            if now < until {
                return Decision::Ban;
            }
            e.banned_until = None;
        }

        e.score = e
            .score
            .saturating_add(delta)
            .clamp(params.min_score, params.max_score);

        if e.score <= params.ban_threshold {
            e.ban_level = e.ban_level.saturating_add(1);
            let secs = backoff_secs(params.ban_base_secs, params.ban_max_secs, e.ban_level);
            e.banned_until = Some(now + Duration::from_secs(secs));
            return Decision::Ban;
        }

        if e.score < 0 {
            Decision::Deprioritize
        } else {
            Decision::Allow
        }
    }
}

fn decay(params: &ScoreParams, e: &mut Entry, now: Instant) {
    let mins = (now.saturating_duration_since(e.last_decay).as_secs() / 60) as i32;
    if mins <= 0 {
        return;
    }
    e.last_decay += Duration::from_secs(mins as u64 * 60);
    let d = params.decay_per_min.saturating_mul(mins);
    if e.score > 0 {
        e.score = (e.score - d).max(0);
    } else if e.score < 0 {
        e.score = (e.score + d).min(0);
    }
}

fn backoff_secs(base: u64, cap: u64, level: u32) -> u64 {
    let pow = level.saturating_sub(1).min(16);
    base.saturating_mul(1u64 << pow).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_content_bans_with_doubling_backoff() {
        let mut s = ProviderScore::new(ScoreParams::default());
        let t0 = Instant::now();
        assert_eq!(s.observe_bad(1u8, t0, BAD_CONTENT), Decision::Ban);
        assert!(s.is_banned(&1, t0 + Duration::from_secs(59)));
        assert!(!s.is_banned(&1, t0 + Duration::from_secs(61)));

        let t1 = t0 + Duration::from_secs(61);
        assert_eq!(s.observe_bad(1, t1, BAD_CONTENT), Decision::Ban);
        assert!(s.is_banned(&1, t1 + Duration::from_secs(100)));
    }

    #[test]
    fn rank_orders_by_score_and_skips_banned() {
        let mut s = ProviderScore::new(ScoreParams::default());
        let t = Instant::now();
        s.observe_good(2u8, t, SERVED_BLOCK);
        s.observe_bad(3u8, t, FAILED_REQUEST);
        s.observe_bad(4u8, t, BAD_CONTENT);
        assert_eq!(s.rank([1, 2, 3, 4], t), vec![2, 1, 3]);
    }

    #[test]
    fn scores_decay_toward_zero() {
        let mut s = ProviderScore::new(ScoreParams::default());
        let t = Instant::now();
        s.observe_good(7u8, t, SERVED_BLOCK);
        assert_eq!(s.score(&7, t + Duration::from_secs(180)), 4);
        assert_eq!(s.score(&7, t + Duration::from_secs(600)), 0);
    }
}
