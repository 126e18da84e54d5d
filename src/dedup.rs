// src/dedup.rs
//! Semantic near-duplicate detection over a time-windowed fingerprint index.
//!
//! An article's fingerprint is the set of stable 64-bit hashes of its token
//! shingles (overlapping n-grams of the stopword-stripped text), so minor
//! rewrites still collide. Candidates within the retention window are
//! compared by Jaccard similarity over shingle sets; at or above the
//! configured threshold the newcomer is linked to the earlier canonical
//! article instead of being admitted as new.
//!
//! Index layout: N lock shards, each a ring of coarse time slices
//! (`VecDeque`, front = oldest). The check-then-insert runs under the
//! owning shard's lock after an unlocked candidate scan, which makes
//! "read and conditionally insert" atomic per fingerprint bucket without a
//! global lock. Texts too short to shingle fall back to normalized string
//! similarity against other short entries.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::article::Article;
use crate::text::{content_tokens, stable_hash64};

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Tokens per shingle.
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,
    /// Jaccard similarity at or above which two articles are duplicates.
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f32,
    /// How long fingerprints stay comparable.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Granularity of the ring's time slices.
    #[serde(default = "default_slice_minutes")]
    pub slice_minutes: u64,
    /// Number of lock shards.
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Max duplicate ids remembered per canonical entry.
    #[serde(default = "default_max_lineage")]
    pub max_lineage: usize,
    /// Levenshtein similarity threshold for texts too short to shingle.
    #[serde(default = "default_degenerate_similarity")]
    pub degenerate_similarity: f32,
}

fn default_shingle_size() -> usize {
    3
}
fn default_similarity() -> f32 {
    0.6
}
fn default_retention_hours() -> u64 {
    48
}
fn default_slice_minutes() -> u64 {
    60
}
fn default_shards() -> usize {
    16
}
fn default_max_lineage() -> usize {
    32
}
fn default_degenerate_similarity() -> f32 {
    0.9
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            shingle_size: default_shingle_size(),
            similarity_threshold: default_similarity(),
            retention_hours: default_retention_hours(),
            slice_minutes: default_slice_minutes(),
            shards: default_shards(),
            max_lineage: default_max_lineage(),
            degenerate_similarity: default_degenerate_similarity(),
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shingle_size == 0 {
            return Err(anyhow::anyhow!("dedup: shingle_size must be at least 1"));
        }
        for (name, v) in [
            ("similarity_threshold", self.similarity_threshold),
            ("degenerate_similarity", self.degenerate_similarity),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(anyhow::anyhow!("dedup: {} must be within 0.0..=1.0", name));
            }
        }
        if self.retention_hours == 0 {
            return Err(anyhow::anyhow!("dedup: retention_hours must be at least 1"));
        }
        if self.slice_minutes == 0 {
            return Err(anyhow::anyhow!("dedup: slice_minutes must be at least 1"));
        }
        if self.shards == 0 {
            return Err(anyhow::anyhow!("dedup: shards must be at least 1"));
        }
        Ok(())
    }
}

/* ----------------------------
Fingerprint
---------------------------- */

/// Similarity-preserving representation of one article's text.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    /// Sorted, deduplicated shingle hashes. Empty for degenerate texts.
    shingles: Vec<u64>,
    /// Shard selector: the minimum shingle hash (equal-minimum probability of
    /// two sets is exactly their Jaccard similarity, so near-duplicates land
    /// on the same shard with at least threshold probability).
    bucket: u64,
    /// Folded token stream, kept only when the text is too short to shingle.
    folded: Option<String>,
}

impl Fingerprint {
    pub fn of(title: &str, body: &str, shingle_size: usize) -> Self {
        let mut tokens = content_tokens(title);
        tokens.extend(content_tokens(body));

        if tokens.len() < shingle_size {
            let folded = tokens.join(" ");
            return Self {
                shingles: Vec::new(),
                bucket: stable_hash64(&folded),
                folded: Some(folded),
            };
        }

        let mut shingles: Vec<u64> = tokens
            .windows(shingle_size)
            .map(|w| stable_hash64(&w.join(" ")))
            .collect();
        shingles.sort_unstable();
        shingles.dedup();
        let bucket = shingles[0];

        Self {
            shingles,
            bucket,
            folded: None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.folded.is_some()
    }
}

/// Jaccard similarity over two sorted, deduplicated hash sets.
fn jaccard_sorted(a: &[u64], b: &[u64]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut i = 0usize;
    let mut j = 0usize;
    let mut inter = 0usize;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                inter += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - inter;
    inter as f32 / union as f32
}

/* ----------------------------
Windowed index
---------------------------- */

#[derive(Debug)]
struct StoredEntry {
    canonical_id: String,
    seen_at: u64, // unix seconds
    shingles: Vec<u64>,
    folded: Option<String>,
    duplicates: Vec<String>,
}

#[derive(Debug)]
struct TimeSlice {
    /// `seen_at / slice_secs` for every entry in this slice.
    key: u64,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Default)]
struct Shard {
    /// Front = oldest slice.
    slices: VecDeque<TimeSlice>,
}

/// Outcome of one dedup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    New,
    DuplicateOf(String),
}

#[derive(Debug)]
pub struct Deduplicator {
    shingle_size: usize,
    similarity_threshold: f32,
    degenerate_similarity: f32,
    retention_secs: u64,
    slice_secs: u64,
    max_lineage: usize,
    shards: Vec<Mutex<Shard>>,
}

impl Deduplicator {
    pub fn new(cfg: &DedupConfig) -> Self {
        let shards = (0..cfg.shards.max(1))
            .map(|_| Mutex::new(Shard::default()))
            .collect();
        Self {
            shingle_size: cfg.shingle_size.max(1),
            similarity_threshold: cfg.similarity_threshold.clamp(0.0, 1.0),
            degenerate_similarity: cfg.degenerate_similarity.clamp(0.0, 1.0),
            retention_secs: cfg.retention_hours.max(1) * 3600,
            slice_secs: cfg.slice_minutes.max(1) * 60,
            max_lineage: cfg.max_lineage,
            shards,
        }
    }

    /// Check the article against the active window, inserting it as canonical
    /// when nothing similar enough is found. First processed wins ties.
    pub fn check(&self, article: &Article, now: DateTime<Utc>) -> DedupOutcome {
        let fp = Fingerprint::of(&article.title, &article.body, self.shingle_size);
        self.check_fingerprint(&article.id, &fp, now)
    }

    fn check_fingerprint(&self, article_id: &str, fp: &Fingerprint, now: DateTime<Utc>) -> DedupOutcome {
        let now_unix = now.timestamp().max(0) as u64;
        let cutoff = now_unix.saturating_sub(self.retention_secs);
        let own = (fp.bucket % self.shards.len() as u64) as usize;

        // Unlocked candidate scan across all shards (each locked briefly).
        let mut best: Option<(usize, String, f32)> = None;
        for (idx, shard) in self.shards.iter().enumerate() {
            let guard = shard.lock().expect("dedup shard mutex poisoned");
            if let Some((id, sim)) = best_match_in(&guard, fp, cutoff) {
                let better = best.as_ref().map_or(true, |(_, _, b)| sim > *b);
                if better {
                    best = Some((idx, id, sim));
                }
            }
        }

        if let Some((shard_idx, canonical_id, sim)) = best {
            if sim >= self.effective_threshold(fp) {
                self.record_lineage(shard_idx, &canonical_id, article_id);
                return DedupOutcome::DuplicateOf(canonical_id);
            }
        }

        // Conditional insert: re-check under the owning shard's lock so two
        // concurrent near-identical articles cannot both become canonical.
        let mut guard = self.shards[own].lock().expect("dedup shard mutex poisoned");
        if let Some((id, sim)) = best_match_in(&guard, fp, cutoff) {
            if sim >= self.effective_threshold(fp) {
                push_lineage(&mut guard, &id, article_id, self.max_lineage);
                return DedupOutcome::DuplicateOf(id);
            }
        }

        let key = now_unix / self.slice_secs;
        let needs_new_slice = guard.slices.back().map_or(true, |s| s.key != key);
        if needs_new_slice {
            guard.slices.push_back(TimeSlice {
                key,
                entries: Vec::new(),
            });
        }
        guard
            .slices
            .back_mut()
            .expect("slice just ensured")
            .entries
            .push(StoredEntry {
                canonical_id: article_id.to_string(),
                seen_at: now_unix,
                shingles: fp.shingles.clone(),
                folded: fp.folded.clone(),
                duplicates: Vec::new(),
            });

        // Opportunistic trim of fully expired slices at the front.
        evict_expired_slices(&mut guard, cutoff, self.slice_secs);

        DedupOutcome::New
    }

    fn effective_threshold(&self, fp: &Fingerprint) -> f32 {
        if fp.is_degenerate() {
            self.degenerate_similarity
        } else {
            self.similarity_threshold
        }
    }

    fn record_lineage(&self, shard_idx: usize, canonical_id: &str, duplicate_id: &str) {
        let mut guard = self.shards[shard_idx]
            .lock()
            .expect("dedup shard mutex poisoned");
        push_lineage(&mut guard, canonical_id, duplicate_id, self.max_lineage);
    }

    /// Drop fully expired slices from every shard, one shard lock at a time,
    /// so the sweep never stalls concurrent admissions. Returns the number of
    /// purged entries.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let now_unix = now.timestamp().max(0) as u64;
        let cutoff = now_unix.saturating_sub(self.retention_secs);
        let mut purged = 0usize;
        for shard in &self.shards {
            let mut guard = shard.lock().expect("dedup shard mutex poisoned");
            purged += evict_expired_slices(&mut guard, cutoff, self.slice_secs);
        }
        purged
    }

    /// Entries currently held across all shards (expired-but-unswept included).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .expect("dedup shard mutex poisoned")
                    .slices
                    .iter()
                    .map(|sl| sl.entries.len())
                    .sum::<usize>()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duplicate ids recorded under a canonical entry, for audit.
    pub fn lineage_of(&self, canonical_id: &str) -> Option<Vec<String>> {
        for shard in &self.shards {
            let guard = shard.lock().expect("dedup shard mutex poisoned");
            for slice in &guard.slices {
                for e in &slice.entries {
                    if e.canonical_id == canonical_id {
                        return Some(e.duplicates.clone());
                    }
                }
            }
        }
        None
    }
}

/// Best candidate in one shard: `(canonical_id, similarity)` of the highest-
/// similarity live entry comparable with `fp`.
fn best_match_in(shard: &Shard, fp: &Fingerprint, cutoff: u64) -> Option<(String, f32)> {
    let mut best: Option<(String, f32)> = None;
    for slice in &shard.slices {
        for e in &slice.entries {
            if e.seen_at < cutoff {
                continue; // expired but not yet swept
            }
            let sim = match (&fp.folded, &e.folded) {
                (None, None) => jaccard_sorted(&fp.shingles, &e.shingles),
                (Some(a), Some(b)) => strsim::normalized_levenshtein(a, b) as f32,
                // Shingleable and degenerate texts are never comparable.
                _ => continue,
            };
            if best.as_ref().map_or(true, |(_, b)| sim > *b) {
                best = Some((e.canonical_id.clone(), sim));
            }
        }
    }
    best
}

fn push_lineage(shard: &mut Shard, canonical_id: &str, duplicate_id: &str, max_lineage: usize) {
    for slice in shard.slices.iter_mut() {
        for e in slice.entries.iter_mut() {
            if e.canonical_id == canonical_id {
                if e.duplicates.len() < max_lineage {
                    e.duplicates.push(duplicate_id.to_string());
                }
                return;
            }
        }
    }
}

/// A slice is fully expired when its last possible timestamp is behind the
/// cutoff. Entries inside a still-live slice age out individually via the
/// `seen_at` check in `best_match_in`.
fn evict_expired_slices(shard: &mut Shard, cutoff: u64, slice_secs: u64) -> usize {
    let mut purged = 0usize;
    while let Some(front) = shard.slices.front() {
        let slice_end = (front.key + 1).saturating_mul(slice_secs);
        if slice_end <= cutoff {
            purged += shard
                .slices
                .pop_front()
                .map(|s| s.entries.len())
                .unwrap_or(0);
        } else {
            break;
        }
    }
    purged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const BODY_A: &str = "Relief convoys carrying food and medicine reached the flooded districts \
        of Aden on Tuesday morning, aid workers said, after days of heavy rain cut off several \
        neighbourhoods from the city centre. Hospitals in Crater received dozens of families \
        seeking shelter, the local health office added.";
    // Same wire copy with one verb swapped, the kind of edit a syndicating
    // outlet makes.
    const BODY_B: &str = "Relief convoys carrying food and medicine reached the flooded districts \
        of Aden on Tuesday morning, aid workers reported, after days of heavy rain cut off several \
        neighbourhoods from the city centre. Hospitals in Crater received dozens of families \
        seeking shelter, the local health office added.";
    const BODY_OTHER: &str = "The central bank announced new measures to stabilise the currency on \
        Monday, citing pressure on fuel imports and a widening gap between official and street \
        exchange rates across the southern governorates.";

    fn dedup() -> Deduplicator {
        Deduplicator::new(&DedupConfig::default())
    }

    fn at(hours: i64, minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap()
            + Duration::hours(hours)
            + Duration::minutes(minutes)
    }

    fn article(id: &str, title: &str, body: &str) -> Article {
        Article::new(id, "reuters", title, body, at(0, 0), "en")
    }

    #[test]
    fn near_identical_text_is_linked_to_first_processed() {
        let d = dedup();
        let a = article("a-1", "Flood relief reaches Aden", BODY_A);
        let b = article("b-2", "Flood relief arrives in Aden", BODY_B);

        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        assert_eq!(
            d.check(&b, at(0, 10)),
            DedupOutcome::DuplicateOf("a-1".into())
        );
        assert_eq!(d.lineage_of("a-1").unwrap(), vec!["b-2".to_string()]);
    }

    #[test]
    fn resubmitting_the_identical_article_never_creates_a_second_canonical() {
        let d = dedup();
        let a = article("a-1", "Flood relief reaches Aden", BODY_A);
        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        assert_eq!(
            d.check(&a, at(0, 1)),
            DedupOutcome::DuplicateOf("a-1".into())
        );
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn unrelated_articles_are_both_new() {
        let d = dedup();
        let a = article("a-1", "Flood relief reaches Aden", BODY_A);
        let b = article("b-2", "Central bank moves on currency", BODY_OTHER);
        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        assert_eq!(d.check(&b, at(0, 5)), DedupOutcome::New);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn entries_age_out_of_the_comparison_window() {
        let d = dedup();
        let a = article("a-1", "Flood relief reaches Aden", BODY_A);
        let b = article("b-2", "Flood relief arrives in Aden", BODY_B);
        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        // 49h later, outside the 48h retention window: no longer comparable.
        assert_eq!(d.check(&b, at(49, 0)), DedupOutcome::New);
    }

    #[test]
    fn purge_drops_expired_slices_and_reports_counts() {
        let d = dedup();
        let a = article("a-1", "Flood relief reaches Aden", BODY_A);
        let b = article("b-2", "Central bank moves on currency", BODY_OTHER);
        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        assert_eq!(d.check(&b, at(0, 5)), DedupOutcome::New);
        assert_eq!(d.purge_expired(at(1, 0)), 0, "nothing expired after 1h");
        assert_eq!(d.purge_expired(at(50, 0)), 2);
        assert!(d.is_empty());
    }

    #[test]
    fn short_texts_fall_back_to_string_similarity() {
        let cfg = DedupConfig {
            shingle_size: 3,
            ..DedupConfig::default()
        };
        let d = Deduplicator::new(&cfg);
        // Two content tokens each after stopword removal: below shingle width.
        let a = article("a-1", "", "Aden flooding");
        let b = article("b-2", "", "Aden floodings");
        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        assert_eq!(
            d.check(&b, at(0, 1)),
            DedupOutcome::DuplicateOf("a-1".into())
        );
        // A short text never collides with a long one.
        let c = article("c-3", "Flood relief reaches Aden", BODY_A);
        assert_eq!(d.check(&c, at(0, 2)), DedupOutcome::New);
    }

    #[test]
    fn lineage_is_capped() {
        let cfg = DedupConfig {
            max_lineage: 2,
            ..DedupConfig::default()
        };
        let d = Deduplicator::new(&cfg);
        let a = article("a-1", "Flood relief reaches Aden", BODY_A);
        assert_eq!(d.check(&a, at(0, 0)), DedupOutcome::New);
        for i in 0..5 {
            let dup = article(&format!("dup-{i}"), "Flood relief reaches Aden", BODY_A);
            assert_eq!(
                d.check(&dup, at(0, i + 1)),
                DedupOutcome::DuplicateOf("a-1".into())
            );
        }
        assert_eq!(d.lineage_of("a-1").unwrap().len(), 2);
    }

    #[test]
    fn concurrent_identical_submissions_yield_exactly_one_canonical() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let d = Arc::new(dedup());
        let news = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for i in 0..8 {
            let dd = Arc::clone(&d);
            let nn = Arc::clone(&news);
            handles.push(std::thread::spawn(move || {
                let a = article(&format!("t-{i}"), "Flood relief reaches Aden", BODY_A);
                if dd.check(&a, at(0, 0)) == DedupOutcome::New {
                    nn.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().expect("thread join");
        }
        assert_eq!(news.load(Ordering::SeqCst), 1, "single canonical under races");
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn jaccard_on_disjoint_and_identical_sets() {
        assert!((jaccard_sorted(&[1, 2, 3], &[1, 2, 3]) - 1.0).abs() < 1e-6);
        assert!(jaccard_sorted(&[1, 2, 3], &[4, 5, 6]).abs() < 1e-6);
        assert!((jaccard_sorted(&[1, 2, 3, 4], &[3, 4, 5, 6]) - 2.0 / 6.0).abs() < 1e-6);
        assert!(jaccard_sorted(&[], &[1]).abs() < 1e-6);
    }
}
