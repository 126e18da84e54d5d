// src/scoring.rs
//! Heuristic relevance scoring for articles that survived gate, classify and
//! dedup. Four bounded signals are combined into a 0-100 score:
//!
//!   category    strongest matched category, saturating
//!   trust       the resolved source profile's weight
//!   recency     linear decay from 1.0 now to a floor at the horizon
//!   specificity distinct locality markers found in the text
//!
//! The combination is a weighted mean, so disabling a signal is a matter of
//! zeroing its weight in config. Scoring is pure: the clock arrives as an
//! argument and the same inputs always produce the same score.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::article::Article;
use crate::decision::{CategoryMatch, ScoreBreakdown};
use crate::text::{contains_phrase, fold_for_match};
use crate::tiers::SourceProfile;

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_w_category")]
    pub w_category: f32,
    #[serde(default = "default_w_trust")]
    pub w_trust: f32,
    #[serde(default = "default_w_recency")]
    pub w_recency: f32,
    #[serde(default = "default_w_specificity")]
    pub w_specificity: f32,
    /// Category keyword score at which the category signal reaches 1.0.
    #[serde(default = "default_category_saturation")]
    pub category_saturation: f32,
    /// Age at which the recency signal bottoms out at `recency_floor`.
    #[serde(default = "default_recency_horizon_hours")]
    pub recency_horizon_hours: u64,
    #[serde(default = "default_recency_floor")]
    pub recency_floor: f32,
    /// Locality markers, matched whole-phrase against the folded text.
    #[serde(default)]
    pub markers: Vec<String>,
    /// Distinct marker hits at which the specificity signal reaches 1.0.
    #[serde(default = "default_markers_for_full_bonus")]
    pub markers_for_full_bonus: usize,
}

fn default_w_category() -> f32 {
    1.0
}
fn default_w_trust() -> f32 {
    1.0
}
fn default_w_recency() -> f32 {
    1.0
}
fn default_w_specificity() -> f32 {
    0.5
}
fn default_category_saturation() -> f32 {
    6.0
}
fn default_recency_horizon_hours() -> u64 {
    72
}
fn default_recency_floor() -> f32 {
    0.1
}
fn default_markers_for_full_bonus() -> usize {
    3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_category: default_w_category(),
            w_trust: default_w_trust(),
            w_recency: default_w_recency(),
            w_specificity: default_w_specificity(),
            category_saturation: default_category_saturation(),
            recency_horizon_hours: default_recency_horizon_hours(),
            recency_floor: default_recency_floor(),
            markers: Vec::new(),
            markers_for_full_bonus: default_markers_for_full_bonus(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let weights = [
            ("w_category", self.w_category),
            ("w_trust", self.w_trust),
            ("w_recency", self.w_recency),
            ("w_specificity", self.w_specificity),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(anyhow::anyhow!("scoring: {} must be finite and >= 0", name));
            }
        }
        let sum: f32 = weights.iter().map(|(_, w)| w).sum();
        if sum <= 0.0 {
            return Err(anyhow::anyhow!("scoring: at least one weight must be > 0"));
        }
        if !self.category_saturation.is_finite() || self.category_saturation <= 0.0 {
            return Err(anyhow::anyhow!("scoring: category_saturation must be > 0"));
        }
        if self.recency_horizon_hours == 0 {
            return Err(anyhow::anyhow!(
                "scoring: recency_horizon_hours must be at least 1"
            ));
        }
        if !self.recency_floor.is_finite() || !(0.0..=1.0).contains(&self.recency_floor) {
            return Err(anyhow::anyhow!(
                "scoring: recency_floor must be within 0.0..=1.0"
            ));
        }
        if self.markers_for_full_bonus == 0 {
            return Err(anyhow::anyhow!(
                "scoring: markers_for_full_bonus must be at least 1"
            ));
        }
        for m in &self.markers {
            if fold_for_match(m).is_empty() {
                return Err(anyhow::anyhow!("scoring: marker `{}` folds to nothing", m));
            }
        }
        Ok(())
    }
}

/* ----------------------------
Scorer
---------------------------- */

#[derive(Debug)]
pub struct HeuristicScorer {
    w_category: f32,
    w_trust: f32,
    w_recency: f32,
    w_specificity: f32,
    category_saturation: f32,
    horizon_secs: u64,
    recency_floor: f32,
    /// Folded at construction so per-article work is match-only.
    markers: Vec<String>,
    markers_for_full_bonus: usize,
}

impl HeuristicScorer {
    pub fn new(cfg: &ScoringConfig) -> Self {
        let markers = cfg
            .markers
            .iter()
            .map(|m| fold_for_match(m))
            .filter(|m| !m.is_empty())
            .collect();
        Self {
            w_category: cfg.w_category.max(0.0),
            w_trust: cfg.w_trust.max(0.0),
            w_recency: cfg.w_recency.max(0.0),
            w_specificity: cfg.w_specificity.max(0.0),
            category_saturation: cfg.category_saturation.max(f32::EPSILON),
            horizon_secs: cfg.recency_horizon_hours.max(1) * 3600,
            recency_floor: clamp01(cfg.recency_floor),
            markers,
            markers_for_full_bonus: cfg.markers_for_full_bonus.max(1),
        }
    }

    /// Score one article against its matched categories and source profile.
    pub fn score(
        &self,
        article: &Article,
        categories: &[CategoryMatch],
        profile: &SourceProfile,
        now: DateTime<Utc>,
    ) -> (f32, ScoreBreakdown) {
        let breakdown = ScoreBreakdown {
            category: self.category_signal(categories),
            trust: clamp01(profile.weight),
            recency: self.recency_signal(article.age_secs(now)),
            specificity: self.specificity_signal(&self.marker_hits(article)),
        };
        (self.combine(&breakdown), breakdown)
    }

    /// Distinct configured markers found in the article, sorted. Also feeds
    /// the burst controller's cluster key, so order must be stable.
    pub fn marker_hits(&self, article: &Article) -> Vec<String> {
        let folded = fold_for_match(&format!("{} {}", article.title, article.body));
        let mut hits: Vec<String> = self
            .markers
            .iter()
            .filter(|m| contains_phrase(&folded, m))
            .cloned()
            .collect();
        hits.sort();
        hits.dedup();
        hits
    }

    fn category_signal(&self, categories: &[CategoryMatch]) -> f32 {
        let strongest = categories.iter().map(|c| c.score).fold(0.0f32, f32::max);
        clamp01(strongest / self.category_saturation)
    }

    fn recency_signal(&self, age_secs: u64) -> f32 {
        if age_secs >= self.horizon_secs {
            return self.recency_floor;
        }
        let remaining = (self.horizon_secs - age_secs) as f32 / self.horizon_secs as f32;
        self.recency_floor + (1.0 - self.recency_floor) * remaining
    }

    fn specificity_signal(&self, hits: &[String]) -> f32 {
        clamp01(hits.len() as f32 / self.markers_for_full_bonus as f32)
    }

    /// Weighted mean of the bounded signals, scaled to 0-100.
    fn combine(&self, b: &ScoreBreakdown) -> f32 {
        let weighted = self.w_category * b.category
            + self.w_trust * b.trust
            + self.w_recency * b.recency
            + self.w_specificity * b.specificity;
        let total = (self.w_category + self.w_trust + self.w_recency + self.w_specificity)
            .max(1e-6);
        ((weighted / total) * 100.0).clamp(0.0, 100.0)
    }
}

fn clamp01(v: f32) -> f32 {
    if v < 0.0 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}
