//! decision.rs — Output shapes for the triage pipeline: verdicts, reject
//! reasons, category matches, and the per-signal score breakdown.
//!
//! One `Decision` is produced per article, immutable, and handed to the
//! external persistence/serving collaborator. The breakdown fields exist for
//! explainability: a reader should be able to tell why an article ranked
//! where it did without re-running the pipeline.

use serde::{Deserialize, Serialize};

use crate::tiers::Tier;

/// Terminal outcome of one pipeline pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Passed every stage; score stands as computed.
    Admitted,
    /// Admitted into an already-busy topic cluster; score carries a penalty.
    Downranked,
    /// Hard-dropped by the burst controller.
    Suppressed,
    /// Near-duplicate of an earlier canonical article.
    Duplicate,
    /// Culled by the ingestion gate.
    Rejected,
}

/// Why the ingestion gate culled an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooShort,
    WrongLanguage,
    Blocklisted,
}

impl RejectReason {
    /// Stable label for logs and metric dimensions.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TooShort => "too_short",
            RejectReason::WrongLanguage => "wrong_language",
            RejectReason::Blocklisted => "blocklisted",
        }
    }
}

/// One matched category with its keyword match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub name: String,
    pub score: f32,
}

/// Normalized sub-scores in <0.0, 1.0> that fed the composite.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub category: f32,
    pub trust: f32,
    pub recency: f32,
    pub specificity: f32,
}

/// Complete per-article decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub article_id: String,
    pub verdict: Verdict,
    /// Matched categories, sorted by name. Empty means uncategorized.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryMatch>,
    /// Composite relevance score in <0.0, 100.0>. Zero for rejects/duplicates.
    pub score: f32,
    /// Resolved source tier. `None` only when the gate short-circuited
    /// before the registry was consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Canonical article id when `verdict` is `Duplicate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    /// Gate reason when `verdict` is `Rejected`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl Decision {
    /// Gate cull: no categories, no tier, no score.
    pub fn rejected(article_id: impl Into<String>, reason: RejectReason) -> Self {
        Self {
            article_id: article_id.into(),
            verdict: Verdict::Rejected,
            categories: Vec::new(),
            score: 0.0,
            tier: None,
            duplicate_of: None,
            reject_reason: Some(reason),
            breakdown: None,
        }
    }

    /// Near-duplicate: keeps the already-resolved categories and tier so the
    /// lineage record is self-describing, but never carries a score.
    pub fn duplicate(
        article_id: impl Into<String>,
        canonical_id: impl Into<String>,
        categories: Vec<CategoryMatch>,
        tier: Tier,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            verdict: Verdict::Duplicate,
            categories,
            score: 0.0,
            tier: Some(tier),
            duplicate_of: Some(canonical_id.into()),
            reject_reason: None,
            breakdown: None,
        }
    }

    /// Fully scored outcome (Admitted, Downranked or Suppressed).
    pub fn scored(
        article_id: impl Into<String>,
        verdict: Verdict,
        categories: Vec<CategoryMatch>,
        score: f32,
        tier: Tier,
        breakdown: ScoreBreakdown,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            verdict,
            categories,
            score: score.clamp(0.0, 100.0),
            tier: Some(tier),
            duplicate_of: None,
            reject_reason: None,
            breakdown: Some(breakdown),
        }
    }

    /// True for verdicts the serving layer should surface (possibly demoted).
    pub fn is_visible(&self) -> bool {
        matches!(self.verdict, Verdict::Admitted | Verdict::Downranked)
    }
}
