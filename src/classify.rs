// src/classify.rs
//! Keyword-driven category classifier.
//!
//! Each configured category carries a weighted phrase dictionary and a
//! minimum score. A phrase found in the title counts `title_multiplier`
//! times its weight, a phrase found in the body counts once; a category is
//! reported when the summed score meets its threshold. Matching is
//! whole-token over folded text, so `aid` never fires inside `said`.
//!
//! Deterministic and order-independent: the result only depends on the
//! article text and the loaded dictionaries, and is sorted by category name.

use serde::Deserialize;

use crate::article::Article;
use crate::decision::CategoryMatch;
use crate::text::{contains_phrase, fold_for_match};

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyConfig {
    /// Weight multiplier for title hits.
    #[serde(default = "default_title_multiplier")]
    pub title_multiplier: f32,
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    /// Minimum summed keyword score for the category to be reported.
    pub threshold: f32,
    pub keywords: Vec<KeywordCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordCfg {
    /// Single word or multi-word phrase, matched whole-token.
    pub phrase: String,
    pub weight: f32,
}

fn default_title_multiplier() -> f32 {
    2.0
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            title_multiplier: default_title_multiplier(),
            categories: Vec::new(),
        }
    }
}

impl ClassifyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.title_multiplier.is_finite() || self.title_multiplier <= 0.0 {
            return Err(anyhow::anyhow!(
                "classify: title_multiplier must be finite and positive"
            ));
        }
        if self.categories.is_empty() {
            return Err(anyhow::anyhow!("classify: at least one category is required"));
        }
        for c in &self.categories {
            if c.name.trim().is_empty() {
                return Err(anyhow::anyhow!("classify: category with empty name"));
            }
            if !c.threshold.is_finite() || c.threshold < 0.0 {
                return Err(anyhow::anyhow!(
                    "classify: category `{}` threshold must be finite and >= 0",
                    c.name
                ));
            }
            if c.keywords.is_empty() {
                return Err(anyhow::anyhow!(
                    "classify: category `{}` has no keywords",
                    c.name
                ));
            }
            for k in &c.keywords {
                if fold_for_match(&k.phrase).is_empty() {
                    return Err(anyhow::anyhow!(
                        "classify: category `{}` has an empty keyword phrase",
                        c.name
                    ));
                }
                if !k.weight.is_finite() || k.weight <= 0.0 {
                    return Err(anyhow::anyhow!(
                        "classify: category `{}` keyword `{}` weight must be finite and positive",
                        c.name,
                        k.phrase
                    ));
                }
            }
        }
        Ok(())
    }
}

/* ----------------------------
Compiled classifier
---------------------------- */

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    threshold: f32,
    /// Folded phrases with their weights.
    keywords: Vec<(String, f32)>,
}

#[derive(Debug)]
pub struct CategoryClassifier {
    title_multiplier: f32,
    categories: Vec<CompiledCategory>,
}

impl CategoryClassifier {
    pub fn new(cfg: &ClassifyConfig) -> Self {
        let categories = cfg
            .categories
            .iter()
            .map(|c| CompiledCategory {
                name: c.name.clone(),
                threshold: c.threshold,
                keywords: c
                    .keywords
                    .iter()
                    .map(|k| (fold_for_match(&k.phrase), k.weight))
                    .filter(|(p, _)| !p.is_empty())
                    .collect(),
            })
            .collect();
        Self {
            title_multiplier: cfg.title_multiplier,
            categories,
        }
    }

    /// Zero or more matched categories, sorted by name. Empty is a valid
    /// result and means "uncategorized" downstream.
    pub fn classify(&self, article: &Article) -> Vec<CategoryMatch> {
        let title = fold_for_match(&article.title);
        let body = fold_for_match(&article.body);

        let mut out = Vec::new();
        for cat in &self.categories {
            let mut score = 0.0f32;
            for (phrase, weight) in &cat.keywords {
                if contains_phrase(&title, phrase) {
                    score += weight * self.title_multiplier;
                }
                if contains_phrase(&body, phrase) {
                    score += weight;
                }
            }
            if score >= cat.threshold {
                out.push(CategoryMatch {
                    name: cat.name.clone(),
                    score,
                });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Dominant category name: highest match score, lexicographic tie-break.
    /// Falls back to "uncategorized" when nothing matched.
    pub fn dominant(matches: &[CategoryMatch]) -> &str {
        // `matches` is name-sorted, so a strict `>` keeps the first (and thus
        // lexicographically smallest) name on equal scores.
        let mut best: Option<&CategoryMatch> = None;
        for m in matches {
            if best.map_or(true, |b| m.score > b.score) {
                best = Some(m);
            }
        }
        best.map(|m| m.name.as_str()).unwrap_or("uncategorized")
    }
}
