// src/gate.rs
//! Ingestion gate: cheap pass/reject checks run before any expensive stage.
//!
//! Checks run in a fixed order and short-circuit on the first failure:
//! 1. minimum length (title and body present, combined token count),
//! 2. language tag against the allowed set,
//! 3. compiled blocklist patterns over the normalized title+body.
//!
//! The gate is stateless across articles and never produces anything but a
//! verdict; observability is the caller's concern.

use regex::Regex;
use serde::Deserialize;

use crate::article::Article;
use crate::decision::RejectReason;
use crate::text::{normalize_text, token_count};

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Minimum combined token count of title + body.
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
    /// Allowed primary language subtags, e.g. ["en", "ar"].
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub blocklist: Vec<BlockerCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockerCfg {
    pub id: String,
    /// Regex over the normalized title+body (carry `(?i)` for case folding).
    pub pattern: String,
    pub reason: String,
}

fn default_min_tokens() -> usize {
    25
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_min_tokens(),
            languages: default_languages(),
            blocklist: Vec::new(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_tokens == 0 {
            return Err(anyhow::anyhow!("gate: min_tokens must be at least 1"));
        }
        if self.languages.iter().all(|l| l.trim().is_empty()) {
            return Err(anyhow::anyhow!("gate: allowed languages must not be empty"));
        }
        for b in &self.blocklist {
            if b.id.trim().is_empty() {
                return Err(anyhow::anyhow!("gate: blocklist entry with empty id"));
            }
        }
        Ok(())
    }
}

/* ----------------------------
Compiled gate
---------------------------- */

#[derive(Debug)]
struct CompiledBlocker {
    id: String,
    reason: String,
    re: Regex,
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Pass,
    Reject(RejectReason),
}

#[derive(Debug)]
pub struct IngestGate {
    min_tokens: usize,
    languages: Vec<String>,
    blockers: Vec<CompiledBlocker>,
}

impl IngestGate {
    /// Compile the blocklist; a bad pattern is a startup error.
    pub fn new(cfg: &GateConfig) -> anyhow::Result<Self> {
        let blockers = cfg
            .blocklist
            .iter()
            .map(|b| {
                let re = Regex::new(&b.pattern)
                    .map_err(|e| anyhow::anyhow!("blocklist `{}` regex error: {}", b.id, e))?;
                Ok(CompiledBlocker {
                    id: b.id.clone(),
                    reason: b.reason.clone(),
                    re,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let languages = cfg
            .languages
            .iter()
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
            .collect();

        Ok(Self {
            min_tokens: cfg.min_tokens,
            languages,
            blockers,
        })
    }

    /// Run the ordered checks. First failure wins.
    pub fn evaluate(&self, article: &Article) -> GateOutcome {
        // 1) Length: both fields present, combined tokens above the floor.
        if article.title.trim().is_empty() || article.body.trim().is_empty() {
            return GateOutcome::Reject(RejectReason::TooShort);
        }
        let tokens = token_count(&article.title) + token_count(&article.body);
        if tokens < self.min_tokens {
            return GateOutcome::Reject(RejectReason::TooShort);
        }

        // 2) Language: primary subtag must be in the allowed set.
        let lang = article.language_primary();
        if lang.is_empty() || !self.languages.iter().any(|l| l == &lang) {
            return GateOutcome::Reject(RejectReason::WrongLanguage);
        }

        // 3) Blocklist over normalized title+body.
        let text = normalize_text(&format!("{} {}", article.title, article.body));
        for b in &self.blockers {
            if b.re.is_match(&text) {
                tracing::debug!(
                    target: "gate",
                    article_id = %article.id,
                    blocker = %b.id,
                    reason = %b.reason,
                    "blocklist hit"
                );
                return GateOutcome::Reject(RejectReason::Blocklisted);
            }
        }

        GateOutcome::Pass
    }

    /// Id of the first matching blocker, for metric labels. `None` when the
    /// article is not blocklisted.
    pub fn matched_blocker(&self, article: &Article) -> Option<&str> {
        let text = normalize_text(&format!("{} {}", article.title, article.body));
        self.blockers
            .iter()
            .find(|b| b.re.is_match(&text))
            .map(|b| b.id.as_str())
    }
}
