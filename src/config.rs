// src/config.rs
//! Root configuration for the triage pipeline.
//!
//! Each stage owns its schema next to its engine; this module only composes
//! them, loads TOML, and applies environment overrides. Resolution order for
//! `load_or_default`:
//! 1. `TRIAGE_CONFIG_PATH` (the file must exist when the variable is set),
//! 2. `config/triage.toml` relative to the working directory,
//! 3. the built-in seed.
//!
//! `TRIAGE_DEDUP_SIMILARITY` overrides the dedup threshold afterwards, which
//! keeps one-off sensitivity experiments out of the config file.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::burst::BurstConfig;
use crate::classify::{CategoryRule, ClassifyConfig, KeywordCfg};
use crate::dedup::DedupConfig;
use crate::gate::{BlockerCfg, GateConfig};
use crate::scoring::ScoringConfig;
use crate::tiers::TiersConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/triage.toml";
pub const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
pub const ENV_DEDUP_SIMILARITY: &str = "TRIAGE_DEDUP_SIMILARITY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub burst: BurstConfig,
}

impl TriageConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(raw).context("triage config: TOML parse error")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("triage config: cannot read {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn load_or_default() -> anyhow::Result<Self> {
        let mut cfg = if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            let p = Path::new(&path);
            if !p.exists() {
                return Err(anyhow::anyhow!(
                    "{} points to a missing file: {}",
                    ENV_CONFIG_PATH,
                    path
                ));
            }
            Self::from_path(p)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_path(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            tracing::info!(target: "config", "no config file found, using built-in seed");
            Self::default_seed()
        };

        if let Some(v) = similarity_env_override() {
            tracing::info!(target: "config", threshold = v, "dedup similarity overridden from env");
            cfg.dedup.similarity_threshold = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.gate.validate()?;
        self.classify.validate()?;
        self.tiers.validate()?;
        self.dedup.validate()?;
        self.scoring.validate()?;
        self.burst.validate()?;
        Ok(())
    }

    /// Complete, usable configuration for an Aden-focused deployment. Ships
    /// as the fallback when no file is present and seeds `config/triage.toml`.
    pub fn default_seed() -> Self {
        Self {
            gate: GateConfig {
                min_tokens: 25,
                languages: vec!["en".into(), "ar".into()],
                blocklist: seed_blocklist(),
            },
            classify: ClassifyConfig {
                title_multiplier: 2.0,
                categories: seed_categories(),
            },
            tiers: TiersConfig::default_seed(),
            dedup: DedupConfig::default(),
            scoring: ScoringConfig {
                markers: seed_markers(),
                ..ScoringConfig::default()
            },
            burst: BurstConfig::default(),
        }
    }
}

fn similarity_env_override() -> Option<f32> {
    let raw = std::env::var(ENV_DEDUP_SIMILARITY).ok()?;
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Some(v.clamp(0.0, 1.0)),
        _ => {
            tracing::warn!(
                target: "config",
                value = %raw,
                "ignoring unparsable {}",
                ENV_DEDUP_SIMILARITY
            );
            None
        }
    }
}

fn seed_blocklist() -> Vec<BlockerCfg> {
    [
        (
            "sponsored",
            r"(?i)\bsponsored (content|post|feature)\b",
            "advertising boilerplate",
        ),
        ("horoscope", r"(?i)\b(horoscope|zodiac)\b", "astrology filler"),
        (
            "press-release",
            r"(?i)\b(press release|newswire distribution)\b",
            "republished wire boilerplate",
        ),
    ]
    .into_iter()
    .map(|(id, pattern, reason)| BlockerCfg {
        id: id.to_string(),
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    })
    .collect()
}

fn seed_categories() -> Vec<CategoryRule> {
    fn kw(phrase: &str, weight: f32) -> KeywordCfg {
        KeywordCfg {
            phrase: phrase.to_string(),
            weight,
        }
    }

    vec![
        CategoryRule {
            name: "humanitarian".into(),
            threshold: 2.0,
            keywords: vec![
                kw("flood relief", 2.5),
                kw("aid", 1.5),
                kw("displaced", 2.0),
                kw("shelter", 1.5),
                kw("food insecurity", 2.5),
                kw("cholera", 2.5),
            ],
        },
        CategoryRule {
            name: "security".into(),
            threshold: 2.0,
            keywords: vec![
                kw("ceasefire", 2.0),
                kw("clashes", 2.0),
                kw("airstrike", 2.5),
                kw("checkpoint", 1.5),
                kw("militants", 2.0),
            ],
        },
        CategoryRule {
            name: "politics".into(),
            threshold: 2.0,
            keywords: vec![
                kw("presidential council", 2.5),
                kw("cabinet", 1.5),
                kw("negotiations", 1.5),
                kw("elections", 2.0),
                kw("governor", 1.5),
            ],
        },
        CategoryRule {
            name: "economy".into(),
            threshold: 2.0,
            keywords: vec![
                kw("currency", 2.0),
                kw("fuel imports", 2.5),
                kw("central bank", 2.5),
                kw("exchange rate", 2.0),
                kw("port traffic", 2.0),
            ],
        },
        CategoryRule {
            name: "weather".into(),
            threshold: 2.0,
            keywords: vec![
                kw("heavy rain", 2.0),
                kw("flooding", 2.5),
                kw("cyclone", 3.0),
                kw("heatwave", 2.5),
            ],
        },
    ]
}

fn seed_markers() -> Vec<String> {
    [
        "aden",
        "yemen",
        "sanaa",
        "taiz",
        "hodeidah",
        "mukalla",
        "lahj",
        "abyan",
        "crater",
        "al mansoura",
        "gulf of aden",
        "red sea",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
