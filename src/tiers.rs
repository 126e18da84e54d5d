//! # Source Tier Registry
//!
//! Maps a source identifier to a trust tier and a numeric weight in
//! `[0.0, 1.0]`.
//!
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases map alternative spellings to canonical source ids.
//! - Fallback order: aliases → exact match → default profile.
//! - Reads resolve against an immutable `Arc` snapshot; administrative
//!   upserts build a new map and swap the snapshot, so concurrent readers
//!   never observe a partially-updated profile.
//! - Includes a built-in `default_seed()` with common wire services and
//!   regional outlets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/* ----------------------------
Tier + profile types
---------------------------- */

/// Discrete trust level. Tier1 is the most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
            Tier::Tier4 => "tier4",
        }
    }
}

/// Resolved trust profile for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Canonical (normalized) source id.
    pub id: String,
    pub tier: Tier,
    /// Trust weight in `[0.0, 1.0]`; defaults to the tier's weight.
    pub weight: f32,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct TiersConfig {
    /// Tier assigned to unknown sources.
    #[serde(default = "default_unknown_tier")]
    pub default_tier: Tier,
    #[serde(default = "default_w_tier1")]
    pub tier1_weight: f32,
    #[serde(default = "default_w_tier2")]
    pub tier2_weight: f32,
    #[serde(default = "default_w_tier3")]
    pub tier3_weight: f32,
    #[serde(default = "default_w_tier4")]
    pub tier4_weight: f32,
    #[serde(default)]
    pub sources: Vec<SourceCfg>,
    /// Aliases mapping non-canonical names → canonical ids.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCfg {
    pub id: String,
    pub tier: Tier,
    /// Optional per-source override of the tier's default weight.
    #[serde(default)]
    pub weight: Option<f32>,
}

fn default_unknown_tier() -> Tier {
    Tier::Tier4
}
fn default_w_tier1() -> f32 {
    1.0
}
fn default_w_tier2() -> f32 {
    0.8
}
fn default_w_tier3() -> f32 {
    0.55
}
fn default_w_tier4() -> f32 {
    0.3
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            default_tier: default_unknown_tier(),
            tier1_weight: default_w_tier1(),
            tier2_weight: default_w_tier2(),
            tier3_weight: default_w_tier3(),
            tier4_weight: default_w_tier4(),
            sources: Vec::new(),
            aliases: HashMap::new(),
        }
    }
}

impl TiersConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for w in [
            self.tier1_weight,
            self.tier2_weight,
            self.tier3_weight,
            self.tier4_weight,
        ] {
            if !w.is_finite() {
                return Err(anyhow::anyhow!("tiers: tier weight must be finite"));
            }
        }
        for s in &self.sources {
            if normalize(&s.id).is_empty() {
                return Err(anyhow::anyhow!("tiers: source entry with empty id"));
            }
            if let Some(w) = s.weight {
                if !w.is_finite() {
                    return Err(anyhow::anyhow!(
                        "tiers: source `{}` weight must be finite",
                        s.id
                    ));
                }
            }
        }
        Ok(())
    }

    fn tier_weight(&self, tier: Tier) -> f32 {
        match tier {
            Tier::Tier1 => self.tier1_weight,
            Tier::Tier2 => self.tier2_weight,
            Tier::Tier3 => self.tier3_weight,
            Tier::Tier4 => self.tier4_weight,
        }
    }

    /// Built-in seed with wire services, international desks and regional
    /// outlets for the Aden focus. Used when no registry is configured.
    pub fn default_seed() -> Self {
        let mut cfg = Self::default();

        for (id, tier, weight) in [
            ("reuters", Tier::Tier1, None),
            ("associated press", Tier::Tier1, None),
            ("afp", Tier::Tier1, None),
            ("bbc", Tier::Tier2, None),
            ("al jazeera", Tier::Tier2, None),
            ("aden times", Tier::Tier2, Some(0.75)),
            ("saba news", Tier::Tier3, None),
            ("yemen monitor", Tier::Tier3, None),
            ("aden al ghad", Tier::Tier3, Some(0.6)),
            ("gulf news digest", Tier::Tier3, None),
        ] {
            cfg.sources.push(SourceCfg {
                id: id.to_string(),
                tier,
                weight,
            });
        }

        for (a, c) in [
            ("ap", "associated press"),
            ("reuters world", "reuters"),
            ("agence france-presse", "afp"),
            ("bbc world service", "bbc"),
            ("aljazeera", "al jazeera"),
            ("al-jazeera english", "al jazeera"),
            ("adentimes.net", "aden times"),
            ("saba", "saba news"),
            ("adenalghad", "aden al ghad"),
        ] {
            cfg.aliases.insert(a.to_string(), c.to_string());
        }

        cfg
    }
}

/* ----------------------------
Registry
---------------------------- */

/// Read-mostly registry shared across pipeline runs. `resolve` clones an
/// `Arc` snapshot under a briefly-held read lock; `upsert` swaps a new map in.
#[derive(Debug)]
pub struct TierRegistry {
    profiles: RwLock<Arc<HashMap<String, SourceProfile>>>,
    aliases: HashMap<String, String>,
    default_tier: Tier,
    default_weight: f32,
}

impl TierRegistry {
    pub fn new(cfg: &TiersConfig) -> Self {
        let mut profiles = HashMap::new();
        for s in &cfg.sources {
            let key = normalize(&s.id);
            if key.is_empty() {
                continue;
            }
            let weight = clamp01(s.weight.unwrap_or_else(|| cfg.tier_weight(s.tier)));
            profiles.insert(
                key.clone(),
                SourceProfile {
                    id: key,
                    tier: s.tier,
                    weight,
                },
            );
        }

        let aliases = cfg
            .aliases
            .iter()
            .map(|(a, c)| (normalize(a), normalize(c)))
            .filter(|(a, c)| !a.is_empty() && !c.is_empty())
            .collect();

        Self {
            profiles: RwLock::new(Arc::new(profiles)),
            aliases,
            default_tier: cfg.default_tier,
            default_weight: clamp01(cfg.tier_weight(cfg.default_tier)),
        }
    }

    /// Resolve a source id to its profile.
    ///
    /// Steps:
    /// 1. Alias lookup (normalized) → canonical id.
    /// 2. Exact profile match.
    /// 3. Default lowest-trust profile carrying the queried id.
    pub fn resolve(&self, source_id: &str) -> SourceProfile {
        let mut key = normalize(source_id);
        if let Some(canon) = self.aliases.get(&key) {
            key = canon.clone();
        }

        let snapshot = self.snapshot();
        if let Some(p) = snapshot.get(&key) {
            return p.clone();
        }

        SourceProfile {
            id: key,
            tier: self.default_tier,
            weight: self.default_weight,
        }
    }

    /// Administrative upsert: replaces or inserts one profile. Copy-on-write,
    /// so in-flight `resolve` calls keep reading the previous snapshot.
    pub fn upsert(&self, profile: SourceProfile) {
        let key = normalize(&profile.id);
        if key.is_empty() {
            tracing::warn!(target: "tiers", "upsert with empty source id ignored");
            return;
        }
        let stored = SourceProfile {
            id: key.clone(),
            tier: profile.tier,
            weight: clamp01(profile.weight),
        };

        let mut guard = self.profiles.write().expect("tier registry lock poisoned");
        let mut next = HashMap::clone(&guard);
        next.insert(key.clone(), stored);
        *guard = Arc::new(next);
        drop(guard);

        tracing::info!(target: "tiers", source = %key, "source profile upserted");
    }

    /// Number of explicitly registered sources.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<HashMap<String, SourceProfile>> {
        Arc::clone(&self.profiles.read().expect("tier registry lock poisoned"))
    }
}

/// Normalize input string: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();

    // Replace common separators with spaces.
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }

    // Replace disruptive punctuation/whitespace with spaces.
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    // Collapse multiple spaces.
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clamp to [0.0, 1.0].
fn clamp01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}
