// src/text.rs
//! Shared text primitives: feed-noise cleanup, match folding, tokenization,
//! stopwords, and the stable 64-bit hash used for shingles and shard keys.
//!
//! Every stage that inspects article text goes through these helpers so the
//! gate, the classifier and the deduplicator all agree on what a "token" is.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Normalize raw feed text: decode HTML entities, strip tags, fold smart
/// quotes to ASCII, collapse whitespace. Case is preserved.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Lowercase and replace everything non-alphanumeric with single spaces.
/// The result uses spaces as the only separator, which makes whole-token
/// phrase matching a plain substring check over a space-padded haystack.
pub fn fold_for_match(s: &str) -> String {
    let decoded = normalize_text(s);
    let mut out = String::with_capacity(decoded.len());
    let mut last_was_space = true;
    for ch in decoded.chars() {
        if ch.is_alphanumeric() {
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Whole-token containment over folded text: `aid` never matches `said`.
/// Both sides must already be folded via [`fold_for_match`].
pub fn contains_phrase(folded_haystack: &str, folded_phrase: &str) -> bool {
    if folded_phrase.is_empty() {
        return false;
    }
    let padded = format!(" {} ", folded_haystack);
    padded.contains(&format!(" {} ", folded_phrase))
}

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("tokenizer regex"));

/// Basic, Unicode-friendly tokenizer over already-folded or raw text.
pub fn tokenize(input: &str) -> Vec<String> {
    RE_TOKEN
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Count of word tokens; the gate's cheap length check.
pub fn token_count(input: &str) -> usize {
    RE_TOKEN.find_iter(input).count()
}

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had",
        "has", "have", "he", "her", "his", "if", "in", "into", "is", "it", "its", "no", "not",
        "of", "on", "or", "she", "that", "the", "their", "them", "then", "there", "these",
        "they", "this", "to", "was", "we", "were", "which", "who", "will", "with",
    ]
    .into_iter()
    .collect()
});

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Fold, tokenize and drop stopwords; the dedup fingerprint's token stream.
pub fn content_tokens(s: &str) -> Vec<String> {
    tokenize(&fold_for_match(s))
        .into_iter()
        .filter(|t| !is_stopword(t.as_str()))
        .collect()
}

/// Stable 64-bit hash: SHA-256 truncated to the first 8 bytes (little endian).
/// Collisions are tolerable here; both dedup shingles and shard selection only
/// need a stable, well-distributed value, not cryptographic uniqueness.
pub fn stable_hash64(s: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_entities_and_ws() {
        let s = "  <p>Flood&nbsp;relief\u{201C}arrives\u{201D}</p>\n in <b>Aden</b>  ";
        assert_eq!(normalize_text(s), "Flood relief\"arrives\" in Aden");
    }

    #[test]
    fn fold_lowers_and_drops_punctuation() {
        assert_eq!(
            fold_for_match("Aid convoy — reaches Aden's port!"),
            "aid convoy reaches aden s port"
        );
    }

    #[test]
    fn phrase_match_is_whole_token() {
        let hay = fold_for_match("He said the aid convoy arrived.");
        assert!(contains_phrase(&hay, "aid"));
        assert!(contains_phrase(&hay, "aid convoy"));
        assert!(!contains_phrase(&hay, "id"));
        assert!(!contains_phrase(&hay, "convoy arrived late"));
    }

    #[test]
    fn content_tokens_drop_stopwords() {
        let toks = content_tokens("The floods in Aden have displaced families");
        assert_eq!(toks, vec!["floods", "aden", "displaced", "families"]);
    }

    #[test]
    fn stable_hash_is_deterministic_and_spread() {
        assert_eq!(stable_hash64("aden"), stable_hash64("aden"));
        assert_ne!(stable_hash64("aden"), stable_hash64("adena"));
    }

    #[test]
    fn token_count_counts_words_only() {
        assert_eq!(token_count("Two words."), 2);
        assert_eq!(token_count("   "), 0);
    }
}
