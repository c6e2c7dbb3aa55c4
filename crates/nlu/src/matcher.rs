//! Objection and FAQ matching
//!
//! Resolution order: exact keyword index first, then a fuzzy scan over every
//! entry's keywords. Fuzzy candidates are ranked by score with longer
//! keywords winning ties, and medium-score survivors must share enough
//! characters with the input to be believed.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

use call_agent_core::{AudioRef, ObjectionEntry, ObjectionKind, ObjectionSet};

use crate::similarity::{char_overlap, similarity_ratio, token_overlap};

/// Minimum score under which the character-overlap guard applies
const OVERLAP_GUARD_SCORE: f32 = 0.8;
/// Minimum character-set overlap for a medium-score match to survive
const MIN_CHAR_OVERLAP: f32 = 0.25;

/// How a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    /// Exact hit in the keyword hash index
    DirectLookup,
    /// Keyword equal to the input or present as a whole word
    WholeWord,
    /// Keyword contains the input as a substring
    Substring,
    /// Normalized string-similarity ratio
    Fuzzy,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::DirectLookup => "direct_lookup",
            MatchMethod::WholeWord => "whole_word",
            MatchMethod::Substring => "substring",
            MatchMethod::Fuzzy => "fuzzy",
        }
    }
}

/// Confidence bucket of a surviving match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBucket {
    /// Score ≥ 0.8
    High,
    Medium,
}

impl ConfidenceBucket {
    fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            ConfidenceBucket::High
        } else {
            ConfidenceBucket::Medium
        }
    }
}

/// A resolved objection/FAQ match
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Registry key of the entry (its first keyword, normalized)
    pub key: String,
    pub response: String,
    pub audio_ref: Option<AudioRef>,
    pub kind: ObjectionKind,
    pub score: f32,
    pub method: MatchMethod,
    /// The keyword that produced the score
    pub matched_keyword: String,
    pub confidence: ConfidenceBucket,
}

struct IndexedEntry {
    entry: ObjectionEntry,
    /// Normalized keywords with precompiled whole-word patterns
    keywords: Vec<(String, Regex)>,
    /// Lowercase token set over all keywords, for the hybrid diagnostic score
    tokens: HashSet<String>,
}

impl IndexedEntry {
    fn key(&self) -> &str {
        self.keywords
            .first()
            .map(|(kw, _)| kw.as_str())
            .unwrap_or("")
    }
}

/// Per-theme matcher over a merged objection set
pub struct ObjectionMatcher {
    entries: Vec<IndexedEntry>,
    /// keyword -> entry index; first registration wins on duplicates
    exact: HashMap<String, usize>,
}

impl ObjectionMatcher {
    /// Build from structured entries
    pub fn from_entries(entries: Vec<ObjectionEntry>) -> Self {
        let mut indexed = Vec::with_capacity(entries.len());
        let mut exact: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let idx = indexed.len();
            let mut keywords = Vec::with_capacity(entry.keywords.len());
            let mut tokens = HashSet::new();

            for raw in &entry.keywords {
                let kw = raw.trim().to_lowercase();
                if kw.is_empty() {
                    continue;
                }
                // Whole-word occurrence; regex word boundaries are
                // unicode-aware so accented keywords behave
                let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&kw)))
                    .expect("escaped keyword is a valid pattern");

                match exact.entry(kw.clone()) {
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(idx);
                    }
                    std::collections::hash_map::Entry::Occupied(_) => {
                        // First registration wins; later themes are shadowed
                        // by earlier (general) entries sharing a keyword
                        tracing::warn!(
                            keyword = %kw,
                            theme = %entry.theme,
                            "duplicate keyword shadowed by an earlier entry"
                        );
                    }
                }

                for token in kw.unicode_words() {
                    tokens.insert(token.to_string());
                }
                keywords.push((kw, pattern));
            }

            indexed.push(IndexedEntry {
                entry,
                keywords,
                tokens,
            });
        }

        Self {
            entries: indexed,
            exact,
        }
    }

    /// Build from a merged per-theme set
    pub fn from_set(set: &ObjectionSet) -> Self {
        Self::from_entries(set.entries.clone())
    }

    /// Adapter for the legacy flat phrase -> response datasets
    pub fn from_legacy_map(
        map: &HashMap<String, String>,
        kind: ObjectionKind,
        theme: &str,
    ) -> Self {
        let entries = map
            .iter()
            .map(|(phrase, response)| ObjectionEntry {
                keywords: vec![phrase.clone()],
                response: response.clone(),
                audio_ref: None,
                kind,
                theme: theme.to_string(),
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the best entry for an utterance
    ///
    /// `min_score` rejects weak candidates outright; candidates below the
    /// high-confidence threshold additionally need ≥25% character-set overlap
    /// with the matched keyword. `top_n` bounds the candidate list considered
    /// after ranking.
    pub fn find_best_match(&self, input: &str, min_score: f32, top_n: usize) -> Option<MatchResult> {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        // Exact keyword hit short-circuits the scan
        if let Some(&idx) = self.exact.get(&normalized) {
            let entry = &self.entries[idx];
            return Some(self.result(entry, 1.0, MatchMethod::DirectLookup, &normalized));
        }

        // Fuzzy scan over every entry's keywords
        let mut candidates: Vec<(usize, &str, f32, MatchMethod)> = Vec::new();
        for (idx, indexed) in self.entries.iter().enumerate() {
            for (kw, pattern) in &indexed.keywords {
                let (score, method) = if kw == &normalized || pattern.is_match(&normalized) {
                    (1.0, MatchMethod::WholeWord)
                } else if kw.contains(&normalized) {
                    let ratio = normalized.chars().count() as f32 / kw.chars().count() as f32;
                    (ratio, MatchMethod::Substring)
                } else {
                    (similarity_ratio(&normalized, kw), MatchMethod::Fuzzy)
                };
                candidates.push((idx, kw.as_str(), score, method));
            }
        }

        // Score descending; longer, more specific keywords win ties
        candidates.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.chars().count().cmp(&a.1.chars().count()))
        });
        candidates.truncate(top_n.max(1));

        let (idx, keyword, score, method) = candidates.into_iter().next()?;
        if score < min_score {
            return None;
        }
        if score < OVERLAP_GUARD_SCORE {
            let overlap = char_overlap(&normalized, keyword);
            if overlap < MIN_CHAR_OVERLAP {
                tracing::debug!(
                    input = %normalized,
                    keyword,
                    score,
                    overlap,
                    "fuzzy match rejected by character-overlap guard"
                );
                return None;
            }
        }

        Some(self.result(&self.entries[idx], score, method, keyword))
    }

    /// Score every entry with a hybrid function and return the top N
    ///
    /// Diagnostics only; live routing goes through `find_best_match`.
    pub fn find_all_matches(&self, input: &str, threshold: f32, top_n: usize) -> Vec<MatchResult> {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            return Vec::new();
        }

        let input_tokens: HashSet<String> =
            normalized.unicode_words().map(|t| t.to_string()).collect();

        let mut scored: Vec<(usize, &str, f32)> = Vec::new();
        for (idx, indexed) in self.entries.iter().enumerate() {
            let mut best_similarity = 0.0f32;
            let mut best_keyword = "";
            for (kw, _) in &indexed.keywords {
                let sim = similarity_ratio(&normalized, kw);
                if sim > best_similarity {
                    best_similarity = sim;
                    best_keyword = kw.as_str();
                }
            }
            let overlap = token_overlap(&input_tokens, &indexed.tokens);
            let hybrid = 0.7 * best_similarity + 0.3 * overlap;
            if hybrid >= threshold {
                scored.push((idx, best_keyword, hybrid));
            }
        }

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);

        scored
            .into_iter()
            .map(|(idx, keyword, score)| {
                self.result(&self.entries[idx], score, MatchMethod::Fuzzy, keyword)
            })
            .collect()
    }

    fn result(
        &self,
        indexed: &IndexedEntry,
        score: f32,
        method: MatchMethod,
        keyword: &str,
    ) -> MatchResult {
        MatchResult {
            key: indexed.key().to_string(),
            response: indexed.entry.response.clone(),
            audio_ref: indexed.entry.audio_ref.clone(),
            kind: indexed.entry.kind,
            score,
            method,
            matched_keyword: keyword.to_string(),
            confidence: ConfidenceBucket::from_score(score),
        }
    }
}
