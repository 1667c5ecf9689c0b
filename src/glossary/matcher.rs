/*!
 * Term matching cascade.
 *
 * Resolves extracted terms against a dictionary in four stages, each stage
 * operating only on terms the previous stage left unresolved:
 *
 * 1. Exact — case-sensitive equality with a dictionary source
 * 2. Normalized — equality of canonical forms
 * 3. Partial — term contained in a dictionary source
 * 4. Fuzzy — combined similarity score above threshold
 *
 * Confirmed pairs may be applied directly during translation. Candidates are
 * never applied automatically; they flow into the quality gate.
 */

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::app_config::MatchingConfig;
use crate::glossary::normalize::normalize;
use crate::glossary::similarity::combined;
use crate::glossary::DictionaryTerm;

/// How a confirmed pair was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Raw term equals a dictionary source
    Exact,
    /// Canonical forms are equal
    Normalized,
    /// Term is a substring of a dictionary source
    Partial,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => write!(f, "exact"),
            MatchType::Normalized => write!(f, "normalized"),
            MatchType::Partial => write!(f, "partial"),
        }
    }
}

/// Why a term became a candidate instead of a confirmed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateReason {
    /// Close to an existing dictionary source but not equal
    FuzzyMatch,
    /// Nothing in the dictionary resembles the term
    NewTerm,
}

impl fmt::Display for CandidateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateReason::FuzzyMatch => write!(f, "fuzzy_match"),
            CandidateReason::NewTerm => write!(f, "new_term"),
        }
    }
}

/// A term resolved with enough confidence to apply during translation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedPair {
    /// The input term as extracted
    pub source: String,
    /// The dictionary target translation
    pub target: String,
    /// Which cascade stage resolved the term
    pub match_type: MatchType,
    /// The dictionary source that matched, when it differs from the input
    pub details: Option<String>,
}

/// A term the cascade could not confirm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermCandidate {
    /// The input term as extracted
    pub source: String,
    /// Why the term is a candidate
    pub reason: CandidateReason,
    /// Best combined similarity, present only for fuzzy candidates
    pub similarity: Option<f32>,
    /// The closest dictionary source, present only for fuzzy candidates
    pub details: Option<String>,
}

impl TermCandidate {
    fn new_term(source: &str) -> Self {
        Self {
            source: source.to_string(),
            reason: CandidateReason::NewTerm,
            similarity: None,
            details: None,
        }
    }
}

/// Outcome of one matching pass.
///
/// Every deduplicated input term appears in exactly one of the two buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResult {
    /// Terms resolved by the cascade
    pub confirmed_pairs: Vec<ConfirmedPair>,
    /// Terms routed to the quality gate
    pub new_candidates: Vec<TermCandidate>,
}

/// Dictionary matching cascade
#[derive(Debug, Clone)]
pub struct TermMatcher {
    config: MatchingConfig,
}

impl TermMatcher {
    /// Create a matcher with the given configuration
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Create a matcher with default thresholds
    pub fn with_defaults() -> Self {
        Self::new(MatchingConfig::default())
    }

    /// Match extracted terms against dictionary entries.
    ///
    /// Input terms are deduplicated first (order-preserving). An empty
    /// dictionary turns every term into a new-term candidate.
    pub fn match_terms(&self, terms: &[String], dictionary: &[DictionaryTerm]) -> MatchResult {
        let mut result = MatchResult::default();

        let mut seen: HashSet<&str> = HashSet::new();
        let unique: Vec<&str> = terms
            .iter()
            .map(|t| t.as_str())
            .filter(|t| seen.insert(t))
            .collect();

        if dictionary.is_empty() {
            result.new_candidates = unique.iter().map(|t| TermCandidate::new_term(t)).collect();
            return result;
        }

        // Lookup indices built once per pass; first entry wins on collision
        let mut exact_index: HashMap<&str, &DictionaryTerm> = HashMap::new();
        let mut normalized_index: HashMap<String, &DictionaryTerm> = HashMap::new();
        let mut normalized_sources: Vec<(String, &DictionaryTerm)> =
            Vec::with_capacity(dictionary.len());

        for entry in dictionary {
            exact_index.entry(entry.source.as_str()).or_insert(entry);
            let normalized = normalize(&entry.source);
            normalized_index.entry(normalized.clone()).or_insert(entry);
            normalized_sources.push((normalized, entry));
        }

        // Stages 1-2: exact, then normalized equality
        let mut unresolved: Vec<&str> = Vec::new();
        for term in unique {
            if let Some(entry) = exact_index.get(term) {
                result.confirmed_pairs.push(ConfirmedPair {
                    source: term.to_string(),
                    target: entry.target.clone(),
                    match_type: MatchType::Exact,
                    details: None,
                });
            } else if let Some(entry) = normalized_index.get(&normalize(term)) {
                result.confirmed_pairs.push(ConfirmedPair {
                    source: term.to_string(),
                    target: entry.target.clone(),
                    match_type: MatchType::Normalized,
                    details: Some(entry.source.clone()),
                });
            } else {
                unresolved.push(term);
            }
        }

        // Stage 3: partial containment. A term matched here is excluded from
        // fuzzy matching in the same pass.
        let mut fuzzy_pool: Vec<&str> = Vec::new();
        for term in unresolved {
            let long_enough = term.chars().count() >= self.config.partial_min_length;
            let containing = if long_enough {
                dictionary.iter().find(|e| e.source.contains(term))
            } else {
                None
            };

            match containing {
                Some(entry) => result.confirmed_pairs.push(ConfirmedPair {
                    source: term.to_string(),
                    target: entry.target.clone(),
                    match_type: MatchType::Partial,
                    details: Some(entry.source.clone()),
                }),
                None => fuzzy_pool.push(term),
            }
        }

        // Stage 4: fuzzy scoring on canonical forms. A combined score of 1.0
        // means normalized equality, which stage 2 already resolved.
        let mut fuzzy_candidates: Vec<TermCandidate> = Vec::new();
        for term in fuzzy_pool {
            let normalized_term = normalize(term);
            let mut best: Option<(f32, &DictionaryTerm)> = None;

            for (normalized_source, entry) in &normalized_sources {
                let score = combined(&normalized_term, normalized_source);
                if best.map_or(true, |(b, _)| score > b) {
                    best = Some((score, entry));
                }
            }

            match best {
                Some((score, entry))
                    if score >= self.config.fuzzy_threshold && score < 1.0 =>
                {
                    fuzzy_candidates.push(TermCandidate {
                        source: term.to_string(),
                        reason: CandidateReason::FuzzyMatch,
                        similarity: Some(score),
                        details: Some(entry.source.clone()),
                    });
                }
                _ => result.new_candidates.push(TermCandidate::new_term(term)),
            }
        }

        fuzzy_candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Fuzzy candidates lead, ordered by descending similarity
        fuzzy_candidates.append(&mut result.new_candidates);
        result.new_candidates = fuzzy_candidates;

        result
    }
}
