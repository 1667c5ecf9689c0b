/*!
 * Quality gate for new term registration.
 *
 * Term pairs returned by translation are scored and split into approved,
 * pending and rejected buckets. Approved pairs are registered into the
 * dictionary in bulk; pending pairs are only logged for manual review;
 * rejected pairs are dropped.
 */

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::app_config::QualityConfig;
use crate::glossary::{DictionaryStore, DictionaryTerm, TermCache};

/// A source/target pair proposed by the translation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermPair {
    /// Source-language term
    pub source: String,
    /// Target-language translation
    pub target: String,
    /// Similarity score from matching, if the pair came from a fuzzy candidate
    pub similarity: Option<f32>,
    /// Confidence reported by the translation step
    pub confidence: Option<f32>,
}

impl TermPair {
    /// Create a pair without any score attached
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            similarity: None,
            confidence: None,
        }
    }

    /// Attach a similarity score
    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Attach a confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Score used for gating: similarity when present, else confidence, else 0
    pub fn score(&self) -> f32 {
        self.similarity.or(self.confidence).unwrap_or(0.0)
    }
}

/// Decision buckets from one evaluation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateOutcome {
    /// Pairs at or above the approval threshold
    pub approved: Vec<TermPair>,
    /// Pairs held for manual review (score in [threshold/2, threshold))
    pub pending: Vec<TermPair>,
    /// Pairs below half the threshold, dropped
    pub rejected: Vec<TermPair>,
    /// Approved pairs actually written to the dictionary (after dedup)
    pub registered: usize,
}

/// Score-gated approval and registration of new term pairs
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityConfig,
}

impl QualityGate {
    /// Create a gate with the given configuration
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Create a gate with the default threshold
    pub fn with_defaults() -> Self {
        Self::new(QualityConfig::default())
    }

    /// Evaluate pairs and register the approved ones into the dictionary.
    ///
    /// Approved pairs already present in the dictionary (same source and
    /// target) are not re-written. A writer failure is non-fatal: the pairs
    /// stay approved in the outcome and the failure is logged. The term cache
    /// for the dictionary is invalidated so the next lookup observes newly
    /// registered terms.
    pub async fn evaluate_and_register(
        &self,
        pairs: Vec<TermPair>,
        dictionary: &dyn DictionaryStore,
        dict_name: &str,
        cache: &TermCache,
    ) -> GateOutcome {
        let mut outcome = GateOutcome::default();
        let threshold = self.config.approval_threshold;
        let pending_floor = threshold * 0.5;

        for pair in pairs {
            let score = pair.score();
            if score >= threshold {
                outcome.approved.push(pair);
            } else if score >= pending_floor {
                info!(
                    "pending review: '{}' -> '{}' (score {:.2})",
                    pair.source, pair.target, score
                );
                outcome.pending.push(pair);
            } else {
                outcome.rejected.push(pair);
            }
        }

        if outcome.approved.is_empty() {
            return outcome;
        }

        let existing: HashSet<(String, String)> = match dictionary.get_all_terms(dict_name).await {
            Ok(terms) => terms
                .into_iter()
                .map(|t| (t.source, t.target))
                .collect(),
            Err(e) => {
                warn!("could not read dictionary '{}' for dedup: {}", dict_name, e);
                HashSet::new()
            }
        };

        let to_register: Vec<DictionaryTerm> = outcome
            .approved
            .iter()
            .filter(|p| !existing.contains(&(p.source.clone(), p.target.clone())))
            .map(|p| DictionaryTerm::new(p.source.as_str(), p.target.as_str()))
            .collect();

        if !to_register.is_empty() {
            match dictionary.add_terms(dict_name, to_register.clone()).await {
                Ok(added) => {
                    outcome.registered = added.added;
                    info!(
                        "registered {} new terms into dictionary '{}'",
                        added.added, dict_name
                    );
                }
                Err(e) => {
                    // Non-fatal: approved pairs stay accepted for this pass
                    warn!(
                        "failed to register {} terms into '{}': {}",
                        to_register.len(),
                        dict_name,
                        e
                    );
                }
            }
        }

        cache.invalidate(dict_name);
        outcome
    }
}
