/*!
 * Term dictionary access and the matching/registration facade.
 *
 * This module ties the matching cascade together:
 *
 * - `normalize`: canonical comparison form for terms
 * - `similarity`: edit-distance and set-overlap scoring
 * - `matcher`: the exact → normalized → partial → fuzzy cascade
 * - `quality`: score-gated registration of new term pairs
 *
 * Dictionaries themselves live behind the `DictionaryStore` trait; reads go
 * through a TTL `TermCache` so repeated matching passes do not refetch.
 */

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::errors::ConnectorError;

pub mod matcher;
pub mod normalize;
pub mod quality;
pub mod similarity;

pub use matcher::{
    CandidateReason, ConfirmedPair, MatchResult, MatchType, TermCandidate, TermMatcher,
};
pub use normalize::normalize;
pub use quality::{GateOutcome, QualityGate, TermPair};

/// A dictionary entry. Owned by the dictionary collaborator; read-only here
/// except through `DictionaryStore::add_terms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryTerm {
    /// Source-language term
    pub source: String,
    /// Target-language translation
    pub target: String,
    /// Part of speech, when curated
    pub part_of_speech: Option<String>,
    /// Free-form curation notes
    pub notes: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// How often the term has been applied
    pub usage_count: u64,
}

impl DictionaryTerm {
    /// Create a bare term pair
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            part_of_speech: None,
            notes: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            usage_count: 0,
        }
    }
}

/// Result of a bulk term registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOutcome {
    /// Number of terms actually added
    pub added: usize,
    /// Whether the write fully succeeded
    pub success: bool,
}

/// Named-dictionary collaborator contract
#[async_trait]
pub trait DictionaryStore: Send + Sync {
    /// Fetch every term of a named dictionary
    async fn get_all_terms(&self, dict_name: &str) -> Result<Vec<DictionaryTerm>, ConnectorError>;

    /// Bulk-register terms into a named dictionary
    async fn add_terms(
        &self,
        dict_name: &str,
        terms: Vec<DictionaryTerm>,
    ) -> Result<AddOutcome, ConnectorError>;
}

/// In-memory dictionary store, usable directly or as a test double
pub struct MemoryDictionary {
    dictionaries: RwLock<HashMap<String, Vec<DictionaryTerm>>>,
}

impl MemoryDictionary {
    /// Create an empty dictionary store
    pub fn new() -> Self {
        Self {
            dictionaries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryDictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DictionaryStore for MemoryDictionary {
    async fn get_all_terms(&self, dict_name: &str) -> Result<Vec<DictionaryTerm>, ConnectorError> {
        Ok(self
            .dictionaries
            .read()
            .get(dict_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_terms(
        &self,
        dict_name: &str,
        terms: Vec<DictionaryTerm>,
    ) -> Result<AddOutcome, ConnectorError> {
        let added = terms.len();
        self.dictionaries
            .write()
            .entry(dict_name.to_string())
            .or_default()
            .extend(terms);
        Ok(AddOutcome {
            added,
            success: true,
        })
    }
}

struct CachedTerms {
    terms: Vec<DictionaryTerm>,
    expires_at: Instant,
}

/// TTL cache over dictionary reads, keyed by dictionary name.
///
/// The quality gate invalidates the affected dictionary after registering
/// terms, so the next matching pass observes them.
pub struct TermCache {
    entries: RwLock<HashMap<String, CachedTerms>>,
    ttl: Duration,
}

impl TermCache {
    /// Create a cache whose entries live for `ttl_seconds`
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Fetch a dictionary's terms, from cache when fresh
    pub async fn get_or_load(
        &self,
        dict_name: &str,
        dictionary: &dyn DictionaryStore,
    ) -> Result<Vec<DictionaryTerm>, ConnectorError> {
        {
            let entries = self.entries.read();
            if let Some(cached) = entries.get(dict_name) {
                if Instant::now() < cached.expires_at {
                    debug!("term cache hit for '{}'", dict_name);
                    return Ok(cached.terms.clone());
                }
            }
        }

        debug!("term cache miss for '{}'", dict_name);
        let terms = dictionary.get_all_terms(dict_name).await?;

        self.entries.write().insert(
            dict_name.to_string(),
            CachedTerms {
                terms: terms.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok(terms)
    }

    /// Drop the cached entry for a dictionary
    pub fn invalidate(&self, dict_name: &str) {
        self.entries.write().remove(dict_name);
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Facade over matching and registration against a named dictionary.
///
/// A translation job driver calls `match_terms` before the LLM call (confirmed
/// pairs are applied directly) and `register_new_pairs` with whatever new
/// pairs the translation returned.
pub struct TermService {
    matcher: TermMatcher,
    gate: QualityGate,
    cache: TermCache,
    dictionary: Arc<dyn DictionaryStore>,
}

impl TermService {
    /// Default TTL for cached dictionary reads
    const CACHE_TTL_SECONDS: u64 = 600;

    /// Create a service over the given dictionary collaborator
    pub fn new(config: &Config, dictionary: Arc<dyn DictionaryStore>) -> Self {
        Self {
            matcher: TermMatcher::new(config.matching.clone()),
            gate: QualityGate::new(config.quality.clone()),
            cache: TermCache::new(Self::CACHE_TTL_SECONDS),
            dictionary,
        }
    }

    /// Match extracted terms against a named dictionary
    pub async fn match_terms(
        &self,
        dict_name: &str,
        terms: &[String],
    ) -> Result<MatchResult, ConnectorError> {
        let dictionary_terms = self.cache.get_or_load(dict_name, &*self.dictionary).await?;
        Ok(self.matcher.match_terms(terms, &dictionary_terms))
    }

    /// Gate and register new term pairs returned by translation
    pub async fn register_new_pairs(&self, dict_name: &str, pairs: Vec<TermPair>) -> GateOutcome {
        self.gate
            .evaluate_and_register(pairs, &*self.dictionary, dict_name, &self.cache)
            .await
    }
}
