/*!
 * # transbatch - Bulk Document Translation Orchestration
 *
 * A Rust library for driving resumable bulk translation of documents through
 * an external LLM pipeline.
 *
 * ## Features
 *
 * - Batch lifecycle tracking over many files with pause/resume, cancellation
 *   and health-based auto-recovery
 * - Retry classification (validation / transient / unclassified) with bounded
 *   retry budgets
 * - Priority task queue with admission control and requeue-on-failure
 * - Term dictionary matching cascade (exact, normalized, partial, fuzzy)
 * - Quality-gated registration of new term pairs
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `batch`: Batch records and the orchestration state machine
 * - `queue`: Generic priority task queue
 * - `glossary`: Term normalization, similarity scoring, the matching cascade
 *   and the quality gate
 * - `store`: TTL-bounded state store with compare-and-swap writes
 * - `connectors`: Contracts for the external collaborators (file resolution,
 *   translation setup, job advancement, format adapters)
 * - `errors`: Custom error types and the retry taxonomy
 *
 * Execution is cooperative and poll-driven: clients repeatedly invoke the
 * orchestrator's advance operations; nothing runs in the background.
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod batch;
pub mod connectors;
pub mod errors;
pub mod glossary;
pub mod queue;
pub mod store;

// Re-export main types for easier usage
pub use app_config::Config;
pub use batch::{BatchOrchestrator, BatchRecord, BatchStatus, FileTask, FileTaskStatus};
pub use errors::{BatchError, ConnectorError, ErrorKind, QueueError, StoreError};
pub use glossary::{MatchResult, QualityGate, TermMatcher, TermService};
pub use queue::{QueueTask, TaskQueue};
pub use store::{MemoryStore, StateStore};
