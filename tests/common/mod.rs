/*!
 * Common test utilities shared across the test suite.
 */

use chrono::{Duration, Utc};
use std::sync::Arc;

use transbatch::app_config::Config;
use transbatch::batch::BatchOrchestrator;
use transbatch::connectors::mock::{MockJobProcessor, MockResolver, MockSetup};
use transbatch::store::{MemoryStore, StateStore};

/// Build an orchestrator over a fresh in-memory store with the given
/// setup/job mocks, returning the store for direct inspection
pub fn orchestrator_with(
    setup: MockSetup,
    jobs: MockJobProcessor,
) -> (BatchOrchestrator, Arc<MemoryStore>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let store = Arc::new(MemoryStore::new());
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        Arc::new(MockResolver::new()),
        Arc::new(setup),
        Arc::new(jobs),
        Config::default().batch,
    );
    (orchestrator, store)
}

/// Convenience: a working orchestrator whose tasks complete after one cycle
pub fn working_orchestrator() -> (BatchOrchestrator, Arc<MemoryStore>) {
    orchestrator_with(MockSetup::working(), MockJobProcessor::completing_after(1))
}

/// Turn URL literals into the owned list `create_batch` takes
pub fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

/// Rewrite a stored batch record in place (for manufacturing aged or
/// degraded states that cannot arise quickly through the public API)
pub fn with_stored_batch(
    store: &MemoryStore,
    batch_id: &str,
    edit: impl FnOnce(&mut serde_json::Value),
) {
    let key = format!("batch_{}", batch_id);
    let record = store.get(&key).expect("batch record in store");
    let mut value = record.value;
    edit(&mut value);
    store
        .compare_and_swap(&key, record.version, value, 21_600)
        .expect("swap edited batch record");
}

/// An RFC 3339 timestamp `minutes` in the past
pub fn minutes_ago(minutes: i64) -> String {
    (Utc::now() - Duration::minutes(minutes)).to_rfc3339()
}
