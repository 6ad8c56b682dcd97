use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use arena_core::prelude::{RunId, RunInstance};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),

    #[error("terminal run {0} already stored with different content")]
    Mismatch(RunId),

    #[error("run {0} is not terminal")]
    NotTerminal(RunId),
}

/// Persists terminal runs keyed by run id.
///
/// Writes are idempotent: re-submitting the same terminal result is a no-op. Only
/// [StoreError::Unavailable] is worth retrying; the other variants indicate a caller bug.
pub trait ResultStore: Send + Sync + std::fmt::Debug {
    fn persist(&self, run: &RunInstance) -> Result<(), StoreError>;

    fn fetch(&self, run_id: &RunId) -> Option<RunInstance>;
}

#[derive(Debug, Default)]
pub struct MemoryResultStore {
    runs: RwLock<HashMap<RunId, RunInstance>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn persist(&self, run: &RunInstance) -> Result<(), StoreError> {
        if !run.status.is_terminal() {
            return Err(StoreError::NotTerminal(run.run_id.clone()));
        }

        let mut runs = self.runs.write();
        match runs.get(&run.run_id) {
            Some(existing) if existing == run => Ok(()),
            Some(_) => Err(StoreError::Mismatch(run.run_id.clone())),
            None => {
                runs.insert(run.run_id.clone(), run.clone());
                Ok(())
            }
        }
    }

    fn fetch(&self, run_id: &RunId) -> Option<RunInstance> {
        self.runs.read().get(run_id).cloned()
    }
}

/// Write a terminal run with bounded retry and exponential backoff.
///
/// Only transient unavailability is retried. Exhausting the attempts is fatal for the run's
/// result, the caller decides how loudly to fail.
pub async fn persist_with_retry(
    store: &dyn ResultStore,
    run: &RunInstance,
    attempts: u32,
    base_backoff: Duration,
) -> Result<(), StoreError> {
    let mut backoff = base_backoff;
    let mut last_error = None;

    for attempt in 1..=attempts.max(1) {
        match store.persist(run) {
            Ok(()) => return Ok(()),
            Err(StoreError::Unavailable(msg)) => {
                log::warn!(
                    "Result store unavailable writing run {} (attempt {}/{}): {}",
                    run.run_id,
                    attempt,
                    attempts,
                    msg
                );
                last_error = Some(StoreError::Unavailable(msg));
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| StoreError::Unavailable("no attempts made".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use arena_core::prelude::{RunRequest, RunStatus, ScenarioId};

    fn terminal_run() -> RunInstance {
        let request = RunRequest::new(ScenarioId::new("port-scan"), "tester");
        let mut run = RunInstance::new(arena_core::prelude::RunId::generate(), &request);
        run.advance(RunStatus::Running).unwrap();
        run.advance(RunStatus::Completed).unwrap();
        run
    }

    /// Fails with `Unavailable` a fixed number of times before delegating to a real store.
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemoryResultStore,
        failures_left: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryResultStore::new(),
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    impl ResultStore for FlakyStore {
        fn persist(&self, run: &RunInstance) -> Result<(), StoreError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.persist(run)
        }

        fn fetch(&self, run_id: &RunId) -> Option<RunInstance> {
            self.inner.fetch(run_id)
        }
    }

    #[test]
    fn rejects_non_terminal_runs() {
        let store = MemoryResultStore::new();
        let request = RunRequest::new(ScenarioId::new("port-scan"), "tester");
        let run = RunInstance::new(RunId::generate(), &request);

        let err = store.persist(&run).unwrap_err();
        assert!(matches!(err, StoreError::NotTerminal(_)));
    }

    #[test]
    fn write_is_idempotent() {
        let store = MemoryResultStore::new();
        let run = terminal_run();

        store.persist(&run).unwrap();
        store.persist(&run).unwrap();

        assert_eq!(store.fetch(&run.run_id), Some(run));
    }

    #[test]
    fn divergent_rewrite_is_rejected() {
        let store = MemoryResultStore::new();
        let run = terminal_run();
        store.persist(&run).unwrap();

        let mut divergent = run.clone();
        divergent.requester = "someone-else".to_string();

        let err = store.persist(&divergent).unwrap_err();
        assert!(matches!(err, StoreError::Mismatch(_)));
        // The original write is untouched.
        assert_eq!(store.fetch(&run.run_id), Some(run));
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_unavailability() {
        let store = Arc::new(FlakyStore::new(2));
        let run = terminal_run();

        persist_with_retry(store.as_ref(), &run, 3, Duration::from_millis(1))
            .await
            .unwrap();

        assert_eq!(store.fetch(&run.run_id), Some(run));
    }

    #[tokio::test]
    async fn retry_gives_up_after_bounded_attempts() {
        let store = FlakyStore::new(10);
        let run = terminal_run();

        let err = persist_with_retry(&store, &run, 3, Duration::from_millis(1))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.fetch(&run.run_id).is_none());
    }
}
