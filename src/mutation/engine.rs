//! Sequential batch execution of unlist/deprecate requests
//!
//! One batch runs at a time per engine. Starting a batch first cancels the
//! one in flight and waits for it to settle, so two batches never interleave
//! calls against the registry.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::mutation::mutator::PackageMutator;
use crate::mutation::types::{BatchState, ItemOutcome, MutationKind, MutationOutcome, MutationRequest};
use crate::tool::CliError;

pub struct BatchMutationEngine {
    mutator: Arc<dyn PackageMutator>,
    run_lock: AsyncMutex<()>,
    active: Mutex<Option<CancelToken>>,
    state: Mutex<BatchState>,
}

/// Clears the active token and records the final state, even if the batch
/// future is dropped part way through
struct ActiveBatch<'a> {
    engine: &'a BatchMutationEngine,
    final_state: BatchState,
}

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.engine.active.lock() {
            *active = None;
        }
        self.engine.set_state(self.final_state);
    }
}

impl BatchMutationEngine {
    pub fn new(mutator: Arc<dyn PackageMutator>) -> Self {
        Self {
            mutator,
            run_lock: AsyncMutex::new(()),
            active: Mutex::new(None),
            state: Mutex::new(BatchState::Pending),
        }
    }

    /// State of the most recent batch
    pub fn state(&self) -> BatchState {
        self.state.lock().map(|s| *s).unwrap_or(BatchState::Failed)
    }

    fn set_state(&self, state: BatchState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Cancels the batch in flight, if any
    pub fn request_cancel(&self) -> bool {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(token) => {
                    info!("Cancellation requested for running batch");
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Runs every target of `request` in order
    ///
    /// `on_progress(completed, total)` is called after each attempted item.
    /// When the batch cannot start (blank API key, missing CLI) every target
    /// is recorded as failed and progress jumps straight to `(total, total)`.
    /// `cancel` is checked before each item; once it fires, remaining targets
    /// are not attempted and the outcome is marked cancelled.
    pub async fn run<F>(
        &self,
        request: &MutationRequest,
        mut on_progress: F,
        cancel: CancelToken,
    ) -> MutationOutcome
    where
        F: FnMut(usize, usize) + Send,
    {
        if self.request_cancel() {
            info!("Waiting for previous batch to stop");
        }
        let _lock = self.run_lock.lock().await;

        if let Ok(mut active) = self.active.lock() {
            *active = Some(cancel.clone());
        }
        self.set_state(BatchState::Running);
        let mut batch = ActiveBatch {
            engine: self,
            final_state: BatchState::Failed,
        };

        let started_at = Utc::now();
        let total = request.targets.len();
        info!(
            "Starting {:?} batch for {}: {} versions",
            request.kind, request.package, total
        );

        let startup_error = if request.credential.trim().is_empty() {
            Some("API key is empty".to_string())
        } else {
            self.mutator.prepare().await.err().map(|e| e.to_string())
        };

        if let Some(message) = startup_error {
            error!("Batch for {} cannot start: {}", request.package, message);
            let items: Vec<ItemOutcome> = request
                .targets
                .iter()
                .map(|version| ItemOutcome {
                    version: version.clone(),
                    succeeded: false,
                    message: message.clone(),
                })
                .collect();
            // every target is settled at once
            if total > 0 {
                on_progress(total, total);
            }
            return MutationOutcome {
                items,
                success_count: 0,
                total_count: total,
                cancelled: false,
                state: BatchState::Failed,
                error: Some(message),
                started_at,
                finished_at: Utc::now(),
            };
        }

        let tag = match (&request.kind, &request.reason) {
            (MutationKind::Deprecate, Some(reason)) => Some(reason.to_string()),
            (MutationKind::Deprecate, None) => Some("Reasons: unspecified".to_string()),
            (MutationKind::Delist, _) => None,
        };

        let mut items = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, version) in request.targets.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    "Batch for {} cancelled after {} of {} versions",
                    request.package, index, total
                );
                cancelled = true;
                break;
            }

            let version = version.trim();
            let result = if version.is_empty() {
                Err(None)
            } else {
                self.mutator
                    .unlist(&request.package, version, &request.credential, &cancel)
                    .await
                    .map_err(Some)
            };

            let item = match result {
                Ok(()) => {
                    info!("Unlisted {} {}", request.package, version);
                    let message = match &tag {
                        Some(tag) => {
                            format!("Unlisted in place of deprecation (deprecation API unavailable). {tag}")
                        }
                        None => "Unlisted successfully".to_string(),
                    };
                    ItemOutcome {
                        version: version.to_string(),
                        succeeded: true,
                        message,
                    }
                }
                Err(e) => {
                    let detail = match e {
                        Some(CliError::Cancelled(_)) => {
                            cancelled = true;
                            "Cancelled before completion".to_string()
                        }
                        Some(e) => e.to_string(),
                        None => "Version is empty".to_string(),
                    };
                    warn!("Failed to unlist {} {}: {}", request.package, version, detail);
                    let message = match &tag {
                        Some(tag) => format!("{detail}. {tag}"),
                        None => detail,
                    };
                    ItemOutcome {
                        version: version.to_string(),
                        succeeded: false,
                        message,
                    }
                }
            };
            items.push(item);

            on_progress(index + 1, total);
        }

        let success_count = items.iter().filter(|item| item.succeeded).count();
        let state = if cancelled {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        };
        batch.final_state = state;
        info!(
            "Batch for {} finished: {}/{} successful{}",
            request.package,
            success_count,
            total,
            if cancelled { " (cancelled)" } else { "" }
        );

        MutationOutcome {
            items,
            success_count,
            total_count: total,
            cancelled,
            state,
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::mutator::MockPackageMutator;
    use crate::mutation::types::{DeprecationNote, DeprecationReason};
    use crate::version::types::PackageId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn package() -> PackageId {
        PackageId::new("Contoso.Widgets").unwrap()
    }

    fn targets(versions: &[&str]) -> Vec<String> {
        versions.iter().map(|v| v.to_string()).collect()
    }

    /// Succeeds on every call and cancels the token on the given call
    struct CancellingMutator {
        calls: AtomicUsize,
        cancel_on_call: usize,
    }

    #[async_trait::async_trait]
    impl PackageMutator for CancellingMutator {
        async fn prepare(&self) -> Result<(), CliError> {
            Ok(())
        }

        async fn unlist(
            &self,
            _package: &PackageId,
            _version: &str,
            _credential: &str,
            cancel: &CancelToken,
        ) -> Result<(), CliError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.cancel_on_call {
                cancel.cancel();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_item() {
        let mutator = Arc::new(CancellingMutator {
            calls: AtomicUsize::new(0),
            cancel_on_call: 2,
        });
        let engine = BatchMutationEngine::new(mutator.clone());
        let request = MutationRequest::delist(
            package(),
            "key",
            targets(&["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0"]),
        );
        let mut progress = Vec::new();

        let outcome = engine
            .run(&request, |done, total| progress.push((done, total)), CancelToken::new())
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.state, BatchState::Cancelled);
        assert_eq!(outcome.total_count, 5);
        assert!(outcome.success_count <= 2);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(mutator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(progress, vec![(1, 5), (2, 5)]);
        assert_eq!(engine.state(), BatchState::Cancelled);
        assert!(!engine.request_cancel());
    }

    #[tokio::test]
    async fn deprecate_unlists_once_per_version_and_tags_reason() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().times(1).returning(|| Ok(()));
        mutator
            .expect_unlist()
            .withf(|package, version, credential, _| {
                package.as_str() == "Contoso.Widgets"
                    && (version == "1.0.0" || version == "2.0.0")
                    && credential == "key"
            })
            .times(2)
            .returning(|_, _, _, _| Ok(()));
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let note = DeprecationNote::new(vec![DeprecationReason::Legacy])
            .with_alternative("Contoso.Gadgets", Some("3.0.0"));
        let request = MutationRequest::deprecate(package(), "key", targets(&["1.0.0", "2.0.0"]), note);

        let outcome = engine.run(&request, |_, _| {}, CancelToken::new()).await;

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.state, BatchState::Completed);
        for item in &outcome.items {
            assert!(item.message.contains("deprecation API unavailable"));
            assert!(item.message.contains("Reasons: Legacy"));
            assert!(item.message.contains("Alternative package: Contoso.Gadgets v3.0.0"));
        }
    }

    #[tokio::test]
    async fn item_failure_does_not_abort_the_batch() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().returning(|| Ok(()));
        mutator.expect_unlist().times(3).returning(|_, version, _, _| {
            if version == "1.1.0" {
                Err(CliError::Failed {
                    command: "delete",
                    code: Some(1),
                    message: "Response status code does not indicate success: 403".to_string(),
                })
            } else {
                Ok(())
            }
        });
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let request =
            MutationRequest::delist(package(), "key", targets(&["1.0.0", "1.1.0", "1.2.0"]));
        let mut calls = 0;

        let outcome = engine.run(&request, |_, _| calls += 1, CancelToken::new()).await;

        assert_eq!(calls, 3);
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.total_count, 3);
        assert!(!outcome.cancelled);
        assert!(!outcome.items[1].succeeded);
        assert!(outcome.items[1].message.contains("403"));
        assert_eq!(outcome.items[2].message, "Unlisted successfully");
    }

    #[tokio::test]
    async fn failed_prepare_marks_every_target_failed() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().returning(|| Err(CliError::NotFound));
        mutator.expect_unlist().times(0);
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let request = MutationRequest::delist(package(), "key", targets(&["1.0.0", "1.1.0"]));

        let mut progress = Vec::new();

        let outcome = engine
            .run(&request, |done, total| progress.push((done, total)), CancelToken::new())
            .await;

        assert_eq!(outcome.state, BatchState::Failed);
        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.error.as_deref(), Some("NuGet CLI not found"));
        assert_eq!(progress, vec![(2, 2)]);
        assert_eq!(engine.state(), BatchState::Failed);
    }

    #[tokio::test]
    async fn blank_api_key_fails_batch_without_running_the_cli() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().times(0);
        mutator.expect_unlist().times(0);
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let request = MutationRequest::delist(package(), "  ", targets(&["1.0.0", "1.1.0", "1.2.0"]));
        let mut progress = Vec::new();

        let outcome = engine
            .run(&request, |done, total| progress.push((done, total)), CancelToken::new())
            .await;

        assert_eq!(outcome.state, BatchState::Failed);
        assert_eq!(outcome.error.as_deref(), Some("API key is empty"));
        assert_eq!(outcome.total_count, 3);
        assert!(outcome.items.iter().all(|item| !item.succeeded && item.message == "API key is empty"));
        assert_eq!(progress, vec![(3, 3)]);
    }

    #[tokio::test]
    async fn in_flight_cancellation_marks_batch_cancelled() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().returning(|| Ok(()));
        mutator
            .expect_unlist()
            .times(1)
            .returning(|_, _, _, _| Err(CliError::Cancelled("delete")));
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let request = MutationRequest::delist(package(), "key", targets(&["1.0.0"]));

        let outcome = engine.run(&request, |_, _| {}, CancelToken::new()).await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.items[0].message, "Cancelled before completion");
    }

    #[tokio::test]
    async fn blank_target_is_recorded_without_calling_the_mutator() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().returning(|| Ok(()));
        mutator
            .expect_unlist()
            .withf(|_, version, _, _| version == "1.0.0")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let request = MutationRequest::delist(package(), "key", targets(&[" ", "1.0.0"]));

        let outcome = engine.run(&request, |_, _| {}, CancelToken::new()).await;

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.items[0].message, "Version is empty");
    }

    #[tokio::test]
    async fn pre_cancelled_token_attempts_nothing() {
        let mut mutator = MockPackageMutator::new();
        mutator.expect_prepare().returning(|| Ok(()));
        mutator.expect_unlist().times(0);
        let engine = BatchMutationEngine::new(Arc::new(mutator));
        let request = MutationRequest::delist(package(), "key", targets(&["1.0.0", "1.1.0"]));
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = engine.run(&request, |_, _| {}, cancel).await;

        assert!(outcome.cancelled);
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.total_count, 2);
    }

    /// Blocks every unlist until its token is cancelled
    struct BlockingMutator {
        started: tokio::sync::Notify,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PackageMutator for BlockingMutator {
        async fn prepare(&self) -> Result<(), CliError> {
            Ok(())
        }

        async fn unlist(
            &self,
            _package: &PackageId,
            _version: &str,
            _credential: &str,
            cancel: &CancelToken,
        ) -> Result<(), CliError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            cancel.cancelled().await;
            Err(CliError::Cancelled("delete"))
        }
    }

    #[tokio::test]
    async fn new_batch_cancels_the_running_one_first() {
        let mutator = Arc::new(BlockingMutator {
            started: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let engine = Arc::new(BatchMutationEngine::new(mutator.clone()));

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move {
                let request = MutationRequest::delist(package(), "key", targets(&["1.0.0", "1.1.0"]));
                engine.run(&request, |_, _| {}, CancelToken::new()).await
            })
        };
        mutator.started.notified().await;

        let second_cancel = CancelToken::new();
        second_cancel.cancel();
        let request = MutationRequest::delist(package(), "key", targets(&["2.0.0"]));
        let second = engine.run(&request, |_, _| {}, second_cancel).await;
        let first = first.await.unwrap();

        assert!(first.cancelled);
        assert_eq!(first.items.len(), 1);
        assert!(second.cancelled);
        assert_eq!(mutator.calls.load(Ordering::SeqCst), 1);
    }
}
