//! Advisory "N products" count for the current category selection.
//!
//! Requests race freely: no sequence numbers and no cancellation of earlier
//! requests. Whichever response arrives last is what the owner displays.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::controller::FilterEvent;
use super::state::CategoryId;
use crate::page::{Page, Target};
use crate::transport::CountSource;

pub struct CountReconciler {
    source: Arc<dyn CountSource>,
    event_tx: mpsc::Sender<FilterEvent>,
    /// Outstanding requests, aborted only on teardown.
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl CountReconciler {
    pub fn new(source: Arc<dyn CountSource>, event_tx: mpsc::Sender<FilterEvent>) -> Self {
        Self {
            source,
            event_tx,
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Request a fresh count for `selected`.
    ///
    /// An empty selection hides the advisory display and issues nothing.
    pub fn reconcile(&mut self, page: &mut dyn Page, selected: &[CategoryId]) {
        if selected.is_empty() {
            page.set_visible(&Target::AdvisoryCount, false);
            return;
        }

        self.handles.retain(|h| !h.is_finished());

        let source = Arc::clone(&self.source);
        let tx = self.event_tx.clone();
        let categories = selected.to_vec();
        let cancel = self.shutdown.child_token();

        tracing::debug!(categories = categories.len(), "Spawning advisory count request");

        self.handles.push(tokio::spawn(async move {
            let result = source.count(&categories, cancel).await;
            let event = FilterEvent::AdvisoryCountResolved { categories, result };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(error = %e, "Failed to send advisory count (receiver dropped)");
            }
        }));
    }

    /// Number of requests that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Abort every outstanding request.
    ///
    /// The reconciler stays usable: requests issued afterwards run under a
    /// fresh shutdown token.
    pub fn destroy(&mut self) {
        std::mem::replace(&mut self.shutdown, CancellationToken::new()).cancel();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for CountReconciler {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;
    use crate::transport::TransportError;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers with the number of categories after a delay keyed on the first id.
    struct DelayedCounts {
        calls: AtomicUsize,
    }

    impl CountSource for DelayedCounts {
        fn count<'a>(
            &'a self,
            categories: &'a [CategoryId],
            _cancel: CancellationToken,
        ) -> BoxFuture<'a, Result<u64, TransportError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = categories
                .first()
                .and_then(|id| id.as_str().parse::<u64>().ok())
                .unwrap_or(0);
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(categories.len() as u64 * 10)
            }
            .boxed()
        }
    }

    /// Resolves only if its token is never cancelled.
    struct CancellableCounts;

    impl CountSource for CancellableCounts {
        fn count<'a>(
            &'a self,
            categories: &'a [CategoryId],
            cancel: CancellationToken,
        ) -> BoxFuture<'a, Result<u64, TransportError>> {
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(TransportError::Aborted),
                    _ = tokio::time::sleep(Duration::from_millis(10)) => Ok(categories.len() as u64),
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_after_destroy_are_not_aborted() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut reconciler = CountReconciler::new(Arc::new(CancellableCounts), tx);
        let mut page = MemoryPage::new(Vec::new());

        reconciler.destroy();
        reconciler.reconcile(&mut page, &[CategoryId::from("3")]);

        match rx.recv().await {
            Some(FilterEvent::AdvisoryCountResolved { result, .. }) => {
                assert_eq!(result.unwrap(), 1);
            }
            other => panic!("expected advisory result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_selection_short_circuits() {
        let source = Arc::new(DelayedCounts {
            calls: AtomicUsize::new(0),
        });
        let (tx, _rx) = mpsc::channel(8);
        let mut reconciler = CountReconciler::new(source.clone(), tx);
        let mut page = MemoryPage::new(Vec::new());
        page.set_visible(&Target::AdvisoryCount, true);

        reconciler.reconcile(&mut page, &[]);

        assert!(!page.is_visible(&Target::AdvisoryCount));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reconciler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_race_and_arrive_out_of_order() {
        let source = Arc::new(DelayedCounts {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let mut reconciler = CountReconciler::new(source.clone(), tx);
        let mut page = MemoryPage::new(Vec::new());

        // Slow request first, fast one second; neither cancels the other
        reconciler.reconcile(&mut page, &[CategoryId::from("500")]);
        reconciler.reconcile(
            &mut page,
            &[CategoryId::from("50"), CategoryId::from("7")],
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        match (first, second) {
            (
                FilterEvent::AdvisoryCountResolved {
                    result: Ok(fast), ..
                },
                FilterEvent::AdvisoryCountResolved {
                    result: Ok(slow), ..
                },
            ) => {
                assert_eq!(fast, 20);
                assert_eq!(slow, 10);
            }
            _ => panic!("expected two advisory results"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_aborts_outstanding() {
        let source = Arc::new(DelayedCounts {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let mut reconciler = CountReconciler::new(source, tx);
        let mut page = MemoryPage::new(Vec::new());

        reconciler.reconcile(&mut page, &[CategoryId::from("1000")]);
        reconciler.destroy();
        drop(reconciler);

        // Sender side is gone once the aborted task is dropped
        assert!(rx.recv().await.is_none());
    }
}
