//! Deferred (fire-and-forget) work.
//!
//! Handlers hand work to [`BackgroundTasks`] and respond immediately. The tracker
//! only exists so shutdown and tests can wait for outstanding units; nothing
//! observes their outcome except the log.

use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::{info_span, Instrument};

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` on the runtime inside a `deferred` span tagged with `kind`.
    pub fn spawn<F>(&self, kind: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = info_span!("deferred", task = kind);
        self.tracker.spawn(work.instrument(span));
    }

    /// Units spawned and not yet finished.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait until every unit spawned so far has finished. The tracker accepts new
    /// work again afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
