//! Bounded-concurrency work queues with per-pool error isolation.
//!
//! Each queue owns a fixed number of worker tasks draining one shared
//! unbounded channel. A handler failure is logged with the pool name and
//! the worker keeps consuming, so one bad unit never stalls the pool. The
//! sender pool runs a single worker, which is what preserves submission
//! order on the wire; the dispatcher pools run two.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::ClientError;

/// A FIFO queue drained by `size` worker tasks.
#[derive(Debug)]
pub(crate) struct WorkQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Spawn the worker tasks. Must be called from within a tokio runtime.
    ///
    /// The handler is invoked once per unit; an `Err` return is reported
    /// through the error boundary and the worker moves on to the next unit.
    pub(crate) fn new<F, Fut>(name: &'static str, size: usize, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|_| {
                let rx = Arc::clone(&rx);
                let handler = handler.clone();
                tokio::spawn(async move {
                    loop {
                        // The receiver lock is released before the unit is
                        // handled, so sibling workers process in parallel.
                        let unit = { rx.lock().await.recv().await };
                        let Some(unit) = unit else {
                            break;
                        };
                        if let Err(e) = handler(unit).await {
                            log::error!("{name} worker: {e}");
                        }
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Enqueue a unit.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Closed` after [`WorkQueue::shutdown`].
    pub(crate) fn push(&self, unit: T) -> Result<(), ClientError> {
        self.tx.send(unit).map_err(|_| ClientError::Closed)
    }

    /// Cloneable enqueue handle for use inside other pools' handlers.
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<T> {
        self.tx.clone()
    }

    /// Abort the worker tasks. Units still queued are dropped.
    pub(crate) fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
