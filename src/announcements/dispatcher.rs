//! Delivery dispatcher: the single execution context for present-effects.
//!
//! Host UI calls must happen on one designated thread. Evaluation runs on the
//! tokio runtime and hands the final effect to the dispatcher, which runs
//! jobs one at a time in submission order.
//!
//! Two ways to host the queue:
//! - [`Dispatcher::spawn`] starts a dedicated named thread.
//! - [`Dispatcher::channel`] returns a [`DispatchQueue`] for the host to drain
//!   from its own UI loop.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::EngineError;

type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static IN_DELIVERY: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is running a dispatched job right now.
pub fn in_delivery_context() -> bool {
    IN_DELIVERY.with(Cell::get)
}

fn run_job(job: Job) {
    IN_DELIVERY.with(|flag| flag.set(true));
    job();
    IN_DELIVERY.with(|flag| flag.set(false));
}

/// Handle for submitting work to the delivery context. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

/// Receiving end of a dispatcher, owned by the delivery thread.
pub struct DispatchQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl Dispatcher {
    /// Create a dispatcher whose queue the caller drives.
    pub fn channel() -> (Self, DispatchQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DispatchQueue { rx })
    }

    /// Create a dispatcher backed by a dedicated thread named `name`.
    ///
    /// The thread exits once every `Dispatcher` clone is dropped.
    pub fn spawn(name: &str) -> Result<(Self, std::thread::JoinHandle<()>), EngineError> {
        let (dispatcher, queue) = Self::channel();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || queue.run())
            .map_err(|e| EngineError::DispatcherStart(e.to_string()))?;
        Ok((dispatcher, handle))
    }

    /// Run `f` on the delivery context and wait for its result.
    pub async fn run<F, R>(&self, f: F) -> Result<R, EngineError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f));
            if outcome.is_err() {
                error!("Dispatched job panicked");
            }
            let _ = done_tx.send(outcome.map_err(|_| ()));
        });

        self.tx
            .send(job)
            .map_err(|_| EngineError::DispatcherClosed)?;

        match done_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(())) => Err(EngineError::JobPanicked),
            // Queue dropped before the job ran.
            Err(_) => Err(EngineError::DispatcherClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl DispatchQueue {
    /// Block the current thread running jobs until every sender is dropped.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run(mut self) {
        while let Some(job) = self.rx.blocking_recv() {
            run_job(job);
        }
        debug!("Delivery dispatcher stopped");
    }

    /// Run every job queued right now without blocking. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            run_job(job);
            ran += 1;
        }
        ran
    }
}
