//! The delivery context.
//!
//! Engine events arrive on arbitrary threads. Anything that touches
//! application-visible state is handed to a single dedicated thread through an
//! unbounded channel and run there in FIFO order.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    thread::{self, ThreadId},
};

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info_span, trace};

use super::CoordinatorError;
use crate::constants::DELIVERY_THREAD_NAME;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer task queue bound to one OS thread.
///
/// Dropping the queue closes the channel; the thread runs whatever is still
/// queued and exits.
#[derive(Debug)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Task>,
    thread_id: ThreadId,
}

impl DeliveryQueue {
    /// Spawn the delivery thread.
    pub fn start() -> Result<Self, CoordinatorError> {
        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let handle = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || Self::run(rx))
            .map_err(|source| CoordinatorError::DeliveryStart { source })?;
        Ok(Self {
            tx,
            thread_id: handle.thread().id(),
        })
    }

    fn run(mut rx: mpsc::UnboundedReceiver<Task>) {
        let span = info_span!("delivery");
        let _entered = span.enter();
        trace!("Delivery thread started");
        while let Some(task) = rx.blocking_recv() {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                error!("Delivery task panicked");
            }
        }
        trace!("Delivery thread exiting");
    }

    /// Queue `task` to run on the delivery thread. Never blocks.
    pub fn dispatch(&self, task: impl FnOnce() + Send + 'static) -> Result<(), CoordinatorError> {
        self.tx
            .send(Box::new(task))
            .map_err(|_| CoordinatorError::DeliveryClosed)
    }

    /// Check if the caller is running on the delivery thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Block until every task queued before this call has run.
    ///
    /// Returns immediately when called from the delivery thread itself.
    pub fn flush(&self) -> Result<(), CoordinatorError> {
        if self.is_current() {
            return Ok(());
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = done_tx.send(());
        })?;
        done_rx
            .blocking_recv()
            .map_err(|_| CoordinatorError::DeliveryClosed)
    }
}
