//! Completion contexts for result callbacks.
//!
//! Workers never call a consumer's callback directly; they hand it to a
//! [`CallbackExecutor`]. [`InlineExecutor`] runs it immediately on the
//! worker. [`ChannelExecutor`] posts it to a queue the consumer drains on a
//! thread of its choosing, such as a UI event loop.

use tokio::sync::mpsc;

/// A deferred callback invocation.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion callbacks in the consumer's preferred context.
pub trait CallbackExecutor: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

/// Runs callbacks on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Posts callbacks to a [`CallbackQueue`].
#[derive(Clone)]
pub struct ChannelExecutor {
    tx: mpsc::UnboundedSender<Job>,
}

impl ChannelExecutor {
    /// Creates an executor and the queue that runs its callbacks.
    pub fn new() -> (Self, CallbackQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CallbackQueue { rx })
    }
}

impl CallbackExecutor for ChannelExecutor {
    fn execute(&self, job: Job) {
        // Queue dropped: the consumer is gone, nothing to deliver to
        let _ = self.tx.send(job);
    }
}

/// Consumer side of a [`ChannelExecutor`].
pub struct CallbackQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl CallbackQueue {
    /// Runs every callback queued so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits for the next callback and runs it.
    ///
    /// Returns `false` once every executor has been dropped and the queue is empty.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs callbacks until every executor has been dropped.
    pub async fn run_until_closed(&mut self) {
        while self.run_next().await {}
    }
}
