use std::time::Duration;

use conduit_message::MessageEnvelope;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::status::SupervisorStatus;

/// How long a supervisor waits for its plugin's task to exit cleanly after
/// [`SupervisorHandle::stop`] before force-terminating it by dropping the
/// join handle.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A live supervisor: the inbound channel the router delivers envelopes
/// to, a status feed for reporting, and the shutdown control.
pub struct SupervisorHandle {
    pub(crate) name: String,
    pub(crate) inbound_tx: mpsc::Sender<MessageEnvelope>,
    pub(crate) status_rx: watch::Receiver<SupervisorStatus>,
    pub(crate) cancellation: CancellationToken,
    pub(crate) join: JoinHandle<()>,
    pub(crate) capacity: usize,
}

impl SupervisorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SupervisorStatus {
        *self.status_rx.borrow()
    }

    /// The sender the router holds to deliver envelopes to this plugin.
    pub fn inbound(&self) -> &mpsc::Sender<MessageEnvelope> {
        &self.inbound_tx
    }

    pub fn channel_capacity(&self) -> usize {
        self.capacity
    }

    /// Envelopes currently queued but not yet handed to the plugin.
    pub fn channel_len(&self) -> usize {
        self.capacity - self.inbound_tx.capacity()
    }

    /// Signals shutdown (closing the inbound channel is what the run loop
    /// actually observes) and waits up to `grace` for the task to exit.
    /// Past the grace window the join handle is aborted — the plugin's
    /// `stop()` is the designated escape hatch for unblocking I/O before
    /// that happens.
    pub async fn stop(mut self, grace: Duration) {
        self.cancellation.cancel();
        drop(self.inbound_tx);
        if tokio::time::timeout(grace, &mut self.join).await.is_err() {
            tracing::warn!(
                supervisor = %self.name,
                "plugin did not stop within the grace period, aborting its task"
            );
            self.join.abort();
        }
    }
}
