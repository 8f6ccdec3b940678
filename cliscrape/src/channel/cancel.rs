//! Cancellation of pending channel reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::debug;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancelState {
    requested: AtomicBool,
    /// Operations in flight; nested driver and channel calls each count.
    active: AtomicUsize,
    notify: Notify,
}

/// Handle that interrupts the operation in flight on a channel.
///
/// Cloneable and usable from any task or thread. The interrupted operation
/// fails with [`ChannelError::Cancelled`](crate::error::ChannelError::Cancelled);
/// the transport stays open.
///
/// A cancellation belongs to the operation running when it is requested.
/// One requested while the channel is idle is discarded when the next
/// operation starts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

/// Marks an operation in flight until dropped.
#[derive(Debug)]
pub(crate) struct Operation {
    state: Arc<CancelState>,
}

impl Drop for Operation {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the operation in flight.
    pub fn cancel(&self) {
        self.state.requested.store(true, Ordering::SeqCst);
        // notify_one keeps a permit when nobody is waiting yet
        self.state.notify.notify_one();
    }

    /// Whether a cancellation is pending.
    pub fn is_cancelled(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }

    /// Enter an operation. The outermost one drops any stale request.
    pub(crate) fn begin(&self) -> Operation {
        if self.state.active.fetch_add(1, Ordering::SeqCst) == 0
            && self.state.requested.swap(false, Ordering::SeqCst)
        {
            debug!("channel: discarding cancel requested while idle");
        }
        Operation {
            state: Arc::clone(&self.state),
        }
    }

    /// Consume a pending cancellation, returning whether there was one.
    pub(crate) fn take(&self) -> bool {
        self.state.requested.swap(false, Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    pub(crate) async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.state.notify.notified().await;
        }
    }
}
