//! Cooperative cancellation for action bodies
//!
//! Cancellation never preempts a running action. The controller flips the
//! token and forgets the run; the action body is expected to poll
//! [`CancellationToken::is_cancelled`] or await
//! [`CancellationToken::cancelled`] at its own suspension points.

use async_channel::{Receiver, Sender};

/// Token handed to every run so the action can observe `cancel()`
///
/// Built on a closed-channel signal: cancelling closes the channel, which
/// wakes every pending [`cancelled`](Self::cancelled) future at once.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    signal: Sender<()>,
    waiter: Receiver<()>,
}

impl CancellationToken {
    /// Create a fresh, uncancelled token
    pub fn new() -> Self {
        let (signal, waiter) = async_channel::bounded(1);
        Self { signal, waiter }
    }

    /// Signal cancellation to every clone of this token
    ///
    /// Returns `true` if this call performed the cancellation, `false` if the
    /// token was already cancelled.
    pub fn cancel(&self) -> bool {
        self.signal.close()
    }

    /// Check whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_closed()
    }

    /// Wait until cancellation is signalled
    ///
    /// Resolves immediately if the token is already cancelled.
    pub async fn cancelled(&self) {
        // Nothing is ever sent, so recv only returns once the channel closes
        let _ = self.waiter.recv().await;
    }

    /// Return `Err(Error::Cancelled)` if cancellation has been signalled
    ///
    /// Convenient as `token.check()?` between steps of an action body.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
