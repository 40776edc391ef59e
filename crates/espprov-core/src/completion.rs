//! One-shot completion for callback-driven collaborators
//!
//! Native provisioning SDKs report results through callbacks that may fire
//! more than once for a single logical operation. A [`Completer`] can be
//! cloned and handed to such a callback; only the first call to
//! [`Completer::complete`] is delivered, later calls are dropped. The
//! matching [`Completion`] future resolves exactly once.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

// ----------------------------------------------------------------------------
// Completion Pair
// ----------------------------------------------------------------------------

/// Create a linked completer/completion pair
pub fn completion<T>(label: &'static str) -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    let completer = Completer {
        inner: Arc::new(Mutex::new(Some(tx))),
        label,
    };
    (completer, Completion { rx })
}

/// Resolve-once handle given to a collaborator
pub struct Completer<T> {
    inner: Arc<Mutex<Option<oneshot::Sender<T>>>>,
    label: &'static str,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            label: self.label,
        }
    }
}

impl<T> std::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer")
            .field("label", &self.label)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> Completer<T> {
    /// Deliver `value` if nothing has been delivered yet.
    ///
    /// Returns `false` when the completion was already resolved.
    pub fn complete(&self, value: T) -> bool {
        let sender = match self.inner.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                // Receiver may already be gone if the caller stopped waiting
                let _ = tx.send(value);
                true
            }
            None => {
                debug!("Suppressed duplicate {} completion", self.label);
                false
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self.inner.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Error returned when every completer was dropped without resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation was abandoned before completing")]
pub struct Abandoned;

/// Future side of a completion pair
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, Abandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map_err(|_| Abandoned)
    }
}
