//! Cancellation contexts for long-running watches and external calls.
//!
//! A [`Context`] is handed to every external call and consumption thread.
//! Cancellation is signalled by disconnecting a zero-capacity channel, so a
//! blocked thread can wait on [`Context::done`] inside `crossbeam_channel::select!`
//! alongside its real work.

use crate::error::{ControllerError, Result};
use crossbeam_channel::{bounded, never, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::fmt;

/// Cloneable view of a cancellation signal.
#[derive(Clone)]
pub struct Context {
    done: Receiver<()>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self { done: never() }
    }

    /// A cancellable context and the handle that cancels it.
    ///
    /// Dropping the handle cancels the context as well.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = bounded(0);
        (
            Self { done: rx },
            CancelHandle {
                tx: Mutex::new(Some(tx)),
            },
        )
    }

    /// Receiver that becomes ready (disconnected) once the context is cancelled.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// `Err(Cancelled)` once the context is cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ControllerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Owning side of a cancellable [`Context`].
pub struct CancelHandle {
    tx: Mutex<Option<Sender<()>>>,
}

impl CancelHandle {
    /// Cancel the context. Idempotent.
    pub fn cancel(&self) {
        self.tx.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
