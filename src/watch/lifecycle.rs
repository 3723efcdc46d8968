//! Start/stop state shared by the watchers.

use crate::context::{CancelHandle, Context};
use crate::error::Result;
use crate::types::WorkItemId;
use crossbeam_channel::{select, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

enum State {
    Stopped,
    Running {
        /// Distinguishes this run from later ones.
        run: u64,
        cancel: CancelHandle,
    },
}

/// Two-state machine guarding a watcher's consumption thread.
pub(crate) struct Lifecycle {
    state: Mutex<State>,
    next_run: AtomicU64,
}

impl Lifecycle {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Stopped),
            next_run: AtomicU64::new(1),
        })
    }

    /// Transition Stopped -> Running.
    ///
    /// `setup` runs under the lock with the new run's context; on error the
    /// context is cancelled and the state stays Stopped. On success `spawn`
    /// runs after the lock is released and receives the setup output, the
    /// context, and a guard that returns the lifecycle to Stopped when
    /// dropped. Returns `Ok(false)` if already running.
    pub(crate) fn start<T, S, F>(self: &Arc<Self>, setup: S, spawn: F) -> Result<bool>
    where
        S: FnOnce(&Context) -> Result<T>,
        F: FnOnce(T, Context, RunGuard),
    {
        let mut state = self.state.lock();
        if matches!(*state, State::Running { .. }) {
            return Ok(false);
        }

        let (ctx, cancel) = Context::with_cancel();
        let resource = match setup(&ctx) {
            Ok(resource) => resource,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        let run = self.next_run.fetch_add(1, Ordering::SeqCst);
        *state = State::Running { run, cancel };
        drop(state);

        spawn(
            resource,
            ctx,
            RunGuard {
                lifecycle: Arc::clone(self),
                run,
            },
        );
        Ok(true)
    }

    /// Transition Running -> Stopped, cancelling the run. Returns whether a
    /// run was cancelled.
    pub(crate) fn stop(&self) -> bool {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Running { cancel, .. } => {
                cancel.cancel();
                true
            }
            State::Stopped => false,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running { .. })
    }
}

/// Held by a consumption thread. Dropping it marks its run Stopped, unless a
/// `stop` and a newer `start` already replaced it.
pub(crate) struct RunGuard {
    lifecycle: Arc<Lifecycle>,
    run: u64,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = self.lifecycle.state.lock();
        if let State::Running { run, .. } = *state {
            if run == self.run {
                *state = State::Stopped;
            }
        }
    }
}

/// Push `item` onto `tx`, giving up if `ctx` is cancelled first.
///
/// Returns false when the item could not be delivered and the consumption
/// loop should exit.
pub(crate) fn forward(ctx: &Context, tx: &Sender<WorkItemId>, item: WorkItemId) -> bool {
    // `select!` picks at random when both arms are ready.
    if ctx.is_cancelled() {
        return false;
    }
    select! {
        send(tx, item) -> res => res.is_ok(),
        recv(ctx.done()) -> _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::types::TaskId;
    use crossbeam_channel::{bounded, unbounded};

    #[test]
    fn test_start_is_idempotent() {
        let lifecycle = Lifecycle::new();
        let mut guards = Vec::new();

        assert!(lifecycle
            .start(|_| Ok(()), |_, _, guard| guards.push(guard))
            .unwrap());
        assert!(!lifecycle
            .start(|_| Ok(()), |_, _, guard| guards.push(guard))
            .unwrap());

        assert!(lifecycle.is_running());
        assert_eq!(guards.len(), 1);
    }

    #[test]
    fn test_failed_setup_stays_stopped() {
        let lifecycle = Lifecycle::new();
        let mut seen = None;

        let result = lifecycle.start(
            |ctx| {
                seen = Some(ctx.clone());
                Err::<(), _>(ControllerError::Unavailable("down".into()))
            },
            |_, _, _| panic!("spawn must not run"),
        );

        assert_eq!(result, Err(ControllerError::Unavailable("down".into())));
        assert!(!lifecycle.is_running());
        assert!(seen.unwrap().is_cancelled());
    }

    #[test]
    fn test_stop_cancels_and_is_idempotent() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.stop());

        let mut ctx = None;
        let mut _guard = None;
        lifecycle
            .start(
                |_| Ok(()),
                |_, c, g| {
                    ctx = Some(c);
                    _guard = Some(g);
                },
            )
            .unwrap();

        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(ctx.unwrap().is_cancelled());
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_guard_drop_returns_to_stopped() {
        let lifecycle = Lifecycle::new();
        let mut guard = None;
        lifecycle.start(|_| Ok(()), |_, _, g| guard = Some(g)).unwrap();
        assert!(lifecycle.is_running());

        drop(guard);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_stale_guard_leaves_new_run_alone() {
        let lifecycle = Lifecycle::new();
        let mut first = None;
        lifecycle.start(|_| Ok(()), |_, _, g| first = Some(g)).unwrap();
        lifecycle.stop();

        let mut second = None;
        lifecycle.start(|_| Ok(()), |_, _, g| second = Some(g)).unwrap();

        drop(first);
        assert!(lifecycle.is_running());
        drop(second);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_guard_dropped_inside_spawn() {
        let lifecycle = Lifecycle::new();
        lifecycle.start(|_| Ok(()), |_, _, guard| drop(guard)).unwrap();
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_forward_gives_up_on_cancel() {
        let (ctx, cancel) = Context::with_cancel();
        let (tx, _rx) = bounded(0);
        cancel.cancel();
        assert!(!forward(&ctx, &tx, WorkItemId::from(TaskId::from("t1"))));
    }

    #[test]
    fn test_forward_never_sends_once_cancelled() {
        let (ctx, cancel) = Context::with_cancel();
        let (tx, rx) = unbounded();
        cancel.cancel();

        for _ in 0..200 {
            assert!(!forward(&ctx, &tx, WorkItemId::from(TaskId::from("t1"))));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forward_delivers() {
        let ctx = Context::background();
        let (tx, rx) = unbounded();
        assert!(forward(&ctx, &tx, WorkItemId::from(TaskId::from("t1"))));
        assert_eq!(rx.recv().unwrap().task_id(), &TaskId::from("t1"));
    }
}
