//! Cancellation and deadline context threaded through every store call.
//!
//! A [`Context`] is cheap to clone. Cancellation is a `watch` channel shared
//! by every clone and child; deadlines only ever shrink when deriving a child.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context stopped an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("context cancelled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Cancellation signal plus optional deadline.
#[derive(Clone, Debug)]
pub struct Context {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Fires cancellation for every context derived from [`Context::cancellable`].
///
/// Dropping the handle without calling [`cancel`](Self::cancel) leaves the
/// contexts running.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            cancel: rx,
            deadline: None,
        }
    }

    /// A context that can be cancelled through the returned handle.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::background()
        }
    }

    /// Derive a context sharing this one's cancellation, with a deadline no
    /// later than `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// `Some` once the context is cancelled or past its deadline.
    pub fn err(&self) -> Option<Interrupted> {
        if self.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `fut` to completion unless the context fires first.
    ///
    /// A context that is already done fails without polling `fut`. When the
    /// context fires mid-flight, `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if let Some(reason) = self.err() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Interrupted::Cancelled),
            () = self.deadline_elapsed() => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `duration`, waking early if the context fires.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }

    async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }

    async fn deadline_elapsed(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_runs_to_completion() {
        let ctx = Context::background();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
        assert!(ctx.err().is_none());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let (ctx, handle) = Context::cancellable();
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.run(async { 1 }).await, Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_in_flight_call() {
        let (ctx, handle) = Context::cancellable();
        let task = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.run(tokio::time::sleep(Duration::from_secs(60))).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        assert_eq!(task.await.unwrap(), Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_call() {
        let ctx = Context::with_timeout(Duration::from_millis(100));
        let result = ctx.run(tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
        assert_eq!(ctx.err(), Some(Interrupted::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_does_not_cancel() {
        let (ctx, handle) = Context::cancellable();
        drop(handle);
        let result = ctx.run(tokio::time::sleep(Duration::from_secs(1))).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn child_keeps_earlier_deadline_and_shares_cancel() {
        let parent = Context::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let (root, handle) = Context::cancellable();
        let child = root.child_with_timeout(Duration::from_secs(10));
        handle.cancel();
        assert_eq!(child.err(), Some(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_wakes_on_deadline() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        assert_eq!(
            ctx.sleep(Duration::from_secs(1)).await,
            Err(Interrupted::DeadlineExceeded)
        );
    }
}
