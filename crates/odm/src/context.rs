//! Execution Context
//!
//! A `Context` bounds an operation by an optional deadline and a cancellation
//! token, and carries the store session when the operation runs inside a
//! transaction. Contexts are cheap to clone; clones share the cancellation
//! token.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backends::SessionHandle;
use crate::error::{ModelError, ModelResult, Phase};

#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    session: Option<SessionHandle>,
}

impl Context {
    /// A context without deadline or session
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
            session: None,
        }
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::background()
        }
    }

    /// Derive a context that expires at the earlier of this context's deadline
    /// and `timeout` from now. Canceling the parent cancels the child.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let requested = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(current) if current < requested => current,
            _ => requested,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
            session: self.session.clone(),
        }
    }

    /// Bind this context to a store session
    pub fn with_session(&self, session: SessionHandle) -> Self {
        Self {
            session: Some(session),
            ..self.clone()
        }
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fail fast if the context is already canceled or past its deadline
    pub fn check(&self, phase: Phase) -> ModelResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ModelError::Canceled { phase });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ModelError::DeadlineExceeded { phase });
            }
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the deadline elapses or the context is
    /// canceled first; in that case `fut` is dropped.
    pub async fn guard<F>(&self, phase: Phase, fut: F) -> ModelResult<F::Output>
    where
        F: Future,
    {
        self.check(phase)?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                output = fut => Ok(output),
                _ = tokio::time::sleep_until(deadline) => Err(ModelError::DeadlineExceeded { phase }),
                _ = self.cancel.cancelled() => Err(ModelError::Canceled { phase }),
            },
            None => tokio::select! {
                output = fut => Ok(output),
                _ = self.cancel.cancelled() => Err(ModelError::Canceled { phase }),
            },
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
    use crate::backends::StoreOperation;

    const PHASE: Phase = Phase::Store(StoreOperation::Find);

    #[tokio::test]
    async fn test_background_context_runs_future() {
        let ctx = Context::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert_eq!(ctx.guard(PHASE, async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out_slow_future() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        let result = ctx
            .guard(PHASE, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                1
            })
            .await;
        assert_eq!(result, Err(ModelError::DeadlineExceeded { phase: PHASE }));
    }

    #[tokio::test]
    async fn test_check_reports_expired_deadline() {
        let ctx = Context::with_timeout(Duration::ZERO);
        assert_eq!(
            ctx.check(PHASE),
            Err(ModelError::DeadlineExceeded { phase: PHASE })
        );
    }

    #[tokio::test]
    async fn test_canceled_context() {
        let ctx = Context::background();
        let clone = ctx.clone();
        clone.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(
            ctx.guard(PHASE, async { 1 }).await,
            Err(ModelError::Canceled { phase: PHASE })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_future() {
        let ctx = Context::background();
        let token = ctx.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let result = ctx
            .guard(PHASE, async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
            .await;
        assert_eq!(result, Err(ModelError::Canceled { phase: PHASE }));
    }

    #[tokio::test]
    async fn test_child_keeps_earlier_deadline() {
        let parent = Context::with_timeout(Duration::from_millis(100));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let tighter = parent.child_with_timeout(Duration::from_millis(1));
        assert!(tighter.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn test_parent_cancel_propagates_to_child() {
        let parent = Context::background();
        let child = parent.child_with_timeout(Duration::from_secs(1));
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
