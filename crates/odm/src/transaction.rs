//! Transaction Management
//!
//! A `Transaction` owns one store session with one transaction started on it.
//! The unit of work decides whether to commit or abort; `finish` records the
//! outcome and always ends the session. `TransactionRunner` wraps the entire
//! sequence around a callback.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backends::{
    DocumentStore, SessionHandle, StoreOperation, TransactionState as StoreTransactionState,
};
use crate::context::Context;
use crate::error::{ModelError, ModelResult, Phase};

/// Lifecycle of a transaction driven by this layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    SessionStarted,
    Committed,
    Aborted,
    Failed,
}

impl TransactionState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted | TransactionState::Failed
        )
    }
}

pub struct Transaction {
    session: SessionHandle,
    context: Context,
    state: TransactionState,
}

impl Transaction {
    /// Start a session on `store` and begin a transaction on it.
    ///
    /// The returned transaction's context is `ctx` bound to the new session.
    pub async fn begin(store: &dyn DocumentStore, ctx: &Context) -> ModelResult<Transaction> {
        if let Some(session) = ctx.session() {
            return Err(ModelError::Transaction(format!(
                "context is already bound to {}; nested transactions are not supported",
                session.id()
            )));
        }

        let session = ctx
            .guard(Phase::Store(StoreOperation::StartSession), store.start_session())
            .await?
            .map_err(|e| ModelError::Transaction(format!("Failed to start session: {}", e)))?;

        let started = ctx
            .guard(
                Phase::Store(StoreOperation::StartTransaction),
                session.start_transaction(),
            )
            .await;
        match started {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                session.end_session().await;
                return Err(ModelError::Transaction(format!(
                    "Failed to begin transaction: {}",
                    e
                )));
            }
            Err(e) => {
                session.end_session().await;
                return Err(e);
            }
        }

        debug!("Began transaction on {}", session.id());
        Ok(Transaction {
            context: ctx.with_session(session.clone()),
            session,
            state: TransactionState::SessionStarted,
        })
    }

    /// Context bound to this transaction's session
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Record the unit of work's result and end the session.
    ///
    /// A transaction still open when the unit of work failed is aborted. One
    /// still open after success is discarded with the session; it is never
    /// committed implicitly. The unit of work's result is returned unchanged.
    pub async fn finish(&mut self, result: ModelResult<()>) -> ModelResult<()> {
        if self.state.is_finished() {
            return Err(ModelError::Transaction(
                "Transaction has already been finished".to_string(),
            ));
        }

        let store_state = self.session.transaction_state();
        self.state = match (&result, store_state) {
            (Err(e), StoreTransactionState::InProgress) => {
                debug!("Aborting transaction on {} after error: {}", self.session.id(), e);
                // The caller's context may already be expired
                if let Err(abort_err) = self
                    .session
                    .abort_transaction(&Context::background())
                    .await
                {
                    warn!(
                        "Failed to abort transaction on {}: {}",
                        self.session.id(),
                        abort_err
                    );
                }
                TransactionState::Failed
            }
            (Err(_), _) => TransactionState::Failed,
            (Ok(()), StoreTransactionState::InProgress) => {
                warn!(
                    "Unit of work on {} neither committed nor aborted; discarding its writes",
                    self.session.id()
                );
                TransactionState::Aborted
            }
            (Ok(()), StoreTransactionState::Committed) => TransactionState::Committed,
            (Ok(()), _) => TransactionState::Aborted,
        };

        self.session.end_session().await;
        debug!(
            "Transaction on {} finished: {:?}",
            self.session.id(),
            self.state
        );
        result
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.state.is_finished() {
            warn!(
                "Transaction on {} dropped without being finished; its session was not ended",
                self.session.id()
            );
        }
    }
}

/// Commit the transaction bound to `ctx`
pub async fn commit(ctx: &Context) -> ModelResult<()> {
    let session = bound_session(ctx)?;
    debug!("Committing transaction on {}", session.id());
    ctx.guard(
        Phase::Store(StoreOperation::CommitTransaction),
        session.commit_transaction(ctx),
    )
    .await?
    .map_err(|e| ModelError::Transaction(format!("Failed to commit transaction: {}", e)))
}

/// Abort the transaction bound to `ctx`
pub async fn abort(ctx: &Context) -> ModelResult<()> {
    let session = bound_session(ctx)?;
    debug!("Aborting transaction on {}", session.id());
    ctx.guard(
        Phase::Store(StoreOperation::AbortTransaction),
        session.abort_transaction(ctx),
    )
    .await?
    .map_err(|e| ModelError::Transaction(format!("Failed to abort transaction: {}", e)))
}

fn bound_session(ctx: &Context) -> ModelResult<&SessionHandle> {
    ctx.session().ok_or_else(|| {
        ModelError::Transaction("context is not bound to a transaction session".to_string())
    })
}

/// Runs units of work inside store transactions
#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn DocumentStore>,
    default_timeout: Duration,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn DocumentStore>, default_timeout: Duration) -> Self {
        Self {
            store,
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `f` under a fresh context bounded by the default timeout
    pub async fn run<F, Fut>(&self, f: F) -> ModelResult<()>
    where
        F: FnOnce(SessionHandle, Context) -> Fut,
        Fut: Future<Output = ModelResult<()>> + Send,
    {
        let ctx = Context::with_timeout(self.default_timeout);
        self.run_with_ctx(&ctx, f).await
    }

    /// Run `f` inside a transaction derived from `ctx`.
    ///
    /// `f` receives the session and a context bound to it, and is expected to
    /// commit or abort through that context.
    pub async fn run_with_ctx<F, Fut>(&self, ctx: &Context, f: F) -> ModelResult<()>
    where
        F: FnOnce(SessionHandle, Context) -> Fut,
        Fut: Future<Output = ModelResult<()>> + Send,
    {
        let mut tx = Transaction::begin(self.store.as_ref(), ctx).await?;
        let unit_of_work = f(tx.session().clone(), tx.context().clone());
        let result = tx
            .context()
            .guard(Phase::UnitOfWork, unit_of_work)
            .await
            .and_then(|result| result);
        tx.finish(result).await
    }
}
