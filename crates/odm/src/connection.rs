//! Connection - composition root for stores, collections and transactions
//!
//! A `Connection` pairs a document store with its configuration and the
//! observers registered per model type. `ConnectionManager` holds the process
//! default connection; it must be configured before `current()` succeeds.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::backends::{DocumentStore, SessionHandle};
use crate::collection::Collection;
use crate::config::OdmConfig;
use crate::context::Context;
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::observers::{ModelObserver, ObserverManager};
use crate::transaction::TransactionRunner;

#[derive(Clone)]
pub struct Connection {
    store: Arc<dyn DocumentStore>,
    config: Arc<OdmConfig>,
    observers: Arc<ObserverManager>,
}

impl Connection {
    pub fn new(store: Arc<dyn DocumentStore>, config: OdmConfig) -> ModelResult<Self> {
        config.validate()?;
        tracing::info!(
            "Connection ready for database '{}' (ctx timeout {:?})",
            config.database,
            config.ctx_timeout
        );
        Ok(Self {
            store,
            config: Arc::new(config),
            observers: Arc::new(ObserverManager::new()),
        })
    }

    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// A fresh context bounded by the configured timeout
    pub fn ctx(&self) -> Context {
        Context::with_timeout(self.config.ctx_timeout)
    }

    /// Collection for `M` under its default name, with `M`'s observers.
    /// Documents are kept under the configured database.
    pub fn collection<M: Model>(&self) -> Collection<M> {
        Collection::new(self.store())
            .in_database(&self.config.database)
            .with_observers(self.observers.registry_for::<M>())
    }

    pub fn collection_by_name<M: Model>(&self, name: &str) -> Collection<M> {
        Collection::with_name(name, self.store())
            .in_database(&self.config.database)
            .with_observers(self.observers.registry_for::<M>())
    }

    /// Register an observer for `M`. Collections obtained afterwards run it.
    pub fn register_observer<M: Model>(&self, observer: Arc<dyn ModelObserver<M>>) {
        tracing::debug!("Registering observer for '{}'", M::collection_name());
        self.observers.register_for_model::<M>(observer);
    }

    pub fn transaction_runner(&self) -> TransactionRunner {
        TransactionRunner::new(self.store(), self.config.ctx_timeout)
    }

    /// Run `f` in a transaction under a context with the configured timeout
    pub async fn transaction<F, Fut>(&self, f: F) -> ModelResult<()>
    where
        F: FnOnce(SessionHandle, Context) -> Fut,
        Fut: Future<Output = ModelResult<()>> + Send,
    {
        self.transaction_runner().run(f).await
    }

    pub async fn transaction_with_ctx<F, Fut>(&self, ctx: &Context, f: F) -> ModelResult<()>
    where
        F: FnOnce(SessionHandle, Context) -> Fut,
        Fut: Future<Output = ModelResult<()>> + Send,
    {
        self.transaction_runner().run_with_ctx(ctx, f).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Holder of the default connection
pub struct ConnectionManager {
    current: RwLock<Option<Connection>>,
}

static GLOBAL: Lazy<ConnectionManager> = Lazy::new(ConnectionManager::new);

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Process-wide manager
    pub fn global() -> &'static ConnectionManager {
        &GLOBAL
    }

    /// Build and install the default connection, replacing any previous one
    pub fn configure(
        &self,
        store: Arc<dyn DocumentStore>,
        config: OdmConfig,
    ) -> ModelResult<Connection> {
        let connection = Connection::new(store, config)?;
        if self.current.write().replace(connection.clone()).is_some() {
            tracing::warn!("Replacing previously configured connection");
        }
        Ok(connection)
    }

    pub fn current(&self) -> ModelResult<Connection> {
        self.current.read().clone().ok_or(ModelError::NotConfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.current.read().is_some()
    }

    /// Forget the default connection
    pub fn reset(&self) {
        if self.current.write().take().is_some() {
            tracing::debug!("Default connection reset");
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Configure the process-wide default connection
pub fn configure(store: Arc<dyn DocumentStore>, config: OdmConfig) -> ModelResult<Connection> {
    ConnectionManager::global().configure(store, config)
}

/// The process-wide default connection
pub fn current() -> ModelResult<Connection> {
    ConnectionManager::global().current()
}

pub fn reset() {
    ConnectionManager::global().reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use crate::filter::Filter;
    use crate::tests::Doc;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    fn test_manager_not_configured() {
        let manager = ConnectionManager::new();
        assert!(!manager.is_configured());
        assert_eq!(manager.current().unwrap_err(), ModelError::NotConfigured);
    }

    #[test]
    fn test_manager_configure_and_reset() {
        let manager = ConnectionManager::new();
        let config = OdmConfig::new().with_database("odm_lab");
        manager
            .configure(Arc::new(InMemoryStore::new()), config)
            .unwrap();

        let connection = manager.current().unwrap();
        assert_eq!(connection.config().database, "odm_lab");

        manager.reset();
        assert!(matches!(manager.current(), Err(ModelError::NotConfigured)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let manager = ConnectionManager::new();
        let config = OdmConfig::new().with_ctx_timeout(Duration::ZERO);
        let err = manager
            .configure(Arc::new(InMemoryStore::new()), config)
            .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
        assert!(!manager.is_configured());
    }

    #[tokio::test]
    async fn test_ctx_uses_configured_timeout() {
        let connection = Connection::new(
            Arc::new(InMemoryStore::new()),
            OdmConfig::new().with_ctx_timeout(Duration::from_secs(3)),
        )
        .unwrap();
        let remaining = connection.ctx().remaining().unwrap();
        assert!(remaining <= Duration::from_secs(3));
        assert!(remaining > Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_databases_on_one_store_are_separate() {
        let store = InMemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let primary =
            Connection::new(Arc::clone(&shared), OdmConfig::new().with_database("primary")).unwrap();
        let archive =
            Connection::new(shared, OdmConfig::new().with_database("archive")).unwrap();

        let mut doc = Doc::new("Ali", 24);
        primary
            .collection::<Doc>()
            .create(&primary.ctx(), &mut doc)
            .await
            .unwrap();

        let archived = archive.collection::<Doc>();
        assert_eq!(archived.name(), "docs");
        assert_eq!(archived.store_key(), "archive.docs");
        assert_eq!(
            archived.count(&archive.ctx(), &Filter::new()).await.unwrap(),
            0
        );
        assert!(archived
            .find_by_id(&archive.ctx(), &doc.id().unwrap())
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(store.collection_names(), vec!["primary.docs".to_string()]);
    }

    #[test]
    #[serial]
    fn test_global_manager() {
        reset();
        assert!(matches!(current(), Err(ModelError::NotConfigured)));
        configure(Arc::new(InMemoryStore::new()), OdmConfig::default()).unwrap();
        assert!(current().is_ok());
        reset();
    }
}
