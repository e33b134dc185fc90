//! Collection Engine - CRUD over a document store for one model type
//!
//! A `Collection<M>` fills in default fields, runs the lifecycle hook chains
//! and issues the store operation inside the context's session when one is
//! present. Every store call is bounded by the context deadline.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backends::{Document, DocumentStore, StoreOperation, StoreResult, ID_FIELD};
use crate::context::Context;
use crate::error::{ModelError, ModelResult, Phase};
use crate::events::MutationOutcome;
use crate::filter::Filter;
use crate::model::fields::now;
use crate::model::identity::Identity;
use crate::model::lifecycle::{
    ModelLifecycle, CREATE_AFTER, CREATE_BEFORE, DELETE_AFTER, DELETE_BEFORE, UPDATE_AFTER,
    UPDATE_BEFORE,
};
use crate::model::Model;
use crate::observers::ObserverRegistry;

pub struct Collection<M: Model> {
    name: String,
    // Name the store sees: `name`, or `database.name` once scoped
    store_key: String,
    store: Arc<dyn DocumentStore>,
    lifecycle: Arc<ModelLifecycle<M>>,
}

impl<M: Model> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store_key: self.store_key.clone(),
            store: Arc::clone(&self.store),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<M: Model> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("store_key", &self.store_key)
            .field("observers", &self.lifecycle.observers().observer_count())
            .finish()
    }
}

impl<M: Model> Collection<M> {
    /// Collection named after `M::collection_name()`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_name(M::collection_name(), store)
    }

    pub fn with_name(name: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        let name = name.into();
        Self {
            store_key: name.clone(),
            name,
            store,
            lifecycle: Arc::new(ModelLifecycle::default()),
        }
    }

    /// Replace the observers run after the model's own hooks
    pub fn with_observers(mut self, observers: ObserverRegistry<M>) -> Self {
        self.lifecycle = Arc::new(ModelLifecycle::new(observers));
        self
    }

    /// Keep this collection's documents under `database` in the store, so
    /// collections of the same name in other databases stay apart.
    pub fn in_database(mut self, database: &str) -> Self {
        self.store_key = format!("{}.{}", database, self.name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection name as passed to the store
    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Insert a new document for `model`.
    ///
    /// Generates an identity if the model has none and stamps both timestamps
    /// before the before-save and before-create hooks run. If nothing is
    /// inserted the model's previous timestamps are put back.
    pub async fn create(&self, ctx: &Context, model: &mut M) -> ModelResult<()> {
        if model.id().is_none() {
            model.set_id(M::Id::generate());
        }
        let previous_dates = model.date_fields().cloned();
        if let Some(dates) = model.date_fields_mut() {
            dates.touch_created(now());
        }

        let id = match self.insert_new(ctx, model).await {
            Ok(id) => id,
            Err(err) => {
                if let (Some(dates), Some(previous)) = (model.date_fields_mut(), previous_dates) {
                    *dates = previous;
                }
                return Err(err);
            }
        };
        debug!("Created {} in '{}'", id, self.name);

        self.lifecycle
            .run_after(CREATE_AFTER, model, ctx, &MutationOutcome::Inserted)
            .await
    }

    /// Replace the stored document of an already persisted model.
    pub async fn update(&self, ctx: &Context, model: &mut M) -> ModelResult<()> {
        self.require_id(model)?;
        if let Some(dates) = model.date_fields_mut() {
            dates.touch_updated(now());
        }

        self.lifecycle.run_before(UPDATE_BEFORE, model, ctx).await?;

        let id = self.require_id(model)?;
        let doc = self.encode(model, &id)?;
        let outcome = self
            .store_call(
                ctx,
                StoreOperation::ReplaceById,
                self.store.replace_by_id(ctx, &self.store_key, &id, doc),
            )
            .await?;

        if outcome.matched == 0 {
            return Err(ModelError::StaleOrMissingRecord {
                collection: self.name.clone(),
                id,
            });
        }
        debug!(
            "Updated {} in '{}' (modified: {})",
            id, self.name, outcome.modified
        );

        self.lifecycle
            .run_after(UPDATE_AFTER, model, ctx, &MutationOutcome::Updated(outcome))
            .await
    }

    /// Delete the stored document of `model`. A document that is already gone
    /// is not an error; the after-delete hooks see `deleted == 0`.
    pub async fn delete(&self, ctx: &Context, model: &mut M) -> ModelResult<()> {
        self.require_id(model)?;
        self.lifecycle.run_before(DELETE_BEFORE, model, ctx).await?;

        let id = self.require_id(model)?;
        let outcome = self
            .store_call(
                ctx,
                StoreOperation::DeleteById,
                self.store.delete_by_id(ctx, &self.store_key, &id),
            )
            .await?;
        debug!("Deleted {} from '{}' ({})", id, self.name, outcome.deleted);

        self.lifecycle
            .run_after(DELETE_AFTER, model, ctx, &MutationOutcome::Deleted(outcome))
            .await
    }

    /// Create when the model has no identity or no stored document, else update
    pub async fn save(&self, ctx: &Context, model: &mut M) -> ModelResult<()> {
        let Some(id) = model.id() else {
            return self.create(ctx, model).await;
        };
        let canonical = id.canonical();
        let existing = self
            .store_call(
                ctx,
                StoreOperation::FindById,
                self.store.find_by_id(ctx, &self.store_key, &canonical),
            )
            .await?;

        match existing {
            Some(_) => self.update(ctx, model).await,
            None => self.create(ctx, model).await,
        }
    }

    pub async fn find_by_id(&self, ctx: &Context, id: &M::Id) -> ModelResult<M> {
        let canonical = id.canonical();
        let doc = self
            .store_call(
                ctx,
                StoreOperation::FindById,
                self.store.find_by_id(ctx, &self.store_key, &canonical),
            )
            .await?
            .ok_or_else(|| ModelError::NotFound {
                collection: self.name.clone(),
                id: canonical,
            })?;
        self.decode(doc)
    }

    /// Look up by the raw string form of the identity
    pub async fn find_by_raw_id(&self, ctx: &Context, raw: &str) -> ModelResult<M> {
        let id = M::prepare_id(raw)?;
        self.find_by_id(ctx, &id).await
    }

    pub async fn find(&self, ctx: &Context, filter: &Filter) -> ModelResult<Vec<M>> {
        let docs = self
            .store_call(
                ctx,
                StoreOperation::Find,
                self.store.find(ctx, &self.store_key, filter),
            )
            .await?;
        docs.into_iter().map(|doc| self.decode(doc)).collect()
    }

    pub async fn first(&self, ctx: &Context, filter: &Filter) -> ModelResult<Option<M>> {
        Ok(self.find(ctx, filter).await?.into_iter().next())
    }

    pub async fn count(&self, ctx: &Context, filter: &Filter) -> ModelResult<u64> {
        self.store_call(
            ctx,
            StoreOperation::Count,
            self.store.count(ctx, &self.store_key, filter),
        )
        .await
    }

    /// Bulk delete without hooks; returns the number of documents removed
    pub async fn delete_many(&self, ctx: &Context, filter: &Filter) -> ModelResult<u64> {
        let outcome = self
            .store_call(
                ctx,
                StoreOperation::DeleteMany,
                self.store.delete_many(ctx, &self.store_key, filter),
            )
            .await?;
        debug!("Deleted {} documents from '{}'", outcome.deleted, self.name);
        Ok(outcome.deleted)
    }

    /// Before-create chain and insert; returns the canonical id
    async fn insert_new(&self, ctx: &Context, model: &mut M) -> ModelResult<String> {
        self.lifecycle.run_before(CREATE_BEFORE, model, ctx).await?;

        let id = self.require_id(model)?;
        let doc = self.encode(model, &id)?;
        self.store_call(
            ctx,
            StoreOperation::Insert,
            self.store.insert(ctx, &self.store_key, doc),
        )
        .await?;
        Ok(id)
    }

    async fn store_call<T, F>(
        &self,
        ctx: &Context,
        operation: StoreOperation,
        fut: F,
    ) -> ModelResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        ctx.guard(Phase::Store(operation), fut)
            .await?
            .map_err(|err| ModelError::persistence(operation, &self.name, err))
    }

    fn require_id(&self, model: &M) -> ModelResult<String> {
        model
            .id()
            .map(|id| id.canonical())
            .ok_or_else(|| ModelError::MissingIdentity {
                collection: self.name.clone(),
            })
    }

    fn encode(&self, model: &M, id: &str) -> ModelResult<Document> {
        match serde_json::to_value(model)? {
            Value::Object(mut doc) => {
                doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
                Ok(doc)
            }
            other => Err(ModelError::Serialization(format!(
                "model for '{}' must serialize to an object, got {}",
                self.name, other
            ))),
        }
    }

    fn decode(&self, doc: Document) -> ModelResult<M> {
        let raw_id = match doc.get(ID_FIELD) {
            Some(Value::String(raw)) => Some(raw.clone()),
            _ => None,
        };
        let mut model: M = serde_json::from_value(Value::Object(doc))?;
        if let Some(raw) = raw_id {
            model.set_id(M::prepare_id(&raw)?);
        }
        Ok(model)
    }
}
