use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::backends::{DeleteOutcome, UpdateOutcome};
use crate::context::Context;
use crate::event_error::HookError;
use crate::events::{HookPhase, MutationOutcome};

/// External lifecycle observer for models of type `T`.
///
/// Observers run after the model's own hook for the same phase, in
/// registration order.
#[async_trait]
pub trait ModelObserver<T>: Send + Sync
where
    T: Send + Sync,
{
    async fn before_save(&self, _model: &mut T, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_create(&self, _model: &mut T, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_create(&self, _model: &T, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_update(&self, _model: &mut T, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_update(
        &self,
        _model: &T,
        _ctx: &Context,
        _outcome: &UpdateOutcome,
    ) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_save(&self, _model: &T, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_delete(&self, _model: &mut T, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_delete(
        &self,
        _model: &T,
        _ctx: &Context,
        _outcome: &DeleteOutcome,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

pub struct ObserverRegistry<T: Send + Sync> {
    observers: Vec<Arc<dyn ModelObserver<T>>>,
}

impl<T> ObserverRegistry<T>
where
    T: Send + Sync,
{
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn register(&mut self, observer: Arc<dyn ModelObserver<T>>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub async fn trigger_before(
        &self,
        phase: HookPhase,
        model: &mut T,
        ctx: &Context,
    ) -> Result<(), HookError> {
        for observer in &self.observers {
            match phase {
                HookPhase::BeforeSave => observer.before_save(model, ctx).await?,
                HookPhase::BeforeCreate => observer.before_create(model, ctx).await?,
                HookPhase::BeforeUpdate => observer.before_update(model, ctx).await?,
                HookPhase::BeforeDelete => observer.before_delete(model, ctx).await?,
                _ => {}
            }
        }
        Ok(())
    }

    pub async fn trigger_after(
        &self,
        phase: HookPhase,
        model: &T,
        ctx: &Context,
        outcome: &MutationOutcome,
    ) -> Result<(), HookError> {
        for observer in &self.observers {
            match (phase, outcome) {
                (HookPhase::AfterCreate, _) => observer.after_create(model, ctx).await?,
                (HookPhase::AfterSave, _) => observer.after_save(model, ctx).await?,
                (HookPhase::AfterUpdate, MutationOutcome::Updated(result)) => {
                    observer.after_update(model, ctx, result).await?
                }
                (HookPhase::AfterDelete, MutationOutcome::Deleted(result)) => {
                    observer.after_delete(model, ctx, result).await?
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl<T: Send + Sync> Clone for ObserverRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<T> Default for ObserverRegistry<T>
where
    T: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Observer registries keyed by model type.
pub struct ObserverManager {
    model_observers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self {
            model_observers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_for_model<T>(&self, observer: Arc<dyn ModelObserver<T>>)
    where
        T: Send + Sync + 'static,
    {
        let type_id = TypeId::of::<T>();
        let mut observers = self.model_observers.write();

        if let Some(registry) = observers.get_mut(&type_id) {
            if let Some(registry) = registry.downcast_mut::<ObserverRegistry<T>>() {
                registry.register(observer);
                return;
            }
        }

        let mut registry = ObserverRegistry::<T>::new();
        registry.register(observer);
        observers.insert(type_id, Box::new(registry));
    }

    pub fn has_observers_for<T: 'static>(&self) -> bool {
        self.model_observers.read().contains_key(&TypeId::of::<T>())
    }

    /// Snapshot of the observers registered for `T`
    pub fn registry_for<T>(&self) -> ObserverRegistry<T>
    where
        T: Send + Sync + 'static,
    {
        self.model_observers
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|registry| registry.downcast_ref::<ObserverRegistry<T>>())
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for ObserverManager {
    fn default() -> Self {
        Self::new()
    }
}
