//! Lifecycle dispatch - runs hook chains around store mutations
//!
//! Each phase runs the model's own hook first and then the registered
//! observers in registration order. The first failure stops the chain.

use crate::context::Context;
use crate::error::{ModelError, ModelResult, Phase};
use crate::event_error::HookError;
use crate::events::{HookPhase, ModelHooks, MutationOutcome};
use crate::observers::ObserverRegistry;

pub const CREATE_BEFORE: &[HookPhase] = &[HookPhase::BeforeSave, HookPhase::BeforeCreate];
pub const CREATE_AFTER: &[HookPhase] = &[HookPhase::AfterCreate, HookPhase::AfterSave];
pub const UPDATE_BEFORE: &[HookPhase] = &[HookPhase::BeforeSave, HookPhase::BeforeUpdate];
pub const UPDATE_AFTER: &[HookPhase] = &[HookPhase::AfterUpdate, HookPhase::AfterSave];
pub const DELETE_BEFORE: &[HookPhase] = &[HookPhase::BeforeDelete];
pub const DELETE_AFTER: &[HookPhase] = &[HookPhase::AfterDelete];

pub struct ModelLifecycle<M: Send + Sync> {
    observers: ObserverRegistry<M>,
}

impl<M> ModelLifecycle<M>
where
    M: ModelHooks + Send + Sync,
{
    pub fn new(observers: ObserverRegistry<M>) -> Self {
        Self { observers }
    }

    pub fn observers(&self) -> &ObserverRegistry<M> {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverRegistry<M> {
        &mut self.observers
    }

    /// Run a chain of before-hooks. A failure maps to `HookAborted`.
    pub async fn run_before(
        &self,
        phases: &[HookPhase],
        model: &mut M,
        ctx: &Context,
    ) -> ModelResult<()> {
        for &phase in phases {
            let step = Phase::Hook(phase);
            ctx.check(step)?;
            ctx.guard(step, self.before_phase(phase, model, ctx))
                .await?
                .map_err(|err| ModelError::hook(phase, err))?;
        }
        Ok(())
    }

    /// Run a chain of after-hooks. A failure maps to `AfterHookFailed`.
    pub async fn run_after(
        &self,
        phases: &[HookPhase],
        model: &M,
        ctx: &Context,
        outcome: &MutationOutcome,
    ) -> ModelResult<()> {
        for &phase in phases {
            let step = Phase::Hook(phase);
            ctx.check(step)?;
            ctx.guard(step, self.after_phase(phase, model, ctx, outcome))
                .await?
                .map_err(|err| ModelError::hook(phase, err))?;
        }
        Ok(())
    }

    async fn before_phase(
        &self,
        phase: HookPhase,
        model: &mut M,
        ctx: &Context,
    ) -> Result<(), HookError> {
        match phase {
            HookPhase::BeforeSave => model.before_save(ctx).await?,
            HookPhase::BeforeCreate => model.before_create(ctx).await?,
            HookPhase::BeforeUpdate => model.before_update(ctx).await?,
            HookPhase::BeforeDelete => model.before_delete(ctx).await?,
            _ => return Ok(()),
        }
        self.observers.trigger_before(phase, model, ctx).await
    }

    async fn after_phase(
        &self,
        phase: HookPhase,
        model: &M,
        ctx: &Context,
        outcome: &MutationOutcome,
    ) -> Result<(), HookError> {
        match (phase, outcome) {
            (HookPhase::AfterCreate, _) => model.after_create(ctx).await?,
            (HookPhase::AfterSave, _) => model.after_save(ctx).await?,
            (HookPhase::AfterUpdate, MutationOutcome::Updated(result)) => {
                model.after_update(ctx, result).await?
            }
            (HookPhase::AfterDelete, MutationOutcome::Deleted(result)) => {
                model.after_delete(ctx, result).await?
            }
            _ => return Ok(()),
        }
        self.observers.trigger_after(phase, model, ctx, outcome).await
    }
}

impl<M> Default for ModelLifecycle<M>
where
    M: ModelHooks + Send + Sync,
{
    fn default() -> Self {
        Self::new(ObserverRegistry::new())
    }
}
