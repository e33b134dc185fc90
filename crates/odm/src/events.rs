use std::fmt;

use async_trait::async_trait;

use crate::backends::{DeleteOutcome, UpdateOutcome};
use crate::context::Context;
use crate::event_error::HookError;

/// A single step of a model's persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl HookPhase {
    /// Hooks that run before the store mutation.
    pub fn is_before(&self) -> bool {
        matches!(
            self,
            HookPhase::BeforeSave
                | HookPhase::BeforeCreate
                | HookPhase::BeforeUpdate
                | HookPhase::BeforeDelete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::BeforeSave => "before-save",
            HookPhase::BeforeCreate => "before-create",
            HookPhase::AfterCreate => "after-create",
            HookPhase::BeforeUpdate => "before-update",
            HookPhase::AfterUpdate => "after-update",
            HookPhase::AfterSave => "after-save",
            HookPhase::BeforeDelete => "before-delete",
            HookPhase::AfterDelete => "after-delete",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the store reported for the mutation an after-hook is observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Inserted,
    Updated(UpdateOutcome),
    Deleted(DeleteOutcome),
}

/// Lifecycle hooks a model may implement.
///
/// Every method defaults to a no-op, so `impl ModelHooks for Doc {}` opts a
/// model into none of them. Before-hooks receive the model mutably and may
/// adjust fields before they are written; returning an error vetoes the
/// operation. After-hooks run once the store has accepted the mutation.
#[async_trait]
pub trait ModelHooks: Send + Sync {
    async fn before_save(&mut self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_create(&mut self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_create(&self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_update(&mut self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_update(
        &self,
        _ctx: &Context,
        _outcome: &UpdateOutcome,
    ) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_save(&self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_delete(&mut self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_delete(
        &self,
        _ctx: &Context,
        _outcome: &DeleteOutcome,
    ) -> Result<(), HookError> {
        Ok(())
    }
}
