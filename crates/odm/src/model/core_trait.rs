//! Core Model Trait - Base definition for persisted documents
//!
//! Defines the Model trait with identity handling, collection-name resolution
//! and access to the timestamp mixin.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::fields::DateFields;
use super::identity::Identity;
use super::naming::collection_name_for;
use crate::error::ModelResult;
use crate::events::ModelHooks;

/// A typed entity persisted as one document
pub trait Model: ModelHooks + Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// Native identity type
    type Id: Identity;

    /// Backing collection name. Defaults to the pluralised snake_case type name.
    fn collection_name() -> String {
        collection_name_for::<Self>()
    }

    /// Identity, `None` until the model has been persisted or assigned one
    fn id(&self) -> Option<Self::Id>;

    fn set_id(&mut self, id: Self::Id);

    /// Convert a raw string into the native identity
    fn prepare_id(raw: &str) -> ModelResult<Self::Id> {
        Self::Id::parse_canonical(raw)
    }

    /// Timestamp mixin, if the model embeds one
    fn date_fields(&self) -> Option<&DateFields> {
        None
    }

    fn date_fields_mut(&mut self) -> Option<&mut DateFields> {
        None
    }
}
