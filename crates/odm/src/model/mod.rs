//! Model layer: identities, field mixins and lifecycle dispatch

pub mod core_trait;
pub mod fields;
pub mod identity;
pub mod lifecycle;
pub mod naming;

pub use core_trait::Model;
pub use fields::{now, DateFields, DefaultModel, IdField};
pub use identity::{Identity, ObjectId};
pub use lifecycle::ModelLifecycle;
pub use naming::collection_name_for;
