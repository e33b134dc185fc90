//! Document Store Backends
//!
//! The ODM reaches storage only through the `DocumentStore` and
//! `StoreSession` traits. `InMemoryStore` is the bundled implementation.

pub mod core;
pub mod memory;

pub use core::*;
pub use memory::{InMemoryStore, MemorySession};
