//! Accessor port for the DocGuard gateway.
//!
//! This crate defines the narrow interface the rest of the system consumes
//! from a document database. The rule engine depends on exactly one method,
//! [`DataAccessor::get`], for its `exists`/`unique` lookups; the entry
//! facade additionally drives the CRUD surface. Concrete backends (the
//! in-memory accessor, a Mongo driver) live in sibling crates.

pub mod accessor;
pub mod error;

pub use accessor::{
    ChangeEvent, ChangeKind, DataAccessor, DynAccessor, FindOptions, UpdateOptions,
    UpdateOutcome,
};
pub use error::{AccessorError, Result};
