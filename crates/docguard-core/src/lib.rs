//! Core types for the DocGuard data-access gateway.
//!
//! This crate defines the shared vocabulary of the workspace: the
//! [`DataRequest`] model callers submit, the [`Action`] tokens that name
//! database operations on the wire, and the Mongo-flavored operator
//! vocabulary consumed by the rule engine and the accessor backends.

pub mod action;
pub mod error;
pub mod operators;
pub mod request;

pub use action::Action;
pub use error::{CoreError, Result};
pub use operators::{
    OPERATORS, QUERY_OPERATORS, UPDATE_OPERATORS, is_operator, is_query_operator,
    is_update_operator,
};
pub use request::{DataRequest, Injections, JsonMap, SortDirection, SortSpec};
