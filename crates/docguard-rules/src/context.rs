//! Per-request context handed to validators.

use docguard_core::{Action, DataRequest, Injections};
use docguard_db::DynAccessor;

use crate::expr::ExprRuntime;

/// Everything a validator may consult while checking one request.
///
/// The request is borrowed mutably because the `data` validator writes
/// field defaults back into the payload before the request is forwarded to
/// the accessor.
pub struct ValidationContext<'a> {
    /// The request under validation.
    pub request: &'a mut DataRequest,
    /// The resolved action of the request.
    pub action: Action,
    /// Caller-supplied expression bindings.
    pub injections: &'a Injections,
    /// Accessor used for `exists`/`unique` lookups.
    pub accessor: &'a DynAccessor,
    /// Shared expression runtime.
    pub expr: &'a ExprRuntime,
}
