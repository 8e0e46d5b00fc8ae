//! Request injectors.
//!
//! Injectors derive expression bindings from the incoming request (caller
//! identity, roles, anything the transport layer attached). They are pure
//! functions of the request; the gateway merges their outputs into one
//! injection map before validation, later injectors winning on key
//! collisions.

use docguard_core::{DataRequest, Injections};

/// Derives expression bindings from a request.
pub trait Injector: Send + Sync {
    /// Produce bindings for `request`.
    fn inject(&self, request: &DataRequest) -> Injections;
}

/// Adapter turning a plain function into an [`Injector`].
pub struct FnInjector<F>(F);

impl<F> FnInjector<F>
where
    F: Fn(&DataRequest) -> Injections + Send + Sync,
{
    /// Wrap a function as an injector.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Injector for FnInjector<F>
where
    F: Fn(&DataRequest) -> Injections + Send + Sync,
{
    fn inject(&self, request: &DataRequest) -> Injections {
        (self.0)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docguard_core::Action;
    use serde_json::json;

    #[test]
    fn test_fn_injector() {
        let injector = FnInjector::new(|request: &DataRequest| {
            let mut injections = Injections::new();
            injections.insert("$collection".to_string(), json!(request.collection));
            injections
        });

        let request = DataRequest::new("posts", Action::Read);
        let injections = injector.inject(&request);
        assert_eq!(injections["$collection"], json!("posts"));
    }
}
