//! Handler traits and callable types

use crate::errors::HookResult;
use crate::types::HookVars;
use serde_json::Value;
use std::sync::Arc;

/// Shared callable type for function handlers and behavior callbacks.
///
/// Receives the mutable parameter bag and the case-folded name of the hook
/// being fired. A `None` return contributes `Null` to template-result
/// collection; errors propagate to the caller of the fire.
pub type HookFn = Arc<dyn Fn(&mut HookVars, &str) -> HookResult<Option<Value>> + Send + Sync>;

/// Wrap a closure as a [`HookFn`]
pub fn hook_fn<F>(f: F) -> HookFn
where
    F: Fn(&mut HookVars, &str) -> HookResult<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One long-lived handler object serving all hook methods of its class.
///
/// Instances are constructed once per class name through a registered
/// [`HandlerFactory`] and cached for the lifetime of the dispatcher; the
/// same instance backs every registration naming that class.
///
/// Implementations dispatch on `method` and should return
/// [`HookError::TargetNotFound`](crate::HookError::TargetNotFound) for
/// methods they do not define.
pub trait HookHandler: Send + Sync {
    /// Invoke the named hook method
    fn call(&self, method: &str, vars: &mut HookVars, hook: &str) -> HookResult<Option<Value>>;

    /// Handler class name, for diagnostics
    fn class_name(&self) -> &str;
}

/// The dispatcher's owning context, receiving module-method registrations.
///
/// This is how a hook calls back into trusted host logic: a
/// `module_method` registration names a method that the host resolves
/// here, typically with a `match` over its known method names.
pub trait HostModule: Send + Sync {
    /// Invoke the named host method
    fn call(&self, method: &str, vars: &mut HookVars, hook: &str) -> HookResult<Option<Value>>;
}

/// Factory for creating handler-class instances.
///
/// Registered under a class name at startup; called with no arguments the
/// first time that class is used as a `class_method` target.
pub trait HandlerFactory: Send + Sync {
    /// Create the handler instance
    fn create(&self) -> Arc<dyn HookHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn() -> Arc<dyn HookHandler> + Send + Sync,
{
    fn create(&self) -> Arc<dyn HookHandler> {
        self()
    }
}
