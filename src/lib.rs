//! In-process extension-point dispatcher
//!
//! A registry that lets independent pieces of code attach named,
//! prioritized handlers to well-known extension points ("hooks"), and a
//! runtime that resolves, orders, and invokes the matching handlers when a
//! hook fires. The host stays closed for modification but open for
//! extension: third-party code customizes behavior without editing the
//! host's call sites.
//!
//! Handlers observe a fire through a shared mutable parameter bag
//! ([`HookVars`]), `template_`-prefixed hooks additionally collect each
//! handler's return value, and a *delegating* handler can replace the
//! host's own result outright — at most one delegate runs per fire.
//!
//! ```
//! use hookpoint::{FireOutcome, HookDispatcher, HookPriority, HookVars};
//! use serde_json::json;
//!
//! let dispatcher = HookDispatcher::new();
//! dispatcher.define_function("retitle", |vars, _hook| {
//!     vars.insert("title", json!("My title!"));
//!     Ok(None)
//! });
//! dispatcher.register_function("topic_edit_before", "retitle", HookPriority::DEFAULT, false);
//!
//! let mut vars = HookVars::new();
//! let outcome = dispatcher.fire("Topic_Edit_Before", &mut vars).unwrap();
//! assert!(matches!(outcome, FireOutcome::Empty));
//! assert_eq!(vars.get_str("title"), Some("My title!"));
//! ```

pub mod behavior;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod handler;
pub mod resolve;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use self::behavior::{BehaviorRegistration, BehaviorTable, OwnerId};
pub use self::cache::HandlerCache;
pub use self::config::{HookEntry, HooksConfig, SystemConfig};
pub use self::dispatcher::HookDispatcher;
pub use self::errors::{HookError, HookResult};
pub use self::handler::{hook_fn, HandlerFactory, HookFn, HookHandler, HostModule};
pub use self::resolve::{DelegateResolver, IdentityDelegateResolver, TemplatePathResolver};
pub use self::table::{HookRegistration, HookTable};
pub use self::types::{
    FireOutcome, HookKind, HookParams, HookPriority, HookVars, CLASS_PARAM, DELEGATE_PARAM,
    TEMPLATE_PREFIX,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        hook_fn, FireOutcome, HookDispatcher, HookError, HookFn, HookHandler, HookKind,
        HookParams, HookPriority, HookResult, HookVars, HostModule, OwnerId,
    };
}
