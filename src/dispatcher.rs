//! Central dispatcher: registration surface and fire engine

use crate::behavior::{BehaviorTable, OwnerId};
use crate::cache::HandlerCache;
use crate::errors::{HookError, HookResult};
use crate::handler::{HandlerFactory, HookFn, HostModule};
use crate::table::{HookRegistration, HookTable};
use crate::types::{
    FireOutcome, HookKind, HookParams, HookPriority, HookVars, CLASS_PARAM, DELEGATE_PARAM,
    TEMPLATE_PREFIX,
};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::cmp::Reverse;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// The extension-point dispatcher.
///
/// One instance per application, constructed by the composition root and
/// passed by reference to anything that registers or fires hooks. Tables
/// are populated during bootstrap and read continuously afterwards;
/// registrations made after a hook has fired apply only to later fires.
///
/// Fires are synchronous: a hook fire completes its whole handler chain
/// before control returns, and every handler sees the cumulative `vars`
/// mutations of the handlers that ran before it.
pub struct HookDispatcher {
    hooks: HookTable,
    behaviors: BehaviorTable,
    cache: HandlerCache,
    functions: DashMap<String, HookFn>,
    host: RwLock<Option<Arc<dyn HostModule>>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self {
            hooks: HookTable::new(),
            behaviors: BehaviorTable::new(),
            cache: HandlerCache::new(),
            functions: DashMap::new(),
            host: RwLock::new(None),
        }
    }

    // ---- registration surface ----------------------------------------

    /// Register a handler on a hook name (or pattern).
    ///
    /// Returns `false` without registering when the entry is rejected.
    /// Rejection is reported through the return value, never raised, so a
    /// bootstrap sequence can choose to ignore it.
    pub fn register(
        &self,
        name: &str,
        kind: HookKind,
        target: impl Into<String>,
        priority: HookPriority,
        params: HookParams,
        is_pattern: bool,
    ) -> bool {
        let target = target.into();
        tracing::debug!(
            hook = %name,
            kind = %kind,
            target = %target,
            priority = priority.0,
            pattern = is_pattern,
            "registering hook handler"
        );
        self.hooks.register(name, kind, target, priority, params, is_pattern)
    }

    /// Register a named free function as a normal handler
    pub fn register_function(
        &self,
        name: &str,
        target: impl Into<String>,
        priority: HookPriority,
        is_pattern: bool,
    ) -> bool {
        self.register(name, HookKind::Function, target, priority, HookParams::new(), is_pattern)
    }

    /// Register a host-module method as a normal handler
    pub fn register_module_method(
        &self,
        name: &str,
        target: impl Into<String>,
        priority: HookPriority,
        is_pattern: bool,
    ) -> bool {
        self.register(name, HookKind::ModuleMethod, target, priority, HookParams::new(), is_pattern)
    }

    /// Register a handler-class method as a normal handler
    pub fn register_class_method(
        &self,
        name: &str,
        target: impl Into<String>,
        class: &str,
        priority: HookPriority,
        params: HookParams,
        is_pattern: bool,
    ) -> bool {
        let mut params = params;
        params.insert(CLASS_PARAM.to_string(), json!(class));
        self.register(name, HookKind::ClassMethod, target, priority, params, is_pattern)
    }

    /// Register a named free function as the delegating handler.
    ///
    /// A delegating handler's return value replaces the host's own result
    /// for the extension point; at most one delegate runs per fire.
    pub fn register_delegate_function(
        &self,
        name: &str,
        target: impl Into<String>,
        priority: HookPriority,
        is_pattern: bool,
    ) -> bool {
        let mut params = HookParams::new();
        params.insert(DELEGATE_PARAM.to_string(), json!(true));
        self.register(name, HookKind::Function, target, priority, params, is_pattern)
    }

    /// Register a host-module method as the delegating handler
    pub fn register_delegate_module_method(
        &self,
        name: &str,
        target: impl Into<String>,
        priority: HookPriority,
        is_pattern: bool,
    ) -> bool {
        let mut params = HookParams::new();
        params.insert(DELEGATE_PARAM.to_string(), json!(true));
        self.register(name, HookKind::ModuleMethod, target, priority, params, is_pattern)
    }

    /// Register a handler-class method as the delegating handler
    pub fn register_delegate_class_method(
        &self,
        name: &str,
        target: impl Into<String>,
        class: &str,
        priority: HookPriority,
        params: HookParams,
        is_pattern: bool,
    ) -> bool {
        let mut params = params;
        params.insert(DELEGATE_PARAM.to_string(), json!(true));
        params.insert(CLASS_PARAM.to_string(), json!(class));
        self.register(name, HookKind::ClassMethod, target, priority, params, is_pattern)
    }

    /// Define a free callable that `function` registrations resolve by name
    pub fn define_function<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut HookVars, &str) -> HookResult<Option<Value>> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Register a factory for a handler class, resolved on first use of
    /// that class as a `class_method` target
    pub fn register_handler_class<F: HandlerFactory + 'static>(
        &self,
        class: impl Into<String>,
        factory: F,
    ) {
        self.cache.register_factory(class, factory);
    }

    /// Install the host module that `module_method` registrations call into
    pub fn set_host_module(&self, host: Arc<dyn HostModule>) {
        if let Ok(mut slot) = self.host.write() {
            *slot = Some(host);
        }
    }

    // ---- behavior surface --------------------------------------------

    /// Attach an owner-scoped callback; duplicates are allowed
    pub fn add_behavior(
        &self,
        name: &str,
        owner: OwnerId,
        callback: HookFn,
        priority: HookPriority,
    ) {
        tracing::debug!(hook = %name, owner = owner.as_u64(), "adding behavior hook");
        self.behaviors.add(name, owner, callback, priority);
    }

    /// Detach owner-scoped callbacks.
    ///
    /// Without a callback, removes every registration for the pair; with
    /// one, removes only pointer-identical entries. Returns whether
    /// anything was removed.
    pub fn remove_behavior(&self, name: &str, owner: OwnerId, callback: Option<&HookFn>) -> bool {
        self.behaviors.remove(name, owner, callback)
    }

    // ---- dispatch ----------------------------------------------------

    /// Fire a hook by name.
    ///
    /// Collects the exact-name registrations plus every matching pattern
    /// registration, runs the normal handlers in priority order (higher
    /// first, registration order on ties), then at most one delegating
    /// handler. Lookup is case-insensitive. Handler errors propagate;
    /// `vars` mutations already applied remain.
    pub fn fire(&self, name: &str, vars: &mut HookVars) -> HookResult<FireOutcome> {
        let name = name.to_lowercase();
        let candidates = self.hooks.candidates_for(&name);
        if candidates.is_empty() {
            return Ok(FireOutcome::Empty);
        }

        let (mut normal, mut delegates): (Vec<HookRegistration>, Vec<HookRegistration>) =
            candidates.into_iter().partition(|reg| !reg.is_delegate());
        normal.sort_by_key(|reg| (Reverse(reg.priority), reg.seq));
        delegates.sort_by_key(|reg| (Reverse(reg.priority), reg.seq));

        let fire_id = Uuid::new_v4();
        tracing::debug!(
            hook = %name,
            %fire_id,
            normal = normal.len(),
            delegates = delegates.len(),
            "firing hook"
        );

        let is_template = name.starts_with(TEMPLATE_PREFIX);
        let mut template_results = Vec::new();

        for registration in &normal {
            let value = self.invoke(registration, vars, &name)?;
            if is_template {
                template_results.push(value.unwrap_or(Value::Null));
            }
        }

        // Single-winner policy: only the best-ranked delegate ever runs,
        // and its result supersedes template-result collection.
        if let Some(winner) = delegates.first() {
            let value = self.invoke(winner, vars, &name)?;
            return Ok(FireOutcome::DelegateResult(value.unwrap_or(Value::Null)));
        }

        if is_template {
            Ok(FireOutcome::TemplateResults(template_results))
        } else {
            Ok(FireOutcome::Empty)
        }
    }

    /// Run the owner-scoped callbacks for a hook.
    ///
    /// Entries run in priority order as plain callbacks; their return
    /// values are discarded and delegate semantics never apply. With
    /// `with_global`, the exact-name global hook fires afterwards with the
    /// same `vars`, its outcome discarded.
    pub fn run_behavior(
        &self,
        name: &str,
        owner: OwnerId,
        vars: &mut HookVars,
        with_global: bool,
    ) -> HookResult<()> {
        let name = name.to_lowercase();
        for registration in self.behaviors.snapshot(&name, owner) {
            tracing::trace!(hook = %name, owner = owner.as_u64(), "running behavior callback");
            (registration.callback)(vars, &name)?;
        }
        if with_global {
            self.fire(&name, vars)?;
        }
        Ok(())
    }

    // ---- handler resolution ------------------------------------------

    fn invoke(
        &self,
        registration: &HookRegistration,
        vars: &mut HookVars,
        hook: &str,
    ) -> HookResult<Option<Value>> {
        tracing::trace!(
            hook = %hook,
            kind = %registration.kind,
            target = %registration.target,
            "running handler"
        );
        match registration.kind {
            HookKind::Function => {
                // Clone the callable out so no registry lock is held while
                // it runs.
                let callable = self
                    .functions
                    .get(&registration.target)
                    .map(|entry| entry.clone())
                    .ok_or_else(|| HookError::target_not_found(&registration.target))?;
                callable(vars, hook)
            }
            HookKind::ModuleMethod => {
                let host = self.host.read().ok().and_then(|slot| slot.clone());
                let Some(host) = host else {
                    return Err(HookError::HostModuleMissing {
                        target: registration.target.clone(),
                    });
                };
                host.call(&registration.target, vars, hook)
            }
            HookKind::ClassMethod => {
                let Some(class) = registration.class_name() else {
                    tracing::debug!(
                        target = %registration.target,
                        "class-method registration without class param; skipping"
                    );
                    return Ok(None);
                };
                let Some(instance) = self.cache.get_or_create(class) else {
                    tracing::debug!(class = %class, "no handler class registered; skipping");
                    return Ok(None);
                };
                instance.call(&registration.target, vars, hook)
            }
        }
    }
}

impl Default for HookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{hook_fn, HookHandler};

    fn tracing_dispatcher() -> HookDispatcher {
        let dispatcher = HookDispatcher::new();
        for target in ["alpha", "beta", "gamma", "delta"] {
            dispatcher.define_function(target, move |vars, _| {
                push_trace(vars, target);
                Ok(Some(json!(target)))
            });
        }
        dispatcher
    }

    fn push_trace(vars: &mut HookVars, tag: &str) {
        if !vars.contains_key("trace") {
            vars.insert("trace", json!([]));
        }
        if let Some(Value::Array(trace)) = vars.get_mut("trace") {
            trace.push(json!(tag));
        }
    }

    fn trace_of(vars: &HookVars) -> Vec<String> {
        vars.get("trace")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .map(|v| v.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_no_candidates_returns_empty() {
        let dispatcher = HookDispatcher::new();
        let mut vars = HookVars::new();
        let outcome = dispatcher.fire("nothing_registered", &mut vars).unwrap();
        assert!(outcome.is_empty());
        assert!(vars.is_empty());
    }

    #[test]
    fn test_priority_order_then_registration_order() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_function("save", "alpha", HookPriority(5), false);
        dispatcher.register_function("save", "beta", HookPriority(10), false);
        dispatcher.register_function("save", "gamma", HookPriority(5), false);

        let mut vars = HookVars::new();
        dispatcher.fire("save", &mut vars).unwrap();
        assert_eq!(trace_of(&vars), vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn test_case_insensitive_register_and_fire() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_function("Topic_Edit_Before", "alpha", HookPriority::DEFAULT, false);

        let mut vars = HookVars::new();
        dispatcher.fire("TOPIC_EDIT_BEFORE", &mut vars).unwrap();
        assert_eq!(trace_of(&vars), vec!["alpha"]);
    }

    #[test]
    fn test_pattern_and_exact_merge_in_registration_order() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_function("topic_save", "alpha", HookPriority::DEFAULT, false);
        dispatcher.register_function("^topic_", "beta", HookPriority::DEFAULT, true);
        dispatcher.register_function("topic_save", "gamma", HookPriority::DEFAULT, false);

        let mut vars = HookVars::new();
        dispatcher.fire("topic_save", &mut vars).unwrap();
        assert_eq!(trace_of(&vars), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_single_delegate_winner() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_delegate_function("save", "alpha", HookPriority(1), false);
        dispatcher.register_delegate_function("save", "beta", HookPriority(2), false);
        dispatcher.register_function("save", "gamma", HookPriority(7), false);

        let mut vars = HookVars::new();
        let outcome = dispatcher.fire("save", &mut vars).unwrap();

        // All normal handlers ran, exactly one delegate ran.
        assert_eq!(trace_of(&vars), vec!["gamma", "beta"]);
        assert_eq!(outcome.delegate_result(), Some(&json!("beta")));
    }

    #[test]
    fn test_template_hook_collects_results() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_function("Template_Head", "alpha", HookPriority(2), false);
        dispatcher.register_function("template_head", "beta", HookPriority(1), false);

        let mut vars = HookVars::new();
        let outcome = dispatcher.fire("template_head", &mut vars).unwrap();
        assert_eq!(
            outcome.template_results(),
            Some(&[json!("alpha"), json!("beta")][..])
        );
    }

    #[test]
    fn test_template_results_superseded_by_delegate() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_function("template_head", "alpha", HookPriority::DEFAULT, false);
        dispatcher.register_delegate_function("template_head", "beta", HookPriority::DEFAULT, false);

        let mut vars = HookVars::new();
        let outcome = dispatcher.fire("template_head", &mut vars).unwrap();

        assert_eq!(outcome.delegate_result(), Some(&json!("beta")));
        // The normal handler still ran for its side effects.
        assert_eq!(trace_of(&vars), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_unknown_function_target_propagates() {
        let dispatcher = HookDispatcher::new();
        dispatcher.register_function("save", "never_defined", HookPriority::DEFAULT, false);

        let mut vars = HookVars::new();
        let err = dispatcher.fire("save", &mut vars).unwrap_err();
        assert!(matches!(err, HookError::TargetNotFound { .. }));
    }

    #[test]
    fn test_module_method_requires_host() {
        struct Host;
        impl HostModule for Host {
            fn call(
                &self,
                method: &str,
                vars: &mut HookVars,
                _hook: &str,
            ) -> HookResult<Option<Value>> {
                match method {
                    "audit" => {
                        vars.insert("audited", json!(true));
                        Ok(None)
                    }
                    other => Err(HookError::target_not_found(other)),
                }
            }
        }

        let dispatcher = HookDispatcher::new();
        dispatcher.register_module_method("save", "audit", HookPriority::DEFAULT, false);

        let mut vars = HookVars::new();
        let err = dispatcher.fire("save", &mut vars).unwrap_err();
        assert!(matches!(err, HookError::HostModuleMissing { .. }));

        dispatcher.set_host_module(Arc::new(Host));
        dispatcher.fire("save", &mut vars).unwrap();
        assert_eq!(vars.get_bool("audited"), Some(true));
    }

    #[test]
    fn test_unresolvable_class_is_silently_skipped() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_class_method(
            "template_head",
            "inject",
            "never_registered",
            HookPriority(9),
            HookParams::new(),
            false,
        );
        dispatcher.register_function("template_head", "alpha", HookPriority(1), false);

        let mut vars = HookVars::new();
        let outcome = dispatcher.fire("template_head", &mut vars).unwrap();

        // The skipped handler still occupies its template-result slot.
        assert_eq!(
            outcome.template_results(),
            Some(&[Value::Null, json!("alpha")][..])
        );
    }

    #[test]
    fn test_class_method_without_class_param_is_skipped() {
        let dispatcher = HookDispatcher::new();
        // Raw registration with the reserved class key absent.
        dispatcher.register(
            "template_head",
            HookKind::ClassMethod,
            "inject",
            HookPriority::DEFAULT,
            HookParams::new(),
            false,
        );

        let mut vars = HookVars::new();
        let outcome = dispatcher.fire("template_head", &mut vars).unwrap();
        assert_eq!(outcome.template_results(), Some(&[Value::Null][..]));
    }

    #[test]
    fn test_class_instance_shared_across_registrations() {
        struct Recorder;
        impl HookHandler for Recorder {
            fn call(
                &self,
                method: &str,
                vars: &mut HookVars,
                _hook: &str,
            ) -> HookResult<Option<Value>> {
                push_trace(vars, method);
                Ok(None)
            }
            fn class_name(&self) -> &str {
                "recorder"
            }
        }

        use std::sync::atomic::{AtomicUsize, Ordering};
        static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

        let dispatcher = HookDispatcher::new();
        dispatcher.register_handler_class("recorder", || {
            CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
            Arc::new(Recorder) as Arc<dyn HookHandler>
        });
        dispatcher.register_class_method(
            "topic_add",
            "on_add",
            "recorder",
            HookPriority::DEFAULT,
            HookParams::new(),
            false,
        );
        dispatcher.register_class_method(
            "topic_edit",
            "on_edit",
            "recorder",
            HookPriority::DEFAULT,
            HookParams::new(),
            false,
        );

        let mut vars = HookVars::new();
        dispatcher.fire("topic_add", &mut vars).unwrap();
        dispatcher.fire("topic_edit", &mut vars).unwrap();
        dispatcher.fire("topic_add", &mut vars).unwrap();

        assert_eq!(trace_of(&vars), vec!["on_add", "on_edit", "on_add"]);
        assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_behavior_then_global() {
        let dispatcher = tracing_dispatcher();
        let owner = OwnerId::next();
        dispatcher.register_function("render", "alpha", HookPriority::DEFAULT, false);
        dispatcher.add_behavior(
            "render",
            owner,
            hook_fn(|vars, _| {
                push_trace(vars, "scoped");
                Ok(None)
            }),
            HookPriority::DEFAULT,
        );

        let mut vars = HookVars::new();
        dispatcher.run_behavior("render", owner, &mut vars, true).unwrap();
        assert_eq!(trace_of(&vars), vec!["scoped", "alpha"]);

        // Without the global flag only the scoped callback runs.
        let mut vars = HookVars::new();
        dispatcher.run_behavior("render", owner, &mut vars, false).unwrap();
        assert_eq!(trace_of(&vars), vec!["scoped"]);
    }

    #[test]
    fn test_behavior_ignores_delegate_semantics() {
        let dispatcher = HookDispatcher::new();
        let owner = OwnerId::next();

        // A callback that would be a delegate in the global table is run
        // as a plain callback here; its return value is discarded.
        dispatcher.add_behavior(
            "render",
            owner,
            hook_fn(|vars, _| {
                vars.insert("ran", json!(true));
                Ok(Some(json!("ignored")))
            }),
            HookPriority::DEFAULT,
        );

        let mut vars = HookVars::new();
        dispatcher.run_behavior("render", owner, &mut vars, false).unwrap();
        assert_eq!(vars.get_bool("ran"), Some(true));
    }

    #[test]
    fn test_handler_failure_keeps_prior_mutations() {
        let dispatcher = HookDispatcher::new();
        dispatcher.define_function("mutate", |vars, _| {
            vars.insert("step", json!(1));
            Ok(None)
        });
        dispatcher.define_function("explode", |_, _| Err(HookError::custom("handler blew up")));

        dispatcher.register_function("save", "mutate", HookPriority(2), false);
        dispatcher.register_function("save", "explode", HookPriority(1), false);

        let mut vars = HookVars::new();
        let err = dispatcher.fire("save", &mut vars).unwrap_err();
        assert_eq!(err.to_string(), "handler blew up");
        assert_eq!(vars.get_i64("step"), Some(1));
    }

    #[test]
    fn test_late_registration_not_retroactive() {
        let dispatcher = tracing_dispatcher();
        dispatcher.register_function("save", "alpha", HookPriority::DEFAULT, false);

        let mut vars = HookVars::new();
        dispatcher.fire("save", &mut vars).unwrap();
        assert_eq!(trace_of(&vars), vec!["alpha"]);

        dispatcher.register_function("save", "beta", HookPriority(10), false);

        let mut vars = HookVars::new();
        dispatcher.fire("save", &mut vars).unwrap();
        assert_eq!(trace_of(&vars), vec!["beta", "alpha"]);
    }
}
