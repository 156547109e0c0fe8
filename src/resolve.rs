//! Collaborator interfaces consumed by the host, not implemented here
//!
//! The template-resolution shim around the dispatcher needs two narrow
//! services. Both are plain string/path rewriting with no dispatch logic of
//! their own, so the core only defines the seams and lets the host supply
//! the implementations.

use crate::errors::HookResult;
use std::path::PathBuf;

/// Maps a resource identifier to the identifier that overrides it.
///
/// Semantically the shape of a delegating hook, specialized to resource
/// names: an extension substitutes one identifier for another, and the
/// host uses the substitute wherever it would have used the original.
pub trait DelegateResolver: Send + Sync {
    /// Resolve the overriding identifier for a resource; identity when no
    /// override is registered
    fn resolve_delegate_target(&self, category: &str, resource_id: &str) -> String;
}

/// Resolves a component's template file path
pub trait TemplatePathResolver: Send + Sync {
    /// Resolve the path for a component's sub-template.
    ///
    /// With `required`, a missing template is an error; otherwise the
    /// implementation decides how to signal absence.
    fn resolve_component_template_path(
        &self,
        component: &str,
        sub_template: &str,
        required: bool,
    ) -> HookResult<PathBuf>;
}

/// Resolver that never overrides anything
pub struct IdentityDelegateResolver;

impl DelegateResolver for IdentityDelegateResolver {
    fn resolve_delegate_target(&self, _category: &str, resource_id: &str) -> String {
        resource_id.to_string()
    }
}
