//! Core vocabulary types for the dispatcher

use crate::errors::HookError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Reserved params key marking a delegating registration
pub const DELEGATE_PARAM: &str = "delegate";

/// Reserved params key naming the handler class for class-method registrations
pub const CLASS_PARAM: &str = "class";

/// Hooks whose name starts with this prefix collect the return value of
/// every normal handler that runs
pub const TEMPLATE_PREFIX: &str = "template_";

/// Free-form registration metadata
pub type HookParams = HashMap<String, Value>;

/// How a registration's target string is resolved when the hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// A free callable registered by name on the dispatcher
    Function,
    /// A method invoked by name on the installed host module
    ModuleMethod,
    /// A method invoked by name on a cached handler-class instance
    ClassMethod,
}

impl HookKind {
    /// Canonical string form, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::ModuleMethod => "module_method",
            Self::ClassMethod => "class_method",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "module_method" => Ok(Self::ModuleMethod),
            "class_method" => Ok(Self::ClassMethod),
            other => Err(HookError::invalid_config(format!(
                "unrecognized hook kind: {}",
                other
            ))),
        }
    }
}

/// Hook execution priority; higher runs earlier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HookPriority(pub i32);

impl HookPriority {
    pub const DEFAULT: Self = Self(1);
}

impl Default for HookPriority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i32> for HookPriority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Mutable parameter bag threaded through every handler of a fire.
///
/// Handlers communicate by mutating this in place; each handler sees the
/// cumulative mutations of all handlers that ran before it in the same fire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookVars(Map<String, Value>);

impl HookVars {
    /// Create an empty bag
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert a value, returning any previous value under the key
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a mutable value by key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Get a value as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Get a value as a bool
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Get a value as an i64
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in insertion-independent map order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying map
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for HookVars {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for HookVars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a fire produced for its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FireOutcome {
    /// No candidates matched, or only normal handlers ran on a
    /// non-template hook (effects happen through `HookVars` mutation)
    Empty,

    /// Return values of the normal handlers of a `template_` hook,
    /// in execution order
    TemplateResults(Vec<Value>),

    /// Return value of the single delegating handler that ran;
    /// supersedes template-result collection
    DelegateResult(Value),
}

impl FireOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Collected template results, if this was a template fire
    pub fn template_results(&self) -> Option<&[Value]> {
        match self {
            Self::TemplateResults(results) => Some(results),
            _ => None,
        }
    }

    /// The delegating handler's return value, if one ran
    pub fn delegate_result(&self) -> Option<&Value> {
        match self {
            Self::DelegateResult(value) => Some(value),
            _ => None,
        }
    }

    /// Consume into the delegating handler's return value
    pub fn into_delegate_result(self) -> Option<Value> {
        match self {
            Self::DelegateResult(value) => Some(value),
            _ => None,
        }
    }
}
