//! TOML configuration for declarative hook registration
//!
//! Extension packs declare their hook bindings as data; the host loads the
//! document at bootstrap and applies it to the dispatcher. Registrations
//! are rebuilt at every application start; nothing here persists live
//! dispatcher state.

use crate::dispatcher::HookDispatcher;
use crate::errors::{HookError, HookResult};
use crate::types::{HookKind, HookParams, HookPriority, CLASS_PARAM, DELEGATE_PARAM};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

/// Main hooks configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// System-wide configuration
    #[serde(default)]
    pub system: SystemConfig,

    /// Individual hook registrations
    #[serde(default, rename = "hook")]
    pub hooks: Vec<HookEntry>,
}

/// System-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Whether the document is applied at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Error on rejected registrations instead of skipping them
    #[serde(default)]
    pub strict: bool,
}

/// One declarative hook registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEntry {
    /// Hook name, or a regex when `pattern` is set
    pub name: String,

    /// Handler kind: `function`, `module_method`, or `class_method`
    pub kind: HookKind,

    /// Callable identifier resolved at fire time
    pub target: String,

    /// Higher runs earlier
    #[serde(default)]
    pub priority: HookPriority,

    /// Handler class name for `class_method` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Route to the delegate path
    #[serde(default)]
    pub delegate: bool,

    /// Match `name` as a regex against fired names
    #[serde(default)]
    pub pattern: bool,

    /// Whether this entry is applied
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Extra registration metadata
    #[serde(default, skip_serializing_if = "HookParams::is_empty")]
    pub params: HookParams,
}

impl HooksConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self {
            system: SystemConfig::default(),
            hooks: Vec::new(),
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Save configuration to a TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> HookResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents).map_err(|e| HookError::invalid_config(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> HookResult<()> {
        for entry in &self.hooks {
            entry.validate()?;
        }
        Ok(())
    }

    /// Apply every enabled entry to the dispatcher, returning how many
    /// registrations were made.
    ///
    /// Rejected entries are skipped with a warning unless `system.strict`
    /// is set, in which case the first rejection aborts the apply.
    pub fn apply(&self, dispatcher: &HookDispatcher) -> HookResult<usize> {
        if !self.system.enabled {
            tracing::debug!("hooks configuration disabled; applying nothing");
            return Ok(0);
        }

        let mut applied = 0;
        for entry in &self.hooks {
            if !entry.enabled {
                continue;
            }

            let mut params = entry.params.clone();
            if entry.delegate {
                params.insert(DELEGATE_PARAM.to_string(), json!(true));
            }
            if let Some(class) = &entry.class {
                params.insert(CLASS_PARAM.to_string(), json!(class));
            }

            let registered = dispatcher.register(
                &entry.name,
                entry.kind,
                entry.target.as_str(),
                entry.priority,
                params,
                entry.pattern,
            );
            if registered {
                applied += 1;
            } else if self.system.strict {
                return Err(HookError::invalid_config(format!(
                    "registration rejected for hook '{}'",
                    entry.name
                )));
            } else {
                tracing::warn!(hook = %entry.name, "skipping rejected hook entry");
            }
        }
        Ok(applied)
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
        }
    }
}

impl HookEntry {
    /// Validate one entry
    pub fn validate(&self) -> HookResult<()> {
        if self.name.is_empty() {
            return Err(HookError::invalid_config("hook name cannot be empty"));
        }

        if self.kind == HookKind::ClassMethod
            && self.class.is_none()
            && !self.params.contains_key(CLASS_PARAM)
        {
            return Err(HookError::invalid_config(format!(
                "class_method entry '{}' names no handler class",
                self.name
            )));
        }

        if self.pattern {
            Regex::new(&self.name.to_lowercase()).map_err(|source| HookError::InvalidPattern {
                pattern: self.name.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}
