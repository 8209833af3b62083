//! Engine configuration
//!
//! [`EngineConfig`] is read from YAML with `${VAR:-default}` environment
//! substitution. Every field has a default, so a partial file only overrides
//! what it names.

use std::env;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParserLimits;
use crate::sandbox::SandboxPolicy;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config '{path}': {source}")]
    Io {
        /// File that was being read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not match [`EngineConfig`]
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is outside its permitted range
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted field name
        field: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Configuration for [`crate::ExpressionEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache compiled expressions
    pub enable_cache: bool,

    /// Capacity of the compiled expression cache
    pub cache_size: usize,

    /// Run the safety checker and restrict functions to sandbox-safe ones
    pub enable_sandbox: bool,

    /// Parser limits
    pub parser: ParserLimits,

    /// Sandbox policy and runtime limits
    pub sandbox: SandboxPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_size: 1000,
            enable_sandbox: true,
            parser: ParserLimits::default(),
            sandbox: SandboxPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration without the safety checker; runtime limits still apply
    #[must_use]
    pub fn unsandboxed() -> Self {
        Self {
            enable_sandbox: false,
            ..Self::default()
        }
    }

    /// Set the execution deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox.max_execution_time = timeout;
        self
    }

    /// Parse and validate a YAML document
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Yaml` for malformed YAML and
    /// `ConfigError::Invalid` when validation fails
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&substitute_env_vars(yaml))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`EngineConfig::from_yaml_str`]
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Yaml` if serialization fails
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject limits that would make every expression fail
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("cache_size", self.enable_cache.then_some(self.cache_size)),
            ("parser.max_depth", Some(self.parser.max_depth)),
            ("parser.max_length", Some(self.parser.max_length)),
            (
                "sandbox.max_recursion_depth",
                Some(self.sandbox.max_recursion_depth),
            ),
            (
                "sandbox.max_string_length",
                Some(self.sandbox.max_string_length),
            ),
            (
                "sandbox.max_collection_size",
                Some(self.sandbox.max_collection_size),
            ),
        ];
        for (field, value) in limits {
            if value == Some(0) {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if let Some(name) = self
            .sandbox
            .allowed_builtins
            .iter()
            .find(|name| self.sandbox.forbidden_names.contains(*name))
        {
            return Err(ConfigError::Invalid {
                field: "sandbox.allowed_builtins".to_string(),
                reason: format!("'{name}' is also a forbidden name"),
            });
        }
        Ok(())
    }
}

/// Substitute environment variables in the format `${VAR:-default}`
fn substitute_env_vars(content: &str) -> String {
    let re = match Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}") {
        Ok(regex) => regex,
        Err(_) => return content.to_string(),
    };

    re.replace_all(content, |caps: &regex::Captures| {
        let default_value = caps.get(2).map_or("", |m| m.as_str());
        env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
    })
    .into_owned()
}
