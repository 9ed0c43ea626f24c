//! Session configuration.
//!
//! Budgets bound how much a single session may allocate; exceeding one is a
//! fatal error that terminates the session. Defaults are generous enough for
//! any realistic compilation unit and can be overridden from the process
//! environment with `SessionConfig::from_env`. Arena budgets are clamped to
//! what a handle index can address.

use super::error::ConfigError;
use super::handle::MAX_INDEX;

/// Environment variable overriding [`SessionConfig::max_environments`].
pub const ENV_MAX_ENVIRONMENTS: &str = "ENVMOD_MAX_ENVIRONMENTS";
/// Environment variable overriding [`SessionConfig::max_bindings`].
pub const ENV_MAX_BINDINGS: &str = "ENVMOD_MAX_BINDINGS";
/// Environment variable overriding [`SessionConfig::max_hierarchies`].
pub const ENV_MAX_HIERARCHIES: &str = "ENVMOD_MAX_HIERARCHIES";
/// Environment variable overriding [`SessionConfig::identifier_capacity`].
pub const ENV_IDENTIFIER_CAPACITY: &str = "ENVMOD_IDENTIFIER_CAPACITY";
/// Environment variable overriding [`SessionConfig::max_identifier`].
pub const ENV_MAX_IDENTIFIER: &str = "ENVMOD_MAX_IDENTIFIER";

/// Tuning and budgets for a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of live environments.
    pub max_environments: usize,
    /// Maximum number of live bindings.
    pub max_bindings: usize,
    /// Maximum number of independent hierarchies (`new_env` roots).
    pub max_hierarchies: usize,
    /// Identifier stacks preallocated per hierarchy; more are added on demand.
    pub identifier_capacity: usize,
    /// Largest identifier number accepted by binding and lookup operations.
    pub max_identifier: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_environments: 1 << 20,
            max_bindings: 1 << 22,
            max_hierarchies: 1 << 16,
            identifier_capacity: 64,
            max_identifier: 1 << 24,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by any `ENVMOD_*` variables set in the process
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let fields: [(&'static str, &mut usize); 5] = [
            (ENV_MAX_ENVIRONMENTS, &mut config.max_environments),
            (ENV_MAX_BINDINGS, &mut config.max_bindings),
            (ENV_MAX_HIERARCHIES, &mut config.max_hierarchies),
            (ENV_IDENTIFIER_CAPACITY, &mut config.identifier_capacity),
            (ENV_MAX_IDENTIFIER, &mut config.max_identifier),
        ];
        for (var, field) in fields {
            if let Some(value) = lookup(var) {
                *field = match value.trim().parse::<usize>() {
                    Ok(parsed) if parsed > 0 => parsed,
                    _ => return Err(ConfigError::InvalidValue { var, value }),
                };
            }
        }
        Ok(config.clamped())
    }

    /// The same configuration with the environment and binding budgets
    /// limited to the slots a handle can address. The identifier maximum is
    /// held to the same range.
    pub fn clamped(mut self) -> Self {
        self.max_environments = self.max_environments.min(MAX_INDEX);
        self.max_bindings = self.max_bindings.min(MAX_INDEX);
        self.max_identifier = self.max_identifier.min(MAX_INDEX);
        self
    }

    pub fn with_max_environments(mut self, limit: usize) -> Self {
        self.max_environments = limit;
        self
    }

    pub fn with_max_bindings(mut self, limit: usize) -> Self {
        self.max_bindings = limit;
        self
    }

    pub fn with_max_hierarchies(mut self, limit: usize) -> Self {
        self.max_hierarchies = limit;
        self
    }

    pub fn with_identifier_capacity(mut self, capacity: usize) -> Self {
        self.identifier_capacity = capacity;
        self
    }

    pub fn with_max_identifier(mut self, limit: usize) -> Self {
        self.max_identifier = limit;
        self
    }
}
