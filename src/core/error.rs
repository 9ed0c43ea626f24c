// This module defines error types for envmod using the thiserror crate for idiomatic Rust
// error handling. EnvError is the main error enum and covers three kinds of failure:
// misuse of the API (stale environment, binding or checkpoint handles, identifier numbers
// past the configured maximum), setup-protocol
// violations that the caller can recover from (an inheritance edge that would close a
// cycle, targets a frozen class, or crosses hierarchies), and fatal exhaustion of a
// session budget, after which the session refuses further work. Each variant knows its
// diagnostic severity and numeric code so the session can forward it to the diagnostic
// sink. BitSetError and ConfigError cover the bit-set and configuration layers, and
// EnvResult<T> is the convenience alias used throughout the environment module.

//! Error types for envmod.
//!
//! Using thiserror for more idiomatic error handling.

use super::diagnostics::Severity;
use std::fmt;
use thiserror::Error;

/// Errors raised by bit-set operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitSetError {
    #[error("Malformed range [{low}, {high}]")]
    InvalidRange { low: usize, high: usize },

    #[error("Element {elem} exceeds the largest storable element {limit}")]
    ElementTooLarge { elem: usize, limit: usize },
}

/// Session budget that can be exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    Environments,
    Bindings,
    Hierarchies,
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BudgetKind::Environments => "environment",
            BudgetKind::Bindings => "binding",
            BudgetKind::Hierarchies => "hierarchy",
        };
        f.write_str(name)
    }
}

/// Main error type for environment operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("Stale environment handle {index} (generation {generation})")]
    StaleEnvironment { index: usize, generation: u32 },

    #[error("Stale binding handle {index} (generation {generation})")]
    StaleBinding { index: usize, generation: u32 },

    #[error("Identifier {idn} exceeds the configured maximum {limit}")]
    IdentifierOutOfRange { idn: usize, limit: usize },

    #[error("Environments belong to different hierarchies")]
    HierarchyMismatch,

    #[error("Inheritance edge would create a cycle")]
    InheritanceCycle,

    #[error("Class has already been used for lookups; its superclasses are frozen")]
    ClassFrozen,

    #[error("Checkpoint is stale or belongs to another session")]
    StaleCheckpoint,

    #[error("The {kind} budget of {limit} is exhausted")]
    BudgetExceeded { kind: BudgetKind, limit: usize },

    #[error("Session was terminated by an earlier fatal error")]
    SessionTerminated,
}

impl EnvError {
    /// Severity with which the error is reported, or `None` for errors that
    /// are only returned to the caller.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            EnvError::StaleEnvironment { .. }
            | EnvError::StaleBinding { .. }
            | EnvError::IdentifierOutOfRange { .. }
            | EnvError::StaleCheckpoint => Some(Severity::Error),
            EnvError::BudgetExceeded { .. } => Some(Severity::Deadly),
            EnvError::HierarchyMismatch
            | EnvError::InheritanceCycle
            | EnvError::ClassFrozen
            | EnvError::SessionTerminated => None,
        }
    }

    /// Numeric code handed to the diagnostic sink.
    pub fn code(&self) -> u32 {
        match self {
            EnvError::StaleEnvironment { .. } => 101,
            EnvError::StaleBinding { .. } => 102,
            EnvError::StaleCheckpoint => 103,
            EnvError::IdentifierOutOfRange { .. } => 104,
            EnvError::HierarchyMismatch => 201,
            EnvError::InheritanceCycle => 202,
            EnvError::ClassFrozen => 203,
            EnvError::BudgetExceeded { .. } => 301,
            EnvError::SessionTerminated => 302,
        }
    }

    /// True for setup-protocol violations, which leave the session untouched
    /// and may simply be retried differently.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EnvError::HierarchyMismatch | EnvError::InheritanceCycle | EnvError::ClassFrozen
        )
    }
}

/// Result type alias for environment operations.
pub type EnvResult<T> = Result<T, EnvError>;

/// Errors raised while reading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: expected a positive integer")]
    InvalidValue { var: &'static str, value: String },
}
