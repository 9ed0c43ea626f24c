// This module serves as the central hub for envmod's core infrastructure, the pieces that
// the environment module and the bit-sets are built on. It exports and organizes the
// session (arena ownership, handle validation, budgets and statistics), generational
// handles, checkpoint/restore over an undo trail, configuration read from the process
// environment, the diagnostic sink abstraction, and the error types. Environment
// operations themselves are implemented as further impl blocks on Session in crate::env.

//! Core envmod infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Owns the environment, binding and hierarchy arenas
//! - Enforces the budgets from [`SessionConfig`]
//! - Collects [`SessionStats`]
//!
//! ## Handles (`handle`)
//! - [`EnvId`] and [`BindingId`] pair a slot index with a generation
//!
//! ## Checkpoints (`checkpoint`)
//! - LIFO save/restore of the whole session
//!
//! ## Diagnostics (`diagnostics`)
//! - Severity-tagged reports handed to a pluggable [`DiagnosticSink`]

pub mod checkpoint;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handle;
pub mod session;
pub mod test_utils;

// Re-export core components
pub use checkpoint::Checkpoint;

pub use config::SessionConfig;

pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, LogSink, Position, Severity};

pub use error::{BitSetError, BudgetKind, ConfigError, EnvError, EnvResult};

pub use handle::{BindingId, EnvId};

pub use session::{Session, SessionStats};
