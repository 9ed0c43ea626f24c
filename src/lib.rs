//! envmod - Scoped symbol tables with multiple inheritance.
//!
//! envmod is the environment module of a compiler-generator runtime. It maps
//! identifier numbers to opaque definition keys through a tree of nested
//! scopes, lets a subset of scopes act as classes in a multiple-inheritance
//! DAG, and can roll the whole state back to a saved checkpoint.
//!
//! # Primary Usage
//!
//! ```
//! use envmod::Session;
//!
//! let mut session = Session::new();
//! let root = session.new_env().unwrap();
//! let base = session.new_scope(root).unwrap();
//! let derived = session.new_scope(root).unwrap();
//! session.inherit_class(derived, base).unwrap();
//!
//! let method = 42;
//! let inherited = session.bind_idn(base, method).unwrap();
//! assert_eq!(session.binding_in_scope(derived, method).unwrap(), Some(inherited));
//!
//! let checkpoint = session.save().unwrap();
//! let own = session.bind_idn(derived, method).unwrap();
//! assert_eq!(session.overrides_binding(own).unwrap(), Some(inherited));
//! session.restore(checkpoint).unwrap();
//! assert_eq!(session.binding_in_scope(derived, method).unwrap(), Some(inherited));
//! ```
//!
//! # Architecture
//!
//! - [`env`] - Environments, bindings, classes and lookups
//! - [`bitset`] - Extensible bit-sets and their pool
//! - [`core`] - Session, handles, checkpoints, configuration, diagnostics

pub mod bitset;
pub mod core;
pub mod env;

pub use self::bitset::{BitSet, BitSetPool};
pub use self::core::{
    // Session management
    Checkpoint, Session, SessionConfig, SessionStats,
    // Handles
    BindingId, EnvId,
    // Errors
    EnvError, EnvResult,
    // Diagnostics
    CollectingSink, Diagnostic, DiagnosticSink, Position, Severity,
};
pub use self::env::{DefKey, Idn};
