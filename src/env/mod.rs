// This module is the environment module proper: scoped symbol tables whose environments
// form trees ("hierarchies"), with a subset of environments acting as classes in a
// multiple-inheritance DAG. An Environment owns its local Bindings, each pairing an
// identifier number with an opaque definition key. Every hierarchy shares one
// AccessMechanism (access.rs) holding a stack of visible bindings per identifier, which
// makes "innermost binding of identifier i" a constant-time read relative to whichever
// environment is current. scope.rs holds the lexical operations (creating scopes,
// binding, lookup), class.rs the inheritance operations (edges, lazy class numbering,
// inhsets, class lookup and override chains). All of them are methods on Session.

//! Scoped symbol tables with multiple inheritance.
//!
//! # Example
//!
//! ```
//! use envmod::Session;
//!
//! let mut session = Session::new();
//! let global = session.new_env().unwrap();
//! let local = session.new_scope(global).unwrap();
//!
//! let x = 1; // identifier number from the interning table
//! let outer = session.new_key();
//! let inner = session.new_key();
//! session.bind_key(global, x, outer).unwrap();
//! session.bind_key(local, x, inner).unwrap();
//!
//! assert_eq!(session.key_in_env(local, x).unwrap(), Some(inner));
//! assert_eq!(session.key_in_env(global, x).unwrap(), Some(outer));
//! ```

pub mod access;
pub mod class;
pub mod scope;

pub(crate) use access::AccessMechanism;
pub(crate) use class::ClassDescriptor;

use crate::core::handle::{BindingId, EnvId};
use std::fmt;

/// Identifier number as handed out by the interning table.
pub type Idn = usize;

/// Opaque definition key. The environment module stores and returns keys but
/// never looks inside them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefKey(u32);

impl DefKey {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for DefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefKey({})", self.0)
    }
}

/// Arena slot of one environment.
#[derive(Debug)]
pub(crate) struct EnvData {
    pub(crate) generation: u32,
    pub(crate) parent: Option<EnvId>,
    /// Distance from the hierarchy root.
    pub(crate) level: usize,
    /// Index of the hierarchy's access mechanism.
    pub(crate) mechanism: usize,
    pub(crate) key: Option<DefKey>,
    pub(crate) class: Option<ClassDescriptor>,
    /// Local bindings in creation order.
    pub(crate) locals: Vec<BindingId>,
}

impl EnvData {
    pub(crate) fn class_number(&self) -> Option<u32> {
        self.class.as_ref().and_then(|class| class.number)
    }
}

/// Arena slot of one binding.
#[derive(Debug)]
pub(crate) struct BindingData {
    pub(crate) generation: u32,
    pub(crate) idn: Idn,
    pub(crate) key: DefKey,
    /// Owning environment.
    pub(crate) env: EnvId,
}
