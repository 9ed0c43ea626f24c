//! Generational handles into the session arenas.
//!
//! A handle pairs a slot index with the generation the slot was allocated in.
//! Restoring a checkpoint truncates the arenas and starts a new generation, so
//! handles to discarded slots can never alias objects allocated afterwards.

use std::fmt;

/// Largest slot index a handle can carry.
pub const MAX_INDEX: usize = u32::MAX as usize;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            /// `index` must not exceed [`MAX_INDEX`]; session budgets are
            /// clamped so allocation never produces a larger one.
            pub(crate) const fn new(index: usize, generation: u32) -> Self {
                debug_assert!(index <= MAX_INDEX);
                Self {
                    index: index as u32,
                    generation,
                }
            }

            /// Slot index within the owning arena.
            pub const fn index(self) -> usize {
                self.index as usize
            }

            /// Generation the slot was allocated in.
            pub const fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($name), "({}@{})"),
                    self.index, self.generation
                )
            }
        }
    };
}

define_handle!(
    /// Handle to an environment (scope or class).
    EnvId
);
define_handle!(
    /// Handle to a binding.
    BindingId
);
