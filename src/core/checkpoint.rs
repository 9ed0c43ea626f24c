// This module implements checkpoint/restore for a whole Session. Instead of rewinding raw
// allocation cursors, the session keeps an undo trail: while any checkpoint is live,
// every mutation of an existing environment, class descriptor or access mechanism pushes
// an Undo entry. save() records the lengths of the environment, binding and mechanism
// arenas together with the trail length, the key counter and the current environment of
// each hierarchy. restore() drops every lexical frame, replays the trail backwards,
// truncates the arenas, starts a new handle generation so handles to discarded objects
// are rejected instead of aliasing new ones, and finally re-enters the environments that
// were current at save time. Checkpoints nest LIFO; restoring or discarding one
// invalidates all younger ones.

//! Checkpoint and restore of the whole session.

use super::error::{EnvError, EnvResult};
use super::handle::EnvId;
use super::session::Session;
use crate::env::{DefKey, Idn};

/// Inverse of one mutation of an object that may predate a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Undo {
    /// A binding was appended to the environment's local list.
    LocalBinding { env: usize },
    /// The environment became a class and joined its mechanism's class list.
    ClassRegistered { env: usize, mechanism: usize },
    /// A superclass edge was appended.
    SuperclassAdded { env: usize },
    /// The class received its number and inhset.
    ClassNumbered { env: usize, mechanism: usize },
    /// A binding was inserted into a class stack at `position`.
    ClassStackInsert {
        mechanism: usize,
        idn: Idn,
        position: usize,
    },
    /// The environment's definition key changed.
    EnvKey { env: usize, previous: Option<DefKey> },
}

/// Opaque rollback token produced by [`Session::save`].
///
/// A checkpoint is consumed by exactly one [`Session::restore`] or
/// [`Session::discard`].
#[derive(Debug)]
#[must_use = "a checkpoint should be restored or discarded"]
pub struct Checkpoint {
    session: u64,
    serial: u64,
    envs: usize,
    bindings: usize,
    mechanisms: usize,
    trail: usize,
    next_key: u32,
    /// Current environment of each hierarchy alive at save time.
    current: Vec<Option<EnvId>>,
}

impl Checkpoint {
    /// Position of this checkpoint within its session's sequence.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl Session {
    /// Snapshot the current state of every arena.
    pub fn save(&mut self) -> EnvResult<Checkpoint> {
        self.ensure_live()?;
        let serial = self.next_checkpoint;
        self.next_checkpoint += 1;
        self.live_checkpoints.push(serial);
        self.stats.checkpoints_taken += 1;

        log::debug!(
            "Checkpoint {} saved: {} environments, {} bindings, {} hierarchies",
            serial,
            self.envs.len(),
            self.bindings.len(),
            self.mechanisms.len()
        );

        Ok(Checkpoint {
            session: self.id(),
            serial,
            envs: self.envs.len(),
            bindings: self.bindings.len(),
            mechanisms: self.mechanisms.len(),
            trail: self.trail.len(),
            next_key: self.next_key,
            current: self.mechanisms.iter().map(|m| m.current()).collect(),
        })
    }

    /// Roll every arena back to `checkpoint`.
    ///
    /// Everything created after the checkpoint disappears and handles to it
    /// become stale; everything older is exactly as it was when saved,
    /// including the current environment of each surviving hierarchy.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> EnvResult<()> {
        self.ensure_live()?;
        let position = self.live_position(&checkpoint)?;
        self.live_checkpoints.truncate(position);

        let mut left = 0;
        for mechanism in &mut self.mechanisms {
            left += mechanism.reset();
        }
        self.stats.scope_exits += left;

        let undone: Vec<Undo> = self.trail.drain(checkpoint.trail..).collect();
        for entry in undone.into_iter().rev() {
            self.undo(entry);
        }

        self.envs.truncate(checkpoint.envs);
        self.bindings.truncate(checkpoint.bindings);
        self.mechanisms.truncate(checkpoint.mechanisms);
        self.next_key = checkpoint.next_key;
        self.generation += 1;
        if self.live_checkpoints.is_empty() {
            self.trail.clear();
        }
        for &env in checkpoint.current.iter().flatten() {
            self.set_env(env);
        }
        self.stats.checkpoints_restored += 1;

        log::debug!(
            "Checkpoint {} restored: {} environments, {} bindings remain",
            checkpoint.serial,
            self.envs.len(),
            self.bindings.len()
        );
        Ok(())
    }

    /// Give up `checkpoint` without rolling back, along with every younger one.
    pub fn discard(&mut self, checkpoint: Checkpoint) -> EnvResult<()> {
        self.ensure_live()?;
        let position = self.live_position(&checkpoint)?;
        self.live_checkpoints.truncate(position);
        if self.live_checkpoints.is_empty() {
            self.trail.clear();
        }
        Ok(())
    }

    /// Number of checkpoints that can still be restored.
    pub fn live_checkpoints(&self) -> usize {
        self.live_checkpoints.len()
    }

    fn live_position(&self, checkpoint: &Checkpoint) -> EnvResult<usize> {
        if checkpoint.session != self.id() {
            return Err(self.fail(EnvError::StaleCheckpoint));
        }
        self.live_checkpoints
            .iter()
            .position(|&serial| serial == checkpoint.serial)
            .ok_or_else(|| self.fail(EnvError::StaleCheckpoint))
    }

    fn undo(&mut self, entry: Undo) {
        match entry {
            Undo::LocalBinding { env } => {
                self.envs[env].locals.pop();
            }
            Undo::ClassRegistered { env, mechanism } => {
                self.envs[env].class = None;
                self.mechanisms[mechanism].classes.pop();
            }
            Undo::SuperclassAdded { env } => {
                if let Some(class) = self.envs[env].class.as_mut() {
                    class.supers.pop();
                }
            }
            Undo::ClassNumbered { env, mechanism } => {
                if let Some(class) = self.envs[env].class.as_mut() {
                    class.number = None;
                    class.frozen = false;
                    if let Some(inhset) = class.inhset.take() {
                        self.pool.release(inhset);
                    }
                }
                self.mechanisms[mechanism].numbered.pop();
            }
            Undo::ClassStackInsert {
                mechanism,
                idn,
                position,
            } => {
                self.mechanisms[mechanism].remove_class_entry(idn, position);
            }
            Undo::EnvKey { env, previous } => {
                self.envs[env].key = previous;
            }
        }
    }
}
