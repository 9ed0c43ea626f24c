// This module provides the Session, the single owner of all state in envmod. A Session
// holds the environment, binding and access-mechanism arenas (slot vectors addressed by
// generational handles), the bit-set pool, a bumpalo scratch arena for traversal work
// stacks, the undo trail backing checkpoints, the diagnostic sink and the statistics.
// There are no globals, so independent sessions can coexist. The session resolves
// handles (reporting stale ones to the sink), enforces the allocation budgets from
// SessionConfig, and turns itself off after a deadly error: every later operation
// returns SessionTerminated. SessionStats tracks hierarchy, scope, binding, class and
// checkpoint activity. The environment operations themselves live in crate::env as
// further impl blocks on Session.

//! Session management.
//!
//! All environments, bindings and hierarchies created through a session share
//! its lifetime. Handles stay cheap `Copy` values and are validated on use.

use crate::bitset::BitSetPool;
use crate::core::checkpoint::Undo;
use crate::core::config::SessionConfig;
use crate::core::diagnostics::{Diagnostic, DiagnosticSink, LogSink, Position, Severity};
use crate::core::error::{BudgetKind, EnvError, EnvResult};
use crate::core::handle::{BindingId, EnvId};
use crate::env::{AccessMechanism, BindingData, DefKey, EnvData, Idn};
use bumpalo::Bump;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of session identities, used to reject foreign checkpoints.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Owner of every arena in play.
pub struct Session {
    id: u64,
    config: SessionConfig,

    pub(crate) envs: Vec<EnvData>,
    pub(crate) bindings: Vec<BindingData>,
    pub(crate) mechanisms: Vec<AccessMechanism>,
    pub(crate) pool: BitSetPool,

    /// Work stacks for scope ascent and inheritance traversals.
    scratch: Bump,

    pub(crate) trail: Vec<Undo>,
    pub(crate) live_checkpoints: Vec<u64>,
    pub(crate) next_checkpoint: u64,
    pub(crate) generation: u32,
    pub(crate) next_key: u32,

    terminated: Cell<bool>,
    sink: RefCell<Box<dyn DiagnosticSink>>,
    position: Cell<Option<Position>>,
    reported: Cell<usize>,
    pub(crate) stats: SessionStats,
}

impl Session {
    /// Create a session with default budgets that reports through `log`.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            config: config.clamped(),
            envs: Vec::new(),
            bindings: Vec::new(),
            mechanisms: Vec::new(),
            pool: BitSetPool::new(),
            scratch: Bump::new(),
            trail: Vec::new(),
            live_checkpoints: Vec::new(),
            next_checkpoint: 0,
            generation: 0,
            next_key: 0,
            terminated: Cell::new(false),
            sink: RefCell::new(Box::new(LogSink)),
            position: Cell::new(None),
            reported: Cell::new(0),
            stats: SessionStats::default(),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_sink<S: DiagnosticSink + 'static>(self, sink: S) -> Self {
        *self.sink.borrow_mut() = Box::new(sink);
        self
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The session's bit-set pool.
    pub fn pool(&mut self) -> &mut BitSetPool {
        &mut self.pool
    }

    /// Position attached to subsequent diagnostics.
    pub fn set_position(&self, position: Option<Position>) {
        self.position.set(position);
    }

    /// Whether a deadly error has shut the session down.
    pub fn is_terminated(&self) -> bool {
        self.terminated.get()
    }

    /// Get session statistics.
    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.clone();
        stats.diagnostics_reported = self.reported.get();
        stats
    }

    /// Hand a diagnostic to the sink. A deadly report terminates the session.
    pub fn report(&self, severity: Severity, message: impl Into<String>, code: u32) {
        let diagnostic = Diagnostic {
            severity,
            message: message.into(),
            code,
            position: self.position.get(),
        };
        self.sink.borrow_mut().report(&diagnostic);
        self.reported.set(self.reported.get() + 1);
        if severity == Severity::Deadly {
            self.terminated.set(true);
        }
    }

    /// Report `err` if it is a reportable kind and hand it back.
    pub(crate) fn fail(&self, err: EnvError) -> EnvError {
        if let Some(severity) = err.severity() {
            self.report(severity, err.to_string(), err.code());
        }
        err
    }

    pub(crate) fn ensure_live(&self) -> EnvResult<()> {
        if self.terminated.get() {
            return Err(EnvError::SessionTerminated);
        }
        Ok(())
    }

    /// Reject identifier numbers above the configured maximum.
    pub(crate) fn check_idn(&self, idn: Idn) -> EnvResult<()> {
        if idn > self.config.max_identifier {
            return Err(self.fail(EnvError::IdentifierOutOfRange {
                idn,
                limit: self.config.max_identifier,
            }));
        }
        Ok(())
    }

    /// A fresh definition key.
    pub fn new_key(&mut self) -> DefKey {
        let key = DefKey::from_raw(self.next_key);
        self.next_key += 1;
        key
    }

    /// Resolve an environment handle, reporting it if stale.
    pub(crate) fn env_data(&self, env: EnvId) -> EnvResult<&EnvData> {
        match self.envs.get(env.index()) {
            Some(data) if data.generation == env.generation() => Ok(data),
            _ => Err(self.fail(EnvError::StaleEnvironment {
                index: env.index(),
                generation: env.generation(),
            })),
        }
    }

    /// Resolve a binding handle, reporting it if stale.
    pub(crate) fn binding_data(&self, binding: BindingId) -> EnvResult<&BindingData> {
        match self.bindings.get(binding.index()) {
            Some(data) if data.generation == binding.generation() => Ok(data),
            _ => Err(self.fail(EnvError::StaleBinding {
                index: binding.index(),
                generation: binding.generation(),
            })),
        }
    }

    /// Allocate an environment slot. `mechanism` must already exist or be the
    /// next one pushed.
    pub(crate) fn alloc_env(
        &mut self,
        parent: Option<EnvId>,
        level: usize,
        mechanism: usize,
    ) -> EnvResult<EnvId> {
        if self.envs.len() >= self.config.max_environments {
            return Err(self.fail(EnvError::BudgetExceeded {
                kind: BudgetKind::Environments,
                limit: self.config.max_environments,
            }));
        }
        let id = EnvId::new(self.envs.len(), self.generation);
        self.envs.push(EnvData {
            generation: self.generation,
            parent,
            level,
            mechanism,
            key: None,
            class: None,
            locals: Vec::new(),
        });
        self.stats.environments_created += 1;
        Ok(id)
    }

    /// Start a new hierarchy: a root environment plus its access mechanism.
    pub(crate) fn alloc_hierarchy(&mut self) -> EnvResult<EnvId> {
        if self.mechanisms.len() >= self.config.max_hierarchies {
            return Err(self.fail(EnvError::BudgetExceeded {
                kind: BudgetKind::Hierarchies,
                limit: self.config.max_hierarchies,
            }));
        }
        let mechanism = self.mechanisms.len();
        let root = self.alloc_env(None, 0, mechanism)?;
        self.mechanisms
            .push(AccessMechanism::new(root, self.config.identifier_capacity));
        self.stats.hierarchies_created += 1;
        Ok(root)
    }

    /// Allocate a binding slot. The caller links it into its environment.
    pub(crate) fn alloc_binding(
        &mut self,
        idn: Idn,
        key: DefKey,
        env: EnvId,
    ) -> EnvResult<BindingId> {
        if self.bindings.len() >= self.config.max_bindings {
            return Err(self.fail(EnvError::BudgetExceeded {
                kind: BudgetKind::Bindings,
                limit: self.config.max_bindings,
            }));
        }
        let id = BindingId::new(self.bindings.len(), self.generation);
        self.bindings.push(BindingData {
            generation: self.generation,
            idn,
            key,
            env,
        });
        self.stats.bindings_created += 1;
        Ok(id)
    }

    /// Log an undo entry while any checkpoint is live.
    pub(crate) fn record(&mut self, undo: Undo) {
        if !self.live_checkpoints.is_empty() {
            self.trail.push(undo);
        }
    }

    /// Run `f` with the scratch arena, reset beforehand.
    ///
    /// The arena is moved out for the duration of the call so `f` may borrow
    /// the session mutably while holding scratch allocations.
    pub(crate) fn with_scratch<R>(&mut self, f: impl FnOnce(&mut Self, &Bump) -> R) -> R {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.reset();
        let result = f(self, &scratch);
        self.scratch = scratch;
        result
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("environments", &self.envs.len())
            .field("bindings", &self.bindings.len())
            .field("hierarchies", &self.mechanisms.len())
            .field("live_checkpoints", &self.live_checkpoints.len())
            .field("terminated", &self.terminated.get())
            .finish()
    }
}

/// Session statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Hierarchies started with `new_env`.
    pub hierarchies_created: usize,

    /// Environments created, roots included.
    pub environments_created: usize,

    /// Bindings created.
    pub bindings_created: usize,

    /// Environments registered as classes.
    pub classes_registered: usize,

    /// Classes that received a class number.
    pub classes_numbered: usize,

    /// Environments entered into an access mechanism.
    pub scope_entries: usize,

    /// Environments left again.
    pub scope_exits: usize,

    /// Checkpoints taken.
    pub checkpoints_taken: usize,

    /// Checkpoints restored.
    pub checkpoints_restored: usize,

    /// Diagnostics handed to the sink.
    pub diagnostics_reported: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Environment Session Statistics:")?;
        writeln!(f, "  Hierarchies created: {}", self.hierarchies_created)?;
        writeln!(f, "  Environments created: {}", self.environments_created)?;
        writeln!(f, "  Bindings created: {}", self.bindings_created)?;
        writeln!(
            f,
            "  Classes: {} registered, {} numbered",
            self.classes_registered, self.classes_numbered
        )?;
        writeln!(
            f,
            "  Scope traffic: {} entries, {} exits",
            self.scope_entries, self.scope_exits
        )?;
        writeln!(
            f,
            "  Checkpoints: {} taken, {} restored",
            self.checkpoints_taken, self.checkpoints_restored
        )?;
        writeln!(f, "  Diagnostics reported: {}", self.diagnostics_reported)?;
        Ok(())
    }
}
