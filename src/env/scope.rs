// This module holds the lexical side of the environment module: creating hierarchies and
// nested scopes, attaching definition keys, and binding and looking up identifiers. A
// lookup first makes the target the current environment of its hierarchy. set_env walks
// up from the target with an explicit loop until it meets a scope the access mechanism
// has already entered, numbers any classes on that path, then truncates the mechanism to
// the common ancestor and enters the remaining scopes root to target. The path is kept in
// a bumpalo vector in the session scratch arena, so arbitrarily deep nesting needs neither
// recursion nor heap allocation per lookup. Identifier numbers are checked against the
// configured maximum before any stack is touched.

//! Lexical scopes: creation, binding and lookup.
//!
//! Lookups are relative to an environment. `set_env` moves the hierarchy's
//! access mechanism to that environment first, leaving and entering only the
//! scopes that differ, so repeated lookups from the same place cost a single
//! stack read.

use super::{DefKey, Idn};
use crate::core::checkpoint::Undo;
use crate::core::error::EnvResult;
use crate::core::handle::{BindingId, EnvId};
use crate::core::session::Session;
use bumpalo::collections::Vec as BumpVec;

impl Session {
    /// Create the root environment of a new, independent hierarchy.
    pub fn new_env(&mut self) -> EnvResult<EnvId> {
        self.ensure_live()?;
        let root = self.alloc_hierarchy()?;
        log::debug!(
            "New hierarchy {} rooted at {:?}",
            self.mechanisms.len() - 1,
            root
        );
        Ok(root)
    }

    /// Create a scope nested in `parent`, sharing its hierarchy.
    pub fn new_scope(&mut self, parent: EnvId) -> EnvResult<EnvId> {
        self.ensure_live()?;
        let data = self.env_data(parent)?;
        let (level, mechanism) = (data.level + 1, data.mechanism);
        self.alloc_env(Some(parent), level, mechanism)
    }

    pub fn parent_of(&self, env: EnvId) -> EnvResult<Option<EnvId>> {
        Ok(self.env_data(env)?.parent)
    }

    /// Nesting depth; the hierarchy root is at level 0.
    pub fn level_of(&self, env: EnvId) -> EnvResult<usize> {
        Ok(self.env_data(env)?.level)
    }

    /// True for environments created with `new_scope`.
    pub fn is_nested(&self, env: EnvId) -> EnvResult<bool> {
        Ok(self.env_data(env)?.parent.is_some())
    }

    pub fn root_of(&self, env: EnvId) -> EnvResult<EnvId> {
        let mechanism = self.env_data(env)?.mechanism;
        Ok(self.mechanisms[mechanism].root)
    }

    pub fn same_hierarchy(&self, a: EnvId, b: EnvId) -> EnvResult<bool> {
        Ok(self.env_data(a)?.mechanism == self.env_data(b)?.mechanism)
    }

    /// The environment lookups in `env`'s hierarchy are currently relative to.
    pub fn current_env(&self, env: EnvId) -> EnvResult<Option<EnvId>> {
        let mechanism = self.env_data(env)?.mechanism;
        Ok(self.mechanisms[mechanism].current())
    }

    /// Definition key attached to the environment itself.
    pub fn key_of_env(&self, env: EnvId) -> EnvResult<Option<DefKey>> {
        Ok(self.env_data(env)?.key)
    }

    pub fn set_key_of_env(&mut self, env: EnvId, key: Option<DefKey>) -> EnvResult<()> {
        self.ensure_live()?;
        let previous = self.env_data(env)?.key;
        self.envs[env.index()].key = key;
        self.record(Undo::EnvKey {
            env: env.index(),
            previous,
        });
        Ok(())
    }

    /// Local bindings of `env` in creation order.
    pub fn definitions_of(&self, env: EnvId) -> EnvResult<&[BindingId]> {
        Ok(&self.env_data(env)?.locals)
    }

    pub fn env_of(&self, binding: BindingId) -> EnvResult<EnvId> {
        Ok(self.binding_data(binding)?.env)
    }

    pub fn key_of(&self, binding: BindingId) -> EnvResult<DefKey> {
        Ok(self.binding_data(binding)?.key)
    }

    pub fn idn_of(&self, binding: BindingId) -> EnvResult<Idn> {
        Ok(self.binding_data(binding)?.idn)
    }

    /// Make `target` the current environment of its hierarchy.
    ///
    /// Classes between `target` and its nearest entered ancestor are numbered
    /// first, then the path is entered root to target.
    pub(crate) fn set_env(&mut self, target: EnvId) {
        let (mechanism, level) = {
            let data = &self.envs[target.index()];
            (data.mechanism, data.level)
        };
        if self.mechanisms[mechanism].is_entered(target, level) {
            self.stats.scope_exits += self.mechanisms[mechanism].truncate(level + 1);
            return;
        }

        let mut cursor = Some(target);
        while let Some(env) = cursor {
            let data = &self.envs[env.index()];
            if self.mechanisms[mechanism].is_entered(env, data.level) {
                break;
            }
            cursor = data.parent;
            if data.class.is_some() {
                self.ensure_numbered(env);
            }
        }

        let (left, entered) = self.with_scratch(|session, scratch| {
            let mut path = BumpVec::new_in(scratch);
            let mut anchor = 0;
            let mut cursor = Some(target);
            while let Some(env) = cursor {
                let data = &session.envs[env.index()];
                if session.mechanisms[mechanism].is_entered(env, data.level) {
                    anchor = data.level + 1;
                    break;
                }
                path.push(env);
                cursor = data.parent;
            }

            let left = session.mechanisms[mechanism].truncate(anchor);
            for &env in path.iter().rev() {
                let (envs, bindings) = (&session.envs, &session.bindings);
                session.mechanisms[mechanism].enter(env, envs, bindings, scratch);
            }
            (left, path.len())
        });
        self.stats.scope_exits += left;
        self.stats.scope_entries += entered;
    }

    /// Innermost binding of `idn` visible from `env`, through enclosing scopes
    /// and inherited class members.
    pub fn binding_in_env(&mut self, env: EnvId, idn: Idn) -> EnvResult<Option<BindingId>> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        let mechanism = self.env_data(env)?.mechanism;
        self.set_env(env);
        Ok(self.mechanisms[mechanism].top(idn))
    }

    pub fn key_in_env(&mut self, env: EnvId, idn: Idn) -> EnvResult<Option<DefKey>> {
        let binding = self.binding_in_env(env, idn)?;
        Ok(binding.map(|binding| self.bindings[binding.index()].key))
    }

    /// Binding of `idn` in `env` itself. For a class this includes inherited
    /// members; enclosing scopes are never consulted.
    pub fn binding_in_scope(&mut self, env: EnvId, idn: Idn) -> EnvResult<Option<BindingId>> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        if self.env_data(env)?.class.is_some() {
            self.ensure_numbered(env);
            return Ok(self.class_binding(env, idn));
        }
        self.set_env(env);
        Ok(self.local_top(env, idn))
    }

    pub fn key_in_scope(&mut self, env: EnvId, idn: Idn) -> EnvResult<Option<DefKey>> {
        let binding = self.binding_in_scope(env, idn)?;
        Ok(binding.map(|binding| self.bindings[binding.index()].key))
    }

    /// Bind `idn` to `key` in `env`. Returns `None`, changing nothing, if `env`
    /// already binds `idn`.
    pub fn bind_key(
        &mut self,
        env: EnvId,
        idn: Idn,
        key: DefKey,
    ) -> EnvResult<Option<BindingId>> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        self.env_data(env)?;
        self.set_env(env);
        if self.local_top(env, idn).is_some() {
            return Ok(None);
        }
        self.push_binding(env, idn, key).map(Some)
    }

    /// The binding of `idn` in `env`, creating one with a fresh key if needed.
    pub fn bind_idn(&mut self, env: EnvId, idn: Idn) -> EnvResult<BindingId> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        self.env_data(env)?;
        self.set_env(env);
        if let Some(existing) = self.local_top(env, idn) {
            return Ok(existing);
        }
        let key = self.new_key();
        self.push_binding(env, idn, key)
    }

    /// Bind `idn` to `key` in `env` without entering it.
    ///
    /// Every environment of the hierarchy is left first; the binding becomes
    /// visible the next time `env` is entered or searched as a class.
    pub fn bind_key_in_scope(
        &mut self,
        env: EnvId,
        idn: Idn,
        key: DefKey,
    ) -> EnvResult<Option<BindingId>> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        let mechanism = self.env_data(env)?.mechanism;
        self.stats.scope_exits += self.mechanisms[mechanism].reset();
        if self.local_binding(env, idn).is_some() {
            return Ok(None);
        }
        self.insert_in_scope(env, idn, key).map(Some)
    }

    /// Like [`bind_key_in_scope`](Self::bind_key_in_scope), returning the
    /// existing binding or creating one with a fresh key.
    pub fn bind_in_scope(&mut self, env: EnvId, idn: Idn) -> EnvResult<BindingId> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        let mechanism = self.env_data(env)?.mechanism;
        self.stats.scope_exits += self.mechanisms[mechanism].reset();
        if let Some(existing) = self.local_binding(env, idn) {
            return Ok(existing);
        }
        let key = self.new_key();
        self.insert_in_scope(env, idn, key)
    }

    /// Top of the stack of `idn`, if `env` owns it. Only meaningful right
    /// after `set_env(env)`.
    fn local_top(&self, env: EnvId, idn: Idn) -> Option<BindingId> {
        let mechanism = self.envs[env.index()].mechanism;
        self.mechanisms[mechanism]
            .top(idn)
            .filter(|binding| self.bindings[binding.index()].env == env)
    }

    /// Scan of the local list.
    fn local_binding(&self, env: EnvId, idn: Idn) -> Option<BindingId> {
        self.envs[env.index()]
            .locals
            .iter()
            .copied()
            .find(|binding| self.bindings[binding.index()].idn == idn)
    }

    fn link_local(&mut self, env: EnvId, binding: BindingId) {
        self.envs[env.index()].locals.push(binding);
        self.record(Undo::LocalBinding { env: env.index() });
    }

    /// Create a binding in the current environment `env` and make it visible.
    fn push_binding(&mut self, env: EnvId, idn: Idn, key: DefKey) -> EnvResult<BindingId> {
        let binding = self.alloc_binding(idn, key, env)?;
        self.link_local(env, binding);
        let mechanism = self.envs[env.index()].mechanism;
        self.mechanisms[mechanism].push(idn, binding);
        if self.envs[env.index()].class_number().is_some() {
            self.insert_into_class_stack(binding);
            self.invalidate_inheriting_frames(env);
        }
        log::trace!("Bound idn {} to {:?} in {:?}", idn, key, env);
        Ok(binding)
    }

    fn insert_in_scope(&mut self, env: EnvId, idn: Idn, key: DefKey) -> EnvResult<BindingId> {
        let binding = self.alloc_binding(idn, key, env)?;
        self.link_local(env, binding);
        if self.envs[env.index()].class_number().is_some() {
            self.insert_into_class_stack(binding);
        }
        log::trace!("Bound idn {} to {:?} in scope {:?}", idn, key, env);
        Ok(binding)
    }
}
