// This module holds the class side of the environment module. An environment becomes a
// class when it is registered or takes part in an inheritance edge; the edges of one
// hierarchy form a DAG, checked for cycles when each edge is added. Class numbers are
// assigned lazily, the first time a lookup needs them, in post-order over the superclass
// graph, so every superclass carries a smaller number than its subclasses. Numbering also
// computes the class's inhset (its own number plus the inhsets of its superclasses), puts
// its bindings into the class stacks, and freezes the class against new superclass edges.
// Class lookup, override chains and inheritance tests all reduce to scanning a class
// stack and testing class numbers against an inhset.

//! Classes and multiple inheritance.

use super::access::ScratchSet;
use super::{DefKey, Idn};
use crate::bitset::BitSet;
use crate::core::checkpoint::Undo;
use crate::core::error::{EnvError, EnvResult};
use crate::core::handle::{BindingId, EnvId};
use crate::core::session::Session;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use hashbrown::HashSet;

/// Class state attached to an environment.
#[derive(Debug, Default)]
pub(crate) struct ClassDescriptor {
    /// Assigned on first use; unique within the hierarchy.
    pub(crate) number: Option<u32>,
    /// Direct superclasses in the order the edges were added.
    pub(crate) supers: Vec<EnvId>,
    /// Numbers of this class and all its ancestors.
    pub(crate) inhset: Option<BitSet>,
    /// Set with the number. No edge may be added to a frozen class.
    pub(crate) frozen: bool,
}

impl Session {
    /// Mark `env` as a class. Returns false if it already was one.
    pub fn register_class(&mut self, env: EnvId) -> EnvResult<bool> {
        self.ensure_live()?;
        self.env_data(env)?;
        Ok(self.make_class(env))
    }

    pub fn is_class(&self, env: EnvId) -> EnvResult<bool> {
        Ok(self.env_data(env)?.class.is_some())
    }

    /// Direct superclasses of `env`; empty for ordinary environments.
    pub fn superclasses_of(&self, env: EnvId) -> EnvResult<&[EnvId]> {
        Ok(self
            .env_data(env)?
            .class
            .as_ref()
            .map(|class| class.supers.as_slice())
            .unwrap_or(&[]))
    }

    /// Class number of `env`, numbering it now if needed. `None` if `env` is
    /// not a class.
    pub fn class_number(&mut self, env: EnvId) -> EnvResult<Option<u32>> {
        self.ensure_live()?;
        self.env_data(env)?;
        self.ensure_numbered(env);
        Ok(self.envs[env.index()].class_number())
    }

    /// Numbers of `env` and every class it inherits from.
    pub fn inhset(&mut self, env: EnvId) -> EnvResult<Option<&BitSet>> {
        self.ensure_live()?;
        self.env_data(env)?;
        self.ensure_numbered(env);
        Ok(self.envs[env.index()]
            .class
            .as_ref()
            .and_then(|class| class.inhset.as_ref()))
    }

    /// Add the edge "`to` inherits from `from`", registering both as classes.
    ///
    /// Adding an edge that already exists is a no-op. Fails without changing
    /// anything if the edge would close a cycle, crosses hierarchies, or `to`
    /// has been numbered.
    pub fn inherit_class(&mut self, to: EnvId, from: EnvId) -> EnvResult<()> {
        self.ensure_live()?;
        let to_mechanism = self.env_data(to)?.mechanism;
        let from_mechanism = self.env_data(from)?.mechanism;
        if to_mechanism != from_mechanism {
            return Err(EnvError::HierarchyMismatch);
        }
        if to == from {
            return Err(EnvError::InheritanceCycle);
        }
        if let Some(class) = &self.envs[to.index()].class {
            if class.frozen {
                return Err(EnvError::ClassFrozen);
            }
            if class.supers.contains(&from) {
                return Ok(());
            }
        }
        if self.with_scratch(|session, scratch| session.reaches(from, to, scratch)) {
            return Err(EnvError::InheritanceCycle);
        }

        self.make_class(to);
        self.make_class(from);
        if let Some(class) = self.envs[to.index()].class.as_mut() {
            class.supers.push(from);
        }
        self.record(Undo::SuperclassAdded { env: to.index() });
        log::debug!("Class {:?} inherits from {:?}", to, from);
        Ok(())
    }

    /// Whether `to` is `from` or inherits from it, directly or not.
    ///
    /// Both classes are numbered, and so frozen, by the test.
    pub fn inherits_from(&mut self, to: EnvId, from: EnvId) -> EnvResult<bool> {
        self.ensure_live()?;
        let to_mechanism = self.env_data(to)?.mechanism;
        let from_mechanism = self.env_data(from)?.mechanism;
        if to == from {
            return Ok(true);
        }
        if to_mechanism != from_mechanism
            || self.envs[to.index()].class.is_none()
            || self.envs[from.index()].class.is_none()
        {
            return Ok(false);
        }
        self.ensure_numbered(to);
        self.ensure_numbered(from);
        let number = self.envs[from.index()].class_number();
        let inhset = self.envs[to.index()]
            .class
            .as_ref()
            .and_then(|class| class.inhset.as_ref());
        Ok(match (number, inhset) {
            (Some(number), Some(inhset)) => inhset.contains(number as usize),
            _ => false,
        })
    }

    /// The inherited binding that `binding` overrides in its own class, if any.
    pub fn overrides_binding(&mut self, binding: BindingId) -> EnvResult<Option<BindingId>> {
        self.ensure_live()?;
        let owner = self.binding_data(binding)?.env;
        if self.envs[owner.index()].class.is_none() {
            return Ok(None);
        }
        self.ensure_numbered(owner);
        Ok(self.inherited_after(owner, binding))
    }

    /// Continue an override chain as seen from class `env`: the next binding of
    /// the same identifier, after `binding`, that `env` inherits.
    pub fn next_inh_binding(
        &mut self,
        env: EnvId,
        binding: BindingId,
    ) -> EnvResult<Option<BindingId>> {
        self.ensure_live()?;
        self.env_data(env)?;
        self.binding_data(binding)?;
        if self.envs[env.index()].class.is_none() {
            return Ok(None);
        }
        self.ensure_numbered(env);
        Ok(self.inherited_after(env, binding))
    }

    /// Key-based form of [`next_inh_binding`](Self::next_inh_binding): the key
    /// of the next inherited binding of `idn` after the one carrying `key`.
    pub fn next_inh_key(
        &mut self,
        env: EnvId,
        idn: Idn,
        key: DefKey,
    ) -> EnvResult<Option<DefKey>> {
        self.ensure_live()?;
        self.check_idn(idn)?;
        self.env_data(env)?;
        if self.envs[env.index()].class.is_none() {
            return Ok(None);
        }
        self.ensure_numbered(env);

        let data = &self.envs[env.index()];
        let Some(inhset) = data.class.as_ref().and_then(|class| class.inhset.as_ref()) else {
            return Ok(None);
        };
        let mechanism = &self.mechanisms[data.mechanism];
        let position = mechanism.class_stack(idn).iter().position(|&entry| {
            let entry = &self.bindings[entry.index()];
            entry.key == key && self.inherits_number(inhset, entry.env)
        });
        Ok(position
            .and_then(|position| {
                mechanism.visible_after(inhset, idn, position + 1, &self.envs, &self.bindings)
            })
            .map(|next| self.bindings[next.index()].key))
    }

    /// Class binding of `idn` visible in class `env`. `env` must be numbered.
    pub(crate) fn class_binding(&self, env: EnvId, idn: Idn) -> Option<BindingId> {
        let data = &self.envs[env.index()];
        let inhset = data.class.as_ref()?.inhset.as_ref()?;
        self.mechanisms[data.mechanism].class_lookup(inhset, idn, &self.envs, &self.bindings)
    }

    fn inherited_after(&self, env: EnvId, binding: BindingId) -> Option<BindingId> {
        let idn = self.bindings[binding.index()].idn;
        let data = &self.envs[env.index()];
        let inhset = data.class.as_ref()?.inhset.as_ref()?;
        let mechanism = &self.mechanisms[data.mechanism];
        let position = mechanism.class_position(idn, binding)?;
        mechanism.visible_after(inhset, idn, position + 1, &self.envs, &self.bindings)
    }

    fn inherits_number(&self, inhset: &BitSet, owner: EnvId) -> bool {
        self.envs[owner.index()]
            .class_number()
            .is_some_and(|number| inhset.contains(number as usize))
    }

    fn make_class(&mut self, env: EnvId) -> bool {
        let data = &self.envs[env.index()];
        if data.class.is_some() {
            return false;
        }
        let (mechanism, level) = (data.mechanism, data.level);
        // Entered as an ordinary scope; its frame no longer matches.
        if self.mechanisms[mechanism].is_entered(env, level) {
            self.stats.scope_exits += self.mechanisms[mechanism].truncate(level);
        }
        self.envs[env.index()].class = Some(ClassDescriptor::default());
        self.mechanisms[mechanism].classes.push(env);
        self.record(Undo::ClassRegistered {
            env: env.index(),
            mechanism,
        });
        self.stats.classes_registered += 1;
        log::debug!("Registered class {:?}", env);
        true
    }

    /// Whether `goal` is reachable from `start` along superclass edges.
    fn reaches(&self, start: EnvId, goal: EnvId, scratch: &Bump) -> bool {
        let mut visited: ScratchSet<'_, usize> = HashSet::new_in(scratch);
        let mut stack = BumpVec::new_in(scratch);
        stack.push(start);
        while let Some(env) = stack.pop() {
            if env == goal {
                return true;
            }
            if !visited.insert(env.index()) {
                continue;
            }
            if let Some(class) = &self.envs[env.index()].class {
                stack.extend(class.supers.iter().copied());
            }
        }
        false
    }

    /// Number `env` and every unnumbered class it inherits from.
    pub(crate) fn ensure_numbered(&mut self, env: EnvId) {
        match &self.envs[env.index()].class {
            Some(class) if class.number.is_none() => {}
            _ => return,
        }
        self.with_scratch(|session, scratch| {
            let order = session.numbering_order(env, scratch);
            for &class_env in order.iter() {
                session.assign_number(class_env);
            }
        });
    }

    /// Unnumbered classes reachable from `root`, superclasses before
    /// subclasses, following edge order.
    fn numbering_order<'b>(&self, root: EnvId, scratch: &'b Bump) -> BumpVec<'b, EnvId> {
        let mut order = BumpVec::new_in(scratch);
        let mut visited: ScratchSet<'b, usize> = HashSet::new_in(scratch);
        let mut stack: BumpVec<'b, (EnvId, usize)> = BumpVec::new_in(scratch);
        visited.insert(root.index());
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (env, next) = *top;
            let supers = self.envs[env.index()]
                .class
                .as_ref()
                .map(|class| class.supers.as_slice())
                .unwrap_or(&[]);
            match supers.get(next) {
                Some(&parent) => {
                    top.1 += 1;
                    let numbered = self.envs[parent.index()].class_number().is_some();
                    if !numbered && visited.insert(parent.index()) {
                        stack.push((parent, 0));
                    }
                }
                None => {
                    stack.pop();
                    order.push(env);
                }
            }
        }
        order
    }

    fn assign_number(&mut self, env: EnvId) {
        let data = &self.envs[env.index()];
        let mechanism = data.mechanism;
        let Some(class) = data.class.as_ref() else {
            return;
        };
        if class.number.is_some() {
            return;
        }

        let number = self.mechanisms[mechanism].numbered.len() as u32;
        let mut inhset = self.pool.acquire();
        inhset.add_elem(number as usize);
        for parent in &class.supers {
            if let Some(parent_set) = self.envs[parent.index()]
                .class
                .as_ref()
                .and_then(|class| class.inhset.as_ref())
            {
                inhset.union_with(parent_set);
            }
        }
        let ancestors = inhset.card() - 1;

        if let Some(class) = self.envs[env.index()].class.as_mut() {
            class.number = Some(number);
            class.inhset = Some(inhset);
            class.frozen = true;
        }
        self.mechanisms[mechanism].numbered.push(env);
        self.record(Undo::ClassNumbered {
            env: env.index(),
            mechanism,
        });

        for position in 0..self.envs[env.index()].locals.len() {
            let binding = self.envs[env.index()].locals[position];
            self.insert_into_class_stack(binding);
        }
        self.stats.classes_numbered += 1;
        log::debug!(
            "Class {:?} numbered {} with {} ancestors",
            env,
            number,
            ancestors
        );
    }

    /// Put a binding of a numbered class into its class stack.
    pub(crate) fn insert_into_class_stack(&mut self, binding: BindingId) {
        let data = &self.bindings[binding.index()];
        let (idn, owner) = (data.idn, data.env);
        let owner_data = &self.envs[owner.index()];
        let (Some(number), mechanism) = (owner_data.class_number(), owner_data.mechanism) else {
            return;
        };
        let (envs, bindings) = (&self.envs, &self.bindings);
        let class_of =
            |entry: BindingId| envs[bindings[entry.index()].env.index()].class_number();
        let position =
            self.mechanisms[mechanism].insert_class_entry(idn, binding, number, class_of);
        self.record(Undo::ClassStackInsert {
            mechanism,
            idn,
            position,
        });
    }

    /// Leave every entered class that inherits from `class_env`, whose
    /// visible bindings just changed.
    pub(crate) fn invalidate_inheriting_frames(&mut self, class_env: EnvId) {
        let data = &self.envs[class_env.index()];
        let (Some(number), mechanism) = (data.class_number(), data.mechanism) else {
            return;
        };
        let envs = &self.envs;
        let depth = self.mechanisms[mechanism].frames.iter().position(|frame| {
            frame.env != class_env
                && envs[frame.env.index()]
                    .class
                    .as_ref()
                    .and_then(|class| class.inhset.as_ref())
                    .is_some_and(|inhset| inhset.contains(number as usize))
        });
        if let Some(depth) = depth {
            self.stats.scope_exits += self.mechanisms[mechanism].truncate(depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::error::EnvError;
    use crate::Session;

    #[test]
    fn test_register_is_idempotent() {
        let mut session = Session::new();
        let root = session.new_env().unwrap();
        let class = session.new_scope(root).unwrap();
        assert!(!session.is_class(class).unwrap());
        assert!(session.register_class(class).unwrap());
        assert!(!session.register_class(class).unwrap());
        assert!(session.is_class(class).unwrap());
        assert_eq!(session.stats().classes_registered, 1);
    }

    #[test]
    fn test_numbers_follow_post_order() {
        let mut session = Session::new();
        let root = session.new_env().unwrap();
        let base = session.new_scope(root).unwrap();
        let mid = session.new_scope(root).unwrap();
        let leaf = session.new_scope(root).unwrap();
        session.inherit_class(mid, base).unwrap();
        session.inherit_class(leaf, mid).unwrap();

        assert_eq!(session.class_number(leaf).unwrap(), Some(2));
        assert_eq!(session.class_number(mid).unwrap(), Some(1));
        assert_eq!(session.class_number(base).unwrap(), Some(0));
        assert_eq!(session.class_number(root).unwrap(), None);

        let inhset = session.inhset(leaf).unwrap().unwrap();
        assert_eq!(inhset.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycles_are_rejected_without_change() {
        let mut session = Session::new();
        let root = session.new_env().unwrap();
        let a = session.new_scope(root).unwrap();
        let b = session.new_scope(root).unwrap();
        let c = session.new_scope(root).unwrap();
        session.inherit_class(b, a).unwrap();
        session.inherit_class(c, b).unwrap();

        assert_eq!(session.inherit_class(a, c), Err(EnvError::InheritanceCycle));
        assert_eq!(session.inherit_class(a, a), Err(EnvError::InheritanceCycle));
        assert!(session.superclasses_of(a).unwrap().is_empty());

        // Repeating an edge is harmless.
        session.inherit_class(c, b).unwrap();
        assert_eq!(session.superclasses_of(c).unwrap(), &[b]);
    }

    #[test]
    fn test_numbered_class_is_frozen() {
        let mut session = Session::new();
        let root = session.new_env().unwrap();
        let a = session.new_scope(root).unwrap();
        let b = session.new_scope(root).unwrap();
        let extra = session.new_scope(root).unwrap();
        session.inherit_class(b, a).unwrap();
        session.binding_in_scope(b, 0).unwrap();

        assert_eq!(session.inherit_class(b, extra), Err(EnvError::ClassFrozen));
        assert!(!session.is_class(extra).unwrap());
    }

    #[test]
    fn test_cross_hierarchy_edge_is_rejected() {
        let mut session = Session::new();
        let one = session.new_env().unwrap();
        let two = session.new_env().unwrap();
        assert_eq!(session.inherit_class(one, two), Err(EnvError::HierarchyMismatch));
        assert!(!session.inherits_from(one, two).unwrap());
    }

    #[test]
    fn test_override_chain() {
        let mut session = Session::new();
        let root = session.new_env().unwrap();
        let base = session.new_scope(root).unwrap();
        let derived = session.new_scope(root).unwrap();
        session.inherit_class(derived, base).unwrap();

        let old = session.bind_idn(base, 7).unwrap();
        let new = session.bind_idn(derived, 7).unwrap();

        assert_eq!(session.overrides_binding(new).unwrap(), Some(old));
        assert_eq!(session.overrides_binding(old).unwrap(), None);
        assert_eq!(session.next_inh_binding(derived, new).unwrap(), Some(old));
        assert_eq!(session.binding_in_scope(derived, 7).unwrap(), Some(new));

        let new_key = session.key_of(new).unwrap();
        let old_key = session.key_of(old).unwrap();
        assert_eq!(session.next_inh_key(derived, 7, new_key).unwrap(), Some(old_key));
        assert_eq!(session.next_inh_key(derived, 7, old_key).unwrap(), None);
    }

    #[test]
    fn test_superclass_binding_refreshes_entered_subclass() {
        let mut session = Session::new();
        let root = session.new_env().unwrap();
        let base = session.new_scope(root).unwrap();
        let derived = session.new_scope(root).unwrap();
        session.inherit_class(derived, base).unwrap();

        assert_eq!(session.binding_in_env(derived, 3).unwrap(), None);
        let late = session.bind_idn(base, 3).unwrap();
        assert_eq!(session.binding_in_env(derived, 3).unwrap(), Some(late));
    }
}
