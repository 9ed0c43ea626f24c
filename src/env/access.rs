// This module implements the AccessMechanism, the fast-lookup side structure shared by
// every environment of one hierarchy. It keeps one stack of bindings per identifier
// number; the top of stack i is the innermost binding of i visible from the current
// environment. The environments entered so far form a frame stack from the root down to
// the current environment, and each frame remembers which identifiers it pushed so that
// leaving it pops exactly those. Entering an ordinary scope pushes its local bindings;
// entering a numbered class pushes, for every identifier defined anywhere in its
// inheritance closure, the nearest binding found through the class stacks. Class stacks
// are a second, lazily allocated per-identifier array holding every binding of a
// numbered class, ordered by descending class number, and back class lookup, override
// chains and inherited entry. The mechanism also owns the registered-class list and the
// class-number table.

//! Per-hierarchy identifier stacks.

use super::{BindingData, EnvData, Idn};
use crate::bitset::BitSet;
use crate::core::handle::{BindingId, EnvId};
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use hashbrown::{DefaultHashBuilder, HashSet};

/// Hash set allocated in the scratch arena.
pub(crate) type ScratchSet<'b, T> = HashSet<T, DefaultHashBuilder, &'b Bump>;

/// One entered environment.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) env: EnvId,
    /// Identifiers pushed while entering, in push order.
    pub(crate) pushed: Vec<Idn>,
}

/// Shared lookup state of one hierarchy.
#[derive(Debug)]
pub(crate) struct AccessMechanism {
    pub(crate) root: EnvId,
    /// Visible bindings per identifier, innermost last.
    stacks: Vec<Vec<BindingId>>,
    /// Entered environments, root first.
    pub(crate) frames: Vec<Frame>,
    /// Class bindings per identifier, highest class number first.
    class_stacks: Option<Vec<Vec<BindingId>>>,
    /// Registered classes in registration order.
    pub(crate) classes: Vec<EnvId>,
    /// Numbered classes; the position is the class number.
    pub(crate) numbered: Vec<EnvId>,
}

impl AccessMechanism {
    pub(crate) fn new(root: EnvId, identifier_capacity: usize) -> Self {
        Self {
            root,
            stacks: Vec::with_capacity(identifier_capacity),
            frames: Vec::new(),
            class_stacks: None,
            classes: Vec::new(),
            numbered: Vec::new(),
        }
    }

    /// The environment lookups are currently relative to.
    pub(crate) fn current(&self) -> Option<EnvId> {
        self.frames.last().map(|frame| frame.env)
    }

    /// Whether `env`, sitting at `level`, is on the frame stack.
    pub(crate) fn is_entered(&self, env: EnvId, level: usize) -> bool {
        self.frames.get(level).is_some_and(|frame| frame.env == env)
    }

    /// Innermost visible binding of `idn`.
    pub(crate) fn top(&self, idn: Idn) -> Option<BindingId> {
        self.stacks.get(idn).and_then(|stack| stack.last().copied())
    }

    /// Push `binding` for `idn` on behalf of the current frame.
    pub(crate) fn push(&mut self, idn: Idn, binding: BindingId) {
        if idn >= self.stacks.len() {
            self.stacks.resize_with(idn + 1, Vec::new);
        }
        self.stacks[idn].push(binding);
        if let Some(frame) = self.frames.last_mut() {
            frame.pushed.push(idn);
        }
    }

    /// Enter `env`, whose parent must be the current environment.
    pub(crate) fn enter(
        &mut self,
        env: EnvId,
        envs: &[EnvData],
        bindings: &[BindingData],
        scratch: &Bump,
    ) {
        let data = &envs[env.index()];
        self.frames.push(Frame {
            env,
            pushed: Vec::new(),
        });
        match data.class.as_ref().and_then(|class| class.inhset.as_ref()) {
            Some(inhset) => self.enter_class(inhset, envs, bindings, scratch),
            None => {
                for &binding in &data.locals {
                    self.push(bindings[binding.index()].idn, binding);
                }
            }
        }
        log::trace!("Entered {:?} at level {}", env, data.level);
    }

    fn enter_class(
        &mut self,
        inhset: &BitSet,
        envs: &[EnvData],
        bindings: &[BindingData],
        scratch: &Bump,
    ) {
        let mut seen: ScratchSet<'_, Idn> = HashSet::new_in(scratch);
        let mut idns = BumpVec::new_in(scratch);
        for number in inhset.iter() {
            let Some(&class_env) = self.numbered.get(number) else {
                continue;
            };
            for &binding in &envs[class_env.index()].locals {
                let idn = bindings[binding.index()].idn;
                if seen.insert(idn) {
                    idns.push(idn);
                }
            }
        }
        for &idn in idns.iter() {
            if let Some(binding) = self.class_lookup(inhset, idn, envs, bindings) {
                self.push(idn, binding);
            }
        }
    }

    /// Leave the current environment. Returns it, or `None` if nothing was entered.
    pub(crate) fn leave(&mut self) -> Option<EnvId> {
        let frame = self.frames.pop()?;
        for &idn in frame.pushed.iter().rev() {
            self.stacks[idn].pop();
        }
        log::trace!("Left {:?}", frame.env);
        Some(frame.env)
    }

    /// Leave environments until at most `depth` frames remain. Returns the
    /// number left.
    pub(crate) fn truncate(&mut self, depth: usize) -> usize {
        let mut left = 0;
        while self.frames.len() > depth {
            self.leave();
            left += 1;
        }
        left
    }

    /// Leave everything. Returns the number of environments left.
    pub(crate) fn reset(&mut self) -> usize {
        let left = self.frames.len();
        self.frames.clear();
        for stack in &mut self.stacks {
            stack.clear();
        }
        left
    }

    /// Class bindings of `idn`, highest class number first.
    pub(crate) fn class_stack(&self, idn: Idn) -> &[BindingId] {
        self.class_stacks
            .as_ref()
            .and_then(|stacks| stacks.get(idn))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Insert `binding` of class number `number` into the class stack of `idn`,
    /// behind every entry of a higher-numbered class. Returns the position.
    pub(crate) fn insert_class_entry<F>(
        &mut self,
        idn: Idn,
        binding: BindingId,
        number: u32,
        number_of: F,
    ) -> usize
    where
        F: Fn(BindingId) -> Option<u32>,
    {
        let stacks = self.class_stacks.get_or_insert_with(Vec::new);
        if idn >= stacks.len() {
            stacks.resize_with(idn + 1, Vec::new);
        }
        let stack = &mut stacks[idn];
        let position = stack
            .iter()
            .position(|&entry| number_of(entry) < Some(number))
            .unwrap_or(stack.len());
        stack.insert(position, binding);
        position
    }

    pub(crate) fn remove_class_entry(&mut self, idn: Idn, position: usize) {
        if let Some(stack) = self
            .class_stacks
            .as_mut()
            .and_then(|stacks| stacks.get_mut(idn))
        {
            if position < stack.len() {
                stack.remove(position);
            }
        }
    }

    /// First class binding of `idn` defined by a class in `inhset`.
    pub(crate) fn class_lookup(
        &self,
        inhset: &BitSet,
        idn: Idn,
        envs: &[EnvData],
        bindings: &[BindingData],
    ) -> Option<BindingId> {
        self.visible_after(inhset, idn, 0, envs, bindings)
    }

    /// First class binding of `idn` at or after `start` whose class is in
    /// `inhset`.
    pub(crate) fn visible_after(
        &self,
        inhset: &BitSet,
        idn: Idn,
        start: usize,
        envs: &[EnvData],
        bindings: &[BindingData],
    ) -> Option<BindingId> {
        self.class_stack(idn)
            .iter()
            .skip(start)
            .copied()
            .find(|&binding| {
                let owner = bindings[binding.index()].env;
                envs[owner.index()]
                    .class_number()
                    .is_some_and(|number| inhset.contains(number as usize))
            })
    }

    /// Position of `binding` in the class stack of `idn`.
    pub(crate) fn class_position(&self, idn: Idn, binding: BindingId) -> Option<usize> {
        self.class_stack(idn).iter().position(|&entry| entry == binding)
    }
}
