// This test suite covers classes and multiple inheritance. The central fixture is the
// diamond: A at the top, B and C both inheriting from A, and D inheriting from B then C.
// The tests check class lookup through the diamond (including which of two equally
// distant definitions wins), override chains walked from different classes, inheritance
// queries, lookups from ordinary scopes nested inside a class, rejection of cyclic edges,
// and freezing of classes once lookups have numbered them.

//! Integration tests for class inheritance.

use envmod::{BindingId, EnvError, EnvId, Session};

struct Diamond {
    session: Session,
    root: EnvId,
    a: EnvId,
    b: EnvId,
    c: EnvId,
    d: EnvId,
}

fn diamond() -> Diamond {
    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let a = session.new_scope(root).unwrap();
    let b = session.new_scope(root).unwrap();
    let c = session.new_scope(root).unwrap();
    let d = session.new_scope(root).unwrap();
    session.inherit_class(b, a).unwrap();
    session.inherit_class(c, a).unwrap();
    session.inherit_class(d, b).unwrap();
    session.inherit_class(d, c).unwrap();
    Diamond {
        session,
        root,
        a,
        b,
        c,
        d,
    }
}

/// Follow an override chain as seen from `env`, starting at its visible binding.
fn chain(session: &mut Session, env: EnvId, idn: usize) -> Vec<BindingId> {
    let mut result = Vec::new();
    let mut current = session.binding_in_scope(env, idn).unwrap();
    while let Some(binding) = current {
        result.push(binding);
        current = session.next_inh_binding(env, binding).unwrap();
    }
    result
}

#[test]
fn test_diamond_numbering() {
    let _ = env_logger::builder().is_test(true).try_init();

    let Diamond {
        mut session,
        a,
        b,
        c,
        d,
        ..
    } = diamond();
    assert_eq!(session.class_number(d).unwrap(), Some(3));
    assert_eq!(session.class_number(a).unwrap(), Some(0));
    assert_eq!(session.class_number(b).unwrap(), Some(1));
    assert_eq!(session.class_number(c).unwrap(), Some(2));

    let inhset = session.inhset(c).unwrap().unwrap();
    assert_eq!(inhset.to_string(), "{0, 2}");
    assert_eq!(session.stats().classes_numbered, 4);
}

#[test]
fn test_diamond_lookup_and_overrides() {
    let _ = env_logger::builder().is_test(true).try_init();

    let Diamond {
        mut session,
        a,
        b,
        c,
        d,
        ..
    } = diamond();
    let m = 20;
    let in_a = session.bind_idn(a, m).unwrap();
    let in_b = session.bind_idn(b, m).unwrap();
    let in_c = session.bind_idn(c, m).unwrap();

    // Equally distant definitions: the higher class number wins.
    assert_eq!(session.binding_in_scope(d, m).unwrap(), Some(in_c));
    assert_eq!(chain(&mut session, d, m), vec![in_c, in_b, in_a]);
    assert_eq!(chain(&mut session, b, m), vec![in_b, in_a]);

    assert_eq!(session.overrides_binding(in_b).unwrap(), Some(in_a));
    assert_eq!(session.overrides_binding(in_c).unwrap(), Some(in_a));
    assert_eq!(session.overrides_binding(in_a).unwrap(), None);

    // D's own definition overrides everything it inherits.
    let in_d = session.bind_idn(d, m).unwrap();
    assert_eq!(session.binding_in_scope(d, m).unwrap(), Some(in_d));
    assert_eq!(session.overrides_binding(in_d).unwrap(), Some(in_c));
}

#[test]
fn test_inherited_members_only_found_once() {
    let Diamond {
        mut session, a, d, ..
    } = diamond();
    let only_in_a = session.bind_idn(a, 3).unwrap();
    assert_eq!(session.binding_in_scope(d, 3).unwrap(), Some(only_in_a));
    assert_eq!(chain(&mut session, d, 3), vec![only_in_a]);
}

#[test]
fn test_next_inh_key_walks_keys() {
    let Diamond {
        mut session, a, b, d, ..
    } = diamond();
    let ka = session.new_key();
    let kb = session.new_key();
    session.bind_key(a, 8, ka).unwrap();
    session.bind_key(b, 8, kb).unwrap();

    assert_eq!(session.key_in_scope(d, 8).unwrap(), Some(kb));
    assert_eq!(session.next_inh_key(d, 8, kb).unwrap(), Some(ka));
    assert_eq!(session.next_inh_key(d, 8, ka).unwrap(), None);
}

#[test]
fn test_inherits_from() {
    let Diamond {
        mut session,
        root,
        a,
        b,
        c,
        d,
    } = diamond();
    assert!(session.inherits_from(d, a).unwrap());
    assert!(session.inherits_from(d, c).unwrap());
    assert!(session.inherits_from(b, b).unwrap());
    assert!(!session.inherits_from(b, c).unwrap());
    assert!(!session.inherits_from(a, d).unwrap());
    assert!(!session.inherits_from(d, root).unwrap());
}

#[test]
fn test_lookup_from_method_scope() {
    let _ = env_logger::builder().is_test(true).try_init();

    let Diamond {
        mut session,
        root,
        a,
        d,
        ..
    } = diamond();
    let field = session.bind_idn(a, 1).unwrap();
    let global = session.bind_idn(root, 2).unwrap();
    let method = session.new_scope(d).unwrap();
    let local = session.bind_idn(method, 3).unwrap();

    assert_eq!(session.binding_in_env(method, 1).unwrap(), Some(field));
    assert_eq!(session.binding_in_env(method, 2).unwrap(), Some(global));
    assert_eq!(session.binding_in_env(method, 3).unwrap(), Some(local));
    assert_eq!(session.binding_in_scope(method, 1).unwrap(), None);
}

#[test]
fn test_cycles_rejected() {
    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let classes: Vec<_> = (0..4).map(|_| session.new_scope(root).unwrap()).collect();
    for pair in classes.windows(2) {
        session.inherit_class(pair[1], pair[0]).unwrap();
    }

    let err = session.inherit_class(classes[0], classes[3]).unwrap_err();
    assert_eq!(err, EnvError::InheritanceCycle);
    assert!(err.is_recoverable());
    assert!(session.superclasses_of(classes[0]).unwrap().is_empty());
    assert!(!session.inherits_from(classes[0], classes[3]).unwrap());
    assert!(session.inherits_from(classes[3], classes[0]).unwrap());
}

#[test]
fn test_lookup_freezes_class() {
    let Diamond {
        mut session,
        root,
        b,
        d,
        ..
    } = diamond();
    let late = session.new_scope(root).unwrap();
    session.binding_in_scope(b, 0).unwrap();

    // B and its ancestors are frozen; D was not numbered yet.
    assert_eq!(session.inherit_class(b, late), Err(EnvError::ClassFrozen));
    session.inherit_class(d, late).unwrap();
    assert!(session.inherits_from(d, late).unwrap());
    assert_eq!(session.inherit_class(d, late), Err(EnvError::ClassFrozen));
}
