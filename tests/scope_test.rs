// This test suite validates lexical scoping through the public Session API: nested scopes
// shadowing outer bindings, lookups that jump between unrelated branches of the scope
// tree, independence of separate hierarchies, the "bind without entering" operations,
// and the diagnostics produced for handles that outlived a restore.

//! Integration tests for lexical scopes.

use envmod::{CollectingSink, DefKey, EnvError, Session, SessionConfig, Severity};

#[test]
fn test_shadowing_through_nested_scopes() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut session = Session::new();
    let global = session.new_env().unwrap();
    let function = session.new_scope(global).unwrap();
    let block = session.new_scope(function).unwrap();

    let x = 10;
    let y = 11;
    let global_x = session.new_key();
    let block_x = session.new_key();
    let function_y = session.new_key();
    session.bind_key(global, x, global_x).unwrap();
    session.bind_key(block, x, block_x).unwrap();
    session.bind_key(function, y, function_y).unwrap();

    assert_eq!(session.key_in_env(block, x).unwrap(), Some(block_x));
    assert_eq!(session.key_in_env(block, y).unwrap(), Some(function_y));
    assert_eq!(session.key_in_env(function, x).unwrap(), Some(global_x));
    assert_eq!(session.key_in_env(global, y).unwrap(), None);

    assert_eq!(session.key_in_scope(block, y).unwrap(), None);
    assert_eq!(session.key_in_scope(function, y).unwrap(), Some(function_y));
}

#[test]
fn test_sibling_scopes_do_not_leak() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let then_branch = session.new_scope(root).unwrap();
    let else_branch = session.new_scope(root).unwrap();

    let t = session.bind_idn(then_branch, 1).unwrap();
    assert_eq!(session.binding_in_env(else_branch, 1).unwrap(), None);
    assert_eq!(session.binding_in_env(then_branch, 1).unwrap(), Some(t));

    let e = session.bind_idn(else_branch, 1).unwrap();
    assert_ne!(t, e);
    assert_eq!(session.binding_in_env(then_branch, 1).unwrap(), Some(t));
    assert_eq!(session.binding_in_env(else_branch, 1).unwrap(), Some(e));
}

#[test]
fn test_hierarchies_are_independent() {
    let mut session = Session::new();
    let first = session.new_env().unwrap();
    let second = session.new_env().unwrap();
    let a = session.bind_idn(first, 5).unwrap();

    assert_eq!(session.binding_in_env(second, 5).unwrap(), None);
    // Moving the second hierarchy does not disturb the first.
    assert_eq!(session.current_env(first).unwrap(), Some(first));
    assert_eq!(session.current_env(second).unwrap(), Some(second));
    assert_eq!(session.binding_in_env(first, 5).unwrap(), Some(a));
}

#[test]
fn test_definitions_in_creation_order() {
    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let idns = [7, 3, 9, 1];
    let created: Vec<_> = idns
        .iter()
        .map(|&idn| session.bind_idn(root, idn).unwrap())
        .collect();
    assert_eq!(session.definitions_of(root).unwrap(), created.as_slice());
    for (binding, idn) in created.iter().zip(idns) {
        assert_eq!(session.idn_of(*binding).unwrap(), idn);
    }
}

#[test]
fn test_bind_in_scope_from_outside() {
    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let record = session.new_scope(root).unwrap();
    let field = session.new_key();

    // Fill a scope while lookups happen elsewhere in the hierarchy.
    session.binding_in_env(root, 0).unwrap();
    session.bind_key_in_scope(record, 2, field).unwrap();
    assert_eq!(session.key_in_scope(record, 2).unwrap(), Some(field));
    assert_eq!(session.key_in_env(root, 2).unwrap(), None);

    let fresh = session.bind_in_scope(record, 4).unwrap();
    assert_eq!(session.binding_in_env(record, 4).unwrap(), Some(fresh));
}

#[test]
fn test_environment_keys() {
    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let scope = session.new_scope(root).unwrap();
    let key = DefKey::from_raw(77);
    session.set_key_of_env(scope, Some(key)).unwrap();
    assert_eq!(session.key_of_env(scope).unwrap(), Some(key));
    assert_eq!(session.key_of_env(root).unwrap(), None);
}

#[test]
fn test_stale_handles_report_errors() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sink = CollectingSink::new();
    let mut session = Session::new().with_sink(sink.clone());
    let root = session.new_env().unwrap();

    let checkpoint = session.save().unwrap();
    let scope = session.new_scope(root).unwrap();
    let binding = session.bind_idn(scope, 1).unwrap();
    session.restore(checkpoint).unwrap();

    assert!(matches!(
        session.new_scope(scope),
        Err(EnvError::StaleEnvironment { .. })
    ));
    assert!(matches!(
        session.key_of(binding),
        Err(EnvError::StaleBinding { .. })
    ));

    // A new scope reuses the slot but not the handle.
    let replacement = session.new_scope(root).unwrap();
    assert_eq!(replacement.index(), scope.index());
    assert_ne!(replacement, scope);

    let reports = sink.diagnostics();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|d| d.severity == Severity::Error));
    assert!(!session.is_terminated());
}

#[test]
fn test_binding_budget_is_deadly() {
    let sink = CollectingSink::new();
    let config = SessionConfig::default().with_max_bindings(2);
    let mut session = Session::with_config(config).with_sink(sink.clone());
    let root = session.new_env().unwrap();
    session.bind_idn(root, 0).unwrap();
    session.bind_idn(root, 1).unwrap();

    let err = session.bind_idn(root, 2).unwrap_err();
    assert!(matches!(err, EnvError::BudgetExceeded { limit: 2, .. }));
    assert!(session.is_terminated());
    assert_eq!(session.binding_in_env(root, 0), Err(EnvError::SessionTerminated));
    assert_eq!(sink.diagnostics()[0].severity, Severity::Deadly);
}

#[test]
fn test_oversized_identifiers_are_rejected() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sink = CollectingSink::new();
    let config = SessionConfig::default().with_max_identifier(1000);
    let mut session = Session::with_config(config).with_sink(sink.clone());
    let root = session.new_env().unwrap();
    let inner = session.new_scope(root).unwrap();

    let expected = EnvError::IdentifierOutOfRange {
        idn: usize::MAX,
        limit: 1000,
    };
    assert_eq!(session.bind_idn(root, usize::MAX).unwrap_err(), expected);
    assert_eq!(session.binding_in_env(inner, usize::MAX).unwrap_err(), expected);
    assert!(matches!(
        session.bind_key(inner, 1001, DefKey::from_raw(7)),
        Err(EnvError::IdentifierOutOfRange { idn: 1001, .. })
    ));

    // The limit itself is usable.
    let edge = session.bind_idn(root, 1000).unwrap();
    assert_eq!(session.binding_in_env(inner, 1000).unwrap(), Some(edge));

    let reports = sink.diagnostics();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|d| d.severity == Severity::Error));
    assert!(!session.is_terminated());
    assert_eq!(session.definitions_of(root).unwrap(), &[edge]);
}

#[test]
fn test_deep_scope_chain_lookup() {
    let _ = env_logger::builder().is_test(true).try_init();

    const DEPTH: usize = 100_000;
    let mut session = Session::new();
    let root = session.new_env().unwrap();
    let key = DefKey::from_raw(9);
    session.bind_key(root, 1, key).unwrap();

    let mut deepest = root;
    for _ in 0..DEPTH {
        deepest = session.new_scope(deepest).unwrap();
    }
    assert_eq!(session.level_of(deepest).unwrap(), DEPTH);

    assert_eq!(session.key_in_env(deepest, 1).unwrap(), Some(key));
    assert_eq!(session.current_env(root).unwrap(), Some(deepest));

    assert_eq!(session.key_in_env(root, 1).unwrap(), Some(key));
    assert_eq!(session.current_env(root).unwrap(), Some(root));

    let shadow = session.bind_idn(deepest, 1).unwrap();
    assert_eq!(session.binding_in_env(deepest, 1).unwrap(), Some(shadow));
    assert_eq!(session.key_in_env(root, 1).unwrap(), Some(key));
}
