//! Test utilities for session-based testing.
//!
//! Sessions built here report into a shared collecting sink, so tests can
//! assert on diagnostics as well as on results.

#[cfg(test)]
pub mod test {
    use super::super::config::SessionConfig;
    use super::super::diagnostics::CollectingSink;
    use super::super::session::Session;

    /// A session plus the sink its diagnostics land in.
    pub fn session_with_sink() -> (Session, CollectingSink) {
        session_with_config(SessionConfig::default())
    }

    /// Like [`session_with_sink`], with explicit budgets.
    pub fn session_with_config(config: SessionConfig) -> (Session, CollectingSink) {
        let sink = CollectingSink::new();
        let session = Session::with_config(config).with_sink(sink.clone());
        (session, sink)
    }

    /// Run a test against a fresh session whose environment tree is a chain
    /// of `depth` scopes below a root; `f` receives the chain, root first.
    pub fn with_scope_chain<F, R>(depth: usize, f: F) -> R
    where
        F: FnOnce(&mut Session, &[crate::core::handle::EnvId]) -> R,
    {
        let mut session = Session::new();
        let mut chain = Vec::with_capacity(depth + 1);
        let mut current = session.new_env().expect("fresh session accepts a root");
        chain.push(current);
        for _ in 0..depth {
            current = session.new_scope(current).expect("within budget");
            chain.push(current);
        }
        f(&mut session, &chain)
    }

    #[test]
    fn test_budget_exhaustion_terminates() {
        let config = SessionConfig::default().with_max_environments(2);
        let (mut session, sink) = session_with_config(config);
        let root = session.new_env().unwrap();
        session.new_scope(root).unwrap();
        assert!(session.new_scope(root).is_err());
        assert!(session.is_terminated());
        assert_eq!(sink.len(), 1);
        assert_eq!(
            session.new_env(),
            Err(crate::core::error::EnvError::SessionTerminated)
        );
    }

    #[test]
    fn test_scope_chain_shadowing() {
        with_scope_chain(4, |session, chain| {
            for (depth, &env) in chain.iter().enumerate().step_by(2) {
                let key = crate::env::DefKey::from_raw(depth as u32 + 100);
                session.bind_key(env, 0, key).unwrap();
            }
            let deepest = chain[chain.len() - 1];
            assert_eq!(
                session.key_in_env(deepest, 0).unwrap(),
                Some(crate::env::DefKey::from_raw(104))
            );
            assert_eq!(
                session.key_in_env(chain[3], 0).unwrap(),
                Some(crate::env::DefKey::from_raw(102))
            );
        });
    }
}
