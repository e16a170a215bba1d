//! Property-based tests for the history projection
//!
//! - Order and roles of existing entries are preserved
//! - The projection always ends on a user turn
//! - At most one synthetic entry is added

use super::project_history;
use crate::session::{Role, Session};
use proptest::prelude::*;

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant), Just(Role::System)]
}

fn arb_history() -> impl Strategy<Value = Vec<(Role, String)>> {
    prop::collection::vec((arb_role(), "[a-zA-Z0-9 _.!?,]{0,60}"), 0..12)
}

fn build(entries: &[(Role, String)]) -> Session {
    let mut session = Session::new();
    for (role, content) in entries {
        session.push_message(*role, content.clone());
    }
    session
}

proptest! {
    #[test]
    fn prop_projection_preserves_prefix(entries in arb_history(), pending in "[a-z ]{1,20}") {
        let session = build(&entries);
        let wire = project_history(session.history(), &pending);

        prop_assert!(wire.len() >= entries.len());
        for (projected, (role, content)) in wire.iter().zip(entries.iter()) {
            prop_assert_eq!(projected.role, *role);
            prop_assert_eq!(&projected.content, content);
        }
    }

    #[test]
    fn prop_projection_ends_on_user_turn(entries in arb_history(), pending in "[a-z ]{1,20}") {
        let session = build(&entries);
        let wire = project_history(session.history(), &pending);

        let last = wire.last().expect("projection is never empty");
        prop_assert_eq!(last.role, Role::User);

        let ends_with_user = entries.last().map(|(role, _)| *role) == Some(Role::User);
        if ends_with_user {
            prop_assert_eq!(wire.len(), entries.len());
        } else {
            prop_assert_eq!(wire.len(), entries.len() + 1);
            prop_assert_eq!(&last.content, &pending);
        }
    }
}
