use proptest::prelude::*;
use weave_store::window::merge;
use weave_store::{ConversationState, Window, WindowSet};
use weave_types::{Content, Delta, Diff, Memo, Timestamp};

fn t(n: u128) -> Timestamp {
    Timestamp::new(n)
}

fn window() -> impl Strategy<Value = Window> {
    (0u128..200, 0u128..40, any::<bool>(), any::<bool>())
        .prop_map(|(lo, len, lo_flag, hi_flag)| Window::new(t(lo), t(lo + len)).with_loaded(lo_flag, hi_flag))
}

#[derive(Debug, Clone)]
enum Op {
    Add { n: u8, time: u16, reply_to: Option<u8> },
    Del { n: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, 1u16..500, proptest::option::of(0u8..8))
            .prop_map(|(n, time, reply_to)| Op::Add { n, time, reply_to }),
        (0u8..8).prop_map(|n| Op::Del { n }),
    ]
}

fn id(n: u8) -> String {
    format!("~zod/{n}")
}

fn diff(op: &Op) -> Diff {
    match op {
        Op::Add { n, time, reply_to } => Diff {
            id: id(*n),
            delta: Delta::add(
                Memo {
                    replying: reply_to.filter(|r| r != n).map(id),
                    author: "~zod".into(),
                    sent: 0,
                    content: Content::text("x"),
                },
                Some(t(u128::from(*time))),
            ),
        },
        Op::Del { n } => Diff {
            id: id(*n),
            delta: Delta::Del,
        },
    }
}

fn covered(windows: &[Window], n: u128) -> bool {
    windows.iter().any(|w| w.contains(&t(n)))
}

proptest! {
    #[test]
    fn merge_is_disjoint_exact_and_idempotent(input in proptest::collection::vec(window(), 0..12)) {
        let merged = merge(input.clone());
        for pair in merged.windows(2) {
            prop_assert!(pair[0].oldest > pair[1].newest);
        }
        for n in 0..260u128 {
            prop_assert_eq!(covered(&input, n), covered(&merged, n));
        }
        prop_assert_eq!(merge(merged.clone()), merged);
    }

    #[test]
    fn extend_is_monotonic(
        base in proptest::collection::vec(window(), 0..6),
        new in window(),
        anchor in proptest::option::of(0u128..240),
    ) {
        let set = WindowSet::from_windows(base);
        let anchor = anchor.map(t);
        let grown = set.extend(new.clone(), anchor.as_ref(), None);
        for n in 0..260u128 {
            if set.covers(&t(n)) {
                prop_assert!(grown.covers(&t(n)));
            }
        }
        prop_assert!(grown.windows().iter().filter(|w| w.latest).count() <= 1);
    }

    #[test]
    fn reply_links_hold_under_any_sequence(ops in proptest::collection::vec(op(), 0..40)) {
        let mut state = ConversationState::new();
        for op in &ops {
            state.apply(diff(op));
            prop_assert!(state.pact.replies_linked());
        }
    }

    #[test]
    fn repeated_add_changes_nothing(ops in proptest::collection::vec(op(), 1..20)) {
        let mut state = ConversationState::new();
        for op in &ops {
            state.apply(diff(op));
        }
        if let Some(last_add) = ops.iter().rev().find(|o| matches!(o, Op::Add { .. })) {
            let Op::Add { n, .. } = last_add else { unreachable!() };
            if state.pact.contains(&id(*n)) {
                let before = state.pact.clone();
                state.apply(diff(last_add));
                prop_assert_eq!(state.pact, before);
            }
        }
    }
}

#[test]
fn latest_window_tracks_the_newest_key() {
    let mut state = ConversationState::new();
    for (n, time) in [(1u8, 100u16), (2, 300), (3, 200)] {
        state.apply(diff(&Op::Add { n, time, reply_to: None }));
    }
    let latest = state.windows.latest().unwrap();
    assert!(latest.contains(state.pact.max_key().unwrap()));
}
