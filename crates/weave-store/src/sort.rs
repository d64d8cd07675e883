use std::sync::Arc;

use weave_types::{Entry, SortMode, Timestamp};

use crate::pact::Pact;

/// Top-level entries (replies excluded) in the requested order.
pub fn sorted(pact: &Pact, mode: SortMode) -> Vec<(Timestamp, Arc<Entry>)> {
    let top = pact
        .writs()
        .iter()
        .filter(|(_, e)| !e.is_reply())
        .map(|(t, e)| (t.clone(), e.clone()));
    match mode {
        SortMode::TimeAsc => top.collect(),
        SortMode::TimeDsc => top.rev().collect(),
    }
}

/// Position of one top-level entry among its siblings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    pub has_next: bool,
    pub has_prev: bool,
    /// The next newer top-level entry.
    pub next: Option<(Timestamp, Arc<Entry>)>,
    /// The next older top-level entry.
    pub prev: Option<(Timestamp, Arc<Entry>)>,
}

pub fn neighbors(pact: &Pact, time: &Timestamp) -> Neighbors {
    let writs = pact.writs();
    let next = writs
        .iter()
        .skip_while(|(t, _)| *t <= time)
        .find(|(_, e)| !e.is_reply())
        .map(|(t, e)| (t.clone(), e.clone()));
    let prev = writs
        .iter()
        .rev()
        .skip_while(|(t, _)| *t >= time)
        .find(|(_, e)| !e.is_reply())
        .map(|(t, e)| (t.clone(), e.clone()));

    Neighbors {
        has_next: next.is_some(),
        has_prev: prev.is_some(),
        next,
        prev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pact::tests::entry;

    fn t(n: u128) -> Timestamp {
        Timestamp::new(n)
    }

    fn gallery() -> Pact {
        Pact::from_pairs([
            (t(100), entry("~zod/1", None)),
            (t(150), entry("~bus/c", Some("~zod/1"))),
            (t(200), entry("~zod/2", None)),
            (t(300), entry("~zod/3", None)),
        ])
    }

    #[test]
    fn sorted_excludes_replies() {
        let pact = gallery();
        let asc: Vec<_> = sorted(&pact, SortMode::TimeAsc).into_iter().map(|(t, _)| t.whole()).collect();
        let dsc: Vec<_> = sorted(&pact, SortMode::TimeDsc).into_iter().map(|(t, _)| t.whole()).collect();
        assert_eq!(asc, vec![100, 200, 300]);
        assert_eq!(dsc, vec![300, 200, 100]);
    }

    #[test]
    fn neighbors_skip_comments() {
        let pact = gallery();
        let n = neighbors(&pact, &t(100));
        assert!(n.has_next);
        assert!(!n.has_prev);
        assert_eq!(n.next.map(|(t, _)| t.whole()), Some(200));

        let n = neighbors(&pact, &t(300));
        assert!(!n.has_next);
        assert_eq!(n.prev.map(|(t, _)| t.whole()), Some(200));
    }
}
