//! Rendezvous (highest random weight) hashing (§4.2, C2).
//!
//! Pure function: stable under churn, no shared state, no locks.

use crate::ids::{InstanceId, SessionId};

/// FNV-1a-64: the standard 64-bit offset basis and prime.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn weight(node: &InstanceId, session: &SessionId) -> u64 {
    let mut buf = Vec::with_capacity(node.as_str().len() + session.as_str().len());
    buf.extend_from_slice(node.as_str().as_bytes());
    buf.extend_from_slice(session.as_str().as_bytes());
    fnv1a_64(&buf)
}

/// Return the rendezvous-preferred owner for `session_id` among `nodes`.
///
/// `None` when `nodes` is empty. Ties are broken by lexicographically
/// smaller node id, making the choice fully deterministic.
pub fn preferred_owner(session_id: &SessionId, nodes: &[InstanceId]) -> Option<InstanceId> {
    nodes
        .iter()
        .map(|node| (weight(node, session_id), node))
        .max_by(|(w1, n1), (w2, n2)| w1.cmp(w2).then_with(|| n2.cmp(n1)))
        .map(|(_, node)| node.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<InstanceId> {
        ids.iter().map(|s| InstanceId::new(*s)).collect()
    }

    #[test]
    fn empty_nodes_yields_none() {
        let session = SessionId::new("s1");
        assert_eq!(preferred_owner(&session, &[]), None);
    }

    #[test]
    fn single_node_is_always_preferred() {
        let session = SessionId::new("s1");
        let ns = nodes(&["a"]);
        assert_eq!(preferred_owner(&session, &ns), Some(InstanceId::new("a")));
    }

    #[test]
    fn deterministic_across_calls() {
        let session = SessionId::new("s1");
        let ns = nodes(&["a", "b", "c"]);
        let first = preferred_owner(&session, &ns);
        for _ in 0..10 {
            assert_eq!(preferred_owner(&session, &ns), first);
        }
    }

    #[test]
    fn order_of_nodes_does_not_matter() {
        let session = SessionId::new("s1");
        let forward = nodes(&["a", "b", "c"]);
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(
            preferred_owner(&session, &forward),
            preferred_owner(&session, &backward)
        );
    }

    #[test]
    fn tie_break_is_lexicographic() {
        // Construct two single-char ids and confirm the function never
        // panics and always returns one of the inputs; exact weights are
        // an implementation detail, but ties (if any occur) must resolve
        // to the lexicographically smaller id by construction.
        let session = SessionId::new("tie-probe");
        let ns = nodes(&["x", "y"]);
        let winner = preferred_owner(&session, &ns).unwrap();
        assert!(ns.contains(&winner));
    }

    #[test]
    fn adding_one_node_moves_roughly_one_over_n_of_sessions() {
        let base = nodes(&["n0", "n1", "n2", "n3", "n4"]);
        let mut with_extra = base.clone();
        with_extra.push(InstanceId::new("n5"));

        let sample_size = 2000;
        let mut moved = 0;
        for i in 0..sample_size {
            let session = SessionId::new(format!("session-{i}"));
            let before = preferred_owner(&session, &base);
            let after = preferred_owner(&session, &with_extra);
            if before != after {
                moved += 1;
            }
        }

        let fraction = f64::from(moved) / f64::from(sample_size);
        // Expected ~= 1/6 for a 5->6 node change; allow generous slack
        // since this is a statistical property, not an exact guarantee.
        assert!(
            fraction > 0.05 && fraction < 0.35,
            "moved fraction {fraction} outside expected churn-minimisation band"
        );
    }

    proptest::proptest! {
        // A session assigned to a node set never moves when a node is
        // removed unless that node was its owner (§4.2 churn-minimisation
        // invariant, §8.1 property coverage).
        #[test]
        fn removing_an_unrelated_node_never_reassigns_other_sessions(
            node_count in 3usize..12,
            remove_idx in 0usize..11,
            session_suffix in 0u32..500,
        ) {
            let remove_idx = remove_idx % node_count;
            let all: Vec<InstanceId> = (0..node_count)
                .map(|i| InstanceId::new(format!("node-{i}")))
                .collect();
            let session = SessionId::new(format!("session-{session_suffix}"));

            let before = preferred_owner(&session, &all).unwrap();

            let mut reduced = all.clone();
            reduced.remove(remove_idx);
            if reduced.is_empty() {
                return Ok(());
            }
            let after = preferred_owner(&session, &reduced);

            if all[remove_idx] != before {
                prop_assert_eq!(after, Some(before));
            }
        }

        // The winner only ever depends on the node set's contents, never
        // its order.
        #[test]
        fn preferred_owner_is_order_independent(
            mut ids in proptest::collection::hash_set("[a-z]{1,8}", 1..10),
            session_suffix in 0u32..500,
        ) {
            let forward: Vec<InstanceId> = ids.drain().map(InstanceId::new).collect();
            let mut backward = forward.clone();
            backward.reverse();
            let session = SessionId::new(format!("session-{session_suffix}"));
            prop_assert_eq!(
                preferred_owner(&session, &forward),
                preferred_owner(&session, &backward)
            );
        }
    }
}
