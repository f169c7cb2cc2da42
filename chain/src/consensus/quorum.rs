//! Quorum arithmetic.

use std::collections::HashSet;

use crate::types::{BlockHash, NodeId};

use super::message::{MessageKind, Vote};

/// `max(1, ceil(trusted / 0.67))`, computed in integers.
///
/// For every non-empty trust set this exceeds the set's size (5 trusted
/// nodes need 8 votes), so a node can only reach quorum when ballots also
/// arrive from senders outside its own trust set.
pub fn quorum_threshold(trusted: usize) -> usize {
    ((trusted * 100 + 66) / 67).max(1)
}

/// Number of distinct senders that cast a BALLOT for `hash`.
pub fn count_votes(history: &HashSet<Vote>, hash: &BlockHash) -> usize {
    history
        .iter()
        .filter(|v| v.kind == MessageKind::Ballot && &v.block_hash == hash)
        .map(|v| v.sender)
        .collect::<HashSet<NodeId>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash256;

    #[test]
    fn threshold_matches_the_ceiling_formula() {
        assert_eq!(quorum_threshold(0), 1);
        assert_eq!(quorum_threshold(1), 2);
        assert_eq!(quorum_threshold(2), 3);
        assert_eq!(quorum_threshold(3), 5);
        assert_eq!(quorum_threshold(5), 8);
        assert_eq!(quorum_threshold(67), 100);
        for n in 1..200 {
            assert!(quorum_threshold(n) > n);
        }
    }

    #[test]
    fn only_distinct_ballot_senders_for_the_hash_count() {
        let hash = BlockHash(Hash256::compute(b"candidate"));
        let other = BlockHash(Hash256::compute(b"other"));
        let (a, b) = (NodeId::random(), NodeId::random());

        let vote = |kind, block_hash, sender, counter| Vote {
            kind,
            block_hash,
            sender,
            counter,
        };
        let history: HashSet<Vote> = [
            vote(MessageKind::Ballot, hash, a, 1),
            vote(MessageKind::Ballot, hash, a, 2),
            vote(MessageKind::Ballot, hash, b, 1),
            vote(MessageKind::Commit, hash, NodeId::random(), 1),
            vote(MessageKind::Ballot, other, NodeId::random(), 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(count_votes(&history, &hash), 2);
        assert_eq!(count_votes(&history, &other), 1);
    }
}
