//! Leader election: the lexicographic minimum of `self_endpoint` and
//! the known peer endpoints. Deterministic and re-evaluated on demand
//! — no messaging is involved.

use quorumchain_network::PeerHandle;

/// True iff `self_endpoint` is the lexicographically smallest
/// `host:port` string among itself and `peers`.
pub fn is_leader(self_endpoint: &PeerHandle, peers: &[PeerHandle]) -> bool {
    let self_ep = self_endpoint.endpoint();
    let min_ep = peers.iter().map(PeerHandle::endpoint).fold(self_ep.clone(), |min, ep| if ep < min { ep } else { min });
    min_ep == self_ep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_is_leader_with_no_peers() {
        let me = PeerHandle::new("10.0.0.1", 9001);
        assert!(is_leader(&me, &[]));
    }

    #[test]
    fn a_lexicographically_smaller_peer_takes_leadership() {
        let me = PeerHandle::new("10.0.0.2", 9001);
        let smaller = PeerHandle::new("10.0.0.1", 9001);
        assert!(!is_leader(&me, &[smaller]));
    }

    #[test]
    fn self_stays_leader_when_it_is_the_smallest() {
        let me = PeerHandle::new("10.0.0.1", 9001);
        let bigger_a = PeerHandle::new("10.0.0.2", 9001);
        let bigger_b = PeerHandle::new("9.0.0.9", 9001);
        // "10.0.0.1" < "9.0.0.9" lexicographically ('1' < '9'), so self
        // still wins despite the numerically larger-looking octet.
        assert!(is_leader(&me, &[bigger_a, bigger_b]));
    }

    #[test]
    fn leadership_is_re_evaluated_from_the_current_peer_snapshot() {
        let me = PeerHandle::new("10.0.0.5", 9001);
        assert!(is_leader(&me, &[]));
        let newcomer = PeerHandle::new("10.0.0.1", 9001);
        assert!(!is_leader(&me, &[newcomer]));
    }
}
