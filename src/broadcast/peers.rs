use crate::common::clock::ProcessId;

/// The other members of the group and whether each link is still usable.
#[derive(Debug, Clone)]
pub struct Peers {
    pub members: Vec<ProcessId>,
    open: Vec<bool>,
}

impl Peers {
    pub fn new(members: Vec<ProcessId>) -> Self {
        let open = vec![true; members.len()];
        Peers { members, open }
    }

    pub fn is_open(&self, peer: ProcessId) -> bool {
        self.position(peer).map_or(false, |i| self.open[i])
    }

    /// Returns false if the peer was already closed.
    pub fn mark_closed(&mut self, peer: ProcessId) -> bool {
        match self.position(peer) {
            Some(i) if self.open[i] => {
                self.open[i] = false;
                true
            }
            _ => false,
        }
    }

    pub fn open_members(&self) -> Vec<ProcessId> {
        self.members
            .iter()
            .zip(&self.open)
            .filter(|&(_, &open)| open)
            .map(|(&peer, _)| peer)
            .collect()
    }

    pub fn all_closed(&self) -> bool {
        self.open.iter().all(|&open| !open)
    }

    fn position(&self, peer: ProcessId) -> Option<usize> {
        self.members.iter().position(|&member| member == peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_peers() {
        let mut peers = Peers::new(vec![0, 2, 3]);

        assert!(peers.is_open(2));
        assert!(!peers.is_open(1));
        assert!(peers.mark_closed(2));
        assert!(!peers.mark_closed(2));
        assert!(!peers.is_open(2));
        assert_eq!(peers.open_members(), vec![0, 3]);

        peers.mark_closed(0);
        peers.mark_closed(3);
        assert!(peers.all_closed());
    }
}
