//! Two-way simulated network
//!
//! Data travels sender → receiver on the forward link and acknowledgments
//! travel back on the backward link. Both directions share one fault model
//! but draw from independent RNG streams.

use crate::link::{LinkConfig, SimLink};

/// A pair of directed links between one sender and one receiver
pub struct SimNetwork {
    /// Sender → receiver
    pub forward: SimLink,
    /// Receiver → sender
    pub backward: SimLink,
}

impl SimNetwork {
    pub fn new(config: LinkConfig) -> Self {
        let backward_config = LinkConfig {
            seed: config.seed.wrapping_add(1),
            ..config.clone()
        };

        SimNetwork {
            forward: SimLink::new("sender->receiver", config),
            backward: SimLink::new("receiver->sender", backward_config),
        }
    }

    /// MTU declared by the network
    pub fn mtu(&self) -> usize {
        self.forward.config().mtu
    }

    /// Packets still travelling in either direction
    pub fn in_flight(&self) -> usize {
        self.forward.in_flight() + self.backward.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_protocol::Link;
    use bytes::Bytes;

    #[test]
    fn test_directions_are_independent() {
        let mut network = SimNetwork::new(LinkConfig::new(0));
        network.forward.send_packet(Bytes::from_static(b"data"));

        assert_eq!(network.in_flight(), 1);
        assert!(network.backward.tick().is_empty());
        assert_eq!(network.forward.tick().len(), 1);
        assert_eq!(network.in_flight(), 0);
    }

    #[test]
    fn test_backward_seed_differs() {
        let network = SimNetwork::new(LinkConfig::new(0).with_seed(7));
        assert_eq!(network.forward.config().seed, 7);
        assert_eq!(network.backward.config().seed, 8);
        assert_eq!(network.mtu(), 1500);
    }
}
