//! Simulated packet link
//!
//! A one-directional link driven by discrete ticks. Every packet handed to
//! [`SimLink::send_packet`] goes through the fault model, in this order:
//!
//! | Fault      | Description                                             |
//! |------------|---------------------------------------------------------|
//! | MTU drop   | Packets longer than `mtu` are discarded.                |
//! | Loss       | Dropped with probability `packet_loss`.                 |
//! | Corruption | One bit flipped with probability `corruption`. Half the |
//! |            | time the bit is picked from the first 16 bytes.         |
//! | Reordering | Delay of `latency + uniform(0..=packet_reorder)` ticks. |
//!
//! The RNG is seeded from the configuration so a run can be replayed exactly.

use arq_protocol::{Link, DEFAULT_MTU};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

/// Bytes at the front of a packet that the corruption model favours
const HEADER_CORRUPTION_SPAN: usize = 16;

/// Seed used when a configuration does not name one
pub const DEFAULT_SEED: u64 = 42;

/// Fault model for a simulated link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Fixed delivery delay in ticks
    #[serde(default)]
    pub latency: u64,
    /// Largest packet the link delivers
    #[serde(default = "default_mtu")]
    pub mtu: usize,
    /// Probability that a packet is lost
    #[serde(default)]
    pub packet_loss: Option<f64>,
    /// Maximum extra random delay in ticks
    #[serde(default)]
    pub packet_reorder: u64,
    /// Probability that a packet has one bit flipped
    #[serde(default)]
    pub corruption: Option<f64>,
    /// RNG seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_mtu() -> usize {
    DEFAULT_MTU
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl LinkConfig {
    /// Loss-free, corruption-free link with the given latency
    pub fn new(latency: u64) -> Self {
        LinkConfig {
            latency,
            mtu: DEFAULT_MTU,
            packet_loss: None,
            packet_reorder: 0,
            corruption: None,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn with_loss(mut self, probability: f64) -> Self {
        self.packet_loss = Some(probability);
        self
    }

    pub fn with_reorder(mut self, max_extra_delay: u64) -> Self {
        self.packet_reorder = max_extra_delay;
        self
    }

    pub fn with_corruption(mut self, probability: f64) -> Self {
        self.corruption = Some(probability);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::new(0)
    }
}

/// Link counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Packets handed to the link
    pub sent: u64,
    /// Packets discarded for exceeding the MTU
    pub dropped_oversize: u64,
    /// Packets lost
    pub lost: u64,
    /// Packets with a flipped bit
    pub corrupted: u64,
    /// Packets delivered
    pub delivered: u64,
}

/// A packet travelling on the link
struct InFlight {
    deliver_at: u64,
    seq: u64,
    packet: Bytes,
}

// BinaryHeap is a max-heap; earliest delivery (then earliest send) must pop first.
impl Ord for InFlight {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.deliver_at.cmp(&other.deliver_at) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ord => ord,
        }
        .reverse()
    }
}

impl PartialOrd for InFlight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for InFlight {
    fn eq(&self, other: &Self) -> bool {
        self.deliver_at == other.deliver_at && self.seq == other.seq
    }
}

impl Eq for InFlight {}

/// One direction of a simulated network
pub struct SimLink {
    name: String,
    config: LinkConfig,
    rng: StdRng,
    now: u64,
    next_seq: u64,
    queue: BinaryHeap<InFlight>,
    stats: LinkStats,
}

impl SimLink {
    /// Create a link seeded from `config.seed`
    pub fn new(name: impl Into<String>, config: LinkConfig) -> Self {
        SimLink {
            name: name.into(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            now: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
            stats: LinkStats::default(),
        }
    }

    /// Advance the link clock by one tick and return every packet now due
    pub fn tick(&mut self) -> Vec<Bytes> {
        self.now += 1;

        let mut due = Vec::new();
        while let Some(top) = self.queue.peek() {
            if top.deliver_at > self.now {
                break;
            }
            if let Some(item) = self.queue.pop() {
                trace!(link = %self.name, len = item.packet.len(), "Delivering packet");
                due.push(item.packet);
            }
        }

        self.stats.delivered += due.len() as u64;
        due
    }

    fn corrupt(&mut self, packet: Bytes) -> Bytes {
        let mut data = packet.to_vec();
        let mut span = data.len();
        if self.rng.gen::<f64>() > 0.5 {
            span = span.min(HEADER_CORRUPTION_SPAN);
        }
        let position = self.rng.gen_range(0..span);
        let bit = self.rng.gen_range(0..8u32);

        debug!(link = %self.name, position, bit, "Packet corrupted");
        data[position] ^= 1 << bit;
        Bytes::from(data)
    }

    /// Current link time
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Packets waiting for delivery
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

impl Link for SimLink {
    fn send_packet(&mut self, packet: Bytes) {
        self.stats.sent += 1;

        if packet.len() > self.config.mtu {
            self.stats.dropped_oversize += 1;
            debug!(link = %self.name, len = packet.len(), mtu = self.config.mtu, "Packet dropped: larger than MTU");
            return;
        }

        if let Some(loss) = self.config.packet_loss {
            if self.rng.gen::<f64>() < loss {
                self.stats.lost += 1;
                debug!(link = %self.name, "Packet lost");
                return;
            }
        }

        let mut packet = packet;
        if let Some(corruption) = self.config.corruption {
            if self.rng.gen::<f64>() < corruption && !packet.is_empty() {
                self.stats.corrupted += 1;
                packet = self.corrupt(packet);
            }
        }

        let jitter = self.rng.gen_range(0..=self.config.packet_reorder);
        let deliver_at = self.now + self.config.latency + jitter;
        trace!(link = %self.name, len = packet.len(), deliver_at, "Packet queued");

        self.queue.push(InFlight {
            deliver_at,
            seq: self.next_seq,
            packet,
        });
        self.next_seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads(packets: &[Bytes]) -> Vec<u8> {
        packets.iter().map(|p| p[0]).collect()
    }

    #[test]
    fn test_zero_latency_delivers_next_tick() {
        let mut link = SimLink::new("test", LinkConfig::new(0));
        link.send_packet(Bytes::from_static(&[1]));

        assert_eq!(link.in_flight(), 1);
        assert_eq!(link.tick().len(), 1);
        assert_eq!(link.stats().delivered, 1);
    }

    #[test]
    fn test_latency() {
        let mut link = SimLink::new("test", LinkConfig::new(3));
        link.send_packet(Bytes::from_static(&[1]));

        assert!(link.tick().is_empty());
        assert!(link.tick().is_empty());
        assert_eq!(link.tick().len(), 1);
    }

    #[test]
    fn test_fifo_without_reordering() {
        let mut link = SimLink::new("test", LinkConfig::new(1));
        for i in 0..5u8 {
            link.send_packet(Bytes::from(vec![i]));
        }

        assert_eq!(payloads(&link.tick()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_oversize_dropped() {
        let mut link = SimLink::new("test", LinkConfig::new(0).with_mtu(4));
        link.send_packet(Bytes::from_static(&[0; 5]));
        link.send_packet(Bytes::from_static(&[0; 4]));

        assert_eq!(link.tick().len(), 1);
        assert_eq!(link.stats().dropped_oversize, 1);
    }

    #[test]
    fn test_total_loss() {
        let mut link = SimLink::new("test", LinkConfig::new(0).with_loss(1.0));
        for _ in 0..10 {
            link.send_packet(Bytes::from_static(&[0]));
        }

        assert!(link.tick().is_empty());
        assert_eq!(link.stats().lost, 10);
    }

    #[test]
    fn test_corruption_flips_one_bit() {
        let mut link = SimLink::new("test", LinkConfig::new(0).with_corruption(1.0));
        let original = Bytes::from(vec![0u8; 32]);
        link.send_packet(original.clone());

        let delivered = link.tick();
        let flipped: u32 = delivered[0]
            .iter()
            .zip(original.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        assert_eq!(flipped, 1);
        assert_eq!(link.stats().corrupted, 1);
    }

    #[test]
    fn test_reorder_delay_bounded() {
        let mut link = SimLink::new("test", LinkConfig::new(2).with_reorder(5));
        for i in 0..50u8 {
            link.send_packet(Bytes::from(vec![i]));
        }

        let mut delivered = 0;
        for tick in 1..=7 {
            let due = link.tick();
            if tick < 2 {
                assert!(due.is_empty());
            }
            delivered += due.len();
        }
        assert_eq!(delivered, 50);
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let config = LinkConfig::new(1).with_reorder(10).with_loss(0.3);
        let mut a = SimLink::new("a", config.clone());
        let mut b = SimLink::new("b", config);

        for i in 0..100u8 {
            a.send_packet(Bytes::from(vec![i]));
            b.send_packet(Bytes::from(vec![i]));
        }

        for _ in 0..12 {
            assert_eq!(a.tick(), b.tick());
        }
    }
}
