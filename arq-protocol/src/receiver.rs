//! Receiver State Machine
//!
//! Validates fragments, acknowledges every intact one and releases payloads to
//! the application strictly in sequence order. Fragments that arrive ahead of
//! the cursor wait in a reorder buffer; fragments that fail their checksum are
//! dropped without an acknowledgment and recovered by the sender's timer.
//!
//! Delivery is per fragment. `fragment_count` is carried on the wire but the
//! receiver does not reassemble writes into single messages.

use crate::config::{ConfigError, ProtocolConfig};
use crate::link::{Application, Link};
use crate::packet::{decode_fragment, encode_ack, PacketError};
use crate::sequence::{forward_distance, window_for};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// What happened to an incoming packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// Checksum mismatch or impossible sequence id; dropped, not acknowledged
    Corrupted,
    /// Acknowledged and delivered, releasing this many fragments in total
    Delivered(usize),
    /// Acknowledged and held until earlier fragments arrive
    Buffered,
    /// Acknowledged again; the payload was already buffered or delivered
    Duplicate,
}

/// Receiver statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets handed to the receiver
    pub packets_received: u64,
    /// Packets too short to be a fragment
    pub malformed: u64,
    /// Packets dropped for a checksum mismatch
    pub corrupted: u64,
    /// Intact packets whose sequence id lies outside the pool
    pub out_of_range: u64,
    /// Intact fragments that had already been received
    pub duplicates: u64,
    /// Fragments released to the application
    pub fragments_delivered: u64,
    /// Bytes released to the application
    pub bytes_delivered: u64,
    /// Acknowledgments sent
    pub acks_sent: u64,
}

/// Receiving endpoint
pub struct Receiver {
    config: ProtocolConfig,
    /// Pool size shared with the sender
    capacity: u32,
    /// Ids within this distance ahead of the cursor are new
    window: u32,
    /// Sequence id of the next fragment to deliver
    next_expected: u32,
    /// Fragments received ahead of the cursor
    reorder: HashMap<u32, Bytes>,
    stats: ReceiverStats,
}

impl Receiver {
    /// Create a receiver
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Receiver {
            capacity: config.pool_size,
            window: window_for(config.pool_size),
            next_expected: 0,
            reorder: HashMap::new(),
            stats: ReceiverStats::default(),
            config,
        })
    }

    /// Process a packet delivered by the link
    ///
    /// Malformed packets are dropped and reported as an error; everything else
    /// is absorbed and described by the returned [`Receipt`].
    pub fn on_packet<L, A>(
        &mut self,
        packet: &[u8],
        link: &mut L,
        app: &mut A,
    ) -> Result<Receipt, PacketError>
    where
        L: Link + ?Sized,
        A: Application + ?Sized,
    {
        self.stats.packets_received += 1;

        let fragment = match decode_fragment(packet) {
            Ok(fragment) => fragment,
            Err(err) => {
                self.stats.malformed += 1;
                warn!(%err, "Dropping malformed fragment");
                return Err(err);
            }
        };

        if !fragment.checksum_ok() {
            self.stats.corrupted += 1;
            debug!(
                id = fragment.sequence_id,
                "Checksum mismatch, dropping fragment"
            );
            return Ok(Receipt::Corrupted);
        }

        let id = fragment.sequence_id;
        if id >= self.capacity {
            // Only a damaged header can produce this
            self.stats.out_of_range += 1;
            debug!(id, capacity = self.capacity, "Sequence id outside pool, dropping");
            return Ok(Receipt::Corrupted);
        }

        link.send_packet(encode_ack(id));
        self.stats.acks_sent += 1;

        let distance = forward_distance(self.next_expected, id, self.capacity);
        if distance >= self.window {
            self.stats.duplicates += 1;
            trace!(id, next_expected = self.next_expected, "Fragment already delivered");
            return Ok(Receipt::Duplicate);
        }

        if distance == 0 {
            self.deliver(fragment.payload, app);
            let delivered = 1 + self.drain(app);
            return Ok(Receipt::Delivered(delivered));
        }

        if self.reorder.contains_key(&id) {
            self.stats.duplicates += 1;
            trace!(id, "Fragment already buffered");
            return Ok(Receipt::Duplicate);
        }

        debug!(
            id,
            next_expected = self.next_expected,
            fragments = fragment.fragment_count,
            "Buffering out-of-order fragment"
        );
        self.reorder.insert(id, fragment.payload);
        Ok(Receipt::Buffered)
    }

    /// Advance one tick, releasing any buffered run at the cursor
    ///
    /// Returns the number of fragments delivered.
    pub fn on_tick<A: Application + ?Sized>(&mut self, app: &mut A) -> usize {
        let delivered = self.drain(app);
        trace!(
            buffered = self.reorder.len(),
            next_expected = self.next_expected,
            delivered,
            "Receiver tick"
        );
        delivered
    }

    fn drain<A: Application + ?Sized>(&mut self, app: &mut A) -> usize {
        let mut delivered = 0;
        while let Some(payload) = self.reorder.remove(&self.next_expected) {
            self.deliver(payload, app);
            delivered += 1;
        }
        delivered
    }

    fn deliver<A: Application + ?Sized>(&mut self, payload: Bytes, app: &mut A) {
        debug!(id = self.next_expected, len = payload.len(), "Delivering fragment");

        self.stats.fragments_delivered += 1;
        self.stats.bytes_delivered += payload.len() as u64;
        self.next_expected = (self.next_expected + 1) % self.capacity;

        app.on_data(payload);
    }

    /// Sequence id the receiver will deliver next
    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    /// Number of fragments waiting in the reorder buffer
    pub fn buffered(&self) -> usize {
        self.reorder.len()
    }

    /// Receiver statistics
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}
