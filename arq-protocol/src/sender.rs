//! Sender State Machine
//!
//! Splits application writes into MTU-sized fragments, numbers them from the
//! sequence pool and keeps every fragment until its acknowledgment arrives.
//! Unacknowledged fragments are resent verbatim once they have aged past the
//! retransmission threshold (selective repeat: only that fragment is resent).
//!
//! Admission is all-or-nothing. A write that needs more sequence ids than are
//! currently available is refused before anything reaches the link, and the
//! caller is expected to offer the same data again on a later tick. A write
//! that needs more ids than the whole window can never be accepted and is
//! refused with a permanent error instead.

use crate::config::{ConfigError, ProtocolConfig};
use crate::link::Link;
use crate::packet::{decode_ack, encode_fragment, PacketError};
use crate::sequence::{SeqPool, SequenceError};
use bytes::Bytes;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Write errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Not enough sequence ids: need {needed}, {available} available")]
    PoolExhausted { needed: usize, available: usize },

    #[error("Write needs {needed} fragments but the window holds only {window}")]
    WriteTooLarge { needed: usize, window: usize },

    #[error("Encoding error: {0}")]
    Encoding(#[from] PacketError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),
}

/// Sender statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Writes accepted
    pub writes_accepted: u64,
    /// Writes refused for lack of sequence ids or for exceeding the window
    pub writes_rejected: u64,
    /// Application bytes accepted
    pub bytes_written: u64,
    /// Fragments sent for the first time
    pub fragments_sent: u64,
    /// Fragments resent after timing out
    pub retransmissions: u64,
    /// Acknowledgments that retired an outstanding fragment
    pub acks_retired: u64,
    /// Acknowledgments for ids that were not outstanding
    pub stale_acks: u64,
    /// Acknowledgments that could not be decoded
    pub malformed_acks: u64,
}

/// A sent fragment waiting for its acknowledgment
#[derive(Debug, Clone)]
struct OutstandingFragment {
    /// Encoded fragment, resent as-is
    packet: Bytes,
    /// Ticks since the last (re)transmission
    age: u32,
}

/// Sending endpoint
pub struct Sender {
    config: ProtocolConfig,
    pool: SeqPool,
    /// Outstanding fragments keyed by sequence id
    outstanding: BTreeMap<u32, OutstandingFragment>,
    /// Smoothed round-trip time in ticks
    rtt: f64,
    stats: SenderStats,
}

impl Sender {
    /// Create a sender
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Sender {
            pool: SeqPool::new(config.pool_size),
            outstanding: BTreeMap::new(),
            rtt: config.initial_rtt_ticks,
            stats: SenderStats::default(),
            config,
        })
    }

    /// Number of fragments a write of `len` bytes is split into
    ///
    /// An empty write still produces one (empty) fragment.
    pub fn fragment_count(&self, len: usize) -> usize {
        let eff_mtu = self.config.effective_mtu();
        if len == 0 {
            1
        } else {
            (len + eff_mtu - 1) / eff_mtu
        }
    }

    /// Offer data to the sender, returning whether it was accepted
    pub fn write<L: Link + ?Sized>(&mut self, data: &[u8], link: &mut L) -> bool {
        self.try_write(data, link).is_ok()
    }

    /// Offer data to the sender
    ///
    /// Returns the number of fragments sent. On error nothing has been sent
    /// and no sequence id has been taken.
    pub fn try_write<L: Link + ?Sized>(
        &mut self,
        data: &[u8],
        link: &mut L,
    ) -> Result<usize, SendError> {
        let count = self.fragment_count(data.len());
        let window = self.pool.window() as usize;
        if count > window {
            self.stats.writes_rejected += 1;
            warn!(len = data.len(), needed = count, window, "Write can never fit the window");
            return Err(SendError::WriteTooLarge {
                needed: count,
                window,
            });
        }

        let available = self.pool.available() as usize;

        if count > available {
            self.stats.writes_rejected += 1;
            debug!(len = data.len(), needed = count, available, "Write rejected");
            return Err(SendError::PoolExhausted {
                needed: count,
                available,
            });
        }

        // Ids are issued cyclically, so the ids this write will receive are
        // known up front. Encode everything before touching the pool.
        let eff_mtu = self.config.effective_mtu();
        let capacity = self.pool.capacity();
        let first_id = self.pool.next_id();
        let mut packets = Vec::with_capacity(count);

        for index in 0..count {
            let start = (index * eff_mtu).min(data.len());
            let end = (start + eff_mtu).min(data.len());
            let id = (first_id + index as u32) % capacity;
            let packet = encode_fragment(&data[start..end], id, count as u32, self.config.mtu)?;
            packets.push((id, packet));
        }

        for (expected, packet) in packets {
            let id = self.pool.acquire()?;
            debug_assert_eq!(id, expected);

            debug!(id, len = packet.len(), fragments = count, "Sending fragment");
            link.send_packet(packet.clone());
            self.outstanding
                .insert(id, OutstandingFragment { packet, age: 0 });
        }

        self.stats.writes_accepted += 1;
        self.stats.bytes_written += data.len() as u64;
        self.stats.fragments_sent += count as u64;

        Ok(count)
    }

    /// Process an acknowledgment packet
    ///
    /// Returns `Ok(true)` if it retired an outstanding fragment and `Ok(false)`
    /// if the id was not outstanding (duplicate or stale ack).
    pub fn on_ack(&mut self, packet: &[u8]) -> Result<bool, PacketError> {
        let id = match decode_ack(packet) {
            Ok(id) => id,
            Err(err) => {
                self.stats.malformed_acks += 1;
                warn!(%err, "Dropping malformed acknowledgment");
                return Err(err);
            }
        };

        let Some(record) = self.outstanding.remove(&id) else {
            self.stats.stale_acks += 1;
            trace!(id, "Ignoring acknowledgment for id that is not outstanding");
            return Ok(false);
        };

        let alpha = self.config.rtt_alpha;
        self.rtt = alpha * self.rtt + (1.0 - alpha) * f64::from(record.age);

        if let Err(err) = self.pool.release(id) {
            warn!(%err, id, "Outstanding table and sequence pool disagree");
        }

        self.stats.acks_retired += 1;
        debug!(id, age = record.age, rtt = self.rtt, "Fragment acknowledged");

        Ok(true)
    }

    /// Advance one tick, resending every fragment that has aged out
    ///
    /// Returns the number of fragments resent.
    pub fn on_tick<L: Link + ?Sized>(&mut self, link: &mut L) -> usize {
        let threshold = self.config.retransmit_after_ticks;
        let mut resent = 0;

        for (id, record) in self.outstanding.iter_mut() {
            record.age += 1;
            if record.age > threshold {
                debug!(id, "Retransmitting fragment");
                link.send_packet(record.packet.clone());
                record.age = 0;
                resent += 1;
            }
        }

        self.stats.retransmissions += resent as u64;
        trace!(outstanding = self.outstanding.len(), resent, "Sender tick");

        resent
    }

    /// Smoothed round-trip time estimate in ticks
    ///
    /// Informational only: the retransmission threshold is fixed.
    pub fn rtt(&self) -> f64 {
        self.rtt
    }

    /// Number of fragments awaiting acknowledgment
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether every sent fragment has been acknowledged
    pub fn is_idle(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Number of fragments the next write may use
    pub fn available(&self) -> usize {
        self.pool.available() as usize
    }

    /// Sequence pool (read-only)
    pub fn pool(&self) -> &SeqPool {
        &self.pool
    }

    /// Sender statistics
    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}
