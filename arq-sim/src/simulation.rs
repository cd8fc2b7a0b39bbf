//! Discrete-time driver
//!
//! Wires a sender, a receiver, a two-way simulated network and a scripted
//! application together and advances them in lock step. Every tick runs the
//! same fixed sequence:
//!
//! 1. the application offers queued data to the sender
//! 2. the sender ages outstanding fragments and resends expired ones
//! 3. the receiver drains its reorder buffer
//! 4. the forward link delivers due fragments to the receiver
//! 5. the backward link delivers due acknowledgments to the sender
//!
//! With a fixed seed the whole run is reproducible.

use crate::app::{Check, TestApplication};
use crate::link::{LinkConfig, LinkStats};
use crate::network::SimNetwork;
use arq_protocol::{
    ConfigError, ProtocolConfig, Receiver, ReceiverStats, SendError, Sender, SenderStats,
};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Simulation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Timeout: transfer not finished in {timeout} ticks ({received} of {expected} bytes delivered)")]
    Timeout {
        timeout: u64,
        received: usize,
        expected: usize,
    },

    #[error("Data corruption: delivered stream diverges at byte {offset} ({received} bytes delivered)")]
    DataMismatch { offset: usize, received: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Write refused: {0}")]
    WriteRefused(SendError),
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Ticks executed
    pub ticks: u64,
    /// `Ok` if every byte arrived intact
    pub outcome: Result<(), SimError>,
    /// Bytes delivered to the application
    pub bytes_delivered: usize,
    /// Final smoothed RTT estimate in ticks
    pub rtt: f64,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub forward: LinkStats,
    pub backward: LinkStats,
}

impl SimReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A complete sender/network/receiver/application system
pub struct Simulation {
    sender: Sender,
    receiver: Receiver,
    network: SimNetwork,
    app: TestApplication,
    ticks: u64,
}

impl Simulation {
    /// Build a simulation. The protocol MTU should match the link MTU.
    pub fn new(
        protocol: ProtocolConfig,
        link: LinkConfig,
        app: TestApplication,
    ) -> Result<Self, SimError> {
        let receiver = Receiver::new(protocol.clone())?;
        let sender = Sender::new(protocol)?;

        Ok(Simulation {
            sender,
            receiver,
            network: SimNetwork::new(link),
            app,
            ticks: 0,
        })
    }

    /// Run one tick and report the application's verdict
    pub fn tick(&mut self) -> Check {
        self.ticks += 1;

        self.app.on_tick(&mut self.sender, &mut self.network.forward);
        self.sender.on_tick(&mut self.network.forward);
        self.receiver.on_tick(&mut self.app);

        // Malformed packets are counted and logged where they are decoded
        for packet in self.network.forward.tick() {
            let received = self
                .receiver
                .on_packet(&packet, &mut self.network.backward, &mut self.app);
            if let Err(err) = received {
                trace!(%err, "Receiver dropped packet");
            }
        }
        for packet in self.network.backward.tick() {
            if let Err(err) = self.sender.on_ack(&packet) {
                trace!(%err, "Sender dropped acknowledgment");
            }
        }

        self.app.check()
    }

    /// Advance up to `ticks` ticks, stopping early once the verdict is final
    pub fn advance_time(&mut self, ticks: u64) -> Check {
        let mut check = Check::Wait;
        for _ in 0..ticks {
            check = self.tick();
            if check.is_done() {
                break;
            }
        }
        check
    }

    /// Run until the transfer finishes or fails
    pub fn run(&mut self) -> SimReport {
        let outcome = loop {
            match self.tick() {
                Check::Wait => continue,
                Check::Finish => break Ok(()),
                Check::Error(err) => break Err(err),
            }
        };

        match &outcome {
            Ok(()) => info!(ticks = self.ticks, rtt = self.sender.rtt(), "Transfer complete"),
            Err(err) => info!(ticks = self.ticks, %err, "Transfer failed"),
        }
        debug!(
            in_flight = self.network.in_flight(),
            outstanding = self.sender.outstanding(),
            buffered = self.receiver.buffered(),
            "Final state"
        );

        self.report(outcome)
    }

    fn report(&self, outcome: Result<(), SimError>) -> SimReport {
        SimReport {
            ticks: self.ticks,
            outcome,
            bytes_delivered: self.app.received().len(),
            rtt: self.sender.rtt(),
            sender: self.sender.stats().clone(),
            receiver: self.receiver.stats().clone(),
            forward: self.network.forward.stats().clone(),
            backward: self.network.backward.stats().clone(),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    pub fn app(&self) -> &TestApplication {
        &self.app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_protocol::Link;
    use bytes::Bytes;

    fn simulation(link: LinkConfig, messages: Vec<Bytes>, timeout: u64) -> Simulation {
        let protocol = ProtocolConfig::with_mtu(link.mtu);
        Simulation::new(protocol, link, TestApplication::new(messages, timeout)).unwrap()
    }

    #[test]
    fn test_one_byte_perfect_link() {
        let mut sim = simulation(LinkConfig::new(0), vec![Bytes::from_static(b"f")], 10);

        // Written, sent and delivered within the first tick
        assert_eq!(sim.tick(), Check::Finish);
        assert_eq!(sim.app().received(), b"f");

        let report = sim.run();
        assert!(report.is_success());
    }

    #[test]
    fn test_acks_return_on_perfect_link() {
        let mut sim = simulation(LinkConfig::new(0), vec![Bytes::from_static(b"f")], 10);
        sim.tick();

        assert!(sim.sender().is_idle());
        assert_eq!(sim.receiver().next_expected(), 1);
    }

    #[test]
    fn test_latency_delays_delivery() {
        let mut sim = simulation(LinkConfig::new(5), vec![Bytes::from_static(b"late")], 100);

        assert_eq!(sim.advance_time(4), Check::Wait);
        assert!(sim.app().received().is_empty());
        assert_eq!(sim.advance_time(1), Check::Finish);
        assert_eq!(sim.ticks(), 5);
    }

    #[test]
    fn test_total_loss_times_out() {
        let link = LinkConfig::new(1).with_loss(1.0);
        let mut sim = simulation(link, vec![Bytes::from_static(b"gone")], 30);

        let report = sim.run();
        assert!(matches!(report.outcome, Err(SimError::Timeout { timeout: 30, .. })));
        assert_eq!(report.ticks, 31);
        assert!(report.sender.retransmissions >= 2);
        assert_eq!(report.bytes_delivered, 0);
    }

    #[test]
    fn test_invalid_protocol_config() {
        let result = Simulation::new(
            ProtocolConfig::with_mtu(4),
            LinkConfig::new(0),
            TestApplication::new(Vec::new(), 10),
        );
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn test_malformed_packets_do_not_stop_the_run() {
        let mut sim = simulation(LinkConfig::new(0), vec![Bytes::from_static(b"ok")], 10);
        sim.network.forward.send_packet(Bytes::from_static(b"tiny"));
        sim.network.backward.send_packet(Bytes::from_static(b"bad ack"));

        assert_eq!(sim.tick(), Check::Finish);
        assert_eq!(sim.receiver().stats().malformed, 1);
        assert_eq!(sim.sender().stats().malformed_acks, 1);
        assert!(sim.sender().is_idle());
    }

    #[test]
    fn test_write_larger_than_window_fails_fast() {
        let protocol = ProtocolConfig {
            mtu: 20,
            pool_size: 8,
            ..ProtocolConfig::default()
        };
        let app = TestApplication::new(vec![Bytes::from(vec![1u8; 40])], 100);
        let mut sim = Simulation::new(protocol, LinkConfig::new(0).with_mtu(20), app).unwrap();

        let report = sim.run();
        assert_eq!(report.ticks, 1);
        assert_eq!(
            report.outcome,
            Err(SimError::WriteRefused(SendError::WriteTooLarge {
                needed: 5,
                window: 4
            }))
        );
        assert_eq!(report.sender.writes_rejected, 1);
        assert_eq!(report.forward.sent, 0);
    }
}
