//! Shared helpers for the ARQ integration tests

use arq_protocol::{ProtocolConfig, Receiver, Sender};
use arq_sim::{LinkConfig, SimReport, Simulation, TestApplication};
use bytes::Bytes;

/// Turn byte slices into owned messages
pub fn messages<T: AsRef<[u8]>>(parts: impl IntoIterator<Item = T>) -> Vec<Bytes> {
    parts
        .into_iter()
        .map(|p| Bytes::copy_from_slice(p.as_ref()))
        .collect()
}

/// Concatenate delivered chunks
pub fn concat(chunks: &[Bytes]) -> Vec<u8> {
    chunks.iter().flat_map(|c| c.iter().copied()).collect()
}

/// Run a transfer over a simulated network whose MTU the protocol adopts
pub fn run_transfer(link: LinkConfig, messages: Vec<Bytes>, timeout: u64) -> SimReport {
    let protocol = ProtocolConfig::with_mtu(link.mtu);
    let app = TestApplication::new(messages, timeout);
    let mut simulation =
        Simulation::new(protocol, link, app).expect("test link configuration must be valid");
    simulation.run()
}

/// Sender and receiver wired back to back through in-memory packet queues
pub struct Loopback {
    pub sender: Sender,
    pub receiver: Receiver,
    /// Fragments written by the sender, not yet delivered
    pub data: Vec<Bytes>,
    /// Acknowledgments written by the receiver, not yet delivered
    pub acks: Vec<Bytes>,
    /// Payloads released to the application
    pub delivered: Vec<Bytes>,
}

impl Loopback {
    pub fn new(config: ProtocolConfig) -> Self {
        Loopback {
            receiver: Receiver::new(config.clone()).expect("valid config"),
            sender: Sender::new(config).expect("valid config"),
            data: Vec::new(),
            acks: Vec::new(),
            delivered: Vec::new(),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> bool {
        self.sender.write(data, &mut self.data)
    }

    /// Deliver queued fragments in the given order, then every ack
    pub fn deliver_in_order(&mut self, order: &[usize]) {
        let packets = std::mem::take(&mut self.data);
        for &index in order {
            self.receiver
                .on_packet(&packets[index], &mut self.acks, &mut self.delivered)
                .expect("sender writes well-formed fragments");
        }
        self.flush_acks();
    }

    /// Deliver every queued fragment as sent, then every ack
    pub fn deliver_all(&mut self) {
        let order: Vec<usize> = (0..self.data.len()).collect();
        self.deliver_in_order(&order);
    }

    pub fn flush_acks(&mut self) {
        for ack in std::mem::take(&mut self.acks) {
            // Stale acks come back as Ok(false)
            self.sender
                .on_ack(&ack)
                .expect("receiver writes well-formed acks");
        }
    }

    pub fn received(&self) -> Vec<u8> {
        concat(&self.delivered)
    }
}
