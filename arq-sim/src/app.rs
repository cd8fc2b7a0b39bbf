//! Scripted application endpoint
//!
//! Offers a fixed list of messages to the sender, one tick at a time, and
//! records every byte the receiver releases. [`TestApplication::check`] turns
//! what it has seen so far into a pass/fail/wait verdict. A write the sender
//! refuses for lack of ids is offered again next tick; one it can never accept
//! fails the transfer immediately.

use crate::simulation::SimError;
use arq_protocol::{Application, Link, SendError, Sender};
use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Verdict after a tick
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// Transfer still in progress
    Wait,
    /// Every byte arrived intact
    Finish,
    /// Transfer failed
    Error(SimError),
}

impl Check {
    pub fn is_done(&self) -> bool {
        !matches!(self, Check::Wait)
    }
}

/// Application that writes queued messages and verifies what comes back
pub struct TestApplication {
    /// Concatenation of every message
    expected: Vec<u8>,
    /// Messages not yet accepted by the sender
    queued: VecDeque<Bytes>,
    /// Bytes delivered so far
    received: Vec<u8>,
    /// Number of `on_data` calls
    deliveries: u64,
    /// Ticks seen
    time: u64,
    /// Ticks allowed before the transfer counts as failed
    timeout: u64,
    /// Write the sender refused permanently
    refused: Option<SendError>,
}

impl TestApplication {
    pub fn new(messages: Vec<Bytes>, timeout: u64) -> Self {
        let expected = messages.iter().flat_map(|m| m.iter().copied()).collect();

        TestApplication {
            expected,
            queued: messages.into(),
            received: Vec::new(),
            deliveries: 0,
            time: 0,
            timeout,
            refused: None,
        }
    }

    /// Advance one tick and offer queued messages until the sender refuses one
    ///
    /// Returns the number of messages accepted this tick.
    pub fn on_tick<L: Link + ?Sized>(&mut self, sender: &mut Sender, link: &mut L) -> usize {
        self.time += 1;

        let mut accepted = 0;
        while self.refused.is_none() {
            let Some(message) = self.queued.front() else {
                break;
            };
            match sender.try_write(message, link) {
                Ok(_) => {
                    trace!(len = message.len(), "Sender accepted data");
                    self.queued.pop_front();
                    accepted += 1;
                }
                Err(SendError::PoolExhausted { .. }) => {
                    debug!(
                        len = message.len(),
                        queued = self.queued.len(),
                        "Sender rejected data, will try again next tick"
                    );
                    break;
                }
                Err(err) => {
                    warn!(%err, len = message.len(), "Sender refused data permanently");
                    self.refused = Some(err);
                }
            }
        }
        accepted
    }

    /// Compare what has arrived against what was sent
    pub fn check(&self) -> Check {
        if let Some(err) = &self.refused {
            return Check::Error(SimError::WriteRefused(err.clone()));
        }

        if self.time > self.timeout {
            return Check::Error(SimError::Timeout {
                timeout: self.timeout,
                received: self.received.len(),
                expected: self.expected.len(),
            });
        }

        if let Some(offset) = self.first_mismatch() {
            return Check::Error(SimError::DataMismatch {
                offset,
                received: self.received.len(),
            });
        }

        if self.received.len() == self.expected.len() {
            Check::Finish
        } else {
            Check::Wait
        }
    }

    fn first_mismatch(&self) -> Option<usize> {
        if self.received.len() > self.expected.len() {
            return Some(self.expected.len());
        }
        self.received
            .iter()
            .zip(self.expected.iter())
            .position(|(got, want)| got != want)
    }

    /// Bytes delivered so far
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Bytes the application intends to transfer
    pub fn expected(&self) -> &[u8] {
        &self.expected
    }

    /// Messages still waiting to be accepted by the sender
    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    pub fn time(&self) -> u64 {
        self.time
    }
}

impl Application for TestApplication {
    fn on_data(&mut self, data: Bytes) -> bool {
        trace!(len = data.len(), "Application received data");
        self.received.extend_from_slice(&data);
        self.deliveries += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_protocol::ProtocolConfig;

    fn messages(parts: &[&'static str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from_static(p.as_bytes())).collect()
    }

    #[test]
    fn test_wait_then_finish() {
        let mut app = TestApplication::new(messages(&["ab", "c"]), 10);
        assert_eq!(app.check(), Check::Wait);

        app.on_data(Bytes::from_static(b"ab"));
        assert_eq!(app.check(), Check::Wait);

        app.on_data(Bytes::from_static(b"c"));
        assert_eq!(app.check(), Check::Finish);
        assert_eq!(app.deliveries(), 2);
    }

    #[test]
    fn test_mismatch_detected() {
        let mut app = TestApplication::new(messages(&["abc"]), 10);
        app.on_data(Bytes::from_static(b"ax"));

        assert_eq!(
            app.check(),
            Check::Error(SimError::DataMismatch {
                offset: 1,
                received: 2
            })
        );
    }

    #[test]
    fn test_extra_bytes_are_a_mismatch() {
        let mut app = TestApplication::new(messages(&["a"]), 10);
        app.on_data(Bytes::from_static(b"ab"));

        assert!(matches!(
            app.check(),
            Check::Error(SimError::DataMismatch { offset: 1, .. })
        ));
    }

    #[test]
    fn test_timeout() {
        let mut app = TestApplication::new(messages(&["a"]), 1);
        let mut sender = Sender::new(ProtocolConfig::default()).unwrap();
        let mut link: Vec<Bytes> = Vec::new();

        app.on_tick(&mut sender, &mut link);
        assert_eq!(app.check(), Check::Wait);
        app.on_tick(&mut sender, &mut link);
        assert!(matches!(app.check(), Check::Error(SimError::Timeout { .. })));
    }

    #[test]
    fn test_offers_until_rejected() {
        let config = ProtocolConfig {
            pool_size: 4,
            ..ProtocolConfig::default()
        };
        let mut sender = Sender::new(config).unwrap();
        let mut link: Vec<Bytes> = Vec::new();
        let mut app = TestApplication::new(messages(&["1", "2", "3", "4"]), 10);

        // Window of 2 ids: two messages go out, the third waits
        assert_eq!(app.on_tick(&mut sender, &mut link), 2);
        assert_eq!(app.queued(), 2);
        assert_eq!(link.len(), 2);
    }

    #[test]
    fn test_stops_offering_after_permanent_refusal() {
        let config = ProtocolConfig {
            mtu: 13,
            pool_size: 4,
            ..ProtocolConfig::default()
        };
        let mut sender = Sender::new(config).unwrap();
        let mut link: Vec<Bytes> = Vec::new();
        let mut app = TestApplication::new(messages(&["1", "234", "5"]), 10);

        assert_eq!(app.on_tick(&mut sender, &mut link), 1);
        assert_eq!(
            app.check(),
            Check::Error(SimError::WriteRefused(SendError::WriteTooLarge {
                needed: 3,
                window: 2
            }))
        );

        // The refused message is not offered again
        assert_eq!(app.on_tick(&mut sender, &mut link), 0);
        assert_eq!(app.queued(), 2);
        assert_eq!(sender.stats().writes_rejected, 1);
        assert_eq!(link.len(), 1);
    }
}
