//! Named transfer scenarios
//!
//! A scenario pairs a link fault model with a list of writes and a deadline.
//! The standard suite covers a perfect link, fragmentation, backpressure,
//! heavy loss, reordering and corruption.

use crate::app::TestApplication;
use crate::link::LinkConfig;
use crate::simulation::{SimError, SimReport, Simulation};
use arq_protocol::ProtocolConfig;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

/// The writes a scenario performs: `payload`, written `repeat` times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSpec {
    pub payload: String,
    #[serde(default = "default_repeat")]
    pub repeat: usize,
}

fn default_repeat() -> usize {
    1
}

impl MessageSpec {
    pub fn new(payload: impl Into<String>, repeat: usize) -> Self {
        MessageSpec {
            payload: payload.into(),
            repeat,
        }
    }

    /// One message per write
    pub fn messages(&self) -> Vec<Bytes> {
        let payload = Bytes::from(self.payload.clone().into_bytes());
        vec![payload; self.repeat]
    }

    /// Total bytes written
    pub fn total_bytes(&self) -> usize {
        self.payload.len() * self.repeat
    }
}

/// A named transfer over a simulated network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Ticks allowed before the transfer fails
    pub timeout: u64,
    pub link: LinkConfig,
    pub messages: MessageSpec,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        link: LinkConfig,
        messages: MessageSpec,
        timeout: u64,
    ) -> Self {
        Scenario {
            name: name.into(),
            timeout,
            link,
            messages,
        }
    }

    /// Build a simulation for this scenario. The protocol MTU follows the link.
    pub fn simulation(&self) -> Result<Simulation, SimError> {
        let protocol = ProtocolConfig::with_mtu(self.link.mtu);
        let app = TestApplication::new(self.messages.messages(), self.timeout);
        Simulation::new(protocol, self.link.clone(), app)
    }

    /// Run the scenario to completion
    pub fn run(&self) -> Result<SimReport, SimError> {
        info!(scenario = %self.name, bytes = self.messages.total_bytes(), "Running scenario");
        let mut simulation = self.simulation()?;
        Ok(simulation.run())
    }
}

/// Outcome of one scenario in a suite
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    /// `Err` only when the scenario could not be set up
    pub report: Result<SimReport, SimError>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        matches!(&self.report, Ok(report) if report.is_success())
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&SimError> {
        match &self.report {
            Ok(report) => report.outcome.as_ref().err(),
            Err(err) => Some(err),
        }
    }
}

/// Run every scenario in order
pub fn run_suite(scenarios: &[Scenario]) -> Vec<ScenarioResult> {
    scenarios
        .iter()
        .map(|scenario| ScenarioResult {
            name: scenario.name.clone(),
            report: scenario.run(),
        })
        .collect()
}

/// The reference set of transfers
pub fn standard_suite() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "Transfer one byte over reliable network",
            LinkConfig::new(0),
            MessageSpec::new("f", 1),
            10,
        ),
        Scenario::new(
            "One kilobyte write",
            LinkConfig::new(0),
            MessageSpec::new("z".repeat(100), 1),
            10,
        ),
        Scenario::new(
            "Many small writes",
            LinkConfig::new(0),
            MessageSpec::new("f", 1024),
            10,
        ),
        Scenario::new(
            "Write bigger than mtu",
            LinkConfig::new(0),
            MessageSpec::new("f".repeat(2000), 1),
            10,
        ),
        Scenario::new(
            "One byte over network with huge packet loss",
            LinkConfig::new(1).with_loss(0.9),
            MessageSpec::new("f", 1),
            1000,
        ),
        Scenario::new(
            "Network with packet reordering",
            LinkConfig::new(20).with_mtu(50).with_reorder(10),
            MessageSpec::new("test", 10),
            1000,
        ),
        Scenario::new(
            "Network with data corruption",
            LinkConfig::new(20).with_mtu(50).with_corruption(0.9),
            MessageSpec::new("test", 10),
            1000,
        ),
        Scenario::new(
            "Network with small packet loss",
            LinkConfig::new(1).with_mtu(100).with_loss(0.05),
            MessageSpec::new("test", 10),
            1000,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> Scenario {
        standard_suite()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[test]
    fn test_message_spec() {
        let spec = MessageSpec::new("test", 3);
        assert_eq!(spec.messages().len(), 3);
        assert_eq!(spec.total_bytes(), 12);
    }

    #[test]
    fn test_standard_suite_names_unique() {
        let suite = standard_suite();
        assert_eq!(suite.len(), 8);
        for (i, a) in suite.iter().enumerate() {
            assert!(suite[i + 1..].iter().all(|b| b.name != a.name));
        }
    }

    #[test]
    fn test_reliable_scenarios_pass() {
        for name in [
            "Transfer one byte over reliable network",
            "One kilobyte write",
            "Many small writes",
            "Write bigger than mtu",
        ] {
            let report = find(name).run().unwrap();
            assert!(report.is_success(), "{name}: {:?}", report.outcome);
            assert!(report.ticks <= 10);
        }
    }

    #[test]
    fn test_reordering_scenario_passes() {
        let report = find("Network with packet reordering").run().unwrap();
        assert!(report.is_success(), "{:?}", report.outcome);
        assert_eq!(report.bytes_delivered, 40);
    }

    #[test]
    fn test_many_small_writes_hit_backpressure() {
        let report = find("Many small writes").run().unwrap();
        assert!(report.sender.writes_rejected > 0);
        assert_eq!(report.sender.writes_accepted, 1024);
    }

    #[test]
    fn test_run_suite_reports_each_case() {
        let suite: Vec<Scenario> = standard_suite().into_iter().take(2).collect();
        let results = run_suite(&suite);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed() && r.error().is_none()));
    }

    #[test]
    fn test_unusable_mtu_reported_as_setup_error() {
        let scenario = Scenario::new(
            "tiny",
            LinkConfig::new(0).with_mtu(8),
            MessageSpec::new("x", 1),
            10,
        );
        let results = run_suite(&[scenario]);

        assert!(!results[0].passed());
        assert!(matches!(results[0].error(), Some(SimError::Config(_))));
    }
}
