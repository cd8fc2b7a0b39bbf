//! ARQ - reliable ordered byte stream over a lossy link
//!
//! High-level entry point re-exporting the protocol core and the
//! deterministic network simulator.

pub use arq_protocol as protocol;
pub use arq_sim as sim;

// Re-export commonly used types
pub use protocol::{Application, Link, ProtocolConfig, Receipt, Receiver, Sender};
pub use sim::{LinkConfig, Scenario, SimReport, Simulation};
