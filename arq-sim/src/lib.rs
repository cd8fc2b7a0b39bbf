//! Deterministic Network Simulation
//!
//! Drives an ARQ sender and receiver over simulated links that lose, delay,
//! reorder and corrupt packets. Time advances in discrete ticks and every
//! random decision comes from a seeded RNG, so a scenario always plays out
//! the same way.

pub mod app;
pub mod link;
pub mod network;
pub mod scenario;
pub mod simulation;

pub use app::{Check, TestApplication};
pub use link::{LinkConfig, LinkStats, SimLink, DEFAULT_SEED};
pub use network::SimNetwork;
pub use scenario::{run_suite, standard_suite, MessageSpec, Scenario, ScenarioResult};
pub use simulation::{SimError, SimReport, Simulation};
