//! Tooling
//!
//! Command-line entry points and the rescue robot simulation they drive.

pub mod cli;
pub mod simulation;

pub use cli::{Cli, CliContext, Commands};
pub use simulation::{run_simulation, RescueRobot, SensorFeed, SimulationReport};
