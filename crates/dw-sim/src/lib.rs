//! Dual writer simulator
//!
//! Rehearses a mode change against two in-memory stores before it is made
//! against real ones.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod simulator;

pub use simulator::{
    participating_backends, run_simulator, BackendLatency, MethodOutcome, OperationCount,
    SimulatorConfig, SimulatorReport,
};
