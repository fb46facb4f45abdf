//! # Shuffle Simulator
//!
//! This module provides a simulation framework for testing the gossip shuffle
//! protocol. It allows configurable bootstrap topologies, network conditions,
//! and overlay metric sampling for comprehensive testing and analysis.
//!
//! This is a standalone testing tool that uses the core `gs_rust` library.
//!
//! ## Example
//!
//! See `simulator/basic_shuffle_sim.rs` for a complete example.

mod config;
mod event_sink;
mod runner;
mod stats;

pub use config::{MetricsConfig, NetworkConfig, ShuffleSimConfig, TopologyMode};
pub use event_sink::{ConsoleEventSink, CsvEventSink, SharedSink};
pub use runner::ShuffleSimRunner;
pub use stats::{
    DegreeStats, MessageCounts, OverlaySnapshot, PathLengthSample, RoundMetrics, SimulationResult,
};
