//! # gsRust - Basic Shuffling Peer Sampling
//!
//! A Rust implementation of the basic shuffling gossip protocol. Every node
//! keeps a small, bounded cache of neighbor references and periodically
//! trades a random subset of it with one randomly chosen neighbor, keeping a
//! large overlay connected with only constant-size local state.
//!
//! ## Core Components
//!
//! - **GsNode**: the shuffle engine, one per overlay node, handling the
//!   initiator path, the responder path and the cache merge
//! - **Cache/Entry**: bounded duplicate-free neighbor store with disclosure
//!   bookkeeping
//! - **Message/MessageEnvelope**: the three-variant exchange protocol
//!   (request, reply, reject) and its addressing wrapper
//!
//! ## Usage with Network Layer
//!
//! This library provides network-agnostic protocol components. You need to:
//! 1. Implement your network transport layer
//! 2. Create GsNode instances for each peer and seed them via `add_neighbor`
//! 3. Route MessageEnvelope between nodes via your network
//! 4. Call `node.tick()` once per round and `node.handle_message()` as
//!    messages arrive
//!
//! ```no_run
//! use gs_rust::{GsNode, ShuffleConfig};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let mut node = GsNode::new(12345u64, 0, ShuffleConfig::default());
//! node.add_neighbor(67890);
//!
//! // In your network event loop:
//! // - Call node.tick(&mut rng, &mut outgoing) once per round
//! // - Call node.handle_message(&incoming, &mut rng, &mut outgoing) per message
//! // - Send everything collected in `outgoing` via your network layer
//! let mut outgoing = Vec::new();
//! node.tick(&mut rng, &mut outgoing);
//! ```
//!
//! ## Testing and Simulation
//!
//! For exercising the protocol without a real network, see the simulation
//! framework in `simulator/`. It provides configurable round-based runs with
//! message delay and loss, overlay health metrics and YAML scenario files.

// Core protocol modules
pub mod gs_cache;
pub mod gs_interface;
pub mod gs_node;

// Re-export commonly used types
pub use gs_cache::{Cache, Entry};
pub use gs_interface::{
    Event, EventSink, GsTime, MergeOutcome, Message, MessageEnvelope, NoOpSink, PeerId,
};
pub use gs_node::{GsNode, ShuffleConfig, ShuffleState};
