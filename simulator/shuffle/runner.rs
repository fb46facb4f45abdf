// Shuffle Simulation Runner

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

use gs_rust::gs_interface::{EventSink, Message, MessageEnvelope, PeerId};
use gs_rust::gs_node::GsNode;

use super::config::{ShuffleSimConfig, TopologyMode};
use super::event_sink::{ConsoleEventSink, CsvEventSink, SharedSink};
use super::stats::{
    DegreeStats, MessageCounts, OverlaySnapshot, RoundMetrics, SimulationResult,
};

/// Simulation runner that drives a population of shuffling nodes through
/// synchronous rounds over a lossy, delaying network.
pub struct ShuffleSimRunner {
    config: ShuffleSimConfig,
    rng: StdRng,
    // Metric sampling draws from its own stream so that toggling metrics on
    // or off never shifts the protocol's randomness for a given seed.
    metrics_rng: StdRng,
    seed_used: [u8; 32],
    nodes: IndexMap<PeerId, GsNode>,
    messages: Vec<MessageEnvelope>,
    csv_sink: Option<Rc<RefCell<CsvEventSink>>>,

    // Statistics tracking
    message_count: usize,
    message_counters: MessageCounts,
    metrics_history: Vec<RoundMetrics>,
}

impl ShuffleSimRunner {
    /// Create a new simulation runner with the given configuration
    pub fn new(config: ShuffleSimConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });

        let mut rng = StdRng::from_seed(seed);
        let metrics_rng = StdRng::from_seed(seed);

        // Create peer IDs
        let peers: Vec<PeerId> = (0..config.num_peers).map(|_| rng.next_u64()).collect();

        let csv_sink = match &config.csv_output_path {
            Some(path) => match CsvEventSink::new(path) {
                Ok(sink) => Some(Rc::new(RefCell::new(sink))),
                Err(e) => {
                    eprintln!("Warning: could not open event log {}: {}", path, e);
                    None
                }
            },
            None => None,
        };

        // Create nodes with topology
        let mut nodes: IndexMap<PeerId, GsNode> = IndexMap::with_capacity(peers.len());
        for (index, peer_id) in peers.iter().enumerate() {
            let event_sink: Box<dyn EventSink> = match &csv_sink {
                Some(sink) => Box::new(SharedSink::new(Rc::clone(sink))),
                None => Box::new(ConsoleEventSink::new(config.enable_event_logging)),
            };
            let mut node = GsNode::new_with_sink(*peer_id, 0, config.protocol_config(), event_sink);

            // Apply topology configuration
            Self::apply_topology(&mut node, index, &peers, &config.topology, &mut rng);

            nodes.insert(*peer_id, node);
        }

        Self {
            config,
            rng,
            metrics_rng,
            seed_used: seed,
            nodes,
            messages: Vec::new(),
            csv_sink,
            message_count: 0,
            message_counters: MessageCounts::default(),
            metrics_history: Vec::new(),
        }
    }

    fn apply_topology(
        node: &mut GsNode,
        index: usize,
        peers: &[PeerId],
        topology: &TopologyMode,
        rng: &mut StdRng,
    ) {
        match topology {
            TopologyMode::FullyConnected => {
                // random order, so a cache too small for the population still
                // ends up with an unbiased selection
                for peer in peers.choose_multiple(rng, peers.len()) {
                    node.add_neighbor(*peer);
                }
            }
            TopologyMode::Random { connectivity } => {
                let num_links = (peers.len() as f64 * connectivity) as usize;
                for peer in peers.choose_multiple(rng, num_links) {
                    node.add_neighbor(*peer);
                }
            }
            TopologyMode::Ring { neighbors } => {
                let n = peers.len();
                if n < 2 {
                    return;
                }
                for offset in 1..=*neighbors {
                    let offset = offset % n;
                    node.add_neighbor(peers[(index + offset) % n]);
                    node.add_neighbor(peers[(index + n - offset) % n]);
                }
            }
            TopologyMode::Star => {
                // first peer is the hub; its own add is refused, leaving it
                // with an empty cache until requests start arriving
                if let Some(hub) = peers.first() {
                    node.add_neighbor(*hub);
                }
            }
        }
    }

    /// Run the complete simulation and return results
    pub fn run(&mut self) -> SimulationResult {
        let interval = self.config.metrics.sample_interval;

        for i in 0..self.config.rounds {
            self.step();

            let round = i + 1;
            if interval > 0 && round % interval == 0 && round != self.config.rounds {
                self.sample_metrics(round);
            }
        }

        self.sample_metrics(self.config.rounds);

        if let Some(sink) = &self.csv_sink {
            if let Err(e) = sink.borrow_mut().flush() {
                eprintln!("Warning: could not flush event log: {}", e);
            }
        }

        self.build_result()
    }

    fn step(&mut self) {
        let mut next: Vec<MessageEnvelope> = Vec::new();

        // Process messages with network simulation
        let number_of_messages = self.messages.len();
        if number_of_messages > 0 {
            self.messages.shuffle(&mut self.rng);

            // Delay: push a fraction to next round
            let delay_count =
                (number_of_messages as f64 * self.config.network.delay_fraction) as usize;
            let delivered = number_of_messages - delay_count;
            next.extend_from_slice(&self.messages[delivered..]);

            // Loss: drop a fraction of what remains
            let loss_count = (delivered as f64 * self.config.network.loss_fraction) as usize;
            self.messages.truncate(delivered - loss_count);
        }

        // Deliver messages
        for m in &self.messages {
            if let Some(node) = self.nodes.get_mut(&m.receiver) {
                match m.message {
                    Message::ShuffleRequest { .. } => self.message_counters.requests += 1,
                    Message::ShuffleReply { .. } => self.message_counters.replies += 1,
                    Message::ShuffleRejected => self.message_counters.rejects += 1,
                };
                node.handle_message(m, &mut self.rng, &mut next);
            }
        }

        // Tick all nodes
        for (_, node) in &mut self.nodes {
            node.tick(&mut self.rng, &mut next);
        }

        self.message_count += self.messages.len();
        self.messages.clear();
        self.messages.append(&mut next);
    }

    /// Capture every node's cache contents and waiting flag.
    pub fn snapshot(&self) -> OverlaySnapshot {
        let mut snapshot = OverlaySnapshot::new();
        for (peer_id, node) in &self.nodes {
            snapshot.record_node(
                *peer_id,
                node.neighbors().collect(),
                node.is_awaiting_response(),
            );
        }
        snapshot
    }

    pub fn nodes(&self) -> &IndexMap<PeerId, GsNode> {
        &self.nodes
    }

    pub fn seed_used(&self) -> [u8; 32] {
        self.seed_used
    }

    fn sample_metrics(&mut self, round: usize) {
        let snapshot = self.snapshot();
        let in_degrees = snapshot.in_degrees();
        let paths = snapshot.sample_path_lengths(
            self.config.metrics.path_length_samples,
            &mut self.metrics_rng,
        );

        self.metrics_history.push(RoundMetrics {
            round,
            in_degree: DegreeStats::from_counts(&in_degrees),
            cache_fill: DegreeStats::from_counts(&snapshot.cache_fills()),
            avg_clustering: snapshot.avg_clustering(),
            paths,
            nodes_waiting: snapshot.nodes_waiting(),
            messages_in_flight: self.messages.len(),
        });
    }

    fn build_result(&self) -> SimulationResult {
        let config_summary = format!(
            "{} peers, cache {}, shuffle length {}, topology {:?}",
            self.config.num_peers,
            self.config.cache_size,
            self.config.shuffle_length,
            self.config.topology
        );

        SimulationResult {
            config_summary,
            seed_used: self.seed_used,
            total_rounds: self.config.rounds,
            num_peers: self.config.num_peers,
            final_metrics: self.metrics_history.last().cloned().unwrap_or_default(),
            metrics_history: self.metrics_history.clone(),
            in_degree_histogram: self.snapshot().in_degree_histogram(),
            message_counts: self.message_counters,
            total_messages: self.message_count,
        }
    }
}
