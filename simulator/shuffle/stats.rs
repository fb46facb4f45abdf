// Shuffle Simulator Statistics
//
// Overlay health analysis over a snapshot of every node's cache: in-degree
// distribution, cache fill, clustering, sampled path lengths. These are the
// quantities the shuffle protocol is supposed to keep healthy, so they are
// what the simulator reports.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use hashbrown::{HashMap, HashSet};
use rand::seq::SliceRandom;
use rand::Rng;

use gs_rust::PeerId;

// ============================================================================
// Overlay Snapshot
// ============================================================================

/// A directed snapshot of the overlay at one point in time: each node's cache
/// contents, plus how many nodes are stuck waiting for a shuffle response.
#[derive(Debug, Clone, Default)]
pub struct OverlaySnapshot {
    adjacency: HashMap<PeerId, Vec<PeerId>>,
    ids: Vec<PeerId>,
    waiting: usize,
}

impl OverlaySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one node's state.
    pub fn record_node(&mut self, id: PeerId, neighbors: Vec<PeerId>, awaiting: bool) {
        self.ids.push(id);
        self.adjacency.insert(id, neighbors);
        if awaiting {
            self.waiting += 1;
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.ids.len()
    }

    pub fn nodes_waiting(&self) -> usize {
        self.waiting
    }

    /// In-degree of every node (how many caches reference it), in recording
    /// order.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut counts: HashMap<PeerId, usize> = HashMap::with_capacity(self.ids.len());
        for neighbors in self.adjacency.values() {
            for neighbor in neighbors {
                *counts.entry(*neighbor).or_insert(0) += 1;
            }
        }

        self.ids
            .iter()
            .map(|id| counts.get(id).copied().unwrap_or(0))
            .collect()
    }

    /// Nodes per in-degree value: `histogram[d]` is the number of nodes that
    /// are referenced by exactly `d` caches. This is the distribution the
    /// original shuffle experiments plot.
    pub fn in_degree_histogram(&self) -> Vec<usize> {
        let degrees = self.in_degrees();
        let max = match degrees.iter().max() {
            Some(max) => *max,
            None => return Vec::new(),
        };

        let mut histogram = vec![0usize; max + 1];
        for degree in degrees {
            histogram[degree] += 1;
        }

        histogram
    }

    /// Cache fill (out-degree) of every node, in recording order.
    pub fn cache_fills(&self) -> Vec<usize> {
        self.ids
            .iter()
            .map(|id| self.adjacency.get(id).map(|n| n.len()).unwrap_or(0))
            .collect()
    }

    /// Average directed clustering coefficient: for each node, the fraction
    /// of ordered neighbor pairs (a, b) where a's cache also references b.
    /// Nodes with fewer than two neighbors contribute zero.
    pub fn avg_clustering(&self) -> f64 {
        if self.ids.is_empty() {
            return 0.0;
        }

        let edge_sets: HashMap<PeerId, HashSet<PeerId>> = self
            .adjacency
            .iter()
            .map(|(id, neighbors)| (*id, neighbors.iter().copied().collect()))
            .collect();

        let mut total = 0.0;
        for neighbors in self.adjacency.values() {
            let k = neighbors.len();
            if k < 2 {
                continue;
            }

            let mut linked = 0usize;
            for a in neighbors {
                if let Some(edges_of_a) = edge_sets.get(a) {
                    for b in neighbors {
                        if a != b && edges_of_a.contains(b) {
                            linked += 1;
                        }
                    }
                }
            }

            total += linked as f64 / (k * (k - 1)) as f64;
        }

        total / self.ids.len() as f64
    }

    /// BFS from up to `sources` randomly drawn nodes, following cache edges.
    /// Averages shortest-path length over all reached pairs and reports which
    /// fraction of pairs was reachable at all.
    pub fn sample_path_lengths<R: Rng>(&self, sources: usize, rng: &mut R) -> PathLengthSample {
        let n = self.ids.len();
        if n < 2 || sources == 0 {
            return PathLengthSample::default();
        }

        let picked: Vec<PeerId> = self
            .ids
            .choose_multiple(rng, sources.min(n))
            .copied()
            .collect();

        let mut total_hops = 0u64;
        let mut reached_pairs = 0u64;
        for source in &picked {
            let mut distance: HashMap<PeerId, u64> = HashMap::new();
            let mut queue = VecDeque::new();
            distance.insert(*source, 0);
            queue.push_back(*source);

            while let Some(current) = queue.pop_front() {
                let hops = distance[&current];
                if let Some(neighbors) = self.adjacency.get(&current) {
                    for next in neighbors {
                        if !distance.contains_key(next) {
                            distance.insert(*next, hops + 1);
                            queue.push_back(*next);
                        }
                    }
                }
            }

            total_hops += distance.values().sum::<u64>();
            reached_pairs += (distance.len() - 1) as u64;
        }

        let possible_pairs = (picked.len() * (n - 1)) as u64;
        PathLengthSample {
            avg_path_length: if reached_pairs > 0 {
                total_hops as f64 / reached_pairs as f64
            } else {
                0.0
            },
            reachable_fraction: reached_pairs as f64 / possible_pairs as f64,
        }
    }
}

/// Result of a sampled BFS sweep over the overlay. An overlay with fewer
/// than two nodes yields zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathLengthSample {
    /// Mean shortest-path length over all reached (source, target) pairs
    pub avg_path_length: f64,

    /// Fraction of sampled (source, target) pairs that were reachable
    pub reachable_fraction: f64,
}

// ============================================================================
// Degree Statistics
// ============================================================================

/// Min/max/mean/stddev summary of a per-node count
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub stddev: f64,
}

impl DegreeStats {
    pub fn from_counts(counts: &[usize]) -> Self {
        if counts.is_empty() {
            return Self::default();
        }

        let min = counts.iter().min().copied().unwrap_or(0);
        let max = counts.iter().max().copied().unwrap_or(0);
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        let variance = counts
            .iter()
            .map(|&count| {
                let delta = count as f64 - mean;
                delta * delta
            })
            .sum::<f64>()
            / counts.len() as f64;

        Self {
            min,
            max,
            mean,
            stddev: variance.sqrt(),
        }
    }
}

// ============================================================================
// Round Metrics
// ============================================================================

/// Metrics sampled at a single round
#[derive(Debug, Clone, Default)]
pub struct RoundMetrics {
    /// Round number (1-based; the final sample carries the total round count)
    pub round: usize,

    /// In-degree spread: how evenly nodes are referenced by other caches
    pub in_degree: DegreeStats,

    /// Cache fill spread (out-degree)
    pub cache_fill: DegreeStats,

    /// Average directed clustering coefficient
    pub avg_clustering: f64,

    /// Sampled shortest-path statistics
    pub paths: PathLengthSample,

    /// Nodes stuck waiting for a shuffle response
    pub nodes_waiting: usize,

    /// Messages still in flight when the sample was taken
    pub messages_in_flight: usize,
}

/// Per-variant counts of delivered protocol messages
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCounts {
    pub requests: usize,
    pub replies: usize,
    pub rejects: usize,
}

impl MessageCounts {
    pub fn total(&self) -> usize {
        self.requests + self.replies + self.rejects
    }
}

// ============================================================================
// Simulation Result
// ============================================================================

/// Complete simulation result
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// One-line configuration description
    pub config_summary: String,

    /// Random seed used
    pub seed_used: [u8; 32],

    /// Total rounds executed
    pub total_rounds: usize,

    /// Number of peers simulated
    pub num_peers: usize,

    /// Metrics at the end of the run
    pub final_metrics: RoundMetrics,

    /// Historical metrics (sampled at intervals, ending with the final round)
    pub metrics_history: Vec<RoundMetrics>,

    /// Nodes per in-degree value at the end of the run
    pub in_degree_histogram: Vec<usize>,

    /// Delivered messages by variant
    pub message_counts: MessageCounts,

    /// Total messages delivered
    pub total_messages: usize,
}

impl SimulationResult {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║    SHUFFLE SIMULATION RESULTS                          ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration: {}", self.config_summary);
        println!("Rounds: {}", self.total_rounds);
        println!();

        let metrics = &self.final_metrics;
        println!("═══ Overlay Health ═══");
        println!(
            "  In-degree: min={}, max={}, avg={:.1}, stddev={:.2}",
            metrics.in_degree.min,
            metrics.in_degree.max,
            metrics.in_degree.mean,
            metrics.in_degree.stddev
        );
        println!(
            "  Cache fill: min={}, max={}, avg={:.1}",
            metrics.cache_fill.min, metrics.cache_fill.max, metrics.cache_fill.mean
        );
        println!("  Clustering coefficient: {:.4}", metrics.avg_clustering);
        println!(
            "  Avg path length: {:.2} (reachable {:.1}%)",
            metrics.paths.avg_path_length,
            metrics.paths.reachable_fraction * 100.0
        );
        println!("  Nodes awaiting response: {}", metrics.nodes_waiting);
        println!();

        println!("═══ Message Overhead ═══");
        println!("  Total Delivered: {}", self.total_messages);
        println!("  Requests: {}", self.message_counts.requests);
        println!("  Replies: {}", self.message_counts.replies);
        println!("  Rejects: {}", self.message_counts.rejects);
        if self.num_peers > 0 && self.total_rounds > 0 {
            println!(
                "  Per Peer/Round: {:.2}",
                self.total_messages as f64 / (self.num_peers * self.total_rounds) as f64
            );
        }
        println!();

        println!("═══ In-Degree Distribution ═══");
        println!("  {:?}", self.in_degree_histogram);
        println!();
    }

    /// Write the sampled metrics history as CSV for external plotting.
    pub fn export_metrics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "round,in_degree_min,in_degree_max,in_degree_mean,in_degree_stddev,\
             cache_fill_mean,clustering,avg_path_length,reachable_fraction,\
             nodes_waiting,messages_in_flight"
        )?;

        for m in &self.metrics_history {
            writeln!(
                writer,
                "{},{},{},{:.4},{:.4},{:.4},{:.6},{:.4},{:.6},{},{}",
                m.round,
                m.in_degree.min,
                m.in_degree.max,
                m.in_degree.mean,
                m.in_degree.stddev,
                m.cache_fill.mean,
                m.avg_clustering,
                m.paths.avg_path_length,
                m.paths.reachable_fraction,
                m.nodes_waiting,
                m.messages_in_flight
            )?;
        }

        writer.flush()
    }
}
