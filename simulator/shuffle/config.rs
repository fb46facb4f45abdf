// Shuffle Simulator Configuration

use gs_rust::ShuffleConfig;

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration for a shuffle overlay simulation
#[derive(Debug, Clone)]
pub struct ShuffleSimConfig {
    /// Total number of simulation rounds
    pub rounds: usize,

    /// Number of peers in the overlay
    pub num_peers: usize,

    /// Random seed for reproducibility
    pub seed: Option<[u8; 32]>,

    /// Maximum cache size per node
    pub cache_size: usize,

    /// Maximum shuffle exchange length `l`
    pub shuffle_length: usize,

    /// How peers initially know each other
    pub topology: TopologyMode,

    /// Network simulation parameters
    pub network: NetworkConfig,

    /// Metrics sampling configuration
    pub metrics: MetricsConfig,

    /// Enable console event logging
    pub enable_event_logging: bool,

    /// CSV output file for per-exchange events
    pub csv_output_path: Option<String>,
}

impl ShuffleSimConfig {
    /// The protocol parameters handed to every node.
    pub fn protocol_config(&self) -> ShuffleConfig {
        ShuffleConfig {
            cache_size: self.cache_size,
            shuffle_length: self.shuffle_length,
        }
    }
}

// ============================================================================
// Topology
// ============================================================================

/// Topology modes for overlay bootstrap
#[derive(Debug, Clone, serde::Deserialize)]
pub enum TopologyMode {
    /// Every node is seeded with every other node (bounded by cache capacity)
    FullyConnected,

    /// Random connections with specified connectivity (0.0 to 1.0)
    Random { connectivity: f64 },

    /// Ring topology with N neighbors on each side
    Ring { neighbors: usize },

    /// Every node starts knowing only a single hub node
    Star,
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Network behavior simulation
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Fraction of messages delayed to next round (0.0 to 1.0)
    pub delay_fraction: f64,

    /// Fraction of messages dropped (0.0 to 1.0)
    pub loss_fraction: f64,
}

// ============================================================================
// Metrics Configuration
// ============================================================================

/// Configuration for overlay health sampling
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// How often to sample metrics (every N rounds, 0 disables sampling)
    pub sample_interval: usize,

    /// Number of BFS sources used to estimate the average path length
    pub path_length_samples: usize,
}

// ============================================================================
// Default Implementations
// ============================================================================

impl Default for ShuffleSimConfig {
    fn default() -> Self {
        let protocol = ShuffleConfig::default();

        Self {
            rounds: 500,
            num_peers: 100,
            seed: None,
            cache_size: protocol.cache_size,
            shuffle_length: protocol.shuffle_length,
            topology: TopologyMode::default(),
            network: NetworkConfig::default(),
            metrics: MetricsConfig::default(),
            enable_event_logging: false,
            csv_output_path: None,
        }
    }
}

impl Default for TopologyMode {
    fn default() -> Self {
        Self::Ring { neighbors: 1 }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            delay_fraction: 0.3,
            loss_fraction: 0.01,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: 10,
            path_length_samples: 16,
        }
    }
}
