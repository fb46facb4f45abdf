//! In-degree distribution experiment
//!
//! Starts a large population in a star around a single hub node, the worst
//! case for overlay balance, and lets shuffling even it out. The run is
//! repeated with two cache sizes and the final in-degree histograms are
//! printed as python lists ready for plotting.
//!
//! Run with: cargo run --example degree_distribution_sim

use log::info;
use simple_logger::SimpleLogger;

mod shuffle;
use shuffle::{
    MetricsConfig, NetworkConfig, ShuffleSimConfig, ShuffleSimRunner, SimulationResult,
    TopologyMode,
};

const SEED: [u8; 32] = [42u8; 32];

fn run_once(cache_size: usize) -> SimulationResult {
    let config = ShuffleSimConfig {
        rounds: 300,
        num_peers: 2000,
        seed: Some(SEED),
        cache_size,
        shuffle_length: 8,
        topology: TopologyMode::Star,
        network: NetworkConfig {
            delay_fraction: 0.0,
            loss_fraction: 0.0,
        },
        metrics: MetricsConfig {
            sample_interval: 0, // final snapshot only
            path_length_samples: 16,
        },
        enable_event_logging: false,
        csv_output_path: None,
    };

    info!(
        "Running {} rounds with cache size {}...",
        config.rounds, cache_size
    );

    let mut runner = ShuffleSimRunner::new(config);
    runner.run()
}

fn main() {
    SimpleLogger::new().init().unwrap();

    info!("Setting up star overlay experiments...");

    let mut histograms = Vec::new();
    for cache_size in [30, 50] {
        let result = run_once(cache_size);

        info!(
            "cache {}: in-degree avg {:.1} stddev {:.2}, {:.1}% reachable",
            cache_size,
            result.final_metrics.in_degree.mean,
            result.final_metrics.in_degree.stddev,
            result.final_metrics.paths.reachable_fraction * 100.0
        );

        histograms.push((cache_size, result.in_degree_histogram));
    }

    // index = in-degree, value = number of nodes with that in-degree
    println!();
    for (cache_size, histogram) in &histograms {
        println!("ShuffleK{} = {:?}", cache_size, histogram);
    }
}
