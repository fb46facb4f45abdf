//! Basic simulation example for the gossip shuffle overlay
//!
//! Run with: cargo run --example basic_shuffle_sim

use log::info;
use simple_logger::SimpleLogger;

mod shuffle;
use shuffle::{MetricsConfig, NetworkConfig, ShuffleSimConfig, ShuffleSimRunner, TopologyMode};

fn main() {
    SimpleLogger::new().init().unwrap();

    info!("Setting up simulation...");

    // Configure simulation using the shuffle module
    let config = ShuffleSimConfig {
        rounds: 500,
        num_peers: 1000,
        seed: None, // Will be auto-generated
        cache_size: 30,
        shuffle_length: 8,
        topology: TopologyMode::Ring { neighbors: 1 },
        network: NetworkConfig {
            delay_fraction: 0.3,
            loss_fraction: 0.01,
        },
        metrics: MetricsConfig {
            sample_interval: 50,
            path_length_samples: 32,
        },
        enable_event_logging: false, // Enable to see every shuffle exchange
        csv_output_path: None,       // Set to Some("events.csv".into()) to export all events
    };

    info!("Starting simulation...");

    let mut runner = ShuffleSimRunner::new(config);
    let result = runner.run();

    // Display results
    info!("Simulation complete!");
    info!("Seed used: {:?}", result.seed_used);

    info!(
        "In-degree: max: {} min: {} avg: {:.1} stddev: {:.2}",
        result.final_metrics.in_degree.max,
        result.final_metrics.in_degree.min,
        result.final_metrics.in_degree.mean,
        result.final_metrics.in_degree.stddev
    );
    info!(
        "Cache fill: max: {} min: {} avg: {:.1}",
        result.final_metrics.cache_fill.max,
        result.final_metrics.cache_fill.min,
        result.final_metrics.cache_fill.mean
    );
    info!(
        "Paths: avg {:.2} hops, {:.1}% reachable, clustering: {:.4}",
        result.final_metrics.paths.avg_path_length,
        result.final_metrics.paths.reachable_fraction * 100.0,
        result.final_metrics.avg_clustering
    );
    info!(
        "Messages: {}. Requests: {}, Replies: {}, Rejects: {}",
        result.total_messages,
        result.message_counts.requests,
        result.message_counts.replies,
        result.message_counts.rejects
    );
}
