// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/ring_bootstrap.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/ring_bootstrap.yaml --seed 0x1234...

mod shuffle;

use shuffle::{ShuffleSimConfig, ShuffleSimRunner, TopologyMode};
use std::env;
use std::fs;
use std::path::Path;

/// Simplified scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Configuration overrides
    config: ScenarioConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
    hypothesis: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ScenarioConfig {
    // Core settings
    rounds: usize,
    num_peers: usize,

    // Bootstrap topology
    topology: TopologyMode,

    // Protocol parameter overrides (optional)
    #[serde(default)]
    protocol: Option<ProtocolConfigOverrides>,

    // Network config overrides (optional)
    #[serde(default)]
    network: Option<NetworkConfigOverrides>,

    // Metric sampling overrides (optional)
    #[serde(default)]
    metrics: Option<MetricsConfigOverrides>,

    // Per-event CSV log (optional)
    #[serde(default)]
    csv_output_path: Option<String>,

    // Sampled metrics CSV (optional)
    #[serde(default)]
    metrics_output_path: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProtocolConfigOverrides {
    cache_size: Option<usize>,
    shuffle_length: Option<usize>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct NetworkConfigOverrides {
    delay_fraction: Option<f64>,
    loss_fraction: Option<f64>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct MetricsConfigOverrides {
    sample_interval: Option<usize>,
    path_length_samples: Option<usize>,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX]",
            args[0]
        );
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/ring_bootstrap.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/ring_bootstrap.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    // Parse optional seed
    let seed: Option<[u8; 32]> = if args.len() >= 4 && args[2] == "--seed" {
        Some(parse_seed_hex(&args[3]))
    } else {
        None
    };

    if path.is_file() {
        run_scenario_file(path, seed);
    } else if path.is_dir() {
        run_scenario_directory(path, seed);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("yaml")
                || path.extension().and_then(|s| s.to_str()) == Some("yml")
            {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                 ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!(
            "\n{}/{} Running: {}\n",
            i + 1,
            scenarios.len(),
            scenario_path.display()
        );
        run_scenario_file(scenario_path, seed);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
}

fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) {
    println!("Loading scenario from: {}", path.display());

    // Load and parse YAML
    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    // Print scenario header
    println!("\n╔════════════════════════════════════════════════════════╗");
    if let Some(ref name) = scenario.meta.name {
        println!(
            "║  {}  {}",
            name,
            " ".repeat(54_usize.saturating_sub(name.len()))
        );
    } else {
        println!(
            "║  Scenario: {}  ",
            path.file_stem().unwrap().to_str().unwrap()
        );
    }
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    // Build configuration
    let mut config = ShuffleSimConfig::default();

    // Apply scenario config
    config.rounds = scenario.config.rounds;
    config.num_peers = scenario.config.num_peers;
    config.topology = scenario.config.topology;
    config.csv_output_path = scenario.config.csv_output_path;
    config.seed = seed;

    // Apply protocol parameter overrides
    if let Some(ref protocol_overrides) = scenario.config.protocol {
        if let Some(v) = protocol_overrides.cache_size {
            config.cache_size = v;
        }
        if let Some(v) = protocol_overrides.shuffle_length {
            config.shuffle_length = v;
        }
    }

    // Apply network config overrides
    if let Some(ref net_overrides) = scenario.config.network {
        if let Some(v) = net_overrides.delay_fraction {
            config.network.delay_fraction = v;
        }
        if let Some(v) = net_overrides.loss_fraction {
            config.network.loss_fraction = v;
        }
    }

    // Apply metric sampling overrides
    if let Some(ref metric_overrides) = scenario.config.metrics {
        if let Some(v) = metric_overrides.sample_interval {
            config.metrics.sample_interval = v;
        }
        if let Some(v) = metric_overrides.path_length_samples {
            config.metrics.path_length_samples = v;
        }
    }

    println!("Configuration:");
    println!("  Rounds: {}", config.rounds);
    println!("  Peers: {}", config.num_peers);
    println!("  Topology: {:?}", config.topology);
    println!("  Cache Size: {}", config.cache_size);
    println!("  Shuffle Length: {}", config.shuffle_length);
    println!("\nStarting simulation...\n");

    // Run simulation
    let mut runner = ShuffleSimRunner::new(config);
    let result = runner.run();

    // Print results
    result.print_summary();

    if let Some(ref metrics_path) = scenario.config.metrics_output_path {
        match result.export_metrics_csv(metrics_path) {
            Ok(()) => println!("Metrics written to {}", metrics_path),
            Err(e) => eprintln!("Failed to write metrics to {}: {}", metrics_path, e),
        }
    }

    println!("\n✓ Scenario complete!\n");
}

fn parse_seed_hex(hex: &str) -> [u8; 32] {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte_str = std::str::from_utf8(chunk).unwrap();
        seed[i] = u8::from_str_radix(byte_str, 16).unwrap_or_else(|e| {
            eprintln!("Invalid hex seed: {}", e);
            std::process::exit(1);
        });
    }

    seed
}
