//! Command-line front-end for the GPU vanity address generator

use clap::Parser;
use erg_vanity::bench::{self, BenchConfig};
use erg_vanity::monitor::{MonitorConfig, SearchMonitor};
use erg_vanity::opencl::GpuContext;
use erg_vanity::search::{MultiDeviceSearch, SearchConfig, VanityMatch};
use erg_vanity::DEFAULT_BATCH_SIZE;
use std::collections::HashSet;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "erg-vanity",
    version,
    about = "GPU-accelerated Ergo vanity address generator"
)]
struct Args {
    /// List all available OpenCL GPU devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    list_devices: bool,

    /// Comma-separated global device indices to use, or "all"
    #[arg(long = "devices", default_value = "0")]
    devices: String,

    /// Pattern(s) to search for (comma-separated, e.g. "9err,9ego")
    #[arg(short = 'p', long = "pattern", value_delimiter = ',')]
    patterns: Vec<String>,

    /// Case-insensitive matching
    #[arg(short = 'i', long = "ignore-case", default_value_t = false)]
    ignore_case: bool,

    /// Number of verified matches to find before stopping
    #[arg(short = 'n', long = "max-results", default_value_t = 1)]
    max_results: usize,

    /// BIP44 address indices to check per seed (m/44'/429'/0'/0/{0..N-1})
    #[arg(long = "index", default_value_t = 1)]
    num_indices: u32,

    /// Maximum search duration in seconds
    #[arg(long = "duration-secs")]
    duration_secs: Option<u64>,

    /// Work items per kernel launch
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Write verified matches to this JSON file
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Run the GPU microbenchmark and exit
    #[arg(long = "bench", default_value_t = false)]
    bench: bool,

    /// Benchmark iterations per stage
    #[arg(long = "bench-iters", default_value_t = 100)]
    bench_iters: u32,

    /// Benchmark warmup launches
    #[arg(long = "bench-warmup", default_value_t = 5)]
    bench_warmup: u32,

    /// Validate benchmark kernels by reading checksums back
    #[arg(long = "bench-validate", default_value_t = false)]
    bench_validate: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,

    /// Single pattern as a positional argument
    #[arg()]
    pattern: Option<String>,
}

fn list_devices() -> anyhow::Result<()> {
    let devices = GpuContext::enumerate_devices()?;
    if devices.is_empty() {
        println!("No OpenCL GPU devices found.");
        return Ok(());
    }
    for info in devices {
        println!(
            "[{}] {} - {} (platform: {})",
            info.global_idx,
            info.vendor.trim(),
            info.device_name.trim(),
            info.platform_name.trim()
        );
    }
    Ok(())
}

/// Parse `--devices` into a sorted, deduplicated list of valid indices.
fn parse_device_list(devices_arg: &str) -> anyhow::Result<Vec<usize>> {
    let devices = GpuContext::enumerate_devices()?;
    if devices.is_empty() {
        anyhow::bail!("no OpenCL GPU devices found");
    }
    let mut available: Vec<usize> = devices.iter().map(|d| d.global_idx).collect();
    available.sort_unstable();
    let available_set: HashSet<usize> = available.iter().copied().collect();

    let normalized = devices_arg.trim().to_ascii_lowercase();
    let mut indices = if normalized == "all" {
        available.clone()
    } else {
        let mut parsed = Vec::new();
        for part in devices_arg.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let idx: usize = trimmed
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid device index '{}'", trimmed))?;
            if !available_set.contains(&idx) {
                anyhow::bail!("device index {} not found (available: {:?})", idx, available);
            }
            parsed.push(idx);
        }
        if parsed.is_empty() {
            anyhow::bail!("no device indices provided");
        }
        parsed
    };

    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

fn print_match(result: &VanityMatch, original_patterns: &[String], match_num: usize) {
    let pattern = original_patterns
        .get(result.pattern_index as usize)
        .map(|s| s.as_str())
        .unwrap_or("<unknown>");

    println!();
    println!("=== Match {} ===", match_num);
    println!("Device:   {}", result.device_index);
    println!("Address:  {}", result.address);
    println!("Pattern:  {}", pattern);
    println!("Path:     m/44'/429'/0'/0/{}", result.address_index);
    println!("Mnemonic: {}", result.mnemonic);
    println!("Entropy:  {}", hex::encode(result.entropy));
}

fn write_report(
    path: &str,
    config: &SearchConfig,
    matches: &[VanityMatch],
) -> anyhow::Result<()> {
    let entries: Vec<_> = matches
        .iter()
        .map(|m| {
            serde_json::json!({
                "address": m.address,
                "mnemonic": m.mnemonic,
                "path": format!("m/44'/429'/0'/0/{}", m.address_index),
                "entropy": hex::encode(m.entropy),
                "pattern_index": m.pattern_index,
                "device_index": m.device_index,
            })
        })
        .collect();

    let report = serde_json::json!({
        "config": config,
        "matches": entries,
    });
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.list_devices {
        if let Err(err) = list_devices() {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let device_indices = match parse_device_list(&args.devices) {
        Ok(list) => list,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(2);
        }
    };

    if args.bench {
        let cfg = BenchConfig {
            batch_size: args.batch_size,
            num_indices: args.num_indices,
            iters: args.bench_iters,
            warmup: args.bench_warmup,
            validate: args.bench_validate,
        };

        let mut results = Vec::new();
        for device_index in &device_indices {
            match bench::run_bench_on_device(*device_index, &cfg) {
                Ok(stats) => results.push(stats),
                Err(e) => {
                    eprintln!("Error benchmarking device {}: {}", device_index, e);
                    std::process::exit(1);
                }
            }
        }
        bench::print_bench_results(&results, &cfg);
        return;
    }

    // Merge -p patterns with the positional one.
    let mut patterns = args.patterns.clone();
    if let Some(p) = &args.pattern {
        patterns.push(p.clone());
    }

    let config = SearchConfig {
        patterns,
        ignore_case: args.ignore_case,
        num_indices: args.num_indices,
        batch_size: args.batch_size,
        max_results: args.max_results,
        duration_secs: args.duration_secs,
        devices: device_indices,
    };

    let search = match MultiDeviceSearch::new(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    eprintln!(
        "Searching for {} pattern(s): {:?}",
        search.patterns().len(),
        search.patterns().originals()
    );
    eprintln!("Case-insensitive: {}", config.ignore_case);
    eprintln!(
        "Indices per seed: {} (m/44'/429'/0'/0/{{0..{}}})",
        config.num_indices,
        config.num_indices - 1
    );
    eprintln!("Target matches: {}", config.max_results);
    eprintln!("Devices: {:?}", config.devices);
    eprintln!("Batch size: {}", config.batch_size);
    if let Some(secs) = config.duration_secs {
        eprintln!("Duration limit: {}s", secs);
    }
    eprintln!();

    let monitor = SearchMonitor::new();
    monitor.start();
    let reporter = monitor.spawn_reporter(MonitorConfig::default());

    let outcome = search.run(&monitor);

    monitor.stop();
    let _ = reporter.join();

    match outcome {
        Ok(outcome) => {
            for (i, result) in outcome.matches.iter().enumerate() {
                print_match(result, search.patterns().originals(), i + 1);
            }

            eprintln!();
            eprintln!(
                "Found {} match(es) in {:.1}s ({} addresses checked)",
                outcome.matches.len(),
                outcome.elapsed.as_secs_f64(),
                outcome.total_checked
            );
            if outcome.hits_dropped > 0 {
                warn!(
                    dropped = outcome.hits_dropped,
                    "hits dropped due to buffer overflow (pattern too short?)"
                );
            }

            if let Some(path) = &args.output {
                if let Err(e) = write_report(path, &config, &outcome.matches) {
                    eprintln!("Error writing report to {}: {}", path, e);
                    std::process::exit(1);
                }
                eprintln!("Report written to {}", path);
            }
        }
        Err(e) => {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        }
    }
}
