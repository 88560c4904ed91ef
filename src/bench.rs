//! GPU microbenchmark
//!
//! Times the pipeline stage by stage (PBKDF2, BIP32, secp256k1, Base58)
//! with OpenCL event profiling. Every bench kernel shares one signature and
//! writes a per-item checksum so drivers cannot optimise the work away.

use crate::error::{GpuError, Result};
use crate::opencl::{DeviceInfo, GpuContext, GpuProgram};
use crate::wordlist::WordlistBuffers;
use ocl::enums::ProfilingInfo;
use ocl::{Buffer, Event, Kernel, MemFlags};
use tracing::info;

/// Benchmark configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Work items per launch
    pub batch_size: usize,
    /// Address indices per seed (affects the BIP32 stage)
    pub num_indices: u32,
    /// Timed iterations per stage
    pub iters: u32,
    /// Warmup launches before timing
    pub warmup: u32,
    /// Read checksums back and reject all-zero outputs
    pub validate: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1 << 18,
            num_indices: 1,
            iters: 100,
            warmup: 5,
            validate: false,
        }
    }
}

/// Accumulated timing for one stage.
#[derive(Debug, Clone, Default)]
pub struct StageStats {
    /// Total kernel time in nanoseconds
    pub total_ns: u64,
    /// Timed iterations
    pub count: u32,
}

impl StageStats {
    /// Mean time per launch in milliseconds.
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.count as f64 / 1e6
        }
    }
}

/// Benchmark results for one device.
#[derive(Debug, Clone)]
pub struct DeviceBenchStats {
    pub device_info: DeviceInfo,
    pub pbkdf2: StageStats,
    pub bip32: StageStats,
    pub secp256k1: StageStats,
    pub base58: StageStats,
}

impl DeviceBenchStats {
    pub fn total_ns(&self) -> u64 {
        self.pbkdf2.total_ns + self.bip32.total_ns + self.secp256k1.total_ns + self.base58.total_ns
    }
}

const STAGE_KERNELS: [(&str, &str); 4] = [
    ("pbkdf2", "bench_pbkdf2"),
    ("bip32", "bench_bip32"),
    ("secp256k1", "bench_secp256k1"),
    ("base58", "bench_base58"),
];

/// Run the per-stage benchmark on one device.
pub fn run_bench_on_device(device_index: usize, cfg: &BenchConfig) -> Result<DeviceBenchStats> {
    let ctx = GpuContext::with_device_profiling(device_index)?;
    let queue = ctx.queue();
    let device_info = ctx.info().clone();

    info!(device = %device_info, "benchmarking");

    let program = GpuProgram::bench(&ctx)?;

    let salt_buf = Buffer::<u8>::builder()
        .queue(queue.clone())
        .flags(MemFlags::new().read_only())
        .len(32)
        .build()
        .map_err(|e| GpuError::Buffer(format!("bench salt: {}", e)))?;

    let checksum_flags = if cfg.validate {
        MemFlags::new().read_write()
    } else {
        MemFlags::new().write_only()
    };
    let checksum_buf = Buffer::<u32>::builder()
        .queue(queue.clone())
        .flags(checksum_flags)
        .len(cfg.batch_size)
        .build()
        .map_err(|e| GpuError::Buffer(format!("bench checksums: {}", e)))?;

    let wordlist = WordlistBuffers::upload(queue)?;

    let salt = [0x42u8; 32];
    salt_buf
        .write(&salt[..])
        .enq()
        .map_err(|e| GpuError::Buffer(format!("bench salt write: {}", e)))?;
    queue.finish().map_err(GpuError::from)?;

    let mut stage_stats: Vec<StageStats> = Vec::with_capacity(STAGE_KERNELS.len());

    for (stage_name, kernel_name) in STAGE_KERNELS {
        let kernel = Kernel::builder()
            .program(program.program())
            .name(kernel_name)
            .queue(queue.clone())
            .global_work_size(cfg.batch_size)
            .arg(&salt_buf)
            .arg(0u64)
            .arg(&wordlist.words8)
            .arg(&wordlist.lens)
            .arg(cfg.num_indices)
            .arg(&checksum_buf)
            .build()
            .map_err(|e| GpuError::KernelExecution(format!("{}: {}", kernel_name, e)))?;

        for i in 0..cfg.warmup {
            kernel
                .set_arg(1, i as u64)
                .map_err(|e| GpuError::KernelExecution(e.to_string()))?;
            unsafe {
                kernel
                    .enq()
                    .map_err(|e| GpuError::KernelExecution(format!("warmup: {}", e)))?;
            }
        }
        queue.finish().map_err(GpuError::from)?;

        let mut stats = StageStats::default();
        for i in 0..cfg.iters {
            // Vary the counter so successive launches do different work.
            kernel
                .set_arg(1, (cfg.warmup + i) as u64 * cfg.batch_size as u64)
                .map_err(|e| GpuError::KernelExecution(e.to_string()))?;

            let mut event = Event::empty();
            unsafe {
                kernel
                    .cmd()
                    .enew(&mut event)
                    .enq()
                    .map_err(|e| GpuError::KernelExecution(format!("timed enq: {}", e)))?;
            }
            queue.finish().map_err(GpuError::from)?;

            let start = event
                .profiling_info(ProfilingInfo::Start)
                .map_err(GpuError::from)?
                .time()
                .map_err(|e| GpuError::Ocl(e.to_string()))?;
            let end = event
                .profiling_info(ProfilingInfo::End)
                .map_err(GpuError::from)?
                .time()
                .map_err(|e| GpuError::Ocl(e.to_string()))?;

            stats.total_ns += end.saturating_sub(start);
            stats.count += 1;
        }

        if cfg.validate {
            let mut checksums = vec![0u32; cfg.batch_size];
            checksum_buf
                .read(&mut checksums)
                .enq()
                .map_err(|e| GpuError::Buffer(format!("checksum read: {}", e)))?;
            queue.finish().map_err(GpuError::from)?;
            if checksums.iter().all(|&c| c == 0) {
                return Err(GpuError::KernelExecution(format!(
                    "{} produced all-zero checksums; kernel was likely optimised away",
                    stage_name
                ))
                .into());
            }
        }

        stage_stats.push(stats);
    }

    let mut it = stage_stats.into_iter();
    Ok(DeviceBenchStats {
        device_info,
        pbkdf2: it.next().unwrap_or_default(),
        bip32: it.next().unwrap_or_default(),
        secp256k1: it.next().unwrap_or_default(),
        base58: it.next().unwrap_or_default(),
    })
}

/// Print benchmark results for all devices.
pub fn print_bench_results(results: &[DeviceBenchStats], cfg: &BenchConfig) {
    for stats in results {
        let total_ns = stats.total_ns().max(1);
        println!();
        println!("{}", stats.device_info);
        println!(
            "  batch size {} x {} iterations (num_indices = {})",
            cfg.batch_size, cfg.iters, cfg.num_indices
        );

        for (name, stage) in [
            ("pbkdf2", &stats.pbkdf2),
            ("bip32", &stats.bip32),
            ("secp256k1", &stats.secp256k1),
            ("base58", &stats.base58),
        ] {
            println!(
                "  {:<10} {:>9.2} ms/launch  ({:>4.1}% of pipeline)",
                name,
                stage.mean_ms(),
                stage.total_ns as f64 / total_ns as f64 * 100.0
            );
        }

        let per_launch_ms = total_ns as f64 / cfg.iters.max(1) as f64 / 1e6;
        if per_launch_ms > 0.0 {
            let rate = cfg.batch_size as f64 / (per_launch_ms / 1e3);
            println!("  est. throughput: {:.0} seeds/s", rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_stats_mean() {
        let stats = StageStats {
            total_ns: 3_000_000,
            count: 3,
        };
        assert!((stats.mean_ms() - 1.0).abs() < 1e-9);
        assert_eq!(StageStats::default().mean_ms(), 0.0);
    }
}
