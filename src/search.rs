//! Vanity search: per-device batch pipeline and multi-device controller
//!
//! One OS thread per device drives that device's serial queue; a shared
//! atomic counter hands out disjoint `counter_start` ranges (the salt is
//! identical everywhere, so the counter alone partitions the search space).
//! Every GPU hit is re-derived on the CPU before it counts.

use crate::buffers::{GpuHit, SearchBuffers, ENTROPY_SIZE, MAX_HITS};
use crate::crypto::CryptoEngine;
use crate::error::{ConfigError, GpuError, Result, VanityError};
use crate::monitor::SearchMonitor;
use crate::opencl::{GpuContext, GpuProgram};
use crate::pattern::PatternSet;
use crate::wordlist::WordlistBuffers;
use crate::{DEFAULT_BATCH_SIZE, MAX_ADDRESS_INDICES};
use ocl::Kernel;
use rand::rngs::OsRng;
use rand::RngCore;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Search configuration, validated before any GPU work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Vanity prefixes as the user supplied them
    pub patterns: Vec<String>,
    /// Case-insensitive matching
    pub ignore_case: bool,
    /// BIP44 address indices checked per seed: m/44'/429'/0'/0/{0..N-1}
    pub num_indices: u32,
    /// Work items per kernel launch
    pub batch_size: usize,
    /// Stop after this many verified matches
    pub max_results: usize,
    /// Optional wall-clock limit in seconds
    pub duration_secs: Option<u64>,
    /// Global device indices to drive
    pub devices: Vec<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            ignore_case: false,
            num_indices: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            max_results: 1,
            duration_secs: None,
            devices: vec![0],
        }
    }
}

impl SearchConfig {
    /// Validate everything that must hold before a kernel is enqueued.
    pub fn validate(&self) -> Result<PatternSet> {
        if self.num_indices == 0 || self.num_indices > MAX_ADDRESS_INDICES {
            return Err(ConfigError::InvalidIndexCount(self.num_indices).into());
        }
        if self.max_results == 0 {
            return Err(ConfigError::InvalidMaxResults.into());
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize.into());
        }
        Ok(PatternSet::new(&self.patterns, self.ignore_case)?)
    }
}

/// A verified vanity match.
#[derive(Debug, Clone)]
pub struct VanityMatch {
    /// The Ergo address (Base58)
    pub address: String,
    /// The 24-word mnemonic that produces it
    pub mnemonic: String,
    /// The entropy behind the mnemonic
    pub entropy: [u8; ENTROPY_SIZE],
    /// Private key at m/44'/429'/0'/0/<address_index>
    pub private_key: [u8; 32],
    /// Work item that found the hit
    pub work_item_id: u32,
    /// BIP44 address index
    pub address_index: u32,
    /// Which pattern matched
    pub pattern_index: u32,
    /// Which device found it
    pub device_index: usize,
}

/// Sort a batch's results into a stable order. Hit slots are claimed by
/// `atomic_inc`, so GPU write order is nondeterministic.
pub(crate) fn sort_matches(results: &mut [VanityMatch]) {
    results.sort_by(|a, b| {
        a.address_index
            .cmp(&b.address_index)
            .then_with(|| a.pattern_index.cmp(&b.pattern_index))
            .then_with(|| a.work_item_id.cmp(&b.work_item_id))
    });
}

/// Per-device search pipeline: compiled program, buffers, and the kernel
/// with its uniform arguments bound.
pub struct SearchPipeline {
    ctx: GpuContext,
    #[allow(dead_code)]
    program: GpuProgram,
    buffers: SearchBuffers,
    #[allow(dead_code)]
    wordlist: WordlistBuffers,
    kernel: Kernel,
    engine: CryptoEngine,
    patterns: PatternSet,
    batch_size: usize,
    device_index: usize,
    hits_dropped_total: u64,
}

impl SearchPipeline {
    /// Build the pipeline on a specific device with the shared search salt.
    pub fn new(
        patterns: &PatternSet,
        config: &SearchConfig,
        device_index: usize,
        salt: [u8; ENTROPY_SIZE],
    ) -> Result<Self> {
        let ctx = GpuContext::with_device(device_index)?;
        let program = GpuProgram::vanity(&ctx)?;
        let queue = ctx.queue();

        let buffers = SearchBuffers::new(&ctx)?;
        let wordlist = WordlistBuffers::upload(queue)?;

        buffers.upload_salt(&salt)?;
        let num_patterns = buffers.upload_patterns(patterns)?;

        let kernel = Kernel::builder()
            .program(program.program())
            .name("vanity_search")
            .queue(queue.clone())
            .global_work_size(config.batch_size)
            .arg(&buffers.salt)
            .arg(0u64) // counter_start, updated per batch
            .arg(&wordlist.words8)
            .arg(&wordlist.lens)
            .arg(&buffers.patterns)
            .arg(&buffers.pattern_offsets)
            .arg(&buffers.pattern_lens)
            .arg(num_patterns)
            .arg(if patterns.ignore_case() { 1u32 } else { 0u32 })
            .arg(config.num_indices)
            .arg(&buffers.hits)
            .arg(&buffers.hit_count)
            .arg(MAX_HITS as u32)
            .build()
            .map_err(|e| GpuError::KernelExecution(format!("kernel build: {}", e)))?;

        Ok(Self {
            ctx,
            program,
            buffers,
            wordlist,
            kernel,
            engine: CryptoEngine::new(),
            patterns: patterns.clone(),
            batch_size: config.batch_size,
            device_index,
            hits_dropped_total: 0,
        })
    }

    pub fn device_info(&self) -> &crate::opencl::DeviceInfo {
        self.ctx.info()
    }

    /// Total hits dropped to buffer overflow so far.
    pub fn hits_dropped_total(&self) -> u64 {
        self.hits_dropped_total
    }

    /// Run one batch starting at `counter_start`. Returns the verified
    /// matches, sorted deterministically.
    pub fn run_batch(&mut self, counter_start: u64) -> Result<Vec<VanityMatch>> {
        self.buffers.reset_hits()?;
        self.kernel
            .set_arg(1, counter_start)
            .map_err(|e| GpuError::KernelExecution(format!("set counter: {}", e)))?;

        unsafe {
            self.kernel
                .enq()
                .map_err(|e| GpuError::KernelExecution(format!("enqueue: {}", e)))?;
        }
        self.ctx
            .queue()
            .finish()
            .map_err(|e| GpuError::KernelExecution(format!("finish: {}", e)))?;

        let raw_count = self.buffers.read_hit_count()? as usize;
        let hit_count = raw_count.min(MAX_HITS);
        if raw_count > MAX_HITS {
            let dropped = (raw_count - MAX_HITS) as u64;
            self.hits_dropped_total += dropped;
            debug!(
                device = self.device_index,
                dropped, "hit buffer overflow, pattern is likely too short"
            );
        }
        if hit_count == 0 {
            return Ok(Vec::new());
        }

        let hits = self.buffers.read_hits(hit_count)?;

        // CPU re-derivation of every hit; false positives are dropped.
        let engine = &self.engine;
        let patterns = &self.patterns;
        let device_index = self.device_index;
        let mut results: Vec<VanityMatch> = hits
            .par_iter()
            .filter_map(|hit| {
                Self::verify_hit(engine, patterns, device_index, hit)
                    .ok()
                    .flatten()
            })
            .collect();

        sort_matches(&mut results);
        Ok(results)
    }

    /// Re-run the pipeline on the host for one hit.
    fn verify_hit(
        engine: &CryptoEngine,
        patterns: &PatternSet,
        device_index: usize,
        hit: &GpuHit,
    ) -> Result<Option<VanityMatch>> {
        let entropy = hit.entropy_bytes();
        let derived = engine.derive(&entropy, hit.address_index)?;

        let pattern_idx = hit.pattern_index as usize;
        if pattern_idx >= patterns.len() {
            warn!(
                device = device_index,
                pattern_idx, "GPU hit carries out-of-range pattern index"
            );
            return Ok(None);
        }

        if !patterns.matches(pattern_idx, &derived.address) {
            // Indicates a kernel bug; the search continues without the hit.
            warn!(
                device = device_index,
                address = %derived.address,
                pattern = %patterns.normalized()[pattern_idx],
                address_index = hit.address_index,
                "GPU hit did not verify on CPU, dropping"
            );
            return Ok(None);
        }

        Ok(Some(VanityMatch {
            address: derived.address,
            mnemonic: derived.mnemonic,
            entropy,
            private_key: derived.private_key,
            work_item_id: hit.work_item_id,
            address_index: hit.address_index,
            pattern_index: hit.pattern_index,
            device_index,
        }))
    }
}

/// Message from a device worker to the aggregator.
enum WorkerMessage {
    Hit(VanityMatch),
    Error { device_index: usize, message: String },
    Stats { device_index: usize, hits_dropped: u64 },
}

/// Outcome of a finished search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Verified matches, in arrival order
    pub matches: Vec<VanityMatch>,
    /// Total addresses checked across all devices
    pub total_checked: u64,
    /// Total hits dropped to buffer overflow
    pub hits_dropped: u64,
    /// Wall-clock duration of the search
    pub elapsed: Duration,
}

/// Coordinates search workers across multiple devices.
pub struct MultiDeviceSearch {
    config: SearchConfig,
    patterns: PatternSet,
}

impl MultiDeviceSearch {
    /// Validate the configuration and prepare a search.
    pub fn new(config: SearchConfig) -> Result<Self> {
        let patterns = config.validate()?;
        if config.devices.is_empty() {
            return Err(GpuError::NoDevices.into());
        }
        Ok(Self { config, patterns })
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Run until `max_results` verified matches, the deadline, or an
    /// external stop request.
    pub fn run(&self, monitor: &SearchMonitor) -> Result<SearchOutcome> {
        self.run_with_stop(monitor, Arc::new(AtomicBool::new(false)))
    }

    /// As `run`, with a caller-owned stop flag checked between batches.
    pub fn run_with_stop(
        &self,
        monitor: &SearchMonitor,
        stop: Arc<AtomicBool>,
    ) -> Result<SearchOutcome> {
        // One salt per search, from the platform CSPRNG.
        let mut salt = [0u8; ENTROPY_SIZE];
        OsRng.fill_bytes(&mut salt);

        let counter = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let mut handles = Vec::new();

        info!(
            patterns = ?self.patterns.originals(),
            devices = ?self.config.devices,
            batch_size = self.config.batch_size,
            num_indices = self.config.num_indices,
            "starting vanity search"
        );

        for &device_index in &self.config.devices {
            let patterns = self.patterns.clone();
            let config = self.config.clone();
            let tx = tx.clone();
            let counter = Arc::clone(&counter);
            let stop = Arc::clone(&stop);
            let monitor = monitor.clone();

            let handle = thread::spawn(move || {
                let mut pipeline =
                    match SearchPipeline::new(&patterns, &config, device_index, salt) {
                        Ok(p) => p,
                        Err(e) => {
                            let _ = tx.send(WorkerMessage::Error {
                                device_index,
                                message: e.to_string(),
                            });
                            stop.store(true, Ordering::Relaxed);
                            return;
                        }
                    };

                while !stop.load(Ordering::Relaxed) {
                    let counter_start =
                        counter.fetch_add(config.batch_size as u64, Ordering::Relaxed);

                    let results = match pipeline.run_batch(counter_start) {
                        Ok(r) => r,
                        Err(e) => {
                            let _ = tx.send(WorkerMessage::Error {
                                device_index,
                                message: e.to_string(),
                            });
                            stop.store(true, Ordering::Relaxed);
                            break;
                        }
                    };

                    monitor
                        .add_checked((config.batch_size as u64) * (config.num_indices as u64));

                    for result in results {
                        if tx.send(WorkerMessage::Hit(result)).is_err() {
                            stop.store(true, Ordering::Relaxed);
                            return;
                        }
                    }
                }

                let _ = tx.send(WorkerMessage::Stats {
                    device_index,
                    hits_dropped: pipeline.hits_dropped_total(),
                });
            });

            handles.push(handle);
        }
        drop(tx);

        // Deadline thread flips the shared stop flag; workers notice
        // between batches, so overshoot is bounded by one in-flight batch.
        if let Some(secs) = self.config.duration_secs {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                stop.store(true, Ordering::Relaxed);
            });
        }

        let start = Instant::now();
        let mut matches = Vec::new();
        let mut hits_dropped = 0u64;
        let mut first_error: Option<String> = None;

        loop {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(WorkerMessage::Hit(result)) => {
                    if matches.len() >= self.config.max_results {
                        stop.store(true, Ordering::Relaxed);
                        continue;
                    }
                    monitor.record_match();
                    matches.push(result);
                    if matches.len() >= self.config.max_results {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
                Ok(WorkerMessage::Error {
                    device_index,
                    message,
                }) => {
                    warn!(device = device_index, %message, "device worker failed");
                    if first_error.is_none() {
                        first_error = Some(format!("device {}: {}", device_index, message));
                    }
                    stop.store(true, Ordering::Relaxed);
                }
                Ok(WorkerMessage::Stats {
                    device_index,
                    hits_dropped: dropped,
                }) => {
                    if dropped > 0 {
                        warn!(
                            device = device_index,
                            dropped,
                            "hits dropped to buffer overflow (pattern too short?)"
                        );
                    }
                    hits_dropped = hits_dropped.saturating_add(dropped);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        for handle in handles {
            let _ = handle.join();
        }

        if let Some(message) = first_error {
            return Err(VanityError::Internal(message));
        }

        Ok(SearchOutcome {
            matches,
            total_checked: monitor.checked(),
            hits_dropped,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_match(work_item_id: u32, address_index: u32, pattern_index: u32) -> VanityMatch {
        VanityMatch {
            address: String::new(),
            mnemonic: String::new(),
            entropy: [0u8; 32],
            private_key: [0u8; 32],
            work_item_id,
            address_index,
            pattern_index,
            device_index: 0,
        }
    }

    #[test]
    fn test_sort_matches_ordering() {
        let mut results = vec![
            dummy_match(100, 2, 0),
            dummy_match(50, 0, 1),
            dummy_match(200, 1, 0),
            dummy_match(75, 0, 0),
            dummy_match(25, 1, 1),
        ];
        sort_matches(&mut results);
        assert_eq!(
            results
                .iter()
                .map(|r| (r.address_index, r.pattern_index, r.work_item_id))
                .collect::<Vec<_>>(),
            vec![(0, 0, 75), (0, 1, 50), (1, 0, 200), (1, 1, 25), (2, 0, 100)]
        );
    }

    #[test]
    fn test_sort_matches_tie_break() {
        let mut results = vec![
            dummy_match(300, 0, 2),
            dummy_match(100, 0, 1),
            dummy_match(200, 0, 1),
            dummy_match(50, 0, 0),
        ];
        sort_matches(&mut results);
        assert_eq!(
            results
                .iter()
                .map(|r| (r.address_index, r.pattern_index, r.work_item_id))
                .collect::<Vec<_>>(),
            vec![(0, 0, 50), (0, 1, 100), (0, 1, 200), (0, 2, 300)]
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = SearchConfig {
            patterns: vec!["9err".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.num_indices = 0;
        assert!(config.validate().is_err());
        config.num_indices = 101;
        assert!(config.validate().is_err());
        config.num_indices = 100;
        assert!(config.validate().is_ok());

        config.max_results = 0;
        assert!(config.validate().is_err());
        config.max_results = 1;

        config.batch_size = 0;
        assert!(config.validate().is_err());
        config.batch_size = DEFAULT_BATCH_SIZE;

        config.patterns = vec!["0bad".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_device_list_rejected() {
        let config = SearchConfig {
            patterns: vec!["9err".to_string()],
            devices: Vec::new(),
            ..Default::default()
        };
        assert!(MultiDeviceSearch::new(config).is_err());
    }
}
