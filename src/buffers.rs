//! Fixed-capacity device buffers for the vanity search
//!
//! Everything is allocated once per pipeline; the host only ever reads the
//! hit counter and the claimed prefix of the hit buffer after a launch,
//! never maps device memory for compute.

use crate::error::{GpuError, Result};
use crate::opencl::GpuContext;
use crate::pattern::PatternSet;
use crate::{MAX_PATTERNS, MAX_PATTERN_DATA};
use ocl::{Buffer, MemFlags};

/// Maximum hits stored per batch.
pub const MAX_HITS: usize = 1024;

/// Entropy size in bytes (256-bit, 24-word mnemonic).
pub const ENTROPY_SIZE: usize = 32;

/// One hit record from the GPU. 64 bytes, 16-byte aligned, matching the
/// kernel's `vanity_hit` struct field for field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C, align(16))]
pub struct GpuHit {
    /// Matching entropy as little-endian u32 words
    pub entropy_words: [u32; 8],
    /// Work item that claimed the hit
    pub work_item_id: u32,
    /// BIP44 address index <i> in m/44'/429'/0'/0/<i>
    pub address_index: u32,
    /// Index into the pattern list
    pub pattern_index: u32,
    /// Zeroed by the kernel
    pub reserved: [u32; 5],
}

// Required for ocl::Buffer<GpuHit>
unsafe impl ocl::OclPrm for GpuHit {}

impl GpuHit {
    /// Reassemble the 32 entropy bytes from the LE words.
    pub fn entropy_bytes(&self) -> [u8; ENTROPY_SIZE] {
        let mut bytes = [0u8; ENTROPY_SIZE];
        for (i, word) in self.entropy_words.iter().enumerate() {
            bytes[i * 4..(i + 1) * 4].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}

/// Pre-allocated per-device buffers for the vanity kernel.
pub struct SearchBuffers {
    /// Per-search salt (32 bytes, read-only)
    pub salt: Buffer<u8>,
    /// Concatenated pattern bytes
    pub patterns: Buffer<u8>,
    /// Byte offset of each pattern
    pub pattern_offsets: Buffer<u32>,
    /// Length of each pattern
    pub pattern_lens: Buffer<u32>,
    /// Hit records (written by the GPU only)
    pub hits: Buffer<GpuHit>,
    /// Atomic hit counter (i32 to match the kernel's `volatile int *`)
    pub hit_count: Buffer<i32>,
}

impl SearchBuffers {
    /// Allocate all buffers on a context's queue.
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let queue = ctx.queue();

        let salt = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len(ENTROPY_SIZE)
            .build()
            .map_err(|e| GpuError::Buffer(format!("salt: {}", e)))?;

        let patterns = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len(MAX_PATTERN_DATA)
            .build()
            .map_err(|e| GpuError::Buffer(format!("patterns: {}", e)))?;

        let pattern_offsets = Buffer::<u32>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len(MAX_PATTERNS)
            .build()
            .map_err(|e| GpuError::Buffer(format!("pattern offsets: {}", e)))?;

        let pattern_lens = Buffer::<u32>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len(MAX_PATTERNS)
            .build()
            .map_err(|e| GpuError::Buffer(format!("pattern lens: {}", e)))?;

        let hits = Buffer::<GpuHit>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().write_only())
            .len(MAX_HITS)
            .build()
            .map_err(|e| GpuError::Buffer(format!("hits: {}", e)))?;

        let hit_count = Buffer::<i32>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_write())
            .len(1)
            .build()
            .map_err(|e| GpuError::Buffer(format!("hit count: {}", e)))?;

        Ok(Self {
            salt,
            patterns,
            pattern_offsets,
            pattern_lens,
            hits,
            hit_count,
        })
    }

    /// Upload the per-search salt.
    pub fn upload_salt(&self, salt: &[u8; ENTROPY_SIZE]) -> Result<()> {
        self.salt
            .write(&salt[..])
            .enq()
            .map_err(|e| GpuError::Buffer(format!("salt write: {}", e)))?;
        Ok(())
    }

    /// Upload the normalised pattern tables. Returns the pattern count.
    pub fn upload_patterns(&self, patterns: &PatternSet) -> Result<u32> {
        let (data, offsets, lens) = patterns.to_gpu_tables();

        let mut padded = vec![0u8; MAX_PATTERN_DATA];
        padded[..data.len()].copy_from_slice(&data);
        let mut padded_offsets = vec![0u32; MAX_PATTERNS];
        padded_offsets[..offsets.len()].copy_from_slice(&offsets);
        let mut padded_lens = vec![0u32; MAX_PATTERNS];
        padded_lens[..lens.len()].copy_from_slice(&lens);

        self.patterns
            .write(&padded)
            .enq()
            .map_err(|e| GpuError::Buffer(format!("patterns write: {}", e)))?;
        self.pattern_offsets
            .write(&padded_offsets)
            .enq()
            .map_err(|e| GpuError::Buffer(format!("offsets write: {}", e)))?;
        self.pattern_lens
            .write(&padded_lens)
            .enq()
            .map_err(|e| GpuError::Buffer(format!("lens write: {}", e)))?;

        Ok(offsets.len() as u32)
    }

    /// Zero the hit counter before a launch.
    pub fn reset_hits(&self) -> Result<()> {
        self.hit_count
            .write(&[0i32][..])
            .enq()
            .map_err(|e| GpuError::Buffer(format!("hit count reset: {}", e)))?;
        Ok(())
    }

    /// Read back the raw hit counter. May exceed MAX_HITS when slots were
    /// claimed past capacity; the excess was dropped on-device.
    pub fn read_hit_count(&self) -> Result<u32> {
        let mut count = [0i32; 1];
        self.hit_count
            .read(&mut count[..])
            .enq()
            .map_err(|e| GpuError::Buffer(format!("hit count read: {}", e)))?;
        Ok(count[0].max(0) as u32)
    }

    /// Read the first `count` hit records.
    pub fn read_hits(&self, count: usize) -> Result<Vec<GpuHit>> {
        let count = count.min(MAX_HITS);
        let mut hits = vec![GpuHit::default(); count];
        if count > 0 {
            self.hits
                .read(&mut hits)
                .enq()
                .map_err(|e| GpuError::Buffer(format!("hits read: {}", e)))?;
        }
        Ok(hits)
    }
}
