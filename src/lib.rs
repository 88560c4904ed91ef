//! GPU-accelerated Ergo P2PK vanity address generator
//!
//! The whole derivation pipeline (entropy → BIP39 mnemonic → PBKDF2 seed →
//! BIP32/44 key at m/44'/429'/0'/0/<i> → secp256k1 pubkey → Base58 address →
//! prefix match) runs inside a single OpenCL work item; the host sweeps a
//! 64-bit counter space across one or more devices and re-derives every GPU
//! hit on the CPU before reporting it.

pub mod address;
pub mod bench;
pub mod buffers;
pub mod crypto;
pub mod error;
pub mod monitor;
pub mod opencl;
pub mod pattern;
pub mod search;
pub mod wordlist;

pub use buffers::{GpuHit, SearchBuffers, ENTROPY_SIZE, MAX_HITS};
pub use crypto::{CryptoEngine, DerivedAddress};
pub use error::*;
pub use opencl::{DeviceInfo, GpuContext, GpuProgram};
pub use pattern::PatternSet;
pub use search::{MultiDeviceSearch, SearchConfig, SearchOutcome, SearchPipeline, VanityMatch};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffers::{GpuHit, SearchBuffers, ENTROPY_SIZE, MAX_HITS};
    pub use crate::crypto::{CryptoEngine, DerivedAddress};
    pub use crate::error::*;
    pub use crate::opencl::{DeviceInfo, GpuContext, GpuProgram};
    pub use crate::pattern::PatternSet;
    pub use crate::search::{
        MultiDeviceSearch, SearchConfig, SearchOutcome, SearchPipeline, VanityMatch,
    };
    pub use anyhow::{Context, Result};
}


/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default work items per kernel launch
pub const DEFAULT_BATCH_SIZE: usize = 1 << 18; // 262,144

/// Maximum number of patterns per search
pub const MAX_PATTERNS: usize = 64;

/// Maximum length of a single pattern in bytes
pub const MAX_PATTERN_LEN: usize = 32;

/// Maximum total pattern bytes per search
pub const MAX_PATTERN_DATA: usize = 1024;

/// Maximum BIP44 address indices checked per seed
pub const MAX_ADDRESS_INDICES: u32 = 100;

/// SLIP-0044 coin type for Ergo
pub const ERGO_COIN_TYPE: u32 = 429;
