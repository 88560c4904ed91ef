//! Error types for the Ergo vanity address generator

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum VanityError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Search configuration and pattern validation errors.
///
/// All of these are raised before any GPU work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("at least one pattern is required")]
    NoPatterns,

    #[error("pattern must not be empty")]
    EmptyPattern,

    #[error("pattern '{pattern}' too long: {len} chars exceeds {max} limit")]
    PatternTooLong {
        pattern: String,
        len: usize,
        max: usize,
    },

    #[error("too many patterns: {count} exceeds {max} limit")]
    TooManyPatterns { count: usize, max: usize },

    #[error("pattern data too large: {total} bytes exceeds {max} limit")]
    PatternDataTooLarge { total: usize, max: usize },

    #[error("pattern '{0}' contains non-ASCII characters")]
    NonAsciiPattern(String),

    #[error(
        "pattern '{pattern}' contains invalid Base58 character '{ch}' \
         (valid: 123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz)"
    )]
    InvalidBase58Char { pattern: String, ch: char },

    #[error(
        "invalid pattern '{0}': mainnet P2PK addresses start with 9e/9f/9g/9h/9i (or just '9')"
    )]
    ImpossiblePrefix(String),

    #[error(
        "invalid pattern '{pattern}': second char '{ch}' is uppercase but --ignore-case \
         not set (use -i or lowercase to 9{lower}...)"
    )]
    UppercaseSecondChar {
        pattern: String,
        ch: char,
        lower: char,
    },

    #[error("address index count {0} outside 1..=100")]
    InvalidIndexCount(u32),

    #[error("max results must be at least 1")]
    InvalidMaxResults,

    #[error("batch size must be greater than 0")]
    InvalidBatchSize,
}

/// Host-side verification errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("BIP39 error: {0}")]
    Bip39(String),

    #[error("BIP32 derivation error: {0}")]
    Bip32(String),

    #[error("PBKDF2 error: {0}")]
    Pbkdf2(String),

    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] bitcoin::secp256k1::Error),

    #[error("invalid entropy length {0}: expected 32 bytes")]
    InvalidEntropyLength(usize),

    #[error("pattern index {0} out of range")]
    PatternIndexOutOfRange(usize),
}

/// OpenCL device and kernel errors
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No OpenCL platforms found")]
    NoPlatforms,

    #[error("No OpenCL GPU devices found")]
    NoDevices,

    #[error("Device index {0} out of range (found {1} devices)")]
    DeviceIndexOutOfRange(usize, usize),

    #[error("Kernel compilation failed: {0}")]
    KernelCompilation(String),

    #[error("Buffer operation failed: {0}")]
    Buffer(String),

    #[error("Kernel execution failed: {0}")]
    KernelExecution(String),

    #[error("OpenCL error: {0}")]
    Ocl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VanityError>;

impl From<ocl::Error> for GpuError {
    fn from(err: ocl::Error) -> Self {
        GpuError::Ocl(err.to_string())
    }
}

impl From<ocl::Error> for VanityError {
    fn from(err: ocl::Error) -> Self {
        VanityError::Gpu(GpuError::Ocl(err.to_string()))
    }
}

impl From<bitcoin::bip32::Error> for CryptoError {
    fn from(err: bitcoin::bip32::Error) -> Self {
        CryptoError::Bip32(err.to_string())
    }
}

impl From<bip39::Error> for CryptoError {
    fn from(err: bip39::Error) -> Self {
        CryptoError::Bip39(err.to_string())
    }
}

impl From<anyhow::Error> for VanityError {
    fn from(err: anyhow::Error) -> Self {
        VanityError::Internal(err.to_string())
    }
}
