//! OpenCL device discovery, context setup, and program compilation
//!
//! Devices are addressed by a global index across all platforms so the CLI
//! can say `--devices 0,2`. Each context owns a single serial command
//! queue; multi-device search builds one context per device.

use crate::error::{GpuError, Result};
use ocl::{Context, Device, DeviceType, Platform, Program, Queue};
use tracing::{debug, info};

/// Kernel source files embedded at compile time.
pub mod sources {
    pub const SHA256: &str = include_str!("kernels/sha256.cl");
    pub const SHA512: &str = include_str!("kernels/sha512.cl");
    pub const HMAC_SHA512: &str = include_str!("kernels/hmac_sha512.cl");
    pub const PBKDF2: &str = include_str!("kernels/pbkdf2.cl");
    pub const SECP256K1_FE: &str = include_str!("kernels/secp256k1_fe.cl");
    pub const SECP256K1_SCALAR: &str = include_str!("kernels/secp256k1_scalar.cl");
    pub const SECP256K1_POINT: &str = include_str!("kernels/secp256k1_point.cl");
    pub const BLAKE2B: &str = include_str!("kernels/blake2b.cl");
    pub const BASE58: &str = include_str!("kernels/base58.cl");
    pub const BIP39: &str = include_str!("kernels/bip39.cl");
    pub const BIP32: &str = include_str!("kernels/bip32.cl");
    pub const VANITY: &str = include_str!("kernels/vanity.cl");
    pub const BENCH: &str = include_str!("kernels/bench.cl");

    // Test kernels, compiled only for unit tests or --features test-kernels
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const SHA256_TEST: &str = include_str!("kernels/sha256_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const SHA512_TEST: &str = include_str!("kernels/sha512_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const HMAC_SHA512_TEST: &str = include_str!("kernels/hmac_sha512_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const PBKDF2_TEST: &str = include_str!("kernels/pbkdf2_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const SECP256K1_FE_TEST: &str = include_str!("kernels/secp256k1_fe_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const SECP256K1_SCALAR_TEST: &str =
        include_str!("kernels/secp256k1_scalar_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const SECP256K1_POINT_TEST: &str = include_str!("kernels/secp256k1_point_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const BLAKE2B_TEST: &str = include_str!("kernels/blake2b_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const BASE58_TEST: &str = include_str!("kernels/base58_test.cl");
    #[cfg(any(test, feature = "test-kernels"))]
    pub(crate) const VANITY_TEST: &str = include_str!("kernels/vanity_test.cl");
}

/// Information about one GPU device.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    /// Global index across all platforms (CLI selection key)
    pub global_idx: usize,
    /// Platform index
    pub platform_idx: usize,
    /// Device index within that platform's GPU list
    pub device_idx: usize,
    /// Platform name
    pub platform_name: String,
    /// Device name
    pub device_name: String,
    /// Device vendor
    pub vendor: String,
    /// Max compute units
    pub compute_units: u32,
    /// Max work group size
    pub max_work_group_size: usize,
    /// Global memory size in bytes
    pub global_mem_size: u64,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} - {} ({} CUs, {} MB global)",
            self.global_idx,
            self.vendor.trim(),
            self.device_name.trim(),
            self.compute_units,
            self.global_mem_size / (1024 * 1024)
        )
    }
}

/// OpenCL context bound to one GPU device.
pub struct GpuContext {
    context: Context,
    device: Device,
    queue: Queue,
    info: DeviceInfo,
}

impl GpuContext {
    /// Create a context for the first available GPU.
    pub fn new() -> Result<Self> {
        Self::with_device(0)
    }

    /// Create a context for a specific global device index.
    pub fn with_device(global_idx: usize) -> Result<Self> {
        Self::with_device_impl(global_idx, false)
    }

    /// Create a context with event profiling enabled (benchmark mode).
    pub fn with_device_profiling(global_idx: usize) -> Result<Self> {
        Self::with_device_impl(global_idx, true)
    }

    fn with_device_impl(global_idx: usize, profiling: bool) -> Result<Self> {
        let devices = Self::enumerate_devices()?;
        if devices.is_empty() {
            return Err(GpuError::NoDevices.into());
        }
        let info = devices
            .get(global_idx)
            .ok_or(GpuError::DeviceIndexOutOfRange(global_idx, devices.len()))?
            .clone();

        let platforms = Platform::list();
        let platform = *platforms.get(info.platform_idx).ok_or(GpuError::NoPlatforms)?;

        let gpus = Device::list(platform, Some(DeviceType::GPU)).map_err(GpuError::from)?;
        let device = gpus
            .get(info.device_idx)
            .cloned()
            .ok_or(GpuError::NoDevices)?;

        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(GpuError::from)?;

        let queue_props = if profiling {
            Some(ocl::flags::CommandQueueProperties::PROFILING_ENABLE)
        } else {
            None
        };
        let queue = Queue::new(&context, device, queue_props).map_err(GpuError::from)?;

        info!("Selected OpenCL device: {}", info);

        Ok(Self {
            context,
            device,
            queue,
            info,
        })
    }

    /// Enumerate all GPU devices across all platforms.
    pub fn enumerate_devices() -> Result<Vec<DeviceInfo>> {
        let platforms = Platform::list();
        if platforms.is_empty() {
            return Err(GpuError::NoPlatforms.into());
        }

        let mut out = Vec::new();
        let mut global_idx = 0usize;

        for (platform_idx, platform) in platforms.iter().enumerate() {
            let platform_name = platform
                .info(ocl::enums::PlatformInfo::Name)
                .map(|i| i.to_string())
                .unwrap_or_else(|_| "Unknown".into());

            let gpus = Device::list(*platform, Some(DeviceType::GPU)).unwrap_or_default();

            for (device_idx, device) in gpus.iter().enumerate() {
                let device_name = device
                    .info(ocl::enums::DeviceInfo::Name)
                    .map(|i| i.to_string())
                    .unwrap_or_else(|_| "Unknown".into());

                let vendor = device
                    .info(ocl::enums::DeviceInfo::Vendor)
                    .map(|i| i.to_string())
                    .unwrap_or_else(|_| "Unknown".into());

                let compute_units = device
                    .info(ocl::enums::DeviceInfo::MaxComputeUnits)
                    .map(|i| match i {
                        ocl::enums::DeviceInfoResult::MaxComputeUnits(n) => n,
                        _ => 0,
                    })
                    .unwrap_or(0);

                let max_work_group_size = device
                    .info(ocl::enums::DeviceInfo::MaxWorkGroupSize)
                    .map(|i| match i {
                        ocl::enums::DeviceInfoResult::MaxWorkGroupSize(n) => n,
                        _ => 256,
                    })
                    .unwrap_or(256);

                let global_mem_size = device
                    .info(ocl::enums::DeviceInfo::GlobalMemSize)
                    .map(|i| match i {
                        ocl::enums::DeviceInfoResult::GlobalMemSize(n) => n,
                        _ => 0,
                    })
                    .unwrap_or(0);

                out.push(DeviceInfo {
                    global_idx,
                    platform_idx,
                    device_idx,
                    platform_name: platform_name.clone(),
                    device_name,
                    vendor,
                    compute_units,
                    max_work_group_size,
                    global_mem_size,
                });

                global_idx += 1;
            }
        }

        Ok(out)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

/// A compiled OpenCL program.
pub struct GpuProgram {
    program: Program,
}

impl GpuProgram {
    /// Compile a program from source for the context's device.
    pub fn from_source(ctx: &GpuContext, source: &str) -> Result<Self> {
        debug!("Compiling OpenCL program ({} bytes of source)", source.len());
        let program = Program::builder()
            .src(source)
            .devices(ctx.device())
            .cmplr_opt("-cl-std=CL1.2")
            .build(ctx.context())
            .map_err(|e| GpuError::KernelCompilation(e.to_string()))?;
        Ok(Self { program })
    }

    /// Concatenate kernel sources in dependency order with separators that
    /// keep compiler line numbers attributable.
    fn concat(parts: &[(&str, &str)]) -> String {
        let total: usize = parts.iter().map(|(_, s)| s.len() + 32).sum();
        let mut combined = String::with_capacity(total);
        for (name, source) in parts {
            combined.push_str("// === ");
            combined.push_str(name);
            combined.push_str(" ===\n");
            combined.push_str(source);
            combined.push('\n');
        }
        combined
    }

    /// All production kernels: the full vanity search pipeline.
    pub fn vanity(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("sha256.cl", sources::SHA256),
            ("sha512.cl", sources::SHA512),
            ("hmac_sha512.cl", sources::HMAC_SHA512),
            ("pbkdf2.cl", sources::PBKDF2),
            ("secp256k1_fe.cl", sources::SECP256K1_FE),
            ("secp256k1_scalar.cl", sources::SECP256K1_SCALAR),
            ("secp256k1_point.cl", sources::SECP256K1_POINT),
            ("blake2b.cl", sources::BLAKE2B),
            ("base58.cl", sources::BASE58),
            ("bip39.cl", sources::BIP39),
            ("bip32.cl", sources::BIP32),
            ("vanity.cl", sources::VANITY),
        ]);
        Self::from_source(ctx, &combined)
    }

    /// Pipeline kernels plus the per-stage benchmark entry points.
    pub fn bench(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("sha256.cl", sources::SHA256),
            ("sha512.cl", sources::SHA512),
            ("hmac_sha512.cl", sources::HMAC_SHA512),
            ("pbkdf2.cl", sources::PBKDF2),
            ("secp256k1_fe.cl", sources::SECP256K1_FE),
            ("secp256k1_scalar.cl", sources::SECP256K1_SCALAR),
            ("secp256k1_point.cl", sources::SECP256K1_POINT),
            ("blake2b.cl", sources::BLAKE2B),
            ("base58.cl", sources::BASE58),
            ("bip39.cl", sources::BIP39),
            ("bip32.cl", sources::BIP32),
            ("bench.cl", sources::BENCH),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

#[cfg(any(test, feature = "test-kernels"))]
impl GpuProgram {
    pub fn sha256_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("sha256.cl", sources::SHA256),
            ("sha256_test.cl", sources::SHA256_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn sha512_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("sha512.cl", sources::SHA512),
            ("sha512_test.cl", sources::SHA512_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn hmac_sha512_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("sha512.cl", sources::SHA512),
            ("hmac_sha512.cl", sources::HMAC_SHA512),
            ("hmac_sha512_test.cl", sources::HMAC_SHA512_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn pbkdf2_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("sha512.cl", sources::SHA512),
            ("hmac_sha512.cl", sources::HMAC_SHA512),
            ("pbkdf2.cl", sources::PBKDF2),
            ("pbkdf2_test.cl", sources::PBKDF2_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn secp256k1_fe_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("secp256k1_fe.cl", sources::SECP256K1_FE),
            ("secp256k1_fe_test.cl", sources::SECP256K1_FE_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn secp256k1_scalar_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("secp256k1_scalar.cl", sources::SECP256K1_SCALAR),
            ("secp256k1_scalar_test.cl", sources::SECP256K1_SCALAR_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn secp256k1_point_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("secp256k1_fe.cl", sources::SECP256K1_FE),
            ("secp256k1_scalar.cl", sources::SECP256K1_SCALAR),
            ("secp256k1_point.cl", sources::SECP256K1_POINT),
            ("secp256k1_point_test.cl", sources::SECP256K1_POINT_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn blake2b_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("blake2b.cl", sources::BLAKE2B),
            ("blake2b_test.cl", sources::BLAKE2B_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }

    pub fn base58_test(ctx: &GpuContext) -> Result<Self> {
        let combined = Self::concat(&[
            ("base58.cl", sources::BASE58),
            ("base58_test.cl", sources::BASE58_TEST),
            ("vanity_test.cl", sources::VANITY_TEST),
        ]);
        Self::from_source(ctx, &combined)
    }
}

/// Try to create a GPU context, returning None when no device is available.
/// Tests use this to skip gracefully; panics from ICD-less OpenCL runtimes
/// are caught too.
#[cfg(test)]
pub(crate) fn try_ctx() -> Option<GpuContext> {
    match std::panic::catch_unwind(GpuContext::new) {
        Ok(Ok(ctx)) => Some(ctx),
        Ok(Err(e)) => {
            eprintln!("Skipping GPU test (no OpenCL device available): {e}");
            None
        }
        Err(_) => {
            eprintln!("Skipping GPU test (OpenCL runtime panicked - likely no ICD installed)");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerate_devices_does_not_crash() {
        match std::panic::catch_unwind(GpuContext::enumerate_devices) {
            Ok(Ok(devices)) => {
                println!("OpenCL GPU devices found: {}", devices.len());
                for dev in &devices {
                    println!("  {}", dev);
                }
            }
            Ok(Err(e)) => eprintln!("Skipping enumerate test: {e}"),
            Err(_) => eprintln!("Skipping enumerate test (OpenCL runtime panicked)"),
        }
    }

    #[test]
    fn test_create_context() {
        let Some(ctx) = try_ctx() else { return };
        println!("Created context for: {}", ctx.info());
    }
}
