//! Backend trait definitions
//!
//! A backend exposes the native compute API (OpenCL through `ocl`, or the
//! simulated backend used in tests) through opaque handle types. Contexts
//! and kernel runtimes are generic over this trait.

use crate::config::RuntimeConfig;
use crate::device::{DeviceInfo, PlatformInfo};
use crate::error::Result;
use std::fmt;

/// Surface sharing requested when creating a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextSharing {
    #[default]
    None,
    /// Share surfaces with the current graphics (GL) context
    Graphics,
}

/// Resource requirements of a compiled entry point on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelWorkGroupInfo {
    /// Local (shared) memory used by the kernel in bytes
    pub local_memory_bytes: u64,
    /// Preferred multiple of the work-group size
    pub preferred_multiple: usize,
    /// Largest work-group size the kernel can be launched with
    pub max_work_group_size: usize,
}

/// Native compute API as seen by the core
pub trait ComputeBackend {
    type Platform: Clone + fmt::Debug;
    type Device: Clone + fmt::Debug;
    type Context;
    type Queue;
    type Program;

    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Enumerate platforms in driver order
    fn platforms(&self) -> Result<Vec<Self::Platform>>;

    fn platform_info(&self, platform: &Self::Platform) -> Result<PlatformInfo>;

    /// Enumerate all devices of a platform in driver order
    fn devices(&self, platform: &Self::Platform) -> Result<Vec<Self::Device>>;

    fn device_info(&self, device: &Self::Device) -> Result<DeviceInfo>;

    /// The platform owning a device
    fn device_platform(&self, device: &Self::Device) -> Result<Self::Platform>;

    /// Whether the backend can create graphics-sharing contexts at all
    fn supports_graphics_interop(&self) -> bool {
        false
    }

    /// Apply runtime configuration before any context is created
    fn configure(&mut self, _config: &RuntimeConfig) {}

    fn create_context(
        &self,
        platform: &Self::Platform,
        device: &Self::Device,
        sharing: ContextSharing,
    ) -> Result<Self::Context>;

    /// Create an in-order command queue
    fn create_queue(
        &self,
        context: &Self::Context,
        device: &Self::Device,
        profiling: bool,
    ) -> Result<Self::Queue>;

    /// Compile source with the given flag string
    ///
    /// Compilation errors must be reported as
    /// [`ComputeError::BuildFailure`](crate::ComputeError::BuildFailure)
    /// carrying the compiler log.
    fn build_program(
        &self,
        context: &Self::Context,
        device: &Self::Device,
        source: &str,
        flags: &str,
    ) -> Result<Self::Program>;

    /// Compiler output of a successful build
    fn build_log(&self, _program: &Self::Program, _device: &Self::Device) -> Result<String> {
        Ok(String::new())
    }

    /// Names of the kernels in a compiled program
    fn entry_points(&self, program: &Self::Program) -> Result<Vec<String>>;

    fn work_group_info(
        &self,
        program: &Self::Program,
        entry_point: &str,
        device: &Self::Device,
    ) -> Result<KernelWorkGroupInfo>;

    /// Descriptors of every platform and its devices
    fn describe(&self) -> Result<Vec<(PlatformInfo, Vec<DeviceInfo>)>> {
        self.platforms()?
            .iter()
            .map(|platform| {
                let devices = self
                    .devices(platform)?
                    .iter()
                    .map(|d| self.device_info(d))
                    .collect::<Result<Vec<_>>>()?;
                Ok((self.platform_info(platform)?, devices))
            })
            .collect()
    }
}
