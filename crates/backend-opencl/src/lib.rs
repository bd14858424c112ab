//! OpenCL backend for clsim
//!
//! Implements [`ComputeBackend`] on top of the `ocl` crate.
//!
//! # Usage
//!
//! ```no_run
//! use clsim_backend_opencl::OpenCLBackend;
//! use clsim_core::{BuildOptions, ComputeContext, ContextOptions, KernelRuntime};
//! use std::sync::Arc;
//!
//! let context = ComputeContext::initialize(OpenCLBackend::new(), ContextOptions::default())?;
//! let runtime = KernelRuntime::create(
//!     Arc::new(context),
//!     "__kernel void noop() {}",
//!     BuildOptions::new(),
//! )?;
//! println!("max work-group size: {:?}", runtime.max_work_group_size(0));
//! # Ok::<(), clsim_core::ComputeError>(())
//! ```

mod compiler;
mod device;
mod kernel;

pub use device::OpenCLError;

use clsim_core::{
    ComputeBackend, ContextSharing, DeviceInfo, KernelWorkGroupInfo, PlatformInfo, Result,
    RuntimeConfig,
};
use log::debug;
use ocl::flags::CommandQueueProperties;
use ocl::{Context, Device, Platform, Program, Queue};
use std::ffi::c_void;

/// OpenCL backend
///
/// Graphics sharing is only possible when the caller hands over the native
/// handle of a current GL context.
#[derive(Debug, Clone, Default)]
pub struct OpenCLBackend {
    gl_context: Option<usize>,
}

impl OpenCLBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable graphics sharing with a GL context
    ///
    /// `handle` is the platform's native GL context handle (GLXContext,
    /// HGLRC, CGLContextObj). It is only read when a context is created.
    pub fn with_gl_context(mut self, handle: *mut c_void) -> Self {
        self.gl_context = Some(handle as usize);
        self
    }

    /// Whether any OpenCL platform is installed
    pub fn is_available() -> bool {
        !Platform::list().is_empty()
    }
}

impl ComputeBackend for OpenCLBackend {
    type Platform = Platform;
    type Device = Device;
    type Context = Context;
    type Queue = Queue;
    type Program = Program;

    fn name(&self) -> &str {
        "OpenCL"
    }

    fn platforms(&self) -> Result<Vec<Platform>> {
        Ok(Platform::list())
    }

    fn platform_info(&self, platform: &Platform) -> Result<PlatformInfo> {
        Ok(device::platform_info(platform)?)
    }

    fn devices(&self, platform: &Platform) -> Result<Vec<Device>> {
        Ok(Device::list_all(platform).map_err(OpenCLError::from)?)
    }

    fn device_info(&self, device: &Device) -> Result<DeviceInfo> {
        Ok(device::device_info(device)?)
    }

    fn device_platform(&self, device: &Device) -> Result<Platform> {
        Ok(device::device_platform(device)?)
    }

    fn supports_graphics_interop(&self) -> bool {
        self.gl_context.is_some()
    }

    fn configure(&mut self, config: &RuntimeConfig) {
        if config.program_cache {
            debug!("OpenCL backend keeps no program cache; every build compiles from source");
        }
    }

    fn create_context(
        &self,
        platform: &Platform,
        device: &Device,
        sharing: ContextSharing,
    ) -> Result<Context> {
        let mut builder = Context::builder();
        builder.platform(*platform).devices(*device);

        if sharing == ContextSharing::Graphics {
            let handle = self.gl_context.ok_or_else(|| {
                OpenCLError::from("no GL context handle configured".to_string())
            })?;
            builder.gl_context(handle as *mut c_void);
        }

        Ok(builder.build().map_err(OpenCLError::from)?)
    }

    fn create_queue(&self, context: &Context, device: &Device, profiling: bool) -> Result<Queue> {
        let properties = profiling.then_some(CommandQueueProperties::PROFILING_ENABLE);
        Ok(Queue::new(context, *device, properties).map_err(OpenCLError::from)?)
    }

    fn build_program(
        &self,
        context: &Context,
        device: &Device,
        source: &str,
        flags: &str,
    ) -> Result<Program> {
        compiler::build(context, device, source, flags)
    }

    fn build_log(&self, program: &Program, device: &Device) -> Result<String> {
        Ok(compiler::build_log(program, device)?)
    }

    fn entry_points(&self, program: &Program) -> Result<Vec<String>> {
        Ok(kernel::entry_points(program)?)
    }

    fn work_group_info(
        &self,
        program: &Program,
        entry_point: &str,
        device: &Device,
    ) -> Result<KernelWorkGroupInfo> {
        Ok(kernel::work_group_info(program, entry_point, device)?)
    }
}
