//! Compute context
//!
//! Binds one platform and one selected device of a backend, plus the native
//! context created for them. Capability queries read the descriptors taken
//! at construction and never go back to the driver.

use crate::config::RuntimeConfig;
use crate::device::{
    DeviceClass, DeviceInfo, EXT_FP16, EXT_FP64, EXT_GL_SHARING, PlatformInfo, select_device,
};
use crate::error::{ComputeError, Result};
use crate::traits::{ComputeBackend, ContextSharing};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Options for [`ComputeContext::initialize`]
#[derive(Debug, Clone)]
pub struct ContextOptions<D> {
    /// Prefer the first GPU over the first CPU
    pub prefer_gpu: bool,
    /// Use this device directly instead of enumerating
    pub device: Option<D>,
    /// Attempt a graphics-sharing context when the device allows it
    pub graphics_interop: bool,
    pub config: RuntimeConfig,
}

impl<D> Default for ContextOptions<D> {
    fn default() -> Self {
        Self {
            prefer_gpu: true,
            device: None,
            graphics_interop: true,
            config: RuntimeConfig::default(),
        }
    }
}

impl<D> ContextOptions<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer_gpu(mut self, prefer_gpu: bool) -> Self {
        self.prefer_gpu = prefer_gpu;
        self
    }

    pub fn device(mut self, device: D) -> Self {
        self.device = Some(device);
        self
    }

    pub fn graphics_interop(mut self, enabled: bool) -> Self {
        self.graphics_interop = enabled;
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }
}

/// A platform, a selected device and the native context built for them
pub struct ComputeContext<B: ComputeBackend> {
    id: u64,
    backend: B,
    platform: B::Platform,
    platform_info: PlatformInfo,
    device: B::Device,
    device_info: DeviceInfo,
    raw: B::Context,
    using_gpu: bool,
    graphics_interop: bool,
    config: RuntimeConfig,
}

impl<B: ComputeBackend> ComputeContext<B> {
    /// Select a device and create the context
    ///
    /// Without an explicit device only the first platform is searched.
    pub fn initialize(mut backend: B, options: ContextOptions<B::Device>) -> Result<Self> {
        backend.configure(&options.config);

        let explicit = options.device.is_some();
        let (platform, device) = match options.device {
            Some(device) => {
                let platform = backend.device_platform(&device)?;
                (platform, device)
            }
            None => Self::select(&backend, options.prefer_gpu)?,
        };

        let platform_info = backend.platform_info(&platform)?;
        let device_info = backend.device_info(&device)?;
        // An explicit device states the request by its own kind
        let using_gpu = if explicit {
            device_info.is_gpu()
        } else {
            options.prefer_gpu
        };

        debug!(
            "Initialising {} runtime - {}",
            backend.name(),
            platform_info.name
        );
        info!(
            "Using {} - {} ({}) for compute",
            device_info.kind, device_info.name, device_info.version
        );

        let mut context = Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            raw: backend.create_context(&platform, &device, ContextSharing::None)?,
            backend,
            platform,
            platform_info,
            device,
            device_info,
            using_gpu,
            graphics_interop: false,
            config: options.config,
        };

        if options.graphics_interop {
            context.try_enable_graphics_interop();
        }

        Ok(context)
    }

    fn select(backend: &B, prefer_gpu: bool) -> Result<(B::Platform, B::Device)> {
        let platform = backend
            .platforms()?
            .into_iter()
            .next()
            .ok_or(ComputeError::NoPlatformAvailable)?;

        let mut devices = backend.devices(&platform)?;
        let infos = devices
            .iter()
            .map(|d| backend.device_info(d))
            .collect::<Result<Vec<_>>>()?;

        match select_device(&infos, prefer_gpu) {
            Some(index) => Ok((platform, devices.swap_remove(index))),
            None => Err(ComputeError::NoDeviceAvailable {
                platform: backend.platform_info(&platform)?.name,
            }),
        }
    }

    /// Whether a graphics-sharing context may be attempted
    pub fn graphics_interop_eligible(&self) -> bool {
        self.using_gpu
            && self.backend.supports_graphics_interop()
            && self.has_graphics_sharing_extension()
    }

    /// Recreate the native context with graphics sharing
    ///
    /// Returns whether interop is enabled afterwards. A failed attempt keeps
    /// the plain context and is only logged.
    pub fn try_enable_graphics_interop(&mut self) -> bool {
        if self.graphics_interop {
            return true;
        }
        if !self.graphics_interop_eligible() {
            debug!("Graphics interop not available for {}", self.device_info.name);
            return false;
        }

        match self
            .backend
            .create_context(&self.platform, &self.device, ContextSharing::Graphics)
        {
            Ok(raw) => {
                self.raw = raw;
                self.graphics_interop = true;
                info!("Graphics interop enabled on {}", self.device_info.name);
            }
            Err(e) => {
                let e = ComputeError::GraphicsInteropUnavailable(e.to_string());
                warn!("Issue with graphics sharing at runtime, using a plain context: {}", e);
            }
        }
        self.graphics_interop
    }

    /// Process-unique identifier of this context
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn platform(&self) -> &B::Platform {
        &self.platform
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// The native context handle
    pub fn raw(&self) -> &B::Context {
        &self.raw
    }

    pub fn platform_info(&self) -> &PlatformInfo {
        &self.platform_info
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Whether the caller asked for a GPU, or chose one explicitly
    pub fn is_using_gpu(&self) -> bool {
        self.using_gpu
    }

    pub fn graphics_interop_enabled(&self) -> bool {
        self.graphics_interop
    }

    fn has_extension(&self, extension: &str) -> bool {
        self.platform_info.has_extension(extension) || self.device_info.has_extension(extension)
    }

    pub fn has_half_precision(&self) -> bool {
        self.has_extension(EXT_FP16)
    }

    pub fn has_double_precision(&self) -> bool {
        self.has_extension(EXT_FP64)
    }

    pub fn has_graphics_sharing_extension(&self) -> bool {
        self.has_extension(EXT_GL_SHARING)
    }

    pub fn compute_unit_count(&self) -> u32 {
        self.device_info.compute_units
    }

    pub fn local_memory_bytes(&self) -> u64 {
        self.device_info.local_memory_bytes
    }

    pub fn global_memory_bytes(&self) -> u64 {
        self.device_info.global_memory_bytes
    }

    pub fn max_work_group_size(&self) -> usize {
        self.device_info.max_work_group_size
    }

    /// Largest 2D image as (width, height)
    pub fn max_2d_image_dimensions(&self) -> (usize, usize) {
        self.device_info.image2d_max
    }

    /// Largest 3D image as (width, height, depth)
    pub fn max_3d_image_dimensions(&self) -> (usize, usize, usize) {
        self.device_info.image3d_max
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.device_info.class()
    }

    /// Hint that the device shares physical memory with the host
    ///
    /// Derived from the device name, see [`DeviceInfo::class`]. Use it to
    /// choose between host-pointer and copy-based buffers, never for
    /// correctness.
    pub fn shared_memory_with_host(&self) -> bool {
        self.device_class() == Some(DeviceClass::IntegratedIntelGpu)
    }
}

impl<B: ComputeBackend> fmt::Debug for ComputeContext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeContext")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .field("platform", &self.platform_info.name)
            .field("device", &self.device_info.name)
            .field("kind", &self.device_info.kind)
            .field("graphics_interop", &self.graphics_interop)
            .finish()
    }
}
