//! Platform and device descriptors
//!
//! Backends enumerate their native handles and describe each one with the
//! plain structs in this module. Everything downstream (device selection,
//! capability queries) works on these descriptors only, so it can be tested
//! without a driver.

use std::fmt;

/// Extension identifier for half-precision arithmetic
pub const EXT_FP16: &str = "cl_khr_fp16";
/// Extension identifier for double-precision arithmetic
pub const EXT_FP64: &str = "cl_khr_fp64";
/// Extension identifier for OpenGL surface sharing
pub const EXT_GL_SHARING: &str = "cl_khr_gl_sharing";

/// Device kind as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceKind {
    #[default]
    Gpu,
    Cpu,
    Accelerator,
    Other,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "GPU"),
            Self::Cpu => write!(f, "CPU"),
            Self::Accelerator => write!(f, "Accelerator"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Coarse hardware family recognised from vendor and name strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// On-die Intel GPU sharing physical memory with the host
    IntegratedIntelGpu,
}

/// Descriptor of a compute platform (driver instance)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub extensions: Vec<String>,
}

impl PlatformInfo {
    /// Create a descriptor with a name and no extensions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add extension identifiers
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Check whether the platform advertises an extension
    pub fn has_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }
}

/// Descriptor of a single device
///
/// Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub kind: DeviceKind,
    pub compute_units: u32,
    pub local_memory_bytes: u64,
    pub global_memory_bytes: u64,
    pub max_work_group_size: usize,
    pub max_work_item_sizes: Vec<usize>,
    pub image2d_max: (usize, usize),
    pub image3d_max: (usize, usize, usize),
    pub host_unified_memory: bool,
    pub extensions: Vec<String>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            vendor: String::new(),
            version: String::new(),
            kind: DeviceKind::Gpu,
            compute_units: 1,
            local_memory_bytes: 32 * 1024,
            global_memory_bytes: 1024 * 1024 * 1024,
            max_work_group_size: 256,
            max_work_item_sizes: vec![256, 256, 256],
            image2d_max: (8192, 8192),
            image3d_max: (2048, 2048, 2048),
            host_unified_memory: false,
            extensions: Vec::new(),
        }
    }
}

impl DeviceInfo {
    /// Create a descriptor of the given kind
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn with_compute_units(mut self, compute_units: u32) -> Self {
        self.compute_units = compute_units;
        self
    }

    pub fn with_memory(mut self, local_bytes: u64, global_bytes: u64) -> Self {
        self.local_memory_bytes = local_bytes;
        self.global_memory_bytes = global_bytes;
        self
    }

    pub fn with_max_work_group_size(mut self, size: usize) -> Self {
        self.max_work_group_size = size;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(extensions.into_iter().map(Into::into));
        self
    }

    pub fn is_gpu(&self) -> bool {
        self.kind == DeviceKind::Gpu
    }

    pub fn is_cpu(&self) -> bool {
        self.kind == DeviceKind::Cpu
    }

    /// Check whether the device itself advertises an extension
    pub fn has_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    /// Recognise the hardware family from the device name
    ///
    /// Only Intel UHD integrated graphics are recognised. This is string
    /// matching, not a hardware query.
    pub fn class(&self) -> Option<DeviceClass> {
        if self.is_gpu() && self.name.contains("Intel(R) UHD Graphics") {
            Some(DeviceClass::IntegratedIntelGpu)
        } else {
            None
        }
    }
}

/// Split a space-separated extension string as returned by drivers
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Pick a device index from an enumerated list
///
/// With `prefer_gpu` the first GPU wins; otherwise, or when there is no
/// GPU, the first CPU. Accelerators and other kinds are never picked.
pub fn select_device(devices: &[DeviceInfo], prefer_gpu: bool) -> Option<usize> {
    let first_of = |kind: DeviceKind| devices.iter().position(|d| d.kind == kind);

    if prefer_gpu && let Some(index) = first_of(DeviceKind::Gpu) {
        return Some(index);
    }
    first_of(DeviceKind::Cpu)
}
