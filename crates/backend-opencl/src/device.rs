//! OpenCL platform and device queries

use clsim_core::device::parse_extensions;
use clsim_core::{ComputeError, DeviceInfo, DeviceKind, PlatformInfo};
use ocl::core::{
    DeviceInfo as ClDeviceInfo, DeviceInfoResult, PlatformInfo as ClPlatformInfo,
    PlatformInfoResult,
};
use ocl::{Device, DeviceType, Platform};

/// Error type for OpenCL native operations
#[derive(Debug, Clone)]
pub struct OpenCLError(String);

impl std::fmt::Display for OpenCLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenCL error: {}", self.0)
    }
}

impl std::error::Error for OpenCLError {}

impl From<ocl::Error> for OpenCLError {
    fn from(e: ocl::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<ocl::core::Error> for OpenCLError {
    fn from(e: ocl::core::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<String> for OpenCLError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<OpenCLError> for ComputeError {
    fn from(e: OpenCLError) -> Self {
        ComputeError::Backend(e.0)
    }
}

/// Describe a platform
pub(crate) fn platform_info(platform: &Platform) -> Result<PlatformInfo, OpenCLError> {
    let extensions = match platform.info(ClPlatformInfo::Extensions)? {
        PlatformInfoResult::Extensions(s) => parse_extensions(&s),
        other => return Err(unexpected("platform extensions", other)),
    };

    Ok(PlatformInfo {
        name: platform.name()?,
        vendor: platform.vendor()?,
        version: platform.version()?,
        extensions,
    })
}

/// Describe a device
///
/// Every capability is read from the driver; a failed query fails the whole
/// description.
pub(crate) fn device_info(device: &Device) -> Result<DeviceInfo, OpenCLError> {
    let kind = match device.info(ClDeviceInfo::Type)? {
        DeviceInfoResult::Type(t) => device_kind(t),
        other => return Err(unexpected("device type", other)),
    };

    let compute_units = match device.info(ClDeviceInfo::MaxComputeUnits)? {
        DeviceInfoResult::MaxComputeUnits(n) => n,
        other => return Err(unexpected("compute units", other)),
    };

    let local_memory_bytes = match device.info(ClDeviceInfo::LocalMemSize)? {
        DeviceInfoResult::LocalMemSize(n) => n,
        other => return Err(unexpected("local memory size", other)),
    };

    let global_memory_bytes = match device.info(ClDeviceInfo::GlobalMemSize)? {
        DeviceInfoResult::GlobalMemSize(n) => n,
        other => return Err(unexpected("global memory size", other)),
    };

    let max_work_item_sizes = match device.info(ClDeviceInfo::MaxWorkItemSizes)? {
        DeviceInfoResult::MaxWorkItemSizes(sizes) => sizes,
        other => return Err(unexpected("work-item sizes", other)),
    };

    let image2d_max = (
        image_size(device.info(ClDeviceInfo::Image2dMaxWidth)?)?,
        image_size(device.info(ClDeviceInfo::Image2dMaxHeight)?)?,
    );
    let image3d_max = (
        image_size(device.info(ClDeviceInfo::Image3dMaxWidth)?)?,
        image_size(device.info(ClDeviceInfo::Image3dMaxHeight)?)?,
        image_size(device.info(ClDeviceInfo::Image3dMaxDepth)?)?,
    );

    // Deprecated since OpenCL 2.0; newer drivers may not answer
    let host_unified_memory = matches!(
        device.info(ClDeviceInfo::HostUnifiedMemory),
        Ok(DeviceInfoResult::HostUnifiedMemory(true))
    );

    let extensions = match device.info(ClDeviceInfo::Extensions)? {
        DeviceInfoResult::Extensions(s) => parse_extensions(&s),
        other => return Err(unexpected("device extensions", other)),
    };

    Ok(DeviceInfo {
        name: device.name()?,
        vendor: device.vendor()?,
        version: device.info(ClDeviceInfo::Version)?.to_string(),
        kind,
        compute_units,
        local_memory_bytes,
        global_memory_bytes,
        max_work_group_size: device.max_wg_size()?,
        max_work_item_sizes,
        image2d_max,
        image3d_max,
        host_unified_memory,
        extensions,
    })
}

fn device_kind(t: DeviceType) -> DeviceKind {
    if t.contains(DeviceType::GPU) {
        DeviceKind::Gpu
    } else if t.contains(DeviceType::CPU) {
        DeviceKind::Cpu
    } else if t.contains(DeviceType::ACCELERATOR) {
        DeviceKind::Accelerator
    } else {
        DeviceKind::Other
    }
}

fn image_size(result: DeviceInfoResult) -> Result<usize, OpenCLError> {
    match result {
        DeviceInfoResult::Image2dMaxWidth(n)
        | DeviceInfoResult::Image2dMaxHeight(n)
        | DeviceInfoResult::Image3dMaxWidth(n)
        | DeviceInfoResult::Image3dMaxHeight(n)
        | DeviceInfoResult::Image3dMaxDepth(n) => Ok(n),
        other => Err(unexpected("image size", other)),
    }
}

fn unexpected(query: &str, result: impl std::fmt::Display) -> OpenCLError {
    format!("unexpected {} query result: {}", query, result).into()
}

/// The platform a device belongs to
pub(crate) fn device_platform(device: &Device) -> Result<Platform, OpenCLError> {
    match device.info(ClDeviceInfo::Platform)? {
        DeviceInfoResult::Platform(id) => Ok(Platform::new(id)),
        other => Err(unexpected("device platform", other)),
    }
}
