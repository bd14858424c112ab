//! Simulated backend
//!
//! An in-process stand-in for a driver: platforms and devices are plain
//! descriptors, "compilation" scans the source for kernel declarations and
//! static local arrays. It lets context and runtime behaviour be exercised
//! without hardware, including failure paths a real driver rarely shows
//! on demand.

use crate::config::RuntimeConfig;
use crate::device::{DeviceInfo, DeviceKind, PlatformInfo};
use crate::error::{ComputeError, Result};
use crate::traits::{ComputeBackend, ContextSharing, KernelWorkGroupInfo};

/// A simulated platform and its devices
#[derive(Debug, Clone)]
pub struct MockPlatform {
    pub info: PlatformInfo,
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPlatformId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDeviceId {
    pub platform: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockContext {
    pub device: MockDeviceId,
    pub sharing: ContextSharing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockQueue {
    pub device: MockDeviceId,
    pub profiling: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MockKernel {
    name: String,
    local_memory_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProgram {
    pub device: MockDeviceId,
    pub flags: String,
    kernels: Vec<MockKernel>,
    log: String,
}

/// Simulated backend over a fixed set of platforms
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    platforms: Vec<MockPlatform>,
    graphics_interop: bool,
    fail_graphics_context: bool,
    fail_device_queries: bool,
    config: Option<RuntimeConfig>,
}

impl MockBackend {
    /// A backend without any platform
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with one platform holding `devices`
    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self::new().with_platform(PlatformInfo::new("Mock Platform"), devices)
    }

    pub fn with_platform(mut self, info: PlatformInfo, devices: Vec<DeviceInfo>) -> Self {
        self.platforms.push(MockPlatform { info, devices });
        self
    }

    /// Report graphics interop support from the "driver"
    pub fn with_graphics_interop(mut self, supported: bool) -> Self {
        self.graphics_interop = supported;
        self
    }

    /// Make every graphics-sharing context creation fail
    pub fn failing_graphics_context(mut self) -> Self {
        self.fail_graphics_context = true;
        self
    }

    /// Make every device description fail like a driver rejecting a query
    pub fn failing_device_queries(mut self) -> Self {
        self.fail_device_queries = true;
        self
    }

    /// Configuration received through [`ComputeBackend::configure`]
    pub fn configured(&self) -> Option<&RuntimeConfig> {
        self.config.as_ref()
    }

    /// Handle of device `index` on platform `platform`
    pub fn device_id(&self, platform: usize, index: usize) -> MockDeviceId {
        MockDeviceId { platform, index }
    }

    fn platform(&self, id: usize) -> Result<&MockPlatform> {
        self.platforms
            .get(id)
            .ok_or_else(|| ComputeError::Backend(format!("invalid platform #{}", id)))
    }

    fn lookup(&self, device: &MockDeviceId) -> Result<&DeviceInfo> {
        self.platform(device.platform)?
            .devices
            .get(device.index)
            .ok_or_else(|| ComputeError::Backend(format!("invalid device {:?}", device)))
    }
}

impl ComputeBackend for MockBackend {
    type Platform = MockPlatformId;
    type Device = MockDeviceId;
    type Context = MockContext;
    type Queue = MockQueue;
    type Program = MockProgram;

    fn name(&self) -> &str {
        "Mock"
    }

    fn platforms(&self) -> Result<Vec<MockPlatformId>> {
        Ok((0..self.platforms.len()).map(MockPlatformId).collect())
    }

    fn platform_info(&self, platform: &MockPlatformId) -> Result<PlatformInfo> {
        Ok(self.platform(platform.0)?.info.clone())
    }

    fn devices(&self, platform: &MockPlatformId) -> Result<Vec<MockDeviceId>> {
        let count = self.platform(platform.0)?.devices.len();
        Ok((0..count).map(|index| self.device_id(platform.0, index)).collect())
    }

    fn device_info(&self, device: &MockDeviceId) -> Result<DeviceInfo> {
        let info = self.lookup(device)?;
        if self.fail_device_queries {
            return Err(ComputeError::Backend(format!(
                "CL_INVALID_VALUE querying CL_DEVICE_GLOBAL_MEM_SIZE of {}",
                info.name
            )));
        }
        Ok(info.clone())
    }

    fn device_platform(&self, device: &MockDeviceId) -> Result<MockPlatformId> {
        self.lookup(device)?;
        Ok(MockPlatformId(device.platform))
    }

    fn supports_graphics_interop(&self) -> bool {
        self.graphics_interop
    }

    fn configure(&mut self, config: &RuntimeConfig) {
        self.config = Some(config.clone());
    }

    fn create_context(
        &self,
        _platform: &MockPlatformId,
        device: &MockDeviceId,
        sharing: ContextSharing,
    ) -> Result<MockContext> {
        self.lookup(device)?;
        if sharing == ContextSharing::Graphics && self.fail_graphics_context {
            return Err(ComputeError::Backend(
                "CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR".to_string(),
            ));
        }
        Ok(MockContext {
            device: *device,
            sharing,
        })
    }

    fn create_queue(
        &self,
        context: &MockContext,
        device: &MockDeviceId,
        profiling: bool,
    ) -> Result<MockQueue> {
        if context.device != *device {
            return Err(ComputeError::Backend(
                "device is not part of the context".to_string(),
            ));
        }
        Ok(MockQueue {
            device: *device,
            profiling,
        })
    }

    fn build_program(
        &self,
        context: &MockContext,
        device: &MockDeviceId,
        source: &str,
        flags: &str,
    ) -> Result<MockProgram> {
        if context.device != *device {
            return Err(ComputeError::Backend(
                "device is not part of the context".to_string(),
            ));
        }

        let werror = flags.split_whitespace().any(|f| f == "-Werror");
        let mut diagnostics = Vec::new();
        let mut failed = false;
        for (line_no, line) in source.lines().enumerate() {
            let trimmed = line.trim_start();
            let col = line.len() - trimmed.len() + 1;
            if let Some(msg) = trimmed.strip_prefix("#error") {
                diagnostics.push(format!("<kernel>:{}:{}: error: {}", line_no + 1, col, msg.trim()));
                failed = true;
            } else if let Some(msg) = trimmed.strip_prefix("#warning") {
                let severity = if werror { "error" } else { "warning" };
                diagnostics.push(format!(
                    "<kernel>:{}:{}: {}: {}",
                    line_no + 1,
                    col,
                    severity,
                    msg.trim()
                ));
                failed |= werror;
            }
        }

        let depth = source.chars().fold(0i64, |depth, c| match c {
            '{' => depth + 1,
            '}' => depth - 1,
            _ => depth,
        });
        if depth != 0 {
            diagnostics.push("<kernel>: error: unbalanced braces".to_string());
            failed = true;
        }

        let log = diagnostics.join("\n");
        if failed {
            return Err(ComputeError::BuildFailure { log });
        }

        Ok(MockProgram {
            device: *device,
            flags: flags.to_string(),
            kernels: scan_kernels(source),
            log,
        })
    }

    fn build_log(&self, program: &MockProgram, _device: &MockDeviceId) -> Result<String> {
        Ok(program.log.clone())
    }

    fn entry_points(&self, program: &MockProgram) -> Result<Vec<String>> {
        Ok(program.kernels.iter().map(|k| k.name.clone()).collect())
    }

    fn work_group_info(
        &self,
        program: &MockProgram,
        entry_point: &str,
        device: &MockDeviceId,
    ) -> Result<KernelWorkGroupInfo> {
        if program.device != *device {
            return Err(ComputeError::Backend(
                "program was not built for this device".to_string(),
            ));
        }
        let kernel = program
            .kernels
            .iter()
            .find(|k| k.name == entry_point)
            .ok_or_else(|| ComputeError::Backend(format!("no kernel named '{}'", entry_point)))?;
        let info = self.lookup(device)?;

        let preferred_multiple = match info.kind {
            DeviceKind::Cpu => 1,
            _ if info.vendor.contains("AMD") || info.vendor.contains("Advanced Micro") => 64,
            _ => 32,
        };

        Ok(KernelWorkGroupInfo {
            local_memory_bytes: kernel.local_memory_bytes,
            preferred_multiple: preferred_multiple.min(info.max_work_group_size),
            max_work_group_size: info.max_work_group_size,
        })
    }
}

/// Find `__kernel void name(` declarations and the static local arrays
/// declared in each kernel body
fn scan_kernels(source: &str) -> Vec<MockKernel> {
    source
        .split("__kernel")
        .skip(1)
        .filter_map(|fragment| {
            let after_void = fragment.trim_start().strip_prefix("void")?;
            let name = after_void.split('(').next()?.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return None;
            }
            Some(MockKernel {
                name: name.to_string(),
                local_memory_bytes: local_array_bytes(fragment),
            })
        })
        .collect()
}

fn local_array_bytes(fragment: &str) -> u64 {
    fragment
        .split("__local")
        .skip(1)
        .filter_map(|decl| {
            let decl = decl.split([';', ',', ')']).next()?.trim();
            if decl.contains('*') {
                return None;
            }
            let (ty, rest) = decl.split_once(char::is_whitespace)?;
            let mut elements = 1u64;
            let mut dims = 0;
            for part in rest.split('[').skip(1) {
                let extent = part.split(']').next()?.trim().parse::<u64>().ok()?;
                elements *= extent;
                dims += 1;
            }
            (dims > 0).then(|| elements * scalar_size(ty))
        })
        .sum()
}

fn scalar_size(ty: &str) -> u64 {
    let (base, lanes) = match ty.find(|c: char| c.is_ascii_digit()) {
        Some(at) => (&ty[..at], ty[at..].parse::<u64>().unwrap_or(1)),
        None => (ty, 1),
    };
    let size = match base {
        "char" | "uchar" | "bool" => 1,
        "short" | "ushort" | "half" => 2,
        "long" | "ulong" | "double" => 8,
        _ => 4,
    };
    size * lanes
}
