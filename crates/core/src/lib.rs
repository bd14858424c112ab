//! clsim core: compute contexts and kernel runtimes
//!
//! Backend-agnostic layer over a native compute API:
//! - **device**: platform/device descriptors and device selection
//! - **context**: [`ComputeContext`], the selected device plus capability queries
//! - **runtime**: [`KernelRuntime`], command queue, program build and work-group introspection
//! - **options**: compiler flags as [`BuildOption`]s
//! - **mock**: simulated backend for tests (feature `mock`)
//!
//! The OpenCL implementation lives in `clsim-backend-opencl`.

pub mod config;
pub mod context;
pub mod device;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod options;
pub mod runtime;
pub mod source;
pub mod traits;

pub use config::RuntimeConfig;
pub use context::{ComputeContext, ContextOptions};
pub use device::{DeviceClass, DeviceInfo, DeviceKind, PlatformInfo, select_device};
pub use error::{ComputeError, Result};
pub use options::{BuildOption, BuildOptions, LanguageVersion};
pub use runtime::{KernelRuntime, RuntimeState};
pub use source::KernelSource;
pub use traits::{ComputeBackend, ContextSharing, KernelWorkGroupInfo};

/// Prelude module with commonly used types and traits
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::context::{ComputeContext, ContextOptions};
    pub use crate::device::{DeviceInfo, DeviceKind};
    pub use crate::error::{ComputeError, Result};
    pub use crate::options::{BuildOption, BuildOptions};
    pub use crate::runtime::{KernelRuntime, RuntimeState};
    pub use crate::source::KernelSource;
    pub use crate::traits::ComputeBackend;
}
