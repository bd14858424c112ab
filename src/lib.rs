//! clsim: compute contexts and kernel runtimes over OpenCL
//!
//! - **clsim-core**: [`ComputeContext`], [`KernelRuntime`], build options and
//!   the simulated backend used by the tests
//! - **clsim-backend-opencl**: [`OpenCLBackend`], the `ocl` implementation
//! - **heat**: a 2D transient heat simulation built on the two

pub mod heat;

pub use clsim_backend_opencl::{OpenCLBackend, OpenCLError};
pub use clsim_core::*;

pub use heat::{HeatKernel, HeatParams, HeatSim};

/// Prelude module with commonly used types and traits
pub mod prelude {
    pub use crate::heat::{HeatKernel, HeatParams, HeatSim};
    pub use clsim_backend_opencl::OpenCLBackend;
    pub use clsim_core::prelude::*;
}
