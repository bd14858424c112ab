//! OpenCL program compilation

use super::device::OpenCLError;
use clsim_core::ComputeError;
use ocl::core::{ProgramBuildInfo, ProgramBuildInfoResult};
use ocl::{Context, Device, Program};

/// Compile OpenCL C source for one device
///
/// Any failure of the build call is reported as a build failure; the `ocl`
/// error text embeds the compiler log.
pub(crate) fn build(
    context: &Context,
    device: &Device,
    source: &str,
    flags: &str,
) -> Result<Program, ComputeError> {
    Program::builder()
        .src(source)
        .devices(*device)
        .cmplr_opt(flags)
        .build(context)
        .map_err(|e| ComputeError::BuildFailure { log: e.to_string() })
}

/// Compiler output of a built program
pub(crate) fn build_log(program: &Program, device: &Device) -> Result<String, OpenCLError> {
    match program.build_info(*device, ProgramBuildInfo::BuildLog)? {
        ProgramBuildInfoResult::BuildLog(log) => Ok(log),
        other => Err(format!("unexpected build info result: {}", other).into()),
    }
}
