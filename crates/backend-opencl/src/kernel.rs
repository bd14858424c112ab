//! Kernel introspection on a compiled program

use super::device::OpenCLError;
use clsim_core::KernelWorkGroupInfo;
use ocl::core::{
    KernelWorkGroupInfo as ClWorkGroupInfo, KernelWorkGroupInfoResult, ProgramInfo,
    ProgramInfoResult,
};
use ocl::{Device, Program};

/// Names of the kernels in a program, in driver order
pub(crate) fn entry_points(program: &Program) -> Result<Vec<String>, OpenCLError> {
    match program.info(ProgramInfo::KernelNames)? {
        ProgramInfoResult::KernelNames(names) => Ok(names
            .split(';')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()),
        other => Err(format!("unexpected program info result: {}", other).into()),
    }
}

/// Work-group requirements of `entry_point` on `device`
pub(crate) fn work_group_info(
    program: &Program,
    entry_point: &str,
    device: &Device,
) -> Result<KernelWorkGroupInfo, OpenCLError> {
    let kernel = ocl::core::create_kernel(program.as_core(), entry_point)?;
    let query = |info| ocl::core::get_kernel_work_group_info(&kernel, device.as_core(), info);

    let local_memory_bytes = match query(ClWorkGroupInfo::LocalMemSize)? {
        KernelWorkGroupInfoResult::LocalMemSize(n) => n,
        other => return Err(format!("unexpected local memory result: {}", other).into()),
    };
    let preferred_multiple = match query(ClWorkGroupInfo::PreferredWorkGroupSizeMultiple)? {
        KernelWorkGroupInfoResult::PreferredWorkGroupSizeMultiple(n) => n,
        other => return Err(format!("unexpected preferred multiple result: {}", other).into()),
    };
    let max_work_group_size = match query(ClWorkGroupInfo::WorkGroupSize)? {
        KernelWorkGroupInfoResult::WorkGroupSize(n) => n,
        other => return Err(format!("unexpected work-group size result: {}", other).into()),
    };

    Ok(KernelWorkGroupInfo {
        local_memory_bytes,
        preferred_multiple,
        max_work_group_size,
    })
}
