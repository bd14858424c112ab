use clsim_core::mock::MockBackend;
use clsim_core::prelude::*;
use clsim_core::KernelWorkGroupInfo;
use rstest::rstest;
use std::sync::Arc;

const COPY_KERNEL: &str = r#"
__kernel void copy(__global float* dst, __global const float* src)
{
    const int i = get_global_id(0);
    dst[i] = src[i];
}
"#;

const TILED_KERNEL: &str = r#"
__kernel void blur(__global float* dst, __global const float* src)
{
    __local float tile[18][18];
    const int i = get_global_id(0);
    tile[0][0] = src[i];
    barrier(CLK_LOCAL_MEM_FENCE);
    dst[i] = tile[0][0];
}

__kernel void scale(__global float* dst, const float factor)
{
    dst[get_global_id(0)] *= factor;
}
"#;

const BROKEN_KERNEL: &str = r#"
__kernel void broken(__global float* dst)
{
#error use of undeclared identifier 'src'
"#;

fn gpu_context() -> Arc<ComputeContext<MockBackend>> {
    let device = DeviceInfo::new("Mock GPU", DeviceKind::Gpu).with_max_work_group_size(256);
    let context =
        ComputeContext::initialize(MockBackend::with_devices(vec![device]), ContextOptions::default())
            .unwrap();
    Arc::new(context)
}

#[test]
fn test_create_with_empty_options_is_ready() {
    let runtime = KernelRuntime::create(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();

    assert!(runtime.is_ready());
    assert_eq!(runtime.state(), RuntimeState::Ready);
    assert_eq!(runtime.entry_points(), ["copy"]);
    assert_eq!(runtime.local_memory_footprint(0), Some(0));
    assert_eq!(runtime.preferred_work_group_multiple(0), Some(32));
    assert_eq!(runtime.max_work_group_size(0), Some(256));
    assert!(runtime.build_log().is_none());
}

#[test]
fn test_queue_is_profiling_and_on_context_device() {
    let context = gpu_context();
    let runtime = KernelRuntime::new(context.clone(), COPY_KERNEL, BuildOptions::new()).unwrap();
    assert!(runtime.queue().profiling);
    assert_eq!(runtime.queue().device, *context.device());
}

#[test]
fn test_invalid_source_fails_with_log() {
    let _ = env_logger::builder().is_test(true).try_init();

    let err = KernelRuntime::create(gpu_context(), BROKEN_KERNEL, BuildOptions::new()).unwrap_err();
    let log = err.build_log().expect("build failure carries a log");
    assert!(!log.is_empty());
    assert!(log.contains("undeclared identifier 'src'"));
}

#[test]
fn test_build_failed_is_terminal() {
    let mut runtime = KernelRuntime::new(gpu_context(), BROKEN_KERNEL, BuildOptions::new()).unwrap();
    assert_eq!(runtime.state(), RuntimeState::Uncompiled);

    let first = runtime.build().unwrap_err();
    assert_eq!(runtime.state(), RuntimeState::BuildFailed);
    assert!(!runtime.is_ready());
    assert_eq!(runtime.build_log(), first.build_log());

    let second = runtime.build().unwrap_err();
    assert_eq!(first, second);
    assert_eq!(runtime.state(), RuntimeState::BuildFailed);
}

#[test]
fn test_build_is_idempotent_once_ready() {
    let mut runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();
    runtime.build().unwrap();
    runtime.build().unwrap();
    assert_eq!(runtime.state(), RuntimeState::Ready);
}

#[test]
fn test_introspection_before_build_returns_none() {
    let runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();

    assert!(!runtime.is_ready());
    assert_eq!(runtime.local_memory_footprint(0), None);
    assert_eq!(runtime.preferred_work_group_multiple(0), None);
    assert_eq!(runtime.max_work_group_size(0), None);
    assert!(matches!(
        runtime.work_group_info(0),
        Err(ComputeError::NotReady(_))
    ));
    assert!(runtime.program().is_none());
}

#[test]
fn test_program_without_kernels_is_not_ready() {
    let source = "float helper(float x) { return x * 2.0f; }";
    let runtime = KernelRuntime::create(gpu_context(), source, BuildOptions::new()).unwrap();

    assert_eq!(runtime.state(), RuntimeState::Ready);
    assert!(!runtime.is_ready());
    assert_eq!(runtime.local_memory_footprint(0), None);
}

#[test]
fn test_introspection_per_entry_point() {
    let runtime = KernelRuntime::create(gpu_context(), TILED_KERNEL, BuildOptions::new()).unwrap();

    assert_eq!(runtime.entry_points(), ["blur", "scale"]);
    assert_eq!(runtime.local_memory_footprint(0), Some(18 * 18 * 4));
    assert_eq!(runtime.local_memory_footprint(1), Some(0));
    assert_eq!(runtime.local_memory_footprint(2), None);
    assert_eq!(
        runtime.work_group_info(2),
        Err(ComputeError::EntryPointOutOfRange { index: 2, count: 2 })
    );
    assert_eq!(
        runtime.work_group_info(0),
        Ok(KernelWorkGroupInfo {
            local_memory_bytes: 18 * 18 * 4,
            preferred_multiple: 32,
            max_work_group_size: 256,
        })
    );
}

#[test]
fn test_options_are_rendered_into_flags() {
    let options = BuildOptions::parse(["debug", "finite-math", "cl2.0"]).unwrap();
    let runtime = KernelRuntime::create(gpu_context(), COPY_KERNEL, options).unwrap();
    assert_eq!(
        runtime.program().unwrap().flags,
        "-g -cl-finite-math-only -cl-std=CL2.0"
    );
    assert!(runtime.options().is_debug());
}

#[test]
fn test_define_smuggling_flags_is_rejected() {
    let options = BuildOptions::new().with(BuildOption::Define {
        name: "X".into(),
        value: Some("1 -cl-bogus-flag".into()),
    });
    let err = KernelRuntime::create(gpu_context(), COPY_KERNEL, options).unwrap_err();
    assert_eq!(
        err,
        ComputeError::UnknownBuildOption("-D X=1 -cl-bogus-flag".into())
    );
}

#[test]
fn test_work_group_size_round_trip() {
    let mut runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();
    assert_eq!(runtime.work_group_size(), [64, 1]);

    runtime.set_work_group_size(&[16, 16]).unwrap();
    assert_eq!(runtime.work_group_size(), [16, 16]);
}

#[rstest]
#[case(vec![])]
#[case(vec![0, 16])]
#[case(vec![4, 4, 4, 4])]
fn test_invalid_work_group_size(#[case] dims: Vec<usize>) {
    let mut runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();
    assert_eq!(
        runtime.set_work_group_size(&dims),
        Err(ComputeError::InvalidWorkGroupSize(dims.clone()))
    );
    assert_eq!(runtime.work_group_size(), [64, 1]);
}

#[rstest]
#[case(1, true)]
#[case(3, true)]
#[case(0, false)]
#[case(4, false)]
fn test_problem_dimensions(#[case] n: usize, #[case] valid: bool) {
    let mut runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();
    assert_eq!(runtime.problem_dimensions(), 2);
    assert_eq!(runtime.set_problem_dimensions(n).is_ok(), valid);
    assert_eq!(runtime.problem_dimensions(), if valid { n } else { 2 });
}

#[test]
fn test_global_work_size_padding() {
    let mut runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();
    runtime.set_work_group_size(&[16, 16]).unwrap();
    assert_eq!(runtime.global_work_size(&[100, 64]).unwrap(), vec![112, 64]);
    assert_eq!(runtime.global_work_size(&[1, 1, 5]).unwrap(), vec![16, 16, 5]);
}

#[test]
fn test_global_work_size_overflow_is_an_error() {
    let mut runtime = KernelRuntime::new(gpu_context(), COPY_KERNEL, BuildOptions::new()).unwrap();
    runtime.set_work_group_size(&[16]).unwrap();
    assert!(matches!(
        runtime.global_work_size(&[usize::MAX - 3]),
        Err(ComputeError::InvalidParameters(_))
    ));
    assert_eq!(
        runtime.global_work_size(&[usize::MAX - 15]).unwrap(),
        vec![usize::MAX - 15]
    );
}

#[test]
fn test_runtime_rejects_foreign_context() {
    let own = gpu_context();
    let other = gpu_context();
    let runtime = KernelRuntime::create(own.clone(), COPY_KERNEL, BuildOptions::new()).unwrap();

    assert!(runtime.ensure_context(&own).is_ok());
    assert_eq!(
        runtime.ensure_context(&other),
        Err(ComputeError::ContextMismatch {
            expected: own.id(),
            actual: other.id(),
        })
    );
}

#[test]
fn test_default_context() {
    let backend = MockBackend::with_devices(vec![
        DeviceInfo::new("cpu", DeviceKind::Cpu),
        DeviceInfo::new("gpu", DeviceKind::Gpu),
    ]);
    let runtime =
        KernelRuntime::with_default_context(backend, COPY_KERNEL, BuildOptions::new()).unwrap();
    assert_eq!(runtime.context().device_info().name, "gpu");
    assert!(runtime.is_ready());
}

#[test]
fn test_cpu_preferred_multiple() {
    let context = ComputeContext::initialize(
        MockBackend::with_devices(vec![DeviceInfo::new("cpu", DeviceKind::Cpu)]),
        ContextOptions::default(),
    )
    .unwrap();
    let runtime = KernelRuntime::create(Arc::new(context), COPY_KERNEL, BuildOptions::new()).unwrap();
    assert_eq!(runtime.preferred_work_group_multiple(0), Some(1));
}

struct Doubler;

impl KernelSource for Doubler {
    fn kernel_source(&self) -> std::borrow::Cow<'_, str> {
        "__kernel void double_it(__global float* x) { x[get_global_id(0)] *= 2.0f; }".into()
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions::new().with(BuildOption::FastRelaxedMath)
    }
}

#[test]
fn test_kernel_source_compile() {
    let runtime = Doubler.compile(gpu_context()).unwrap();
    assert_eq!(runtime.entry_points(), ["double_it"]);
    assert_eq!(runtime.program().unwrap().flags, "-cl-fast-relaxed-math");

    let plain = COPY_KERNEL.to_string().compile(gpu_context()).unwrap();
    assert!(plain.is_ready());
}
