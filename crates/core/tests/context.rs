use clsim_core::device::{EXT_FP16, EXT_FP64, EXT_GL_SHARING};
use clsim_core::mock::MockBackend;
use clsim_core::prelude::*;
use clsim_core::{ContextSharing, PlatformInfo};
use rstest::rstest;

fn gpu(name: &str) -> DeviceInfo {
    DeviceInfo::new(name, DeviceKind::Gpu)
}

fn cpu(name: &str) -> DeviceInfo {
    DeviceInfo::new(name, DeviceKind::Cpu)
}

fn sharing_platform() -> PlatformInfo {
    PlatformInfo::new("GL Platform").with_extensions([EXT_GL_SHARING, EXT_FP64])
}

#[test]
fn test_no_platform() {
    let err = ComputeContext::initialize(MockBackend::new(), ContextOptions::default()).unwrap_err();
    assert_eq!(err, ComputeError::NoPlatformAvailable);
}

#[rstest]
#[case(true)]
#[case(false)]
fn test_platform_without_devices(#[case] prefer_gpu: bool) {
    let backend = MockBackend::with_devices(vec![]);
    let err = ComputeContext::initialize(backend, ContextOptions::new().prefer_gpu(prefer_gpu))
        .unwrap_err();
    assert_eq!(
        err,
        ComputeError::NoDeviceAvailable {
            platform: "Mock Platform".into()
        }
    );
}

#[rstest]
#[case::gpu_first(vec![gpu("g0"), cpu("c0")], "g0")]
#[case::gpu_after_cpus(vec![cpu("c0"), cpu("c1"), cpu("c2"), gpu("g0"), gpu("g1")], "g0")]
#[case::cpu_fallback(vec![cpu("c0"), cpu("c1")], "c0")]
fn test_gpu_preferred_selection(#[case] devices: Vec<DeviceInfo>, #[case] expected: &str) {
    let context =
        ComputeContext::initialize(MockBackend::with_devices(devices), ContextOptions::default())
            .unwrap();
    assert_eq!(context.device_info().name, expected);
    assert!(context.is_using_gpu());
}

#[test]
fn test_cpu_selected_when_gpu_not_requested() {
    let backend = MockBackend::with_devices(vec![gpu("g0"), cpu("c0")]);
    let context =
        ComputeContext::initialize(backend, ContextOptions::new().prefer_gpu(false)).unwrap();
    assert_eq!(context.device_info().kind, DeviceKind::Cpu);
    assert!(!context.is_using_gpu());
}

#[test]
fn test_only_first_platform_is_searched() {
    let backend = MockBackend::new()
        .with_platform(PlatformInfo::new("Empty"), vec![])
        .with_platform(PlatformInfo::new("Full"), vec![gpu("g0")]);
    let err = ComputeContext::initialize(backend, ContextOptions::default()).unwrap_err();
    assert_eq!(
        err,
        ComputeError::NoDeviceAvailable {
            platform: "Empty".into()
        }
    );
}

#[test]
fn test_explicit_device_skips_enumeration() {
    let backend = MockBackend::new()
        .with_platform(PlatformInfo::new("First"), vec![gpu("g0")])
        .with_platform(PlatformInfo::new("Second"), vec![cpu("c0"), gpu("g1")]);
    let device = backend.device_id(1, 1);

    let context = ComputeContext::initialize(backend, ContextOptions::new().device(device)).unwrap();
    assert_eq!(context.device_info().name, "g1");
    assert_eq!(context.platform_info().name, "Second");
}

#[rstest]
#[case::explicit_cpu(1, true, false)]
#[case::explicit_gpu(0, false, true)]
fn test_explicit_device_kind_decides_gpu_use(
    #[case] index: usize,
    #[case] prefer_gpu: bool,
    #[case] using_gpu: bool,
) {
    let backend = MockBackend::new()
        .with_platform(sharing_platform(), vec![gpu("g0"), cpu("c0")])
        .with_graphics_interop(true);
    let device = backend.device_id(0, index);

    let context = ComputeContext::initialize(
        backend,
        ContextOptions::new().device(device).prefer_gpu(prefer_gpu),
    )
    .unwrap();
    assert_eq!(context.is_using_gpu(), using_gpu);
    assert_eq!(context.graphics_interop_enabled(), using_gpu);
}

#[test]
fn test_failed_device_query_is_not_papered_over() {
    let backend = MockBackend::with_devices(vec![gpu("g0")]).failing_device_queries();
    let err = ComputeContext::initialize(backend, ContextOptions::default()).unwrap_err();
    match err {
        ComputeError::Backend(msg) => assert!(msg.contains("GLOBAL_MEM_SIZE")),
        other => panic!("expected a backend error, got {:?}", other),
    }
}

#[test]
fn test_graphics_interop_enabled() {
    let backend = MockBackend::new()
        .with_platform(sharing_platform(), vec![gpu("g0")])
        .with_graphics_interop(true);

    let context = ComputeContext::initialize(backend, ContextOptions::default()).unwrap();
    assert!(context.graphics_interop_enabled());
    assert_eq!(context.raw().sharing, ContextSharing::Graphics);
}

#[test]
fn test_graphics_interop_falls_back_to_plain_context() {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = MockBackend::new()
        .with_platform(sharing_platform(), vec![gpu("g0")])
        .with_graphics_interop(true)
        .failing_graphics_context();

    let context = ComputeContext::initialize(backend, ContextOptions::default()).unwrap();
    assert!(!context.graphics_interop_enabled());
    assert_eq!(context.raw().sharing, ContextSharing::None);
    assert_eq!(context.device_info().name, "g0");
}

#[rstest]
#[case::driver_without_interop(sharing_platform(), false, true)]
#[case::platform_without_extension(PlatformInfo::new("Plain"), true, true)]
#[case::gpu_not_requested(sharing_platform(), true, false)]
fn test_graphics_interop_not_attempted(
    #[case] platform: PlatformInfo,
    #[case] driver_support: bool,
    #[case] prefer_gpu: bool,
) {
    let backend = MockBackend::new()
        .with_platform(platform, vec![gpu("g0"), cpu("c0")])
        .with_graphics_interop(driver_support);

    let mut context =
        ComputeContext::initialize(backend, ContextOptions::new().prefer_gpu(prefer_gpu)).unwrap();
    assert!(!context.graphics_interop_eligible());
    assert!(!context.try_enable_graphics_interop());
    assert_eq!(context.raw().sharing, ContextSharing::None);
}

#[test]
fn test_graphics_interop_enabled_after_construction() {
    let backend = MockBackend::new()
        .with_platform(sharing_platform(), vec![gpu("g0")])
        .with_graphics_interop(true);

    let mut context =
        ComputeContext::initialize(backend, ContextOptions::new().graphics_interop(false)).unwrap();
    assert!(!context.graphics_interop_enabled());
    assert!(context.try_enable_graphics_interop());
    assert!(context.graphics_interop_enabled());
}

#[test]
fn test_capability_queries_are_stable() {
    let device = gpu("g0")
        .with_compute_units(24)
        .with_memory(64 * 1024, 4 * 1024 * 1024 * 1024)
        .with_max_work_group_size(512)
        .with_extensions([EXT_FP16]);
    let backend = MockBackend::new().with_platform(sharing_platform(), vec![device]);
    let context = ComputeContext::initialize(backend, ContextOptions::default()).unwrap();

    for _ in 0..3 {
        assert_eq!(context.compute_unit_count(), 24);
        assert_eq!(context.local_memory_bytes(), 64 * 1024);
        assert_eq!(context.global_memory_bytes(), 4 * 1024 * 1024 * 1024);
        assert_eq!(context.max_work_group_size(), 512);
        assert_eq!(context.max_2d_image_dimensions(), (8192, 8192));
        assert_eq!(context.max_3d_image_dimensions(), (2048, 2048, 2048));
        assert!(context.has_half_precision());
        assert!(context.has_double_precision());
        assert!(context.has_graphics_sharing_extension());
    }
}

#[test]
fn test_missing_extensions() {
    let context = ComputeContext::initialize(
        MockBackend::with_devices(vec![cpu("c0")]),
        ContextOptions::default(),
    )
    .unwrap();
    assert!(!context.has_half_precision());
    assert!(!context.has_double_precision());
    assert!(!context.has_graphics_sharing_extension());
}

#[rstest]
#[case("Intel(R) UHD Graphics 630", DeviceKind::Gpu, true)]
#[case("NVIDIA GeForce GTX 1080", DeviceKind::Gpu, false)]
#[case("Intel(R) Core(TM) i7-8700 CPU", DeviceKind::Cpu, false)]
fn test_shared_memory_heuristic(
    #[case] name: &str,
    #[case] kind: DeviceKind,
    #[case] expected: bool,
) {
    let device = DeviceInfo::new(name, kind).with_vendor("Intel(R) Corporation");
    let context = ComputeContext::initialize(
        MockBackend::with_devices(vec![device]),
        ContextOptions::default(),
    )
    .unwrap();
    assert_eq!(context.shared_memory_with_host(), expected);
}

#[test]
fn test_config_reaches_backend() {
    let config = RuntimeConfig::default().with_program_cache(false);
    let context = ComputeContext::initialize(
        MockBackend::with_devices(vec![gpu("g0")]),
        ContextOptions::new().config(config.clone()),
    )
    .unwrap();
    assert_eq!(context.backend().configured(), Some(&config));
    assert_eq!(context.config(), &config);
}

#[test]
fn test_context_ids_are_unique() {
    let a = ComputeContext::initialize(
        MockBackend::with_devices(vec![gpu("g0")]),
        ContextOptions::default(),
    )
    .unwrap();
    let b = ComputeContext::initialize(
        MockBackend::with_devices(vec![gpu("g0")]),
        ContextOptions::default(),
    )
    .unwrap();
    assert_ne!(a.id(), b.id());
}
