//! Transient heat equation on a 2D grid
//!
//! Explicit finite differences on the OpenCL backend. The grid lives in two
//! device buffers that are swapped after every step; edge cells are fixed
//! temperature boundaries.

use clsim_backend_opencl::{OpenCLBackend, OpenCLError};
use clsim_core::{
    BuildOptions, ComputeContext, ComputeError, KernelRuntime, KernelSource, Result,
};
use log::{debug, info, warn};
use ndarray::Array2;
use ocl::core::{ProfilingInfo, ProfilingInfoResult};
use ocl::{Buffer, Event, Kernel, flags};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// OpenCL C source of the stencil kernel
pub const HEAT_KERNEL: &str = include_str!("kernels/heat_eq_2d.cl");

/// Entry point in [`HEAT_KERNEL`]
pub const HEAT_ENTRY_POINT: &str = "heat_eq_2D";

/// Material and discretisation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatParams {
    /// Density [kg/m^3]
    pub rho: f32,
    /// Specific heat capacity [J/(kg K)]
    pub cp: f32,
    /// Thermal conductivity [W/(m K)]
    pub k: f32,
    /// Time step [s]
    pub dt: f32,
    /// Cell size along the first axis [m]
    pub dx: f32,
    /// Cell size along the second axis [m]
    pub dy: f32,
}

impl Default for HeatParams {
    /// Aluminium on a 1 mm grid
    fn default() -> Self {
        Self {
            rho: 2700.0,
            cp: 897.0,
            k: 237.0,
            dt: 0.002,
            dx: 1e-3,
            dy: 1e-3,
        }
    }
}

impl HeatParams {
    /// Thermal diffusivity `k / (rho * cp)`
    pub fn alpha(&self) -> f32 {
        self.k / (self.rho * self.cp)
    }

    /// Largest stable time step of the explicit scheme
    pub fn max_timestep(&self) -> f32 {
        let alpha = self.alpha();
        0.5 * f32::min(
            self.dx * self.dx / (2.0 * alpha),
            self.dy * self.dy / (2.0 * alpha),
        )
    }

    pub fn is_stable(&self) -> bool {
        self.dt <= self.max_timestep()
    }

    /// Reject non-positive or non-finite parameters
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("rho", self.rho),
            ("cp", self.cp),
            ("k", self.k),
            ("dt", self.dt),
            ("dx", self.dx),
            ("dy", self.dy),
        ];
        match fields.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            Some((name, value)) => Err(ComputeError::InvalidParameters(format!(
                "{} must be positive and finite, got {}",
                name, value
            ))),
            None => Ok(()),
        }
    }
}

/// Source provider for the heat stencil
#[derive(Debug, Clone, Default)]
pub struct HeatKernel {
    pub options: BuildOptions,
}

impl KernelSource for HeatKernel {
    fn kernel_source(&self) -> Cow<'_, str> {
        Cow::Borrowed(HEAT_KERNEL)
    }

    fn build_options(&self) -> BuildOptions {
        self.options.clone()
    }
}

/// Largest square-ish 2D work-group not exceeding `limit` work items
pub fn default_work_group(limit: usize) -> [usize; 2] {
    let mut group = [16, 16];
    while group[0] * group[1] > limit.max(1) {
        if group[0] >= group[1] {
            group[0] /= 2;
        } else {
            group[1] /= 2;
        }
    }
    group
}

/// Validate a grid shape and convert it to the kernel's `int` extents
///
/// The stencil indexes cells as `i * ny + j` in 32-bit arithmetic, so the
/// cell count must fit in an `i32`.
pub fn grid_extents(nx: usize, ny: usize) -> Result<(i32, i32)> {
    if nx < 3 || ny < 3 {
        return Err(ComputeError::InvalidParameters(format!(
            "grid must be at least 3x3, got {}x{}",
            nx, ny
        )));
    }
    let too_large = || {
        ComputeError::InvalidParameters(format!(
            "grid {}x{} has more cells than the kernel can index ({})",
            nx,
            ny,
            i32::MAX
        ))
    };
    let cells = nx.checked_mul(ny).ok_or_else(too_large)?;
    i32::try_from(cells).map_err(|_| too_large())?;
    Ok((
        i32::try_from(nx).map_err(|_| too_large())?,
        i32::try_from(ny).map_err(|_| too_large())?,
    ))
}

/// Heat equation simulation on an OpenCL device
pub struct HeatSim {
    runtime: KernelRuntime<OpenCLBackend>,
    params: HeatParams,
    shape: (usize, usize),
    buffers: [Buffer<f32>; 2],
    kernels: [Kernel; 2],
    current: usize,
    time: f32,
    steps: u64,
}

impl HeatSim {
    /// Upload `u0` and compile the stencil on `context`
    pub fn new(
        context: Arc<ComputeContext<OpenCLBackend>>,
        u0: &Array2<f32>,
        params: HeatParams,
        options: BuildOptions,
    ) -> Result<Self> {
        params.validate()?;
        if !params.is_stable() {
            warn!(
                "dt = {} exceeds the stable time step {}; the solution will diverge",
                params.dt,
                params.max_timestep()
            );
        }

        let (nx, ny) = u0.dim();
        let (nx_arg, ny_arg) = grid_extents(nx, ny)?;

        let mut runtime = HeatKernel { options }.compile(Arc::clone(&context))?;
        runtime.set_problem_dimensions(2)?;
        let limit = runtime
            .max_work_group_size(0)
            .unwrap_or(context.max_work_group_size());
        runtime.set_work_group_size(&default_work_group(limit))?;

        let queue = runtime.queue().clone();
        let host: Vec<f32> = u0.iter().copied().collect();

        // Host-allocated buffers let integrated GPUs skip the copy
        let mem_flags = if context.shared_memory_with_host() {
            debug!("Device shares host memory, using host-allocated buffers");
            flags::MEM_READ_WRITE | flags::MEM_ALLOC_HOST_PTR
        } else {
            flags::MEM_READ_WRITE
        };

        let upload = || {
            Buffer::<f32>::builder()
                .queue(queue.clone())
                .flags(mem_flags)
                .len(host.len())
                .copy_host_slice(&host)
                .build()
                .map_err(OpenCLError::from)
        };
        let buffers = [upload()?, upload()?];

        let program = runtime
            .program()
            .ok_or_else(|| ComputeError::NotReady(format!("{:?}", runtime.state())))?;

        let stencil = |dst: &Buffer<f32>, src: &Buffer<f32>| {
            let mut builder = Kernel::builder();
            builder
                .program(program)
                .name(HEAT_ENTRY_POINT)
                .queue(queue.clone())
                .arg(dst)
                .arg(src)
                .arg(nx_arg)
                .arg(ny_arg)
                .arg(params.alpha())
                .arg(params.dt)
                .arg(params.dx)
                .arg(params.dy);
            builder.build().map_err(OpenCLError::from)
        };
        let kernels = [
            stencil(&buffers[1], &buffers[0])?,
            stencil(&buffers[0], &buffers[1])?,
        ];

        info!(
            "Heat simulation {}x{} on {}, alpha = {:e}, dt = {}",
            nx,
            ny,
            context.device_info().name,
            params.alpha(),
            params.dt
        );

        Ok(Self {
            runtime,
            params,
            shape: (nx, ny),
            buffers,
            kernels,
            current: 0,
            time: 0.0,
            steps: 0,
        })
    }

    /// Advance one time step, returning the kernel execution time
    ///
    /// Uses device profiling timestamps when the queue records them and host
    /// wall time otherwise.
    pub fn step(&mut self) -> Result<Duration> {
        let (nx, ny) = self.shape;
        let global = self.runtime.global_work_size(&[nx, ny])?;
        let group = self.runtime.work_group_size();
        let local = [group[0], group.get(1).copied().unwrap_or(1)];

        let started = Instant::now();
        let mut event = Event::empty();
        unsafe {
            self.kernels[self.current]
                .cmd()
                .global_work_size([global[0], global[1]])
                .local_work_size(local)
                .enew(&mut event)
                .enq()
                .map_err(OpenCLError::from)?;
        }
        event.wait_for().map_err(OpenCLError::from)?;
        let elapsed = device_time(&event).unwrap_or_else(|| started.elapsed());

        self.current ^= 1;
        self.time += self.params.dt;
        self.steps += 1;
        Ok(elapsed)
    }

    /// Advance `steps` time steps, returning the summed kernel time
    pub fn run(&mut self, steps: usize) -> Result<Duration> {
        let mut total = Duration::ZERO;
        for _ in 0..steps {
            total += self.step()?;
        }
        debug!("{} steps, kernel time {:?}", steps, total);
        Ok(total)
    }

    /// Copy the current temperature field back to the host
    pub fn read(&self) -> Result<Array2<f32>> {
        let mut host = vec![0.0f32; self.shape.0 * self.shape.1];
        self.buffers[self.current]
            .read(&mut host)
            .enq()
            .map_err(OpenCLError::from)?;
        Array2::from_shape_vec(self.shape, host).map_err(|e| ComputeError::Backend(e.to_string()))
    }

    /// Change the launch work-group
    ///
    /// Rejects groups larger than the kernel allows on the device.
    pub fn set_work_group_size(&mut self, dims: &[usize]) -> Result<()> {
        let items: usize = dims.iter().product();
        if let Some(max) = self.runtime.max_work_group_size(0)
            && items > max
        {
            return Err(ComputeError::InvalidWorkGroupSize(dims.to_vec()));
        }
        self.runtime.set_work_group_size(dims)
    }

    pub fn runtime(&self) -> &KernelRuntime<OpenCLBackend> {
        &self.runtime
    }

    pub fn params(&self) -> &HeatParams {
        &self.params
    }

    /// Grid shape as (nx, ny)
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Simulated time [s]
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl fmt::Debug for HeatSim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeatSim")
            .field("runtime", &self.runtime)
            .field("params", &self.params)
            .field("shape", &self.shape)
            .field("time", &self.time)
            .field("steps", &self.steps)
            .finish()
    }
}

fn device_time(event: &Event) -> Option<Duration> {
    let start = match event.profiling_info(ProfilingInfo::Start) {
        Ok(ProfilingInfoResult::Start(t)) => t,
        _ => return None,
    };
    let end = match event.profiling_info(ProfilingInfo::End) {
        Ok(ProfilingInfoResult::End(t)) => t,
        _ => return None,
    };
    Some(Duration::from_nanos(end.saturating_sub(start)))
}
