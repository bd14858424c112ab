//! clsim: inspect OpenCL devices and run the heat simulation
//!
//! Usage:
//!   clsim devices
//!   clsim heat [--nx N] [--ny N] [--steps N] [--cpu] [--option NAME]... [--work-group WxH]
//!
//! Examples:
//!   clsim heat --nx 512 --ny 512 --steps 1000
//!   clsim heat --cpu --option fast-math --option Dradius=4
//!   RUST_LOG=debug clsim heat --work-group 8x8

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ndarray::Array2;

use clsim::heat::{HEAT_ENTRY_POINT, HeatParams, HeatSim};
use clsim::{BuildOptions, ComputeBackend, ComputeContext, ContextOptions, OpenCLBackend};

/// OpenCL compute context explorer
#[derive(Parser, Debug)]
#[command(name = "clsim")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List platforms and devices with their capabilities
    Devices,

    /// Run the 2D transient heat simulation
    Heat {
        /// Grid cells along the first axis
        #[arg(long, default_value_t = 256)]
        nx: usize,

        /// Grid cells along the second axis
        #[arg(long, default_value_t = 256)]
        ny: usize,

        /// Number of time steps
        #[arg(long, default_value_t = 500)]
        steps: usize,

        /// Prefer a CPU device over a GPU
        #[arg(long)]
        cpu: bool,

        /// Build option by name (debug, no-opt, fast-math, cl2.0, DNAME=VALUE, ...)
        #[arg(short = 'O', long = "option", value_name = "NAME")]
        options: Vec<String>,

        /// Work-group size
        #[arg(long, value_name = "WxH", value_parser = parse_work_group)]
        work_group: Option<(usize, usize)>,
    },
}

fn parse_work_group(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid work-group extent '{}': {}", v, e))
    };
    Ok((parse(w)?, parse(h)?))
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::Devices => list_devices(),
        Command::Heat {
            nx,
            ny,
            steps,
            cpu,
            options,
            work_group,
        } => run_heat(nx, ny, steps, cpu, &options, work_group),
    }
}

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let platforms = OpenCLBackend::new().describe()?;
    if platforms.is_empty() {
        println!("No OpenCL platforms found");
        return Ok(());
    }

    for (index, (platform, devices)) in platforms.iter().enumerate() {
        println!("Platform {}: {} ({})", index, platform.name, platform.version);
        for device in devices {
            println!("  {} [{}]", device.name, device.kind);
            println!("    vendor:            {}", device.vendor);
            println!("    compute units:     {}", device.compute_units);
            println!("    global memory:     {} MiB", device.global_memory_bytes >> 20);
            println!("    local memory:      {} KiB", device.local_memory_bytes >> 10);
            println!("    max work-group:    {}", device.max_work_group_size);
            println!(
                "    2D image max:      {}x{}",
                device.image2d_max.0, device.image2d_max.1
            );
            println!(
                "    half / double:     {} / {}",
                platform.has_extension(clsim::device::EXT_FP16)
                    || device.has_extension(clsim::device::EXT_FP16),
                platform.has_extension(clsim::device::EXT_FP64)
                    || device.has_extension(clsim::device::EXT_FP64)
            );
        }
    }
    Ok(())
}

fn run_heat(
    nx: usize,
    ny: usize,
    steps: usize,
    cpu: bool,
    options: &[String],
    work_group: Option<(usize, usize)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let build_options = BuildOptions::parse(options)?;

    let context = ComputeContext::initialize(
        OpenCLBackend::new(),
        ContextOptions::default().prefer_gpu(!cpu),
    )?;
    println!(
        "Device: {} [{}]",
        context.device_info().name,
        context.device_info().kind
    );
    let context = Arc::new(context);

    let params = HeatParams::default();
    let mut sim = HeatSim::new(context, &initial_field(nx, ny), params, build_options)?;
    if let Some((w, h)) = work_group {
        sim.set_work_group_size(&[w, h])?;
    }

    let runtime = sim.runtime();
    println!("Kernel {}:", HEAT_ENTRY_POINT);
    println!("  local memory:       {:?}", runtime.local_memory_footprint(0));
    println!(
        "  preferred multiple: {:?}",
        runtime.preferred_work_group_multiple(0)
    );
    println!("  max work-group:     {:?}", runtime.max_work_group_size(0));
    println!("  work-group:         {:?}", runtime.work_group_size());
    println!(
        "  global size:        {:?}",
        runtime.global_work_size(&[nx, ny])?
    );

    let elapsed = sim.run(steps)?;
    let field = sim.read()?;
    let mean = field.mean().unwrap_or(0.0);

    println!(
        "{} steps ({:.3} s simulated) in {:?} kernel time, {:?} per step",
        sim.steps(),
        sim.time(),
        elapsed,
        per_step(elapsed, steps)
    );
    println!("Mean temperature: {:.4}", mean);
    Ok(())
}

/// Mean kernel time of one step
fn per_step(elapsed: Duration, steps: usize) -> Duration {
    if steps == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(elapsed.as_secs_f64() / steps as f64)
}

/// Cold plate with a hot square in the middle
fn initial_field(nx: usize, ny: usize) -> Array2<f32> {
    Array2::from_shape_fn((nx, ny), |(i, j)| {
        let hot = (nx / 4..3 * nx / 4).contains(&i) && (ny / 4..3 * ny / 4).contains(&j);
        if hot { 100.0 } else { 0.0 }
    })
}
