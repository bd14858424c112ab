//! Kernel runtime
//!
//! Owns a command queue on a context's device and the program compiled from
//! one kernel source. Dispatch (argument binding, enqueue, read-back) is left
//! to the caller, who reads launch sizing from here.

use crate::context::{ComputeContext, ContextOptions};
use crate::error::{ComputeError, Result};
use crate::options::BuildOptions;
use crate::traits::{ComputeBackend, KernelWorkGroupInfo};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

/// Build state of a [`KernelRuntime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Uncompiled,
    Compiling,
    Ready,
    /// Terminal; construct a new runtime with corrected source or options
    BuildFailed,
}

enum Build<P> {
    Uncompiled,
    Compiling,
    Ready {
        program: P,
        entry_points: Vec<String>,
    },
    Failed {
        log: String,
    },
}

/// Command queue plus compiled program for one kernel source
pub struct KernelRuntime<B: ComputeBackend> {
    context: Arc<ComputeContext<B>>,
    queue: B::Queue,
    source: String,
    options: BuildOptions,
    build: Build<B::Program>,
    work_group_size: Vec<usize>,
    dimensions: usize,
}

impl<B: ComputeBackend> KernelRuntime<B> {
    /// Create the queue and leave the source uncompiled
    ///
    /// Options that would not render to single compiler flags are rejected
    /// before any queue is created.
    pub fn new(
        context: Arc<ComputeContext<B>>,
        source: impl Into<String>,
        options: BuildOptions,
    ) -> Result<Self> {
        options.validate()?;
        let queue = context.backend().create_queue(
            context.raw(),
            context.device(),
            context.config().profiling,
        )?;

        Ok(Self {
            context,
            queue,
            source: source.into(),
            options,
            build: Build::Uncompiled,
            work_group_size: vec![64, 1],
            dimensions: 2,
        })
    }

    /// Create the queue and compile
    pub fn create(
        context: Arc<ComputeContext<B>>,
        source: impl Into<String>,
        options: BuildOptions,
    ) -> Result<Self> {
        let mut runtime = Self::new(context, source, options)?;
        runtime.build()?;
        Ok(runtime)
    }

    /// Build on a default context (GPU preferred, CPU fallback)
    pub fn with_default_context(
        backend: B,
        source: impl Into<String>,
        options: BuildOptions,
    ) -> Result<Self> {
        let context = ComputeContext::initialize(backend, ContextOptions::default())?;
        Self::create(Arc::new(context), source, options)
    }

    /// Compile the source
    ///
    /// A no-op once ready. After a failure the same `BuildFailure` is
    /// returned again without recompiling.
    pub fn build(&mut self) -> Result<()> {
        match &self.build {
            Build::Ready { .. } => return Ok(()),
            Build::Failed { log } => return Err(ComputeError::BuildFailure { log: log.clone() }),
            Build::Uncompiled | Build::Compiling => {}
        }

        let flags = self.options.to_flags();
        debug!("Building kernel program with flags '{}'", flags);
        self.build = Build::Compiling;

        let backend = self.context.backend();
        let device = self.context.device();
        let result = backend
            .build_program(self.context.raw(), device, &self.source, &flags)
            .and_then(|program| {
                let entry_points = backend.entry_points(&program)?;
                Ok((program, entry_points))
            });

        match result {
            Ok((program, entry_points)) => {
                if self.context.config().compiler_output {
                    match backend.build_log(&program, device) {
                        Ok(log) if !log.trim().is_empty() => info!("Compiler output:\n{}", log),
                        Ok(_) => {}
                        Err(e) => warn!("Could not read compiler output: {}", e),
                    }
                }
                debug!("Kernel program ready, entry points: {:?}", entry_points);
                self.build = Build::Ready {
                    program,
                    entry_points,
                };
                Ok(())
            }
            Err(e) => {
                let log = match e {
                    ComputeError::BuildFailure { log } => log,
                    other => other.to_string(),
                };
                warn!("Kernel build failed:\n{}", log);
                self.build = Build::Failed { log: log.clone() };
                Err(ComputeError::BuildFailure { log })
            }
        }
    }

    pub fn state(&self) -> RuntimeState {
        match self.build {
            Build::Uncompiled => RuntimeState::Uncompiled,
            Build::Compiling => RuntimeState::Compiling,
            Build::Ready { .. } => RuntimeState::Ready,
            Build::Failed { .. } => RuntimeState::BuildFailed,
        }
    }

    /// Built successfully with at least one entry point
    pub fn is_ready(&self) -> bool {
        matches!(&self.build, Build::Ready { entry_points, .. } if !entry_points.is_empty())
    }

    /// Compiler diagnostics of a failed build
    pub fn build_log(&self) -> Option<&str> {
        match &self.build {
            Build::Failed { log } => Some(log),
            _ => None,
        }
    }

    /// Entry point names; empty until built
    pub fn entry_points(&self) -> &[String] {
        match &self.build {
            Build::Ready { entry_points, .. } => entry_points,
            _ => &[],
        }
    }

    pub fn program(&self) -> Option<&B::Program> {
        match &self.build {
            Build::Ready { program, .. } => Some(program),
            _ => None,
        }
    }

    pub fn queue(&self) -> &B::Queue {
        &self.queue
    }

    pub fn context(&self) -> &Arc<ComputeContext<B>> {
        &self.context
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Reject a context other than the one this runtime was built against
    pub fn ensure_context(&self, context: &ComputeContext<B>) -> Result<()> {
        if context.id() == self.context.id() {
            Ok(())
        } else {
            Err(ComputeError::ContextMismatch {
                expected: self.context.id(),
                actual: context.id(),
            })
        }
    }

    /// Resource requirements of an entry point on the bound device
    pub fn work_group_info(&self, entry_point_index: usize) -> Result<KernelWorkGroupInfo> {
        let (program, entry_points) = match &self.build {
            Build::Ready {
                program,
                entry_points,
            } => (program, entry_points),
            _ => return Err(ComputeError::NotReady(format!("{:?}", self.state()))),
        };

        let name = entry_points.get(entry_point_index).ok_or(
            ComputeError::EntryPointOutOfRange {
                index: entry_point_index,
                count: entry_points.len(),
            },
        )?;

        self.context
            .backend()
            .work_group_info(program, name, self.context.device())
    }

    fn query(&self, entry_point_index: usize) -> Option<KernelWorkGroupInfo> {
        if !self.is_ready() {
            return None;
        }
        self.work_group_info(entry_point_index)
            .inspect_err(|e| warn!("Work-group query failed: {}", e))
            .ok()
    }

    /// Local memory in bytes; `None` when not ready
    pub fn local_memory_footprint(&self, entry_point_index: usize) -> Option<u64> {
        self.query(entry_point_index).map(|i| i.local_memory_bytes)
    }

    /// Preferred work-group size multiple; `None` when not ready
    pub fn preferred_work_group_multiple(&self, entry_point_index: usize) -> Option<usize> {
        self.query(entry_point_index).map(|i| i.preferred_multiple)
    }

    /// Maximum work-group size for the kernel; `None` when not ready
    pub fn max_work_group_size(&self, entry_point_index: usize) -> Option<usize> {
        self.query(entry_point_index).map(|i| i.max_work_group_size)
    }

    /// Set the local work size used by the caller's launches
    pub fn set_work_group_size(&mut self, dims: &[usize]) -> Result<()> {
        if dims.is_empty() || dims.len() > 3 || dims.contains(&0) {
            return Err(ComputeError::InvalidWorkGroupSize(dims.to_vec()));
        }
        self.work_group_size = dims.to_vec();
        Ok(())
    }

    pub fn work_group_size(&self) -> &[usize] {
        &self.work_group_size
    }

    /// Set the dimensionality of the problem (1 to 3)
    pub fn set_problem_dimensions(&mut self, n: usize) -> Result<()> {
        if !(1..=3).contains(&n) {
            return Err(ComputeError::InvalidProblemDimensions(n));
        }
        self.dimensions = n;
        Ok(())
    }

    pub fn problem_dimensions(&self) -> usize {
        self.dimensions
    }

    /// Global work size covering `shape`, padded up to the work-group size
    ///
    /// Dimensions beyond the work-group shape use a group extent of 1. Fails
    /// when padding an extent overflows `usize`.
    pub fn global_work_size(&self, shape: &[usize]) -> Result<Vec<usize>> {
        shape
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let group = self.work_group_size.get(i).copied().unwrap_or(1);
                n.div_ceil(group).checked_mul(group).ok_or_else(|| {
                    ComputeError::InvalidParameters(format!(
                        "problem extent {} overflows when padded to a multiple of {}",
                        n, group
                    ))
                })
            })
            .collect()
    }
}

impl<B: ComputeBackend> fmt::Debug for KernelRuntime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRuntime")
            .field("context", &self.context.id())
            .field("state", &self.state())
            .field("entry_points", &self.entry_points())
            .field("options", &self.options.to_flags())
            .field("work_group_size", &self.work_group_size)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
