//! Error taxonomy for context construction and kernel builds

use thiserror::Error;

/// Errors raised by compute context construction, kernel builds and
/// kernel introspection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    /// The backend reported no platform at all
    #[error("no compute platform available")]
    NoPlatformAvailable,

    /// Neither a GPU nor a CPU device exists on the chosen platform
    #[error("no compute device available on platform '{platform}'")]
    NoDeviceAvailable { platform: String },

    /// A shared-surface context could not be created
    ///
    /// Never returned from context construction: it is caught there and
    /// downgraded to a plain context.
    #[error("graphics interop unavailable: {0}")]
    GraphicsInteropUnavailable(String),

    /// Kernel compilation failed; `log` holds the compiler diagnostics verbatim
    #[error("kernel build failed:\n{log}")]
    BuildFailure { log: String },

    /// Kernel introspection before a successful build
    #[error("kernel runtime is not ready ({0})")]
    NotReady(String),

    /// Entry point index past the end of the compiled program
    #[error("entry point index {index} out of range ({count} available)")]
    EntryPointOutOfRange { index: usize, count: usize },

    /// Build option name that does not map to a compiler flag
    #[error("unknown build option '{0}'")]
    UnknownBuildOption(String),

    /// Work-group shape with zero or more than three dimensions, or a zero extent
    #[error("invalid work-group size {0:?}")]
    InvalidWorkGroupSize(Vec<usize>),

    /// Problem dimensionality outside 1..=3
    #[error("invalid problem dimensions {0} (expected 1, 2 or 3)")]
    InvalidProblemDimensions(usize),

    /// A runtime was used with a context other than the one it was built against
    #[error("kernel runtime belongs to context #{expected}, not context #{actual}")]
    ContextMismatch { expected: u64, actual: u64 },

    /// Simulation parameters that cannot produce a stable solution
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Any other failure reported by the native backend
    #[error("backend error: {0}")]
    Backend(String),
}

impl ComputeError {
    /// Compiler diagnostics carried by a build failure
    pub fn build_log(&self) -> Option<&str> {
        match self {
            Self::BuildFailure { log } => Some(log),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ComputeError>;
