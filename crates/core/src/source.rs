//! Kernel source providers

use crate::context::ComputeContext;
use crate::error::Result;
use crate::options::BuildOptions;
use crate::runtime::KernelRuntime;
use crate::traits::ComputeBackend;
use std::borrow::Cow;
use std::sync::Arc;

/// Something that provides kernel source text
///
/// Simulations implement [`kernel_source`](Self::kernel_source) and get a
/// compiled [`KernelRuntime`] from [`compile`](Self::compile).
pub trait KernelSource {
    /// Kernel source in the device's kernel language
    fn kernel_source(&self) -> Cow<'_, str>;

    /// Options used by [`compile`](Self::compile)
    fn build_options(&self) -> BuildOptions {
        BuildOptions::default()
    }

    /// Create a queue on `context` and compile the source
    fn compile<B: ComputeBackend>(
        &self,
        context: Arc<ComputeContext<B>>,
    ) -> Result<KernelRuntime<B>> {
        KernelRuntime::create(context, self.kernel_source(), self.build_options())
    }
}

impl KernelSource for str {
    fn kernel_source(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl KernelSource for String {
    fn kernel_source(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}
