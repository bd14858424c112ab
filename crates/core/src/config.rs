//! Runtime configuration
//!
//! Compiler output and build caching are plain fields handed to context
//! construction, so two contexts in the same process can differ.

/// Settings applied to a context and every runtime built on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Log the compiler output of successful builds at `info` level
    pub compiler_output: bool,
    /// Allow the backend to reuse cached program binaries
    pub program_cache: bool,
    /// Create command queues with profiling enabled
    pub profiling: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            compiler_output: false,
            program_cache: true,
            profiling: true,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden from the environment
    ///
    /// - `CLSIM_COMPILER_OUTPUT`: log compiler output
    /// - `CLSIM_NO_CACHE`: disable program caching
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var_os(name).is_some())
    }

    /// Defaults overridden by whichever toggle variables `is_set` reports
    pub fn from_vars(is_set: impl Fn(&str) -> bool) -> Self {
        let mut config = Self::default();
        if is_set("CLSIM_COMPILER_OUTPUT") {
            config.compiler_output = true;
        }
        if is_set("CLSIM_NO_CACHE") {
            config.program_cache = false;
        }
        config
    }

    pub fn with_compiler_output(mut self, enabled: bool) -> Self {
        self.compiler_output = enabled;
        self
    }

    pub fn with_program_cache(mut self, enabled: bool) -> Self {
        self.program_cache = enabled;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert!(!config.compiler_output);
        assert!(config.program_cache);
        assert!(config.profiling);
    }

    #[test]
    fn test_builders() {
        let config = RuntimeConfig::default()
            .with_compiler_output(true)
            .with_program_cache(false)
            .with_profiling(false);
        assert_eq!(
            config,
            RuntimeConfig {
                compiler_output: true,
                program_cache: false,
                profiling: false,
            }
        );
    }

    #[rstest]
    #[case::none(&[], false, true)]
    #[case::compiler_output(&["CLSIM_COMPILER_OUTPUT"], true, true)]
    #[case::no_cache(&["CLSIM_NO_CACHE"], false, false)]
    #[case::both(&["CLSIM_NO_CACHE", "CLSIM_COMPILER_OUTPUT"], true, false)]
    #[case::unrelated(&["CLSIM_CACHE", "COMPILER_OUTPUT"], false, true)]
    fn test_from_vars(
        #[case] set: &[&str],
        #[case] compiler_output: bool,
        #[case] program_cache: bool,
    ) {
        let config = RuntimeConfig::from_vars(|name| set.contains(&name));
        assert_eq!(config.compiler_output, compiler_output);
        assert_eq!(config.program_cache, program_cache);
        assert!(config.profiling);
    }
}
