//! Kernel build options
//!
//! Each [`BuildOption`] maps to exactly one compiler flag. Options can be
//! parsed from short names (as typed on a command line); names that do not
//! map to a flag are rejected.

use crate::error::{ComputeError, Result};
use std::fmt;
use std::str::FromStr;

/// Kernel language version passed via `-cl-std`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageVersion {
    V1_2,
    V2_0,
    V3_0,
}

impl LanguageVersion {
    fn as_str(self) -> &'static str {
        match self {
            Self::V1_2 => "CL1.2",
            Self::V2_0 => "CL2.0",
            Self::V3_0 => "CL3.0",
        }
    }
}

/// A single compiler option
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildOption {
    /// Emit debug symbols
    DebugSymbols,
    /// Turn off all optimizations
    DisableOptimizations,
    /// Assume no NaN or infinity arguments and results
    FiniteMathOnly,
    /// Relaxed floating-point math
    FastRelaxedMath,
    /// Allow `a * b + c` to be fused with reduced accuracy
    MadEnable,
    /// Treat warnings as errors
    WarningsAsErrors,
    /// Target language version
    LanguageVersion(LanguageVersion),
    /// Preprocessor definition
    Define { name: String, value: Option<String> },
}

impl BuildOption {
    /// Convenience constructor for `-D name=value`
    ///
    /// Fails when the name is not a C identifier or the value would split
    /// into further compiler flags.
    pub fn define(name: impl Into<String>, value: impl fmt::Display) -> Result<Self> {
        let option = Self::Define {
            name: name.into(),
            value: Some(value.to_string()),
        };
        option.validate()?;
        Ok(option)
    }

    /// Check that the option renders to exactly one flag
    ///
    /// Only definitions can be malformed; the error carries the rendered flag.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Define { name, value }
                if !is_identifier(name) || value.as_deref().is_some_and(|v| !is_define_value(v)) =>
            {
                Err(ComputeError::UnknownBuildOption(self.flag()))
            }
            _ => Ok(()),
        }
    }

    /// The compiler flag this option translates to
    pub fn flag(&self) -> String {
        match self {
            Self::DebugSymbols => "-g".to_string(),
            Self::DisableOptimizations => "-cl-opt-disable".to_string(),
            Self::FiniteMathOnly => "-cl-finite-math-only".to_string(),
            Self::FastRelaxedMath => "-cl-fast-relaxed-math".to_string(),
            Self::MadEnable => "-cl-mad-enable".to_string(),
            Self::WarningsAsErrors => "-Werror".to_string(),
            Self::LanguageVersion(v) => format!("-cl-std={}", v.as_str()),
            Self::Define { name, value: None } => format!("-D {}", name),
            Self::Define {
                name,
                value: Some(value),
            } => format!("-D {}={}", name, value),
        }
    }
}

impl FromStr for BuildOption {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self> {
        let option = match s {
            "debug" => Self::DebugSymbols,
            "no-opt" => Self::DisableOptimizations,
            "finite-math" => Self::FiniteMathOnly,
            "fast-math" => Self::FastRelaxedMath,
            "mad" => Self::MadEnable,
            "werror" => Self::WarningsAsErrors,
            "cl1.2" => Self::LanguageVersion(LanguageVersion::V1_2),
            "cl2.0" => Self::LanguageVersion(LanguageVersion::V2_0),
            "cl3.0" => Self::LanguageVersion(LanguageVersion::V3_0),
            _ => return parse_define(s).ok_or_else(|| ComputeError::UnknownBuildOption(s.into())),
        };
        Ok(option)
    }
}

/// `D<name>` or `D<name>=<value>`, where name is a C identifier
fn parse_define(s: &str) -> Option<BuildOption> {
    let body = s.strip_prefix('D')?;
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (body, None),
    };

    let option = BuildOption::Define {
        name: name.to_string(),
        value,
    };
    option.validate().ok().map(|()| option)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A macro value must stay a single token of the flag string
fn is_define_value(value: &str) -> bool {
    !value.starts_with('-') && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

impl fmt::Display for BuildOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flag())
    }
}

/// Ordered set of build options
///
/// Insertion order is kept, duplicates are dropped and only the last
/// language version survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    options: Vec<BuildOption>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, returning `self` for chaining
    pub fn with(mut self, option: BuildOption) -> Self {
        self.insert(option);
        self
    }

    /// Add an option
    pub fn insert(&mut self, option: BuildOption) {
        if let BuildOption::LanguageVersion(_) = option {
            self.options
                .retain(|o| !matches!(o, BuildOption::LanguageVersion(_)));
        } else if self.options.contains(&option) {
            return;
        }
        self.options.push(option);
    }

    /// Parse a list of option names, failing on the first unknown name
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::new();
        for name in names {
            options.insert(name.as_ref().parse()?);
        }
        Ok(options)
    }

    pub fn contains(&self, option: &BuildOption) -> bool {
        self.options.contains(option)
    }

    pub fn is_debug(&self) -> bool {
        self.contains(&BuildOption::DebugSymbols)
    }

    pub fn language_version(&self) -> Option<LanguageVersion> {
        self.options.iter().find_map(|o| match o {
            BuildOption::LanguageVersion(v) => Some(*v),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Check every option, see [`BuildOption::validate`]
    pub fn validate(&self) -> Result<()> {
        self.options.iter().try_for_each(BuildOption::validate)
    }

    /// Render the space-joined flag string handed to the compiler
    pub fn to_flags(&self) -> String {
        self.options
            .iter()
            .map(BuildOption::flag)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<BuildOption> for BuildOptions {
    fn from_iter<T: IntoIterator<Item = BuildOption>>(iter: T) -> Self {
        let mut options = Self::new();
        for option in iter {
            options.insert(option);
        }
        options
    }
}
