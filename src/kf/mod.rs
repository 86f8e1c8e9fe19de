//! Access to keyed result files written by the quantum-chemistry engine.
//!
//! A KF result file is organised as a two-level `(section, variable)` namespace. The layout of
//! each variable is owned by the engine; this module only provides the [`KfRead`] contract that
//! the rest of the crate consumes, a typed [`KfVariable`] value, and an in-memory [`KfFile`]
//! store that can be serialised to and from YAML or `fragorb` binary files.

use std::error::Error;
use std::fmt;
use std::path::Path;

use anyhow::{self, format_err, Context};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::{read_fragorb_binary, read_fragorb_yaml, write_fragorb_binary, FragOrbFileType};

pub mod cache;
pub mod handle;

#[cfg(test)]
pub(crate) mod fixtures;


// ==================
// Struct definitions
// ==================

// -------
// Values
// -------

/// An enumerated type for the values that can be stored against a `(section, variable)` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum KfVariable {
    /// A single integer.
    Int(i64),

    /// A single floating-point number.
    Float(f64),

    /// A single boolean.
    Bool(bool),

    /// A string. Many per-orbital labels are stored as one whitespace-separated string.
    Str(String),

    /// A sequence of integers.
    IntArray(Vec<i64>),

    /// A sequence of floating-point numbers.
    FloatArray(Vec<f64>),
}

impl KfVariable {
    /// Returns a short description of the stored type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Str(_) => "string",
            Self::IntArray(_) => "integer array",
            Self::FloatArray(_) => "float array",
        }
    }

    /// Returns the value as a single integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::IntArray(is) if is.len() == 1 => Some(is[0]),
            _ => None,
        }
    }

    /// Returns the value as a single float. Integers are converted.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            Self::FloatArray(xs) if xs.len() == 1 => Some(xs[0]),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a sequence of integers. A single integer gives a one-element sequence.
    pub fn as_ints(&self) -> Option<Vec<i64>> {
        match self {
            Self::Int(i) => Some(vec![*i]),
            Self::IntArray(is) => Some(is.clone()),
            _ => None,
        }
    }

    /// Returns the value as a sequence of floats. Integer values are converted, and a single
    /// scalar gives a one-element sequence.
    pub fn as_floats(&self) -> Option<Vec<f64>> {
        match self {
            Self::Int(i) => Some(vec![*i as f64]),
            Self::Float(x) => Some(vec![*x]),
            Self::IntArray(is) => Some(is.iter().map(|i| *i as f64).collect()),
            Self::FloatArray(xs) => Some(xs.clone()),
            _ => None,
        }
    }
}

// ------
// Errors
// ------

/// An error type for failed reads from a KF result file.
#[derive(Debug, Clone, PartialEq)]
pub enum KfError {
    /// The requested `(section, variable)` pair is absent.
    MissingVariable { section: String, variable: String },

    /// The requested `(section, variable)` pair holds a value of an unexpected type.
    TypeMismatch {
        section: String,
        variable: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The stored value cannot be interpreted as requested.
    InvalidValue {
        section: String,
        variable: String,
        reason: String,
    },
}

impl fmt::Display for KfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingVariable { section, variable } => {
                write!(f, "KF error: variable `{variable}` not found in section `{section}`.")
            }
            Self::TypeMismatch {
                section,
                variable,
                expected,
                found,
            } => write!(
                f,
                "KF error: `{section}%{variable}` holds a {found}, but a {expected} was expected."
            ),
            Self::InvalidValue {
                section,
                variable,
                reason,
            } => write!(f, "KF error: `{section}%{variable}` is invalid: {reason}."),
        }
    }
}

impl Error for KfError {}

// =================
// Trait definitions
// =================

/// Trait for read-only access to a keyed `(section, variable)` result file.
pub trait KfRead {
    // ----------------
    // Required methods
    // ----------------

    /// Reads the value stored against `(section, variable)`.
    ///
    /// # Errors
    ///
    /// Errors with [`KfError::MissingVariable`] if the pair does not exist.
    fn read(&self, section: &str, variable: &str) -> Result<KfVariable, anyhow::Error>;

    /// Checks if `(section, variable)` exists.
    fn contains(&self, section: &str, variable: &str) -> bool;

    /// Returns the names of all sections present.
    fn section_names(&self) -> Vec<String>;

    // ----------------
    // Provided methods
    // ----------------

    /// Checks if the file has no sections at all.
    fn is_empty(&self) -> bool {
        self.section_names().is_empty()
    }

    /// Reads a single integer.
    fn read_int(&self, section: &str, variable: &str) -> Result<i64, anyhow::Error> {
        let value = self.read(section, variable)?;
        value
            .as_int()
            .ok_or_else(|| type_mismatch(section, variable, "integer", &value))
    }

    /// Reads a sequence of integers.
    fn read_ints(&self, section: &str, variable: &str) -> Result<Vec<i64>, anyhow::Error> {
        let value = self.read(section, variable)?;
        value
            .as_ints()
            .ok_or_else(|| type_mismatch(section, variable, "integer array", &value))
    }

    /// Reads a sequence of non-negative integers as indices or counts.
    fn read_usizes(&self, section: &str, variable: &str) -> Result<Vec<usize>, anyhow::Error> {
        self.read_ints(section, variable)?
            .into_iter()
            .map(|i| {
                usize::try_from(i).map_err(|_| {
                    anyhow::Error::new(KfError::InvalidValue {
                        section: section.to_string(),
                        variable: variable.to_string(),
                        reason: format!("negative entry {i} where a count or index is expected"),
                    })
                })
            })
            .collect()
    }

    /// Reads a sequence of floats.
    fn read_floats(&self, section: &str, variable: &str) -> Result<Vec<f64>, anyhow::Error> {
        let value = self.read(section, variable)?;
        value
            .as_floats()
            .ok_or_else(|| type_mismatch(section, variable, "float array", &value))
    }

    /// Reads a string.
    fn read_string(&self, section: &str, variable: &str) -> Result<String, anyhow::Error> {
        let value = self.read(section, variable)?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| type_mismatch(section, variable, "string", &value))
    }

    /// Reads a string and splits it on whitespace.
    fn read_words(&self, section: &str, variable: &str) -> Result<Vec<String>, anyhow::Error> {
        Ok(self
            .read_string(section, variable)?
            .split_whitespace()
            .map(|word| word.to_string())
            .collect())
    }
}

fn type_mismatch(
    section: &str,
    variable: &str,
    expected: &'static str,
    found: &KfVariable,
) -> anyhow::Error {
    anyhow::Error::new(KfError::TypeMismatch {
        section: section.to_string(),
        variable: variable.to_string(),
        expected,
        found: found.type_name(),
    })
}

// =====
// Store
// =====

/// An in-memory KF result store.
///
/// Sections and variables keep their insertion order so that serialised stores read naturally.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KfFile {
    sections: IndexMap<String, IndexMap<String, KfVariable>>,
}

impl KfFile {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` against `(section, variable)`, replacing any previous value.
    pub fn insert<S: Into<String>, V: Into<String>>(
        &mut self,
        section: S,
        variable: V,
        value: KfVariable,
    ) -> &mut Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(variable.into(), value);
        self
    }

    /// Stores `value` against `(section, variable)` and returns the store, for chained
    /// construction.
    pub fn with<S: Into<String>, V: Into<String>>(
        mut self,
        section: S,
        variable: V,
        value: KfVariable,
    ) -> Self {
        self.insert(section, variable, value);
        self
    }

    /// Reads a store from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        read_fragorb_yaml::<Self, _>(&path).with_context(|| {
            format!(
                "Unable to read a KF store from the YAML file `{}`",
                path.as_ref().display()
            )
        })
    }

    /// Reads a store from a `fragorb` binary file of type [`FragOrbFileType::Kf`].
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the file without its `.fragorb.kf` extension.
    pub fn from_binary<P: AsRef<Path>>(name: P) -> Result<Self, anyhow::Error> {
        read_fragorb_binary::<Self, _>(&name, FragOrbFileType::Kf).with_context(|| {
            format!(
                "Unable to read a KF store from `{}.{}`",
                name.as_ref().display(),
                FragOrbFileType::Kf.ext()
            )
        })
    }

    /// Reads a store from a path, choosing the format from its extension: `.yml`/`.yaml` files
    /// are read as YAML, `.fragorb.kf` files as binary.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let fname = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format_err!("Invalid KF store path `{}`.", path.display()))?;
        let binary_ext = format!(".{}", FragOrbFileType::Kf.ext());
        if fname.ends_with(".yml") || fname.ends_with(".yaml") {
            Self::from_yaml(path)
        } else if let Some(stem) = fname.strip_suffix(&binary_ext) {
            Self::from_binary(path.with_file_name(stem))
        } else {
            Err(format_err!(
                "Unrecognised KF store extension for `{}`: expected `.yml`, `.yaml`, or `{binary_ext}`.",
                path.display()
            ))
        }
    }

    /// Writes the store into a `fragorb` binary file of type [`FragOrbFileType::Kf`].
    pub fn to_binary<P: AsRef<Path>>(&self, name: P) -> Result<(), anyhow::Error> {
        write_fragorb_binary(name, FragOrbFileType::Kf, self)
    }
}

impl KfRead for KfFile {
    fn read(&self, section: &str, variable: &str) -> Result<KfVariable, anyhow::Error> {
        self.sections
            .get(section)
            .and_then(|vars| vars.get(variable))
            .cloned()
            .ok_or_else(|| {
                anyhow::Error::new(KfError::MissingVariable {
                    section: section.to_string(),
                    variable: variable.to_string(),
                })
            })
    }

    fn contains(&self, section: &str, variable: &str) -> bool {
        self.sections
            .get(section)
            .map(|vars| vars.contains_key(variable))
            .unwrap_or(false)
    }

    fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }
}
