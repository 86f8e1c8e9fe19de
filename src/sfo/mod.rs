//! Symmetrised fragment orbitals (SFOs) and their labels.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod sfo_functions;

#[cfg(test)]
#[path = "sfo_tests.rs"]
mod sfo_tests;

lazy_static! {
    static ref SFO_LABEL_RE: Regex =
        Regex::new(r"^(\d+)_([^_\s]+)(?:_([^_\s]+))?$").expect("Regex pattern invalid.");
}

// ==================
// Struct definitions
// ==================

/// An enumerated type for the spin spaces of unrestricted calculations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpinKind {
    /// The alpha spin space. Restricted calculations only have this one.
    #[default]
    A,

    /// The beta spin space.
    B,
}

impl fmt::Display for SpinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// An error type for malformed SFO labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfoLabelError(pub String);

impl fmt::Display for SfoLabelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SFO label error: {}.", self.0)
    }
}

impl Error for SfoLabelError {}

/// A structure identifying a symmetrised fragment orbital by its 1-based index within its irrep,
/// its irrep, and its spin space.
///
/// The textual label is `<index>_<irrep>` or `<index>_<irrep>_<spin>`, *e.g.* `14_AA` or
/// `3_E1:1_B`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sfo {
    /// The 1-based index of the SFO within its irrep.
    pub index: usize,

    /// The irrep label.
    pub irrep: String,

    /// The spin space.
    pub spin: SpinKind,
}

impl Sfo {
    /// Creates an SFO identifier.
    pub fn new(index: usize, irrep: &str, spin: SpinKind) -> Self {
        Self {
            index,
            irrep: irrep.to_string(),
            spin,
        }
    }

    /// Parses an SFO label of the form `<index>_<irrep>` or `<index>_<irrep>_<spin>`. If the
    /// spin is omitted, [`SpinKind::A`] is assumed.
    pub fn from_label(label: &str) -> Result<Self, SfoLabelError> {
        let caps = SFO_LABEL_RE.captures(label.trim()).ok_or_else(|| {
            SfoLabelError(format!(
                "`{label}` does not follow the `<index>_<irrep>[_<spin>]` format"
            ))
        })?;
        let index = caps[1]
            .parse::<usize>()
            .map_err(|err| SfoLabelError(format!("invalid index in `{label}`: {err}")))?;
        if index == 0 {
            return Err(SfoLabelError(format!(
                "SFO indices are 1-based, but `{label}` has index 0"
            )));
        }
        let spin = match caps.get(3).map(|m| m.as_str()) {
            None | Some("A") => SpinKind::A,
            Some("B") => SpinKind::B,
            Some(other) => {
                return Err(SfoLabelError(format!(
                    "invalid spin `{other}` in `{label}`; expected `A` or `B`"
                )))
            }
        };
        Ok(Self::new(index, &caps[2], spin))
    }

    /// The label used by the engine's orbital viewer, *e.g.* `SFO_A1_3` or `SFO_A1_3_B`.
    pub fn viewer_label(&self) -> String {
        match self.spin {
            SpinKind::A => format!("SFO_{}_{}", self.irrep, self.index),
            SpinKind::B => format!("SFO_{}_{}_{}", self.irrep, self.index, self.spin),
        }
    }
}

impl FromStr for Sfo {
    type Err = SfoLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

impl fmt::Display for Sfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spin {
            SpinKind::A => write!(f, "{}_{}", self.index, self.irrep),
            SpinKind::B => write!(f, "{}_{}_{}", self.index, self.irrep, self.spin),
        }
    }
}

/// Trait for values that specify an SFO, either directly or through its label.
pub trait SfoSpecifier {
    /// Resolves the specified SFO.
    fn to_sfo(&self) -> Result<Sfo, SfoLabelError>;
}

impl SfoSpecifier for Sfo {
    fn to_sfo(&self) -> Result<Sfo, SfoLabelError> {
        Ok(self.clone())
    }
}

impl SfoSpecifier for str {
    fn to_sfo(&self) -> Result<Sfo, SfoLabelError> {
        Sfo::from_label(self)
    }
}

impl SfoSpecifier for String {
    fn to_sfo(&self) -> Result<Sfo, SfoLabelError> {
        Sfo::from_label(self)
    }
}
