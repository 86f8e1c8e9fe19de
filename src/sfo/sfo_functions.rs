//! Extraction of SFO data from KF result files of fragment analysis calculations.
//!
//! The relevant `(section, variable)` pairs are:
//! - `("Symmetry", "grouplabel")`: point group of the complex calculation (`NOSYM` if symmetry is
//!   not used),
//! - `("Symmetry", "ncbs")`: number of frozen-core orbitals per irrep of the complex,
//! - `("SFOs", "fragment")`: fragment index of each *active* SFO,
//! - `("SFOs", "subspecies")`: irrep of each active SFO, as one whitespace-separated string,
//! - `("SFOs", "occupation")`: occupation of each active SFO,
//! - `("SFOs", "escale")`, `("SFOs", "energy")`, `("SFOs", "site_energy")`: orbital energies in
//!   Hartree of each active SFO, with and without scalar relativistic scaling, or as site
//!   energies,
//! - `("SFO popul", "sfo_grosspop")`: gross populations of all SFOs, frozen cores *included*.
//!
//! Active SFOs are SFOs that are not frozen cores.

use std::fmt;

use anyhow::{self, format_err};
use derive_builder::Builder;
use indexmap::IndexMap;
use itertools::Itertools;
use log;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::io::format::fragorb_warn;
use crate::kf::KfRead;

#[cfg(test)]
#[path = "sfo_functions_tests.rs"]
mod sfo_functions_tests;

/// The single irrep label used when a calculation does not use symmetry.
pub const NOSYM_IRREP: &str = "A";

/// Occupations at or above this value mark an SFO as occupied. Occupations within this value of
/// zero, one or two are taken as exactly that.
pub const OCCUPATION_THRESHOLD: f64 = 1e-6;

/// The conversion factor from Hartree to electronvolt.
pub const HARTREE_TO_EV: f64 = 27.211386245988;

/// Per-irrep data of one fragment, with irreps in order of first appearance.
pub type IrrepData = IndexMap<String, Array1<f64>>;

// ==========
// Parameters
// ==========

/// An enumerated type for the units orbital energies are reported in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyUnit {
    /// Hartree, as stored by the engine.
    #[default]
    Hartree,

    /// Electronvolt.
    ElectronVolt,
}

impl EnergyUnit {
    /// The factor converting Hartree into this unit.
    pub fn factor_from_hartree(&self) -> f64 {
        match self {
            Self::Hartree => 1.0,
            Self::ElectronVolt => HARTREE_TO_EV,
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hartree => write!(f, "Ha"),
            Self::ElectronVolt => write!(f, "eV"),
        }
    }
}

/// An enumerated type for the `SFOs` variables orbital energies can be read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitalEnergyVariable {
    /// Site energies, present only when requested in the engine input.
    SiteEnergy,

    /// Energies including scalar relativistic scaling.
    Escale,

    /// Plain orbital energies.
    Energy,
}

impl OrbitalEnergyVariable {
    /// The name of the variable in the `SFOs` section.
    pub fn variable(&self) -> &'static str {
        match self {
            Self::SiteEnergy => "site_energy",
            Self::Escale => "escale",
            Self::Energy => "energy",
        }
    }
}

/// A structure containing control parameters for reading SFO data from KF result files.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct SfoReadingParams {
    /// The unit orbital energies are reported in.
    #[builder(default = "EnergyUnit::Hartree")]
    #[serde(default)]
    pub orbital_energy_unit: EnergyUnit,

    /// The variable orbital energies are read from. If `None`, the first variable present among
    /// `site_energy`, `escale`, and `energy` is used.
    #[builder(default = "None")]
    #[serde(default)]
    pub orbital_energy_variable: Option<OrbitalEnergyVariable>,
}

impl SfoReadingParams {
    /// Returns a builder to construct a [`SfoReadingParams`] structure.
    pub fn builder() -> SfoReadingParamsBuilder {
        SfoReadingParamsBuilder::default()
    }
}

impl Default for SfoReadingParams {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `SfoReadingParams`.")
    }
}

impl fmt::Display for SfoReadingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Orbital energy unit: {}", self.orbital_energy_unit)?;
        writeln!(
            f,
            "Orbital energy variable: {}",
            self.orbital_energy_variable
                .map(|var| var.variable().to_string())
                .unwrap_or_else(|| "auto".to_string())
        )?;
        Ok(())
    }
}

// ================
// Helper functions
// ================

/// Splits per-SFO values into per-irrep arrays, keeping the relative order of values within each
/// irrep and the order of first appearance of the irreps.
///
/// # Errors
///
/// Errors if `data` and `irreps` differ in length.
pub fn split_by_irreps(data: &[f64], irreps: &[String]) -> Result<IrrepData, anyhow::Error> {
    if data.len() != irreps.len() {
        return Err(format_err!(
            "Unable to split {} values over {} irrep labels.",
            data.len(),
            irreps.len()
        ));
    }
    let mut split = IndexMap::<String, Vec<f64>>::new();
    for (value, irrep) in data.iter().zip(irreps.iter()) {
        split.entry(irrep.clone()).or_default().push(*value);
    }
    Ok(split
        .into_iter()
        .map(|(irrep, values)| (irrep, Array1::from_vec(values)))
        .collect())
}

/// Selects the values at the given 0-based positions.
fn select(data: &[f64], positions: &[usize], what: &str) -> Result<Vec<f64>, anyhow::Error> {
    positions
        .iter()
        .map(|&i| {
            data.get(i).copied().ok_or_else(|| {
                format_err!(
                    "SFO position {i} is out of range for {what} with {} entries.",
                    data.len()
                )
            })
        })
        .collect()
}

// ===================
// Low-level KF access
// ===================

/// Checks if the complex calculation uses symmetry for its MOs, gross populations and
/// overlaps.
pub fn uses_symmetry(kf: &dyn KfRead) -> Result<bool, anyhow::Error> {
    let grouplabel = kf.read_words("Symmetry", "grouplabel")?;
    let first = grouplabel
        .first()
        .ok_or_else(|| format_err!("Empty point group label in `Symmetry%grouplabel`."))?;
    Ok(first.to_lowercase() != "nosym")
}

/// The total number of active SFOs over all fragments.
pub fn get_total_number_sfos(kf: &dyn KfRead) -> Result<usize, anyhow::Error> {
    let n = kf.read_int("SFOs", "number")?;
    usize::try_from(n).map_err(|_| format_err!("Negative SFO count {n} in `SFOs%number`."))
}

/// The fragment indices present, sorted increasingly.
pub fn get_fragment_indices(kf: &dyn KfRead) -> Result<Vec<usize>, anyhow::Error> {
    Ok(kf
        .read_usizes("SFOs", "fragment")?
        .into_iter()
        .sorted()
        .dedup()
        .collect())
}

/// The 0-based positions of the active SFOs belonging to fragment `frag_index`, in the engine's
/// order.
pub fn get_sfo_indices_of_one_frag(
    kf: &dyn KfRead,
    frag_index: usize,
) -> Result<Vec<usize>, anyhow::Error> {
    Ok(kf
        .read_usizes("SFOs", "fragment")?
        .into_iter()
        .enumerate()
        .filter_map(|(i, sfo_frag_index)| (sfo_frag_index == frag_index).then_some(i))
        .collect())
}

/// The irrep of each active SFO belonging to fragment `frag_index`, in the engine's order.
pub fn get_irrep_each_sfo_one_frag(
    kf: &dyn KfRead,
    frag_index: usize,
) -> Result<Vec<String>, anyhow::Error> {
    let positions = get_sfo_indices_of_one_frag(kf, frag_index)?;
    let irreps = kf.read_words("SFOs", "subspecies")?;
    positions
        .iter()
        .map(|&i| {
            irreps.get(i).cloned().ok_or_else(|| {
                format_err!(
                    "SFO position {i} is out of range for `SFOs%subspecies` with {} entries.",
                    irreps.len()
                )
            })
        })
        .collect()
}

/// The distinct irreps of the active SFOs belonging to fragment `frag_index`, in order of first
/// appearance.
pub fn get_ordered_irreps_of_one_frag(
    kf: &dyn KfRead,
    frag_index: usize,
) -> Result<Vec<String>, anyhow::Error> {
    Ok(get_irrep_each_sfo_one_frag(kf, frag_index)?
        .into_iter()
        .unique()
        .collect())
}

/// The number of active SFOs of fragment `frag_index` in each of its irreps.
pub fn get_number_sfos_per_irrep_per_frag(
    kf: &dyn KfRead,
    frag_index: usize,
) -> Result<IndexMap<String, usize>, anyhow::Error> {
    let mut counts = IndexMap::<String, usize>::new();
    for irrep in get_irrep_each_sfo_one_frag(kf, frag_index)? {
        *counts.entry(irrep).or_default() += 1;
    }
    Ok(counts)
}

/// The declared type name of fragment `frag_index`.
///
/// `("SFOs", "fragtype")` holds one name per active SFO, so the name at the fragment's first SFO
/// is taken. If the variable instead holds one name per fragment, it is indexed by fragment.
pub fn get_frag_name(kf: &dyn KfRead, frag_index: usize) -> Result<String, anyhow::Error> {
    let names = kf.read_words("SFOs", "fragtype")?;
    let frag_indices = kf.read_usizes("SFOs", "fragment")?;
    let position = if names.len() == frag_indices.len() {
        frag_indices
            .iter()
            .position(|&i| i == frag_index)
            .ok_or_else(|| format_err!("Fragment {frag_index} owns no SFOs."))?
    } else {
        frag_index
            .checked_sub(1)
            .ok_or_else(|| format_err!("Fragment indices are 1-based."))?
    };
    names.get(position).cloned().ok_or_else(|| {
        format_err!(
            "No fragment type name for fragment {frag_index} in `SFOs%fragtype` ({} entries).",
            names.len()
        )
    })
}

// ==================
// Frozen-core counts
// ==================

/// The number of frozen-core orbitals per irrep relevant to fragment `frag_index`.
///
/// The counts `("Symmetry", "ncbs")` of the complex are assigned to the fragment's irreps in
/// order; irreps beyond the stored counts have none. If the complex calculation does not use
/// symmetry, an extra `"A"` entry holds the total number of frozen cores, which is the shift used
/// for overlaps and gross populations in that case.
pub fn get_frozen_cores_per_irrep(
    kf: &dyn KfRead,
    frag_index: usize,
) -> Result<IndexMap<String, usize>, anyhow::Error> {
    let ordered_irreps = get_ordered_irreps_of_one_frag(kf, frag_index)?;
    let n_core_orbs_per_irrep = kf.read_usizes("Symmetry", "ncbs")?;

    let mut frozen_cores = ordered_irreps
        .into_iter()
        .map(|irrep| (irrep, 0))
        .collect::<IndexMap<_, _>>();
    for (n_frozen, n_core_orbs) in frozen_cores.values_mut().zip(n_core_orbs_per_irrep.iter()) {
        *n_frozen = *n_core_orbs;
    }

    if !uses_symmetry(kf)? {
        frozen_cores.insert(NOSYM_IRREP.to_string(), n_core_orbs_per_irrep.iter().sum());
    }
    log::debug!("Frozen cores per irrep for fragment {frag_index}: {frozen_cores:?}");
    Ok(frozen_cores)
}

// ================================
// Orbital energies and occupations
// ================================

/// Determines the `SFOs` variable to read orbital energies from: `site_energy` if present,
/// then `escale`, and `energy` otherwise.
pub fn get_orbital_energy_variable(kf: &dyn KfRead) -> OrbitalEnergyVariable {
    if kf.contains("SFOs", OrbitalEnergyVariable::SiteEnergy.variable()) {
        OrbitalEnergyVariable::SiteEnergy
    } else if kf.contains("SFOs", OrbitalEnergyVariable::Escale.variable()) {
        OrbitalEnergyVariable::Escale
    } else {
        OrbitalEnergyVariable::Energy
    }
}

/// Reads the orbital energies of all active SFOs in the configured unit.
pub fn get_orbital_energies(
    kf: &dyn KfRead,
    params: &SfoReadingParams,
) -> Result<Vec<f64>, anyhow::Error> {
    let variable = match params.orbital_energy_variable {
        Some(requested) if kf.contains("SFOs", requested.variable()) => requested,
        Some(requested) => {
            let fallback = get_orbital_energy_variable(kf);
            fragorb_warn!(
                "Orbital energy variable `SFOs%{}` not found; using `SFOs%{}` instead.",
                requested.variable(),
                fallback.variable()
            );
            fallback
        }
        None => get_orbital_energy_variable(kf),
    };
    log::debug!("Reading orbital energies from `SFOs%{}`.", variable.variable());
    let factor = params.orbital_energy_unit.factor_from_hartree();
    Ok(kf
        .read_floats("SFOs", variable.variable())?
        .into_iter()
        .map(|e| e * factor)
        .collect())
}

/// Reads the occupations of all active SFOs.
pub fn get_occupations(kf: &dyn KfRead) -> Result<Vec<f64>, anyhow::Error> {
    kf.read_floats("SFOs", "occupation")
}

/// The orbital energies and occupations of one fragment, split by irrep.
///
/// # Arguments
///
/// * `kf` - The KF result file.
/// * `sfo_indices_of_one_frag` - The 0-based positions of the fragment's active SFOs.
/// * `frag_irreps_each_sfo` - The irrep of each of those SFOs.
/// * `params` - The reading parameters.
///
/// # Returns
///
/// The orbital energies and the occupations.
pub fn get_restricted_fragment_properties(
    kf: &dyn KfRead,
    sfo_indices_of_one_frag: &[usize],
    frag_irreps_each_sfo: &[String],
    params: &SfoReadingParams,
) -> Result<(IrrepData, IrrepData), anyhow::Error> {
    let energies = select(
        &get_orbital_energies(kf, params)?,
        sfo_indices_of_one_frag,
        "orbital energies",
    )?;
    let occupations = select(
        &get_occupations(kf)?,
        sfo_indices_of_one_frag,
        "occupations",
    )?;
    Ok((
        split_by_irreps(&energies, frag_irreps_each_sfo)?,
        split_by_irreps(&occupations, frag_irreps_each_sfo)?,
    ))
}

// =================
// Gross populations
// =================

/// Reads the gross populations of the active SFOs of fragment `frag_index`, split by irrep.
///
/// `("SFO popul", "sfo_grosspop")` includes frozen-core orbitals. With symmetry, it is laid out
/// in irrep blocks, each being
/// ```text
/// [frozen cores, fragment 1 SFOs, fragment 2 SFOs, ...]
/// ```
/// with the blocks in the engine's irrep order. Without symmetry in the complex, all frozen cores
/// come first, followed by the SFOs of each fragment in turn, stored under the irrep `"A"` even
/// if the fragment itself carries irreps.
pub fn get_gross_populations(
    kf: &dyn KfRead,
    frag_index: usize,
) -> Result<IrrepData, anyhow::Error> {
    let frag_indices = get_fragment_indices(kf)?;
    let sfo_counts = frag_indices
        .iter()
        .map(|&i| Ok((i, get_number_sfos_per_irrep_per_frag(kf, i)?)))
        .collect::<Result<IndexMap<_, _>, anyhow::Error>>()?;
    let own_counts = sfo_counts
        .get(&frag_index)
        .ok_or_else(|| format_err!("Fragment {frag_index} owns no SFOs."))?;
    let frozen_cores = get_frozen_cores_per_irrep(kf, frag_index)?;
    let complex_has_symmetry = uses_symmetry(kf)?;

    let raw_gross_pops = kf.read_floats("SFO popul", "sfo_grosspop")?;
    let slice = |start: usize, len: usize| -> Result<Array1<f64>, anyhow::Error> {
        raw_gross_pops
            .get(start..start + len)
            .map(|values| Array1::from_vec(values.to_vec()))
            .ok_or_else(|| {
                format_err!(
                    "Gross populations {start}..{} are out of range for `SFO popul%sfo_grosspop` with {} entries.",
                    start + len,
                    raw_gross_pops.len()
                )
            })
    };

    if !complex_has_symmetry {
        let start = frozen_cores
            .get(NOSYM_IRREP)
            .copied()
            .unwrap_or_else(|| frozen_cores.values().sum());
        let preceding = sfo_counts
            .iter()
            .filter(|(i, _)| **i < frag_index)
            .map(|(_, counts)| counts.values().sum::<usize>())
            .sum::<usize>();
        let n_own = own_counts.values().sum::<usize>();
        let mut gross_pops = IrrepData::new();
        gross_pops.insert(NOSYM_IRREP.to_string(), slice(start + preceding, n_own)?);
        return Ok(gross_pops);
    }

    let block_irreps = kf
        .read_words("SFOs", "subspecies")?
        .into_iter()
        .unique()
        .collect::<Vec<_>>();
    let mut gross_pops = IrrepData::new();
    let mut block_start = 0;
    for irrep in block_irreps.iter() {
        let n_frozen = frozen_cores.get(irrep).copied().unwrap_or(0);
        let count_of = |i: &usize| {
            sfo_counts
                .get(i)
                .and_then(|counts| counts.get(irrep))
                .copied()
                .unwrap_or(0)
        };
        let preceding = frag_indices
            .iter()
            .filter(|&&i| i < frag_index)
            .map(count_of)
            .sum::<usize>();
        let n_own = count_of(&frag_index);
        if n_own > 0 {
            gross_pops.insert(irrep.clone(), slice(block_start + n_frozen + preceding, n_own)?);
        }
        block_start += n_frozen + frag_indices.iter().map(count_of).sum::<usize>();
    }
    Ok(gross_pops)
}
