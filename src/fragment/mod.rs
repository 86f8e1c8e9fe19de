//! Fragments of fragment analysis calculations and their SFO data.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use anyhow::{self, format_err};
use indexmap::IndexMap;
use log;
use serde::Serialize;

use crate::io::format::write_subtitle;
use crate::kf::handle::ResultHandle;
use crate::sfo::sfo_functions::{
    get_frag_name, get_frozen_cores_per_irrep, get_gross_populations,
    get_irrep_each_sfo_one_frag, get_restricted_fragment_properties, get_sfo_indices_of_one_frag,
    IrrepData, SfoReadingParams, NOSYM_IRREP, OCCUPATION_THRESHOLD,
};

pub mod index_mapping;

#[cfg(test)]
#[path = "fragment_tests.rs"]
mod fragment_tests;

// ======
// Errors
// ======

/// An error type for failed fragment queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// The query is not available for unrestricted fragments.
    Unsupported,

    /// A 1-based SFO index lies outside `1..=len`.
    IndexOutOfRange {
        frag_index: usize,
        irrep: String,
        index: usize,
        len: usize,
    },

    /// The fragment has no SFOs in the requested irrep.
    UnknownIrrep { frag_index: usize, irrep: String },

    /// No SFOs are recorded for the requested fragment.
    UnknownFragment(usize),

    /// A packed overlap position lies beyond the stored overlap matrix.
    OverlapOutOfRange {
        irrep: String,
        position: usize,
        len: usize,
    },
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unsupported => {
                write!(f, "Unrestricted fragments are currently not supported.")
            }
            Self::IndexOutOfRange {
                frag_index,
                irrep,
                index,
                len,
            } => write!(
                f,
                "Fragment error: SFO index {index} is out of range for irrep {irrep} of fragment {frag_index}, which has {len} SFO(s)."
            ),
            Self::UnknownIrrep { frag_index, irrep } => write!(
                f,
                "Fragment error: fragment {frag_index} has no SFOs in irrep {irrep}."
            ),
            Self::UnknownFragment(frag_index) => {
                write!(f, "Fragment error: no SFOs are recorded for fragment {frag_index}.")
            }
            Self::OverlapOutOfRange {
                irrep,
                position,
                len,
            } => write!(
                f,
                "Fragment error: packed overlap position {position} is out of range for the overlap matrix of irrep {irrep} with {len} entries."
            ),
        }
    }
}

impl Error for FragmentError {}

// =============
// Fragment data
// =============

/// A structure containing the SFO data of one fragment, split by irrep.
///
/// All per-irrep arrays are ordered by the 1-based SFO index within the irrep, and irreps are kept
/// in order of first appearance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FragmentData {
    /// The fragment type name.
    pub name: String,

    /// The 1-based fragment index.
    pub frag_index: usize,

    /// The orbital energies.
    pub orb_energies: IrrepData,

    /// The occupations.
    pub occupations: IrrepData,

    /// The gross populations.
    pub gross_populations: IrrepData,

    /// The number of frozen-core orbitals per irrep.
    pub n_frozen_cores_per_irrep: IndexMap<String, usize>,
}

impl FragmentData {
    /// Looks up the value of 1-based SFO `index` in `irrep` of one of the per-irrep tables.
    fn lookup(&self, data: &IrrepData, irrep: &str, index: usize) -> Result<f64, FragmentError> {
        let values = data.get(irrep).ok_or_else(|| FragmentError::UnknownIrrep {
            frag_index: self.frag_index,
            irrep: irrep.to_string(),
        })?;
        index
            .checked_sub(1)
            .and_then(|i| values.get(i))
            .copied()
            .ok_or_else(|| FragmentError::IndexOutOfRange {
                frag_index: self.frag_index,
                irrep: irrep.to_string(),
                index,
                len: values.len(),
            })
    }

    /// The distance of SFO `index` in `irrep` from the frontier of this fragment, counted over the
    /// SFOs of all irreps in order of energy: `0` for the HOMO, `1` for the next occupied SFO
    /// below, and so on. Virtual SFOs are counted upwards from the LUMO in the same way. Degenerate
    /// SFOs are ordered by irrep and then by index.
    pub fn homo_lumo_index(&self, irrep: &str, index: usize) -> Result<usize, FragmentError> {
        let energy = self.lookup(&self.orb_energies, irrep, index)?;
        let occupied = self.lookup(&self.occupations, irrep, index)? >= OCCUPATION_THRESHOLD;
        let position = (self.orb_energies.get_index_of(irrep), index - 1);
        let n_closer = self
            .orb_energies
            .iter()
            .enumerate()
            .filter_map(|(irrep_position, (other_irrep, energies))| {
                self.occupations.get(other_irrep).map(|occupations| {
                    energies
                        .iter()
                        .zip(occupations.iter())
                        .enumerate()
                        .map(move |(i, (e, occ))| ((Some(irrep_position), i), *e, *occ))
                })
            })
            .flatten()
            .filter(|(_, _, occ)| (*occ >= OCCUPATION_THRESHOLD) == occupied)
            .filter(|(other_position, e, _)| {
                let closer = if occupied { *e > energy } else { *e < energy };
                closer || (*e == energy && *other_position < position)
            })
            .count();
        Ok(n_closer)
    }
}

impl fmt::Display for FragmentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, &format!("Fragment {}: {}", self.frag_index, self.name))?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<8} {:>6} {:>6} {:>14} {:>10} {:>10}",
            "Irrep", "Frozen", "#SFOs", "Energy range", "Occ.", "Gross pop."
        )?;
        for (irrep, energies) in self.orb_energies.iter() {
            let n_frozen = self
                .n_frozen_cores_per_irrep
                .get(irrep)
                .copied()
                .unwrap_or(0);
            let (e_min, e_max) = energies
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &e| {
                    (lo.min(e), hi.max(e))
                });
            let occ = self.occupations.get(irrep).map(|x| x.sum()).unwrap_or(0.0);
            let gross_pop = self
                .gross_populations
                .get(irrep)
                .map(|x| x.sum())
                .unwrap_or(0.0);
            writeln!(
                f,
                "{irrep:<8} {n_frozen:>6} {:>6} {:>6.3}..{:<6.3} {occ:>10.3} {gross_pop:>10.3}",
                energies.len(),
                e_min,
                e_max,
            )?;
        }
        Ok(())
    }
}

/// Extracts the SFO data of fragment `frag_index` from a KF result file.
///
/// # Arguments
///
/// * `kf` - The result handle.
/// * `frag_index` - The 1-based fragment index.
/// * `restricted` - Whether the calculation is restricted. Unrestricted fragments are extracted
/// in the same way, since their queries are not supported.
/// * `params` - The reading parameters.
///
/// # Errors
///
/// Errors if the fragment owns no SFOs, or if any of the required KF variables is missing or
/// inconsistent.
pub fn create_fragment_data(
    kf: &ResultHandle,
    frag_index: usize,
    restricted: bool,
    params: &SfoReadingParams,
) -> Result<FragmentData, anyhow::Error> {
    if !restricted {
        log::debug!(
            "Fragment {frag_index} is unrestricted; its data are extracted as for a restricted fragment."
        );
    }
    let sfo_indices = get_sfo_indices_of_one_frag(kf, frag_index)?;
    if sfo_indices.is_empty() {
        return Err(anyhow::Error::new(FragmentError::UnknownFragment(frag_index)));
    }
    let irreps_each_sfo = get_irrep_each_sfo_one_frag(kf, frag_index)?;
    let name = get_frag_name(kf, frag_index)?;
    let n_frozen_cores_per_irrep = get_frozen_cores_per_irrep(kf, frag_index)?;
    let (orb_energies, occupations) =
        get_restricted_fragment_properties(kf, &sfo_indices, &irreps_each_sfo, params)?;
    let gross_populations = get_gross_populations(kf, frag_index)?;
    log::debug!(
        "Extracted {} SFO(s) of fragment {frag_index} ({name}).",
        sfo_indices.len()
    );

    Ok(FragmentData {
        name,
        frag_index,
        orb_energies,
        occupations,
        gross_populations,
        n_frozen_cores_per_irrep,
    })
}

// ========
// Fragment
// ========

/// Trait for fragments of a fragment analysis calculation.
///
/// All SFO indices are 1-based within their irrep.
pub trait Fragment: fmt::Debug {
    /// The SFO data of this fragment.
    fn fragment_data(&self) -> &FragmentData;

    /// The fragment type name.
    fn name(&self) -> &str {
        &self.fragment_data().name
    }

    /// The 1-based fragment index.
    fn frag_index(&self) -> usize {
        self.fragment_data().frag_index
    }

    /// Returns the absolute overlap between SFO `index1` of `irrep1` of this fragment and SFO
    /// `index2` of `irrep2` of `other`.
    ///
    /// # Arguments
    ///
    /// * `kf` - The result handle holding the overlap matrices.
    /// * `use_symmetry` - Whether the calculation uses symmetry. If not, both irreps are taken to
    /// be `"A"`.
    /// * `other` - The other fragment.
    /// * `irrep1`, `index1` - The SFO of this fragment.
    /// * `irrep2`, `index2` - The SFO of `other`.
    #[allow(clippy::too_many_arguments)]
    fn get_overlap(
        &self,
        kf: &ResultHandle,
        use_symmetry: bool,
        other: &dyn Fragment,
        irrep1: &str,
        index1: usize,
        irrep2: &str,
        index2: usize,
    ) -> Result<f64, anyhow::Error>;

    /// Returns the orbital energy of SFO `index` in `irrep`.
    fn get_orbital_energy(&self, irrep: &str, index: usize) -> Result<f64, anyhow::Error>;

    /// Returns the gross population of SFO `index` in `irrep`.
    fn get_gross_population(&self, irrep: &str, index: usize) -> Result<f64, anyhow::Error>;

    /// Returns the occupation of SFO `index` in `irrep`.
    fn get_occupation(&self, irrep: &str, index: usize) -> Result<f64, anyhow::Error>;

    /// Returns the HOMO/LUMO index of SFO `index` in `irrep`. See
    /// [`FragmentData::homo_lumo_index`].
    fn get_homo_lumo_index(&self, irrep: &str, index: usize) -> Result<usize, anyhow::Error>;
}

/// The 1-based position of element `(i, j)` (both 1-based) of a symmetric matrix stored as its
/// packed lower triangle, *i.e.* `max(max - 1) / 2 + min`. Returns `None` for a zero index or if
/// the position overflows.
fn packed_position(i: usize, j: usize) -> Option<usize> {
    let (min, max) = if i <= j { (i, j) } else { (j, i) };
    if min == 0 {
        return None;
    }
    max.checked_mul(max - 1)
        .map(|n| n / 2)
        .and_then(|n| n.checked_add(min))
}

/// A fragment of a restricted calculation.
#[derive(Clone, Debug)]
pub struct RestrictedFragment {
    fragment_data: FragmentData,
}

impl RestrictedFragment {
    pub fn new(fragment_data: FragmentData) -> Self {
        Self { fragment_data }
    }
}

impl Fragment for RestrictedFragment {
    fn fragment_data(&self) -> &FragmentData {
        &self.fragment_data
    }

    fn get_overlap(
        &self,
        kf: &ResultHandle,
        use_symmetry: bool,
        other: &dyn Fragment,
        irrep1: &str,
        index1: usize,
        irrep2: &str,
        index2: usize,
    ) -> Result<f64, anyhow::Error> {
        let (irrep1, irrep2) = if use_symmetry {
            (irrep1, irrep2)
        } else {
            (NOSYM_IRREP, NOSYM_IRREP)
        };

        // Entries of this fragment take precedence over those of the other fragment.
        let mut frozen_cores_per_irrep = other
            .fragment_data()
            .n_frozen_cores_per_irrep
            .iter()
            .map(|(irrep, n)| (irrep.clone(), *n))
            .collect::<BTreeMap<_, _>>();
        frozen_cores_per_irrep.extend(
            self.fragment_data
                .n_frozen_cores_per_irrep
                .iter()
                .map(|(irrep, n)| (irrep.clone(), *n)),
        );

        let mapping = kf.sfo_index_mapping(&frozen_cores_per_irrep, use_symmetry)?;
        let global1 = mapping.global_index(self.frag_index(), irrep1, index1)?;
        let global2 = mapping.global_index(other.frag_index(), irrep2, index2)?;

        let overlap_matrix = kf.overlap_matrix(irrep1)?;
        let out_of_range = |position: usize| {
            anyhow::Error::new(FragmentError::OverlapOutOfRange {
                irrep: irrep1.to_string(),
                position,
                len: overlap_matrix.len(),
            })
        };
        // Positions too large to represent are reported as `usize::MAX`.
        let position =
            packed_position(global1, global2).ok_or_else(|| out_of_range(usize::MAX))?;
        let overlap = overlap_matrix
            .get(position - 1)
            .copied()
            .ok_or_else(|| out_of_range(position))?;
        log::trace!(
            "Overlap <{irrep1} {index1} (frag {}) | {irrep2} {index2} (frag {})> at packed position {position}: {overlap}",
            self.frag_index(),
            other.frag_index(),
        );
        Ok(overlap.abs())
    }

    fn get_orbital_energy(&self, irrep: &str, index: usize) -> Result<f64, anyhow::Error> {
        Ok(self
            .fragment_data
            .lookup(&self.fragment_data.orb_energies, irrep, index)?)
    }

    fn get_gross_population(&self, irrep: &str, index: usize) -> Result<f64, anyhow::Error> {
        Ok(self
            .fragment_data
            .lookup(&self.fragment_data.gross_populations, irrep, index)?)
    }

    fn get_occupation(&self, irrep: &str, index: usize) -> Result<f64, anyhow::Error> {
        Ok(self
            .fragment_data
            .lookup(&self.fragment_data.occupations, irrep, index)?)
    }

    fn get_homo_lumo_index(&self, irrep: &str, index: usize) -> Result<usize, anyhow::Error> {
        Ok(self.fragment_data.homo_lumo_index(irrep, index)?)
    }
}

/// A fragment of an unrestricted calculation. None of its queries are supported yet.
#[derive(Clone, Debug)]
pub struct UnrestrictedFragment {
    fragment_data: FragmentData,
}

impl UnrestrictedFragment {
    pub fn new(fragment_data: FragmentData) -> Self {
        Self { fragment_data }
    }
}

impl Fragment for UnrestrictedFragment {
    fn fragment_data(&self) -> &FragmentData {
        &self.fragment_data
    }

    fn get_overlap(
        &self,
        _kf: &ResultHandle,
        _use_symmetry: bool,
        _other: &dyn Fragment,
        _irrep1: &str,
        _index1: usize,
        _irrep2: &str,
        _index2: usize,
    ) -> Result<f64, anyhow::Error> {
        Err(anyhow::Error::new(FragmentError::Unsupported))
    }

    fn get_orbital_energy(&self, _irrep: &str, _index: usize) -> Result<f64, anyhow::Error> {
        Err(anyhow::Error::new(FragmentError::Unsupported))
    }

    fn get_gross_population(&self, _irrep: &str, _index: usize) -> Result<f64, anyhow::Error> {
        Err(anyhow::Error::new(FragmentError::Unsupported))
    }

    fn get_occupation(&self, _irrep: &str, _index: usize) -> Result<f64, anyhow::Error> {
        Err(anyhow::Error::new(FragmentError::Unsupported))
    }

    fn get_homo_lumo_index(&self, _irrep: &str, _index: usize) -> Result<usize, anyhow::Error> {
        Err(anyhow::Error::new(FragmentError::Unsupported))
    }
}

// =======
// Factory
// =======

/// Creates fragment `frag_index` with the default reading parameters. See
/// [`create_fragment_with_params`].
pub fn create_fragment(
    frag_index: usize,
    kf: &ResultHandle,
    restricted: bool,
) -> Result<Box<dyn Fragment>, anyhow::Error> {
    create_fragment_with_params(frag_index, kf, restricted, &SfoReadingParams::default())
}

/// Creates fragment `frag_index`, restricted or unrestricted as requested.
pub fn create_fragment_with_params(
    frag_index: usize,
    kf: &ResultHandle,
    restricted: bool,
    params: &SfoReadingParams,
) -> Result<Box<dyn Fragment>, anyhow::Error> {
    let fragment_data = create_fragment_data(kf, frag_index, restricted, params)?;
    if restricted {
        Ok(Box::new(RestrictedFragment::new(fragment_data)))
    } else {
        Ok(Box::new(UnrestrictedFragment::new(fragment_data)))
    }
}

/// Creates fragments `1..=n_fragments`.
pub fn create_fragments(
    n_fragments: usize,
    kf: &ResultHandle,
    restricted: bool,
    params: &SfoReadingParams,
) -> Result<Vec<Box<dyn Fragment>>, anyhow::Error> {
    if n_fragments == 0 {
        return Err(format_err!("At least one fragment is required."));
    }
    (1..=n_fragments)
        .map(|frag_index| create_fragment_with_params(frag_index, kf, restricted, params))
        .collect()
}
