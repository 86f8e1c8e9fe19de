//! Mapping of fragment-local SFO indices onto the engine's global SFO indices.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{self, format_err};
use indexmap::IndexMap;
use itertools::izip;
use serde::Serialize;

use crate::fragment::FragmentError;
use crate::kf::{KfError, KfRead};
use crate::sfo::sfo_functions::NOSYM_IRREP;

#[cfg(test)]
#[path = "index_mapping_tests.rs"]
mod index_mapping_tests;

/// A two-level mapping from fragment index and irrep label to the ordered, 1-based global SFO
/// indices of that fragment's SFOs in that irrep.
///
/// The global indices are those used to address the packed overlap matrices: within one irrep
/// block, frozen cores come first, followed by the SFOs of fragment 1, fragment 2, and so on. For
/// calculations without symmetry, every fragment has a single irrep key `"A"`.
///
/// For a C3v calculation with two fragments, the mapping looks like
/// ```text
/// 1 ─┬─ A1   : [1, 2, 3, ...]
///    ├─ E1:1 : [1, 2, ...]
///    └─ ...
/// 2 ─┬─ A1   : [11, 12, ...]
///    └─ ...
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SfoIndexMapping {
    mapping: IndexMap<usize, IndexMap<String, Vec<usize>>>,
}

impl SfoIndexMapping {
    /// Appends a global index to the end of the `(frag_index, irrep)` group.
    fn push(&mut self, frag_index: usize, irrep: &str, global_index: usize) {
        self.mapping
            .entry(frag_index)
            .or_default()
            .entry(irrep.to_string())
            .or_default()
            .push(global_index);
    }

    /// The fragment indices present, in order of first appearance.
    pub fn fragment_indices(&self) -> impl Iterator<Item = &usize> + '_ {
        self.mapping.keys()
    }

    /// The irreps present in fragment `frag_index`, in order of first appearance.
    pub fn irreps(&self, frag_index: usize) -> Option<impl Iterator<Item = &String> + '_> {
        self.mapping.get(&frag_index).map(|irreps| irreps.keys())
    }

    /// The ordered global indices of fragment `frag_index` in `irrep`.
    pub fn global_indices(&self, frag_index: usize, irrep: &str) -> Option<&[usize]> {
        self.mapping
            .get(&frag_index)
            .and_then(|irreps| irreps.get(irrep))
            .map(|indices| indices.as_slice())
    }

    /// Resolves a 1-based local SFO index of fragment `frag_index` in `irrep` to its 1-based
    /// global index.
    ///
    /// # Errors
    ///
    /// Errors if the fragment or the irrep is absent, or if `local_index` lies outside
    /// `1..=n` with `n` the number of SFOs of the fragment in that irrep.
    pub fn global_index(
        &self,
        frag_index: usize,
        irrep: &str,
        local_index: usize,
    ) -> Result<usize, FragmentError> {
        let irreps = self
            .mapping
            .get(&frag_index)
            .ok_or(FragmentError::UnknownFragment(frag_index))?;
        let indices = irreps
            .get(irrep)
            .ok_or_else(|| FragmentError::UnknownIrrep {
                frag_index,
                irrep: irrep.to_string(),
            })?;
        local_index
            .checked_sub(1)
            .and_then(|i| indices.get(i))
            .copied()
            .ok_or_else(|| FragmentError::IndexOutOfRange {
                frag_index,
                irrep: irrep.to_string(),
                index: local_index,
                len: indices.len(),
            })
    }
}

impl fmt::Display for SfoIndexMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (frag_index, irreps) in self.mapping.iter() {
            for (irrep, indices) in irreps.iter() {
                writeln!(
                    f,
                    "Fragment {frag_index:>2}, {irrep:<6}: {} SFO(s), global {}..={}",
                    indices.len(),
                    indices.first().copied().unwrap_or(0),
                    indices.last().copied().unwrap_or(0),
                )?;
            }
        }
        Ok(())
    }
}

/// Builds the mapping between fragment-local SFO indices and global SFO indices.
///
/// The raw per-irrep SFO indices `("SFOs", "isfo")` are shifted by the number of frozen cores so
/// that they address the overlap matrices, which include frozen-core orbitals.
///
/// # Arguments
///
/// * `kf` - The KF result file.
/// * `frozen_cores_per_irrep` - The number of frozen-core orbitals per irrep. When symmetry is
/// not used, the `"A"` entry gives the total shift; if it is absent, all entries are summed.
/// * `use_symmetry` - Whether the calculation uses symmetry. If not, every fragment is mapped
/// under the single irrep `"A"`.
///
/// # Returns
///
/// The [`SfoIndexMapping`], whose groups keep the engine's relative SFO ordering.
pub fn map_sfo_indices(
    kf: &dyn KfRead,
    frozen_cores_per_irrep: &BTreeMap<String, usize>,
    use_symmetry: bool,
) -> Result<SfoIndexMapping, anyhow::Error> {
    let sfo_indices = kf.read_usizes("SFOs", "isfo")?;
    let frag_indices = kf.read_usizes("SFOs", "fragment")?;
    let irreps_each_sfo = kf.read_words("SFOs", "subspecies")?;
    if sfo_indices.len() != frag_indices.len() || sfo_indices.len() != irreps_each_sfo.len() {
        return Err(format_err!(
            "Mismatched SFO array lengths: {} `isfo`, {} `fragment`, {} `subspecies` entries.",
            sfo_indices.len(),
            frag_indices.len(),
            irreps_each_sfo.len()
        ));
    }

    // `isfo` is 1-based.
    let invalid_isfo = |reason: String| {
        anyhow::Error::new(KfError::InvalidValue {
            section: "SFOs".to_string(),
            variable: "isfo".to_string(),
            reason,
        })
    };
    if let Some(position) = sfo_indices.iter().position(|&sfo_index| sfo_index == 0) {
        return Err(invalid_isfo(format!(
            "entry {} is zero, but SFO indices start at 1",
            position + 1
        )));
    }
    let shifted = |sfo_index: usize, shift: usize| {
        sfo_index.checked_add(shift).ok_or_else(|| {
            invalid_isfo(format!(
                "SFO index {sfo_index} overflows when shifted by {shift} frozen core(s)"
            ))
        })
    };

    let mut mapping = SfoIndexMapping::default();

    if !use_symmetry {
        let shift = frozen_cores_per_irrep
            .get(NOSYM_IRREP)
            .copied()
            .unwrap_or_else(|| frozen_cores_per_irrep.values().sum());
        for (sfo_index, frag_index) in sfo_indices.iter().zip(frag_indices.iter()) {
            mapping.push(*frag_index, NOSYM_IRREP, shifted(*sfo_index, shift)?);
        }
        return Ok(mapping);
    }

    for (sfo_index, frag_index, irrep) in izip!(
        sfo_indices.iter(),
        frag_indices.iter(),
        irreps_each_sfo.iter()
    ) {
        let shift = frozen_cores_per_irrep.get(irrep).copied().unwrap_or(0);
        mapping.push(*frag_index, irrep, shifted(*sfo_index, shift)?);
    }
    Ok(mapping)
}
