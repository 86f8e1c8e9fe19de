//! Analysis of complex calculations in fragment analysis calculations.

use std::fmt;
use std::path::Path;

use anyhow::{self, format_err, Context};
use log;
use serde::{Deserialize, Serialize};

use crate::fragment::{create_fragments, Fragment, FragmentError};
use crate::io::format::{fragorb_warn, nice_bool};
use crate::kf::handle::ResultHandle;
use crate::kf::{KfFile, KfRead};
use crate::sfo::sfo_functions::{get_total_number_sfos, uses_symmetry, SfoReadingParams, NOSYM_IRREP};
use crate::sfo::SfoSpecifier;


// ================
// Calculation info
// ================

/// A structure containing general information about the complex calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalcInfo {
    /// Whether the calculation is spin-restricted.
    pub restricted: bool,

    /// Whether the calculation includes scalar relativistic effects.
    pub relativistic: bool,

    /// Whether the calculation uses symmetry.
    pub symmetry: bool,
}

impl CalcInfo {
    /// Reads the calculation information from `("General", "nspin")`, `("General", "ioprel")`, and
    /// `("Symmetry", "grouplabel")`.
    pub fn from_kf(kf: &dyn KfRead) -> Result<Self, anyhow::Error> {
        Ok(Self {
            restricted: kf.read_int("General", "nspin")? == 1,
            relativistic: kf.read_int("General", "ioprel")? != 0,
            symmetry: uses_symmetry(kf)?,
        })
    }
}

impl fmt::Display for CalcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Restricted: {}", nice_bool(self.restricted))?;
        writeln!(f, "Relativistic: {}", nice_bool(self.relativistic))?;
        writeln!(f, "Symmetry used: {}", nice_bool(self.symmetry))?;
        Ok(())
    }
}

// ========
// Analyzer
// ========

/// A structure giving access to the SFO data of all fragments of a complex calculation.
///
/// SFOs can be given either as [`Sfo`](crate::sfo::Sfo) values or as labels such as `"14_AA"`.
#[derive(Debug)]
pub struct CalcAnalyzer {
    name: String,
    calc_info: CalcInfo,
    kf: ResultHandle,
    fragments: Vec<Box<dyn Fragment>>,
    reading_params: SfoReadingParams,
}

/// Creates an analyzer for a complex calculation.
///
/// # Arguments
///
/// * `name` - The name of the analyzer. If `None`, `("General", "title")` is used, if present.
/// * `kf` - The result handle of the complex calculation.
/// * `n_fragments` - The number of fragments.
/// * `params` - The SFO reading parameters.
///
/// # Errors
///
/// Errors if the result file is empty, or if any fragment cannot be constructed.
pub fn create_calc_analyzer(
    name: Option<&str>,
    kf: ResultHandle,
    n_fragments: usize,
    params: &SfoReadingParams,
) -> Result<CalcAnalyzer, anyhow::Error> {
    if kf.is_empty() {
        return Err(format_err!("The KF result file is empty."));
    }

    let calc_info = CalcInfo::from_kf(&kf)?;
    let name = match name {
        Some(name) => name.to_string(),
        None => kf
            .read_string("General", "title")
            .map(|title| title.trim().to_string())
            .unwrap_or_else(|_| "fragorb".to_string()),
    };

    let n_sfos = get_total_number_sfos(&kf)?;
    let n_listed = kf.read_usizes("SFOs", "fragment")?.len();
    if n_sfos != n_listed {
        fragorb_warn!(
            "`SFOs%number` gives {n_sfos} SFO(s), but `SFOs%fragment` lists {n_listed}."
        );
    }

    let fragments = create_fragments(n_fragments, &kf, calc_info.restricted, params)?;
    log::debug!(
        "Created the analyzer `{name}` with {} fragment(s) and {n_sfos} SFO(s).",
        fragments.len()
    );
    Ok(CalcAnalyzer {
        name,
        calc_info,
        kf,
        fragments,
        reading_params: params.clone(),
    })
}

impl CalcAnalyzer {
    /// Creates an analyzer from a KF store on disk. See [`KfFile::from_path`] for the supported
    /// formats. Without a title in the store, the analyzer is named after the directory holding
    /// the file.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        n_fragments: usize,
        params: &SfoReadingParams,
    ) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let kf = KfFile::from_path(path)?;
        let dir_name = path
            .parent()
            .and_then(|dir| dir.file_name())
            .and_then(|dir| dir.to_str())
            .map(|dir| dir.to_string());
        let name = if kf.contains("General", "title") {
            None
        } else {
            dir_name
        };
        create_calc_analyzer(name.as_deref(), ResultHandle::new(kf), n_fragments, params)
            .with_context(|| format!("Unable to analyse `{}`", path.display()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calc_info(&self) -> &CalcInfo {
        &self.calc_info
    }

    /// The result handle of the complex calculation.
    pub fn kf(&self) -> &ResultHandle {
        &self.kf
    }

    /// The parameters the SFO data were read with.
    pub fn reading_params(&self) -> &SfoReadingParams {
        &self.reading_params
    }

    pub fn fragments(&self) -> &[Box<dyn Fragment>] {
        &self.fragments
    }

    /// Returns fragment `frag_index` (1-based).
    pub fn fragment(&self, frag_index: usize) -> Result<&dyn Fragment, anyhow::Error> {
        frag_index
            .checked_sub(1)
            .and_then(|i| self.fragments.get(i))
            .map(|frag| frag.as_ref())
            .ok_or_else(|| anyhow::Error::new(FragmentError::UnknownFragment(frag_index)))
    }

    /// Returns the absolute overlap between `sfo1` of fragment 1 and `sfo2` of fragment 2. SFOs
    /// of different spins do not overlap.
    pub fn get_sfo_overlap<S1, S2>(&self, sfo1: &S1, sfo2: &S2) -> Result<f64, anyhow::Error>
    where
        S1: SfoSpecifier + ?Sized,
        S2: SfoSpecifier + ?Sized,
    {
        let sfo1 = sfo1.to_sfo()?;
        let sfo2 = sfo2.to_sfo()?;
        if sfo1.spin != sfo2.spin {
            return Ok(0.0);
        }
        let frag1 = self.fragment(1)?;
        let frag2 = self.fragment(2)?;
        frag1.get_overlap(
            &self.kf,
            self.calc_info.symmetry,
            frag2,
            &sfo1.irrep,
            sfo1.index,
            &sfo2.irrep,
            sfo2.index,
        )
    }

    /// Returns the orbital energy of `sfo` of fragment `frag_index`.
    pub fn get_sfo_orbital_energy<S>(&self, frag_index: usize, sfo: &S) -> Result<f64, anyhow::Error>
    where
        S: SfoSpecifier + ?Sized,
    {
        let sfo = sfo.to_sfo()?;
        self.fragment(frag_index)?
            .get_orbital_energy(&sfo.irrep, sfo.index)
    }

    /// Returns the occupation of `sfo` of fragment `frag_index`.
    pub fn get_sfo_occupation<S>(&self, frag_index: usize, sfo: &S) -> Result<f64, anyhow::Error>
    where
        S: SfoSpecifier + ?Sized,
    {
        let sfo = sfo.to_sfo()?;
        self.fragment(frag_index)?.get_occupation(&sfo.irrep, sfo.index)
    }

    /// Returns the HOMO/LUMO index of `sfo` within fragment `frag_index`.
    pub fn get_sfo_homo_lumo_index<S>(
        &self,
        frag_index: usize,
        sfo: &S,
    ) -> Result<usize, anyhow::Error>
    where
        S: SfoSpecifier + ?Sized,
    {
        let sfo = sfo.to_sfo()?;
        self.fragment(frag_index)?
            .get_homo_lumo_index(&sfo.irrep, sfo.index)
    }

    /// Returns the gross population of `sfo` of fragment `frag_index`. Without symmetry, the
    /// irrep of `sfo` is ignored.
    pub fn get_sfo_gross_population<S>(
        &self,
        frag_index: usize,
        sfo: &S,
    ) -> Result<f64, anyhow::Error>
    where
        S: SfoSpecifier + ?Sized,
    {
        let sfo = sfo.to_sfo()?;
        let irrep = if self.calc_info.symmetry {
            sfo.irrep.as_str()
        } else {
            NOSYM_IRREP
        };
        self.fragment(frag_index)?
            .get_gross_population(irrep, sfo.index)
    }
}

impl fmt::Display for CalcAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calculation: {}", self.name)?;
        write!(f, "{}", self.calc_info)?;
        writeln!(f, "Number of fragments: {}", self.fragments.len())?;
        for fragment in self.fragments.iter() {
            writeln!(f)?;
            write!(f, "{}", fragment.fragment_data())?;
        }
        Ok(())
    }
}
