//! Driver for analysing pairwise interactions between SFOs of two fragments.

use std::fmt;

use anyhow::{self, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use log;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::analyzer::CalcAnalyzer;
use crate::drivers::FragOrbDriver;
use crate::io::format::{
    fragorb_output, fragorb_warn, log_macsec_begin, log_macsec_end, log_subtitle, log_title,
    nice_bool, write_subtitle, FragOrbOutput,
};
use crate::io::{write_fragorb_binary, FragOrbFileType};
use crate::sfo::sfo_functions::{EnergyUnit, OCCUPATION_THRESHOLD};
use crate::sfo::{Sfo, SfoSpecifier};


/// Energy gaps below this value are treated as degenerate.
pub const ENERGY_GAP_THRESHOLD: f64 = 1e-8;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// An enumerated type for the classes of SFO pairs to be analysed, named after the occupations of
/// the fragment 1 and fragment 2 SFOs in turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SfoInteractionKind {
    /// All pairs.
    #[default]
    All,

    /// Occupied-occupied pairs, giving Pauli repulsion.
    HomoHomo,

    /// Pairs of an occupied fragment 1 SFO and a virtual fragment 2 SFO.
    HomoLumo,

    /// Pairs of a virtual fragment 1 SFO and an occupied fragment 2 SFO.
    LumoHomo,
}

impl SfoInteractionKind {
    /// The required occupation states of the fragment 1 and fragment 2 SFOs. `None` admits both.
    fn occupation_filter(&self) -> (Option<bool>, Option<bool>) {
        match self {
            Self::All => (None, None),
            Self::HomoHomo => (Some(true), Some(true)),
            Self::HomoLumo => (Some(true), Some(false)),
            Self::LumoHomo => (Some(false), Some(true)),
        }
    }
}

impl fmt::Display for SfoInteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::HomoHomo => write!(f, "HOMO-HOMO"),
            Self::HomoLumo => write!(f, "HOMO-LUMO"),
            Self::LumoHomo => write!(f, "LUMO-HOMO"),
        }
    }
}

/// A structure containing control parameters for SFO interaction analysis.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct SfoInteractionParams {
    /// Labels of the fragment 1 SFOs to be considered, *e.g.* `14_AA`.
    #[builder(setter(custom))]
    pub frag1_sfos: Vec<String>,

    /// Labels of the fragment 2 SFOs to be considered.
    #[builder(setter(custom))]
    pub frag2_sfos: Vec<String>,

    /// The class of SFO pairs to be analysed.
    #[builder(default = "SfoInteractionKind::All")]
    #[serde(default)]
    pub interaction: SfoInteractionKind,

    /// Optional name for saving the result as a binary file of type [`FragOrbFileType::Int`]. If
    /// `None`, the result will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub result_save_name: Option<String>,
}

impl SfoInteractionParams {
    /// Returns a builder to construct a [`SfoInteractionParams`] structure.
    pub fn builder() -> SfoInteractionParamsBuilder {
        SfoInteractionParamsBuilder::default()
    }
}

impl SfoInteractionParamsBuilder {
    pub fn frag1_sfos(&mut self, labels: &[&str]) -> &mut Self {
        self.frag1_sfos = Some(labels.iter().map(|label| label.to_string()).collect());
        self
    }

    pub fn frag2_sfos(&mut self, labels: &[&str]) -> &mut Self {
        self.frag2_sfos = Some(labels.iter().map(|label| label.to_string()).collect());
        self
    }
}

impl fmt::Display for SfoInteractionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fragment 1 SFOs: {}", self.frag1_sfos.iter().join(", "))?;
        writeln!(f, "Fragment 2 SFOs: {}", self.frag2_sfos.iter().join(", "))?;
        writeln!(f, "Interactions: {}", self.interaction)?;
        writeln!(
            f,
            "Save SFO interaction results to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                format!("{name}.{}", FragOrbFileType::Int.ext())
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;
        Ok(())
    }
}

// -----------
// SFOs, pairs
// -----------

/// A structure containing the data of one SFO taking part in an interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SfoOrbital {
    /// The SFO.
    pub sfo: Sfo,

    /// The 1-based index of the fragment the SFO belongs to.
    pub frag_index: usize,

    /// The orbital energy.
    pub energy: f64,

    /// The occupation.
    pub occupation: f64,

    /// The gross population.
    pub gross_population: f64,

    /// The distance from the frontier of the fragment, counted downwards from the HOMO for
    /// occupied SFOs and upwards from the LUMO for virtual ones.
    pub homo_lumo_index: usize,
}

impl SfoOrbital {
    /// Gathers the data of `sfo` of fragment `frag_index`.
    pub fn from_analyzer<S>(
        analyzer: &CalcAnalyzer,
        frag_index: usize,
        sfo: &S,
    ) -> Result<Self, anyhow::Error>
    where
        S: SfoSpecifier + ?Sized,
    {
        let sfo = sfo.to_sfo()?;
        Ok(Self {
            energy: analyzer.get_sfo_orbital_energy(frag_index, &sfo)?,
            occupation: analyzer.get_sfo_occupation(frag_index, &sfo)?,
            gross_population: analyzer.get_sfo_gross_population(frag_index, &sfo)?,
            homo_lumo_index: analyzer.get_sfo_homo_lumo_index(frag_index, &sfo)?,
            frag_index,
            sfo,
        })
    }

    pub fn is_occupied(&self) -> bool {
        self.occupation >= OCCUPATION_THRESHOLD
    }

    pub fn is_fully_occupied(&self) -> bool {
        (self.occupation - 2.0).abs() <= OCCUPATION_THRESHOLD
    }

    pub fn is_singly_occupied(&self) -> bool {
        (self.occupation - 1.0).abs() <= OCCUPATION_THRESHOLD
    }

    pub fn is_virtual(&self) -> bool {
        self.occupation.abs() <= OCCUPATION_THRESHOLD
    }

    /// The frontier label of this SFO, *e.g.* `HOMO`, `HOMO-2`, `SOMO`, `LUMO+1`. Occupied SFOs
    /// are labelled `SOMO` when their occupation rounds to one and `HOMO` otherwise.
    pub fn homo_lumo_label(&self) -> String {
        let (label, sign) = if !self.is_occupied() {
            ("LUMO", '+')
        } else if self.occupation.round() == 1.0 {
            ("SOMO", '-')
        } else {
            ("HOMO", '-')
        };
        if self.homo_lumo_index == 0 {
            label.to_string()
        } else {
            format!("{label}{sign}{}", self.homo_lumo_index)
        }
    }
}

/// A structure containing a fragment 1 SFO, a fragment 2 SFO, and their overlap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SfoPair {
    /// The fragment 1 SFO.
    pub sfo1: SfoOrbital,

    /// The fragment 2 SFO.
    pub sfo2: SfoOrbital,

    /// The absolute overlap between the two SFOs.
    pub overlap: f64,
}

impl SfoPair {
    /// Checks if both SFOs are fully occupied.
    pub fn is_pauli_pair(&self) -> bool {
        self.sfo1.is_fully_occupied() && self.sfo2.is_fully_occupied()
    }

    /// The absolute orbital energy difference.
    pub fn energy_gap(&self) -> f64 {
        (self.sfo1.energy - self.sfo2.energy).abs()
    }

    /// A measure of the strength of the interaction, scaled by 100:
    /// - virtual-virtual pairs do not interact and give zero,
    /// - occupied-occupied pairs give $`S^2`$, a measure of Pauli repulsion,
    /// - occupied-virtual pairs give $`S^2 / |\Delta\varepsilon|`$, a measure of stabilisation,
    /// or $`-S`$ if the two SFOs are degenerate.
    pub fn interaction_measure(&self) -> f64 {
        match (self.sfo1.is_occupied(), self.sfo2.is_occupied()) {
            (false, false) => 0.0,
            (true, true) => self.overlap.powi(2) * 100.0,
            _ => {
                let gap = self.energy_gap();
                if gap < ENERGY_GAP_THRESHOLD {
                    -self.overlap * 100.0
                } else {
                    self.overlap.powi(2) / gap * 100.0
                }
            }
        }
    }
}

// ------
// Result
// ------

/// A structure to contain SFO interaction analysis results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct SfoInteractionResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: SfoInteractionParams,

    /// The name of the analysed calculation.
    pub calc_name: String,

    /// The unit of the orbital energies.
    pub energy_unit: EnergyUnit,

    /// The fragment 1 SFOs that passed the occupation filter, in the requested order.
    pub frag1_sfos: Vec<SfoOrbital>,

    /// The fragment 2 SFOs that passed the occupation filter, in the requested order.
    pub frag2_sfos: Vec<SfoOrbital>,

    /// The analysed SFO pairs, in the order of the fragment 1 SFOs and then of the fragment 2
    /// SFOs.
    pub pairs: Vec<SfoPair>,
}

impl SfoInteractionResult {
    /// Returns a builder to construct a [`SfoInteractionResult`] structure.
    fn builder() -> SfoInteractionResultBuilder {
        SfoInteractionResultBuilder::default()
    }

    /// Returns the pair with the largest interaction measure, if any.
    pub fn strongest_pair(&self) -> Option<&SfoPair> {
        self.pairs.iter().max_by(|a, b| {
            a.interaction_measure()
                .total_cmp(&b.interaction_measure())
        })
    }

    /// Arranges `value` of each pair into a matrix with fragment 1 SFOs along the rows and
    /// fragment 2 SFOs along the columns.
    fn pair_matrix<F>(&self, value: F) -> Array2<f64>
    where
        F: Fn(&SfoPair) -> f64,
    {
        let n2 = self.frag2_sfos.len();
        Array2::from_shape_fn((self.frag1_sfos.len(), n2), |(i, j)| {
            self.pairs.get(i * n2 + j).map_or(0.0, &value)
        })
    }

    /// The absolute overlaps between the fragment 1 SFOs (rows) and the fragment 2 SFOs
    /// (columns).
    pub fn overlap_matrix(&self) -> Array2<f64> {
        self.pair_matrix(|pair| pair.overlap)
    }

    /// The interaction measures between the fragment 1 SFOs (rows) and the fragment 2 SFOs
    /// (columns).
    pub fn interaction_matrix(&self) -> Array2<f64> {
        self.pair_matrix(SfoPair::interaction_measure)
    }
}

fn sfo_heading(orbital: &SfoOrbital) -> String {
    format!("{} ({})", orbital.sfo, orbital.homo_lumo_label())
}

/// Writes `matrix` as a table with `rows` and `cols` as the row and column headings.
fn write_sfo_matrix(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    rows: &[SfoOrbital],
    cols: &[SfoOrbital],
    matrix: &Array2<f64>,
) -> fmt::Result {
    let row_headings = rows.iter().map(sfo_heading).collect::<Vec<_>>();
    let col_headings = cols.iter().map(sfo_heading).collect::<Vec<_>>();
    let row_width = row_headings
        .iter()
        .map(|heading| heading.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.chars().count());
    let col_width = col_headings
        .iter()
        .map(|heading| heading.chars().count())
        .max()
        .unwrap_or(0)
        .max(9);
    let table_width = row_width + (col_width + 1) * col_headings.len() + 1;

    writeln!(f, "{}", "┈".repeat(table_width))?;
    writeln!(
        f,
        " {title:<row_width$}{}",
        col_headings
            .iter()
            .map(|heading| format!(" {heading:>col_width$}"))
            .join("")
    )?;
    writeln!(f, "{}", "┈".repeat(table_width))?;
    for (heading, row) in row_headings.iter().zip(matrix.rows()) {
        writeln!(
            f,
            " {heading:<row_width$}{}",
            row.iter()
                .map(|value| format!(" {value:>col_width$.4}"))
                .join("")
        )?;
    }
    writeln!(f, "{}", "┈".repeat(table_width))?;
    Ok(())
}

impl fmt::Display for SfoInteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(
            f,
            &format!(
                "SFO interactions in {} ({})",
                self.calc_name, self.parameters.interaction
            ),
        )?;
        writeln!(f)?;
        if self.pairs.is_empty() {
            writeln!(f, "No SFO pairs to report.")?;
            return Ok(());
        }

        let unit = self.energy_unit.to_string();

        // Overview of the SFOs involved
        let sfos = self.frag1_sfos.iter().chain(self.frag2_sfos.iter());
        let label_width = sfos
            .clone()
            .map(|orbital| orbital.sfo.to_string().chars().count())
            .max()
            .unwrap_or(0)
            .max(6);
        let overview_width = label_width + 56;
        writeln!(f, "{}", "┈".repeat(overview_width))?;
        writeln!(
            f,
            " {:>4}  {:<label_width$} {:<9} {:>10} {:>6} {:>7}",
            "Frag",
            "SFO",
            "Frontier",
            format!("E ({unit})"),
            "Occ.",
            "Pop.",
        )?;
        writeln!(f, "{}", "┈".repeat(overview_width))?;
        for orbital in sfos {
            writeln!(
                f,
                " {:>4}  {:<label_width$} {:<9} {:>10.4} {:>6.3} {:>7.3}",
                orbital.frag_index,
                orbital.sfo.to_string(),
                orbital.homo_lumo_label(),
                orbital.energy,
                orbital.occupation,
                orbital.gross_population,
            )?;
        }
        writeln!(f, "{}", "┈".repeat(overview_width))?;
        writeln!(f)?;

        writeln!(f, "Absolute overlaps (fragment 1 rows, fragment 2 columns):")?;
        write_sfo_matrix(
            f,
            "|S|",
            &self.frag1_sfos,
            &self.frag2_sfos,
            &self.overlap_matrix(),
        )?;
        writeln!(f)?;

        writeln!(f, "Interaction measures (fragment 1 rows, fragment 2 columns):")?;
        write_sfo_matrix(
            f,
            "Measure",
            &self.frag1_sfos,
            &self.frag2_sfos,
            &self.interaction_matrix(),
        )?;
        writeln!(f)?;

        // Pair listing
        let table_width = 2 * label_width + 76;
        writeln!(f, "{}", "┈".repeat(table_width))?;
        writeln!(
            f,
            " {:<label_width$} {:>10} {:>6} {:>7}  {:<label_width$} {:>10} {:>6} {:>7} {:>8} {:>9}",
            "SFO 1",
            format!("E ({unit})"),
            "Occ.",
            "Pop.",
            "SFO 2",
            format!("E ({unit})"),
            "Occ.",
            "Pop.",
            "|S|",
            "Measure",
        )?;
        writeln!(f, "{}", "┈".repeat(table_width))?;
        for pair in self.pairs.iter() {
            writeln!(
                f,
                " {:<label_width$} {:>10.4} {:>6.3} {:>7.3}  {:<label_width$} {:>10.4} {:>6.3} {:>7.3} {:>8.4} {:>9.4}{}",
                pair.sfo1.sfo.to_string(),
                pair.sfo1.energy,
                pair.sfo1.occupation,
                pair.sfo1.gross_population,
                pair.sfo2.sfo.to_string(),
                pair.sfo2.energy,
                pair.sfo2.occupation,
                pair.sfo2.gross_population,
                pair.overlap,
                pair.interaction_measure(),
                if pair.is_pauli_pair() { " (Pauli)" } else { "" },
            )?;
        }
        writeln!(f, "{}", "┈".repeat(table_width))?;
        writeln!(f)?;
        writeln!(
            f,
            "Measure: 100·S² for occupied-occupied pairs, 100·S²/|ΔE| for occupied-virtual pairs,"
        )?;
        writeln!(f, "zero for virtual-virtual pairs.")?;
        writeln!(f, "Pauli pairs consist of two fully occupied SFOs.")?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for SFO interaction analysis.
#[derive(Clone, Builder)]
pub struct SfoInteractionDriver<'a> {
    /// The control parameters for SFO interaction analysis.
    parameters: &'a SfoInteractionParams,

    /// The analyzer of the complex calculation.
    analyzer: &'a CalcAnalyzer,

    /// The result of the SFO interaction analysis.
    #[builder(setter(skip), default = "None")]
    result: Option<SfoInteractionResult>,
}

impl<'a> SfoInteractionDriver<'a> {
    /// Returns a builder to construct a [`SfoInteractionDriver`] structure.
    pub fn builder() -> SfoInteractionDriverBuilder<'a> {
        SfoInteractionDriverBuilder::default()
    }

    /// Gathers the requested SFOs of fragment `frag_index` that pass the occupation filter.
    fn gather_sfos(
        &self,
        frag_index: usize,
        labels: &[String],
        occupied: Option<bool>,
    ) -> Result<Vec<SfoOrbital>, anyhow::Error> {
        let orbitals = labels
            .iter()
            .map(|label| SfoOrbital::from_analyzer(self.analyzer, frag_index, label.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orbitals
            .into_iter()
            .filter(|orbital| occupied.map_or(true, |occ| orbital.is_occupied() == occ))
            .collect())
    }

    /// Executes SFO interaction analysis.
    fn analyse_sfo_interactions(&mut self) -> Result<(), anyhow::Error> {
        log_title("SFO Interaction Analysis");
        fragorb_output!("");
        let params = self.parameters;
        params.log_output_display();

        log_subtitle("Calculation");
        fragorb_output!("");
        self.analyzer.log_output_display();
        fragorb_output!("");

        let (occ1, occ2) = params.interaction.occupation_filter();
        let sfos1 = self.gather_sfos(1, &params.frag1_sfos, occ1)?;
        let sfos2 = self.gather_sfos(2, &params.frag2_sfos, occ2)?;
        if sfos1.is_empty() || sfos2.is_empty() {
            fragorb_warn!(
                "No {} SFO pairs can be formed from the requested SFOs.",
                params.interaction
            );
        }

        log_macsec_begin("SFO pairs");
        fragorb_output!("");
        let pairs = sfos1
            .iter()
            .cartesian_product(sfos2.iter())
            .map(|(sfo1, sfo2)| {
                let overlap = self.analyzer.get_sfo_overlap(&sfo1.sfo, &sfo2.sfo)?;
                log::debug!("Overlap between {} and {}: {overlap:.6}", sfo1.sfo, sfo2.sfo);
                Ok(SfoPair {
                    sfo1: sfo1.clone(),
                    sfo2: sfo2.clone(),
                    overlap,
                })
            })
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        self.result = SfoInteractionResult::builder()
            .parameters(params.clone())
            .calc_name(self.analyzer.name().to_string())
            .energy_unit(self.analyzer.reading_params().orbital_energy_unit)
            .frag1_sfos(sfos1)
            .frag2_sfos(sfos2)
            .pairs(pairs)
            .build()
            .ok();

        if let Some(int_res) = self.result.as_ref() {
            int_res.log_output_display();
            fragorb_output!("");
            if let Some(pair) = int_res.strongest_pair() {
                fragorb_output!(
                    "Strongest interaction: {} (fragment 1) and {} (fragment 2), measure {:.4}.",
                    pair.sfo1.sfo,
                    pair.sfo2.sfo,
                    pair.interaction_measure()
                );
                fragorb_output!("");
            }
        }
        log_macsec_end("SFO pairs");
        fragorb_output!("");

        // Save SFO interaction result, if requested
        if let Some(int_res) = self.result.as_ref() {
            if let Some(name) = params.result_save_name.as_ref() {
                write_fragorb_binary(name, FragOrbFileType::Int, int_res)?;
                fragorb_output!(
                    "SFO interaction results saved as {name}.{}.",
                    FragOrbFileType::Int.ext()
                );
                fragorb_output!("");
            }
        }

        Ok(())
    }
}

impl FragOrbDriver for SfoInteractionDriver<'_> {
    type Params = SfoInteractionParams;

    type Outcome = SfoInteractionResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No SFO interaction results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.analyse_sfo_interactions()
    }
}
