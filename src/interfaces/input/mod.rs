//! YAML input of `fragorb`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{self, Context};
use serde::{Deserialize, Serialize};

use crate::analyzer::CalcAnalyzer;
use crate::drivers::sfo_interaction::{SfoInteractionDriver, SfoInteractionParams};
use crate::drivers::FragOrbDriver;
use crate::interfaces::InputHandle;
use crate::io::format::{fragorb_output, log_title, write_subtitle, FragOrbOutput};
use crate::io::read_fragorb_yaml;
use crate::sfo::sfo_functions::SfoReadingParams;


fn default_n_fragments() -> usize {
    2
}

/// A structure containing `fragorb` input parameters which can be serialised into and
/// deserialised from a YAML input file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Input {
    /// The KF result store of the complex calculation, as a `.yml`/`.yaml` file or a
    /// `.fragorb.kf` binary file. Relative paths are resolved against the directory of the input
    /// file.
    pub kf: PathBuf,

    /// The number of fragments in the complex calculation.
    ///
    /// # Default
    ///
    /// If not specified, this will be taken to be `2`.
    #[serde(default = "default_n_fragments")]
    pub n_fragments: usize,

    /// Parameters for reading SFO data.
    #[serde(default)]
    pub sfo_reading: SfoReadingParams,

    /// Specification for SFO interaction analysis. If `None`, only a summary of the fragments will
    /// be given.
    #[serde(default)]
    pub sfo_interaction: Option<SfoInteractionParams>,
}

impl Input {
    /// Reads an input specification from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let mut input: Input = read_fragorb_yaml(path)
            .with_context(|| format!("Unable to read the input file `{}`", path.display()))?;
        if input.kf.is_relative() {
            if let Some(dir) = path.parent() {
                input.kf = dir.join(&input.kf);
            }
        }
        Ok(input)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, "Input")?;
        writeln!(f)?;
        writeln!(f, "KF result store: {}", self.kf.display())?;
        writeln!(f, "Number of fragments: {}", self.n_fragments)?;
        write!(f, "{}", self.sfo_reading)?;
        if let Some(params) = self.sfo_interaction.as_ref() {
            writeln!(f)?;
            write!(f, "{params}")?;
        }
        Ok(())
    }
}

impl InputHandle for Input {
    /// Handles the `fragorb` YAML input specification.
    fn handle(&self) -> Result<(), anyhow::Error> {
        self.log_output_display();
        fragorb_output!("");

        let analyzer = CalcAnalyzer::from_path(&self.kf, self.n_fragments, &self.sfo_reading)?;
        match self.sfo_interaction.as_ref() {
            Some(params) => {
                let mut driver = SfoInteractionDriver::builder()
                    .parameters(params)
                    .analyzer(&analyzer)
                    .build()?;
                driver.run()?;
            }
            None => {
                log_title("Fragment Summary");
                fragorb_output!("");
                analyzer.log_output_display();
                fragorb_output!("");
            }
        }
        Ok(())
    }
}
