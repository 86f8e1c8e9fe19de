//! Nice `fragorb` output formatting.

use std::fmt;

use log;

const FRAGORB_BANNER_LENGTH: usize = 103;

/// Logs an error to the `fragorb-output` logger.
macro_rules! fragorb_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "fragorb-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a warning to the `fragorb-output` logger.
macro_rules! fragorb_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "fragorb-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `fragorb-output` logger.
macro_rules! fragorb_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "fragorb-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {fragorb_error, fragorb_output, fragorb_warn};

/// Logs a nicely formatted section title to the `fragorb-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(FRAGORB_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    fragorb_output!("┌──{bar}──┐");
    fragorb_output!("│§ {title:^length$} §│");
    fragorb_output!("└──{bar}──┘");
}

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Logs a nicely formatted subtitle to the `fragorb-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    fragorb_output!("{}", subtitle);
    fragorb_output!("{}", bar);
}

/// Logs a nicely formatted macro-section beginning to the `fragorb-output` logger.
pub(crate) fn log_macsec_begin(sectitle: &str) {
    let width = FRAGORB_BANNER_LENGTH - 14;
    let sectitle_space = sectitle.to_string() + " ";
    fragorb_output!("❬❬❬❬❬ [Begin] {sectitle_space:❬<width$}");
}

/// Logs a nicely formatted macro-section ending to the `fragorb-output` logger.
pub(crate) fn log_macsec_end(sectitle: &str) {
    let width = FRAGORB_BANNER_LENGTH - 14;
    let sectitle_space = sectitle.to_string() + " ";
    fragorb_output!("❭❭❭❭❭ [ End ] {sectitle_space:❭<width$}");
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `fragorb` outputs nicely.
pub(crate) trait FragOrbOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            fragorb_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> FragOrbOutput for T where T: fmt::Debug + fmt::Display {}
