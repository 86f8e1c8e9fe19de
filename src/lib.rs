//! # fragorb: Symmetrized Fragment Orbital Analysis
//!
//! `fragorb` is a program for the analysis of symmetrized fragment orbitals (SFOs) in fragment
//! analysis calculations written in Rust. It reads the KF result store of a complex calculation
//! and gives access to
//! - the orbital energies, occupations, and gross populations of the SFOs of each fragment, and
//! - the overlaps between SFOs of two fragments, taking frozen cores into account
//!
//! both with and without point-group symmetry.
//!
//! SFOs are referred to by labels of the form `<index>_<irrep>` or `<index>_<irrep>_<spin>`,
//! *e.g.* `14_AA` or `3_E1:1_B`, where `<index>` is 1-based within the irrep of the fragment.
//!
//! ## Getting started
//!
//! To use `fragorb` in your Rust project, simply add this crate to your project's `Cargo.toml`.
//! The entry point for most purposes is [`analyzer::CalcAnalyzer`], which builds one
//! [`fragment::Fragment`] facade per fragment from a [`kf::handle::ResultHandle`]. Pairwise SFO
//! interactions can be tabulated by the [`drivers::sfo_interaction::SfoInteractionDriver`].
//!
//! The `fragorb` binary reads a YAML input file (see [`interfaces::input::Input`]) and writes its
//! main output to a file via the `fragorb-output` logger.
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions. For more explanation, please consult this documentation.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod analyzer;
pub mod drivers;
pub mod fragment;
pub mod interfaces;
pub mod io;
pub mod kf;
pub mod sfo;
