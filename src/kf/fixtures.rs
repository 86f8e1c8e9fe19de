//! Small KF stores mimicking fragment analysis calculations, shared by unit tests.

use super::{KfFile, KfVariable};

/// The value stored at 1-based packed position `p` of the test overlap matrices. The sign
/// alternates so that absolute values are exercised.
pub(crate) fn packed_overlap_value(p: usize) -> f64 {
    let magnitude = p as f64 / 100.0;
    if p % 2 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

fn packed_overlap_matrix(dim: usize) -> KfVariable {
    KfVariable::FloatArray((1..=dim * (dim + 1) / 2).map(packed_overlap_value).collect())
}

/// A restricted, relativistic, C(3V) calculation with large frozen cores and two fragments.
///
/// | irrep | frozen | fragment 1 (`isfo`) | fragment 2 (`isfo`) |
/// |-------|--------|---------------------|---------------------|
/// | A1    | 2      | 1, 2, 3             | 4, 5                |
/// | E1:1  | 1      | 1, 2                | 3, 4, 5             |
pub(crate) fn c3v_largecore_kf() -> KfFile {
    KfFile::new()
        .with("General", "title", KfVariable::Str("AsH3-GaCl3".to_string()))
        .with("General", "nspin", KfVariable::Int(1))
        .with("General", "ioprel", KfVariable::Int(1))
        .with("Symmetry", "grouplabel", KfVariable::Str("C(3V)".to_string()))
        .with("Symmetry", "ncbs", KfVariable::IntArray(vec![2, 1]))
        .with("SFOs", "number", KfVariable::Int(10))
        .with(
            "SFOs",
            "fragment",
            KfVariable::IntArray(vec![1, 1, 1, 2, 2, 1, 1, 2, 2, 2]),
        )
        .with(
            "SFOs",
            "subspecies",
            KfVariable::Str("A1 A1 A1 A1 A1 E1:1 E1:1 E1:1 E1:1 E1:1".to_string()),
        )
        .with(
            "SFOs",
            "isfo",
            KfVariable::IntArray(vec![1, 2, 3, 4, 5, 1, 2, 3, 4, 5]),
        )
        .with(
            "SFOs",
            "fragtype",
            KfVariable::Str(
                "AsH3 AsH3 AsH3 GaCl3 GaCl3 AsH3 AsH3 GaCl3 GaCl3 GaCl3".to_string(),
            ),
        )
        .with(
            "SFOs",
            "escale",
            KfVariable::FloatArray(vec![
                -0.9, -0.5, 0.1, -0.7, 0.2, -0.6, 0.3, -0.8, -0.4, 0.5,
            ]),
        )
        .with(
            "SFOs",
            "energy",
            KfVariable::FloatArray(vec![
                -0.95, -0.55, 0.15, -0.75, 0.25, -0.65, 0.35, -0.85, -0.45, 0.55,
            ]),
        )
        .with(
            "SFOs",
            "occupation",
            KfVariable::FloatArray(vec![2.0, 2.0, 0.0, 2.0, 0.0, 2.0, 0.0, 2.0, 2.0, 0.0]),
        )
        .with(
            "SFO popul",
            "sfo_grosspop",
            KfVariable::FloatArray(vec![
                2.0, 2.0, 1.9, 1.8, 0.1, 1.7, 0.05, // A1
                2.0, 1.95, 0.02, 1.6, 1.5, 0.03, // E1:1
            ]),
        )
        .with("A1", "S-CoreSFO", packed_overlap_matrix(7))
        .with("E1:1", "S-CoreSFO", packed_overlap_matrix(6))
}

/// A restricted, non-relativistic calculation without symmetry, with one frozen core and two
/// fragments. Fragment 1 has active SFOs 1 to 4, fragment 2 has active SFOs 5 to 7.
pub(crate) fn nosym_smallcore_kf() -> KfFile {
    KfFile::new()
        .with("General", "title", KfVariable::Str("NH3-BH3".to_string()))
        .with("General", "nspin", KfVariable::Int(1))
        .with("General", "ioprel", KfVariable::Int(0))
        .with("Symmetry", "grouplabel", KfVariable::Str("NOSYM".to_string()))
        .with("Symmetry", "ncbs", KfVariable::IntArray(vec![1]))
        .with("SFOs", "number", KfVariable::Int(7))
        .with(
            "SFOs",
            "fragment",
            KfVariable::IntArray(vec![1, 1, 1, 1, 2, 2, 2]),
        )
        .with("SFOs", "subspecies", KfVariable::Str("A A A A A A A".to_string()))
        .with("SFOs", "isfo", KfVariable::IntArray(vec![1, 2, 3, 4, 5, 6, 7]))
        .with(
            "SFOs",
            "fragtype",
            KfVariable::Str("NH3 NH3 NH3 NH3 BH3 BH3 BH3".to_string()),
        )
        .with(
            "SFOs",
            "energy",
            KfVariable::FloatArray(vec![-0.8, -0.4, -0.3, 0.1, -0.6, 0.05, 0.2]),
        )
        .with(
            "SFOs",
            "occupation",
            KfVariable::FloatArray(vec![2.0, 2.0, 2.0, 0.0, 2.0, 0.0, 0.0]),
        )
        .with(
            "SFO popul",
            "sfo_grosspop",
            KfVariable::FloatArray(vec![2.0, 1.99, 1.98, 1.97, 0.01, 1.96, 0.02, 0.03]),
        )
        .with("A", "S-CoreSFO", packed_overlap_matrix(8))
}

/// A variant of [`nosym_smallcore_kf`] where the fragments carry their own irreps although the
/// complex calculation does not use symmetry.
pub(crate) fn nosym_fragsym_kf() -> KfFile {
    nosym_smallcore_kf().with(
        "SFOs",
        "subspecies",
        KfVariable::Str("A1 A1 E1:1 A1 A1 E1:1 A1".to_string()),
    )
}

/// An unrestricted variant of [`c3v_largecore_kf`].
pub(crate) fn c3v_largecore_unrestricted_kf() -> KfFile {
    c3v_largecore_kf().with("General", "nspin", KfVariable::Int(2))
}
