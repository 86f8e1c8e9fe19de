use approx::assert_relative_eq;
use indexmap::IndexMap;
use ndarray::array;
use proptest::prelude::*;

use crate::fragment::{
    create_fragment, create_fragment_data, create_fragments, packed_position, Fragment,
    FragmentData, FragmentError,
};
use crate::kf::fixtures::{
    c3v_largecore_kf, c3v_largecore_unrestricted_kf, nosym_smallcore_kf, packed_overlap_value,
};
use crate::kf::handle::ResultHandle;
use crate::kf::{KfError, KfVariable};
use crate::sfo::sfo_functions::{EnergyUnit, SfoReadingParams, HARTREE_TO_EV};

fn fragment_error(err: &anyhow::Error) -> &FragmentError {
    err.downcast_ref::<FragmentError>()
        .expect("Expected a fragment error.")
}

#[test]
fn test_fragment_data_c3v_largecore() {
    let kf = ResultHandle::new(c3v_largecore_kf());
    let params = SfoReadingParams::default();

    let frag1 = create_fragment_data(&kf, 1, true, &params).unwrap();
    assert_eq!(frag1.name, "AsH3");
    assert_eq!(frag1.frag_index, 1);
    assert_eq!(
        frag1.orb_energies.keys().collect::<Vec<_>>(),
        vec!["A1", "E1:1"]
    );
    assert_eq!(frag1.orb_energies["A1"], array![-0.9, -0.5, 0.1]);
    assert_eq!(frag1.orb_energies["E1:1"], array![-0.6, 0.3]);
    assert_eq!(frag1.occupations["A1"], array![2.0, 2.0, 0.0]);
    assert_eq!(frag1.gross_populations["A1"], array![1.9, 1.8, 0.1]);
    assert_eq!(frag1.gross_populations["E1:1"], array![1.95, 0.02]);
    assert_eq!(frag1.n_frozen_cores_per_irrep["A1"], 2);
    assert_eq!(frag1.n_frozen_cores_per_irrep["E1:1"], 1);
    assert!(!frag1.n_frozen_cores_per_irrep.contains_key("A"));

    let frag2 = create_fragment_data(&kf, 2, true, &params).unwrap();
    assert_eq!(frag2.name, "GaCl3");
    assert_eq!(frag2.orb_energies["A1"], array![-0.7, 0.2]);
    assert_eq!(frag2.orb_energies["E1:1"], array![-0.8, -0.4, 0.5]);
    assert_eq!(frag2.occupations["E1:1"], array![2.0, 2.0, 0.0]);
    assert_eq!(frag2.gross_populations["A1"], array![1.7, 0.05]);
    assert_eq!(frag2.gross_populations["E1:1"], array![1.6, 1.5, 0.03]);
}

#[test]
fn test_fragment_data_nosym_smallcore() {
    let kf = ResultHandle::new(nosym_smallcore_kf());
    let params = SfoReadingParams::default();

    let frag1 = create_fragment_data(&kf, 1, true, &params).unwrap();
    assert_eq!(frag1.name, "NH3");
    assert_eq!(frag1.orb_energies["A"], array![-0.8, -0.4, -0.3, 0.1]);
    assert_eq!(frag1.gross_populations["A"], array![1.99, 1.98, 1.97, 0.01]);
    assert_eq!(frag1.n_frozen_cores_per_irrep["A"], 1);

    let frag2 = create_fragment_data(&kf, 2, true, &params).unwrap();
    assert_eq!(frag2.name, "BH3");
    assert_eq!(frag2.occupations["A"], array![2.0, 0.0, 0.0]);
    assert_eq!(frag2.gross_populations["A"], array![1.96, 0.02, 0.03]);
}

#[test]
fn test_fragment_data_energy_unit() {
    let kf = ResultHandle::new(c3v_largecore_kf());
    let params = SfoReadingParams::builder()
        .orbital_energy_unit(EnergyUnit::ElectronVolt)
        .build()
        .unwrap();
    let frag1 = create_fragment_data(&kf, 1, true, &params).unwrap();
    assert_relative_eq!(frag1.orb_energies["A1"][0], -0.9 * HARTREE_TO_EV);
}

#[test]
fn test_fragment_data_unknown_fragment() {
    let kf = ResultHandle::new(c3v_largecore_kf());
    let err = create_fragment_data(&kf, 3, true, &SfoReadingParams::default()).unwrap_err();
    assert_eq!(fragment_error(&err), &FragmentError::UnknownFragment(3));
    assert!(create_fragments(0, &kf, true, &SfoReadingParams::default()).is_err());
}

#[test]
fn test_restricted_fragment_lookups() {
    let kf = ResultHandle::new(c3v_largecore_kf());
    let frag2 = create_fragment(2, &kf, true).unwrap();
    assert_eq!(frag2.name(), "GaCl3");
    assert_eq!(frag2.frag_index(), 2);
    assert_relative_eq!(frag2.get_orbital_energy("E1:1", 2).unwrap(), -0.4);
    assert_relative_eq!(frag2.get_occupation("A1", 1).unwrap(), 2.0);
    assert_relative_eq!(frag2.get_gross_population("E1:1", 3).unwrap(), 0.03);

    let err = frag2.get_orbital_energy("E1:1", 4).unwrap_err();
    assert_eq!(
        fragment_error(&err),
        &FragmentError::IndexOutOfRange {
            frag_index: 2,
            irrep: "E1:1".to_string(),
            index: 4,
            len: 3
        }
    );
    let err = frag2.get_occupation("A1", 0).unwrap_err();
    assert!(matches!(
        fragment_error(&err),
        FragmentError::IndexOutOfRange { index: 0, .. }
    ));
    let err = frag2.get_gross_population("A2", 1).unwrap_err();
    assert_eq!(
        fragment_error(&err),
        &FragmentError::UnknownIrrep {
            frag_index: 2,
            irrep: "A2".to_string()
        }
    );
}

#[test]
fn test_restricted_fragment_homo_lumo_index() {
    let kf = ResultHandle::new(c3v_largecore_kf());
    let frags = create_fragments(2, &kf, true, &SfoReadingParams::default()).unwrap();

    // Fragment 1: occupied A1 -0.9, -0.5 and E1:1 -0.6; virtual A1 0.1 and E1:1 0.3.
    let frag1 = frags[0].as_ref();
    assert_eq!(frag1.get_homo_lumo_index("A1", 2).unwrap(), 0);
    assert_eq!(frag1.get_homo_lumo_index("E1:1", 1).unwrap(), 1);
    assert_eq!(frag1.get_homo_lumo_index("A1", 1).unwrap(), 2);
    assert_eq!(frag1.get_homo_lumo_index("A1", 3).unwrap(), 0);
    assert_eq!(frag1.get_homo_lumo_index("E1:1", 2).unwrap(), 1);

    // Fragment 2: occupied A1 -0.7 and E1:1 -0.8, -0.4; virtual A1 0.2 and E1:1 0.5.
    let frag2 = frags[1].as_ref();
    assert_eq!(frag2.get_homo_lumo_index("E1:1", 2).unwrap(), 0);
    assert_eq!(frag2.get_homo_lumo_index("A1", 1).unwrap(), 1);
    assert_eq!(frag2.get_homo_lumo_index("E1:1", 1).unwrap(), 2);
    assert_eq!(frag2.get_homo_lumo_index("A1", 2).unwrap(), 0);
    assert_eq!(frag2.get_homo_lumo_index("E1:1", 3).unwrap(), 1);

    let err = frag2.get_homo_lumo_index("E1:1", 4).unwrap_err();
    assert!(matches!(
        fragment_error(&err),
        FragmentError::IndexOutOfRange { index: 4, len: 3, .. }
    ));
}

#[test]
fn test_fragment_data_homo_lumo_index_degenerate() {
    let irrep_data = |values: [(&str, Vec<f64>); 3]| {
        values
            .into_iter()
            .map(|(irrep, v)| (irrep.to_string(), ndarray::Array1::from_vec(v)))
            .collect::<IndexMap<_, _>>()
    };
    let data = FragmentData {
        name: "M".to_string(),
        frag_index: 1,
        orb_energies: irrep_data([
            ("A1", vec![-0.9]),
            ("E1:1", vec![-0.5, 0.2]),
            ("E1:2", vec![-0.5, 0.2]),
        ]),
        occupations: irrep_data([
            ("A1", vec![2.0]),
            ("E1:1", vec![2.0, 0.0]),
            ("E1:2", vec![2.0, 0.0]),
        ]),
        gross_populations: irrep_data([
            ("A1", vec![2.0]),
            ("E1:1", vec![2.0, 0.0]),
            ("E1:2", vec![2.0, 0.0]),
        ]),
        n_frozen_cores_per_irrep: IndexMap::new(),
    };
    assert_eq!(data.homo_lumo_index("E1:1", 1).unwrap(), 0);
    assert_eq!(data.homo_lumo_index("E1:2", 1).unwrap(), 1);
    assert_eq!(data.homo_lumo_index("A1", 1).unwrap(), 2);
    assert_eq!(data.homo_lumo_index("E1:1", 2).unwrap(), 0);
    assert_eq!(data.homo_lumo_index("E1:2", 2).unwrap(), 1);
    assert_eq!(
        data.homo_lumo_index("A2", 1).unwrap_err(),
        FragmentError::UnknownIrrep {
            frag_index: 1,
            irrep: "A2".to_string()
        }
    );
}

#[test]
fn test_restricted_fragment_overlap_c3v_largecore() {
    let kf = ResultHandle::new(c3v_largecore_kf());
    let frags = create_fragments(2, &kf, true, &SfoReadingParams::default()).unwrap();

    // Frag 1 A1 #1 is global 3, frag 2 A1 #2 is global 7: packed position 7*6/2 + 3 = 24.
    let s = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "A1", 1, "A1", 2)
        .unwrap();
    assert_relative_eq!(s, 0.24);

    // Stored as negative.
    let s = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "A1", 2, "A1", 1)
        .unwrap();
    assert_relative_eq!(s, 0.19);

    // Frag 1 E1:1 #2 is global 3, frag 2 E1:1 #3 is global 6.
    let s = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "E1:1", 2, "E1:1", 3)
        .unwrap();
    assert_relative_eq!(s, 0.18);

    let err = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "A1", 4, "A1", 1)
        .unwrap_err();
    assert!(matches!(
        fragment_error(&err),
        FragmentError::IndexOutOfRange { frag_index: 1, index: 4, len: 3, .. }
    ));
}

#[test]
fn test_restricted_fragment_overlap_nosym_smallcore() {
    let kf = ResultHandle::new(nosym_smallcore_kf());
    let frags = create_fragments(2, &kf, true, &SfoReadingParams::default()).unwrap();

    // Frag 1 maps to globals 2..=5 and frag 2 to 6..=8.
    let s = frags[0]
        .get_overlap(&kf, false, frags[1].as_ref(), "A", 1, "A", 1)
        .unwrap();
    assert_relative_eq!(s, 0.17);
    let s = frags[0]
        .get_overlap(&kf, false, frags[1].as_ref(), "A", 4, "A", 3)
        .unwrap();
    assert_relative_eq!(s, 0.33);

    // Irreps are ignored without symmetry.
    let s = frags[0]
        .get_overlap(&kf, false, frags[1].as_ref(), "B2", 4, "E1:1", 3)
        .unwrap();
    assert_relative_eq!(s, 0.33);

    // With only one irrep present, the symmetry-aware path agrees.
    let s_sym = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "A", 4, "A", 3)
        .unwrap();
    assert_relative_eq!(s_sym, 0.33);
}

#[test]
fn test_restricted_fragment_overlap_out_of_matrix() {
    let kf = ResultHandle::new(
        c3v_largecore_kf().with("A1", "S-CoreSFO", KfVariable::FloatArray(vec![0.1; 10])),
    );
    let frags = create_fragments(2, &kf, true, &SfoReadingParams::default()).unwrap();
    let err = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "A1", 1, "A1", 2)
        .unwrap_err();
    assert_eq!(
        fragment_error(&err),
        &FragmentError::OverlapOutOfRange {
            irrep: "A1".to_string(),
            position: 24,
            len: 10
        }
    );
}

#[test]
fn test_restricted_fragment_overlap_frozen_cores_of_both_fragments() {
    // The last SFO of fragment 2 moves to irrep A2, which fragment 1 does not have.
    let kf = ResultHandle::new(
        c3v_largecore_kf()
            .with("Symmetry", "ncbs", KfVariable::IntArray(vec![2, 1, 1]))
            .with(
                "SFOs",
                "subspecies",
                KfVariable::Str("A1 A1 A1 A1 A1 E1:1 E1:1 E1:1 E1:1 A2".to_string()),
            )
            .with(
                "SFOs",
                "isfo",
                KfVariable::IntArray(vec![1, 2, 3, 4, 5, 1, 2, 3, 4, 1]),
            )
            .with(
                "SFO popul",
                "sfo_grosspop",
                KfVariable::FloatArray(vec![
                    2.0, 2.0, 1.9, 1.8, 0.1, 1.7, 0.05, // A1
                    2.0, 1.95, 0.02, 1.6, 1.5, // E1:1
                    2.0, 0.03, // A2
                ]),
            )
            .with(
                "A2",
                "S-CoreSFO",
                KfVariable::FloatArray((1..=6).map(packed_overlap_value).collect()),
            ),
    );
    let frags = create_fragments(2, &kf, true, &SfoReadingParams::default()).unwrap();
    assert!(!frags[0].fragment_data().n_frozen_cores_per_irrep.contains_key("A2"));
    assert_eq!(frags[1].fragment_data().n_frozen_cores_per_irrep["A2"], 1);
    assert_relative_eq!(frags[1].get_gross_population("A2", 1).unwrap(), 0.03);

    // 1_A1 of fragment 1 is global 3 and 1_A2 of fragment 2 is global 2 after its frozen core,
    // giving packed position 5 from either side.
    let forward = frags[0]
        .get_overlap(&kf, true, frags[1].as_ref(), "A1", 1, "A2", 1)
        .unwrap();
    let backward = frags[1]
        .get_overlap(&kf, true, frags[0].as_ref(), "A2", 1, "A1", 1)
        .unwrap();
    assert_relative_eq!(forward, 0.05);
    assert_relative_eq!(backward, 0.05);
}

#[test]
fn test_packed_position() {
    assert_eq!(packed_position(1, 1), Some(1));
    assert_eq!(packed_position(2, 3), Some(5));
    assert_eq!(packed_position(3, 2), Some(5));
    assert_eq!(packed_position(3, 7), Some(24));
    assert_eq!(packed_position(0, 3), None);
    assert_eq!(packed_position(usize::MAX, 2), None);
}

#[test]
fn test_restricted_fragment_overlap_invalid_isfo() {
    let zero = ResultHandle::new(nosym_smallcore_kf().with(
        "SFOs",
        "isfo",
        KfVariable::IntArray(vec![0, 1, 2, 3, 4, 5, 6]),
    ));
    let frags = create_fragments(2, &zero, true, &SfoReadingParams::default()).unwrap();
    // Rejected with and without a frozen-core shift.
    let zero_nocore = ResultHandle::new(
        nosym_smallcore_kf()
            .with("SFOs", "isfo", KfVariable::IntArray(vec![0, 1, 2, 3, 4, 5, 6]))
            .with("Symmetry", "ncbs", KfVariable::IntArray(vec![0])),
    );
    let frags_nocore =
        create_fragments(2, &zero_nocore, true, &SfoReadingParams::default()).unwrap();
    for (kf, frags) in [(&zero, &frags), (&zero_nocore, &frags_nocore)] {
        let err = frags[0]
            .get_overlap(kf, false, frags[1].as_ref(), "A", 1, "A", 1)
            .unwrap_err();
        assert!(err.downcast_ref::<KfError>().is_some());
    }

    let huge = ResultHandle::new(nosym_smallcore_kf().with(
        "SFOs",
        "isfo",
        KfVariable::IntArray(vec![1, 2, 3, 4, 5, 6, i64::MAX]),
    ));
    let frags = create_fragments(2, &huge, true, &SfoReadingParams::default()).unwrap();
    let err = frags[0]
        .get_overlap(&huge, false, frags[1].as_ref(), "A", 1, "A", 3)
        .unwrap_err();
    assert_eq!(
        fragment_error(&err),
        &FragmentError::OverlapOutOfRange {
            irrep: "A".to_string(),
            position: usize::MAX,
            len: 36
        }
    );
}

#[test]
fn test_unrestricted_fragment_unsupported() {
    let kf = ResultHandle::new(c3v_largecore_unrestricted_kf());
    let frag1 = create_fragment(1, &kf, false).unwrap();
    let frag2 = create_fragment(2, &kf, false).unwrap();
    assert_eq!(frag1.name(), "AsH3");

    let errs = [
        frag1
            .get_overlap(&kf, true, frag2.as_ref(), "A1", 1, "A1", 1)
            .unwrap_err(),
        frag1.get_orbital_energy("A1", 1).unwrap_err(),
        frag1.get_gross_population("A1", 1).unwrap_err(),
        frag1.get_occupation("A1", 1).unwrap_err(),
        frag1.get_homo_lumo_index("A1", 1).unwrap_err(),
    ];
    for err in errs.iter() {
        assert_eq!(fragment_error(err), &FragmentError::Unsupported);
        assert_eq!(
            err.to_string(),
            "Unrestricted fragments are currently not supported."
        );
    }
}

proptest! {
    #[test]
    fn test_restricted_fragment_overlap_symmetric(
        i in 1usize..=3,
        j in 1usize..=2,
        k in 1usize..=2,
        l in 1usize..=3,
    ) {
        let kf = ResultHandle::new(c3v_largecore_kf());
        let frags = create_fragments(2, &kf, true, &SfoReadingParams::default()).unwrap();
        let (frag1, frag2) = (frags[0].as_ref(), frags[1].as_ref());

        let s12 = frag1.get_overlap(&kf, true, frag2, "A1", i, "A1", j).unwrap();
        let s21 = frag2.get_overlap(&kf, true, frag1, "A1", j, "A1", i).unwrap();
        prop_assert_eq!(s12, s21);
        prop_assert!(s12 >= 0.0);

        let t12 = frag1.get_overlap(&kf, true, frag2, "E1:1", k, "E1:1", l).unwrap();
        let t21 = frag2.get_overlap(&kf, true, frag1, "E1:1", l, "E1:1", k).unwrap();
        prop_assert_eq!(t12, t21);
    }
}
