use super::{Sfo, SfoSpecifier, SpinKind};

#[test]
fn test_sfo_from_label_restricted() {
    let sfo = Sfo::from_label("14_AA").unwrap();
    assert_eq!(sfo.index, 14);
    assert_eq!(sfo.irrep, "AA");
    assert_eq!(sfo.spin, SpinKind::A);
    assert_eq!(sfo.to_string(), "14_AA");
    assert_eq!(sfo.viewer_label(), "SFO_AA_14");
}

#[test]
fn test_sfo_from_label_unrestricted() {
    let sfo: Sfo = "3_E1:1_B".parse().unwrap();
    assert_eq!(sfo, Sfo::new(3, "E1:1", SpinKind::B));
    assert_eq!(sfo.to_string(), "3_E1:1_B");
    assert_eq!(sfo.viewer_label(), "SFO_E1:1_3_B");

    // An explicit alpha spin is the default spin.
    assert_eq!(Sfo::from_label("5_A1_A").unwrap(), Sfo::from_label("5_A1").unwrap());
}

#[test]
fn test_sfo_from_label_invalid() {
    assert!(Sfo::from_label("A1_5").is_err());
    assert!(Sfo::from_label("5").is_err());
    assert!(Sfo::from_label("0_A1").is_err());
    assert!(Sfo::from_label("5_A1_C").is_err());
    assert!(Sfo::from_label("5_A1_A_B").is_err());
    assert!(Sfo::from_label("").is_err());
}

#[test]
fn test_sfo_specifier() {
    let sfo = Sfo::new(2, "A1", SpinKind::A);
    assert_eq!(sfo.to_sfo().unwrap(), sfo);
    assert_eq!("2_A1".to_sfo().unwrap(), sfo);
    assert_eq!("2_A1".to_string().to_sfo().unwrap(), sfo);
    assert!("A1".to_sfo().is_err());
}
