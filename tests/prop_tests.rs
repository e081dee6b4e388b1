use notafiscal::core::{IdentitySet, digits, mask_identity};
use notafiscal::extract::parse_fields;
use proptest::prelude::*;

proptest! {
    #[test]
    fn digits_yields_only_ascii_digits(s in ".*") {
        let d = digits(&s);
        prop_assert!(d.chars().all(|c| c.is_ascii_digit()));
        prop_assert!(d.len() <= s.len());
    }

    #[test]
    fn mask_preserves_the_digits(raw in "[0-9]{11}|[0-9]{14}|[0-9]{0,9}") {
        prop_assert_eq!(digits(&mask_identity(&raw)), raw);
    }

    #[test]
    fn identity_set_is_formatting_insensitive(d in "[0-9]{14}") {
        let formatted = format!(
            "{}.{}.{}/{}-{}",
            &d[0..2], &d[2..5], &d[5..8], &d[8..12], &d[12..14]
        );
        let set = IdentitySet::new([formatted.as_str()]);
        prop_assert!(set.contains(&d));
    }

    #[test]
    fn parse_fields_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = parse_fields(&bytes);
    }

    #[test]
    fn parse_fields_never_panics_on_xmlish_input(body in "[<>a-zA-Z0-9/= \"]{0,256}") {
        let _ = parse_fields(body.as_bytes());
    }
}
