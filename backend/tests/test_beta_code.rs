//! Property tests for Beta Code conversion.
//!
//! Generated text is valid Beta Code: every marker sits on a letter that can
//! carry it. For such text, converting to Unicode and back gives the
//! canonical spelling of the input.

use proptest::prelude::*;

mod helpers;
use helpers as h;

use textcritical_backend::beta_code::{canonicalize, to_beta_code, to_unicode};
use textcritical_backend::language_tools::strip_accents;

fn consonant() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["B", "G", "D", "Z", "Q", "K", "L", "M", "N", "C", "P", "S", "T", "F", "X", "Y"])
        .prop_map(|s| s.to_string())
}

fn vowel() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!['A', 'E', 'H', 'I', 'O', 'U', 'W']),
        prop::sample::select(vec!["", ")", "("]),
        prop::sample::select(vec!["", "/", "\\", "="]),
        any::<bool>(),
        any::<bool>(),
        prop::sample::select(vec!["", "%26", "%27"]),
    )
        .prop_map(|(letter, breathing, accent, diaeresis, iota, length)| {
            let mut s = letter.to_string();
            s.push_str(breathing);
            if diaeresis && breathing.is_empty() && matches!(letter, 'I' | 'U') {
                s.push('+');
            }
            s.push_str(accent);
            if iota && matches!(letter, 'A' | 'H' | 'W') {
                s.push('|');
            }
            if matches!(letter, 'A' | 'I' | 'U') {
                s.push_str(length);
            }
            s
        })
}

fn rho() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["R", "R(", "R)"]).prop_map(|s| s.to_string())
}

fn letter() -> impl Strategy<Value = String> {
    prop_oneof![consonant(), vowel(), rho()]
}

fn word() -> impl Strategy<Value = String> {
    (any::<bool>(), prop::collection::vec(letter(), 1..7)).prop_map(|(capital, letters)| {
        let word = letters.concat();
        if capital { format!("*{}", word) } else { word }
    })
}

fn sentence() -> impl Strategy<Value = String> {
    (prop::collection::vec(word(), 1..6), any::<bool>()).prop_map(|(words, lower)| {
        let s = words.join(" ");
        if lower { s.to_lowercase() } else { s }
    })
}

proptest! {
    #[test]
    fn test_round_trip_is_canonical(beta in sentence()) {
        let greek = to_unicode(&beta);
        prop_assert_eq!(to_beta_code(&greek), canonicalize(&beta));
    }

    #[test]
    fn test_canonicalize_is_idempotent(beta in sentence()) {
        let canonical = canonicalize(&beta);
        prop_assert_eq!(canonicalize(&canonical), canonical.clone());
        prop_assert_eq!(to_unicode(&canonical), to_unicode(&beta));
    }

    #[test]
    fn test_unicode_output_has_no_ascii_letters(beta in sentence()) {
        let greek = to_unicode(&beta);
        prop_assert!(!greek.chars().any(|c| c.is_ascii_alphabetic()), "{} -> {}", beta, greek);
    }
}

#[test]
fn test_perseus_lines() {
    let cases = [
        ("mh=nin a)/eide qea\\ *phlhi+a/dew *)axilh=os", "μῆνιν ἄειδε θεὰ Πηληϊάδεω Ἀχιλῆος"),
        ("a)/ndra moi e)/nnepe, mou=sa, polu/tropon", "ἄνδρα μοι ἔννεπε, μοῦσα, πολύτροπον"),
        ("*)en a)rxh=| h)=n o( lo/gos", "Ἐν ἀρχῇ ἦν ὁ λόγος"),
    ];

    for (beta, greek) in cases {
        assert_eq!(to_unicode(beta), h::nfc(greek), "converting {}", beta);
        assert_eq!(to_beta_code(&to_unicode(beta)), canonicalize(beta));
    }
}

#[test]
fn test_strip_accents_after_conversion() {
    assert_eq!(strip_accents(&to_unicode("QEO/S")), "θεος");
    assert_eq!(strip_accents(&to_unicode("*)axilh=os")), "Αχιληος");
}
