//! Deterministic identity derivation for entities and claims (spec §4.1).
//!
//! `canonicalize`, `entity_id`, and `claim_id` are total, pure functions and
//! are the sole source of truth for IDs: both the compiler and the verifier
//! call them identically, so any drift here invalidates every shard already
//! built.

use caseless::default_case_fold_str;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::errors::{AxmError, AxmResult};

const TRUNCATION_BYTES: usize = 15;

/// Valid `object_type` values for a claim (spec §3, §4.7).
pub const VALID_OBJECT_TYPES: &[&str] = &[
    "entity",
    "literal:string",
    "literal:integer",
    "literal:decimal",
    "literal:boolean",
];

/// Valid `tier` values for a claim (spec §3).
pub const VALID_TIERS: &[i64] = &[0, 1, 2, 3, 4];

/// Normalize a human label: reject embedded NULs, NFC-normalize, case-fold,
/// collapse whitespace (dropping `Cc` control characters from each
/// whitespace-delimited chunk), and rejoin with single ASCII spaces.
pub fn canonicalize(s: &str) -> AxmResult<String> {
    if s.contains('\0') {
        return Err(AxmError::invalid_argument("identifier contains illegal null byte"));
    }

    let nfc: String = s.nfc().collect();
    // Full Unicode case folding, not simple lowercasing: they diverge for
    // characters such as "ß" (folds to "ss", lowercases to itself) and "İ".
    let folded = default_case_fold_str(&nfc);

    let mut parts: Vec<String> = Vec::new();
    for chunk in folded.split_whitespace() {
        let cleaned: String = chunk.chars().filter(|c| !is_control_cc(*c)).collect();
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }

    Ok(parts.join(" "))
}

/// Approximate the Unicode `Cc` (control) general category using the
/// standard library's ASCII/general control predicates, which cover the
/// full `Cc` range (U+0000..=U+001F, U+007F..=U+009F).
fn is_control_cc(c: char) -> bool {
    c.is_control()
}

fn b32_truncated_hash(prefix: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let truncated = &digest[..TRUNCATION_BYTES];
    let encoded = base32::encode(base32::Alphabet::RFC4648 { padding: false }, truncated);
    format!("{prefix}{}", encoded.to_lowercase())
}

/// Derive a stable entity ID from a namespace and a human label.
pub fn entity_id(namespace: &str, label: &str) -> AxmResult<String> {
    let ns = canonicalize(namespace)?;
    let lbl = canonicalize(label)?;

    let mut data = Vec::with_capacity(ns.len() + lbl.len() + 1);
    data.extend_from_slice(ns.as_bytes());
    data.push(0u8);
    data.extend_from_slice(lbl.as_bytes());

    Ok(b32_truncated_hash("e_", &data))
}

/// Derive a stable claim ID from a subject entity ID, a predicate label, an
/// object (entity ID or literal), and the object type.
///
/// `object` is used verbatim (already canonical) when `object_type ==
/// "entity"`; otherwise it is canonicalized like any other label.
pub fn claim_id(subject: &str, predicate: &str, object: &str, object_type: &str) -> AxmResult<String> {
    let pred = canonicalize(predicate)?;
    let obj_canon = if object_type == "entity" {
        object.to_string()
    } else {
        canonicalize(object)?
    };

    let mut data = Vec::new();
    data.extend_from_slice(subject.as_bytes());
    data.push(0u8);
    data.extend_from_slice(pred.as_bytes());
    data.push(0u8);
    data.extend_from_slice(object_type.as_bytes());
    data.push(0u8);
    data.extend_from_slice(obj_canon.as_bytes());

    Ok(b32_truncated_hash("c_", &data))
}

/// Derive a deterministic `provenance_id` from a source hash and byte range
/// (spec §4.7 step 3).
pub fn provenance_id(source_hash: &str, byte_start: i64, byte_end: i64) -> String {
    let data = format!("{source_hash}\0{byte_start}\0{byte_end}");
    b32_truncated_hash("p_", data.as_bytes())
}

/// Derive a deterministic `span_id` from a source hash, byte range, and the
/// evidence text (spec §4.7 step 3).
pub fn span_id(source_hash: &str, byte_start: i64, byte_end: i64, text: &str) -> String {
    let data = format!("{source_hash}\0{byte_start}\0{byte_end}\0{text}");
    b32_truncated_hash("s_", data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_collapses_whitespace() {
        assert_eq!(canonicalize("  Hello   World  ").unwrap(), "hello world");
    }

    #[test]
    fn canonicalize_rejects_nul() {
        assert!(canonicalize("a\0b").is_err());
    }

    #[test]
    fn canonicalize_strips_control_chars() {
        let with_control = "Hello\u{0007}World Again";
        assert_eq!(canonicalize(with_control).unwrap(), "helloworld again");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let s = "  Mixed\tCASE\u{00A0}text  ";
        let once = canonicalize(s).unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn entity_id_is_stable() {
        let a = entity_id("ns", "Pressure Dressing").unwrap();
        let b = entity_id("ns", "  pressure   dressing ").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("e_"));
        assert_eq!(a.len(), 2 + 24);
    }

    #[test]
    fn claim_id_is_stable_and_order_sensitive() {
        let e1 = entity_id("ns", "pressure dressing").unwrap();
        let e2 = entity_id("ns", "severe bleeding").unwrap();
        let c1 = claim_id(&e1, "treats", &e2, "entity").unwrap();
        let c2 = claim_id(&e1, "treats", &e2, "entity").unwrap();
        assert_eq!(c1, c2);
        let c3 = claim_id(&e2, "treats", &e1, "entity").unwrap();
        assert_ne!(c1, c3);
    }

    #[test]
    fn canonicalize_case_folds_not_just_lowercases() {
        // "ß" case-folds to "ss" but lowercases to itself; "İ" (U+0130,
        // Latin capital I with dot above) case-folds to "i̇" (i + combining
        // dot above) rather than the Turkish-locale-dependent "i". A plain
        // `to_lowercase()` would leave "ß" untouched and diverge here.
        assert_eq!(canonicalize("Straße").unwrap(), "strasse");
        assert_eq!(canonicalize("İstanbul").unwrap(), "i\u{307}stanbul");
    }

    #[test]
    fn claim_id_literal_object_is_canonicalized() {
        let e1 = entity_id("ns", "aspirin").unwrap();
        let a = claim_id(&e1, "dosage", "  500 MG ", "literal:string").unwrap();
        let b = claim_id(&e1, "dosage", "500 mg", "literal:string").unwrap();
        assert_eq!(a, b);
    }

    proptest::proptest! {
        #[test]
        fn canonicalize_is_idempotent_on_arbitrary_strings(s in "\\PC{0,64}") {
            if let Ok(once) = canonicalize(&s) {
                let twice = canonicalize(&once).unwrap();
                proptest::prop_assert_eq!(once, twice);
            }
        }

        #[test]
        fn entity_id_is_stable_under_whitespace_padding(label in "[a-zA-Z ]{1,32}") {
            let a = entity_id("ns", &label).unwrap();
            let padded = format!("  {label}  ");
            let b = entity_id("ns", &padded).unwrap();
            proptest::prop_assert_eq!(a, b);
        }
    }
}
