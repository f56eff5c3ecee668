//! Parsing of the compiler's candidates stream (spec §4.7, §6).
//!
//! The stream is newline-delimited JSON: blank lines are ignored, and each
//! object's recognized fields are `subject`, `predicate`, `object`,
//! `object_type` (default `"entity"`), `evidence`/`evidence_quote`, and
//! `tier` (default `0`). Fields are open: unrecognized keys are ignored,
//! and a missing field is treated as absent, never coerced to a zero value.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{AxmError, AxmResult};

/// One row parsed from the candidates stream, prior to resolution against
/// the entity map or enum/tier validation.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    #[serde(default)]
    pub tier: Option<Value>,
}

impl Candidate {
    /// `object_type`, defaulted per spec.
    pub fn object_type_or_default(&self) -> String {
        self.object_type.clone().unwrap_or_else(|| "entity".to_string())
    }

    /// `evidence` falls back to `evidence_quote` when absent.
    pub fn evidence_text(&self) -> Option<&str> {
        self.evidence.as_deref().or(self.evidence_quote.as_deref())
    }

    /// `tier` coerced to an integer, defaulting to `0` when missing or not
    /// representable as an integer (the compiler validates range
    /// separately; this only handles the JSON-shape coercion).
    pub fn tier_or_default(&self) -> Option<i64> {
        match &self.tier {
            None => Some(0),
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        }
    }
}

/// Parse the candidates stream from its newline-delimited JSON text,
/// skipping blank lines and returning each object in source order.
pub fn parse_candidates(text: &str) -> AxmResult<Vec<Candidate>> {
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let candidate: Candidate = serde_json::from_str(line).map_err(|e| {
            AxmError::invalid_argument(format!("candidates stream line {}: {e}", lineno + 1))
        })?;
        out.push(candidate);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        let stream = "\n{\"subject\":\"a\",\"predicate\":\"p\",\"object\":\"b\",\"evidence\":\"e\"}\n\n";
        let rows = parse_candidates(stream).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn missing_object_type_defaults_to_entity() {
        let stream = "{\"subject\":\"a\",\"predicate\":\"p\",\"object\":\"b\",\"evidence\":\"e\"}";
        let rows = parse_candidates(stream).unwrap();
        assert_eq!(rows[0].object_type_or_default(), "entity");
    }

    #[test]
    fn evidence_quote_is_a_fallback() {
        let stream = "{\"subject\":\"a\",\"predicate\":\"p\",\"object\":\"b\",\"evidence_quote\":\"e\"}";
        let rows = parse_candidates(stream).unwrap();
        assert_eq!(rows[0].evidence_text(), Some("e"));
    }

    #[test]
    fn tier_defaults_when_absent() {
        let stream = "{\"subject\":\"a\",\"predicate\":\"p\",\"object\":\"b\",\"evidence\":\"e\"}";
        let rows = parse_candidates(stream).unwrap();
        assert_eq!(rows[0].tier_or_default(), Some(0));
    }

    #[test]
    fn tier_invalid_shape_is_none_not_zero() {
        let stream = "{\"subject\":\"a\",\"predicate\":\"p\",\"object\":\"b\",\"evidence\":\"e\",\"tier\":\"bogus\"}";
        let rows = parse_candidates(stream).unwrap();
        assert_eq!(rows[0].tier_or_default(), None);
    }

    #[test]
    fn rejects_malformed_json_line() {
        let stream = "{not json}";
        assert!(parse_candidates(stream).is_err());
    }
}
