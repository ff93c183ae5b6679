//! Base64 integrity for `_b64` payload fields.
//!
//! A value is accepted only when it is syntactically standard base64 and
//! canonical: decoding it and encoding the bytes again gives back the same
//! text, ignoring trailing `=` padding. Non-zero trailing bits (`QR==`)
//! decode fine under a lenient engine but fail the round trip.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use thiserror::Error;

use crate::grammar::diag::{Diagnostic, codes};
use crate::grammar::fields::{FieldMap, FieldValue};

/// Fields carrying base64 payloads, in the order they are checked.
pub const B64_FIELDS: &[&str] = &["content_b64", "patch_b64", "edits_b64"];

/// Decoder that tolerates non-canonical input, so canonicality can be
/// judged by the round trip instead of by a decode error.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a base64 value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum B64Error {
    /// Characters, padding, or length outside standard base64.
    #[error("not valid base64")]
    Syntax,
    /// Decodes, but re-encoding does not reproduce the input.
    #[error("not canonical base64")]
    NotCanonical,
}

/// Whether `value` has standard base64 shape.
///
/// `[A-Za-z0-9+/]+` followed by at most two `=`, total length a multiple
/// of four.
pub fn is_b64_syntax(value: &str) -> bool {
    let body = value.trim_end_matches('=');
    let padding = value.len() - body.len();
    !body.is_empty()
        && padding <= 2
        && value.len() % 4 == 0
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Decode `value`, requiring valid syntax and a canonical encoding.
pub fn decode_canonical(value: &str) -> Result<Vec<u8>, B64Error> {
    if !is_b64_syntax(value) {
        return Err(B64Error::Syntax);
    }
    let bytes = LENIENT.decode(value).map_err(|_| B64Error::Syntax)?;
    let reencoded = general_purpose::STANDARD.encode(&bytes);
    if reencoded.trim_end_matches('=') != value.trim_end_matches('=') {
        return Err(B64Error::NotCanonical);
    }
    Ok(bytes)
}

/// Check one `_b64` field value, producing `ERR_INVALID_BASE64` naming it.
pub(crate) fn check_b64_field(field: &str, value: &str) -> Result<(), Diagnostic> {
    decode_canonical(value).map(|_| ()).map_err(|e| {
        Diagnostic::new(codes::INVALID_BASE64, format!("{field} is {e}"))
            .with_context(ctx!("field" => field))
    })
}

/// `ERR_INVALID_BASE64` for a `_b64` field holding a boolean or number.
pub(crate) fn non_text_b64_field(field: &str, value: &FieldValue) -> Diagnostic {
    Diagnostic::new(
        codes::INVALID_BASE64,
        format!("{field} is not valid base64 (got non-string {value})"),
    )
    .with_context(ctx!("field" => field))
}

/// Decoded bytes of a `_b64` field, for executors of a validated command.
///
/// Returns `Ok(None)` when the field is absent. Only string values decode.
pub fn decode_b64_field(fields: &FieldMap, key: &str) -> Result<Option<Vec<u8>>, B64Error> {
    match fields.get(key) {
        None => Ok(None),
        Some(FieldValue::Text(text)) => decode_canonical(text).map(Some),
        Some(_) => Err(B64Error::Syntax),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_values() {
        assert_eq!(decode_canonical("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_canonical("aGk=").unwrap(), b"hi");
        assert_eq!(decode_canonical("YWJj").unwrap(), b"abc");
        assert_eq!(decode_canonical("+/+/").unwrap(), vec![0xfb, 0xff, 0xbf]);
    }

    #[test]
    fn syntax_rules() {
        assert!(!is_b64_syntax(""));
        assert!(!is_b64_syntax("===="));
        assert!(!is_b64_syntax("abc"));
        assert!(!is_b64_syntax("a==="));
        assert!(!is_b64_syntax("ab=c"));
        assert!(!is_b64_syntax("not-base64"));
        assert!(!is_b64_syntax("aGVs bG8="));
        assert!(is_b64_syntax("aGk="));
    }

    #[test]
    fn trailing_bits_are_not_canonical() {
        assert_eq!(decode_canonical("QR=="), Err(B64Error::NotCanonical));
        assert_eq!(decode_canonical("QQ==").unwrap(), b"A");
    }

    #[test]
    fn field_check_names_the_field() {
        let d = check_b64_field("edits_b64", "not-base64").unwrap_err();
        assert_eq!(d.code, codes::INVALID_BASE64);
        assert!(d.detail.contains("edits_b64"), "{}", d.detail);
        assert_eq!(d.context.unwrap()["field"], "edits_b64");
    }

    #[test]
    fn decode_field_absent_and_present() {
        let mut fields = FieldMap::new();
        assert_eq!(decode_b64_field(&fields, "content_b64"), Ok(None));
        fields.insert("content_b64", FieldValue::Text("aGk=".into()));
        assert_eq!(decode_b64_field(&fields, "content_b64"), Ok(Some(b"hi".to_vec())));
    }

    #[test]
    fn non_string_field_does_not_decode() {
        let mut fields = FieldMap::new();
        fields.insert("patch_b64", FieldValue::Bool(true));
        assert_eq!(decode_b64_field(&fields, "patch_b64"), Err(B64Error::Syntax));

        let d = non_text_b64_field("patch_b64", &FieldValue::Bool(true));
        assert_eq!(d.code, codes::INVALID_BASE64);
        assert_eq!(d.detail, "patch_b64 is not valid base64 (got non-string true)");
    }
}
