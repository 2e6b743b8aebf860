//! Wires `docdb_core::json` patch application into the standard write
//! path: a patch is resolved against the document's current payload
//! into a full post-image, which is then written exactly like an
//! `Update` (op type `Patch` is retained only for WAL categorization;
//! the stored payload is always the resulting document, never a diff).

use docdb_core::{Error, JsonPatch, JsonValue};

/// Applies `patch` to `current_payload`, returning the serialized
/// post-image to write as this operation's payload.
pub fn resolve_patch(current_payload: &[u8], patch: &JsonPatch) -> Result<Vec<u8>, Error> {
    let doc = JsonValue::parse_document(current_payload)?;
    let patched = doc.apply_patch(patch)?;
    Ok(patched.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_core::JsonPath;

    #[test]
    fn set_adds_a_field_to_the_current_document() {
        let current = br#"{"a":1}"#;
        let patch = JsonPatch::new().set(JsonPath::parse("/b").unwrap(), serde_json::json!(2));
        let result = resolve_patch(current, &patch).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&result).unwrap();
        assert_eq!(parsed, serde_json::json!({"a": 1, "b": 2}));
    }

    #[test]
    fn delete_removes_a_field() {
        let current = br#"{"a":1,"b":2}"#;
        let patch = JsonPatch::new().delete(JsonPath::parse("/a").unwrap());
        let result = resolve_patch(current, &patch).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&result).unwrap();
        assert_eq!(parsed, serde_json::json!({"b": 2}));
    }

    #[test]
    fn invalid_current_payload_surfaces_invalid_json() {
        let patch = JsonPatch::new();
        let err = resolve_patch(b"not json", &patch).unwrap_err();
        assert!(err.is_validation());
    }
}
