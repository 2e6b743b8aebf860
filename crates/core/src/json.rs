//! JSON value, path, and patch model used by the patch operations
//! (`set`, `delete`, `insert`) described in the component design.
//!
//! Paths are JSON-Pointer-style (`/a/b/0`), with `~1` escaping `/` and
//! `~0` escaping `~` inside a segment, matching RFC 6901 token encoding.

use crate::error::Error;
use crate::limits::MAX_PAYLOAD_SIZE;
use serde_json::Value;
use std::fmt;

/// A parsed JSON document body. Thin wrapper over `serde_json::Value`
/// that enforces the engine's size bound and exposes the path walker
/// used by patch application.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonValue(Value);

impl JsonValue {
    /// Parses and validates a document payload: must be non-empty,
    /// syntactically valid JSON, a top-level object, and within the
    /// payload size bound.
    pub fn parse_document(bytes: &[u8]) -> Result<JsonValue, Error> {
        if bytes.is_empty() {
            return Err(Error::InvalidJSON {
                reason: "payload is empty".to_string(),
            });
        }
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: bytes.len(),
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        let value: Value = serde_json::from_slice(bytes).map_err(|e| Error::InvalidJSON {
            reason: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(Error::NotJSONObject);
        }
        Ok(JsonValue(value))
    }

    /// Wraps an already-validated object value without re-checking size,
    /// used when constructing values internally (e.g. patch results
    /// before re-serialization).
    pub fn from_object(value: Value) -> Result<JsonValue, Error> {
        if !value.is_object() {
            return Err(Error::NotJSONObject);
        }
        Ok(JsonValue(value))
    }

    /// Serializes back to the compact byte form stored in the data file.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.0).expect("serde_json::Value always serializes")
    }

    /// Borrows the inner `serde_json::Value`.
    pub fn as_inner(&self) -> &Value {
        &self.0
    }

    /// Consumes self, returning the inner `serde_json::Value`.
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Walks `path` and returns the value at it, if present.
    pub fn get(&self, path: &JsonPath) -> Option<&Value> {
        get_at_path(&self.0, &path.segments)
    }

    /// Applies a sequence of patch operations in order, returning a new
    /// document. Every op is validated against the document as it stands
    /// after the previous op; the first failing op aborts the whole
    /// patch with no partial effect returned to the caller.
    pub fn apply_patch(&self, patch: &JsonPatch) -> Result<JsonValue, Error> {
        let mut working = self.0.clone();
        for op in &patch.ops {
            apply_op(&mut working, op)?;
        }
        if !working.is_object() {
            return Err(Error::NotJSONObject);
        }
        Ok(JsonValue(working))
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One segment of a parsed JSON pointer: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// An object member name.
    Key(String),
    /// A zero-based array index.
    Index(usize),
}

/// A parsed, JSON-Pointer-style path (`/a/b/0`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// The root path (no segments); not a valid patch target on its own.
    pub fn root() -> JsonPath {
        JsonPath { segments: Vec::new() }
    }

    /// Borrows the parsed segments in order.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Parses a JSON-Pointer-style path string. Every path must start
    /// with `/`; the empty string denotes the root. `~1` decodes to `/`
    /// and `~0` decodes to `~`, applied in that order per token.
    pub fn parse(raw: &str) -> Result<JsonPath, Error> {
        if raw.is_empty() {
            return Ok(JsonPath::root());
        }
        if !raw.starts_with('/') {
            return Err(Error::InvalidPath {
                path: raw.to_string(),
                reason: "path must start with '/'".to_string(),
            });
        }
        let mut segments = Vec::new();
        for token in raw[1..].split('/') {
            let decoded = decode_token(token);
            if let Ok(idx) = decoded.parse::<usize>() {
                // Reject leading-zero numeric tokens other than "0" so that
                // "01" is treated as an object key, matching RFC 6901.
                if decoded == "0" || !decoded.starts_with('0') {
                    segments.push(PathSegment::Index(idx));
                    continue;
                }
            }
            segments.push(PathSegment::Key(decoded));
        }
        Ok(JsonPath { segments })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "");
        }
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => write!(f, "/{}", encode_token(k))?,
                PathSegment::Index(i) => write!(f, "/{}", i)?,
            }
        }
        Ok(())
    }
}

fn decode_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn encode_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// A single patch operation as described in the component design: `set`,
/// `delete`, or `insert` (into an array at a given index).
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Sets the value at `path`, creating intermediate objects as needed.
    Set {
        /// Target path.
        path: JsonPath,
        /// Value to write.
        value: Value,
    },
    /// Removes the member or array element at `path`.
    Delete {
        /// Target path.
        path: JsonPath,
    },
    /// Inserts `value` into the array at `path`, at `index`, shifting
    /// subsequent elements right.
    Insert {
        /// Path to the target array.
        path: JsonPath,
        /// Insertion index within that array.
        index: usize,
        /// Value to insert.
        value: Value,
    },
}

/// An ordered sequence of patch operations to apply to a document.
#[derive(Debug, Clone, Default)]
pub struct JsonPatch {
    ops: Vec<PatchOp>,
}

impl JsonPatch {
    /// Builds an empty patch.
    pub fn new() -> JsonPatch {
        JsonPatch { ops: Vec::new() }
    }

    /// Appends a `set` operation.
    pub fn set(mut self, path: JsonPath, value: Value) -> JsonPatch {
        self.ops.push(PatchOp::Set { path, value });
        self
    }

    /// Appends a `delete` operation.
    pub fn delete(mut self, path: JsonPath) -> JsonPatch {
        self.ops.push(PatchOp::Delete { path });
        self
    }

    /// Appends an `insert` operation.
    pub fn insert(mut self, path: JsonPath, index: usize, value: Value) -> JsonPatch {
        self.ops.push(PatchOp::Insert { path, index, value });
        self
    }

    /// Borrows the operations in application order.
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    /// True when the patch carries no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

fn get_at_path<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for seg in segments {
        current = match (seg, current) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), Value::Array(arr)) => arr.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn get_parent_mut<'a>(
    root: &'a mut Value,
    segments: &[PathSegment],
) -> Result<&'a mut Value, Error> {
    let mut current = root;
    for seg in segments {
        current = match (seg, current) {
            (PathSegment::Key(k), Value::Object(map)) => {
                if !map.contains_key(k) {
                    map.insert(k.clone(), Value::Object(serde_json::Map::new()));
                }
                map.get_mut(k).expect("just inserted")
            }
            (PathSegment::Index(i), Value::Array(arr)) => arr.get_mut(*i).ok_or_else(|| {
                Error::InvalidPath {
                    path: String::new(),
                    reason: format!("array index {} out of bounds", i),
                }
            })?,
            _ => {
                return Err(Error::InvalidPath {
                    path: String::new(),
                    reason: "path segment does not match document shape".to_string(),
                })
            }
        };
    }
    Ok(current)
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), Error> {
    match op {
        PatchOp::Set { path, value } => apply_set(doc, path, value.clone()),
        PatchOp::Delete { path } => apply_delete(doc, path),
        PatchOp::Insert { path, index, value } => apply_insert(doc, path, *index, value.clone()),
    }
}

fn apply_set(doc: &mut Value, path: &JsonPath, value: Value) -> Result<(), Error> {
    let segments = path.segments();
    if segments.is_empty() {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "cannot set the document root".to_string(),
        });
    }
    let (last, parents) = segments.split_last().expect("checked non-empty");
    let parent = get_parent_mut(doc, parents)?;
    match (last, parent) {
        (PathSegment::Key(k), Value::Object(map)) => {
            map.insert(k.clone(), value);
            Ok(())
        }
        (PathSegment::Index(i), Value::Array(arr)) => {
            if *i == arr.len() {
                arr.push(value);
            } else if *i < arr.len() {
                arr[*i] = value;
            } else {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                    reason: format!("array index {} out of bounds", i),
                });
            }
            Ok(())
        }
        _ => Err(Error::InvalidPatch {
            reason: format!("path '{}' does not address a settable location", path),
        }),
    }
}

fn apply_delete(doc: &mut Value, path: &JsonPath) -> Result<(), Error> {
    let segments = path.segments();
    if segments.is_empty() {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "cannot delete the document root".to_string(),
        });
    }
    let (last, parents) = segments.split_last().expect("checked non-empty");
    let parent = get_parent_mut(doc, parents)?;
    match (last, parent) {
        (PathSegment::Key(k), Value::Object(map)) => {
            if map.remove(k).is_none() {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                    reason: "key not present".to_string(),
                });
            }
            Ok(())
        }
        (PathSegment::Index(i), Value::Array(arr)) => {
            if *i >= arr.len() {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                    reason: format!("array index {} out of bounds", i),
                });
            }
            arr.remove(*i);
            Ok(())
        }
        _ => Err(Error::InvalidPatch {
            reason: format!("path '{}' does not address a deletable location", path),
        }),
    }
}

fn apply_insert(doc: &mut Value, path: &JsonPath, index: usize, value: Value) -> Result<(), Error> {
    let target = if path.segments().is_empty() {
        doc
    } else {
        get_parent_mut(doc, path.segments())?
    };
    match target {
        Value::Array(arr) => {
            if index > arr.len() {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                    reason: format!("insert index {} out of bounds", index),
                });
            }
            arr.insert(index, value);
            Ok(())
        }
        _ => Err(Error::InvalidPatch {
            reason: format!("path '{}' does not address an array", path),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_escaped_tokens() {
        let path = JsonPath::parse("/a~1b/c~0d").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("a/b".to_string()),
                PathSegment::Key("c~d".to_string())
            ]
        );
    }

    #[test]
    fn parses_array_index() {
        let path = JsonPath::parse("/items/0").unwrap();
        assert_eq!(
            path.segments(),
            &[PathSegment::Key("items".to_string()), PathSegment::Index(0)]
        );
    }

    #[test]
    fn empty_path_is_root() {
        assert_eq!(JsonPath::parse("").unwrap(), JsonPath::root());
    }

    #[test]
    fn rejects_path_without_leading_slash() {
        assert!(JsonPath::parse("a/b").is_err());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let doc = JsonValue::parse_document(br#"{"a":1}"#).unwrap();
        let patch = JsonPatch::new().set(JsonPath::parse("/b/c").unwrap(), json!(2));
        let result = doc.apply_patch(&patch).unwrap();
        assert_eq!(result.as_inner(), &json!({"a":1, "b": {"c": 2}}));
    }

    #[test]
    fn delete_removes_key() {
        let doc = JsonValue::parse_document(br#"{"a":1,"b":2}"#).unwrap();
        let patch = JsonPatch::new().delete(JsonPath::parse("/a").unwrap());
        let result = doc.apply_patch(&patch).unwrap();
        assert_eq!(result.as_inner(), &json!({"b":2}));
    }

    #[test]
    fn insert_shifts_array_elements() {
        let doc = JsonValue::parse_document(br#"{"items":[1,2,3]}"#).unwrap();
        let patch = JsonPatch::new().insert(JsonPath::parse("/items").unwrap(), 1, json!(99));
        let result = doc.apply_patch(&patch).unwrap();
        assert_eq!(result.as_inner(), &json!({"items":[1,99,2,3]}));
    }

    #[test]
    fn delete_missing_key_is_invalid_path() {
        let doc = JsonValue::parse_document(br#"{"a":1}"#).unwrap();
        let patch = JsonPatch::new().delete(JsonPath::parse("/missing").unwrap());
        assert!(doc.apply_patch(&patch).is_err());
    }

    #[test]
    fn empty_payload_is_invalid_json() {
        assert!(matches!(
            JsonValue::parse_document(b""),
            Err(Error::InvalidJSON { .. })
        ));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            JsonValue::parse_document(b"[1,2,3]"),
            Err(Error::NotJSONObject)
        ));
    }

    #[test]
    fn payload_at_exactly_the_limit_is_accepted() {
        // {"a":"...."} with padding to land exactly at MAX_PAYLOAD_SIZE.
        let overhead = 8; // {"a":"", }
        let filler = "x".repeat(MAX_PAYLOAD_SIZE - overhead);
        let payload = format!("{{\"a\":\"{}\"}}", filler);
        assert_eq!(payload.len(), MAX_PAYLOAD_SIZE);
        assert!(JsonValue::parse_document(payload.as_bytes()).is_ok());
    }

    #[test]
    fn payload_over_the_limit_is_rejected() {
        let filler = "x".repeat(MAX_PAYLOAD_SIZE);
        let payload = format!("{{\"a\":\"{}\"}}", filler);
        assert!(matches!(
            JsonValue::parse_document(payload.as_bytes()),
            Err(Error::PayloadTooLarge { .. })
        ));
    }
}
