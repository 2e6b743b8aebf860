use crate::error::Error;
use crate::limits::{DEFAULT_COLLECTION, MAX_COLLECTION_NAME_LEN, MAX_DATABASE_NAME_LEN};

/// Validates a logical database name: non-empty, valid UTF-8 (guaranteed
/// by `&str`), at most 64 bytes, and free of `/`, `\`, `..`, and NUL.
///
/// Pure and idempotent: calling it twice on the same input produces the
/// same result with no side effects.
pub fn validate_database_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidPath {
            path: name.to_string(),
            reason: "database name must not be empty".to_string(),
        });
    }
    if name.len() > MAX_DATABASE_NAME_LEN {
        return Err(Error::InvalidPath {
            path: name.to_string(),
            reason: format!(
                "database name is {} bytes, exceeding the {} byte limit",
                name.len(),
                MAX_DATABASE_NAME_LEN
            ),
        });
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(Error::InvalidPath {
            path: name.to_string(),
            reason: "database name contains a reserved character ('/', '\\\\', \"..\", NUL)"
                .to_string(),
        });
    }
    Ok(())
}

/// Validates and normalizes a collection name. An empty string normalizes
/// to the reserved `_default` collection per the data model's
/// empty-normalization rule; every other name must be non-empty UTF-8, at
/// most 64 bytes, and must not contain `/`, `.`, or NUL.
///
/// Pure and idempotent.
pub fn validate_collection_name(name: &str) -> Result<String, Error> {
    if name.is_empty() {
        return Ok(DEFAULT_COLLECTION.to_string());
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(Error::InvalidPath {
            path: name.to_string(),
            reason: format!(
                "collection name is {} bytes, exceeding the {} byte limit",
                name.len(),
                MAX_COLLECTION_NAME_LEN
            ),
        });
    }
    if name.contains('/') || name.contains('.') || name.contains('\0') {
        return Err(Error::InvalidPath {
            path: name.to_string(),
            reason: "collection name contains a reserved character ('/', '.', NUL)".to_string(),
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_normalizes_to_default() {
        assert_eq!(validate_collection_name("").unwrap(), DEFAULT_COLLECTION);
    }

    #[test]
    fn collection_name_boundary_64_accepted_65_rejected() {
        let ok = "a".repeat(MAX_COLLECTION_NAME_LEN);
        assert!(validate_collection_name(&ok).is_ok());
        let too_long = "a".repeat(MAX_COLLECTION_NAME_LEN + 1);
        assert!(validate_collection_name(&too_long).is_err());
    }

    #[test]
    fn collection_name_rejects_reserved_chars() {
        assert!(validate_collection_name("a/b").is_err());
        assert!(validate_collection_name("a.b").is_err());
        assert!(validate_collection_name("a\0b").is_err());
    }

    #[test]
    fn database_name_rejects_empty_and_traversal() {
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("../etc").is_err());
        assert!(validate_database_name("a/b").is_err());
        assert!(validate_database_name("a\\b").is_err());
    }

    #[test]
    fn database_name_boundary_64_accepted_65_rejected() {
        let ok = "a".repeat(MAX_DATABASE_NAME_LEN);
        assert!(validate_database_name(&ok).is_ok());
        let too_long = "a".repeat(MAX_DATABASE_NAME_LEN + 1);
        assert!(validate_database_name(&too_long).is_err());
    }

    #[test]
    fn validation_is_idempotent() {
        let once = validate_collection_name("orders");
        let twice = validate_collection_name("orders");
        assert_eq!(once.unwrap(), twice.unwrap());
    }
}
