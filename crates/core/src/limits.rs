/// Maximum payload size for a single document body, in bytes (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Maximum length, in bytes, of a database name.
pub const MAX_DATABASE_NAME_LEN: usize = 64;

/// Maximum length, in bytes, of a collection name.
pub const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Name of the reserved collection that always exists and cannot be
/// deleted. An empty collection name normalizes to this on all inputs.
pub const DEFAULT_COLLECTION: &str = "_default";
