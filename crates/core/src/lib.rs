//! Foundational types shared by every docdb crate: errors, identifiers,
//! name validation, size limits, and the JSON value/path/patch model used
//! by the patch operations in `docdb-engine`.
//!
//! This crate has no I/O and no locking; it exists so that
//! `docdb-storage`, `docdb-durability`, `docdb-concurrency`, and
//! `docdb-engine` can share one error type and one document model without
//! depending on each other.

#![warn(missing_docs)]

mod error;
mod ids;
mod json;
mod limits;
mod names;
mod op;

pub use error::{Error, Result};
pub use ids::{DocId, PartitionId, TxId};
pub use json::{JsonPatch, JsonPath, JsonValue, PatchOp};
pub use limits::{MAX_COLLECTION_NAME_LEN, MAX_DATABASE_NAME_LEN, MAX_PAYLOAD_SIZE};
pub use names::{validate_collection_name, validate_database_name};
pub use op::OpType;
