/// WAL operation codes. Values are part of the on-disk format and must
/// stay stable; recovery's commit/checkpoint handling is sensitive to
/// `Commit` and `Checkpoint` specifically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpType {
    /// Insert a new document version.
    Create = 1,
    /// Replace the current document version.
    Update = 2,
    /// Publish a tombstone version.
    Delete = 3,
    /// Apply patch operations and publish the result.
    Patch = 4,
    /// Register a new collection.
    CreateCollection = 5,
    /// Remove an empty collection.
    DeleteCollection = 6,
    /// Marks a transaction's preceding data records as committed.
    Commit = 7,
    /// Marks a point recovery may skip earlier records from.
    Checkpoint = 8,
}

impl OpType {
    /// Decodes a raw WAL op code, failing on unknown values so that
    /// corrupt or truncated framing is caught rather than silently
    /// reinterpreted.
    pub fn from_u8(code: u8) -> Option<OpType> {
        match code {
            1 => Some(OpType::Create),
            2 => Some(OpType::Update),
            3 => Some(OpType::Delete),
            4 => Some(OpType::Patch),
            5 => Some(OpType::CreateCollection),
            6 => Some(OpType::DeleteCollection),
            7 => Some(OpType::Commit),
            8 => Some(OpType::Checkpoint),
            _ => None,
        }
    }

    /// True for `Create`/`Update`/`Patch`: ops the healer looks for when
    /// recovering the newest committed-looking payload.
    pub fn is_payload_bearing(self) -> bool {
        matches!(self, OpType::Create | OpType::Update | OpType::Patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_codes() {
        for code in 1..=8u8 {
            let op = OpType::from_u8(code).expect("known code");
            assert_eq!(op as u8, code);
        }
    }

    #[test]
    fn rejects_unknown_codes() {
        assert!(OpType::from_u8(0).is_none());
        assert!(OpType::from_u8(9).is_none());
    }
}
