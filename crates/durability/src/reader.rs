//! Ordered, cross-segment replay of a WAL directory, used by recovery.

use crate::format::WalRecord;
use crate::segment::WalSegment;
use docdb_core::Error;
use std::fs;
use std::path::{Path, PathBuf};

const SEGMENT_PREFIX: &str = "wal-";
const SEGMENT_SUFFIX: &str = ".seg";

/// Lists every segment file in `wal_dir` in ascending sequence order.
pub fn list_segments(wal_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    if !wal_dir.exists() {
        return Ok(Vec::new());
    }
    let mut numbered = Vec::new();
    for entry in fs::read_dir(wal_dir).map_err(|source| Error::FileRead {
        path: wal_dir.display().to_string(),
        source,
    })? {
        let entry = entry.map_err(|source| Error::FileRead {
            path: wal_dir.display().to_string(),
            source,
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(middle) = name
            .strip_prefix(SEGMENT_PREFIX)
            .and_then(|s| s.strip_suffix(SEGMENT_SUFFIX))
        {
            if let Ok(number) = middle.parse::<u64>() {
                numbered.push((number, entry.path()));
            }
        }
    }
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

/// A lazy, ordered stream of WAL records across every segment in a
/// directory. Stops cleanly at a partial trailing record in the last
/// segment; propagates a fatal `CorruptWAL` for an interior CRC failure
/// in any segment.
pub struct WalReader {
    segments: Vec<PathBuf>,
    database_uuid: [u8; 16],
    current: Option<WalSegment>,
    next_segment_index: usize,
}

impl WalReader {
    /// Opens a reader over every segment currently present in `wal_dir`.
    pub fn open(wal_dir: &Path, database_uuid: [u8; 16]) -> Result<WalReader, Error> {
        let segments = list_segments(wal_dir)?;
        Ok(WalReader {
            segments,
            database_uuid,
            current: None,
            next_segment_index: 0,
        })
    }

    /// Returns the next record in WAL order, or `None` once every
    /// segment has been exhausted.
    pub fn next_record(&mut self) -> Result<Option<WalRecord>, Error> {
        loop {
            if self.current.is_none() {
                if self.next_segment_index >= self.segments.len() {
                    return Ok(None);
                }
                let path = &self.segments[self.next_segment_index];
                self.next_segment_index += 1;
                self.current = Some(WalSegment::open_read(path, self.database_uuid)?);
            }
            let segment = self.current.as_mut().expect("just ensured present");
            match segment.read_record()? {
                Some(record) => return Ok(Some(record)),
                None => {
                    // Exhausted (or torn trailing record in) this segment;
                    // move to the next one.
                    self.current = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalConfig;
    use crate::writer::WalWriter;
    use docdb_core::OpType;
    use tempfile::tempdir;

    fn sample(tx_id: u64) -> WalRecord {
        WalRecord {
            tx_id,
            db_id: "t1".to_string(),
            collection: "_default".to_string(),
            op_type: OpType::Create,
            doc_id: tx_id,
            payload: b"{\"a\":1}".to_vec(),
        }
    }

    #[test]
    fn reads_records_across_multiple_segments_in_order() {
        let dir = tempdir().unwrap();
        let uuid = [7u8; 16];
        let mut config = WalConfig::default();
        config.max_segment_size_bytes = 64;
        {
            let mut writer = WalWriter::open(dir.path(), uuid, config).unwrap();
            for i in 0..10 {
                writer.append(&sample(i)).unwrap();
            }
            writer.close().unwrap();
        }
        let mut reader = WalReader::open(dir.path(), uuid).unwrap();
        let mut seen = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            seen.push(record.tx_id);
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn empty_directory_yields_no_records() {
        let dir = tempdir().unwrap();
        let mut reader = WalReader::open(dir.path(), [1u8; 16]).unwrap();
        assert!(reader.next_record().unwrap().is_none());
    }
}
