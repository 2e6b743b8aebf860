//! Append-only payload store: per record `{len: u32 LE, crc32_ieee(payload):
//! u32 LE, payload[len], verification: u8}`. Only records whose trailing
//! verification byte equals 1 are considered readable.
//!
//! The split-fsync write (header+payload fsynced, then the verification
//! byte fsynced separately) guarantees that a crash between the two
//! leaves the record unreadable: readers detect the missing or
//! zero-valued verification byte deterministically rather than trusting
//! a half-written record.

use docdb_core::{Error, MAX_PAYLOAD_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER_SIZE: u64 = 4 + 4; // len + crc32
const VERIFICATION_COMMITTED: u8 = 1;

/// An append-only, CRC-checked payload log backing one partition.
pub struct DataFile {
    file: File,
    path: PathBuf,
}

impl DataFile {
    /// Opens the data file at `path`, creating it if absent. The current
    /// write offset is always the live file length, re-derived from the
    /// filesystem on every write rather than cached, so that external
    /// truncation (tests, compaction, corruption repair) is self-healing.
    pub fn open(path: impl AsRef<Path>) -> Result<DataFile, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::FileOpen {
                path: path.display().to_string(),
                source,
            })?;
        Ok(DataFile { file, path })
    }

    /// Path this data file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the file, re-stat'd from the filesystem.
    pub fn len(&self) -> Result<u64, Error> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| Error::FileRead {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Appends `payload` with full durability: writes the header and
    /// payload, fsyncs, writes the verification byte, fsyncs again.
    /// Returns the offset the record was written at. Rejects payloads
    /// larger than the 16 MiB bound before touching the file.
    pub fn write(&mut self, payload: &[u8]) -> Result<u64, Error> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        let offset = self.len()?;
        self.write_header_and_payload(offset, payload)?;
        self.sync()?;
        self.write_verification_byte(offset, payload.len() as u64, VERIFICATION_COMMITTED)?;
        self.sync()?;
        Ok(offset)
    }

    /// Appends `payload` without fsyncing, including the verification
    /// byte in the same write. Used by recovery to rewrite payloads in
    /// bulk; the caller must issue one trailing `sync()` after the batch.
    pub fn write_no_sync(&mut self, payload: &[u8]) -> Result<u64, Error> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        let offset = self.len()?;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize + payload.len() + 1);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        buf.extend_from_slice(payload);
        buf.push(VERIFICATION_COMMITTED);
        self.file
            .write_all(&buf)
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(offset)
    }

    /// Fsyncs the underlying file.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.file.sync_all().map_err(|source| Error::FileSync {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Reads the record at `offset` whose payload was originally `length`
    /// bytes. Validates the stored length, the verification byte, and
    /// the CRC32 before returning the payload.
    pub fn read(&mut self, offset: u64, length: u32) -> Result<Vec<u8>, Error> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| Error::FileRead {
                path: self.path.display().to_string(),
                source,
            })?;
        let mut len_buf = [0u8; 4];
        self.file
            .read_exact(&mut len_buf)
            .map_err(|_| Error::CorruptRecord {
                offset,
                reason: "truncated before length header".to_string(),
            })?;
        let stored_len = u32::from_le_bytes(len_buf);
        if stored_len != length {
            return Err(Error::CorruptRecord {
                offset,
                reason: format!(
                    "stored length {} does not match expected {}",
                    stored_len, length
                ),
            });
        }
        let mut crc_buf = [0u8; 4];
        self.file
            .read_exact(&mut crc_buf)
            .map_err(|_| Error::CorruptRecord {
                offset,
                reason: "truncated before CRC".to_string(),
            })?;
        let stored_crc = u32::from_le_bytes(crc_buf);

        let mut payload = vec![0u8; length as usize];
        self.file
            .read_exact(&mut payload)
            .map_err(|_| Error::CorruptRecord {
                offset,
                reason: "truncated before payload end".to_string(),
            })?;

        let mut verification = [0u8; 1];
        self.file
            .read_exact(&mut verification)
            .map_err(|_| Error::CorruptRecord {
                offset,
                reason: "missing verification byte".to_string(),
            })?;
        if verification[0] != VERIFICATION_COMMITTED {
            return Err(Error::CorruptRecord {
                offset,
                reason: "verification byte not committed".to_string(),
            });
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != stored_crc {
            return Err(Error::CorruptRecord {
                offset,
                reason: format!(
                    "CRC mismatch: expected {:#010x}, computed {:#010x}",
                    stored_crc, actual_crc
                ),
            });
        }
        Ok(payload)
    }

    /// Zeroes the verification byte of the record at `offset` with
    /// payload length `length`, without otherwise disturbing the record.
    /// Used by tests to simulate a torn write for the healer to recover
    /// from.
    #[doc(hidden)]
    pub fn corrupt_verification_byte_for_test(
        &mut self,
        offset: u64,
        length: u32,
    ) -> Result<(), Error> {
        let verification_offset = offset + HEADER_SIZE + length as u64;
        self.file
            .seek(SeekFrom::Start(verification_offset))
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        self.file
            .write_all(&[0u8])
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        self.file.sync_all().map_err(|source| Error::FileSync {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn write_header_and_payload(&mut self, offset: u64, payload: &[u8]) -> Result<(), Error> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        buf.extend_from_slice(payload);
        self.file
            .write_all(&buf)
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })
    }

    fn write_verification_byte(
        &mut self,
        record_offset: u64,
        payload_len: u64,
        value: u8,
    ) -> Result<(), Error> {
        let verification_offset = record_offset + HEADER_SIZE + payload_len;
        self.file
            .seek(SeekFrom::Start(verification_offset))
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        self.file
            .write_all(&[value])
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips_payload() {
        let dir = tempdir().unwrap();
        let mut df = DataFile::open(dir.path().join("p0.data")).unwrap();
        let offset = df.write(b"{\"a\":1}").unwrap();
        let read_back = df.read(offset, 7).unwrap();
        assert_eq!(read_back, b"{\"a\":1}");
    }

    #[test]
    fn offsets_advance_with_each_write() {
        let dir = tempdir().unwrap();
        let mut df = DataFile::open(dir.path().join("p0.data")).unwrap();
        let o1 = df.write(b"one").unwrap();
        let o2 = df.write(b"two").unwrap();
        assert!(o2 > o1);
        assert_eq!(df.read(o1, 3).unwrap(), b"one");
        assert_eq!(df.read(o2, 3).unwrap(), b"two");
    }

    #[test]
    fn payload_over_limit_is_rejected() {
        let dir = tempdir().unwrap();
        let mut df = DataFile::open(dir.path().join("p0.data")).unwrap();
        let oversized = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            df.write(&oversized),
            Err(Error::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn torn_verification_byte_is_detected_as_corrupt() {
        let dir = tempdir().unwrap();
        let mut df = DataFile::open(dir.path().join("p0.data")).unwrap();
        let offset = df.write(b"{\"v\":1}").unwrap();
        df.corrupt_verification_byte_for_test(offset, 7).unwrap();
        assert!(matches!(
            df.read(offset, 7),
            Err(Error::CorruptRecord { .. })
        ));
    }

    #[test]
    fn length_mismatch_is_corrupt_record() {
        let dir = tempdir().unwrap();
        let mut df = DataFile::open(dir.path().join("p0.data")).unwrap();
        let offset = df.write(b"{\"v\":1}").unwrap();
        assert!(matches!(
            df.read(offset, 3),
            Err(Error::CorruptRecord { .. })
        ));
    }

    #[test]
    fn write_no_sync_is_immediately_readable_after_explicit_sync() {
        let dir = tempdir().unwrap();
        let mut df = DataFile::open(dir.path().join("p0.data")).unwrap();
        let offset = df.write_no_sync(b"recovered").unwrap();
        df.sync().unwrap();
        assert_eq!(df.read(offset, 9).unwrap(), b"recovered");
    }

    #[test]
    fn reopen_preserves_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p0.data");
        let offset = {
            let mut df = DataFile::open(&path).unwrap();
            df.write(b"persisted").unwrap()
        };
        let mut reopened = DataFile::open(&path).unwrap();
        assert_eq!(reopened.read(offset, 9).unwrap(), b"persisted");
    }
}
