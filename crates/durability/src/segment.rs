//! One physical WAL segment file: a header followed by a sequence of
//! length-prefixed, CRC32-trailed records.

use crate::format::{SegmentHeader, WalRecord, SEGMENT_HEADER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use docdb_core::Error;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One WAL segment file, positioned for either appending or sequential
/// read-only replay.
pub struct WalSegment {
    file: File,
    path: PathBuf,
    segment_number: u64,
    write_position: u64,
}

impl WalSegment {
    /// Creates a brand new segment file, failing if it already exists,
    /// and writes the header.
    pub fn create(
        path: impl AsRef<Path>,
        segment_number: u64,
        database_uuid: [u8; 16],
    ) -> Result<WalSegment, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::FileOpen {
                path: path.display().to_string(),
                source,
            })?;
        let header = SegmentHeader::new(segment_number, database_uuid);
        file.write_all(&header.to_bytes())
            .map_err(|source| Error::FileWrite {
                path: path.display().to_string(),
                source,
            })?;
        Ok(WalSegment {
            file,
            path,
            segment_number,
            write_position: SEGMENT_HEADER_SIZE as u64,
        })
    }

    /// Opens an existing segment for appending, validating the header
    /// and seeking to the current end of file.
    pub fn open_append(path: impl AsRef<Path>, expected_uuid: [u8; 16]) -> Result<WalSegment, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::FileOpen {
                path: path.display().to_string(),
                source,
            })?;
        let header = Self::read_and_validate_header(&mut file, &path, expected_uuid)?;
        let write_position = file
            .seek(SeekFrom::End(0))
            .map_err(|source| Error::FileRead {
                path: path.display().to_string(),
                source,
            })?;
        Ok(WalSegment {
            file,
            path,
            segment_number: header.segment_number,
            write_position,
        })
    }

    /// Opens an existing segment read-only for replay.
    pub fn open_read(path: impl AsRef<Path>, expected_uuid: [u8; 16]) -> Result<WalSegment, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| Error::FileOpen {
                path: path.display().to_string(),
                source,
            })?;
        let header = Self::read_and_validate_header(&mut file, &path, expected_uuid)?;
        Ok(WalSegment {
            file,
            path,
            segment_number: header.segment_number,
            write_position: SEGMENT_HEADER_SIZE as u64,
        })
    }

    fn read_and_validate_header(
        file: &mut File,
        path: &Path,
        expected_uuid: [u8; 16],
    ) -> Result<SegmentHeader, Error> {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE];
        file.read_exact(&mut buf).map_err(|source| Error::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        let header = SegmentHeader::from_bytes(&buf, &path.display().to_string())?;
        if header.database_uuid != expected_uuid {
            return Err(Error::CorruptWAL {
                segment: path.display().to_string(),
                reason: "segment belongs to a different database UUID".to_string(),
            });
        }
        Ok(header)
    }

    /// Sequence number of this segment among its WAL.
    pub fn segment_number(&self) -> u64 {
        self.segment_number
    }

    /// Path of this segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the segment, including its header.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// Appends one record's encoded body, framed as `len:u32 LE | body |
    /// crc32_ieee(body):u32 LE`.
    pub fn append_record(&mut self, body: &[u8]) -> Result<(), Error> {
        self.file
            .seek(SeekFrom::Start(self.write_position))
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        let crc = crc32fast::hash(body);
        let mut buf = Vec::with_capacity(4 + body.len() + 4);
        buf.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        buf.extend_from_slice(body);
        buf.write_u32::<LittleEndian>(crc).unwrap();
        self.file
            .write_all(&buf)
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        self.write_position += buf.len() as u64;
        Ok(())
    }

    /// Fsyncs the segment file.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.file.sync_all().map_err(|source| Error::FileSync {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Reads the next record during sequential replay. Returns `Ok(None)`
    /// both at a clean end of file and at a partial trailing record
    /// (torn length prefix, body, or CRC) — both are logically truncated,
    /// not applied, and not treated as corruption. A structurally
    /// complete record whose CRC does not match its body is a fatal
    /// `CorruptWAL`.
    pub fn read_record(&mut self) -> Result<Option<WalRecord>, Error> {
        let mut len_buf = [0u8; 4];
        if !self.try_read_exact(&mut len_buf)? {
            return Ok(None);
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut body = vec![0u8; len];
        if !self.try_read_exact(&mut body)? {
            return Ok(None);
        }

        let mut crc_buf = [0u8; 4];
        if !self.try_read_exact(&mut crc_buf)? {
            return Ok(None);
        }
        let stored_crc = u32::from_le_bytes(crc_buf);
        let actual_crc = crc32fast::hash(&body);
        if stored_crc != actual_crc {
            return Err(Error::CorruptWAL {
                segment: self.path.display().to_string(),
                reason: format!(
                    "record CRC mismatch: expected {:#010x}, computed {:#010x}",
                    stored_crc, actual_crc
                ),
            });
        }

        let record = WalRecord::decode_body(&body)?;
        Ok(Some(record))
    }

    fn try_read_exact(&mut self, buf: &mut [u8]) -> Result<bool, Error> {
        match self.file.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(source) => Err(Error::FileRead {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}
