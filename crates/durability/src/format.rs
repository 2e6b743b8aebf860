//! Bit-exact on-disk framing: the WAL segment header, the logical WAL
//! record body (length-prefixed with a trailing CRC32), and the fixed
//! 13-byte coordinator log record.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use docdb_core::{Error, OpType};
use std::io::Cursor;

/// Magic bytes stamped at the start of every WAL segment.
pub const SEGMENT_MAGIC: [u8; 4] = *b"DOCW";
/// Current on-disk format version for segment headers.
pub const SEGMENT_FORMAT_VERSION: u32 = 1;
/// Fixed size of a segment header: magic(4) + version(4) + segment_number(8) + database_uuid(16).
pub const SEGMENT_HEADER_SIZE: usize = 4 + 4 + 8 + 16;

/// The header stamped at the start of every WAL segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Sequence number of this segment among its WAL.
    pub segment_number: u64,
    /// UUID of the logical database this WAL belongs to.
    pub database_uuid: [u8; 16],
}

impl SegmentHeader {
    /// Builds a header for a freshly created segment.
    pub fn new(segment_number: u64, database_uuid: [u8; 16]) -> SegmentHeader {
        SegmentHeader {
            segment_number,
            database_uuid,
        }
    }

    /// Encodes the header to its fixed 32-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&SEGMENT_MAGIC);
        buf[4..8].copy_from_slice(&SEGMENT_FORMAT_VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.segment_number.to_le_bytes());
        buf[16..32].copy_from_slice(&self.database_uuid);
        buf
    }

    /// Decodes a header, validating the magic and format version.
    pub fn from_bytes(bytes: &[u8], segment_path: &str) -> Result<SegmentHeader, Error> {
        if bytes.len() < SEGMENT_HEADER_SIZE {
            return Err(Error::CorruptWAL {
                segment: segment_path.to_string(),
                reason: "segment shorter than header size".to_string(),
            });
        }
        if bytes[0..4] != SEGMENT_MAGIC {
            return Err(Error::CorruptWAL {
                segment: segment_path.to_string(),
                reason: "bad segment magic".to_string(),
            });
        }
        let format_version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if format_version != SEGMENT_FORMAT_VERSION {
            return Err(Error::CorruptWAL {
                segment: segment_path.to_string(),
                reason: format!("unsupported segment format version {}", format_version),
            });
        }
        let segment_number = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let mut database_uuid = [0u8; 16];
        database_uuid.copy_from_slice(&bytes[16..32]);
        Ok(SegmentHeader {
            segment_number,
            database_uuid,
        })
    }
}

/// A decoded logical WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Transaction this record belongs to.
    pub tx_id: u64,
    /// Logical database name (constant within one WAL, carried for
    /// bit-exact fidelity to the framing contract).
    pub db_id: String,
    /// Collection name, empty for `Commit`/`Checkpoint` records.
    pub collection: String,
    /// Operation type.
    pub op_type: OpType,
    /// Document id, 0 for `Commit`/`Checkpoint`/collection-level records.
    pub doc_id: u64,
    /// Payload bytes, empty for non-payload-bearing ops.
    pub payload: Vec<u8>,
}

impl WalRecord {
    /// Builds a `Commit` marker record for `tx_id`.
    pub fn commit_marker(tx_id: u64) -> WalRecord {
        WalRecord {
            tx_id,
            db_id: String::new(),
            collection: String::new(),
            op_type: OpType::Commit,
            doc_id: 0,
            payload: Vec::new(),
        }
    }

    /// Builds a `Checkpoint` marker record for `tx_id`.
    pub fn checkpoint_marker(tx_id: u64) -> WalRecord {
        WalRecord {
            tx_id,
            db_id: String::new(),
            collection: String::new(),
            op_type: OpType::Checkpoint,
            doc_id: 0,
            payload: Vec::new(),
        }
    }

    /// Encodes the record body (everything covered by the trailing CRC,
    /// not including the outer length prefix or the CRC itself).
    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.db_id.len() + self.collection.len() + self.payload.len());
        buf.write_u64::<LittleEndian>(self.tx_id).unwrap();
        write_len_prefixed_str(&mut buf, &self.db_id);
        write_len_prefixed_str(&mut buf, &self.collection);
        buf.write_u8(self.op_type as u8).unwrap();
        buf.write_u64::<LittleEndian>(self.doc_id).unwrap();
        buf.write_u32::<LittleEndian>(self.payload.len() as u32).unwrap();
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decodes a record body previously produced by `encode_body`.
    pub fn decode_body(bytes: &[u8]) -> Result<WalRecord, Error> {
        let mut cursor = Cursor::new(bytes);
        let tx_id = read_u64(&mut cursor)?;
        let db_id = read_len_prefixed_str(&mut cursor)?;
        let collection = read_len_prefixed_str(&mut cursor)?;
        let op_code = read_u8(&mut cursor)?;
        let op_type = OpType::from_u8(op_code).ok_or_else(|| Error::CorruptWAL {
            segment: String::new(),
            reason: format!("unknown WAL op code {}", op_code),
        })?;
        let doc_id = read_u64(&mut cursor)?;
        let payload_len = read_u32(&mut cursor)?;
        let mut payload = vec![0u8; payload_len as usize];
        std::io::Read::read_exact(&mut cursor, &mut payload).map_err(|_| Error::CorruptWAL {
            segment: String::new(),
            reason: "truncated payload in WAL record body".to_string(),
        })?;
        Ok(WalRecord {
            tx_id,
            db_id,
            collection,
            op_type,
            doc_id,
            payload,
        })
    }
}

fn write_len_prefixed_str(buf: &mut Vec<u8>, s: &str) {
    buf.write_u32::<LittleEndian>(s.len() as u32).unwrap();
    buf.extend_from_slice(s.as_bytes());
}

fn read_len_prefixed_str(cursor: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let len = read_u32(cursor)?;
    let mut bytes = vec![0u8; len as usize];
    std::io::Read::read_exact(cursor, &mut bytes).map_err(|_| Error::CorruptWAL {
        segment: String::new(),
        reason: "truncated string in WAL record body".to_string(),
    })?;
    String::from_utf8(bytes).map_err(|_| Error::CorruptWAL {
        segment: String::new(),
        reason: "WAL record string is not valid UTF-8".to_string(),
    })
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, Error> {
    cursor.read_u64::<LittleEndian>().map_err(|_| Error::CorruptWAL {
        segment: String::new(),
        reason: "truncated u64 field in WAL record body".to_string(),
    })
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, Error> {
    cursor.read_u32::<LittleEndian>().map_err(|_| Error::CorruptWAL {
        segment: String::new(),
        reason: "truncated u32 field in WAL record body".to_string(),
    })
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    cursor.read_u8().map_err(|_| Error::CorruptWAL {
        segment: String::new(),
        reason: "truncated u8 field in WAL record body".to_string(),
    })
}

/// Fixed stride, in bytes, of a coordinator log record.
pub const COORDINATOR_RECORD_SIZE: usize = 13;

/// A 2PC coordinator decision: `tx_id: u64 LE | decision: u8 |
/// crc32_ieee(first 9 bytes): u32 LE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorRecord {
    /// Transaction this decision covers.
    pub tx_id: u64,
    /// True if the decision is to commit, false to abort.
    pub commit: bool,
}

impl CoordinatorRecord {
    /// Encodes to the fixed 13-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; COORDINATOR_RECORD_SIZE] {
        let mut buf = [0u8; COORDINATOR_RECORD_SIZE];
        buf[0..8].copy_from_slice(&self.tx_id.to_le_bytes());
        buf[8] = if self.commit { 1 } else { 0 };
        let crc = crc32fast::hash(&buf[0..9]);
        buf[9..13].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a record, validating the trailing CRC32 over the first 9
    /// bytes. Returns `None` (not an error) when the CRC does not match,
    /// since torn trailing records are a normal, silently-dropped
    /// occurrence rather than a fatal condition.
    pub fn from_bytes(bytes: &[u8; COORDINATOR_RECORD_SIZE]) -> Option<CoordinatorRecord> {
        let stored_crc = u32::from_le_bytes(bytes[9..13].try_into().unwrap());
        let actual_crc = crc32fast::hash(&bytes[0..9]);
        if stored_crc != actual_crc {
            return None;
        }
        let tx_id = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let commit = bytes[8] == 1;
        Some(CoordinatorRecord { tx_id, commit })
    }
}
