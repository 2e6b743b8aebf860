//! Deletes WAL segments that recovery will never need again: those
//! strictly before the most recent checkpoint's segment, excluding the
//! configured number of most recent segments (a retention floor kept
//! regardless of checkpoint position).

use docdb_core::Error;
use std::fs;
use std::path::{Path, PathBuf};

const SEGMENT_PREFIX: &str = "wal-";
const SEGMENT_SUFFIX: &str = ".seg";

/// Deletes superseded WAL segments.
#[derive(Debug, Clone, Copy)]
pub struct WalTrimmer {
    keep_segments: usize,
}

impl WalTrimmer {
    /// Builds a trimmer that always retains at least `keep_segments`
    /// most-recent segments.
    pub fn new(keep_segments: usize) -> WalTrimmer {
        WalTrimmer { keep_segments }
    }

    /// Deletes segments in `segments` (ascending order by sequence
    /// number) that are strictly before `checkpoint_segment_number` and
    /// outside the retained tail. Returns the paths actually deleted.
    pub fn trim(
        &self,
        segments: &[PathBuf],
        checkpoint_segment_number: u64,
    ) -> Result<Vec<PathBuf>, Error> {
        if segments.len() <= self.keep_segments {
            return Ok(Vec::new());
        }
        let protected_from = segments.len() - self.keep_segments;
        let mut deleted = Vec::new();
        for (i, path) in segments.iter().enumerate() {
            if i >= protected_from {
                break;
            }
            let Some(number) = segment_number_of(path) else {
                continue;
            };
            if number < checkpoint_segment_number {
                fs::remove_file(path).map_err(|source| Error::FileWrite {
                    path: path.display().to_string(),
                    source,
                })?;
                deleted.push(path.clone());
            }
        }
        Ok(deleted)
    }
}

fn segment_number_of(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_string_lossy();
    name.strip_prefix(SEGMENT_PREFIX)
        .and_then(|s| s.strip_suffix(SEGMENT_SUFFIX))
        .and_then(|s| s.parse::<u64>().ok())
}
