//! On-disk snapshot of an approximate index.
//!
//! One file, [`SNAPSHOT_FILE`], inside the configured directory:
//!
//! ```text
//! +-------+------------------+--------------------------------------+
//! | BIX1  | blake3(payload)  | payload (bincode, serde, standard)   |
//! | 4 B   | 32 B             | version, dimension, (id, vector)...  |
//! +-------+------------------+--------------------------------------+
//! ```
//!
//! The graph itself is not stored; it is rebuilt from the vectors on load.
//! Writes go through a temp file in the same directory and an atomic rename.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::*;

use crate::error::{IndexError, Result};
use crate::index::BehaviorId;

/// Fixed name of the snapshot inside the persistence directory.
pub const SNAPSHOT_FILE: &str = "behaviors.hnsw";

const MAGIC: &[u8; 4] = b"BIX1";
const DIGEST_LEN: usize = 32;
const FORMAT_VERSION: u32 = 1;

/// Persisted contents of an approximate index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub dimension: Option<usize>,
    pub entries: Vec<(BehaviorId, Vec<f32>)>,
}

impl Snapshot {
    pub fn new(dimension: Option<usize>, entries: Vec<(BehaviorId, Vec<f32>)>) -> Self {
        Self {
            version: FORMAT_VERSION,
            dimension,
            entries,
        }
    }
}

/// Path of the snapshot file inside `dir`.
pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// `true` if `dir` holds a snapshot file.
pub fn exists(dir: &Path) -> bool {
    snapshot_path(dir).is_file()
}

/// Serialize `snapshot` into the framed byte layout.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())
        .map_err(|e| IndexError::Snapshot(format!("encode failed: {e}")))?;
    let digest = blake3::hash(&payload);

    let mut bytes = Vec::with_capacity(MAGIC.len() + DIGEST_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(digest.as_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Parse and verify the framed byte layout.
///
/// # Errors
/// [`IndexError::Snapshot`] on a bad magic, digest mismatch, unknown version,
/// or undecodable payload.
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let header = MAGIC.len() + DIGEST_LEN;
    if bytes.len() < header || &bytes[..MAGIC.len()] != MAGIC {
        return Err(IndexError::Snapshot("not a behavior index snapshot".into()));
    }
    let (digest, payload) = bytes[MAGIC.len()..].split_at(DIGEST_LEN);
    if blake3::hash(payload).as_bytes() != digest {
        return Err(IndexError::Snapshot("checksum mismatch".into()));
    }

    let (snapshot, _): (Snapshot, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| IndexError::Snapshot(format!("decode failed: {e}")))?;
    if snapshot.version != FORMAT_VERSION {
        return Err(IndexError::Snapshot(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    Ok(snapshot)
}

/// Atomically write `snapshot` to `dir/SNAPSHOT_FILE`.
pub fn write(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = encode(snapshot)?;
    let path = snapshot_path(dir);

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;

    info!(
        path = %path.display(),
        entries = snapshot.entries.len(),
        bytes = bytes.len(),
        "snapshot written"
    );
    Ok(())
}

/// Read and verify `dir/SNAPSHOT_FILE`.
pub fn read(dir: &Path) -> Result<Snapshot> {
    let path = snapshot_path(dir);
    let bytes = fs::read(&path)?;
    let snapshot = decode(&bytes)?;
    debug!(path = %path.display(), entries = snapshot.entries.len(), "snapshot read");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        Snapshot::new(
            Some(3),
            vec![
                ("b1".into(), vec![1.0, 0.0, 0.0]),
                ("b2".into(), vec![0.0, 1.0, 0.0]),
            ],
        )
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        assert!(!exists(dir.path()));
        write(dir.path(), &sample()).unwrap();
        assert!(exists(dir.path()));
        assert_eq!(read(dir.path()).unwrap(), sample());
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        write(dir.path(), &sample()).unwrap();
        let smaller = Snapshot::new(Some(3), vec![("b9".into(), vec![0.0, 0.0, 1.0])]);
        write(dir.path(), &smaller).unwrap();
        assert_eq!(read(dir.path()).unwrap(), smaller);
        // only the snapshot remains; temp files were renamed away
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = encode(&sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_foreign_file_rejected() {
        assert!(decode(b"hello world").is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut snap = sample();
        snap.version = 99;
        let bytes = encode(&snap).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }
}
