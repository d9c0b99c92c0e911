/*
 * This file is part of ferrokv.
 *
 * ferrokv is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ferrokv is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with ferrokv. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Binary snapshot format (§4.D).
//!
//! ```text
//! "REDIS" | version: u32 LE | flags: u8 | [16-byte MD5 over the payload] | payload
//! ```
//! `payload` is a bincode-encoded [`SnapshotPayload`], optionally
//! gzip-compressed per the `FLAG_COMPRESSED` bit. Written to a temporary
//! sibling path and atomically renamed into place, the way the teacher's
//! `storage` engine stages flush files before rename.

use crate::keyspace::Entry;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 5] = b"REDIS";
const VERSION: u32 = 1;
const FLAG_CHECKSUM: u8 = 0b01;
const FLAG_COMPRESSED: u8 = 0b10;

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub saved_at_unix: u64,
    pub key_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub keys: Vec<(Vec<u8>, Entry)>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug)]
pub enum SnapshotError {
    Io(String),
    BadMagic,
    UnsupportedVersion(u32),
    ChecksumMismatch,
    Decode(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "{e}"),
            SnapshotError::BadMagic => write!(f, "not a valid snapshot file"),
            SnapshotError::UnsupportedVersion(v) => write!(f, "unsupported snapshot version {v}"),
            SnapshotError::ChecksumMismatch => write!(f, "snapshot checksum mismatch"),
            SnapshotError::Decode(e) => write!(f, "failed to decode snapshot payload: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e.to_string())
    }
}

/// Write `payload` to `final_path`, staging at `temp_path` first and
/// renaming atomically on success.
pub fn save(
    payload: &SnapshotPayload,
    final_path: &Path,
    temp_path: &Path,
    compress: bool,
    checksum: bool,
) -> Result<(), SnapshotError> {
    let encoded = bincode::serialize(payload).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    let body = if compress {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&encoded)?;
        enc.finish()?
    } else {
        encoded
    };

    let mut flags = 0u8;
    if compress {
        flags |= FLAG_COMPRESSED;
    }
    if checksum {
        flags |= FLAG_CHECKSUM;
    }

    let mut out = Vec::with_capacity(5 + 4 + 1 + 16 + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(flags);
    if checksum {
        let digest = Md5::digest(&body);
        out.extend_from_slice(&digest);
    }
    out.extend_from_slice(&body);

    if let Some(parent) = temp_path.parent() {
        fs::create_dir_all(parent)?;
    }
    {
        let mut f = File::create(temp_path)?;
        f.write_all(&out)?;
        f.sync_all()?;
    }
    fs::rename(temp_path, final_path)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<SnapshotPayload, SnapshotError> {
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;

    if raw.len() < MAGIC.len() + 4 + 1 {
        return Err(SnapshotError::BadMagic);
    }
    let (magic, rest) = raw.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let (version_bytes, rest) = rest.split_at(4);
    let version = u32::from_le_bytes(version_bytes.try_into().unwrap());
    if version != VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let (flags_byte, mut rest) = rest.split_first().ok_or(SnapshotError::BadMagic)?;
    let flags = *flags_byte;

    if flags & FLAG_CHECKSUM != 0 {
        if rest.len() < 16 {
            return Err(SnapshotError::BadMagic);
        }
        let (digest, body) = rest.split_at(16);
        let computed = Md5::digest(body);
        if computed.as_slice() != digest {
            return Err(SnapshotError::ChecksumMismatch);
        }
        rest = body;
    }

    let body: Vec<u8> = if flags & FLAG_COMPRESSED != 0 {
        let mut dec = GzDecoder::new(rest);
        let mut out = Vec::new();
        dec.read_to_end(&mut out)?;
        out
    } else {
        rest.to_vec()
    };

    bincode::deserialize(&body).map_err(|e| SnapshotError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::Kind;
    use std::process;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ferrokv-snapshot-{name}-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_payload() -> SnapshotPayload {
        SnapshotPayload {
            keys: vec![(
                b"foo".to_vec(),
                Entry {
                    value: crate::keyspace::Value::Str(b"bar".to_vec()),
                    kind: Kind::Str,
                    expiry_at: None,
                },
            )],
            metadata: SnapshotMetadata { saved_at_unix: 0, key_count: 1 },
        }
    }

    #[test]
    fn roundtrip_uncompressed_unchecked() {
        let dir = scratch_dir("plain");
        let final_path = dir.join("dump.rdb");
        let temp_path = dir.join("temp.rdb");
        let payload = sample_payload();
        save(&payload, &final_path, &temp_path, false, false).unwrap();
        let loaded = load(&final_path).unwrap();
        assert_eq!(loaded.keys.len(), 1);
        assert_eq!(loaded.keys[0].0, b"foo");
    }

    #[test]
    fn roundtrip_compressed_checksummed() {
        let dir = scratch_dir("gz-ck");
        let final_path = dir.join("dump.rdb");
        let temp_path = dir.join("temp.rdb");
        let payload = sample_payload();
        save(&payload, &final_path, &temp_path, true, true).unwrap();
        let loaded = load(&final_path).unwrap();
        assert_eq!(loaded.keys.len(), 1);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let dir = scratch_dir("corrupt");
        let final_path = dir.join("dump.rdb");
        let temp_path = dir.join("temp.rdb");
        save(&sample_payload(), &final_path, &temp_path, false, true).unwrap();
        let mut raw = fs::read(&final_path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        fs::write(&final_path, raw).unwrap();
        assert!(matches!(load(&final_path), Err(SnapshotError::ChecksumMismatch)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = scratch_dir("badmagic");
        let path = dir.join("not-a-snapshot");
        fs::write(&path, b"not a snapshot at all").unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::BadMagic)));
    }
}
