//! On-disk persistence for the keyword index.
//!
//! The artifact is a single blob: a fixed header (magic, format version,
//! CRC32 of the payload) followed by the bincode-encoded index. The
//! checksum catches truncated or corrupted files before deserialization;
//! the version gates future format changes. A loaded index produces
//! byte-for-byte identical search results to the instance it was saved
//! from.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ArnikaError, Result};
use crate::keyword::index::KeywordIndex;

/// Magic bytes identifying a keyword index artifact.
const MAGIC: &[u8; 4] = b"ARNK";

/// Current artifact format version.
const FORMAT_VERSION: u32 = 1;

/// Payload wrapper carrying the index plus build provenance.
#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    /// Unix timestamp (seconds) of when the artifact was written.
    built_at: i64,
    index: KeywordIndex,
}

/// Save an index to disk, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ArnikaError::Storage`] on encoding failures and
/// [`ArnikaError::Io`] on filesystem failures.
pub fn save(index: &KeywordIndex, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let artifact = IndexArtifact {
        built_at: Utc::now().timestamp(),
        index: index.clone(),
    };
    let payload = bincode::serialize(&artifact)
        .map_err(|e| ArnikaError::storage(format!("failed to encode index: {e}")))?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&payload);
    let checksum = hasher.finalize();

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    writer.write_u32::<LittleEndian>(checksum)?;
    writer.write_u64::<LittleEndian>(payload.len() as u64)?;
    writer.write_all(&payload)?;
    writer.flush()?;

    tracing::info!(path = %path.display(), docs = index.doc_count(), "keyword index saved");
    Ok(())
}

/// Load an index from disk, verifying magic, version, and checksum.
///
/// # Errors
///
/// Returns [`ArnikaError::Storage`] when the file is not a valid artifact
/// (wrong magic, unsupported version, checksum mismatch, decode failure)
/// and [`ArnikaError::Io`] on filesystem failures.
pub fn load(path: impl AsRef<Path>) -> Result<KeywordIndex> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(ArnikaError::storage(format!(
            "not a keyword index artifact: {}",
            path.display()
        )));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(ArnikaError::storage(format!(
            "unsupported artifact version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let expected_checksum = reader.read_u32::<LittleEndian>()?;
    let payload_len = reader.read_u64::<LittleEndian>()? as usize;
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&payload);
    if hasher.finalize() != expected_checksum {
        return Err(ArnikaError::storage(format!(
            "checksum mismatch in {}",
            path.display()
        )));
    }

    let artifact: IndexArtifact = bincode::deserialize(&payload)
        .map_err(|e| ArnikaError::storage(format!("failed to decode index: {e}")))?;

    tracing::info!(
        path = %path.display(),
        docs = artifact.index.doc_count(),
        built_at = artifact.built_at,
        "keyword index loaded"
    );
    Ok(artifact.index)
}
