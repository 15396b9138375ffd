//! Dataset artifacts on disk.
//!
//! Layout: `bincode(ArtifactPersist) || crc32(le)`. Writers publish through a
//! temporary file and `rename`, so readers see either no artifact or a
//! complete one. Readers verify checksum, magic, version, identity and shape;
//! any failure is reported as [`Error::CacheCorrupt`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use gp_core::{Error, Result};
use gp_prob::DistributionParams;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::samples::SampleArray;
use crate::GeneratedData;

/// Magic number for dataset artifacts ("GPDS").
const ARTIFACT_MAGIC: u32 = 0x4750_4453;

/// Current artifact format version.
const ARTIFACT_VERSION: u16 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    magic: u32,
    version: u16,
    data_name: &'a str,
    fingerprint: &'a str,
    null: &'a SampleArray,
    alter: &'a SampleArray,
    alter_params: &'a [DistributionParams],
}

#[derive(Deserialize)]
struct ArtifactPersist {
    magic: u32,
    version: u16,
    data_name: String,
    fingerprint: String,
    null: SampleArray,
    alter: SampleArray,
    alter_params: Vec<DistributionParams>,
}

/// Identity and geometry an artifact must match to be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey<'a> {
    /// Dataset name (`GMM`, `MVN`).
    pub data_name: &'a str,
    /// Configuration fingerprint.
    pub fingerprint: &'a str,
    /// `[num_trials, num_samples, dim]`.
    pub shape: [usize; 3],
}

fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
    Error::CacheCorrupt { path: path.to_path_buf(), reason: reason.into() }
}

/// Persist generated data under `path`.
pub fn save(path: &Path, key: &ArtifactKey<'_>, data: &GeneratedData) -> Result<()> {
    let persist = ArtifactRef {
        magic: ARTIFACT_MAGIC,
        version: ARTIFACT_VERSION,
        data_name: key.data_name,
        fingerprint: key.fingerprint,
        null: &data.null,
        alter: &data.alter,
        alter_params: &data.alter_params,
    };
    let bytes = bincode::serialize(&persist).map_err(|e| Error::Serialization(e.to_string()))?;
    let checksum = crc32fast::hash(&bytes);

    // Each writer stages its own uniquely named file; concurrent writers of the
    // same artifact each publish a complete copy and the last rename wins.
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer.write_all(&bytes)?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    log::debug!("wrote dataset artifact {} ({} bytes)", path.display(), bytes.len() + 4);
    Ok(())
}

/// Load and verify an artifact.
pub fn load(path: &Path, key: &ArtifactKey<'_>) -> Result<GeneratedData> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() < 4 {
        return Err(corrupt(path, "artifact too small"));
    }
    let (body, tail) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(corrupt(
            path,
            format!("checksum mismatch: stored {stored:08x}, computed {computed:08x}"),
        ));
    }

    let persist: ArtifactPersist = bincode::deserialize(body)
        .map_err(|e| corrupt(path, format!("undecodable artifact: {e}")))?;

    if persist.magic != ARTIFACT_MAGIC {
        return Err(corrupt(path, format!("invalid magic number {:08x}", persist.magic)));
    }
    if persist.version != ARTIFACT_VERSION {
        return Err(corrupt(
            path,
            format!("unsupported version {} (expected {ARTIFACT_VERSION})", persist.version),
        ));
    }
    if persist.data_name != key.data_name || persist.fingerprint != key.fingerprint {
        return Err(corrupt(
            path,
            format!(
                "artifact belongs to {}_{}, expected {}_{}",
                persist.data_name, persist.fingerprint, key.data_name, key.fingerprint
            ),
        ));
    }
    for (label, arr) in [("null", &persist.null), ("alter", &persist.alter)] {
        if arr.shape() != key.shape {
            return Err(corrupt(
                path,
                format!("{label} shape {:?}, expected {:?}", arr.shape(), key.shape),
            ));
        }
        if arr.as_slice().len() != key.shape.iter().product::<usize>() {
            return Err(corrupt(path, format!("{label} buffer length disagrees with shape")));
        }
    }
    if persist.alter_params.len() != key.shape[0] {
        return Err(corrupt(
            path,
            format!(
                "{} alternative parameter sets for {} trials",
                persist.alter_params.len(),
                key.shape[0]
            ),
        ));
    }
    if let Some(i) = persist.alter_params.iter().position(|p| p.dim() != key.shape[2]) {
        return Err(corrupt(path, format!("alternative parameters of trial {i} have wrong dimension")));
    }

    Ok(GeneratedData { null: persist.null, alter: persist.alter, alter_params: persist.alter_params })
}
