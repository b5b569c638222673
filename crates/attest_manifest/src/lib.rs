//! Evidence Manifest model (spec §3 "Evidence Manifest Entry", §4.3).
//!
//! A Manifest entry is created once by the external ingestor and is
//! immutable for the lifetime of this process: the compiler and engine only
//! ever read it. Grounded on the teacher's `LockedSchema` (immutable,
//! content-hashed, created once and referenced by hash everywhere after).

use attest_protocol::{DatasetAlias, LogicalType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metadata about where a dataset's evidence originated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub origin_system: String,
    pub extraction_instant: DateTime<Utc>,
    pub schema_version: String,
}

/// An immutable, per-dataset columnar file descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    alias: DatasetAlias,
    path: PathBuf,
    content_hash: String,
    row_count: u64,
    columns: Vec<(String, LogicalType)>,
    source: SourceMetadata,
}

impl ManifestEntry {
    /// Build an entry from an already-known content hash (the common path:
    /// the ingestor hashed the file once and hands the manifest the digest).
    pub fn new(
        alias: DatasetAlias,
        path: impl Into<PathBuf>,
        content_hash: impl Into<String>,
        row_count: u64,
        columns: Vec<(String, LogicalType)>,
        source: SourceMetadata,
    ) -> Self {
        Self {
            alias,
            path: path.into(),
            content_hash: content_hash.into(),
            row_count,
            columns,
            source,
        }
    }

    /// Build an entry by hashing the file at `path` with SHA-256, producing
    /// the fixed-width hex digest spec §3 requires.
    pub fn from_file(
        alias: DatasetAlias,
        path: impl AsRef<Path>,
        row_count: u64,
        columns: Vec<(String, LogicalType)>,
        source: SourceMetadata,
    ) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ManifestError::UnreadableFile(path.to_path_buf(), e.to_string()))?;
        let hash = hash_bytes(&bytes);
        Ok(Self::new(alias, path, hash, row_count, columns, source))
    }

    pub fn alias(&self) -> &DatasetAlias {
        &self.alias
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn columns(&self) -> &[(String, LogicalType)] {
        &self.columns
    }

    pub fn source(&self) -> &SourceMetadata {
        &self.source
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(c, _)| c == name)
    }

    pub fn column_type(&self, name: &str) -> Option<LogicalType> {
        self.columns
            .iter()
            .find(|(c, _)| c == name)
            .map(|(_, ty)| *ty)
    }
}

/// Errors raised while building or reading a Manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("duplicate dataset alias: {0}")]
    DuplicateAlias(String),
    #[error("could not read evidence file '{0}': {1}")]
    UnreadableFile(PathBuf, String),
    #[error("unknown dataset alias: {0}")]
    UnknownAlias(String),
}

/// The Evidence Manifest: the compiler's and engine's read-only view onto
/// the set of datasets available for a control (spec §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    entries: HashMap<DatasetAlias, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest from entries, rejecting duplicate aliases.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Result<Self, ManifestError> {
        let mut manifest = Manifest::new();
        for entry in entries {
            manifest.insert(entry)?;
        }
        Ok(manifest)
    }

    pub fn insert(&mut self, entry: ManifestEntry) -> Result<(), ManifestError> {
        if self.entries.contains_key(&entry.alias) {
            return Err(ManifestError::DuplicateAlias(entry.alias.to_string()));
        }
        self.entries.insert(entry.alias.clone(), entry);
        Ok(())
    }

    pub fn aliases(&self) -> Vec<&DatasetAlias> {
        let mut a: Vec<&DatasetAlias> = self.entries.keys().collect();
        a.sort();
        a
    }

    pub fn entry(&self, alias: &DatasetAlias) -> Option<&ManifestEntry> {
        self.entries.get(alias)
    }

    pub fn path_of(&self, alias: &DatasetAlias) -> Result<&Path, ManifestError> {
        self.entry(alias)
            .map(ManifestEntry::path)
            .ok_or_else(|| ManifestError::UnknownAlias(alias.to_string()))
    }

    pub fn hash_of(&self, alias: &DatasetAlias) -> Result<&str, ManifestError> {
        self.entry(alias)
            .map(ManifestEntry::content_hash)
            .ok_or_else(|| ManifestError::UnknownAlias(alias.to_string()))
    }

    pub fn row_count_of(&self, alias: &DatasetAlias) -> Result<u64, ManifestError> {
        self.entry(alias)
            .map(ManifestEntry::row_count)
            .ok_or_else(|| ManifestError::UnknownAlias(alias.to_string()))
    }

    pub fn columns_of(&self, alias: &DatasetAlias) -> Result<&[(String, LogicalType)], ManifestError> {
        self.entry(alias)
            .map(ManifestEntry::columns)
            .ok_or_else(|| ManifestError::UnknownAlias(alias.to_string()))
    }

    pub fn contains(&self, alias: &DatasetAlias) -> bool {
        self.entries.contains_key(alias)
    }

    /// Snapshot of `alias -> content_hash` for every dataset, used by the
    /// execution engine to populate `manifest_hashes` on a report.
    pub fn hash_snapshot(&self) -> HashMap<DatasetAlias, String> {
        self.entries
            .iter()
            .map(|(alias, entry)| (alias.clone(), entry.content_hash.clone()))
            .collect()
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
