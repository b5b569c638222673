//! Binary-level configuration: a TOML file plus CLI flags, turned into the
//! explicit structs the library crates expect (spec §9's ban on global
//! mutable state — nothing below this module reads the environment or a
//! config file directly).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub ledger_path: PathBuf,
    #[serde(default)]
    pub memory_ceiling_mb: Option<u64>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config file {}", path.display()))
    }
}
