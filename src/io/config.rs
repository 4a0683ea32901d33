//! JSON files for [`DrainageConfig`].
//!
//! Missing fields fall back to their defaults, so a minimal file only needs
//! the injection rate.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::drainage::DrainageConfig;

/// Writes a drainage configuration to a JSON file.
///
/// # Example
/// ```no_run
/// use porenet::drainage::DrainageConfig;
/// use porenet::io::write_config;
/// use std::path::Path;
///
/// let config = DrainageConfig::with_injection_rate(1.0e-12);
/// write_config(Path::new("drainage.json"), &config).unwrap();
/// ```
pub fn write_config(path: &Path, config: &DrainageConfig) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, config)
        .with_context(|| format!("Failed to serialize config to: {}", path.display()))?;

    Ok(())
}

/// Reads a drainage configuration from a JSON file.
pub fn read_config(path: &Path) -> Result<DrainageConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let config: DrainageConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize config from: {}", path.display()))?;

    Ok(config)
}

pub fn to_config_string(config: &DrainageConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("Failed to serialize config to string")
}

pub fn from_config_string(json: &str) -> Result<DrainageConfig> {
    serde_json::from_str(json).context("Failed to deserialize config from string")
}
