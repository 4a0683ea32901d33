//! Periodic snapshots of the phase distribution.
//!
//! A lightweight snapshot carries the pore and throat invasion fractions; a
//! full one adds the pressure field, element flags and meniscus positions.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::uid::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Light,
    Full,
}

/// Fields only present in [`SnapshotKind::Full`] snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullFields {
    pub pore_pressure: Vec<f64>,
    pub pore_invaded: Vec<bool>,
    pub pore_contested: Vec<bool>,
    pub throat_contested: Vec<bool>,
    pub throat_menisci: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_id: RunId,
    pub network: String,
    pub kind: SnapshotKind,
    pub step: usize,
    pub time: f64,
    pub pore_inv_frac: Vec<f64>,
    pub throat_inv_frac: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<FullFields>,
}

/// Destination for snapshots taken during a run.
///
/// Errors returned here are logged by the caller and never stop a run.
pub trait SnapshotExporter {
    fn export(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Writes snapshots as JSON files into a directory.
///
/// Lightweight snapshots overwrite `<network>_<run>_latest.json`; every full
/// snapshot gets its own `<network>_<run>_<step>.json`.
#[derive(Debug, Clone)]
pub struct JsonSnapshotExporter {
    dir: PathBuf,
}

impl JsonSnapshotExporter {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create snapshot directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, snapshot: &Snapshot) -> PathBuf {
        let stem = format!("{}_{}", snapshot.network, snapshot.run_id.short());
        match snapshot.kind {
            SnapshotKind::Light => self.dir.join(format!("{stem}_latest.json")),
            SnapshotKind::Full => self.dir.join(format!("{stem}_{:07}.json", snapshot.step)),
        }
    }
}

impl SnapshotExporter for JsonSnapshotExporter {
    fn export(&mut self, snapshot: &Snapshot) -> Result<()> {
        write_snapshot(&self.path_for(snapshot), snapshot)
    }
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), snapshot)
        .with_context(|| format!("Failed to serialize snapshot to: {}", path.display()))
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to deserialize snapshot from: {}", path.display()))
}
