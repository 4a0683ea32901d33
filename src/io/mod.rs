//! File I/O for drainage runs.
//!
//! This module provides JSON reading and writing of run configurations and
//! the snapshot export used while a run is in progress.

pub mod config;
pub mod snapshot;

pub use config::{read_config, write_config};
pub use snapshot::{
    FullFields, JsonSnapshotExporter, Snapshot, SnapshotExporter, SnapshotKind, read_snapshot,
};
