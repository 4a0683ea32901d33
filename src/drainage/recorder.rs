//! Per-step statistics and the plain-text run log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Statistics of one completed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    /// Simulated time at the end of the step in s.
    pub time: f64,
    pub dt: f64,
    /// Mean pressure over the inlet pores in Pa. Outlets sit at 0.
    pub inlet_pressure: f64,
    /// Invading phase volume over total void volume.
    pub saturation: f64,
    /// Mass-balance residual normalized by total void volume.
    pub mass_residual: f64,
    /// Volumes that left through the outlets during the step.
    pub invading_out: f64,
    pub defending_out: f64,
    /// Volume injected during the step.
    pub injected: f64,
    pub zero_dt_steps: usize,
}

/// Human-readable run log, one line per step.
///
/// Writing is best-effort: failures are reported through `log::warn!` and the
/// log disables itself rather than interrupting the run.
#[derive(Debug, Default)]
pub struct StepLog {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl StepLog {
    /// Log that writes nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates (or truncates) the log at `path`.
    pub fn create(path: &Path) -> Self {
        Self::open_best_effort(path, false)
    }

    /// Opens the log at `path` for appending, creating it if needed.
    pub fn append(path: &Path) -> Self {
        Self::open_best_effort(path, true)
    }

    fn open_best_effort(path: &Path, append: bool) -> Self {
        match open(path, append) {
            Ok(file) => Self {
                path: Some(path.to_path_buf()),
                writer: Some(BufWriter::new(file)),
            },
            Err(e) => {
                log::warn!("Step log disabled: {e:#}");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes a free-form line.
    pub fn message(&mut self, line: &str) {
        let result = match self.writer.as_mut() {
            Some(w) => writeln!(w, "{line}"),
            None => return,
        };
        self.check(result);
    }

    /// Writes the column header for [`StepLog::record`] lines.
    pub fn header(&mut self) {
        self.message("step time dt inlet_pressure saturation mass_residual invading_out defending_out injected zero_dt");
    }

    pub fn record(&mut self, r: &StepRecord) {
        self.message(&format!(
            "{} {:.6e} {:.6e} {:.6e} {:.6} {:.3e} {:.6e} {:.6e} {:.6e} {}",
            r.step,
            r.time,
            r.dt,
            r.inlet_pressure,
            r.saturation,
            r.mass_residual,
            r.invading_out,
            r.defending_out,
            r.injected,
            r.zero_dt_steps,
        ));
    }

    pub fn flush(&mut self) {
        let result = match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => return,
        };
        self.check(result);
    }

    fn check(&mut self, result: std::io::Result<()>) {
        if let Err(e) = result {
            log::warn!("Failed to write step log, disabling it: {e}");
            self.writer = None;
        }
    }
}

impl Drop for StepLog {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open(path: &Path, append: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options
        .open(path)
        .with_context(|| format!("Failed to open step log: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(step: usize) -> StepRecord {
        StepRecord {
            step,
            time: 1.0,
            dt: 0.5,
            inlet_pressure: 10.0,
            saturation: 0.25,
            mass_residual: 0.0,
            invading_out: 0.0,
            defending_out: 0.5,
            injected: 0.5,
            zero_dt_steps: 0,
        }
    }

    #[test]
    fn test_create_truncates_and_append_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        {
            let mut log = StepLog::create(&path);
            log.header();
            log.record(&sample(1));
        }
        {
            let mut log = StepLog::append(&path);
            log.record(&sample(2));
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(2).unwrap().starts_with("2 "));

        {
            let mut log = StepLog::create(&path);
            log.message("fresh");
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_unopenable_path_disables_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("run.log");
        let mut log = StepLog::create(&path);
        assert!(!log.is_enabled());
        log.record(&sample(1));
        assert!(!path.exists());
    }
}
