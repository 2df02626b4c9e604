//! Checkpoint state for resumable sweeps.
//!
//! - The checkpoint records the next unvisited grid index and the counters at
//!   that point; every recorded state is consistent with the CSV on disk
//! - State is persisted atomically (write-then-rename) with a backup copy
//! - A checkpoint only applies to the parameter space and CSV it was made for

use crate::models::{ParameterSpace, Result, RunCounters, SweepError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CHECKPOINT_FILE: &str = ".handsweep-checkpoint.json";
const BACKUP_FILE: &str = ".handsweep-checkpoint.backup.json";
const TEMP_FILE: &str = ".handsweep-checkpoint.tmp.json";

/// Persisted progress of one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepCheckpoint {
    /// Space being swept
    pub space: ParameterSpace,
    /// CSV file the samples go to
    pub csv_file: String,
    /// Next grid index to visit
    pub next_index: u64,
    /// Counters after `next_index` points
    pub counters: RunCounters,
    /// Grid size
    pub total: u64,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl SweepCheckpoint {
    pub fn new(space: ParameterSpace, csv_file: &str) -> Self {
        let now = Utc::now();
        Self {
            total: space.total_points(),
            space,
            csv_file: csv_file.to_string(),
            next_index: 0,
            counters: RunCounters::default(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Fail unless this checkpoint was made for `space` and `csv_file`.
    pub fn ensure_matches(&self, space: &ParameterSpace, csv_file: &str) -> Result<()> {
        if self.csv_file != csv_file {
            return Err(SweepError::CheckpointMismatch(format!(
                "checkpoint is for '{}', run writes '{}'",
                self.csv_file, csv_file
            )));
        }
        if &self.space != space {
            return Err(SweepError::CheckpointMismatch(
                "parameter ranges changed since the checkpoint".to_string(),
            ));
        }
        Ok(())
    }

    /// Update progress.
    pub fn record(&mut self, next_index: u64, counters: RunCounters) {
        self.next_index = next_index;
        self.counters = counters;
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.total
    }

    /// Get progress percentage.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.next_index as f64 / self.total as f64) * 100.0
    }
}

/// Checkpoint manager for persisting and loading checkpoint state.
pub struct CheckpointManager {
    /// Directory for checkpoint files
    dir: PathBuf,
    /// Path to main checkpoint file
    checkpoint_path: PathBuf,
    /// Path to backup file
    backup_path: PathBuf,
    /// Current state
    state: Option<SweepCheckpoint>,
}

impl CheckpointManager {
    /// Create a new checkpoint manager.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| SweepError::io("creating checkpoint dir", e))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            checkpoint_path: dir.join(CHECKPOINT_FILE),
            backup_path: dir.join(BACKUP_FILE),
            state: None,
        })
    }

    /// Check if a checkpoint exists.
    pub fn exists(&self) -> bool {
        self.checkpoint_path.exists() || self.backup_path.exists()
    }

    /// Start tracking a fresh run. Nothing is written until the first save.
    pub fn start(&mut self, space: ParameterSpace, csv_file: &str) -> &SweepCheckpoint {
        if self.exists() {
            warn!(dir = %self.dir.display(), "Overwriting existing checkpoint");
        }
        self.state.insert(SweepCheckpoint::new(space, csv_file))
    }

    /// Load checkpoint from disk, falling back to the backup copy.
    pub fn load(&mut self) -> Result<&SweepCheckpoint> {
        let state = match Self::read(&self.checkpoint_path) {
            Ok(state) => state,
            Err(e) if self.backup_path.exists() => {
                warn!(error = %e, "Checkpoint unreadable, using backup");
                Self::read(&self.backup_path)?
            }
            Err(e) => return Err(e),
        };

        info!(
            next_index = state.next_index,
            total = state.total,
            valid = state.counters.valid,
            progress = format!("{:.1}%", state.progress_percent()),
            "Loaded checkpoint"
        );
        let state: &SweepCheckpoint = self.state.insert(state);
        Ok(state)
    }

    fn read(path: &Path) -> Result<SweepCheckpoint> {
        let file = File::open(path).map_err(|e| SweepError::io("opening checkpoint", e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| SweepError::ParseError(format!("Invalid checkpoint: {e}")))
    }

    /// Record progress and save.
    pub fn record(&mut self, next_index: u64, counters: RunCounters) -> Result<()> {
        if let Some(state) = &mut self.state {
            state.record(next_index, counters);
        }
        self.save()
    }

    /// Save checkpoint to disk (atomic write).
    pub fn save(&self) -> Result<()> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| SweepError::Internal("No checkpoint state to save".to_string()))?;

        // Backup existing checkpoint
        if self.checkpoint_path.exists() {
            fs::copy(&self.checkpoint_path, &self.backup_path)
                .map_err(|e| SweepError::io("backing up checkpoint", e))?;
        }

        // Write to temp file
        let temp_path = self.dir.join(TEMP_FILE);
        let file =
            File::create(&temp_path).map_err(|e| SweepError::io("creating temp checkpoint", e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, state)
            .map_err(|e| SweepError::Internal(format!("Serializing checkpoint: {e}")))?;
        writer
            .flush()
            .map_err(|e| SweepError::io("flushing temp checkpoint", e))?;
        drop(writer);

        // Atomic rename
        fs::rename(&temp_path, &self.checkpoint_path)
            .map_err(|e| SweepError::io("renaming checkpoint", e))?;

        debug!(next_index = state.next_index, "Checkpoint saved");
        Ok(())
    }

    /// Remove the checkpoint files after a completed run.
    pub fn clear(&mut self) -> Result<()> {
        for path in [&self.checkpoint_path, &self.backup_path] {
            if path.exists() {
                fs::remove_file(path).map_err(|e| SweepError::io("removing checkpoint", e))?;
            }
        }
        self.state = None;
        debug!("Checkpoint cleared");
        Ok(())
    }

    /// Get reference to state.
    pub fn state(&self) -> Option<&SweepCheckpoint> {
        self.state.as_ref()
    }
}
