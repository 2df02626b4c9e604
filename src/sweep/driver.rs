//! Sweep driver: enumerates the grid, applies it to the rig, filters by
//! validity and forwards accepted samples to the sink.
//!
//! Flow per grid point:
//! push changed joints → count → report progress → yield → check cancel →
//! validity → sample → write
//!
//! The driver yields to the tokio scheduler once per grid point so that
//! progress rendering and cancellation are observed between points, never in
//! the middle of a joint assignment.

use crate::checkpoint::CheckpointManager;
use crate::models::{Config, ParameterSpace, Result, RunCounters, RunOutcome, RunSummary};
use crate::output::SampleWriter;
use crate::rig::Rig;
use crate::sweep::GridIterator;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Cooperative cancellation flag shared with the running sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed at the next grid-point boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Where and how a generator writes.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Output folder for the CSV and images
    pub folder: PathBuf,
    /// CSV file name inside `folder`
    pub csv_file: String,
    /// Save a checkpoint every N grid points (0 disables)
    pub checkpoint_interval: u64,
    /// Resume from an existing checkpoint
    pub resume: bool,
}

impl GeneratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            folder: config.output_folder(),
            csv_file: config.output.csv_file.clone(),
            checkpoint_interval: config.output.checkpoint_interval,
            resume: config.output.resume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Write samples for accepted points
    Generate,
    /// Count accepted points, write nothing
    Search,
}

/// Progress that is consistent with what is on disk.
#[derive(Debug, Clone, Copy)]
struct Settled {
    next_index: u64,
    counters: RunCounters,
}

/// Drives the rig through a parameter sweep.
pub struct DatasetGenerator {
    rig: Rig,
    settings: GeneratorSettings,
    cancel: CancelHandle,
}

impl DatasetGenerator {
    pub fn new(rig: Rig, settings: GeneratorSettings) -> Self {
        Self {
            rig,
            settings,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle that can stop a run from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn rig_mut(&mut self) -> &mut Rig {
        &mut self.rig
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Sweep the panel's parameter space and write every accepted sample.
    ///
    /// Returns `Ok(None)` without touching any file when the panel cannot
    /// supply a parameter space.
    pub async fn start_generating(&mut self) -> Result<Option<RunSummary>> {
        let Some(space) = self.rig.panel.pack_parameters() else {
            return Ok(None);
        };
        self.run(space, Mode::Generate).await.map(Some)
    }

    /// Dry run over the panel's space: counts accepted points, writes nothing.
    pub async fn search_generating_dataset(&mut self) -> Result<Option<RunSummary>> {
        let Some(space) = self.rig.panel.pack_parameters() else {
            return Ok(None);
        };
        self.run(space, Mode::Search).await.map(Some)
    }

    /// Request cancellation of the run in flight.
    pub fn stop_cancel_generating(&self) {
        info!("Stop requested");
        self.cancel.cancel();
    }

    /// Capture one sample of the current joint configuration.
    ///
    /// Returns `Ok(false)` when the configuration is not valid.
    pub fn save_single_image(&mut self) -> Result<bool> {
        if !self.rig.is_valid() {
            warn!("Current configuration is not valid, nothing saved");
            return Ok(false);
        }

        let sample = self.rig.sample()?;
        let header = self.rig.stream.header();
        let mut writer =
            SampleWriter::open(&self.settings.folder, &self.settings.csv_file, &header)?;
        writer.write_sample(&sample)?;
        writer.close()?;

        info!(image = %sample.image_name, "Saved single sample");
        Ok(true)
    }

    async fn run(&mut self, space: ParameterSpace, mode: Mode) -> Result<RunSummary> {
        self.cancel.reset();
        let start = Instant::now();
        let total = space.total_points();

        let mut checkpoint = self.prepare_checkpoint(&space, mode)?;
        let mut settled = Settled {
            next_index: 0,
            counters: RunCounters::default(),
        };
        if let Some(state) = checkpoint.as_ref().and_then(|c| c.state()) {
            settled.next_index = state.next_index;
            settled.counters = state.counters;
        }

        info!(
            mode = ?mode,
            total,
            resume_at = settled.next_index,
            folder = %self.settings.folder.display(),
            "Start generating"
        );
        self.rig.panel.report_total(total);
        if settled.counters.current > 0 {
            self.rig.panel.report_progress(settled.counters.current);
        }

        let mut writer = match mode {
            Mode::Generate => Some(SampleWriter::open(
                &self.settings.folder,
                &self.settings.csv_file,
                &self.rig.stream.header(),
            )?),
            Mode::Search => None,
        };

        let mut counters = settled.counters;
        let swept = self
            .sweep(
                &space,
                &mut counters,
                &mut settled,
                writer.as_mut(),
                checkpoint.as_mut(),
            )
            .await;

        let written = writer.as_ref().map_or(0, SampleWriter::lines_written);

        // Flush and close before anything else, whatever the sweep returned
        let closed = writer.map_or(Ok(()), SampleWriter::close);

        let outcome = match swept {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, at = counters.current, "Sweep failed");
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Failed to close csv after sweep failure");
                }
                if let Some(mgr) = checkpoint.as_mut() {
                    if let Err(save_err) = mgr.record(settled.next_index, settled.counters) {
                        warn!(error = %save_err, "Failed to save checkpoint after sweep failure");
                    }
                }
                return Err(e);
            }
        };
        closed?;

        if let Some(mgr) = checkpoint.as_mut() {
            match outcome {
                RunOutcome::Completed => mgr.clear()?,
                RunOutcome::Cancelled => mgr.record(settled.next_index, settled.counters)?,
            }
        }

        let mut summary = RunSummary::new(outcome, counters, total, mode == Mode::Generate);
        summary.finalize(start.elapsed().as_secs_f64());

        info!(
            outcome = ?outcome,
            visited = counters.current,
            valid = counters.valid,
            written,
            runtime = format!("{:.1}s", summary.runtime_secs),
            "Finish generating"
        );
        self.rig.completion.finished(&summary);
        Ok(summary)
    }

    fn prepare_checkpoint(
        &self,
        space: &ParameterSpace,
        mode: Mode,
    ) -> Result<Option<CheckpointManager>> {
        let wants_checkpoint = self.settings.checkpoint_interval > 0 || self.settings.resume;
        if mode != Mode::Generate || !wants_checkpoint {
            return Ok(None);
        }

        let mut mgr = CheckpointManager::new(&self.settings.folder)?;
        if self.settings.resume && mgr.exists() {
            let state = mgr.load()?;
            state.ensure_matches(space, &self.settings.csv_file)?;
            if state.is_complete() {
                info!("Checkpoint covers the whole grid, nothing left to sweep");
            } else {
                info!(
                    "Resuming; samples written after the last checkpoint of a killed run \
                     may be produced again"
                );
            }
        } else {
            if self.settings.resume {
                info!("No checkpoint to resume from, starting a fresh run");
            }
            mgr.start(space.clone(), &self.settings.csv_file);
        }
        Ok(Some(mgr))
    }

    async fn sweep(
        &mut self,
        space: &ParameterSpace,
        counters: &mut RunCounters,
        settled: &mut Settled,
        mut writer: Option<&mut SampleWriter>,
        mut checkpoint: Option<&mut CheckpointManager>,
    ) -> Result<RunOutcome> {
        let grid = GridIterator::starting_at(space.dimensions(), settled.next_index);
        let interval = self.settings.checkpoint_interval;

        for point in grid {
            for &(dof, value) in point.changed() {
                self.rig.joints.set(dof, value);
            }

            let current = counters.visit();
            self.rig.panel.report_progress(current);

            tokio::task::yield_now().await;
            if self.cancel.is_cancelled() {
                info!(at = current, "Generation cancelled");
                return Ok(RunOutcome::Cancelled);
            }

            if self.rig.is_valid() {
                if let Some(sink) = writer.as_deref_mut() {
                    let sample = self.rig.sample()?;
                    sink.write_sample(&sample)?;
                    debug!(index = point.index, image = %sample.image_name, "Sample accepted");
                }
                counters.accept();
            }

            settled.next_index = point.index + 1;
            settled.counters = *counters;

            if interval > 0 && current % interval == 0 {
                if let Some(mgr) = checkpoint.as_deref_mut() {
                    mgr.record(settled.next_index, settled.counters)?;
                }
            }
        }

        Ok(RunOutcome::Completed)
    }
}
