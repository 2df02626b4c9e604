//! Console panel and completion sink.

use crate::models::{ParameterSpace, RunOutcome, RunSummary};
use crate::rig::{CompletionSink, DatasetPanel};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Supplies a fixed parameter space and mirrors progress on a terminal bar.
pub struct ConsolePanel {
    space: Option<ParameterSpace>,
    progress: ProgressBar,
}

impl ConsolePanel {
    /// Panel with a visible progress bar.
    pub fn new(space: Option<ParameterSpace>) -> Self {
        let progress = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            progress.set_style(style.progress_chars("##-"));
        }
        Self { space, progress }
    }

    /// Panel that draws nothing.
    pub fn hidden(space: Option<ParameterSpace>) -> Self {
        Self {
            space,
            progress: ProgressBar::hidden(),
        }
    }

    /// Handle to the progress bar, e.g. to print a final message.
    pub fn progress(&self) -> ProgressBar {
        self.progress.clone()
    }
}

impl DatasetPanel for ConsolePanel {
    fn pack_parameters(&mut self) -> Option<ParameterSpace> {
        if self.space.is_none() {
            warn!("No parameter space configured, nothing to sweep");
        }
        self.space.clone()
    }

    fn report_total(&mut self, total: u64) {
        self.progress.reset();
        self.progress.set_length(total);
    }

    fn report_progress(&mut self, current: u64) {
        self.progress.set_position(current);
    }
}

/// Completion sink that logs the summary and closes a progress bar.
pub struct LogCompletion {
    progress: Option<ProgressBar>,
}

impl LogCompletion {
    pub fn new() -> Self {
        Self { progress: None }
    }

    /// Finish `progress` with the summary line when a run ends.
    pub fn with_progress(progress: ProgressBar) -> Self {
        Self {
            progress: Some(progress),
        }
    }
}

impl Default for LogCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSink for LogCompletion {
    fn finished(&mut self, summary: &RunSummary) {
        let label = match summary.outcome {
            RunOutcome::Completed => "Finished",
            RunOutcome::Cancelled => "Cancelled",
        };
        if let Some(pb) = &self.progress {
            pb.finish_with_message(format!("{label}: {} valid", summary.counters.valid));
        }
        info!(
            outcome = ?summary.outcome,
            visited = summary.counters.current,
            valid = summary.counters.valid,
            total = summary.total,
            acceptance = format!("{:.1}%", summary.acceptance_rate * 100.0),
            "Valid Image: {}",
            summary.counters.valid
        );
    }
}
