//! Terminal progress display for verification runs

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::output;
use crate::verify::{CounterSnapshot, Diagnostic, ProgressSink};

/// Create a spinner with the given message
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spinner showing the running status, with diagnostics printed above it
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bar: create_spinner("preparing"),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn update_status(&self, snapshot: &CounterSnapshot, total: usize) {
        self.bar.set_message(snapshot.status_line(total));
    }

    fn report(&self, diagnostic: &Diagnostic) {
        self.bar.suspend(|| output::diagnostic(diagnostic));
    }

    fn finish(&self, snapshot: &CounterSnapshot, total: usize) {
        self.bar.finish_and_clear();
        let summary = snapshot.summary_line(total);
        if snapshot.outcome().is_success() {
            output::success(&summary);
        } else {
            output::warning(&summary);
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
