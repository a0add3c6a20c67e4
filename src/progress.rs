//! Terminal progress for runs.

use crate::ui;
use colored::Colorize;
use enactor::{EntryOutcome, Phase, ProgressCallback, RecordEntry};
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar over every instruction of a run
///
/// Each completed instruction prints one line above the bar. Rollback
/// extends the bar by the number of compensating actions.
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    fn line(entry: &RecordEntry) -> String {
        let prefix = match entry.phase {
            Phase::Forward => String::new(),
            Phase::Rollback => format!("{} ", "↺".yellow()),
        };
        let detail = match &entry.outcome {
            EntryOutcome::Succeeded => String::new(),
            EntryOutcome::Failed { error } => format!(" ({error})"),
            EntryOutcome::Skipped { reason } => format!(" (skipped: {reason})"),
        };
        format!(
            "  {}{} {}{}",
            prefix,
            ui::outcome_marker(&entry.outcome),
            entry.description,
            detail.dimmed()
        )
    }
}

impl ProgressCallback for BarProgress {
    fn on_wave_start(&mut self, phase: Phase, wave: usize, count: usize) {
        self.pb
            .set_message(format!("{phase} wave {} ({count})", wave + 1));
    }

    fn on_instruction_complete(&mut self, entry: &RecordEntry) {
        let line = Self::line(entry);
        self.pb.suspend(|| println!("{line}"));
        if !matches!(entry.outcome, EntryOutcome::Skipped { .. }) {
            self.pb.inc(1);
        }
    }

    fn on_wave_complete(&mut self, phase: Phase, wave: usize) {
        log::debug!("{phase} wave {} complete", wave + 1);
    }

    fn on_rollback_start(&mut self, actions: usize) {
        self.pb.inc_length(actions as u64);
        self.pb.set_message("rolling back");
        self.pb.suspend(|| {
            ui::warn(&format!("Run failed, rolling back ({actions} action(s))"));
        });
    }
}
