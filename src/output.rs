//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored messages,
//! the progress spinner shown while a directory is organized, and the summary
//! table printed at the end of a run.

use crate::events::{EventKind, EventSink, OrganizeEvent, TracingSink};
use crate::organizer::{FailedEntry, OrganizeReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress spinners for a run
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a spinner that ticks once per processed entry.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// let spinner = OutputFormatter::create_spinner();
    /// spinner.set_message("photo.jpg");
    /// spinner.inc(1);
    /// spinner.finish_and_clear();
    /// ```
    pub fn create_spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {pos} entries {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }

    /// Prints a summary table with entry counts by destination directory.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(directory_counts: &BTreeMap<String, usize>, total_entries: usize) {
        Self::header("SUMMARY");

        let width = directory_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(9); // "Directory"

        println!(
            "{:<width$} | {}",
            "Directory".bold(),
            "Entries".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 12));

        for (directory, count) in directory_counts {
            println!(
                "{:<width$} | {} {}",
                directory,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 12));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_entries.to_string().green().bold(),
            plural(total_entries),
            width = width
        );
    }

    /// Lists entries that could not be organized.
    pub fn failures(failures: &[FailedEntry]) {
        if failures.is_empty() {
            return;
        }
        Self::header("FAILED");
        for failure in failures {
            Self::error(&format!("{}: {}", failure.path.display(), failure.reason));
        }
    }

    /// Prints the full end-of-run report.
    pub fn report(report: &OrganizeReport) {
        if report.dry_run {
            Self::dry_run_notice("No changes were made");
        }
        Self::summary_table(&report.directory_counts(), report.total_moved());
        println!(
            "{:<9} | {}",
            "Skipped",
            report.skipped.to_string().yellow()
        );
        Self::failures(&report.failures);

        let elapsed = report.duration().num_milliseconds();
        if report.is_clean() {
            Self::success(&format!("Finished in {} ms", elapsed));
        } else {
            Self::warning(&format!(
                "Finished in {} ms, {} {} could not be organized",
                elapsed,
                report.failures.len(),
                plural(report.failures.len())
            ));
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "entry" } else { "entries" }
}

/// Logs events and ticks a spinner for each entry handled.
///
/// Log lines are written with the spinner suspended so the two do not
/// interleave on the terminal.
pub struct ProgressSink {
    spinner: ProgressBar,
    inner: TracingSink,
}

impl ProgressSink {
    pub fn new(spinner: ProgressBar) -> Self {
        Self {
            spinner,
            inner: TracingSink,
        }
    }

    pub fn finish(self) {
        self.spinner.finish_and_clear();
    }
}

impl EventSink for ProgressSink {
    fn emit(&mut self, event: OrganizeEvent) {
        if matches!(
            event.kind,
            EventKind::Moved | EventKind::Skipped | EventKind::Failed | EventKind::DryRun
        ) {
            self.spinner.inc(1);
            self.spinner.set_message(event.name());
        }

        let inner = &mut self.inner;
        self.spinner.suspend(|| inner.emit(event));
    }
}
