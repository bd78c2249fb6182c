//! The organizing pass over one root directory.
//!
//! `organize` creates every destination directory, walks the root once
//! (classify, then move, then pair sidecars), and finally sweeps up sidecars
//! that never found a primary. Only a bad root or a failure to prepare the
//! destination tree stops a run; everything else is recorded and skipped past.

use crate::classifier::{Classifier, Decision, EntryKind, EntrySnapshot};
use crate::error::{OrganizeError, OrganizeResult};
use crate::events::{EventKind, EventSink, OrganizeEvent, TracingSink};
use crate::mover::{MovePolicy, Mover};
use crate::rules::RuleSet;
use crate::sidecar::{SidecarCoordinator, SidecarQueue, SweepOutcome};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One entry that was moved, or would have been in dry-run mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedEntry {
    /// Where the entry was before the run.
    pub source: PathBuf,
    /// Where the entry is now, including any collision suffix.
    pub destination: PathBuf,
    /// The destination directory name, relative to the root.
    pub directory: String,
}

/// One entry that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    /// The entry that was left in place.
    pub path: PathBuf,
    /// Human-readable cause, taken from the underlying error.
    pub reason: String,
}

/// Summary of a single `organize` run.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeReport {
    /// The directory that was organized.
    pub root: PathBuf,
    /// Whether the run only reported what it would do.
    pub dry_run: bool,
    /// When the run began (UTC).
    pub started_at: DateTime<Utc>,
    /// When the orphan sweep completed (UTC).
    pub finished_at: DateTime<Utc>,
    /// Primary entries, files and directories.
    pub moved: Vec<MovedEntry>,
    /// Sidecars, both those paired with a primary and swept orphans.
    pub sidecars: Vec<MovedEntry>,
    /// Entries deliberately left alone (ignored names, symlinks, managed directories).
    pub skipped: usize,
    /// Entries that could not be moved.
    pub failures: Vec<FailedEntry>,
}

impl OrganizeReport {
    fn new(root: &Path, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            root: root.to_path_buf(),
            dry_run,
            started_at: now,
            finished_at: now,
            moved: Vec::new(),
            sidecars: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, path: &Path, reason: impl Into<String>) {
        self.failures.push(FailedEntry {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }

    fn absorb_sweep(&mut self, outcome: SweepOutcome, fallback: &str) {
        self.sidecars
            .extend(outcome.moved.into_iter().map(|swept| MovedEntry {
                source: swept.source,
                destination: swept.destination,
                directory: fallback.to_string(),
            }));
        for (path, error) in outcome.failures {
            self.record_failure(&path, error.to_string());
        }
    }

    /// Number of entries placed in each destination directory, sidecars included.
    pub fn directory_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.moved.iter().chain(&self.sidecars) {
            *counts.entry(entry.directory.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Entries moved in total, primaries and sidecars.
    pub fn total_moved(&self) -> usize {
        self.moved.len() + self.sidecars.len()
    }

    /// True when no entry failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Wall-clock time the run took.
    pub fn duration(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Organizes a directory according to a [`RuleSet`].
///
/// # Examples
///
/// ```no_run
/// use dirsort::mover::MovePolicy;
/// use dirsort::organizer::Organizer;
/// use dirsort::rules::RuleSet;
/// use std::path::Path;
///
/// let rules = RuleSet::new(
///     ["Images", "Documents"],
///     [("jpg", "Images"), ("pdf", "Documents")],
///     Some([("pdf", "%PDF")]),
/// );
/// let organizer = Organizer::new(rules, MovePolicy::default());
///
/// match organizer.organize(Path::new("/path/to/Downloads")) {
///     Ok(report) => println!("Moved {} entries", report.total_moved()),
///     Err(e) => eprintln!("Organization failed: {}", e),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Organizer {
    rules: RuleSet,
    mover: Mover,
}

impl Organizer {
    /// Creates an organizer.
    ///
    /// # Arguments
    ///
    /// * `rules` - The validated rule set deciding where entries go
    /// * `policy` - Retry, collision and dry-run settings for every move
    pub fn new(rules: RuleSet, policy: MovePolicy) -> Self {
        Self {
            rules,
            mover: Mover::new(policy),
        }
    }

    /// Returns the rule set.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns the move policy.
    pub fn policy(&self) -> &MovePolicy {
        self.mover.policy()
    }

    /// Organizes `root`, logging every event through `tracing`.
    pub fn organize(&self, root: &Path) -> OrganizeResult<OrganizeReport> {
        self.organize_with(root, &mut TracingSink)
    }

    /// Organizes `root`, sending every event to `sink`.
    ///
    /// Fails only if `root` is not a usable directory, the destination
    /// directories cannot be created, or `root` cannot be listed.
    pub fn organize_with(
        &self,
        root: &Path,
        sink: &mut dyn EventSink,
    ) -> OrganizeResult<OrganizeReport> {
        validate_root(root)?;

        let dry_run = self.policy().dry_run;
        let mut report = OrganizeReport::new(root, dry_run);

        sink.emit(OrganizeEvent::new(
            EventKind::Started,
            root,
            format!("Organizing '{}'", root.display()),
        ));
        if dry_run {
            sink.emit(OrganizeEvent::new(
                EventKind::DryRun,
                root,
                "Dry run, nothing will be changed",
            ));
        }

        self.create_directories(root, sink)?;
        let queue = self.primary_pass(root, &mut report, sink)?;

        let outcome =
            SidecarCoordinator::new(&self.rules, &self.mover).sweep_orphans(root, queue, sink);
        report.absorb_sweep(outcome, self.rules.fallback_dir());

        report.finished_at = Utc::now();
        sink.emit(OrganizeEvent::new(
            EventKind::Finished,
            root,
            format!(
                "{} moved, {} skipped, {} failed",
                report.total_moved(),
                report.skipped,
                report.failures.len()
            ),
        ));

        Ok(report)
    }

    /// Creates every destination directory under `root` that is not there yet.
    fn create_directories(&self, root: &Path, sink: &mut dyn EventSink) -> OrganizeResult<()> {
        let missing: Vec<&str> = self
            .rules
            .directory_names()
            .iter()
            .map(String::as_str)
            .filter(|name| !root.join(name).is_dir())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        if self.policy().dry_run {
            sink.emit(OrganizeEvent::new(
                EventKind::DryRun,
                root,
                format!("Would create directories: {}", missing.join(", ")),
            ));
            return Ok(());
        }

        for name in &missing {
            let path = root.join(name);
            fs::create_dir_all(&path)
                .map_err(|source| OrganizeError::DirectoryCreationFailed { path, source })?;
        }

        sink.emit(OrganizeEvent::new(
            EventKind::Created,
            root,
            format!("Created directories: {}", missing.join(", ")),
        ));
        Ok(())
    }

    /// Classifies and moves every entry of `root` once.
    ///
    /// Returns the sidecars met along the way, for the orphan sweep.
    fn primary_pass(
        &self,
        root: &Path,
        report: &mut OrganizeReport,
        sink: &mut dyn EventSink,
    ) -> OrganizeResult<SidecarQueue> {
        let entries = fs::read_dir(root).map_err(|source| OrganizeError::Enumeration {
            path: root.to_path_buf(),
            source,
        })?;

        let mut snapshots = Vec::new();
        for entry in entries {
            match entry.and_then(|entry| EntrySnapshot::from_dir_entry(&entry)) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    sink.emit(OrganizeEvent::new(
                        EventKind::Failed,
                        root,
                        format!("Reading directory entry: {}", e),
                    ));
                    report.record_failure(root, e.to_string());
                }
            }
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));

        let classifier = Classifier::new(&self.rules);
        let coordinator = SidecarCoordinator::new(&self.rules, &self.mover);
        let mut queue = SidecarQueue::new();

        for snapshot in snapshots {
            match classifier.decide(&snapshot, sink) {
                Decision::Skip(reason) => {
                    sink.emit(OrganizeEvent::new(
                        EventKind::Skipped,
                        &snapshot.path,
                        format!("{}: '{}'", reason.describe(), snapshot.name),
                    ));
                    report.skipped += 1;
                }
                Decision::Defer => {
                    tracing::debug!(path = %snapshot.path.display(), "Deferring sidecar");
                    queue.defer(snapshot.path);
                }
                Decision::Destination(directory) => {
                    self.place(&snapshot, root, &directory, &coordinator, &mut queue, report, sink)
                }
            }
        }

        Ok(queue)
    }

    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        snapshot: &EntrySnapshot,
        root: &Path,
        directory: &str,
        coordinator: &SidecarCoordinator<'_>,
        queue: &mut SidecarQueue,
        report: &mut OrganizeReport,
        sink: &mut dyn EventSink,
    ) {
        let destination_dir = root.join(directory);

        let result = if snapshot.kind == EntryKind::Directory {
            self.mover
                .move_into(&snapshot.path, &destination_dir, sink)
                .map(|primary| (primary, None))
        } else {
            coordinator
                .move_with_sidecar(&snapshot.path, &destination_dir, queue, sink)
                .map(|paired| (paired.primary, paired.sidecar))
        };

        let (primary, sidecar) = match result {
            Ok(placed) => placed,
            Err(e) => {
                sink.emit(
                    OrganizeEvent::new(
                        EventKind::Failed,
                        &snapshot.path,
                        format!("Moving '{}' to '{}': {}", snapshot.name, directory, e),
                    )
                    .with_destination(&destination_dir),
                );
                report.record_failure(&snapshot.path, e.to_string());
                return;
            }
        };

        if !self.policy().dry_run {
            sink.emit(
                OrganizeEvent::new(
                    EventKind::Moved,
                    &snapshot.path,
                    format!("Moved '{}' to '{}'", snapshot.name, directory),
                )
                .with_destination(&primary),
            );
        }
        report.moved.push(MovedEntry {
            source: snapshot.path.clone(),
            destination: primary,
            directory: directory.to_string(),
        });

        if let Some(sidecar) = sidecar {
            if !self.policy().dry_run {
                sink.emit(
                    OrganizeEvent::new(
                        EventKind::Moved,
                        &sidecar.source,
                        format!("Moved sidecar with '{}' to '{}'", snapshot.name, directory),
                    )
                    .with_destination(&sidecar.destination),
                );
            }
            report.sidecars.push(MovedEntry {
                source: sidecar.source,
                destination: sidecar.destination,
                directory: directory.to_string(),
            });
        }
    }
}

fn validate_root(root: &Path) -> OrganizeResult<()> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use std::time::Duration;
    use tempfile::TempDir;

    fn organizer(dry_run: bool) -> Organizer {
        let rules = RuleSet::new(
            ["Images", "Documents/Spreadsheets", "Programming/Shell"],
            [("jpg", "Images"), ("csv", "Documents/Spreadsheets"), ("sh", "Programming/Shell")],
            Some([("sh", "#!/bin/(ba)?sh")]),
        );
        Organizer::new(
            rules,
            MovePolicy {
                retry_delay: Duration::from_millis(1),
                dry_run,
                ..MovePolicy::default()
            },
        )
    }

    #[test]
    fn test_invalid_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "not a directory").unwrap();

        let organizer = organizer(false);
        let missing = organizer.organize_with(&temp_dir.path().join("missing"), &mut RecordingSink::new());
        let not_dir = organizer.organize_with(&file, &mut RecordingSink::new());

        assert!(matches!(missing, Err(OrganizeError::InvalidRoot { .. })));
        assert!(matches!(not_dir, Err(OrganizeError::InvalidRoot { .. })));
    }

    #[test]
    fn test_creates_destination_tree() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let mut sink = RecordingSink::new();

        let report = organizer(false).organize_with(root, &mut sink).unwrap();

        for dir in ["Images", "Documents/Spreadsheets", "Programming/Shell", "Misc"] {
            assert!(root.join(dir).is_dir(), "{} should exist", dir);
        }
        assert_eq!(sink.of_kind(EventKind::Created).len(), 1);
        assert_eq!(report.total_moved(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_organize_moves_and_skips() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("photo.jpg"), "jpeg").unwrap();
        fs::write(root.join("photo.xmp"), "meta").unwrap();
        fs::write(root.join("install"), "#!/bin/bash\necho hi\n").unwrap();
        fs::write(root.join("unknown.zzz"), "?").unwrap();
        fs::write(root.join(".DS_Store"), "").unwrap();
        fs::create_dir(root.join("old_project")).unwrap();
        fs::create_dir(root.join("movie.part")).unwrap();
        fs::create_dir(root.join("Documents")).unwrap();

        let mut sink = RecordingSink::new();
        let report = organizer(false).organize_with(root, &mut sink).unwrap();

        assert!(root.join("Images/photo.jpg").exists());
        assert!(root.join("Images/photo.xmp").exists());
        assert!(root.join("Programming/Shell/install").exists());
        assert!(root.join("Misc/unknown.zzz").exists());
        assert!(root.join("Misc/old_project").is_dir());
        assert!(root.join(".DS_Store").exists());
        assert!(root.join("movie.part").is_dir());
        assert!(root.join("Documents/Spreadsheets").is_dir());

        assert_eq!(report.moved.len(), 4);
        assert_eq!(report.sidecars.len(), 1);
        assert_eq!(report.skipped, 6);
        assert!(report.is_clean());

        let counts = report.directory_counts();
        assert_eq!(counts.get("Images"), Some(&2));
        assert_eq!(counts.get("Misc"), Some(&2));

        assert_eq!(sink.events.first().map(|e| e.kind), Some(EventKind::Started));
        assert_eq!(sink.events.last().map(|e| e.kind), Some(EventKind::Finished));
        assert_eq!(sink.of_kind(EventKind::Moved).len(), 5);
        assert_eq!(sink.of_kind(EventKind::Identified).len(), 1);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("photo.jpg"), "jpeg").unwrap();
        fs::write(root.join("photo.xmp"), "meta").unwrap();
        fs::write(root.join("lonely.aae"), "edits").unwrap();

        let mut sink = RecordingSink::new();
        let report = organizer(true).organize_with(root, &mut sink).unwrap();

        assert!(report.dry_run);
        assert!(root.join("photo.jpg").exists());
        assert!(root.join("photo.xmp").exists());
        assert!(root.join("lonely.aae").exists());
        assert!(!root.join("Images").exists());
        assert!(!root.join("Misc").exists());

        assert_eq!(report.moved[0].destination, root.join("Images/photo.jpg"));
        assert_eq!(report.sidecars.len(), 2);
        assert!(sink.of_kind(EventKind::Moved).is_empty());
        assert!(sink.of_kind(EventKind::Created).is_empty());
        assert!(!sink.of_kind(EventKind::DryRun).is_empty());
    }

    #[test]
    fn test_failed_move_is_contained() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("Images")).unwrap();
        fs::write(root.join("Images/a.jpg"), "taken").unwrap();
        fs::write(root.join("a.jpg"), "new").unwrap();
        fs::write(root.join("b.jpg"), "fine").unwrap();

        let rules = RuleSet::new(["Images"], [("jpg", "Images")], None::<Vec<(String, String)>>);
        let organizer = Organizer::new(
            rules,
            MovePolicy {
                max_collision_attempts: 0,
                ..MovePolicy::default()
            },
        );
        let mut sink = RecordingSink::new();
        let report = organizer.organize_with(root, &mut sink).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, root.join("a.jpg"));
        assert!(root.join("a.jpg").exists());
        assert!(root.join("Images/b.jpg").exists());
        assert_eq!(sink.of_kind(EventKind::Failed).len(), 1);
    }

    #[test]
    fn test_two_roots_do_not_share_sidecar_queue() {
        let first = TempDir::new().expect("Failed to create temp directory");
        let second = TempDir::new().expect("Failed to create temp directory");
        fs::write(first.path().join("orphan.xmp"), "meta").unwrap();
        fs::write(second.path().join("photo.jpg"), "jpeg").unwrap();

        let organizer = organizer(false);
        let first_report = organizer.organize_with(first.path(), &mut RecordingSink::new()).unwrap();
        let second_report = organizer.organize_with(second.path(), &mut RecordingSink::new()).unwrap();

        assert!(first.path().join("Misc/orphan.xmp").exists());
        assert_eq!(first_report.sidecars.len(), 1);
        assert!(second_report.sidecars.is_empty());
        assert!(second_report.is_clean());
    }

    #[test]
    fn test_report_serializes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("sheet.csv"), "a,b").unwrap();

        let report = organizer(false).organize_with(temp_dir.path(), &mut RecordingSink::new()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["moved"][0]["directory"], "Documents/Spreadsheets");
        assert_eq!(json["dry_run"], false);
        assert!(json["started_at"].is_string());
    }
}
