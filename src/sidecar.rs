//! Keeping sidecar files next to the file they describe.
//!
//! A sidecar (`photo.xmp` for `photo.jpg`) follows its primary into whatever
//! name the primary ended up with. Sidecars with no primary are swept into
//! the fallback directory once the main pass is over.

use crate::classifier::{EntryKind, EntrySnapshot, SIDECAR_EXTENSIONS};
use crate::error::MoveError;
use crate::events::{EventKind, EventSink, OrganizeEvent, display_name};
use crate::mover::Mover;
use crate::rules::RuleSet;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Finds the sidecar sitting next to `primary`, if there is one.
///
/// Extensions are tried in [`SIDECAR_EXTENSIONS`] order. Every letter case of
/// an extension is accepted (`photo.Xmp` pairs with `photo.jpg`), with the
/// lower-case and then upper-case spellings tried first. The first regular
/// file found wins.
pub fn find_sidecar(primary: &Path) -> Option<PathBuf> {
    SIDECAR_EXTENSIONS
        .iter()
        .flat_map(|ext| case_variants(ext.trim_start_matches('.')))
        .map(|ext| primary.with_extension(ext))
        .filter(|candidate| candidate != primary)
        .find(|candidate| fs::symlink_metadata(candidate).is_ok_and(|m| m.is_file()))
}

/// Every ASCII letter-case spelling of `ext`, lower and upper case first.
fn case_variants(ext: &str) -> Vec<String> {
    let letters: Vec<usize> = ext
        .char_indices()
        .filter(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .collect();
    let all = (1usize << letters.len()) - 1;

    let mut masks = vec![0, all];
    masks.extend(1..all);
    masks.dedup();

    masks
        .into_iter()
        .map(|mask| {
            let mut bytes = ext.to_ascii_lowercase().into_bytes();
            for (bit, &index) in letters.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    bytes[index] = bytes[index].to_ascii_uppercase();
                }
            }
            String::from_utf8_lossy(&bytes).into_owned()
        })
        .collect()
}

/// A sidecar that was relocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidecarMove {
    /// The sidecar's original path.
    pub source: PathBuf,
    /// The sidecar's new path, named after its primary.
    pub destination: PathBuf,
}

/// Where a primary and its sidecar ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedMove {
    /// Final path of the primary.
    pub primary: PathBuf,
    /// The sidecar move, if a sidecar existed and moved successfully.
    pub sidecar: Option<SidecarMove>,
}

/// Sidecar bookkeeping carried from the main pass into the sweep.
#[derive(Debug, Clone, Default)]
pub struct SidecarQueue {
    /// Sidecars met directly during the pass.
    pub deferred: Vec<PathBuf>,
    /// Sidecar sources already moved (or planned, in dry-run) with a primary.
    pub paired: BTreeSet<PathBuf>,
}

impl SidecarQueue {
    /// Creates an empty queue for one pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sidecar met on its own during the pass, for the orphan sweep.
    pub fn defer(&mut self, path: PathBuf) {
        self.deferred.push(path);
    }
}

/// What the orphan sweep did.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Orphans moved into the fallback directory.
    pub moved: Vec<SidecarMove>,
    /// Queued sidecars that were already gone, usually because they moved with their primary.
    pub already_handled: usize,
    /// Orphans that could not be moved, with the reason.
    pub failures: Vec<(PathBuf, MoveError)>,
}

/// Moves primaries together with their sidecars.
#[derive(Debug, Clone, Copy)]
pub struct SidecarCoordinator<'a> {
    rules: &'a RuleSet,
    mover: &'a Mover,
}

impl<'a> SidecarCoordinator<'a> {
    /// Creates a coordinator over `rules`, moving through `mover`.
    pub fn new(rules: &'a RuleSet, mover: &'a Mover) -> Self {
        Self { rules, mover }
    }

    /// Moves `source` into `destination_dir` and brings its sidecar along.
    ///
    /// # Arguments
    ///
    /// * `source` - The primary file
    /// * `destination_dir` - The directory the primary is moved into
    /// * `queue` - Records the paired sidecar so the sweep skips it
    /// * `sink` - Receives mover events and sidecar failures
    ///
    /// If the primary cannot be moved, the sidecar is not touched and the
    /// primary's error is returned. A sidecar that fails to move is reported
    /// but does not undo the primary move.
    pub fn move_with_sidecar(
        &self,
        source: &Path,
        destination_dir: &Path,
        queue: &mut SidecarQueue,
        sink: &mut dyn EventSink,
    ) -> Result<PairedMove, MoveError> {
        let primary = self.mover.move_into(source, destination_dir, sink)?;

        let Some(sidecar_source) = find_sidecar(source) else {
            tracing::debug!(path = %source.display(), "No sidecar file");
            return Ok(PairedMove {
                primary,
                sidecar: None,
            });
        };

        let sidecar_target = match sidecar_source.extension() {
            Some(ext) => primary.with_extension(ext),
            None => primary.clone(),
        };

        match self.mover.replace(&sidecar_source, &sidecar_target, sink) {
            Ok(destination) => {
                queue.paired.insert(sidecar_source.clone());
                Ok(PairedMove {
                    primary,
                    sidecar: Some(SidecarMove {
                        source: sidecar_source,
                        destination,
                    }),
                })
            }
            Err(e) => {
                sink.emit(
                    OrganizeEvent::new(
                        EventKind::Failed,
                        &sidecar_source,
                        format!("Moving sidecar '{}': {}", display_name(&sidecar_source), e),
                    )
                    .with_destination(&sidecar_target),
                );
                Ok(PairedMove {
                    primary,
                    sidecar: None,
                })
            }
        }
    }

    /// Moves every sidecar still sitting in `root` into the fallback directory.
    ///
    /// Candidates are the deferred sidecars plus a fresh scan of `root`, minus
    /// the ones already paired. A candidate that has disappeared counts as
    /// handled, not as a failure.
    pub fn sweep_orphans(
        &self,
        root: &Path,
        queue: SidecarQueue,
        sink: &mut dyn EventSink,
    ) -> SweepOutcome {
        let fallback = root.join(self.rules.fallback_dir());
        let mut outcome = SweepOutcome::default();

        let mut candidates: BTreeSet<PathBuf> = queue.deferred.into_iter().collect();
        match fs::read_dir(root) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    match EntrySnapshot::from_dir_entry(&entry) {
                        Ok(snapshot)
                            if snapshot.kind == EntryKind::File
                                && snapshot.is_sidecar()
                                && !self.rules.is_ignored_name(&snapshot.name) =>
                        {
                            candidates.insert(snapshot.path);
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => sink.emit(OrganizeEvent::new(
                EventKind::Failed,
                root,
                format!("Rescanning for orphaned sidecars: {}", e),
            )),
        }

        for path in candidates {
            if queue.paired.contains(&path) {
                outcome.already_handled += 1;
                continue;
            }

            match self.mover.move_into(&path, &fallback, sink) {
                Ok(destination) => {
                    if !self.mover.policy().dry_run {
                        sink.emit(
                            OrganizeEvent::new(
                                EventKind::Moved,
                                &path,
                                format!(
                                    "Orphaned sidecar '{}' to '{}'",
                                    display_name(&path),
                                    self.rules.fallback_dir()
                                ),
                            )
                            .with_destination(&destination),
                        );
                    }
                    outcome.moved.push(SidecarMove {
                        source: path,
                        destination,
                    });
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(path = %path.display(), "Sidecar already moved");
                    outcome.already_handled += 1;
                }
                Err(e) => {
                    sink.emit(OrganizeEvent::new(
                        EventKind::Failed,
                        &path,
                        format!("Moving orphaned sidecar '{}': {}", display_name(&path), e),
                    ));
                    outcome.failures.push((path, e));
                }
            }
        }

        outcome
    }
}
