//! Entry classification.
//!
//! Decides, for one root-level entry, where it should go. The file type is
//! captured once in an [`EntrySnapshot`] so the decision and the following
//! move act on the same view of the entry.

use crate::events::{EventKind, EventSink, OrganizeEvent};
use crate::rules::{RuleSet, SIGNATURE_READ_SIZE, normalize_extension};
use std::fs::{self, DirEntry, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Extensions of metadata files that travel with a primary file, in lookup order.
pub const SIDECAR_EXTENSIONS: [&str; 2] = [".xmp", ".aae"];

/// Name suffixes of directories that are still being written to.
pub const INCOMPLETE_MARKERS: [&str; 4] = ["download", ".crdownload", ".part", ".partial"];

/// What kind of filesystem object an entry is, without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Pipes, sockets, devices.
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// A directory entry queried once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
}

impl EntrySnapshot {
    /// Captures a `read_dir` entry.
    pub fn from_dir_entry(entry: &DirEntry) -> io::Result<Self> {
        Ok(Self {
            path: entry.path(),
            name: entry.file_name().to_string_lossy().into_owned(),
            kind: entry.file_type()?.into(),
        })
    }

    /// Captures an arbitrary path without following a final symlink.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind: metadata.file_type().into(),
        })
    }

    /// The normalized extension, or `None` for extensionless names.
    ///
    /// Leading-dot names such as `.bashrc` have no extension.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| normalize_extension(&ext.to_string_lossy()))
            .filter(|ext| !ext.is_empty())
    }

    /// Returns true for regular files carrying a sidecar extension.
    pub fn is_sidecar(&self) -> bool {
        self.kind == EntryKind::File
            && self
                .extension()
                .is_some_and(|ext| SIDECAR_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Why an entry is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    IgnoredName,
    Symlink,
    ManagedDirectory,
    InProgress,
    NotRegular,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::IgnoredName => "Ignored name",
            SkipReason::Symlink => "Symlink",
            SkipReason::ManagedDirectory => "Destination directory",
            SkipReason::InProgress => "In-progress download",
            SkipReason::NotRegular => "Not a regular file",
        }
    }
}

/// The outcome of classifying one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Move into this destination directory.
    Destination(String),
    /// Leave untouched.
    Skip(SkipReason),
    /// A sidecar; placed after its primary has been handled.
    Defer,
}

/// Applies a [`RuleSet`] to directory entries.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    rules: &'a RuleSet,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Decides where an entry belongs.
    ///
    /// Checks run in a fixed order and the first match wins:
    /// 1. Ignored names are skipped
    /// 2. Symlinks are skipped
    /// 3. Directories are skipped if managed or in progress, otherwise go to the fallback
    /// 4. Anything else that is not a regular file is skipped
    /// 5. Sidecar files are deferred
    /// 6. Extensionless files are identified by signature
    /// 7. Known extensions go to their rule's directory
    /// 8. Everything else goes to the fallback
    pub fn decide(&self, entry: &EntrySnapshot, sink: &mut dyn EventSink) -> Decision {
        if self.rules.is_ignored_name(&entry.name) {
            return Decision::Skip(SkipReason::IgnoredName);
        }

        match entry.kind {
            EntryKind::Symlink => return Decision::Skip(SkipReason::Symlink),
            EntryKind::Directory => {
                if self.rules.is_managed_directory(&entry.name) {
                    return Decision::Skip(SkipReason::ManagedDirectory);
                }
                if is_in_progress(&entry.name) {
                    return Decision::Skip(SkipReason::InProgress);
                }
                return Decision::Destination(self.rules.fallback_dir().to_string());
            }
            EntryKind::Other => return Decision::Skip(SkipReason::NotRegular),
            EntryKind::File => {}
        }

        if entry.is_sidecar() {
            return Decision::Defer;
        }

        let Some(extension) = entry.extension() else {
            return Decision::Destination(self.resolve_by_signature(&entry.path, sink));
        };

        let directory = self
            .rules
            .directory_for_extension(&extension)
            .unwrap_or(self.rules.fallback_dir());
        Decision::Destination(directory.to_string())
    }

    /// Picks a directory for an extensionless file from its leading bytes.
    ///
    /// Never fails: an unreadable, empty, or unrecognized file resolves to the
    /// fallback directory.
    pub fn resolve_by_signature(&self, path: &Path, sink: &mut dyn EventSink) -> String {
        let fallback = self.rules.fallback_dir().to_string();

        let Some(matcher) = self.rules.signature_matcher() else {
            tracing::debug!(path = %path.display(), "No signatures defined, using fallback");
            return fallback;
        };

        let header = match read_header(path) {
            Ok(header) => header,
            Err(e) => {
                sink.emit(OrganizeEvent::new(
                    EventKind::Failed,
                    path,
                    format!("Opening for signature check: {}", e),
                ));
                return fallback;
            }
        };

        if header.is_empty() {
            tracing::debug!(path = %path.display(), "Empty file, using fallback");
            return fallback;
        }

        let Some(extension) = matcher.identify(&header) else {
            tracing::debug!(path = %path.display(), "No matching signature, using fallback");
            return fallback;
        };

        sink.emit(OrganizeEvent::new(
            EventKind::Identified,
            path,
            format!("Identified as '{}' via binary signature", extension),
        ));

        self.rules
            .directory_for_extension(extension)
            .map(str::to_string)
            .unwrap_or(fallback)
    }
}

fn is_in_progress(name: &str) -> bool {
    let lower = name.to_lowercase();
    INCOMPLETE_MARKERS
        .iter()
        .any(|marker| lower.ends_with(marker))
}

/// Reads at most [`SIGNATURE_READ_SIZE`] bytes from the start of a file.
fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(SIGNATURE_READ_SIZE);
    file.take(SIGNATURE_READ_SIZE as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}
