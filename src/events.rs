//! Structured progress events.
//!
//! The organizer never prints. Every per-entry outcome is described by an
//! [`OrganizeEvent`] and handed to an [`EventSink`], so the caller decides
//! whether it ends up in a log, a progress bar, or a test assertion.

use std::fmt;
use std::path::{Path, PathBuf};

/// The kind of thing that happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A configuration file was loaded or adapted.
    Config,
    /// A rule was accepted or rejected while building the rule set.
    Init,
    /// An action that would have been taken outside of dry-run mode.
    DryRun,
    /// A pass over a root directory began.
    Started,
    /// A pass over a root directory ended.
    Finished,
    /// Destination directories were created.
    Created,
    /// An entry was moved.
    Moved,
    /// An extensionless file was identified by its signature.
    Identified,
    /// An entry was left untouched.
    Skipped,
    /// An entry could not be processed.
    Failed,
    /// A transient move failure is about to be retried.
    Retrying,
}

impl EventKind {
    /// Returns the tag used when rendering this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Config => "CONFIG",
            EventKind::Init => "INIT",
            EventKind::DryRun => "DRY-RUN",
            EventKind::Started => "STARTED",
            EventKind::Finished => "FINISHED",
            EventKind::Created => "CREATED",
            EventKind::Moved => "MOVED",
            EventKind::Identified => "IDENTIFIED",
            EventKind::Skipped => "SKIPPED",
            EventKind::Failed => "FAILED",
            EventKind::Retrying => "RETRYING",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeEvent {
    pub kind: EventKind,
    /// The entry the event is about.
    pub path: PathBuf,
    /// Where the entry went, or would have gone.
    pub destination: Option<PathBuf>,
    pub detail: String,
}

impl OrganizeEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            destination: None,
            detail: detail.into(),
        }
    }

    /// Attaches a destination path.
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Returns the final path component of the subject, for display.
    pub fn name(&self) -> String {
        display_name(&self.path)
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Receives events from the organizer.
pub trait EventSink {
    fn emit(&mut self, event: OrganizeEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: OrganizeEvent) {
        let action = event.kind;
        let path = event.path.display();
        let destination = event
            .destination
            .as_deref()
            .map(|d| d.display().to_string())
            .unwrap_or_default();

        match event.kind {
            EventKind::Failed => {
                tracing::error!(%action, %path, %destination, "{}", event.detail)
            }
            EventKind::Skipped | EventKind::Init => {
                tracing::debug!(%action, %path, %destination, "{}", event.detail)
            }
            _ => tracing::info!(%action, %path, %destination, "{}", event.detail),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<OrganizeEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events of one kind, in emission order.
    pub fn of_kind(&self, kind: EventKind) -> Vec<&OrganizeEvent> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: OrganizeEvent) {
        self.events.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: OrganizeEvent) {
        (**self).emit(event);
    }
}
