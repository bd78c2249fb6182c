//! dirsort - a rule-based directory organizer
//!
//! Sorts the top-level entries of a directory into destination folders by
//! file extension or, for extensionless files, by a binary signature read
//! from the first bytes. Sidecar files such as `.xmp` follow the file they
//! describe, and nothing is ever overwritten.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod mover;
pub mod organizer;
pub mod output;
pub mod rules;
pub mod sidecar;

pub use classifier::{Classifier, Decision, EntrySnapshot, SkipReason};
pub use config::RuleConfig;
pub use error::{ConfigError, MoveError, OrganizeError, OrganizeResult};
pub use events::{EventKind, EventSink, OrganizeEvent, RecordingSink, TracingSink};
pub use mover::{MovePolicy, Mover};
pub use organizer::{OrganizeReport, Organizer};
pub use rules::{RuleSet, normalize_extension};
