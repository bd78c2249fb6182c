//! Moving entries into destination directories.
//!
//! A move never overwrites an existing entry: a name collision walks through
//! `name_01.ext`, `name_02.ext`, ... until a free name is found. Transient OS
//! errors are retried with exponential backoff, permission errors are final,
//! and a failed move always leaves the source where it was.
//! Regular files are copied and then removed when a rename would cross
//! filesystems.

use crate::error::MoveError;
use crate::events::{EventKind, EventSink, OrganizeEvent, display_name};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Retries allowed for a move that keeps failing with a transient error.
pub const DEFAULT_MAX_MOVE_RETRIES: u32 = 3;
/// Delay before the first retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Alternative names tried before a collision is given up on.
pub const DEFAULT_MAX_COLLISION_ATTEMPTS: usize = 99;

/// Tunables for moving entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePolicy {
    /// How many times a transient failure is retried.
    pub max_move_retries: u32,
    /// Delay before the first retry; doubles on each following one.
    pub retry_delay: Duration,
    /// How many alternative names are tried after a collision.
    pub max_collision_attempts: usize,
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
}

impl Default for MovePolicy {
    fn default() -> Self {
        Self {
            max_move_retries: DEFAULT_MAX_MOVE_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_collision_attempts: DEFAULT_MAX_COLLISION_ATTEMPTS,
            dry_run: false,
        }
    }
}

impl MovePolicy {
    /// Delay before retry number `retry` (zero-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Returns true for OS errors that usually clear up on their own.
pub fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::ResourceBusy
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
    )
}

/// Alternative paths for a name that is already taken.
///
/// The counter is appended to the stem and zero-padded to the width of
/// `max_attempts`, so `report.csv` with 99 attempts yields `report_01.csv`
/// through `report_99.csv`.
///
/// # Examples
///
/// ```
/// use dirsort::mover::collision_candidates;
/// use std::path::{Path, PathBuf};
///
/// let names: Vec<PathBuf> = collision_candidates(Path::new("out/report.csv"), 99).take(2).collect();
/// assert_eq!(names, [PathBuf::from("out/report_01.csv"), PathBuf::from("out/report_02.csv")]);
/// ```
pub fn collision_candidates(path: &Path, max_attempts: usize) -> impl Iterator<Item = PathBuf> + use<> {
    let width = max_attempts.to_string().len();
    let base = path.to_path_buf();
    let stem = path.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
    let extension = path.extension().map(|e| e.to_os_string());

    (1..=max_attempts).map(move |n| {
        let mut name = stem.clone();
        name.push(format!("_{:0width$}", n, width = width));
        if let Some(ref ext) = extension {
            name.push(".");
            name.push(ext);
        }
        base.with_file_name(name)
    })
}

/// Whether an existing target may be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    NoClobber,
    Overwrite,
}

/// Result of a single rename attempt.
#[derive(Debug)]
enum Attempt {
    Moved,
    Collision,
    Denied(io::Error),
    Transient(io::Error),
    Fatal(io::Error),
}

/// Where a move currently stands.
#[derive(Debug)]
enum MoveState {
    Trying { target: PathBuf },
    CollisionRetry,
    TransientRetry { target: PathBuf, error: io::Error },
    Succeeded(PathBuf),
    Failed(MoveError),
}

fn attempt_rename(source: &Path, target: &Path, placement: Placement) -> Attempt {
    if placement == Placement::NoClobber {
        match fs::symlink_metadata(target) {
            Ok(_) => return Attempt::Collision,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return classify_error(e, placement),
        }
    }

    match fs::rename(source, target) {
        Ok(()) => Attempt::Moved,
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_across_devices(source, target, placement)
        }
        Err(e) => classify_error(e, placement),
    }
}

/// Moves a regular file onto another filesystem by copying it, then removing
/// the source.
///
/// Directories are not copied. If any step fails the partial copy is removed
/// and the source stays where it was.
fn copy_across_devices(source: &Path, target: &Path, placement: Placement) -> Attempt {
    let metadata = match fs::symlink_metadata(source) {
        Ok(metadata) => metadata,
        Err(e) => return classify_error(e, placement),
    };
    if !metadata.is_file() {
        return Attempt::Fatal(io::Error::new(
            io::ErrorKind::CrossesDevices,
            "cannot move a directory across filesystems",
        ));
    }

    let mut options = fs::OpenOptions::new();
    options.write(true);
    match placement {
        Placement::NoClobber => options.create_new(true),
        Placement::Overwrite => options.create(true).truncate(true),
    };
    let mut output = match options.open(target) {
        Ok(file) => file,
        Err(e) => return classify_error(e, placement),
    };

    let copied = fs::File::open(source)
        .and_then(|mut input| io::copy(&mut input, &mut output))
        .and_then(|_| output.set_permissions(metadata.permissions()))
        .and_then(|_| output.sync_all());
    drop(output);

    if let Err(e) = copied.and_then(|_| fs::remove_file(source)) {
        let _ = fs::remove_file(target);
        return classify_error(e, placement);
    }
    Attempt::Moved
}

fn classify_error(error: io::Error, placement: Placement) -> Attempt {
    match error.kind() {
        io::ErrorKind::PermissionDenied => Attempt::Denied(error),
        io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty
            if placement == Placement::NoClobber =>
        {
            Attempt::Collision
        }
        _ if is_transient(&error) => Attempt::Transient(error),
        _ => Attempt::Fatal(error),
    }
}

/// Moves entries according to a [`MovePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Mover {
    policy: MovePolicy,
}

impl Mover {
    /// Creates a mover that follows `policy`.
    pub fn new(policy: MovePolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy this mover was built with.
    pub fn policy(&self) -> &MovePolicy {
        &self.policy
    }

    /// Moves `source` into `destination_dir`, keeping its name if it is free.
    ///
    /// # Arguments
    ///
    /// * `source` - The file or directory to move
    /// * `destination_dir` - The directory that receives it; must already exist
    /// * `sink` - Receives retry and dry-run events
    ///
    /// # Returns
    ///
    /// The final path, which carries a `_NN` suffix if the name was taken.
    /// On any error the source is left in place.
    pub fn move_into(
        &self,
        source: &Path,
        destination_dir: &Path,
        sink: &mut dyn EventSink,
    ) -> Result<PathBuf, MoveError> {
        let file_name = source.file_name().ok_or(MoveError::NoFileName)?;
        let target = destination_dir.join(file_name);

        if self.policy.dry_run {
            sink.emit(
                OrganizeEvent::new(
                    EventKind::DryRun,
                    source,
                    format!("Would move '{}' to '{}'", display_name(source), destination_dir.display()),
                )
                .with_destination(&target),
            );
            return Ok(target);
        }

        self.drive(source, target, Placement::NoClobber, sink, attempt_rename)
    }

    /// Moves `source` to exactly `target`, replacing whatever is there.
    pub fn replace(
        &self,
        source: &Path,
        target: &Path,
        sink: &mut dyn EventSink,
    ) -> Result<PathBuf, MoveError> {
        if self.policy.dry_run {
            sink.emit(
                OrganizeEvent::new(
                    EventKind::DryRun,
                    source,
                    format!("Would move '{}' to '{}'", display_name(source), target.display()),
                )
                .with_destination(target),
            );
            return Ok(target.to_path_buf());
        }

        self.drive(source, target.to_path_buf(), Placement::Overwrite, sink, attempt_rename)
    }

    /// Runs the move state machine until it succeeds or fails for good.
    fn drive<F>(
        &self,
        source: &Path,
        first_target: PathBuf,
        placement: Placement,
        sink: &mut dyn EventSink,
        mut attempt: F,
    ) -> Result<PathBuf, MoveError>
    where
        F: FnMut(&Path, &Path, Placement) -> Attempt,
    {
        if let Err(e) = fs::symlink_metadata(source) {
            return Err(if e.kind() == io::ErrorKind::NotFound {
                MoveError::SourceVanished
            } else {
                MoveError::Io { source: e }
            });
        }

        let mut candidates = collision_candidates(&first_target, self.policy.max_collision_attempts);
        let mut retries = 0u32;
        let mut state = MoveState::Trying {
            target: first_target,
        };

        loop {
            state = match state {
                MoveState::Trying { target } => match attempt(source, &target, placement) {
                    Attempt::Moved => MoveState::Succeeded(target),
                    Attempt::Collision => MoveState::CollisionRetry,
                    Attempt::Denied(e) => MoveState::Failed(MoveError::PermissionDenied { source: e }),
                    Attempt::Transient(error) => MoveState::TransientRetry { target, error },
                    Attempt::Fatal(e) if e.kind() == io::ErrorKind::NotFound && !source.exists() => {
                        MoveState::Failed(MoveError::SourceVanished)
                    }
                    Attempt::Fatal(e) => MoveState::Failed(MoveError::Io { source: e }),
                },
                MoveState::CollisionRetry => match candidates.next() {
                    Some(target) => MoveState::Trying { target },
                    None => MoveState::Failed(MoveError::CollisionsExhausted {
                        attempts: self.policy.max_collision_attempts,
                    }),
                },
                MoveState::TransientRetry { target, error } => {
                    if retries >= self.policy.max_move_retries {
                        MoveState::Failed(MoveError::RetriesExhausted {
                            retries,
                            source: error,
                        })
                    } else {
                        let delay = self.policy.backoff(retries);
                        retries += 1;
                        sink.emit(OrganizeEvent::new(
                            EventKind::Retrying,
                            source,
                            format!(
                                "[{}/{}] Moving '{}' in {:?}: {}",
                                retries,
                                self.policy.max_move_retries,
                                display_name(source),
                                delay,
                                error
                            ),
                        ));
                        thread::sleep(delay);
                        MoveState::Trying { target }
                    }
                }
                MoveState::Succeeded(path) => return Ok(path),
                MoveState::Failed(error) => return Err(error),
            };
        }
    }
}
