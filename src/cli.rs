//! Command-line interface for dirsort.
//!
//! Parses arguments, sets up logging, resolves the rule configuration and
//! move tunables, then runs the organizer and prints the summary.

use crate::config::RuleConfig;
use crate::mover::MovePolicy;
use crate::organizer::Organizer;
use crate::output::{OutputFormatter, ProgressSink};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sort a directory's entries into destination folders by extension or binary signature
#[derive(Parser, Debug)]
#[command(name = "dirsort")]
#[command(version)]
#[command(about = "Rule-based directory organizer", long_about = None)]
pub struct Cli {
    /// Directory to organize
    #[arg(required_unless_present = "print_default_config")]
    pub directory: Option<PathBuf>,

    /// Path to a rule configuration file (.toml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show what would be moved without touching anything
    #[arg(long, env = "DIRSORT_DRY_RUN")]
    pub dry_run: bool,

    /// Retries for a move that fails with a transient error
    #[arg(long, env = "DIRSORT_MAX_MOVE_RETRIES")]
    pub max_move_retries: Option<u32>,

    /// Base delay between retries, in milliseconds, doubled after each retry
    #[arg(long, env = "DIRSORT_RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    /// Alternative names tried when the destination name is taken
    #[arg(long, env = "DIRSORT_MAX_COLLISION_ATTEMPTS")]
    pub max_collision_attempts: Option<usize>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Print the built-in rules as TOML and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Builds the move policy: flags and environment first, then `[settings]`.
    pub fn move_policy(&self, config: &RuleConfig) -> MovePolicy {
        let mut policy = config.move_policy();
        if let Some(retries) = self.max_move_retries {
            policy.max_move_retries = retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            policy.retry_delay = Duration::from_millis(delay);
        }
        if let Some(attempts) = self.max_collision_attempts {
            policy.max_collision_attempts = attempts;
        }
        policy.dry_run = self.dry_run;
        policy
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

/// Installs the tracing subscriber. `RUST_LOG` takes precedence over flags.
pub fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs the CLI application.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dirsort::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["dirsort", "/path/to/Downloads", "--dry-run"]);
/// if let Err(e) = run(&cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run(cli: &Cli) -> Result<(), String> {
    if cli.print_default_config {
        let rendered = RuleConfig::default()
            .to_toml()
            .map_err(|e| format!("Error rendering default configuration: {}", e))?;
        print!("{}", rendered);
        return Ok(());
    }

    let directory = cli
        .directory
        .as_deref()
        .ok_or_else(|| "No directory given".to_string())?;

    let config = RuleConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let rules = config
        .to_rule_set()
        .map_err(|e| format!("Error building rules: {}", e))?;
    let policy = cli.move_policy(&config);

    if !cli.json {
        OutputFormatter::info(&format!("Organizing contents of: {}", directory.display()));
        if policy.dry_run {
            OutputFormatter::dry_run_notice("Nothing will be moved");
        }
    }

    let organizer = Organizer::new(rules, policy);
    let mut sink = ProgressSink::new(OutputFormatter::create_spinner());
    let result = organizer.organize_with(directory, &mut sink);
    sink.finish();
    let report = result.map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Error serializing report: {}", e))?;
        println!("{}", json);
    } else {
        OutputFormatter::report(&report);
    }

    Ok(())
}
