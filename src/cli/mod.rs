use clap::Parser;
use std::path::PathBuf;

/// `slack-janitor` - keeps Slack channels trimmed to a fixed number of recent messages.
#[derive(Parser, Debug)]
#[command(name = "slack-janitor")]
#[command(version)]
#[command(
    about = "Deletes old Slack messages so each managed channel keeps only its most recent ones.",
    long_about = None
)]
pub struct Cli {
    /// Configuration document (.json, or TOML for any other extension)
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,
}
