use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "unify",
    about = "Voter account unification: resolve sign-in credentials and merge duplicate voters",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with merge settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run or resume the merge of one voter into another
    Merge(MergeArgs),
    /// Resolve a credential presented by a device, merging when needed
    Resolve(ResolveArgs),
    /// Show the merge ledger row for a pair
    Status(StatusArgs),
    /// Show merge log rows
    Log(LogArgs),
}

#[derive(Args)]
pub struct StateArg {
    /// JSON state file; created on first write
    #[arg(long)]
    pub state: PathBuf,
}

#[derive(Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub state: StateArg,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    /// Device token to rebind to `--to` once the merge completes
    #[arg(long)]
    pub device: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub state: StateArg,
    /// Device token whose session is rebound after a merge
    #[arg(long)]
    pub device: String,
    #[command(flatten)]
    pub credential: CredentialArgs,
    /// Do not merge when the device is already signed in
    #[arg(long)]
    pub skip_if_signed_in: bool,
}

/// Exactly one credential per call.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct CredentialArgs {
    #[arg(long)]
    pub email_secret: Option<String>,
    #[arg(long)]
    pub sms_secret: Option<String>,
    #[arg(long)]
    pub facebook_secret: Option<String>,
    #[arg(long)]
    pub facebook_id: Option<String>,
    #[arg(long)]
    pub twitter_secret: Option<String>,
    #[arg(long)]
    pub twitter_id: Option<String>,
    #[arg(long)]
    pub apple_id: Option<String>,
    #[arg(long)]
    pub invitation_secret: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub state: StateArg,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
}

#[derive(Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub state: StateArg,
    /// Only rows for this pair, written as `from:to`
    #[arg(long)]
    pub pair: Option<String>,
}
