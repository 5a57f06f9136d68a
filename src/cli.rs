use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::output::ColorChoice;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "vcs", version)]
#[command(about = "Run version control commands across many repositories in parallel")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Show the branches
    Branch(BranchArgs),
    /// Run a custom command
    Custom(CustomArgs),
    /// Show changes in the working tree
    Diff(DiffArgs),
    /// Export the list of repositories
    Export(ExportArgs),
    /// Import the list of repositories
    Import(ImportArgs),
    /// Show commit logs
    Log(LogArgs),
    /// Bring changes from the repository into the working copy
    Pull(SimpleArgs),
    /// Push changes from the working copy to the repository
    Push(SimpleArgs),
    /// Show the URL of the repository
    Remotes(SimpleArgs),
    /// Remove the directories listed in a repository list file
    RmAll(RmAllArgs),
    /// Show the working copy status
    Status(StatusArgs),
    /// Validate the repository list file
    Validate(ValidateArgs),
}

/// Flags every subcommand accepts
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct CommonArgs {
    /// Show debug messages
    #[arg(long)]
    pub debug: bool,

    /// List repositories which the command operates on
    #[arg(long)]
    pub repos: bool,

    /// Number of parallel worker threads
    #[arg(short, long, value_name = "N", value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// When to color the output
    #[arg(long, value_enum)]
    pub color: Option<ColorChoice>,
}

/// Where to look for repositories and how to show results
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SearchArgs {
    /// Hide repositories with empty output
    #[arg(short = 's', long, visible_alias = "skip-empty")]
    pub hide_empty: bool,

    /// Search for nested repositories
    #[arg(short, long)]
    pub nested: bool,

    /// Base paths to look for repositories
    #[arg(value_name = "PATHS", default_value = ".", value_parser = existing_dir)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SimpleArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct BranchArgs {
    /// Show all branches
    #[arg(short, long)]
    pub all: bool,
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DiffArgs {
    /// Generate diffs with <N> lines of context
    #[arg(long, value_name = "N")]
    pub context: Option<u32>,
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LogArgs {
    /// Limit number of logs, 0 for unlimited
    #[arg(short, long, value_name = "N", default_value_t = 3)]
    pub limit: u32,

    /// Limit number of logs to the changes since a tag
    #[arg(long, value_name = "TAG", conflicts_with = "limit_untagged")]
    pub limit_tag: Option<String>,

    /// Limit number of logs to the changes since the last tag
    #[arg(long)]
    pub limit_untagged: bool,

    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct StatusArgs {
    /// Don't show unversioned items
    #[arg(short, long)]
    pub quiet: bool,
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CustomArgs {
    /// Run command on 'bzr' repositories
    #[arg(long)]
    pub bzr: bool,
    /// Run command on 'git' repositories
    #[arg(long)]
    pub git: bool,
    /// Run command on 'hg' repositories
    #[arg(long)]
    pub hg: bool,
    /// Run command on 'svn' repositories
    #[arg(long)]
    pub svn: bool,

    /// Arbitrary arguments passed to each vcs invocation, must come last
    #[arg(long = "args", required = true)]
    pub has_args: bool,

    /// Everything after `--args`
    #[arg(skip)]
    pub client_args: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ExportArgs {
    /// Export commit hashes instead of branch names
    #[arg(long, conflicts_with = "exact_with_tags")]
    pub exact: bool,

    /// Export unique tag names or commit hashes instead of branch names
    #[arg(long)]
    pub exact_with_tags: bool,

    /// Search for nested repositories
    #[arg(short, long)]
    pub nested: bool,

    /// Base path to look for repositories
    #[arg(default_value = ".", value_parser = existing_dir)]
    pub path: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ImportArgs {
    /// Repository list file, stdin when omitted
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Delete existing directories if they don't contain the repository being imported
    #[arg(long)]
    pub force: bool,

    /// Create a shallow clone without a history
    #[arg(long)]
    pub shallow: bool,

    /// Recurse into submodules
    #[arg(long)]
    pub recursive: bool,

    /// Retry commands requiring network access N times on failure
    #[arg(long, value_name = "N")]
    pub retry: Option<u32>,

    /// Don't overwrite existing directories or change custom checkouts in repos using the same URL
    #[arg(long)]
    pub skip_existing: bool,

    /// Base path to clone repositories to
    #[arg(default_value = ".", value_parser = existing_dir)]
    pub path: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Repository list file, stdin when omitted
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Retry commands requiring network access N times on failure
    #[arg(long, value_name = "N")]
    pub retry: Option<u32>,

    /// Base path to run the checks from
    #[arg(default_value = ".", value_parser = existing_dir)]
    pub path: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RmAllArgs {
    /// Repository list file, stdin when omitted
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Print the paths instead of removing them
    #[arg(short = 'n', long, conflicts_with = "force", required_unless_present = "force")]
    pub dry_run: bool,

    /// Remove the paths
    #[arg(short, long)]
    pub force: bool,

    /// Base path the listed paths are relative to
    #[arg(default_value = ".", value_parser = existing_dir)]
    pub path: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Branch(args) => &args.common,
            Command::Custom(args) => &args.common,
            Command::Diff(args) => &args.common,
            Command::Export(args) => &args.common,
            Command::Import(args) => &args.common,
            Command::Log(args) => &args.common,
            Command::Pull(args) | Command::Push(args) | Command::Remotes(args) => &args.common,
            Command::RmAll(args) => &args.common,
            Command::Status(args) => &args.common,
            Command::Validate(args) => &args.common,
        }
    }
}

/// Parse the command line, passing everything after `custom --args` through untouched
pub fn parse_from_args<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let passthrough = match args.iter().position(|arg| arg == "--args") {
        Some(index) => args.split_off(index + 1),
        None => Vec::new(),
    };

    let mut cli = CliArgs::try_parse_from(args)?;
    if let Command::Custom(custom) = &mut cli.command {
        custom.client_args = passthrough
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
    }
    Ok(cli)
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if !path.exists() {
        return Err(format!("Path '{value}' does not exist."));
    }
    if !path.is_dir() {
        return Err(format!("Path '{value}' is not a directory."));
    }
    Ok(path)
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err(format!("invalid positive int value: '{value}'")),
        Ok(workers) => Ok(workers),
        Err(_) => Err(format!("invalid int value: '{value}'")),
    }
}
