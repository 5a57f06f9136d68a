//! Drivers for each subcommand
//!
//! Every driver writes regular output to `out` and diagnostics to `err` and
//! returns the process exit code.

pub mod custom;
pub mod export;
pub mod import;
pub mod rm_all;
pub mod simple;
pub mod validate;

use anyhow::Result;
use std::io::Write;
use vcsgrip_core::domain::{any_failure, JobResult, LogParams, Operation};

use crate::cli::{CommonArgs, Command};
use crate::config::Config;
use crate::executor::ExecutorOptions;
use crate::output::Palette;

/// Settings shared by all drivers for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config: Config,
    pub palette: Palette,
    pub debug: bool,
    /// Print the repository list before running
    pub list_repos: bool,
}

impl Invocation {
    pub fn new(common: &CommonArgs) -> Result<Self> {
        let config = Config::from_cli_and_file(common)?;
        let palette = Palette::detect(config.color);
        Ok(Self {
            config,
            palette,
            debug: common.debug,
            list_repos: common.repos,
        })
    }

    pub fn executor_options(&self, show_progress: bool) -> ExecutorOptions {
        ExecutorOptions {
            workers: self.config.workers,
            show_progress,
            debug: self.debug,
        }
    }
}

/// 1 if any result failed, 0 otherwise
pub fn exit_code(results: &[JobResult]) -> i32 {
    if any_failure(results) { 1 } else { 0 }
}

pub fn run<W: Write, E: Write>(command: Command, out: &mut W, err: &mut E) -> Result<i32> {
    let invocation = Invocation::new(command.common())?;
    match command {
        Command::Branch(args) => {
            simple::run(Operation::Branch { all: args.all }, &args.search, &invocation, out)
        }
        Command::Custom(args) => custom::run(&args, &invocation, out),
        Command::Diff(args) => {
            simple::run(Operation::Diff { context: args.context }, &args.search, &invocation, out)
        }
        Command::Export(args) => export::run(&args, &invocation, out, err),
        Command::Import(args) => import::run(&args, &invocation, out, err),
        Command::Log(args) => {
            let params = LogParams {
                limit: args.limit,
                limit_tag: args.limit_tag,
                limit_untagged: args.limit_untagged,
            };
            simple::run(Operation::Log(params), &args.search, &invocation, out)
        }
        Command::Pull(args) => simple::run(Operation::Pull, &args.search, &invocation, out),
        Command::Push(args) => simple::run(Operation::Push, &args.search, &invocation, out),
        Command::Remotes(args) => simple::run(Operation::Remotes, &args.search, &invocation, out),
        Command::RmAll(args) => rm_all::run(&args, &invocation, err),
        Command::Status(args) => {
            simple::run(Operation::Status { quiet: args.quiet }, &args.search, &invocation, out)
        }
        Command::Validate(args) => validate::run(&args, &invocation, out, err),
    }
}
