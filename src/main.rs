use std::io;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use vcsgrip::cli;
use vcsgrip::commands;

fn main() -> ExitCode {
    let cli_args = match cli::parse_from_args(std::env::args_os()) {
        Ok(cli_args) => cli_args,
        Err(e) => e.exit(),
    };

    // RUST_LOG wins over --debug
    let default_level = if cli_args.command.common().debug { "warn,vcsgrip=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!("running {:?}", cli_args.command);

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr();
    match commands::run(cli_args.command, &mut stdout, &mut stderr) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
