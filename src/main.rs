use std::process::ExitCode;

use bulkloader::{Cli, execute, init_logger};
use clap::Parser;
use log::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logger(cli.verbose, cli.quiet) {
        eprintln!("Failed to initialize logger: {e}");
        return ExitCode::FAILURE;
    }

    info!("Starting BigQuery bulk loader");
    debug!("Command: {:?}", cli.command);

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
