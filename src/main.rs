//! lydroid command line entry point

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lydroid::commands::Cli;
use lydroid::core::{LyDroidError, APP_NAME, VERSION};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit status for a failed command; unclassified failures exit with 1
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<LyDroidError>().map(LyDroidError::exit_code).unwrap_or(1)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("{} v{}", APP_NAME, VERSION);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("[ERROR] Unable to start the async runtime: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli.execute()) {
        eprintln!("[ERROR] {:#}", err);
        std::process::exit(exit_code(&err));
    }
}
