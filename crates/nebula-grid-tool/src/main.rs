//! The binary entry point for the grid tool.

use std::error::Error as _;

use clap::Parser;
use nebula_config::CliArgs;
use nebula_grid_tool::Startup;

fn main() {
    let args = CliArgs::parse();

    let startup = Startup::resolve(&args);
    let log_dir = startup.log_dir();
    nebula_log::init_logging(
        log_dir.as_deref(),
        cfg!(debug_assertions),
        Some(&startup.config),
    );
    startup.log_outcome();

    if let Err(e) = nebula_grid_tool::run(&startup.config, &args) {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        tracing::error!("{message}");
        std::process::exit(1);
    }
}
