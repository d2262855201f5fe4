pub mod actions;
pub mod audio;
pub mod capture;
pub mod cli;
pub mod commands;
pub mod display;
pub mod errors;
pub mod focus;
pub mod platform;
pub mod sensing;
pub mod settings;
pub mod utils;
pub mod window;

#[cfg(test)]
mod testing;

use std::process::ExitCode;

use clap::Parser;

pub fn run() -> ExitCode {
    // Initialize logging (RUST_LOG overrides the default level)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Args::parse();
    log::info!("autoaccept starting up (config {})", args.config.display());

    match commands::execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
