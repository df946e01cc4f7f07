use std::process::ExitCode;

use clap::Parser;
use hevc_roundtrip::{Args, RunConfig, logging};
use tracing::error;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let config = match RunConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match hevc_roundtrip::run(&config) {
        Ok(_) => {
            println!("written {}", config.output_stats().display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
