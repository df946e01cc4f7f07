use anyhow::{Context, Result};

pub mod config;
pub mod contract;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod record;
pub mod report;
pub mod shorthand;
pub mod timing;

pub use config::{Args, ConfigError, RunConfig, ToolPaths};
pub use contract::{CommandFailure, Stage, StageError, ToolCommand, ToolRunner};
pub use paths::RoundtripPaths;
pub use pipeline::{RoundtripPipeline, Toolchain, parse_metrics};
pub use process::SystemRunner;
pub use record::{CompressionSample, Field, FileRecord, RunResults};
pub use report::ReportTable;
pub use shorthand::{derive_shorthand, resolve_shorthand};
pub use timing::{TimingMode, TimingStats};

/// Round-trip every input with `runner` and append the report to the configured file.
pub fn run_with<R: ToolRunner>(config: &RunConfig, runner: R) -> Result<RunResults> {
    let mut pipeline = RoundtripPipeline::new(config, runner);
    let results = pipeline.run(config.inputs());

    let table = ReportTable::from_results(&results).context("render report")?;
    let output = config.output_stats();
    table
        .append_to(output)
        .with_context(|| format!("append report to {}", output.display()))?;
    Ok(results)
}

pub fn run(config: &RunConfig) -> Result<RunResults> {
    run_with(config, SystemRunner)
}
