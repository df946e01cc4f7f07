use std::time::Instant;

use clap::ValueEnum;
use tracing::debug;

use crate::contract::{CommandFailure, ToolCommand, ToolRunner};

/// How the compress stage is timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimingMode {
    /// One run, whatever `--nrepeats` says.
    #[default]
    Single,
    /// `--nrepeats` runs; the mean is reported.
    Repeat,
}

impl TimingMode {
    #[must_use]
    pub fn runs(self, nrepeats: usize) -> usize {
        match self {
            Self::Single => 1,
            Self::Repeat => nrepeats.max(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingSamples {
    seconds: Vec<f64>,
}

impl TimingSamples {
    pub fn push(&mut self, value: f64) {
        self.seconds.push(value);
    }

    #[must_use]
    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    #[must_use]
    pub fn summarize(&self) -> TimingStats {
        TimingStats::from_samples(&self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub runs: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

impl TimingStats {
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len().max(1);
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|x| (*x - mean).powi(2)).sum::<f64>() / count as f64;

        Self {
            runs: sorted.len(),
            min: *sorted.first().unwrap_or(&0.0),
            max: *sorted.last().unwrap_or(&0.0),
            mean,
            stddev: variance.sqrt(),
        }
    }
}

/// Capture `command` `runs` times, stopping at the first failure.
pub fn time_runs<R: ToolRunner + ?Sized>(
    runner: &mut R,
    command: &ToolCommand,
    runs: usize,
) -> Result<TimingSamples, CommandFailure> {
    let mut samples = TimingSamples::default();
    for _ in 0..runs.max(1) {
        let start = Instant::now();
        runner.capture(command)?;
        samples.push(start.elapsed().as_secs_f64());
    }

    if samples.seconds().len() > 1 {
        let stats = samples.summarize();
        debug!(
            runs = stats.runs,
            min = stats.min,
            mean = stats.mean,
            max = stats.max,
            stddev = stats.stddev,
            "compress timing"
        );
    }
    Ok(samples)
}
