use std::path::{Path, PathBuf};

use clap::Parser;

use crate::shorthand::resolve_shorthand;
use crate::timing::TimingMode;

pub const DEFAULT_OUTPUT_STATS: &str = "hevc_roundtrip.log";
pub const DEFAULT_SQY: &str = "./sqy";
pub const DEFAULT_X265: &str = "x265";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_NREPEATS: usize = 10;

#[derive(Debug, Parser)]
#[command(about = "perform hevc roundtrip and print results")]
pub struct Args {
    /// .tif files to process
    pub inputfiles: Vec<PathBuf>,

    /// arguments to x265 (input and output file will be inserted, e.g. --lossless --preset ultrafast)
    #[arg(
        short = 'x',
        long = "x265_args",
        visible_alias = "x265-args",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub x265_args: String,

    /// file to append stats to
    #[arg(
        short = 'o',
        long = "output_stats",
        visible_alias = "output-stats",
        default_value = DEFAULT_OUTPUT_STATS
    )]
    pub output_stats: PathBuf,

    /// verbose logging
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// how many times the compression is repeated with --timing repeat
    #[arg(short = 'n', long, default_value_t = DEFAULT_NREPEATS)]
    pub nrepeats: usize,

    /// shorthand to insert to filenames
    #[arg(short = 's', long, default_value = "")]
    pub shorthand: String,

    /// location of the sqy app
    #[arg(short = 'a', long = "sqy", default_value = DEFAULT_SQY)]
    pub sqy: PathBuf,

    /// x265 executable
    #[arg(long, default_value = DEFAULT_X265)]
    pub x265: PathBuf,

    /// ffmpeg executable
    #[arg(long, default_value = DEFAULT_FFMPEG)]
    pub ffmpeg: PathBuf,

    /// how the compression step is timed
    #[arg(long, value_enum, default_value_t = TimingMode::Single)]
    pub timing: TimingMode,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{} does not exist", .0.display())]
    ToolNotFound(PathBuf),
    #[error("no input files given")]
    NoInputFiles,
    #[error("--nrepeats must be >= 1 with --timing repeat")]
    InvalidRepeatCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub sqy: PathBuf,
    pub x265: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            sqy: PathBuf::from(DEFAULT_SQY),
            x265: PathBuf::from(DEFAULT_X265),
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
        }
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    inputs: Vec<PathBuf>,
    codec_args: String,
    output_stats: PathBuf,
    verbose: bool,
    nrepeats: usize,
    shorthand: String,
    tools: ToolPaths,
    timing: TimingMode,
}

impl RunConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if !args.sqy.is_file() {
            return Err(ConfigError::ToolNotFound(args.sqy));
        }
        if args.inputfiles.is_empty() {
            return Err(ConfigError::NoInputFiles);
        }
        if args.timing == TimingMode::Repeat && args.nrepeats == 0 {
            return Err(ConfigError::InvalidRepeatCount);
        }

        let shorthand = resolve_shorthand(Some(args.shorthand.as_str()), &args.x265_args);
        Ok(Self {
            inputs: args.inputfiles,
            codec_args: args.x265_args,
            output_stats: args.output_stats,
            verbose: args.verbose,
            nrepeats: args.nrepeats,
            shorthand,
            tools: ToolPaths {
                sqy: args.sqy,
                x265: args.x265,
                ffmpeg: args.ffmpeg,
            },
            timing: args.timing,
        })
    }

    #[must_use]
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    #[must_use]
    pub fn codec_args(&self) -> &str {
        &self.codec_args
    }

    #[must_use]
    pub fn output_stats(&self) -> &Path {
        &self.output_stats
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub fn nrepeats(&self) -> usize {
        self.nrepeats
    }

    #[must_use]
    pub fn shorthand(&self) -> &str {
        &self.shorthand
    }

    #[must_use]
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    #[must_use]
    pub fn timing(&self) -> TimingMode {
        self.timing
    }

    /// Compressor runs per file for the configured timing mode.
    #[must_use]
    pub fn compress_runs(&self) -> usize {
        self.timing.runs(self.nrepeats)
    }
}
