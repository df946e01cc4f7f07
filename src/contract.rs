use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::{fmt, fmt::Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Convert,
    Measure,
    Compress,
    Decompress,
    RoundTripConvert,
    Compare,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convert => f.write_str("convert"),
            Self::Measure => f.write_str("measure"),
            Self::Compress => f.write_str("compress"),
            Self::Decompress => f.write_str("decompress"),
            Self::RoundTripConvert => f.write_str("roundtrip_convert"),
            Self::Compare => f.write_str("compare"),
        }
    }
}

/// One external invocation as a program plus distinct argv tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    #[error("{0}")]
    Spawn(#[source] io::Error),
    #[error("{0}")]
    Status(ExitStatus),
    #[error("could not convert string to float: '{0}'")]
    InvalidMetric(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{command} failed with {failure}")]
    Command {
        stage: Stage,
        command: ToolCommand,
        #[source]
        failure: CommandFailure,
    },
    #[error("{action} failed with {source}")]
    Io {
        stage: Stage,
        action: String,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    #[must_use]
    pub fn command(stage: Stage, command: &ToolCommand, failure: CommandFailure) -> Self {
        Self::Command {
            stage,
            command: command.clone(),
            failure,
        }
    }

    #[must_use]
    pub fn io(stage: Stage, action: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            stage,
            action: action.into(),
            source,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Command { stage, .. } | Self::Io { stage, .. } => *stage,
        }
    }
}

/// Executes external tools on behalf of the pipeline.
pub trait ToolRunner {
    /// Run to completion, inheriting stdio.
    fn run(&mut self, command: &ToolCommand) -> Result<(), CommandFailure>;

    /// Run to completion and return what the tool printed on stdout.
    fn capture(&mut self, command: &ToolCommand) -> Result<String, CommandFailure>;
}
