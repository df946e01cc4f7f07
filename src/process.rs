use std::process::{Command, Stdio};

use tracing::debug;

use crate::contract::{CommandFailure, ToolCommand, ToolRunner};

/// Runs tools as child processes, blocking until each one exits.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(command: &ToolCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).stdin(Stdio::null());
        cmd
    }
}

impl ToolRunner for SystemRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<(), CommandFailure> {
        debug!("{command}");
        let status = Self::command(command)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(CommandFailure::Spawn)?;
        if !status.success() {
            return Err(CommandFailure::Status(status));
        }
        Ok(())
    }

    fn capture(&mut self, command: &ToolCommand) -> Result<String, CommandFailure> {
        debug!("{command}");
        let output = Self::command(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .map_err(CommandFailure::Spawn)?;
        if !output.status.success() {
            return Err(CommandFailure::Status(output.status));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
