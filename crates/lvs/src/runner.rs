//! Execution of the external administration tool.

use common::{Error, Result};
use std::process::Command;
use tracing::{debug, warn};

/// Runs an external command and returns its standard output.
///
/// Implementations must return an error when the command exits unsuccessfully.
#[cfg_attr(test, mockall::automock)]
pub trait Runner {
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        debug!(program, ?args, "running command");

        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(program, status = ?output.status.code(), %stderr, "command failed");
            return Err(Error::command(program, output.status.code(), stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl<R: Runner + ?Sized> Runner for &R {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        (**self).run(program, args)
    }
}
