use std::fmt;
use std::process::Command;
use std::str::FromStr;

use crate::error::{ProcessError, Result};

/// A middleware invocation: program plus arguments.
///
/// The command string is split on whitespace only. There is no quoting,
/// escaping or variable expansion, so an argument can never contain a space.
/// Wrap anything more elaborate in a script and pass the script path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    raw: String,
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Tokenize a command string into program and arguments.
    pub fn parse(command: &str) -> Result<Self> {
        let mut tokens = command.split_whitespace().map(str::to_string);
        let program = tokens.next().ok_or(ProcessError::EmptyCommand)?;
        let args = tokens.collect();

        Ok(Self {
            raw: command.trim().to_string(),
            program,
            args,
        })
    }

    /// The program to execute (first token).
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program (remaining tokens).
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command string as it was configured, trimmed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Build a `std::process::Command` for this invocation. Stdio is left to the caller.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl FromStr for CommandLine {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
