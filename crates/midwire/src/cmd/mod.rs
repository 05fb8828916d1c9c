use std::time::Duration;

use clap::{Args, Subcommand};
use midwire_bridge::DEFAULT_QUEUE_CAPACITY;
use midwire_frame::DEFAULT_MAX_PAYLOAD;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod inspect;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bridge stdin through a middleware command and write its responses to stdout.
    Run(RunArgs),
    /// Act as a middleware: echo every frame from stdin back on stdout.
    Echo(EchoArgs),
    /// Decode frames from stdin and print them.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Middleware command line, split on whitespace (no shell quoting).
    pub command: String,
    /// Largest chunk forwarded to the middleware, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
    /// Responses buffered before the middleware is back-pressured.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Wait after closing stdin, and again after SIGTERM (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub shutdown_grace: String,
    /// Maximum time to wait for background threads on shutdown.
    #[arg(long, default_value = "5s")]
    pub join_timeout: String,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Uppercase ASCII letters in every payload.
    #[arg(long)]
    pub uppercase: bool,
    /// Largest accepted payload, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Stop after N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Largest accepted payload, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn require_positive(flag: &str, value: usize) -> CliResult<usize> {
    if value == 0 {
        return Err(CliError::new(USAGE, format!("{flag} must be greater than zero")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert_eq!(require_positive("--max-payload", 0).unwrap_err().code, USAGE);
        assert_eq!(require_positive("--max-payload", 8).unwrap(), 8);
    }
}
