//! Supervision of the external middleware process.
//!
//! This is the lowest layer of midwire. It turns a command string into a
//! running child process with piped stdin/stdout, forwards the child's stderr
//! untouched to the host, and waits for the child on a dedicated thread.
//!
//! Exit handling is fail-fast: under the default [`ExitPolicy::Terminate`] an
//! unexpected failure of the middleware ends the host process.

pub mod command;
pub mod error;
pub mod lifecycle;
pub mod supervisor;

pub use command::CommandLine;
pub use error::{ProcessError, Result};
pub use lifecycle::{ExitOutcome, ExitPolicy, ShutdownGrace, FATAL_EXIT_CODE};
pub use supervisor::MiddlewareProcess;
