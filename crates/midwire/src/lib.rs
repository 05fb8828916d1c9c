//! Stream captured traffic through an external middleware process.
//!
//! Each chunk of traffic is hex-encoded onto one line of the middleware's
//! stdin; every line the middleware writes back on stdout is decoded and
//! handed to the caller. The middleware's stderr is passed through untouched.
//!
//! # Crate Structure
//!
//! - [`process`]: Middleware spawning, exit policy and termination
//! - [`frame`]: Hex line framing
//! - [`bridge`]: Duplex bridge with pumps, response queue and shutdown (behind `bridge` feature)

/// Re-export process types.
pub mod process {
    pub use midwire_process::*;
}

/// Re-export frame types.
pub mod frame {
    pub use midwire_frame::*;
}

/// Re-export bridge types (requires `bridge` feature).
#[cfg(feature = "bridge")]
pub mod bridge {
    pub use midwire_bridge::*;
}

#[cfg(feature = "bridge")]
pub use midwire_bridge::{Bridge, BridgeConfig, BridgeError};
