use std::io;

use midwire_frame::{FrameConfig, FrameError, FrameReader};

use crate::cmd::{require_positive, InspectArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: require_positive("--max-payload", args.max_payload)?,
    };
    let mut reader = FrameReader::with_config(io::stdin().lock(), config);

    let mut printed = 0u64;
    let mut malformed = 0u64;
    while args.count.is_none_or(|limit| printed < limit) {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) if err.is_recoverable() => {
                malformed += 1;
                tracing::warn!(error = %err, "skipping malformed frame");
                continue;
            }
            Err(err) => return Err(frame_error("read failed", err)),
        };
        if frame.is_empty() {
            continue;
        }

        printed += 1;
        print_frame(printed, &frame, format);
    }

    tracing::debug!(frames = printed, malformed, "inspect finished");
    Ok(SUCCESS)
}
