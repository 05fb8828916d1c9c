use std::io::{self, Read, Write};

use midwire_frame::{Frame, FrameConfig, FrameError, FrameReader, FrameWriter};

use crate::cmd::{require_positive, EchoArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: require_positive("--max-payload", args.max_payload)?,
    };

    let echoed = echo_frames(io::stdin().lock(), io::stdout().lock(), args.uppercase, config)
        .map_err(|err| frame_error("echo failed", err))?;

    tracing::info!(frames = echoed, "input closed");
    Ok(SUCCESS)
}

/// Echo frames from `input` to `output` until either side closes.
///
/// Returns the number of frames written.
fn echo_frames<R: Read, W: Write>(
    input: R,
    output: W,
    uppercase: bool,
    config: FrameConfig,
) -> Result<u64, FrameError> {
    let mut reader = FrameReader::with_config(input, config.clone());
    let mut writer = FrameWriter::with_config(output, config);
    let mut echoed = 0u64;

    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, "skipping malformed frame");
                continue;
            }
            Err(err) => return Err(err),
        };
        if frame.is_empty() {
            continue;
        }

        let frame = if uppercase {
            Frame::new(frame.payload.to_ascii_uppercase())
        } else {
            frame
        };

        match writer.write_frame(&frame) {
            Ok(()) => {}
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(err),
        }
        echoed += 1;
        tracing::debug!(size = frame.payload.len(), "echoed frame");
    }

    Ok(echoed)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn echo(input: &[u8], uppercase: bool) -> (Vec<u8>, u64) {
        let mut out = Vec::new();
        let count = echo_frames(
            Cursor::new(input.to_vec()),
            &mut out,
            uppercase,
            FrameConfig::default(),
        )
        .unwrap();
        (out, count)
    }

    #[test]
    fn echoes_frames_unchanged() {
        let (out, count) = echo(b"616263\n4142\n", false);
        assert_eq!(out, b"616263\n4142\n");
        assert_eq!(count, 2);
    }

    #[test]
    fn uppercases_ascii_payloads() {
        let (out, _) = echo(b"616263\n", true);
        assert_eq!(out, b"414243\n");
    }

    #[test]
    fn normalizes_uppercase_hex_to_lowercase() {
        let (out, _) = echo(b"4A4B\n", false);
        assert_eq!(out, b"4a4b\n");
    }

    #[test]
    fn skips_malformed_and_empty_frames() {
        let (out, count) = echo(b"zz\n616\n\n6869\n", false);
        assert_eq!(out, b"6869\n");
        assert_eq!(count, 1);
    }

    #[test]
    fn closed_output_ends_quietly() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let count = echo_frames(
            Cursor::new(b"6869\n".to_vec()),
            Closed,
            false,
            FrameConfig::default(),
        )
        .unwrap();
        assert_eq!(count, 0);
    }
}
