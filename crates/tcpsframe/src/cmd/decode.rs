use bytes::BytesMut;
use tcpsframe_frame::{decode_frame, Frame, MAX_DATA_LEN};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let frames = decode_all(&bytes)?;
    print_frames("decoded", &frames, format);
    Ok(SUCCESS)
}

/// Decode back-to-back frames. Leftover bytes that do not complete a frame are an error.
fn decode_all(bytes: &[u8]) -> CliResult<Vec<Frame>> {
    if bytes.is_empty() {
        return Err(CliError::new(USAGE, "nothing to decode"));
    }

    let mut buf = BytesMut::from(bytes);
    let mut frames = Vec::new();
    while let Some(frame) =
        decode_frame(&mut buf, MAX_DATA_LEN).map_err(|err| frame_error("decode failed", err))?
    {
        frames.push(frame);
    }

    if !buf.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "decode failed: {} trailing bytes do not form a complete frame",
                buf.len()
            ),
        ));
    }
    Ok(frames)
}
