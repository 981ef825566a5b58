use tcpsframe_frame::Frame;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = build_frame(&args)?;
    print_frames("encoded", &[frame], format);
    Ok(SUCCESS)
}

fn build_frame(args: &EncodeArgs) -> CliResult<Frame> {
    let payload = args.frame.payload()?;
    Frame::new(args.frame.header(), payload).map_err(|err| frame_error("encode failed", err))
}
