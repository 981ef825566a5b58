use std::time::Duration;

use bytes::Bytes;
use clap::{Args, Subcommand, ValueEnum};
use tcpsframe_frame::{FrameHeader, HeaderLayout};
use tcpsframe_session::DEMO_PAYLOAD;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device and run send/receive cycles.
    Probe(ProbeArgs),
    /// Print the wire bytes of one frame.
    Encode(EncodeArgs),
    /// Decode frames from hex.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LayoutArg {
    /// Version byte 1: addresses before flags.
    V1,
    /// Version byte 2: flags before addresses.
    V2,
}

impl From<LayoutArg> for HeaderLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::V1 => HeaderLayout::V1,
            LayoutArg::V2 => HeaderLayout::V2,
        }
    }
}

/// Header fields and payload of outgoing frames.
#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Header layout.
    #[arg(long, value_enum, default_value_t = LayoutArg::V1)]
    pub layout: LayoutArg,
    /// Message id (of the first frame when probing).
    #[arg(long, default_value = "0", value_parser = parse_u8)]
    pub id: u8,
    /// Source address (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0x12", value_parser = parse_u16)]
    pub source: u16,
    /// Destination address (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "128", value_parser = parse_u16)]
    pub dest: u16,
    /// Flag byte (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0x56", value_parser = parse_u8)]
    pub flags: u8,
    /// Payload as hex, e.g. "DEADBEEF". Default: DE AD BE EF.
    #[arg(long, value_name = "HEX")]
    pub payload: Option<String>,
}

impl FrameArgs {
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            layout: self.layout.into(),
            id: self.id,
            data_len: 0,
            source_addr: self.source,
            dest_addr: self.dest,
            flags: self.flags,
        }
    }

    pub fn payload(&self) -> CliResult<Bytes> {
        match &self.payload {
            Some(hex) => parse_hex(hex).map(Bytes::from),
            None => Ok(Bytes::from_static(&DEMO_PAYLOAD)),
        }
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Device host name or IP address.
    pub host: String,
    /// Device TCP port.
    #[arg(long, short = 'p', default_value = "80")]
    pub port: u16,
    /// Send header and payload as separate writes.
    #[arg(long)]
    pub fragment: bool,
    /// Stop after N cycles. Default: run until interrupted.
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Per-read and per-write deadline (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// TCP connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    /// Skip up to N bytes hunting for a start marker instead of failing.
    #[arg(long, value_name = "BYTES")]
    pub resync: Option<usize>,
    /// Ignore replies not addressed to --source and wait for the next one.
    #[arg(long)]
    pub match_address: bool,
    /// Enable TCP keepalive on the connection.
    #[arg(long)]
    pub keepalive: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire bytes as hex. Whitespace, ':' and '-' separators are ignored.
    pub hex: String,
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

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::new(USAGE, format!("invalid hex: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex has an odd number of digits: {input}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex: {input}")))
        })
        .collect()
}

fn parse_number(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input}"))
}

fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_number(input)?;
    u8::try_from(value).map_err(|_| format!("{value} does not fit in one byte"))
}

fn parse_u16(input: &str) -> Result<u16, String> {
    let value = parse_number(input)?;
    u16::try_from(value).map_err(|_| format!("{value} does not fit in two bytes"))
}
