use tcpsframe_frame::{FrameError, MAX_DATA_LEN};
use tcpsframe_session::{connect_with_config, SessionConfig, ShutdownHandle, StopReason};
use tcpsframe_transport::TcpConfig;

use crate::cmd::{parse_duration, ProbeArgs};
use crate::exit::{frame_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_exchange, print_summary, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = session_config(&args)?;
    let addr = device_addr(&args.host, args.port);

    let mut session =
        connect_with_config(&addr, config).map_err(|err| session_error("connect failed", err))?;
    install_ctrlc_handler(session.shutdown_handle())?;

    let mut cycle = 0u64;
    let summary = session
        .run(args.count, |exchange| {
            print_exchange(cycle, exchange, format);
            cycle += 1;
        })
        .map_err(|err| session_error("probe failed", err))?;

    if summary.stop == StopReason::Cancelled {
        tracing::info!(completed = summary.completed, "probe interrupted");
    }
    print_summary(&summary, format);

    Ok(SUCCESS)
}

fn session_config(args: &ProbeArgs) -> CliResult<SessionConfig> {
    let io_timeout = parse_duration(&args.timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let header = args.frame.header();
    let payload = args.frame.payload()?;
    if payload.len() > MAX_DATA_LEN {
        return Err(frame_error(
            "invalid payload",
            FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_DATA_LEN,
            },
        ));
    }

    Ok(SessionConfig {
        layout: header.layout,
        first_id: header.id,
        source_addr: header.source_addr,
        dest_addr: header.dest_addr,
        flags: header.flags,
        payload,
        fragment: args.fragment,
        read_timeout: Some(io_timeout),
        write_timeout: Some(io_timeout),
        resync_limit: args.resync,
        match_address: args.match_address,
        tcp: TcpConfig {
            connect_timeout: Some(connect_timeout),
            keepalive: args.keepalive,
            ..TcpConfig::default()
        },
    })
}

/// `host:port`, bracketing bare IPv6 literals.
fn device_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn install_ctrlc_handler(shutdown: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || shutdown.request()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
