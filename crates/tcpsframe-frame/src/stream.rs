use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tcpsframe_transport::DeviceStream;

use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Caps how long the next blocking read on `T` may wait.
pub type ArmTimeout<T> = fn(&T, Duration) -> Result<()>;

/// Reads exact byte counts from a stream that may deliver data in chunks
/// of any size, down to one byte per call.
///
/// No delimiters, no line buffering: every read is purely byte-counted.
pub struct StreamReader<T> {
    inner: T,
    read_timeout: Option<Duration>,
    arm: Option<ArmTimeout<T>>,
}

impl<T: Read> StreamReader<T> {
    /// Create a reader with no deadline.
    pub fn new(inner: T) -> Self {
        Self::with_timeout(inner, None)
    }

    /// Create a reader whose `read_exact` calls give up once `read_timeout`
    /// has passed.
    ///
    /// The deadline is checked between reads, so a single blocking read is
    /// bounded only by the stream's own timeout. Use
    /// [`with_deadline`](Self::with_deadline) or [`for_device`](StreamReader::for_device)
    /// to bound each read too.
    pub fn with_timeout(inner: T, read_timeout: Option<Duration>) -> Self {
        Self {
            inner,
            read_timeout,
            arm: None,
        }
    }

    /// Like [`with_timeout`](Self::with_timeout), but before every blocking
    /// read `arm` is handed the time left until the deadline, so a single
    /// read cannot outlive it.
    pub fn with_deadline(inner: T, read_timeout: Option<Duration>, arm: ArmTimeout<T>) -> Self {
        Self {
            inner,
            read_timeout,
            arm: Some(arm),
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// - `Ok(0)` from the stream is end-of-stream and fails with
    ///   `ConnectionClosed`; bytes collected so far are dropped.
    /// - `Interrupted` is a zero-byte read that is not closure and is retried.
    /// - `WouldBlock`/`TimedOut` are retried until this call's deadline has
    ///   passed, then fail with `Timeout`. Without a deadline they fail at once.
    pub fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);
        let deadline = self.read_timeout.map(|timeout| Instant::now() + timeout);
        let mut filled = 0usize;

        while filled < n {
            if let (Some(deadline), Some(arm)) = (deadline, self.arm) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(FrameError::Timeout);
                }
                arm(&self.inner, remaining)?;
            }

            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(FrameError::ConnectionClosed {
                        expected: n,
                        received: filled,
                    })
                }
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => match deadline {
                    Some(deadline) if Instant::now() < deadline => {
                        std::thread::yield_now();
                        continue;
                    }
                    _ => return Err(FrameError::Timeout),
                },
                Err(err) => return Err(FrameError::Io(err)),
            }

            if filled < n && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(FrameError::Timeout);
            }
        }

        Ok(buf.freeze())
    }

    /// Current per-call deadline.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Change the per-call deadline for subsequent reads.
    pub fn set_read_timeout(&mut self, read_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl StreamReader<DeviceStream> {
    /// Reader over a device socket whose receive timeout tracks the deadline.
    pub fn for_device(inner: DeviceStream, read_timeout: Option<Duration>) -> Self {
        Self::with_deadline(inner, read_timeout, |stream, remaining| {
            stream
                .set_read_timeout(Some(remaining))
                .map_err(transport_to_frame_error)
        })
    }
}

pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
