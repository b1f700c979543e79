use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::FramingError;

/// Why a splitter discarded bytes without producing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The framing was malformed; the splitter resynced at the next
    /// delimiter.
    Resync,
    /// The framing was well-formed but HMAC verification failed.
    AuthFailure,
}

#[derive(Debug)]
pub enum SplitOutcome {
    /// `buf` doesn't yet contain a complete record; call again once more
    /// bytes have been read.
    NeedMoreData,
    /// A complete record was found. `consumed` bytes (the record plus its
    /// framing) should be dropped from the front of `buf`.
    Record { consumed: usize, record: Bytes },
    /// `consumed` bytes should be dropped from the front of `buf` with no
    /// record produced.
    Skip { consumed: usize, reason: SkipReason },
}

/// Finds records inside a byte stream. Implementations are restartable:
/// `find_record` may be called repeatedly against a growing buffer, and
/// must not assume it sees the whole stream at once.
pub trait Splitter: Send {
    fn find_record(&mut self, buf: &[u8]) -> Result<SplitOutcome, FramingError>;
}

/// Drives a [`Splitter`] over an async byte stream, reading in chunks of at
/// least `min_read_size` bytes at a time.
pub struct StreamSplitter<R, S> {
    reader: R,
    splitter: S,
    buf: BytesMut,
    min_read_size: usize,
    resyncs: u64,
    auth_failures: u64,
}

const DEFAULT_MIN_READ_SIZE: usize = 64 * 1024;

impl<R, S> StreamSplitter<R, S>
where
    R: AsyncRead + Unpin,
    S: Splitter,
{
    pub fn new(reader: R, splitter: S) -> Self {
        Self::with_min_read_size(reader, splitter, DEFAULT_MIN_READ_SIZE)
    }

    pub fn with_min_read_size(reader: R, splitter: S, min_read_size: usize) -> Self {
        StreamSplitter {
            reader,
            splitter,
            buf: BytesMut::new(),
            min_read_size,
            resyncs: 0,
            auth_failures: 0,
        }
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    pub fn auth_failures(&self) -> u64 {
        self.auth_failures
    }

    /// Returns the next record, or `Ok(None)` once the stream is exhausted
    /// and no partial record remains.
    pub async fn next_record(&mut self) -> Result<Option<Bytes>, FramingError> {
        loop {
            match self.splitter.find_record(&self.buf)? {
                SplitOutcome::Record { consumed, record } => {
                    self.buf.advance(consumed);
                    return Ok(Some(record));
                }
                SplitOutcome::Skip { consumed, reason } => {
                    self.buf.advance(consumed.max(1));
                    match reason {
                        SkipReason::Resync => self.resyncs += 1,
                        SkipReason::AuthFailure => self.auth_failures += 1,
                    }
                }
                SplitOutcome::NeedMoreData => {
                    self.buf.reserve(self.min_read_size);
                    let n = self
                        .reader
                        .read_buf(&mut self.buf)
                        .await
                        .map_err(FramingError::Io)?;
                    if n == 0 {
                        // EOF: whatever is left in `buf` is an incomplete
                        // trailing record and is discarded.
                        return Ok(None);
                    }
                }
            }
        }
    }
}
