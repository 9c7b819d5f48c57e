//! Line-oriented reader implementing the Munin framing convention.
//!
//! Replies are either a single line, or a block of lines closed by a line
//! holding only `.`.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Line that closes a multiline block.
pub const TERMINATOR: &str = ".";

/// How a clean end-of-stream inside a multiline block is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Return the lines collected so far as a complete block.
    #[default]
    Lenient,
    /// Report the block as truncated.
    Strict,
}

/// Errors returned by [`LineReader`].
///
/// Both variants carry the complete lines received before the failure.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream ended before the line or block was complete.
    #[error("stream ended early")]
    Truncated { received: Vec<String> },

    /// The underlying socket failed.
    #[error("read failed: {source}")]
    Io {
        received: Vec<String>,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Complete lines received before the failure.
    pub fn received(&self) -> &[String] {
        match self {
            Self::Truncated { received } | Self::Io { received, .. } => received,
        }
    }
}

impl From<ReadError> for std::io::Error {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Truncated { .. } => std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by node",
            ),
            ReadError::Io { source, .. } => source,
        }
    }
}

/// Buffered line reader over a node connection.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    mode: ReadMode,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    /// Wrap a buffered stream with lenient block termination.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            mode: ReadMode::default(),
            buf: Vec::with_capacity(256),
        }
    }

    /// Set the end-of-stream policy for multiline reads.
    pub fn with_mode(mut self, mode: ReadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Current end-of-stream policy.
    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Read one newline-terminated line, without its line ending.
    ///
    /// End-of-stream before the newline is reported as [`ReadError::Truncated`].
    pub async fn read_line(&mut self) -> Result<String, ReadError> {
        match self.next_line().await {
            Ok(Line::Complete(line)) => Ok(line),
            Ok(Line::Eof | Line::Partial) => Err(ReadError::Truncated {
                received: Vec::new(),
            }),
            Err(source) => Err(ReadError::Io {
                received: Vec::new(),
                source,
            }),
        }
    }

    /// Read lines until the `.` terminator, which is not included.
    pub async fn read_multiline(&mut self) -> Result<Vec<String>, ReadError> {
        let mut received = Vec::new();

        loop {
            let line = match self.next_line().await {
                Ok(line) => line,
                Err(source) => return Err(ReadError::Io { received, source }),
            };

            match line {
                Line::Complete(line) if line.eq_ignore_ascii_case(TERMINATOR) => {
                    return Ok(received);
                }
                Line::Complete(line) => received.push(line),
                Line::Partial => return Err(ReadError::Truncated { received }),
                Line::Eof => match self.mode {
                    ReadMode::Lenient => {
                        tracing::warn!(
                            lines = received.len(),
                            "Stream closed before block terminator, accepting partial block"
                        );
                        return Ok(received);
                    }
                    ReadMode::Strict => return Err(ReadError::Truncated { received }),
                },
            }
        }
    }

    /// Consume the reader, returning the wrapped stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn next_line(&mut self) -> std::io::Result<Line> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf).await?;

        if n == 0 {
            return Ok(Line::Eof);
        }
        if self.buf.last() != Some(&b'\n') {
            return Ok(Line::Partial);
        }

        self.buf.pop();
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Line::Complete(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

enum Line {
    Complete(String),
    /// Bytes were pending when the stream ended.
    Partial,
    /// The stream ended on a line boundary.
    Eof,
}
