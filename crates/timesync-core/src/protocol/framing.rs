//! Newline framing for the time-sync TCP stream.
//!
//! TCP delivers a byte stream, so a single `read` may return half a request
//! or two requests at once. Both sides terminate every message with `\n` and
//! read one line at a time through [`read_line_bounded`].

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::protocol::messages::LINE_TERMINATOR;

/// Reads one line of at most `limit` bytes, terminator included.
///
/// Returns `Ok(None)` on a clean EOF before any byte arrived. A final line
/// without a terminator (the peer half-closed after writing) is returned as-is.
///
/// A rejected line is consumed through its terminator, so the next call
/// starts at the following line.
///
/// # Errors
///
/// - [`io::ErrorKind::InvalidData`] if the line is not UTF-8 or exceeds
///   `limit` without a terminator.
/// - Any error from the underlying reader.
pub async fn read_line_bounded<R>(reader: &mut R, limit: usize) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64)
        .read_until(LINE_TERMINATOR, &mut line)
        .await?;

    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with(&[LINE_TERMINATOR]) && read >= limit {
        discard_line(reader).await?;
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {limit} bytes"),
        ));
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Skips input up to and including the next terminator, or to EOF.
async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|b| *b == LINE_TERMINATOR) {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let skipped = buf.len();
                reader.consume(skipped);
            }
        }
    }
}
