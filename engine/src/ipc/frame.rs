//! Newline framing with a hard size cap
//!
//! A peer that never sends a newline must not make us buffer without
//! bound, so a line is read through `take(limit + 1)` and anything past the
//! limit is skipped chunk by chunk up to the next newline.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Outcome of reading one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// The peer closed the stream before sending anything
    Eof,
    /// A complete line (or the final unterminated one) is in the buffer
    Line,
    /// The line exceeded the limit and was skipped; `size` counts every byte of it
    TooLarge { size: usize },
}

/// Read one line into `buf`, holding at most `limit + 1` bytes
///
/// `buf` is cleared first. The newline, if any, is left in `buf`.
pub async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(limit as u64 + 1).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if read <= limit {
        return Ok(LineRead::Line);
    }

    let mut size = read;
    if !buf.ends_with(b"\n") {
        size += skip_line(reader).await?;
    }
    buf.clear();
    Ok(LineRead::TooLarge { size })
}

/// Discard input up to and including the next newline
async fn skip_line<R>(reader: &mut R) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let (used, done) = {
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(skipped);
            }
            match chunk.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (chunk.len(), false),
            }
        };
        reader.consume(used);
        skipped += used;
        if done {
            return Ok(skipped);
        }
    }
}
