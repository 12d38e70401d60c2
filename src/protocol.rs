//! Line protocol framing and reply formatting.
//!
//! Both hops (client to dispatcher, dispatcher to worker) speak the same
//! protocol: exactly one newline-terminated UTF-8 line in, exactly one
//! newline-terminated line out, then the connection closes.
//!
//! ```text
//! Request:  SUM 1 2 3\n
//! Reply:    worker-1 ok: SUM => 6 (took 0 ms)\n
//! ```

use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Maximum accepted request line length, terminator included
pub const MAX_REQUEST_LENGTH: usize = 64 * 1024;

/// Maximum accepted reply line length, terminator included.
///
/// Replies outgrow requests: `FACT 20000` alone is about 77,000 digits.
pub const MAX_REPLY_LENGTH: usize = 1024 * 1024;

/// Read one newline-terminated line of at most `limit` bytes.
///
/// Returns `Ok(None)` when the peer closed before a complete line arrived.
/// A trailing fragment without `\n` (or one longer than `limit`) counts as
/// no data. The returned bytes keep their terminator.
pub async fn read_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Option<Bytes>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::with_capacity(128);
    let n = (&mut *reader)
        .take(limit as u64)
        .read_until(b'\n', &mut buffer)
        .await?;

    if n == 0 || buffer.last() != Some(&b'\n') {
        return Ok(None);
    }

    Ok(Some(Bytes::from(buffer)))
}

/// Strip the line terminator (`\n` or `\r\n`) from a line.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Request text as recorded in the dispatcher's event log.
pub fn trimmed_text(line: &[u8]) -> String {
    String::from_utf8_lossy(line).trim().to_string()
}

/// A request line split into command name and argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    /// The line without its terminator
    pub raw: &'a str,
    /// Upper-cased command name (empty for a blank line)
    pub name: String,
    /// Everything after the command name, surrounding whitespace removed
    pub arg: &'a str,
}

impl<'a> Request<'a> {
    /// Split a request line on the first run of whitespace.
    pub fn parse(line: &'a str) -> Self {
        let raw = strip_terminator(line);
        let trimmed = raw.trim();

        let (name, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (trimmed, ""),
        };

        Request {
            raw,
            name: name.to_uppercase(),
            arg,
        }
    }
}

/// Format the single reply line a worker sends back.
///
/// Shape: `<worker> ok: <COMMAND> => <result> (took <ms> ms)\n`. A blank
/// command name is displayed as `ECHO`.
pub fn format_reply(worker: &str, command: &str, result: &str, elapsed: Duration) -> String {
    let command = if command.is_empty() { "ECHO" } else { command };
    format!(
        "{worker} ok: {command} => {result} (took {} ms)\n",
        elapsed.as_millis()
    )
}
