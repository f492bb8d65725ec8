//! Wire vocabulary shared by the hotkey listener and the pipe server.
//!
//! Every message is one line of text terminated by `\n`.  The client sends
//! exactly one [`Command`] per connection and the server answers with at
//! most one [`Reply`]:
//!
//! ```text
//! client → server   SHOW\n
//! server → client   OK\n
//! ```
//!
//! Matching is exact and case-sensitive.  A trailing `\r` is tolerated so
//! peers that write CRLF line endings interoperate.

use std::fmt;
use std::io::{self, BufRead, Read, Write};

/// Well-known name of the pipe both processes rendezvous on.
pub const DEFAULT_PIPE_NAME: &str = "PSClipboardPipe";

/// Longest line (in bytes, terminator included) either side will accept.
///
/// Anything longer is read up to this limit and treated as unrecognized.
pub const MAX_LINE_LEN: usize = 256;

const SHOW: &str = "SHOW";
const OK: &str = "OK";

/// A request sent by the hotkey listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bring the main window to the front near the pointer.
    Show,
}

impl Command {
    /// Parse one received line (terminator already stripped).
    ///
    /// Returns `None` for anything that is not a recognized command.
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            SHOW => Some(Command::Show),
            _ => None,
        }
    }

    /// The exact keyword written on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Show => SHOW,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The line the server wrote back.
///
/// The listener only logs it; nothing branches on the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK` — the action ran.
    Ok,
    /// Any other text.
    Other(String),
}

impl Reply {
    pub fn parse(line: &str) -> Self {
        if line == OK {
            Reply::Ok
        } else {
            Reply::Other(line.to_string())
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str(OK),
            Reply::Other(s) => write!(f, "{:?}", s),
        }
    }
}

/// Read a single line of at most [`MAX_LINE_LEN`] bytes.
///
/// Returns `Ok(None)` when the peer closed the stream before sending
/// anything.  Non-UTF-8 input yields [`io::ErrorKind::InvalidData`].
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = Read::take(&mut *reader, MAX_LINE_LEN as u64).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write `line` followed by `\n` and flush.
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}
