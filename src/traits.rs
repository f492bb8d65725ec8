//! Core traits that decouple clipwake from any specific transport, hotkey
//! backend, or UI toolkit.
//!
//! The notifier and the pipe server only depend on these abstractions, so
//! the retry and backoff logic can be exercised against in-memory doubles
//! while the binaries plug in `interprocess` local sockets and the
//! `global-hotkey` crate.

use crate::ui::{Point, Rect, Size};
use std::io::{self, Read, Write};
use std::time::Duration;

//  Time

/// Something that can pause the calling thread.
///
/// Retry and backoff code never calls [`std::thread::sleep`] directly so
/// tests can record the requested delays instead of waiting them out.
pub trait Sleeper: Send {
    fn sleep(&self, duration: Duration);
}

/// The real [`Sleeper`], backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

//  Client side

/// Opens client connections to the pipe.
///
/// # Contract
///
/// * [`connect`](Connector::connect) returns within roughly `timeout`.
///   An endpoint that does not exist yet is waited for until then; a
///   server still absent at the deadline yields an error, never a hang.
/// * Every call produces a brand-new connection.
pub trait Connector {
    /// One bidirectional byte-stream session.
    type Conn: Read + Write + Send + 'static;

    fn connect(&self, timeout: Duration) -> io::Result<Self::Conn>;
}

//  Server side

/// One accepted server-side connection.
pub trait Session: Read + Write + Send + 'static {
    /// Bound every blocking read on this connection, or lift the bound
    /// with `None`.
    ///
    /// Transports that cannot do this return
    /// [`io::ErrorKind::Unsupported`]; the server then relies on its own
    /// deadline alone.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

/// Produces server-side sessions, one at a time.
///
/// # Contract
///
/// * [`bind`](Acceptor::bind) makes sure an endpoint bound to the
///   well-known name exists.  It is cheap when the endpoint is already up.
///   An error here means the endpoint could not be created at all.
/// * [`accept`](Acceptor::accept) **blocks** until a client connects.
///   An error is specific to that attempt; the next call to `bind`
///   recreates the endpoint if needed.  `Ok(None)` means the acceptor is
///   exhausted and the accept loop should end (only test doubles do this).
pub trait Acceptor: Send {
    type Conn: Session;

    fn bind(&mut self) -> io::Result<()>;

    fn accept(&mut self) -> io::Result<Option<Self::Conn>>;
}

//  Hotkey

/// What woke a [`HotkeySource`] up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The registered combination was pressed.
    Pressed,
    /// The process was asked to stop.
    Shutdown,
}

/// A registered global shortcut that can be waited on.
///
/// The registration lives as long as the value: implementations release
/// the OS-level claim when dropped.
pub trait HotkeySource {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Block until the shortcut fires or shutdown is requested.
    fn wait(&mut self) -> Result<HotkeyEvent, Self::Error>;
}

//  UI

/// The window-showing half of the UI layer.
///
/// Only ever called on the UI thread, from
/// [`run_ui_loop`](crate::ui::run_ui_loop).
pub trait WindowPresenter {
    /// The error type produced by this presenter.
    type Error: std::error::Error + Send + 'static;

    /// Current pointer location, if the toolkit can tell.
    fn cursor_position(&self) -> Option<Point>;

    /// Usable area (excluding task bars and docks) of every display.
    fn work_areas(&self) -> Result<Vec<Rect>, Self::Error>;

    /// Outer size of the main window.
    fn window_size(&self) -> Size;

    /// Move the window to `frame`, show it, and give it focus.
    fn present(&mut self, frame: Rect) -> Result<(), Self::Error>;

    /// Pin the window above all others, or release the pin.
    fn set_topmost(&mut self, topmost: bool) -> Result<(), Self::Error>;
}
