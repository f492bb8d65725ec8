//! Local-socket transport built on the `interprocess` crate.
//!
//! On Windows a namespaced name maps to the named pipe
//! `\\.\pipe\<name>`; on Linux it maps to an abstract-namespace Unix
//! socket.  Platforms without a socket namespace (macOS, BSDs) fall back
//! to a socket file named `<name>.sock` in the temp directory.

use crate::traits::{Acceptor, Connector, Session};
use interprocess::local_socket::prelude::*;
use interprocess::local_socket::{
    GenericFilePath, GenericNamespaced, Listener, ListenerOptions, Name, NameType, Stream,
    ToFsName, ToNsName,
};
use log::{debug, info};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Pause between two probes for an endpoint that is not up yet.
const CONNECT_POLL: Duration = Duration::from_millis(50);

/// `ERROR_PIPE_BUSY`: every instance of the named pipe is taken.
#[cfg(windows)]
const ERROR_PIPE_BUSY: i32 = 231;

/// Map a symbolic pipe name onto this platform's local-socket name.
pub fn resolve_name(pipe: &str) -> io::Result<Name<'static>> {
    if GenericNamespaced::is_supported() {
        pipe.to_owned().to_ns_name::<GenericNamespaced>()
    } else {
        socket_file(pipe).to_fs_name::<GenericFilePath>()
    }
}

/// Socket file used where there is no socket namespace.
fn socket_file(pipe: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}.sock", pipe))
}

/// Client side: connects to the pipe with a bounded wait.
#[derive(Debug, Clone)]
pub struct LocalSocketConnector {
    pipe: String,
}

impl LocalSocketConnector {
    pub fn new(pipe: impl Into<String>) -> Self {
        Self { pipe: pipe.into() }
    }
}

impl Connector for LocalSocketConnector {
    type Conn = Stream;

    /// Keep trying until the endpoint accepts or `timeout` runs out.
    ///
    /// A missing or busy endpoint is polled every [`CONNECT_POLL`], so a
    /// server that starts late is still reached within the window.
    fn connect(&self, timeout: Duration) -> io::Result<Stream> {
        let deadline = Instant::now() + timeout;
        loop {
            let pipe = self.pipe.clone();
            let left = deadline.saturating_duration_since(Instant::now());
            let attempt = super::run_with_deadline(left.max(CONNECT_POLL), move || {
                let name = resolve_name(&pipe)?;
                Stream::connect(name)
            });
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) if endpoint_not_up(&e) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(e);
                    }
                    std::thread::sleep(left.min(CONNECT_POLL));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Errors that mean "not there yet" rather than "broken".
fn endpoint_not_up(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    ) || pipe_busy(e)
}

#[cfg(windows)]
fn pipe_busy(e: &io::Error) -> bool {
    e.raw_os_error() == Some(ERROR_PIPE_BUSY)
}

#[cfg(not(windows))]
fn pipe_busy(_: &io::Error) -> bool {
    false
}

impl Session for Stream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        interprocess::local_socket::traits::Stream::set_recv_timeout(self, timeout)
    }
}

/// Remove a socket file nobody is listening on any more.
///
/// A file that still accepts connections belongs to a live server; it is
/// left alone and [`io::ErrorKind::AddrInUse`] is returned.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let name = path.to_fs_name::<GenericFilePath>()?;
    if Stream::connect(name).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("{} is served by another process", path.display()),
        ));
    }
    debug!("removing stale socket {}", path.display());
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Server side: keeps one listener bound to the pipe name and recreates
/// it whenever an accept fails.
pub struct LocalSocketAcceptor {
    pipe: String,
    listener: Option<Listener>,
}

impl LocalSocketAcceptor {
    /// The endpoint is not created until the first [`bind`](Acceptor::bind).
    pub fn new(pipe: impl Into<String>) -> Self {
        Self {
            pipe: pipe.into(),
            listener: None,
        }
    }

    pub fn pipe(&self) -> &str {
        &self.pipe
    }

    fn create_listener(&self) -> io::Result<Listener> {
        if !GenericNamespaced::is_supported() {
            remove_stale_socket(&socket_file(&self.pipe))?;
        }
        let name = resolve_name(&self.pipe)?;
        ListenerOptions::new().name(name).create_sync()
    }
}

impl Acceptor for LocalSocketAcceptor {
    type Conn = Stream;

    fn bind(&mut self) -> io::Result<()> {
        if self.listener.is_none() {
            let listener = self.create_listener()?;
            info!("listening on pipe {}", self.pipe);
            self.listener = Some(listener);
        }
        Ok(())
    }

    fn accept(&mut self) -> io::Result<Option<Stream>> {
        let listener = match self.listener.take() {
            Some(l) => l,
            None => self.create_listener()?,
        };
        match listener.accept() {
            Ok(stream) => {
                self.listener = Some(listener);
                Ok(Some(stream))
            }
            Err(e) => {
                debug!("dropping listener after accept failure");
                Err(e)
            }
        }
    }
}

impl Drop for LocalSocketAcceptor {
    fn drop(&mut self) {
        if self.listener.take().is_some() && !GenericNamespaced::is_supported() {
            let _ = std::fs::remove_file(socket_file(&self.pipe));
        }
    }
}
