//! Server half of the pipe, running inside the main application.
//!
//! [`PipeServer::run`] is an unbounded, strictly sequential loop:
//!
//! ```text
//! bind ─┬─ ok ──▶ accept ──▶ read line ──▶ act ──▶ reply ──▶ close ─┐
//!       └─ err ─▶ back off (1 s, 2 s, 4 s … 30 s) ──────────────────┤
//!       ▲───────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one session is in flight at any time; a second client waits
//! in the OS queue until the first one is closed.  A client that connects
//! and then stays silent is dropped after `read_timeout`, so it cannot hold
//! up the ones behind it.  No per-session failure ever leaves the loop.

use super::run_with_deadline;
use super::transport::LocalSocketAcceptor;
use crate::backoff::Backoff;
use crate::command::{read_line, write_line, Command, Reply};
use crate::config::ServerConfig;
use crate::traits::{Acceptor, Session, Sleeper, ThreadSleeper};
use crate::ui::{UiError, UiHandle};
use log::{debug, error, info, warn};
use std::io::{self, BufReader};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

/// What a single session amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `SHOW` received, window shown, `OK` written.
    Shown,
    /// Unrecognized or unreadable input; nothing done.
    Ignored,
    /// Client hung up before sending a line.
    Empty,
    /// `SHOW` received but the UI loop has exited.
    Undelivered,
    /// `SHOW` received but the window could not be shown; no `OK`.
    Failed,
    /// No complete line arrived within the read timeout.
    TimedOut,
}

/// Sequential accept loop that turns `SHOW` into a UI action.
pub struct PipeServer<A: Acceptor, S: Sleeper = ThreadSleeper> {
    acceptor: A,
    ui: UiHandle,
    backoff: Backoff,
    read_timeout: Duration,
    sleeper: S,
    ready: Option<mpsc::Sender<()>>,
}

impl<A: Acceptor> PipeServer<A> {
    pub fn new(acceptor: A, ui: UiHandle, config: &ServerConfig) -> Self {
        Self {
            acceptor,
            ui,
            backoff: Backoff::new(config.backoff_start(), config.backoff_max()),
            read_timeout: config.read_timeout(),
            sleeper: ThreadSleeper,
            ready: None,
        }
    }
}

impl<A: Acceptor, S: Sleeper> PipeServer<A, S> {
    /// Replace the sleeper used for backoff.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> PipeServer<A, S2> {
        PipeServer {
            acceptor: self.acceptor,
            ui: self.ui,
            backoff: self.backoff,
            read_timeout: self.read_timeout,
            sleeper,
            ready: self.ready,
        }
    }

    /// Send one `()` on `tx` the first time the endpoint is bound.
    pub fn notify_ready(mut self, tx: mpsc::Sender<()>) -> Self {
        self.ready = Some(tx);
        self
    }

    /// Accept and serve sessions, one at a time.
    ///
    /// This method **blocks** indefinitely.  Run it on a dedicated thread.
    /// It only returns when the acceptor reports it is exhausted.
    pub fn run(&mut self) {
        loop {
            if let Err(e) = self.acceptor.bind() {
                let delay = self.backoff.next_delay();
                warn!(
                    "cannot create pipe endpoint (failure #{}): {}; retrying in {} ms",
                    self.backoff.failures(),
                    e,
                    delay.as_millis()
                );
                self.sleeper.sleep(delay);
                continue;
            }
            self.backoff.reset();
            if let Some(tx) = self.ready.take() {
                let _ = tx.send(());
            }

            match self.acceptor.accept() {
                Ok(Some(conn)) => {
                    debug!("client connected");
                    match self.serve(conn) {
                        Ok(outcome) => debug!("session finished: {:?}", outcome),
                        Err(e) => error!("session error: {}", e),
                    }
                }
                Ok(None) => {
                    info!("acceptor exhausted, stopping pipe server");
                    return;
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }

    /// Handle one connection: read one line, act on it, maybe reply.
    ///
    /// The read is bounded by `read_timeout`.  The connection is closed
    /// when this returns, except after a timeout on a transport without
    /// read timeouts: then the stuck read keeps it until the peer writes
    /// or hangs up.
    pub fn serve<C: Session>(&self, conn: C) -> io::Result<SessionOutcome> {
        if let Err(e) = conn.set_read_timeout(Some(self.read_timeout)) {
            debug!("transport read timeout not set: {}", e);
        }
        let read = run_with_deadline(self.read_timeout, move || {
            let mut reader = BufReader::new(conn);
            let line = read_line(&mut reader);
            Ok((reader.into_inner(), line))
        });
        let (mut conn, line) = match read {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(self.timed_out()),
            Err(e) => return Err(e),
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(SessionOutcome::Empty),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("ignoring unreadable command: {}", e);
                return Ok(SessionOutcome::Ignored);
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(self.timed_out())
            }
            Err(e) => return Err(e),
        };

        match Command::parse(&line) {
            Some(Command::Show) => {
                debug!("received {}", Command::Show);
                match self.ui.show_at_cursor() {
                    Ok(()) => {}
                    Err(e @ UiError::Closed) => {
                        error!("cannot show window: {}", e);
                        return Ok(SessionOutcome::Undelivered);
                    }
                    Err(e @ UiError::ShowFailed(_)) => {
                        error!("{}", e);
                        return Ok(SessionOutcome::Failed);
                    }
                }
                write_line(&mut conn, &Reply::Ok.to_string())?;
                Ok(SessionOutcome::Shown)
            }
            None => {
                warn!("ignoring unrecognized command {:?}", line);
                Ok(SessionOutcome::Ignored)
            }
        }
    }

    fn timed_out(&self) -> SessionOutcome {
        warn!(
            "client sent no command within {} ms, dropping it",
            self.read_timeout.as_millis()
        );
        SessionOutcome::TimedOut
    }
}

//  Background thread

/// A [`PipeServer`] running on its own thread.
pub struct ServerHandle {
    ready: mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait up to `timeout` for the endpoint to be bound.
    ///
    /// Returns `false` on timeout.  The server keeps trying in the
    /// background either way.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready.recv_timeout(timeout).is_ok()
    }

    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Start a server for `pipe` on a dedicated thread.
pub fn spawn(pipe: &str, ui: UiHandle, config: &ServerConfig) -> io::Result<ServerHandle> {
    let (ready_tx, ready_rx) = mpsc::channel();
    let mut server =
        PipeServer::new(LocalSocketAcceptor::new(pipe), ui, config).notify_ready(ready_tx);
    let thread = std::thread::Builder::new()
        .name("clipwake-pipe-server".into())
        .spawn(move || server.run())?;
    Ok(ServerHandle {
        ready: ready_rx,
        thread,
    })
}

//  Tests
