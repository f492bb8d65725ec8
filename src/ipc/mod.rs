//! The named-pipe channel between the hotkey listener and the main
//! application.
//!
//! * [`transport`] — `interprocess` local sockets behind the
//!   [`Connector`](crate::traits::Connector) and
//!   [`Acceptor`](crate::traits::Acceptor) traits.
//! * [`client`] — one `SHOW` per hotkey press, with bounded retries.
//! * [`server`] — the sequential accept loop inside the main application.

pub mod client;
pub mod server;
pub mod transport;

use std::io;
use std::time::Duration;

/// Run a blocking I/O operation on a helper thread and give up waiting
/// after `timeout`.
///
/// On timeout the helper thread is left to finish on its own; its result
/// is discarded.  The returned error has kind [`io::ErrorKind::TimedOut`].
pub(crate) fn run_with_deadline<T, F>(timeout: Duration, op: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("clipwake-io".into())
        .spawn(move || {
            let _ = tx.send(op());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("timed out after {} ms", timeout.as_millis()),
        )),
        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
            Err(io::Error::other("I/O worker exited without a result"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_passes_result_through() {
        let v = run_with_deadline(Duration::from_secs(1), || Ok(7)).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn deadline_passes_error_through() {
        let err = run_with_deadline::<(), _>(Duration::from_secs(1), || {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "nope"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn deadline_times_out() {
        let start = std::time::Instant::now();
        let err = run_with_deadline(Duration::from_millis(50), || {
            std::thread::sleep(Duration::from_secs(2));
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
