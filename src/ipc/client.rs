//! Client half of the pipe: delivers one command per hotkey press.
//!
//! A notification is a single short-lived session:
//!
//! 1. connect (bounded by `connect_timeout`)
//! 2. write the command line and flush
//! 3. read one reply line (bounded by `reply_timeout`)
//! 4. close
//!
//! Only step 1 is retried.  Once a connection exists the command may
//! already have been delivered, and a second `SHOW` would be visible to
//! the user.

use super::run_with_deadline;
use crate::command::{read_line, write_line, Command, Reply};
use crate::config::ClientConfig;
use crate::traits::{Connector, Sleeper, ThreadSleeper};
use log::{debug, info, warn};
use std::io::{self, BufReader};
use std::time::Duration;

/// Why a notification did not go through.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Every connection attempt failed.
    #[error("server unreachable after {attempts} attempt(s): {source}")]
    Unreachable { attempts: u32, source: io::Error },
    /// Connected, but writing the command or reading the reply failed.
    #[error("exchange failed: {0}")]
    Exchange(io::Error),
}

/// Sends commands to the pipe server with a bounded retry policy.
pub struct Notifier<C: Connector, S: Sleeper = ThreadSleeper> {
    connector: C,
    sleeper: S,
    connect_timeout: Duration,
    reply_timeout: Duration,
    attempts: u32,
    retry_delay: Duration,
}

impl<C: Connector> Notifier<C> {
    pub fn new(connector: C, config: &ClientConfig) -> Self {
        Self {
            connector,
            sleeper: ThreadSleeper,
            connect_timeout: config.connect_timeout(),
            reply_timeout: config.reply_timeout(),
            attempts: config.retry_count.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

impl<C: Connector, S: Sleeper> Notifier<C, S> {
    /// Replace the sleeper used between attempts.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Notifier<C, S2> {
        Notifier {
            connector: self.connector,
            sleeper,
            connect_timeout: self.connect_timeout,
            reply_timeout: self.reply_timeout,
            attempts: self.attempts,
            retry_delay: self.retry_delay,
        }
    }

    /// Send `command` and return the server's reply.
    ///
    /// `Ok(None)` means the command was written but no reply line came
    /// back (the server closed the connection or the reply timed out).
    pub fn notify(&self, command: Command) -> Result<Option<Reply>, NotifyError> {
        let mut attempt = 0;
        let conn = loop {
            attempt += 1;
            match self.connector.connect(self.connect_timeout) {
                Ok(conn) => break conn,
                Err(e) if attempt < self.attempts => {
                    debug!(
                        "connect attempt {}/{} failed: {}",
                        attempt, self.attempts, e
                    );
                    self.sleeper.sleep(self.retry_delay);
                }
                Err(e) => {
                    return Err(NotifyError::Unreachable {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        };
        debug!("connected on attempt {}", attempt);
        self.exchange(conn, command)
    }

    fn exchange(&self, conn: C::Conn, command: Command) -> Result<Option<Reply>, NotifyError> {
        let outcome = run_with_deadline(self.reply_timeout, move || {
            let mut reader = BufReader::new(conn);
            write_line(reader.get_mut(), command.as_str())?;
            Ok(read_line(&mut reader)?.map(|line| Reply::parse(&line)))
        });

        match outcome {
            Ok(Some(reply)) => {
                info!("sent {}, server replied {}", command, reply);
                Ok(Some(reply))
            }
            Ok(None) => {
                warn!("sent {}, server closed without replying", command);
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                warn!("sent {}, no reply: {}", command, e);
                Ok(None)
            }
            Err(e) => Err(NotifyError::Exchange(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::transport::LocalSocketConnector;
    use crate::testing::{unique_pipe_name, MockConn, RecordingSleeper};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Refuses the first `failures` connections, then hands out
    /// connections that answer with `reply`.
    struct FlakyConnector {
        failures: u32,
        calls: AtomicU32,
        reply: &'static [u8],
        last_output: Mutex<Option<Arc<Mutex<Vec<u8>>>>>,
    }

    impl FlakyConnector {
        fn new(failures: u32, reply: &'static [u8]) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                reply,
                last_output: Mutex::new(None),
            }
        }

        fn written(&self) -> Vec<u8> {
            match &*self.last_output.lock().unwrap() {
                Some(out) => out.lock().unwrap().clone(),
                None => Vec::new(),
            }
        }
    }

    impl Connector for FlakyConnector {
        type Conn = MockConn;

        fn connect(&self, _timeout: Duration) -> io::Result<MockConn> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no server"));
            }
            let conn = MockConn::new(self.reply);
            *self.last_output.lock().unwrap() = Some(conn.output());
            Ok(conn)
        }
    }

    fn notifier(
        connector: FlakyConnector,
    ) -> (Notifier<FlakyConnector, RecordingSleeper>, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let n = Notifier::new(connector, &ClientConfig::default()).with_sleeper(sleeper.clone());
        (n, sleeper)
    }

    #[test]
    fn first_attempt_succeeds() {
        let (n, sleeper) = notifier(FlakyConnector::new(0, b"OK\n"));
        assert_eq!(n.notify(Command::Show).unwrap(), Some(Reply::Ok));
        assert_eq!(n.connector.calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn succeeds_on_final_retry() {
        let (n, sleeper) = notifier(FlakyConnector::new(2, b"OK\n"));
        assert_eq!(n.notify(Command::Show).unwrap(), Some(Reply::Ok));
        assert_eq!(n.connector.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(500), Duration::from_millis(500)]
        );
    }

    #[test]
    fn gives_up_after_three_attempts() {
        let (n, sleeper) = notifier(FlakyConnector::new(3, b"OK\n"));
        match n.notify(Command::Show) {
            Err(NotifyError::Unreachable { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Unreachable, got {:?}", other),
        }
        assert_eq!(n.connector.calls.load(Ordering::SeqCst), 3);
        // No pause after the last attempt.
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[test]
    fn writes_command_line() {
        let (n, _) = notifier(FlakyConnector::new(0, b"OK\n"));
        n.notify(Command::Show).unwrap();
        assert_eq!(n.connector.written(), b"SHOW\n");
    }

    #[test]
    fn missing_reply_is_not_an_error() {
        let (n, _) = notifier(FlakyConnector::new(0, b""));
        assert_eq!(n.notify(Command::Show).unwrap(), None);
    }

    #[test]
    fn unexpected_reply_is_passed_through() {
        let (n, _) = notifier(FlakyConnector::new(0, b"BUSY\r\n"));
        assert_eq!(
            n.notify(Command::Show).unwrap(),
            Some(Reply::Other("BUSY".into()))
        );
    }

    #[test]
    fn zero_retry_count_still_tries_once() {
        let config = ClientConfig {
            retry_count: 0,
            ..ClientConfig::default()
        };
        let n = Notifier::new(FlakyConnector::new(0, b"OK\n"), &config)
            .with_sleeper(RecordingSleeper::new());
        assert!(n.notify(Command::Show).is_ok());
    }

    #[test]
    fn no_server_over_real_transport() {
        let n = Notifier::new(
            LocalSocketConnector::new(unique_pipe_name()),
            &ClientConfig::default(),
        );
        let start = std::time::Instant::now();
        let result = n.notify(Command::Show);
        let elapsed = start.elapsed();
        assert!(matches!(
            result,
            Err(NotifyError::Unreachable { attempts: 3, .. })
        ));
        // Three attempts of 1 s each, with two 500 ms pauses in between.
        assert!(elapsed >= Duration::from_millis(3000), "gave up after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(4500), "took {:?}", elapsed);
    }
}
