//! Test doubles shared by the unit tests of several modules.

use crate::traits::{Session, Sleeper, WindowPresenter};
use crate::ui::{Point, Rect, Size};
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Monotonic counter to generate unique pipe names per test.
static PIPE_ID: AtomicU32 = AtomicU32::new(0);

pub fn unique_pipe_name() -> String {
    let id = PIPE_ID.fetch_add(1, Ordering::SeqCst);
    format!("clipwake-test-{}-{}", std::process::id(), id)
}

/// In-memory connection: reads from a canned buffer, records writes.
pub struct MockConn {
    input: Cursor<Vec<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
    silent: bool,
}

impl MockConn {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: Cursor::new(input.to_vec()),
            output: Arc::new(Mutex::new(Vec::new())),
            silent: false,
        }
    }

    /// A peer that connects and never writes: every read hangs for a
    /// long time before reporting end of stream.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::new(b"")
        }
    }

    /// Shared view of everything written to this connection.
    pub fn output(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.output)
    }
}

impl Read for MockConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.silent {
            std::thread::sleep(Duration::from_secs(10));
        }
        self.input.read(buf)
    }
}

impl Write for MockConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Session for MockConn {
    fn set_read_timeout(&self, _: Option<Duration>) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "mock"))
    }
}

/// A [`Sleeper`] that only records what it was asked to wait.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.log.lock().unwrap().push(duration);
    }
}

/// A presenter that records every call made to it.
pub struct RecordingPresenter {
    calls: Arc<Mutex<Vec<String>>>,
    shows: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    /// Call name to fail and how many more times to fail it.
    fail: Option<(&'static str, usize)>,
}

#[derive(Debug, thiserror::Error)]
#[error("mock presenter error")]
pub struct MockPresenterError;

impl RecordingPresenter {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            shows: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            fail: None,
        }
    }

    /// Like [`new`](Self::new), but the first `times` calls recorded as
    /// `call` (e.g. `"present"`, `"topmost false"`) return an error.
    pub fn failing(call: &'static str, times: usize) -> Self {
        Self {
            fail: Some((call, times)),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Counter bumped on every `present`; stays readable after the
    /// presenter has moved to another thread.
    pub fn show_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.shows)
    }

    /// Highest number of shows ever in progress at the same time.
    pub fn peak_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }

    fn record(&mut self, call: String) -> Result<(), MockPresenterError> {
        let fails = match &mut self.fail {
            Some((name, left)) if *left > 0 && call.starts_with(*name) => {
                *left -= 1;
                true
            }
            _ => false,
        };
        self.calls.lock().unwrap().push(call);
        if fails {
            Err(MockPresenterError)
        } else {
            Ok(())
        }
    }
}

impl WindowPresenter for RecordingPresenter {
    type Error = MockPresenterError;

    fn cursor_position(&self) -> Option<Point> {
        Some(Point { x: 10, y: 20 })
    }

    fn work_areas(&self) -> Result<Vec<Rect>, MockPresenterError> {
        Ok(vec![Rect::new(0, 0, 1920, 1080)])
    }

    fn window_size(&self) -> Size {
        Size {
            width: 300,
            height: 200,
        }
    }

    fn present(&mut self, frame: Rect) -> Result<(), MockPresenterError> {
        self.record(format!("present {},{}", frame.x, frame.y))?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.shows.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_topmost(&mut self, topmost: bool) -> Result<(), MockPresenterError> {
        let result = self.record(format!("topmost {}", topmost));
        if !topmost && result.is_ok() {
            // A show ends with the release; hold it a moment so
            // overlapping shows would be seen.
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }
}
