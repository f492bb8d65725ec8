//! Hand-off from the pipe server to the thread that owns the window.
//!
//! UI objects may only be touched on the UI thread, so the server never
//! calls the [`WindowPresenter`] itself.  It sends a [`UiRequest`] through
//! a [`UiHandle`] and blocks until [`run_ui_loop`], running on the UI
//! thread, reports the action as done.

use crate::traits::WindowPresenter;
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::sync::mpsc;

//  Geometry

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Axis-aligned rectangle in screen coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }
}

/// Compute where the window goes when summoned.
///
/// The window's top-left corner sits at the pointer, inside the work area
/// that contains the pointer.  If it would overflow the right or bottom
/// edge it is shifted back so it fits; it never starts left of or above
/// the work area, even if it is larger than the area.
///
/// With no known pointer the window is centered on the first work area.
/// A pointer outside every work area (e.g. on a display that was just
/// unplugged) also falls back to the first one.
pub fn place_near_cursor(cursor: Option<Point>, size: Size, work_areas: &[Rect]) -> Rect {
    let Some(area) = cursor
        .and_then(|p| work_areas.iter().find(|a| a.contains(p)))
        .or_else(|| work_areas.first())
        .copied()
    else {
        let origin = cursor.unwrap_or(Point { x: 0, y: 0 });
        return Rect::new(origin.x, origin.y, size.width, size.height);
    };

    let anchor = match cursor {
        Some(p) if area.contains(p) => p,
        _ => {
            let c = area.center();
            Point {
                x: c.x - size.width / 2,
                y: c.y - size.height / 2,
            }
        }
    };

    let fit = |start: i32, len: i32, lo: i32, hi: i32| -> i32 {
        let mut v = start;
        if v + len > hi {
            v = hi - len;
        }
        v.max(lo)
    };

    Rect::new(
        fit(anchor.x, size.width, area.x, area.right()),
        fit(anchor.y, size.height, area.y, area.bottom()),
        size.width,
        size.height,
    )
}

/// Bring the window to the front near the pointer.
///
/// The window is briefly pinned topmost so it reliably lands above
/// whatever had focus, then released so it behaves like a normal window.
/// The release is attempted even if pinning failed, and retried once.
pub fn show_at_cursor<P: WindowPresenter>(presenter: &mut P) -> Result<Rect, P::Error> {
    let areas = presenter.work_areas()?;
    let frame = place_near_cursor(presenter.cursor_position(), presenter.window_size(), &areas);
    presenter.present(frame)?;
    let pinned = presenter.set_topmost(true);
    let released = presenter.set_topmost(false).or_else(|e| {
        warn!("releasing topmost failed, retrying: {}", e);
        presenter.set_topmost(false)
    });
    pinned.and(released)?;
    Ok(frame)
}

//  Thread hand-off

/// Work queued for the UI thread.
#[derive(Debug)]
pub enum UiRequest {
    /// Run [`show_at_cursor`], then report how it went on `done`.
    ShowAtCursor {
        done: mpsc::Sender<Result<(), String>>,
    },
    /// Leave the UI loop.
    Quit,
}

/// Why a show request did not result in a visible window.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    /// The UI loop is gone; nothing can be shown any more.
    #[error("UI loop is no longer running")]
    Closed,
    /// The presenter reported an error.
    #[error("showing the window failed: {0}")]
    ShowFailed(String),
}

/// Cloneable sender side of the UI queue.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::Sender<UiRequest>,
}

/// Create a UI queue.  The receiver goes to [`run_ui_loop`].
pub fn channel() -> (UiHandle, mpsc::Receiver<UiRequest>) {
    let (tx, rx) = mpsc::channel();
    (UiHandle { tx }, rx)
}

impl UiHandle {
    /// Ask the UI thread to show the window and wait until it has.
    pub fn show_at_cursor(&self) -> Result<(), UiError> {
        let (done_tx, done_rx) = mpsc::channel();
        self.tx
            .send(UiRequest::ShowAtCursor { done: done_tx })
            .map_err(|_| UiError::Closed)?;
        done_rx
            .recv()
            .map_err(|_| UiError::Closed)?
            .map_err(UiError::ShowFailed)
    }

    /// Ask the UI loop to exit.  A no-op if it already has.
    pub fn quit(&self) {
        let _ = self.tx.send(UiRequest::Quit);
    }
}

/// Process UI requests on the calling thread until [`UiRequest::Quit`]
/// arrives or every [`UiHandle`] is dropped.
///
/// Returns the number of show requests handled.
pub fn run_ui_loop<P: WindowPresenter>(
    presenter: &mut P,
    requests: mpsc::Receiver<UiRequest>,
) -> usize {
    let mut shown = 0;
    for request in requests {
        match request {
            UiRequest::ShowAtCursor { done } => {
                let result = match show_at_cursor(presenter) {
                    Ok(frame) => {
                        debug!("window shown at {:?}", frame);
                        Ok(())
                    }
                    Err(e) => {
                        error!("show window failed: {}", e);
                        Err(e.to_string())
                    }
                };
                shown += 1;
                // The requester may have given up; nothing to do then.
                let _ = done.send(result);
            }
            UiRequest::Quit => {
                info!("UI loop quitting");
                break;
            }
        }
    }
    shown
}

//  Headless presenter

/// Presenter used when no real window toolkit is attached.
///
/// It tracks the window state it would have applied and logs every change,
/// which is enough to drive the main binary and to observe behavior.
#[derive(Debug, Clone)]
pub struct LogPresenter {
    size: Size,
    work_area: Rect,
    frame: Option<Rect>,
    topmost: bool,
}

impl LogPresenter {
    pub fn new(size: Size, work_area: Rect) -> Self {
        Self {
            size,
            work_area,
            frame: None,
            topmost: false,
        }
    }

    /// Where the window was last presented, if ever.
    pub fn frame(&self) -> Option<Rect> {
        self.frame
    }

    pub fn is_topmost(&self) -> bool {
        self.topmost
    }
}

impl WindowPresenter for LogPresenter {
    type Error = Infallible;

    fn cursor_position(&self) -> Option<Point> {
        None
    }

    fn work_areas(&self) -> Result<Vec<Rect>, Infallible> {
        Ok(vec![self.work_area])
    }

    fn window_size(&self) -> Size {
        self.size
    }

    fn present(&mut self, frame: Rect) -> Result<(), Infallible> {
        info!(
            "presenting window at ({}, {}) size {}x{}",
            frame.x, frame.y, frame.width, frame.height
        );
        self.frame = Some(frame);
        Ok(())
    }

    fn set_topmost(&mut self, topmost: bool) -> Result<(), Infallible> {
        debug!("topmost = {}", topmost);
        self.topmost = topmost;
        Ok(())
    }
}

//  Tests
