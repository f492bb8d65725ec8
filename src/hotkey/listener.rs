//! Turns hotkey presses into `SHOW` notifications.

use crate::command::Command;
use crate::ipc::client::Notifier;
use crate::traits::{Connector, HotkeyEvent, HotkeySource, Sleeper};
use log::{debug, info, warn};

/// Counters reported when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub presses: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// Blocks on a [`HotkeySource`] and sends one notification per press.
///
/// Presses are handled strictly in order; a press that arrives while a
/// notification is still retrying is picked up once that one finishes.
pub struct HotkeyListener<H: HotkeySource, C: Connector, S: Sleeper> {
    source: H,
    notifier: Notifier<C, S>,
    stats: ListenerStats,
}

impl<H: HotkeySource, C: Connector, S: Sleeper> HotkeyListener<H, C, S> {
    pub fn new(source: H, notifier: Notifier<C, S>) -> Self {
        Self {
            source,
            notifier,
            stats: ListenerStats::default(),
        }
    }

    /// Run until the source reports shutdown.
    ///
    /// A notification that cannot be delivered is logged and dropped; the
    /// user can simply press the hotkey again.  Only a failure of the
    /// source itself ends the loop with an error.
    pub fn run(&mut self) -> Result<ListenerStats, H::Error> {
        loop {
            match self.source.wait()? {
                HotkeyEvent::Pressed => {
                    self.stats.presses += 1;
                    debug!("hotkey pressed (#{})", self.stats.presses);
                    match self.notifier.notify(Command::Show) {
                        Ok(_) => self.stats.delivered += 1,
                        Err(e) => {
                            self.stats.dropped += 1;
                            warn!("show notification dropped: {}", e);
                        }
                    }
                }
                HotkeyEvent::Shutdown => {
                    info!(
                        "hotkey listener stopping ({} press(es), {} delivered, {} dropped)",
                        self.stats.presses, self.stats.delivered, self.stats.dropped
                    );
                    return Ok(self.stats);
                }
            }
        }
    }

    /// Give the source back, e.g. to control when it is unregistered.
    pub fn into_source(self) -> H {
        self.source
    }
}
