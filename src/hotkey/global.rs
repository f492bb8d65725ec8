//! [`HotkeySource`] backed by the `global-hotkey` crate.
//!
//! On Windows the crate delivers `WM_HOTKEY` through a hidden window owned
//! by the thread that created the manager, so [`GlobalHotkey::wait`] pumps
//! that thread's message queue and **must** run on the thread that called
//! [`GlobalHotkey::register`].  Shutdown posts `WM_QUIT` to the same
//! thread.  Elsewhere the crate runs its own event thread and `wait`
//! simply selects between the hotkey channel and the shutdown channel.

use super::{EXIT_FAILURE, EXIT_HOTKEY_IN_USE};
use crate::traits::{HotkeyEvent, HotkeySource};
use crossbeam_channel::{Receiver, Sender};
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use log::{info, warn};

/// Errors from registering or waiting on the global hotkey.
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("invalid hotkey {combination:?}: {reason}")]
    Parse { combination: String, reason: String },
    /// Another application already owns the combination.
    #[error("hotkey {0} is already registered by another application")]
    InUse(String),
    #[error("hotkey manager error: {0}")]
    Manager(#[from] global_hotkey::Error),
    #[error("hotkey event channel closed")]
    Disconnected,
    #[cfg(windows)]
    #[error("message queue error: {0}")]
    MessageQueue(std::io::Error),
}

impl HotkeyError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            HotkeyError::InUse(_) => EXIT_HOTKEY_IN_USE,
            _ => EXIT_FAILURE,
        }
    }
}

/// Wakes a blocked [`GlobalHotkey::wait`] with [`HotkeyEvent::Shutdown`].
///
/// Safe to trigger from any thread (e.g. a Ctrl-C handler), any number of
/// times.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
    #[cfg(windows)]
    thread_id: u32,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.try_send(());
        #[cfg(windows)]
        {
            use windows_sys::Win32::UI::WindowsAndMessaging::{PostThreadMessageW, WM_QUIT};
            // SAFETY: posting a message to a thread id has no memory-safety
            // preconditions; failure just means the thread is gone.
            unsafe {
                PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0);
            }
        }
    }
}

/// A registered OS-level shortcut.
///
/// The registration is released when the value is dropped.
pub struct GlobalHotkey {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
    label: String,
    shutdown: Receiver<()>,
}

impl GlobalHotkey {
    /// Parse `combination` (e.g. `"ctrl+shift+KeyV"`) and claim it.
    ///
    /// Fails with [`HotkeyError::InUse`] when the OS reports the
    /// combination as taken.  This is not retried: the operator has to
    /// pick another combination.
    pub fn register(combination: &str) -> Result<(Self, ShutdownHandle), HotkeyError> {
        let hotkey = combination
            .parse::<HotKey>()
            .map_err(|e| HotkeyError::Parse {
                combination: combination.to_string(),
                reason: e.to_string(),
            })?;

        let manager = GlobalHotKeyManager::new()?;
        manager.register(hotkey).map_err(|e| match e {
            global_hotkey::Error::AlreadyRegistered(_)
            | global_hotkey::Error::FailedToRegister(_) => {
                warn!("register {} failed: {}", combination, e);
                HotkeyError::InUse(combination.to_string())
            }
            other => HotkeyError::Manager(other),
        })?;
        info!("registered global hotkey {} (id {})", combination, hotkey.id());

        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = ShutdownHandle {
            tx,
            #[cfg(windows)]
            // SAFETY: plain query of the calling thread's id.
            thread_id: unsafe { windows_sys::Win32::System::Threading::GetCurrentThreadId() },
        };

        Ok((
            Self {
                manager,
                hotkey,
                label: combination.to_string(),
                shutdown: rx,
            },
            handle,
        ))
    }

    fn is_ours(&self, event: &GlobalHotKeyEvent) -> bool {
        event.id == self.hotkey.id() && event.state == HotKeyState::Pressed
    }
}

impl HotkeySource for GlobalHotkey {
    type Error = HotkeyError;

    #[cfg(not(windows))]
    fn wait(&mut self) -> Result<HotkeyEvent, HotkeyError> {
        let events = GlobalHotKeyEvent::receiver();
        loop {
            crossbeam_channel::select! {
                recv(events) -> event => {
                    let event = event.map_err(|_| HotkeyError::Disconnected)?;
                    if self.is_ours(&event) {
                        return Ok(HotkeyEvent::Pressed);
                    }
                }
                recv(self.shutdown) -> _ => return Ok(HotkeyEvent::Shutdown),
            }
        }
    }

    #[cfg(windows)]
    fn wait(&mut self) -> Result<HotkeyEvent, HotkeyError> {
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            DispatchMessageW, GetMessageW, TranslateMessage, MSG,
        };

        let events = GlobalHotKeyEvent::receiver();
        loop {
            while let Ok(event) = events.try_recv() {
                if self.is_ours(&event) {
                    return Ok(HotkeyEvent::Pressed);
                }
            }
            if self.shutdown.try_recv().is_ok() {
                return Ok(HotkeyEvent::Shutdown);
            }

            // SAFETY: MSG is plain data; GetMessageW fills it before it is
            // read, and the pointers passed stay valid for each call.
            unsafe {
                let mut msg: MSG = std::mem::zeroed();
                match GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) {
                    0 => return Ok(HotkeyEvent::Shutdown),
                    -1 => return Err(HotkeyError::MessageQueue(std::io::Error::last_os_error())),
                    _ => {
                        TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
            }
        }
    }
}

impl Drop for GlobalHotkey {
    fn drop(&mut self) {
        match self.manager.unregister(self.hotkey) {
            Ok(()) => info!("unregistered global hotkey {}", self.label),
            Err(e) => warn!("failed to unregister hotkey {}: {}", self.label, e),
        }
    }
}
