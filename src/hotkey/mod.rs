//! The hotkey-listener process.
//!
//! [`listener::HotkeyListener`] is backend-agnostic: it waits on any
//! [`HotkeySource`](crate::traits::HotkeySource) and notifies through a
//! [`Notifier`](crate::ipc::client::Notifier).  The real source, built on
//! the `global-hotkey` crate, lives in [`global`] behind the `hotkey`
//! feature.

#[cfg(feature = "hotkey")]
pub mod global;
pub mod listener;

/// Exit status of `clipwake-hotkey` when the combination is already
/// claimed by another application.
pub const EXIT_HOTKEY_IN_USE: i32 = 2;

/// Exit status of `clipwake-hotkey` for any other startup failure.
pub const EXIT_FAILURE: i32 = 1;
