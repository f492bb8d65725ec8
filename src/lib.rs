//! **clipwake** — summon a clipboard-history window with a global hotkey.
//!
//! Two processes cooperate over one named local pipe:
//!
//! * the **hotkey listener** (`clipwake-hotkey`) claims a global keyboard
//!   shortcut and, on every press, connects to the pipe, sends `SHOW`,
//!   reads the `OK`, and disconnects;
//! * the **main application** (`clipwake`) runs a [`PipeServer`] on a
//!   background thread and hands each `SHOW` to its UI thread, which
//!   brings the window to the front near the pointer.
//!
//! # Architecture
//!
//! The crate is organised around a handful of seams in [`traits`]:
//!
//! * [`traits::Connector`] / [`traits::Acceptor`] — the client and server
//!   ends of the transport, so retry and backoff logic is not coupled to
//!   `interprocess`.
//! * [`traits::HotkeySource`] — a blocking wait on a registered shortcut.
//! * [`traits::WindowPresenter`] — whatever owns the window.
//!
//! Concrete implementations live in [`ipc::transport`] (local sockets) and
//! [`hotkey::global`] (the `global-hotkey` crate).
//!
//! [`PipeServer`]: ipc::server::PipeServer

pub mod backoff;
pub mod command;
pub mod config;
pub mod hotkey;
pub mod ipc;
pub mod process;
pub mod traits;
pub mod ui;

#[cfg(test)]
mod testing;
