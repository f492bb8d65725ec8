//! **clipwake-hotkey** — the hotkey-listener process.
//!
//! Claims the configured global shortcut and sends `SHOW` to the main
//! application on every press.  Normally started (and killed) by
//! `clipwake`; can also be run by hand.
//!
//! Flags:
//!
//! * `--notify-once` — skip hotkey registration, send a single `SHOW`
//!   through the usual retry path, and exit `0` if it was delivered or
//!   `1` if it was dropped.
//!
//! Exit status `2` means the shortcut is already taken by another
//! application.

use clipwake::command::Command;
use clipwake::config::Config;
use clipwake::hotkey::global::{GlobalHotkey, HotkeyError};
use clipwake::hotkey::listener::HotkeyListener;
use clipwake::hotkey::EXIT_FAILURE;
use clipwake::ipc::client::Notifier;
use clipwake::ipc::transport::LocalSocketConnector;
use log::{error, info, warn};

fn main() {
    env_logger::init();

    let once = std::env::args().any(|a| a == "--notify-once");
    let config = Config::load_or_default();

    let code = if once {
        notify_once(&config)
    } else {
        listen(&config)
    };
    std::process::exit(code);
}

fn notifier(config: &Config) -> Notifier<LocalSocketConnector> {
    Notifier::new(LocalSocketConnector::new(&config.pipe.name), &config.client)
}

fn notify_once(config: &Config) -> i32 {
    match notifier(config).notify(Command::Show) {
        Ok(_) => 0,
        Err(e) => {
            error!("{}", e);
            EXIT_FAILURE
        }
    }
}

/// Register, listen, unregister.  Returns the process exit status.
///
/// Everything holding the registration is dropped before this returns,
/// so the shortcut is released before `process::exit`.
fn listen(config: &Config) -> i32 {
    let combination = &config.hotkey.combination;
    let (source, shutdown) = match GlobalHotkey::register(combination) {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            if let HotkeyError::InUse(_) = e {
                eprintln!(
                    "clipwake-hotkey: {} is already used by another application.\n\
                     Set a different \"hotkey.combination\" in {} and restart.",
                    combination,
                    clipwake::config::default_path().display()
                );
            }
            return e.exit_code();
        }
    };

    if let Err(e) = ctrlc::set_handler(move || shutdown.trigger()) {
        warn!("cannot install Ctrl-C handler: {}", e);
    }

    info!("waiting for {} (pipe {})", combination, config.pipe.name);
    let mut listener = HotkeyListener::new(source, notifier(config));
    match listener.run() {
        Ok(_) => 0,
        Err(e) => {
            error!("hotkey listener failed: {}", e);
            e.exit_code()
        }
    }
}
