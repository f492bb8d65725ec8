//! Entry point for the **clipwake** main application.
//!
//! Starts the pipe server on a background thread, launches the hotkey
//! listener process, and runs the UI loop on the main thread until Ctrl-C.
//!
//! Flags:
//!
//! * `--no-hotkey` — do not start `clipwake-hotkey`; useful when the
//!   listener is run by hand or when only `clipwake-hotkey --notify-once`
//!   is used to summon the window.

use clipwake::config::Config;
use clipwake::ipc::server;
use clipwake::process::{self, ListenerProcess};
use clipwake::ui::{self, LogPresenter, Rect, Size};
use log::{error, info, warn};

/// Work area assumed by the headless presenter.
const DEFAULT_WORK_AREA: Rect = Rect {
    x: 0,
    y: 0,
    width: 1920,
    height: 1040,
};

fn main() {
    env_logger::init();

    let no_hotkey = std::env::args().any(|a| a == "--no-hotkey");
    let config = Config::load_or_default();

    let (ui_handle, ui_rx) = ui::channel();

    let server = match server::spawn(&config.pipe.name, ui_handle.clone(), &config.server) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to start pipe server: {}", e);
            std::process::exit(1);
        }
    };
    // A press that arrives before the server accepts is covered by the
    // listener's retries; waiting here just makes that less likely.
    if server.wait_ready(config.server.startup_wait()) {
        info!("pipe server ready on {}", config.pipe.name);
    } else {
        warn!(
            "pipe server not ready after {} ms, continuing",
            config.server.startup_wait_ms
        );
    }

    let listener = if no_hotkey {
        info!("--no-hotkey given, not starting the hotkey listener");
        None
    } else {
        match process::locate(&config.hotkey).and_then(|path| ListenerProcess::spawn(&path)) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("hotkey listener unavailable: {}", e);
                None
            }
        }
    };

    {
        let ui_handle = ui_handle.clone();
        if let Err(e) = ctrlc::set_handler(move || ui_handle.quit()) {
            warn!("cannot install Ctrl-C handler: {}", e);
        }
    }

    let mut presenter = LogPresenter::new(
        Size {
            width: config.window.width,
            height: config.window.height,
        },
        DEFAULT_WORK_AREA,
    );
    info!("clipwake running");
    let shown = ui::run_ui_loop(&mut presenter, ui_rx);
    info!("UI loop finished after {} show request(s)", shown);

    if let Some(listener) = listener {
        listener.shutdown();
    }
    if !server.is_running() {
        warn!("pipe server thread had stopped");
    }
}
