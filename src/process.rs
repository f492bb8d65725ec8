//! Lifecycle of the `clipwake-hotkey` child process.
//!
//! The main application starts the listener once at startup and kills it
//! at shutdown.  A small watcher thread logs an early exit, which is how a
//! registration conflict (exit status
//! [`EXIT_HOTKEY_IN_USE`](crate::hotkey::EXIT_HOTKEY_IN_USE)) surfaces in
//! the main application's log.

use crate::config::HotkeyConfig;
use crate::hotkey::EXIT_HOTKEY_IN_USE;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// File name of the listener binary.
pub const LISTENER_BIN: &str = "clipwake-hotkey";

const WATCH_INTERVAL: Duration = Duration::from_millis(250);

/// Errors from locating or starting the listener process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("cannot determine current executable: {0}")]
    CurrentExe(std::io::Error),
    #[error("listener executable not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolve the listener executable: the configured path if any, otherwise
/// `clipwake-hotkey` next to the running executable.
pub fn locate(config: &HotkeyConfig) -> Result<PathBuf, ProcessError> {
    let path = match &config.listener_path {
        Some(p) => p.clone(),
        None => {
            let exe = std::env::current_exe().map_err(ProcessError::CurrentExe)?;
            sibling_path(&exe)
        }
    };
    if path.is_file() {
        Ok(path)
    } else {
        Err(ProcessError::NotFound(path))
    }
}

fn sibling_path(exe: &Path) -> PathBuf {
    let name = format!("{}{}", LISTENER_BIN, std::env::consts::EXE_SUFFIX);
    match exe.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Describe how the listener ended, for the log.
pub fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(0) => "exited normally".into(),
        Some(EXIT_HOTKEY_IN_USE) => {
            "exited: hotkey already in use, choose another combination in the config".into()
        }
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".into(),
    }
}

/// A running listener process.
pub struct ListenerProcess {
    child: Arc<Mutex<Child>>,
    stopping: Arc<AtomicBool>,
    label: String,
}

impl ListenerProcess {
    /// Start the listener at `path`.
    pub fn spawn(path: &Path) -> Result<Self, ProcessError> {
        let mut cmd = Command::new(path);
        cmd.stdin(Stdio::null());
        Self::start(cmd, path.display().to_string())
    }

    fn start(mut cmd: Command, label: String) -> Result<Self, ProcessError> {
        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            path: PathBuf::from(&label),
            source,
        })?;
        info!("started hotkey listener {} (pid {})", label, child.id());

        let process = Self {
            child: Arc::new(Mutex::new(child)),
            stopping: Arc::new(AtomicBool::new(false)),
            label,
        };
        process.watch();
        Ok(process)
    }

    /// Log the listener's exit if it happens before [`shutdown`](Self::shutdown).
    fn watch(&self) {
        let child = Arc::clone(&self.child);
        let stopping = Arc::clone(&self.stopping);
        let label = self.label.clone();
        let spawned = std::thread::Builder::new()
            .name("clipwake-listener-watch".into())
            .spawn(move || loop {
                std::thread::sleep(WATCH_INTERVAL);
                if stopping.load(Ordering::SeqCst) {
                    return;
                }
                match lock(&child).try_wait() {
                    Ok(Some(status)) => {
                        error!("hotkey listener {} {}", label, describe_exit(status));
                        return;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("cannot poll hotkey listener: {}", e);
                        return;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("cannot watch hotkey listener: {}", e);
        }
    }

    /// Exit status, if the process has already ended.
    pub fn try_status(&self) -> Option<ExitStatus> {
        lock(&self.child).try_wait().ok().flatten()
    }

    /// Stop the listener: force-kill if still running, then reap it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = lock(&self.child);
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("hotkey listener already {}", describe_exit(status));
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("cannot poll hotkey listener: {}", e),
        }
        if let Err(e) = child.kill() {
            warn!("failed to kill hotkey listener {}: {}", self.label, e);
        }
        match child.wait() {
            Ok(_) => info!("hotkey listener {} stopped", self.label),
            Err(e) => warn!("failed to reap hotkey listener {}: {}", self.label, e),
        }
    }
}

impl Drop for ListenerProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A poisoned lock only means the watcher panicked; the child handle is
/// still usable.
fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_of_current_exe() {
        let exe = Path::new("/opt/clipwake/bin/clipwake");
        let expected = format!("{}{}", LISTENER_BIN, std::env::consts::EXE_SUFFIX);
        assert_eq!(sibling_path(exe), Path::new("/opt/clipwake/bin").join(expected));
    }

    #[test]
    fn configured_path_must_exist() {
        let config = HotkeyConfig {
            listener_path: Some(PathBuf::from("/definitely/not/here/clipwake-hotkey")),
            ..HotkeyConfig::default()
        };
        assert!(matches!(locate(&config), Err(ProcessError::NotFound(_))));
    }

    #[test]
    fn configured_path_is_used() {
        let exe = std::env::current_exe().unwrap();
        let config = HotkeyConfig {
            listener_path: Some(exe.clone()),
            ..HotkeyConfig::default()
        };
        assert_eq!(locate(&config).unwrap(), exe);
    }

    #[test]
    fn spawn_missing_binary_fails() {
        let err = ListenerProcess::spawn(Path::new("/definitely/not/here/clipwake-hotkey"))
            .err()
            .unwrap();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn shutdown_kills_running_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let process = ListenerProcess::start(cmd, "sleep".into()).unwrap();
        assert!(process.try_status().is_none());
        let child = Arc::clone(&process.child);
        process.shutdown();
        let status = lock(&child).try_wait().unwrap();
        assert!(status.is_some());
        assert!(status.unwrap().code().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn shutdown_after_exit_is_quiet() {
        let process = ListenerProcess::start(Command::new("true"), "true".into()).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(process.try_status().and_then(|s| s.code()), Some(0));
        process.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn describe_exit_codes() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(describe_exit(ExitStatus::from_raw(0)), "exited normally");
        assert!(describe_exit(ExitStatus::from_raw(EXIT_HOTKEY_IN_USE << 8)).contains("in use"));
        assert_eq!(describe_exit(ExitStatus::from_raw(1 << 8)), "exited with status 1");
        assert_eq!(describe_exit(ExitStatus::from_raw(9)), "terminated by signal");
    }
}
