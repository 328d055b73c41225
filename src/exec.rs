// CLASSIFICATION: COMMUNITY
// Filename: exec.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Blocking runner for external helper commands.
//!
//! Helpers (backup, restore, mkfs, package scripts) run as child
//! processes under a shell. The caller blocks until the child exits and
//! receives a tick on every poll so it can show progress. There is no
//! timeout; a hung helper blocks forever.

use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::error::{IoResultExt, RecoveryError, RecoveryResult};

/// Default interval between child status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs shell command lines and waits for them.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    shell: PathBuf,
    poll_interval: Duration,
}

impl Default for ExternalCommand {
    fn default() -> Self {
        Self::new("/sbin/sh", DEFAULT_POLL_INTERVAL)
    }
}

impl ExternalCommand {
    /// Runner using `shell -c <line>` and polling every `poll_interval`.
    pub fn new(shell: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            shell: shell.into(),
            poll_interval,
        }
    }

    /// Spawn `line`, call `on_tick` once per poll while it runs and
    /// return its exit status.
    pub fn run<F: FnMut()>(&self, line: &str, mut on_tick: F) -> RecoveryResult<ExitStatus> {
        info!("Running {line}");
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(line)
            .stdin(Stdio::null())
            .spawn()
            .context(|| format!("Can't run {line}"))?;
        loop {
            match child.try_wait().context(|| format!("Can't wait for {line}"))? {
                Some(status) => {
                    if !status.success() {
                        warn!("{line} exited with {status}");
                    }
                    return Ok(status);
                }
                None => {
                    on_tick();
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }

    /// Like [`run`](Self::run) but maps a non-zero exit to an error.
    pub fn run_checked<F: FnMut()>(&self, line: &str, on_tick: F) -> RecoveryResult<()> {
        let status = self.run(line, on_tick)?;
        if status.success() {
            Ok(())
        } else {
            Err(RecoveryError::Command {
                command: line.to_string(),
                status,
            })
        }
    }
}
