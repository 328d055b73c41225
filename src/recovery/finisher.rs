// CLASSIFICATION: COMMUNITY
// Filename: finisher.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! End-of-run completion.
//!
//! [`RecoveryFinisher::finish`] may be called any number of times. Once
//! the control block reset in it has committed, a reboot with no new
//! request goes to the main system instead of recovery.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::bootloader::args::COMMAND_FILE;
use crate::bootloader::channel::ControlBlockChannel;
use crate::bootloader::message::ControlBlock;
use crate::error::{RecoveryError, RecoveryResult};
use crate::fs::roots::StorageRoots;
use crate::power::PowerControl;

/// Default location of the intent handed back to the main system.
pub const INTENT_FILE: &str = "CACHE:recovery/intent";
/// Default location of the persistent log.
pub const LOG_FILE: &str = "CACHE:recovery/log";
/// Default location of the session's transient log.
pub const TEMPORARY_LOG_FILE: &str = "/tmp/recovery.log";

/// Locations the finisher reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinisherPaths {
    pub intent_file: String,
    pub log_file: String,
    pub command_file: String,
    pub temp_log: PathBuf,
}

impl Default for FinisherPaths {
    fn default() -> Self {
        Self {
            intent_file: INTENT_FILE.into(),
            log_file: LOG_FILE.into(),
            command_file: COMMAND_FILE.into(),
            temp_log: PathBuf::from(TEMPORARY_LOG_FILE),
        }
    }
}

/// Idempotent completion routine with its own log cursor.
#[derive(Debug, Clone, Default)]
pub struct RecoveryFinisher {
    paths: FinisherPaths,
    log_offset: u64,
}

impl RecoveryFinisher {
    pub fn new(paths: FinisherPaths) -> Self {
        Self {
            paths,
            log_offset: 0,
        }
    }

    pub fn paths(&self) -> &FinisherPaths {
        &self.paths
    }

    /// Bytes of the transient log already copied out.
    pub fn log_offset(&self) -> u64 {
        self.log_offset
    }

    /// Persist the intent, copy the log tail, disarm the control block,
    /// drop the command file and sync.
    ///
    /// Only a failed control block write is returned as an error.
    pub fn finish(
        &mut self,
        send_intent: Option<&str>,
        channel: &ControlBlockChannel,
        roots: &dyn StorageRoots,
        power: &dyn PowerControl,
    ) -> RecoveryResult<()> {
        if let Some(intent) = send_intent {
            self.write_intent(intent, roots);
        }
        self.flush_log(roots);

        channel.set(&ControlBlock::default())?;

        self.remove_command_file(roots);
        power.sync();
        Ok(())
    }

    /// Overwrite the intent file with `intent`.
    pub fn write_intent(&self, intent: &str, roots: &dyn StorageRoots) {
        if let Err(e) = self.try_write_intent(intent, roots) {
            error!("{e}");
        }
    }

    fn try_write_intent(&self, intent: &str, roots: &dyn StorageRoots) -> RecoveryResult<()> {
        let target = &self.paths.intent_file;
        let path = roots.prepare(target, true)?;
        write_synced(&path, intent.as_bytes(), false)
            .map_err(|e| RecoveryError::io(format!("Can't write {target}"), e))
    }

    /// Append the not yet copied tail of the transient log to the
    /// persistent log.
    pub fn flush_log(&mut self, roots: &dyn StorageRoots) {
        let target = &self.paths.log_file;
        let dest = match roots.prepare(target, true) {
            Ok(path) => path,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        let tail = match read_tail(&self.paths.temp_log, self.log_offset) {
            Ok(tail) => tail,
            Err(e) => {
                warn!("Can't read {}: {e}", self.paths.temp_log.display());
                return;
            }
        };
        if tail.is_empty() {
            return;
        }
        match write_synced(&dest, &tail, true) {
            Ok(()) => self.log_offset += tail.len() as u64,
            Err(e) => warn!("Can't write {target}: {e}"),
        }
    }

    fn remove_command_file(&self, roots: &dyn StorageRoots) {
        let target = &self.paths.command_file;
        let removed = roots.prepare(target, false).and_then(|path| {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Removed {target}");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(RecoveryError::io(format!("Can't unlink {target}"), e)),
            }
        });
        if let Err(e) = removed {
            warn!("{e}");
        }
    }
}

fn read_tail(path: &Path, offset: u64) -> io::Result<Vec<u8>> {
    let mut src = File::open(path)?;
    src.seek(SeekFrom::Start(offset))?;
    let mut tail = Vec::new();
    src.read_to_end(&mut tail)?;
    Ok(tail)
}

fn write_synced(path: &Path, data: &[u8], append: bool) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    file.write_all(data)?;
    file.sync_data()
}
