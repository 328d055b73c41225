// CLASSIFICATION: COMMUNITY
// Filename: power.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Storage sync and reboot primitives.

use std::io;

use log::info;

use crate::error::{RecoveryError, RecoveryResult};

/// Flushes storage and restarts the device.
pub trait PowerControl {
    /// Commit all buffered filesystem writes.
    fn sync(&self);

    /// Restart the device. Only returns on failure, or from test doubles.
    fn reboot(&self) -> RecoveryResult<()>;
}

/// [`PowerControl`] backed by the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPower;

impl PowerControl for SystemPower {
    fn sync(&self) {
        // SAFETY: sync(2) takes no arguments and cannot fail.
        unsafe { libc::sync() };
    }

    fn reboot(&self) -> RecoveryResult<()> {
        info!("Rebooting");
        // SAFETY: reboot(2) with RB_AUTOBOOT does not touch process memory.
        let rc = unsafe { libc::reboot(libc::RB_AUTOBOOT) };
        if rc != 0 {
            return Err(RecoveryError::io("reboot failed", io::Error::last_os_error()));
        }
        Ok(())
    }
}
