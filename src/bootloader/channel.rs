// CLASSIFICATION: COMMUNITY
// Filename: channel.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Durable read/write access to the boot control block.
//!
//! The record sits at a fixed byte offset inside the misc device. Reads
//! are best effort; writes replace the whole record and are fatal when
//! they fail. On an MTD character device the erase blocks under the
//! record are read, patched, erased and rewritten.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::message::{ControlBlock, CONTROL_BLOCK_SIZE};
use crate::error::{RecoveryError, RecoveryResult};
use crate::flash::erase::{self, EraseBlockDevice, MtdDevice};

/// Handle on the control block stored in the misc device.
#[derive(Debug, Clone)]
pub struct ControlBlockChannel {
    device: PathBuf,
    offset: u64,
}

impl ControlBlockChannel {
    /// Channel for a record at `offset` bytes into `device`.
    pub fn new(device: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            device: device.into(),
            offset,
        }
    }

    /// Path of the backing device.
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Read the current record.
    ///
    /// Never fails: any I/O error yields [`ControlBlock::default`] and a
    /// warning.
    pub fn get(&self) -> ControlBlock {
        let mut buf = [0u8; CONTROL_BLOCK_SIZE];
        let read = File::open(&self.device).and_then(|f| f.read_exact_at(&mut buf, self.offset));
        if let Err(e) = read {
            warn!("Can't read control block from {}: {e}", self.device.display());
            return ControlBlock::default();
        }
        let block = ControlBlock::decode(&buf);
        if !block.command.is_empty() {
            info!("Boot command: {}", block.command);
        }
        if !block.status.is_empty() {
            info!("Boot status: {}", block.status);
        }
        block
    }

    /// Overwrite the whole record and sync it to the device.
    ///
    /// Every failure is a [`RecoveryError::ControlBlock`].
    pub fn set(&self, block: &ControlBlock) -> RecoveryResult<()> {
        if erase::is_char_device(&self.device) {
            let dev = MtdDevice::open(&self.device).map_err(|e| self.failed("Can't open", e))?;
            return self.set_on(&dev, block);
        }
        let file = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .map_err(|e| self.failed("Can't open", e))?;
        file.write_all_at(&block.encode(), self.offset)
            .map_err(|e| self.failed("Failed writing", e))?;
        file.sync_data().map_err(|e| self.failed("Failed syncing", e))?;
        Ok(())
    }

    /// Rewrite the record on erase-block flash, keeping the bytes around it.
    pub fn set_on<D: EraseBlockDevice + ?Sized>(&self, dev: &D, block: &ControlBlock) -> RecoveryResult<()> {
        erase::rewrite_region(dev, self.offset, &block.encode())
            .map_err(|e| self.failed("Failed writing", e))
    }

    fn failed(&self, what: &str, e: std::io::Error) -> RecoveryError {
        RecoveryError::control_block(format!("{what} {}", self.device.display()), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::message::BOOT_RECOVERY;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_device_reads_default() {
        let dir = tempdir().unwrap();
        let channel = ControlBlockChannel::new(dir.path().join("misc"), 0);
        assert_eq!(channel.get(), ControlBlock::default());
    }

    #[test]
    fn short_device_reads_default() {
        let dir = tempdir().unwrap();
        let misc = dir.path().join("misc");
        fs::write(&misc, b"boot-recovery").unwrap();
        let channel = ControlBlockChannel::new(&misc, 0);
        assert!(channel.get().is_empty());
    }

    #[test]
    fn set_then_get_at_offset() {
        let dir = tempdir().unwrap();
        let misc = dir.path().join("misc");
        fs::write(&misc, vec![0xFFu8; 4096]).unwrap();
        let channel = ControlBlockChannel::new(&misc, 2048);
        assert!(channel.get().is_empty());

        let block = ControlBlock::for_recovery(["--wipe_data"]);
        channel.set(&block).unwrap();
        assert_eq!(channel.get().command, BOOT_RECOVERY);

        let raw = fs::read(&misc).unwrap();
        assert_eq!(raw.len(), 4096);
        assert!(raw[..2048].iter().all(|&b| b == 0xFF));
        assert_eq!(&raw[2048..2048 + BOOT_RECOVERY.len()], BOOT_RECOVERY.as_bytes());
    }

    #[test]
    fn set_on_missing_device_is_fatal() {
        let dir = tempdir().unwrap();
        let channel = ControlBlockChannel::new(dir.path().join("absent"), 0);
        let err = channel.set(&ControlBlock::default()).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.is_control_block());
    }

    #[test]
    fn set_on_flash_erases_and_keeps_neighbours() {
        use crate::flash::erase::testing::SimFlash;

        let flash = SimFlash::new(4, 512);
        flash.cells.borrow_mut()[..256].fill(0x5A);
        let channel = ControlBlockChannel::new("/dev/mtd/mtd0", 256);
        channel
            .set_on(&flash, &ControlBlock::for_recovery(["--wipe_data"]))
            .unwrap();
        channel.set_on(&flash, &ControlBlock::default()).unwrap();

        let cells = flash.cells.borrow();
        assert!(cells[..256].iter().all(|&b| b == 0x5A));
        let mut raw = [0u8; CONTROL_BLOCK_SIZE];
        raw.copy_from_slice(&cells[256..256 + CONTROL_BLOCK_SIZE]);
        assert!(ControlBlock::decode(&raw).is_empty());
        assert_eq!(*flash.erases.borrow(), [0, 512, 1024, 0, 512, 1024]);
    }
}
