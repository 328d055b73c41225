// CLASSIFICATION: COMMUNITY
// Filename: firmware.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Companion firmware (radio/hboot) hand-off to the bootloader.
//!
//! An installed package may leave a firmware image in the staging
//! directory. Before returning to the main system the session asks the
//! [`FirmwareUpdater`] to schedule it: the image is copied into the raw
//! cache partition and the control block is pointed at the bootloader's
//! updater, which reboots back into recovery with `--wipe_cache` when
//! done.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::bootloader::channel::ControlBlockChannel;
use crate::bootloader::message::ControlBlock;
use crate::error::{IoResultExt, RecoveryResult};
use crate::flash::mtd::{FilePartition, PartitionTable, RawPartition};
use crate::fs::roots::StorageRoots;
use crate::ui::{Background, RecoveryUi};

/// Result of the firmware check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareOutcome {
    /// No firmware staged; the session may finish normally.
    NothingPending,
    /// The control block now schedules a firmware cycle. The caller
    /// must reboot without clearing it.
    RestartScheduled,
}

/// Kind of staged firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareKind {
    Radio,
    Hboot,
}

impl FirmwareKind {
    const ALL: [FirmwareKind; 2] = [FirmwareKind::Radio, FirmwareKind::Hboot];

    /// File name in the staging directory.
    pub fn image_name(self) -> &'static str {
        match self {
            FirmwareKind::Radio => "radio.img",
            FirmwareKind::Hboot => "hboot.img",
        }
    }

    /// Control block command that makes the bootloader flash it.
    pub fn command(self) -> &'static str {
        match self {
            FirmwareKind::Radio => "update-radio",
            FirmwareKind::Hboot => "update-hboot",
        }
    }
}

/// Detects and schedules pending firmware.
pub trait FirmwareUpdater {
    /// True when an image is waiting to be handed to the bootloader.
    fn pending(&self) -> bool;

    /// Schedule pending firmware, rewriting the control block.
    fn maybe_install(
        &mut self,
        send_intent: Option<&str>,
        channel: &ControlBlockChannel,
        roots: &dyn StorageRoots,
        ui: &mut dyn RecoveryUi,
    ) -> RecoveryResult<FirmwareOutcome>;
}

#[derive(Debug, Clone)]
enum CacheTarget {
    Scan {
        proc_mtd: PathBuf,
        dev_dir: PathBuf,
        name: String,
    },
    Fixed(FilePartition),
}

/// [`FirmwareUpdater`] reading images from a staging directory.
#[derive(Debug, Clone)]
pub struct FirmwareStager {
    staging_dir: PathBuf,
    target: CacheTarget,
}

impl FirmwareStager {
    /// Stager that finds the raw cache partition by scanning `proc_mtd`.
    pub fn new(
        staging_dir: impl Into<PathBuf>,
        proc_mtd: impl Into<PathBuf>,
        dev_dir: impl Into<PathBuf>,
        cache_partition: impl Into<String>,
    ) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            target: CacheTarget::Scan {
                proc_mtd: proc_mtd.into(),
                dev_dir: dev_dir.into(),
                name: cache_partition.into(),
            },
        }
    }

    /// Stager writing into an already known partition.
    pub fn with_partition(staging_dir: impl Into<PathBuf>, cache: FilePartition) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            target: CacheTarget::Fixed(cache),
        }
    }

    fn staged(&self) -> Option<(FirmwareKind, PathBuf)> {
        FirmwareKind::ALL
            .iter()
            .map(|&kind| (kind, self.staging_dir.join(kind.image_name())))
            .find(|(_, path)| path.is_file())
    }

    fn cache_partition(&self) -> RecoveryResult<Box<dyn RawPartition>> {
        match &self.target {
            CacheTarget::Scan {
                proc_mtd,
                dev_dir,
                name,
            } => PartitionTable::scan(proc_mtd, dev_dir.clone())?.find(name),
            CacheTarget::Fixed(part) => Ok(Box::new(part.clone())),
        }
    }

    fn write_image(&self, image: &Path) -> RecoveryResult<()> {
        let data = fs::read(image).context(|| format!("Can't read {}", image.display()))?;
        let mut cache = self.cache_partition()?;
        let name = cache.name().to_string();
        let mut out = cache.open_write().context(|| format!("Can't open {name}"))?;
        out.write_all(&data).context(|| format!("Can't write {name}"))?;
        out.close().context(|| format!("Can't close {name}"))?;
        Ok(())
    }
}

impl FirmwareUpdater for FirmwareStager {
    fn pending(&self) -> bool {
        self.staged().is_some()
    }

    fn maybe_install(
        &mut self,
        send_intent: Option<&str>,
        channel: &ControlBlockChannel,
        roots: &dyn StorageRoots,
        ui: &mut dyn RecoveryUi,
    ) -> RecoveryResult<FirmwareOutcome> {
        let Some((kind, image)) = self.staged() else {
            return Ok(FirmwareOutcome::NothingPending);
        };
        info!("Scheduling {} from {}", kind.command(), image.display());

        // A reboot from here on wipes the cache and returns to the system.
        let mut args = vec!["--wipe_cache".to_string()];
        if let Some(intent) = send_intent {
            args.push(format!("--send_intent={intent}"));
        }
        let mut boot = ControlBlock::for_recovery(&args);
        channel.set(&boot)?;

        ui.set_background(Background::Installing);
        ui.print("Writing firmware image...\n");
        if let Err(e) = self.write_image(&image) {
            error!("Can't write {} image: {e}", kind.image_name());
            ui.set_background(Background::Error);
            if let Err(fe) = roots.format("CACHE:") {
                error!("Can't clean up cache: {fe}");
            }
            return Err(e);
        }

        // The image now lives in the cache partition; a leftover staged
        // copy only costs space.
        if let Err(e) = fs::remove_file(&image) {
            warn!("Can't remove {}: {e}", image.display());
        }
        boot.command = kind.command().to_string();
        channel.set(&boot)?;
        Ok(FirmwareOutcome::RestartScheduled)
    }
}
