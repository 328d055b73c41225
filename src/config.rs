// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Device configuration for the recovery agent.
//!
//! Loaded from YAML (`$RECOVERY_CONFIG`, default `/etc/recovery.yaml`).
//! Every field has a default, so a missing file or a partial one is
//! fine. `RECOVERY_NO_REBOOT=1` and `RECOVERY_TMP_LOG` override the
//! file for diagnostic runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::bootloader::args::COMMAND_FILE;
use crate::bootloader::channel::ControlBlockChannel;
use crate::error::{RecoveryError, RecoveryResult};
use crate::exec::ExternalCommand;
use crate::firmware::FirmwareStager;
use crate::fs::roots::{RootSpec, RootTable};
use crate::install::CommandInstaller;
use crate::recovery::finisher::{FinisherPaths, INTENT_FILE, LOG_FILE, TEMPORARY_LOG_FILE};
use crate::recovery::session::SessionConfig;
use crate::ui::MenuCommand;

pub const CONFIG_ENV: &str = "RECOVERY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/recovery.yaml";
pub const NO_REBOOT_ENV: &str = "RECOVERY_NO_REBOOT";
pub const TMP_LOG_ENV: &str = "RECOVERY_TMP_LOG";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Device holding the boot control block.
    pub misc_device: PathBuf,
    /// Byte offset of the control block inside `misc_device`.
    pub misc_offset: u64,
    pub command_file: String,
    pub intent_file: String,
    pub log_file: String,
    pub temp_log: PathBuf,
    pub roots: BTreeMap<String, RootSpec>,
    pub shell: PathBuf,
    pub poll_interval_ms: u64,
    /// Update program; `{package}` is replaced by the package path.
    pub installer: String,
    pub firmware_staging: PathBuf,
    pub cache_partition: String,
    pub proc_mtd: PathBuf,
    pub mtd_dev_dir: PathBuf,
    pub text_visible: bool,
    pub reboot: bool,
    pub menu: Vec<MenuCommand>,
}

fn root(mount_point: &str) -> RootSpec {
    RootSpec {
        mount_point: mount_point.into(),
        format_command: None,
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        let roots = [("CACHE", "/cache"), ("DATA", "/data"), ("SDCARD", "/sdcard")]
            .into_iter()
            .map(|(name, dir)| (name.to_string(), root(dir)))
            .collect();
        Self {
            misc_device: "/dev/mtd/mtd0".into(),
            misc_offset: 0,
            command_file: COMMAND_FILE.into(),
            intent_file: INTENT_FILE.into(),
            log_file: LOG_FILE.into(),
            temp_log: TEMPORARY_LOG_FILE.into(),
            roots,
            shell: "/sbin/sh".into(),
            poll_interval_ms: 1000,
            installer: "/sbin/update-binary {package}".into(),
            firmware_staging: "/tmp/firmware".into(),
            cache_partition: "cache".into(),
            proc_mtd: "/proc/mtd".into(),
            mtd_dev_dir: "/dev/mtd".into(),
            text_visible: false,
            reboot: true,
            menu: Vec::new(),
        }
    }
}

impl RecoveryConfig {
    /// Parse a YAML config file.
    pub fn load(path: &Path) -> RecoveryResult<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| RecoveryError::io(format!("Can't read {}", path.display()), e))?;
        serde_yaml::from_str(&data)
            .map_err(|e| RecoveryError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `RECOVERY_NO_REBOOT` and `RECOVERY_TMP_LOG`.
    pub fn apply_env(&mut self) {
        if std::env::var(NO_REBOOT_ENV).map(|v| v == "1").unwrap_or(false) {
            self.reboot = false;
        }
        if let Ok(path) = std::env::var(TMP_LOG_ENV) {
            if !path.is_empty() {
                self.temp_log = path.into();
            }
        }
    }

    pub fn runner(&self) -> ExternalCommand {
        ExternalCommand::new(&self.shell, Duration::from_millis(self.poll_interval_ms))
    }

    pub fn channel(&self) -> ControlBlockChannel {
        ControlBlockChannel::new(&self.misc_device, self.misc_offset)
    }

    pub fn root_table(&self) -> RootTable {
        RootTable::from_specs(self.roots.clone(), self.runner())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reboot: self.reboot,
            command_file: self.command_file.clone(),
            menu: self.menu.clone(),
            runner: self.runner(),
        }
    }

    pub fn finisher_paths(&self) -> FinisherPaths {
        FinisherPaths {
            intent_file: self.intent_file.clone(),
            log_file: self.log_file.clone(),
            command_file: self.command_file.clone(),
            temp_log: self.temp_log.clone(),
        }
    }

    pub fn firmware_stager(&self) -> FirmwareStager {
        FirmwareStager::new(
            &self.firmware_staging,
            &self.proc_mtd,
            &self.mtd_dev_dir,
            self.cache_partition.clone(),
        )
    }

    pub fn installer(&self) -> CommandInstaller {
        CommandInstaller::new(self.installer.clone(), self.runner())
    }
}

/// Config from `$RECOVERY_CONFIG` with environment overrides applied.
///
/// A missing file means defaults; an unreadable or invalid one is
/// reported and also falls back to defaults.
pub fn load_active() -> RecoveryConfig {
    let path: PathBuf = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut cfg = match RecoveryConfig::load(&path) {
        Ok(cfg) => cfg,
        Err(e) if e.is_not_found() => RecoveryConfig::default(),
        Err(e) => {
            eprintln!("[recovery] using default config: {e}");
            RecoveryConfig::default()
        }
    };
    cfg.apply_env();
    cfg
}
