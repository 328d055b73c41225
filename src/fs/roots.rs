// CLASSIFICATION: COMMUNITY
// Filename: roots.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Logical storage roots for the recovery environment.
//!
//! Paths are written as `ROOT:relative/path` (`CACHE:recovery/command`,
//! `SDCARD:update.zip`). A [`RootTable`] maps each root name onto a
//! mount point and knows how to reformat it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::error::{IoResultExt, RecoveryError, RecoveryResult};
use crate::exec::ExternalCommand;

/// Mount/translate/format boundary for logical roots.
pub trait StorageRoots {
    /// Make sure the root named by `root_path` is available.
    fn ensure_mounted(&self, root_path: &str) -> RecoveryResult<()>;

    /// Translate `ROOT:path` into a physical path.
    fn translate(&self, root_path: &str) -> RecoveryResult<PathBuf>;

    /// Erase every file on the root named by `root_path`.
    fn format(&self, root_path: &str) -> RecoveryResult<()>;

    /// Mount and translate in one step, creating parent directories
    /// when the caller intends to write.
    fn prepare(&self, root_path: &str, for_write: bool) -> RecoveryResult<PathBuf> {
        self.ensure_mounted(root_path)?;
        let path = self.translate(root_path)?;
        if for_write {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .context(|| format!("Can't create {}", parent.display()))?;
            }
        }
        Ok(path)
    }
}

/// One entry of the root table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RootSpec {
    /// Directory where the root is mounted.
    pub mount_point: PathBuf,
    /// Optional shell line that reformats the root (e.g. `mkfs`).
    #[serde(default)]
    pub format_command: Option<String>,
}

/// Split `ROOT:path` into its root name and relative part.
pub fn split_root_path(root_path: &str) -> RecoveryResult<(&str, &str)> {
    match root_path.split_once(':') {
        Some((root, rest)) if !root.is_empty() && !root.contains('/') => {
            Ok((root, rest.trim_start_matches('/')))
        }
        _ => Err(RecoveryError::BadRootPath(root_path.to_string())),
    }
}

/// Directory-backed implementation of [`StorageRoots`].
#[derive(Debug, Clone, Default)]
pub struct RootTable {
    roots: BTreeMap<String, RootSpec>,
    runner: ExternalCommand,
}

impl RootTable {
    /// Empty table formatting through `runner`.
    pub fn new(runner: ExternalCommand) -> Self {
        Self {
            roots: BTreeMap::new(),
            runner,
        }
    }

    /// Build a table from configured entries.
    pub fn from_specs(specs: BTreeMap<String, RootSpec>, runner: ExternalCommand) -> Self {
        Self { roots: specs, runner }
    }

    /// Register `name` (without the trailing colon) at `mount_point`.
    pub fn add(&mut self, name: &str, mount_point: impl Into<PathBuf>) -> &mut Self {
        self.roots.insert(
            name.to_string(),
            RootSpec {
                mount_point: mount_point.into(),
                format_command: None,
            },
        );
        self
    }

    fn lookup<'a>(&'a self, root_path: &'a str) -> RecoveryResult<(&'a RootSpec, &'a str)> {
        let (root, rest) = split_root_path(root_path)?;
        let spec = self
            .roots
            .get(root)
            .ok_or_else(|| RecoveryError::UnknownRoot(root.to_string()))?;
        Ok((spec, rest))
    }
}

impl StorageRoots for RootTable {
    fn ensure_mounted(&self, root_path: &str) -> RecoveryResult<()> {
        let (spec, _) = self.lookup(root_path)?;
        let meta = fs::metadata(&spec.mount_point)
            .context(|| format!("Can't mount {root_path}"))?;
        if !meta.is_dir() {
            return Err(RecoveryError::io(
                format!("Can't mount {root_path}"),
                std::io::Error::new(std::io::ErrorKind::Other, "mount point is not a directory"),
            ));
        }
        Ok(())
    }

    fn translate(&self, root_path: &str) -> RecoveryResult<PathBuf> {
        let (spec, rest) = self.lookup(root_path)?;
        if rest.is_empty() {
            Ok(spec.mount_point.clone())
        } else {
            Ok(spec.mount_point.join(rest))
        }
    }

    fn format(&self, root_path: &str) -> RecoveryResult<()> {
        let (spec, _) = self.lookup(root_path)?;
        info!("Formatting {root_path}");
        match &spec.format_command {
            Some(line) => self.runner.run_checked(line, || {}),
            None => clear_dir(&spec.mount_point),
        }
    }
}

fn clear_dir(dir: &Path) -> RecoveryResult<()> {
    let entries = fs::read_dir(dir).context(|| format!("Can't format {}", dir.display()))?;
    for entry in entries {
        let entry = entry.context(|| format!("Can't format {}", dir.display()))?;
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .context(|| format!("Can't stat {}", path.display()))?
            .is_dir();
        let removed = if is_dir {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.context(|| format!("Can't remove {}", path.display()))?;
    }
    Ok(())
}
