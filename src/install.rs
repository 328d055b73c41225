// CLASSIFICATION: COMMUNITY
// Filename: install.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Update package installation.
//!
//! The installer is an external collaborator; the session only sees an
//! [`InstallResult`]. [`CommandInstaller`] checks an optional
//! `<package>.sha256` digest next to the package and then hands the
//! package to a configured update program.

use std::fs;
use std::path::Path;

use log::{error, info, warn};
use sha2::{Digest, Sha256};

use crate::exec::ExternalCommand;
use crate::fs::roots::StorageRoots;
use crate::ui::RecoveryUi;

/// Placeholder replaced by the package path in the installer command.
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Outcome of an install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallResult {
    Success,
    /// The package was read but installing it failed.
    Error,
    /// The package could not be found, opened or started.
    Aborted,
}

/// Installs update packages.
pub trait Installer {
    /// Install the package at `package` (`ROOT:path`).
    fn install(&self, package: &str, roots: &dyn StorageRoots, ui: &mut dyn RecoveryUi) -> InstallResult;
}

/// [`Installer`] that runs an external update program.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: String,
    runner: ExternalCommand,
}

impl CommandInstaller {
    /// Installer running `command`; `{package}` is replaced by the
    /// physical package path, or the path is appended.
    pub fn new(command: impl Into<String>, runner: ExternalCommand) -> Self {
        Self {
            command: command.into(),
            runner,
        }
    }

    fn command_line(&self, path: &Path) -> String {
        let path = path.display().to_string();
        if self.command.contains(PACKAGE_PLACEHOLDER) {
            self.command.replace(PACKAGE_PLACEHOLDER, &path)
        } else {
            format!("{} {}", self.command, path)
        }
    }
}

/// Compare `data` against the hex digest stored in `<path>.sha256`.
///
/// Returns `None` when there is no digest file.
pub fn verify_digest(path: &Path, data: &[u8]) -> Option<bool> {
    let mut digest_path = path.as_os_str().to_owned();
    digest_path.push(".sha256");
    let expected = fs::read_to_string(digest_path).ok()?;
    let expected = expected.split_whitespace().next().unwrap_or_default();
    let actual = hex::encode(Sha256::digest(data));
    Some(expected.eq_ignore_ascii_case(&actual))
}

impl Installer for CommandInstaller {
    fn install(&self, package: &str, roots: &dyn StorageRoots, ui: &mut dyn RecoveryUi) -> InstallResult {
        ui.print("Finding update package...\n");
        let path = match roots.prepare(package, false) {
            Ok(path) => path,
            Err(e) => {
                error!("Can't mount {package}: {e}");
                return InstallResult::Aborted;
            }
        };

        ui.print("Opening update package...\n");
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                error!("Can't open {package}: {e}");
                return InstallResult::Aborted;
            }
        };
        match verify_digest(&path, &data) {
            Some(true) => info!("Verified {package}"),
            Some(false) => {
                error!("Digest mismatch for {package}");
                return InstallResult::Error;
            }
            None => warn!("No digest for {package}; skipping verification"),
        }

        ui.print("Installing update...\n");
        let line = self.command_line(&path);
        match self.runner.run(&line, || ui.print(".")) {
            Ok(status) if status.success() => {
                ui.print("\nInstall from package complete.\n");
                InstallResult::Success
            }
            Ok(status) => {
                error!("Installer exited with {status}");
                InstallResult::Error
            }
            Err(e) => {
                error!("{e}");
                InstallResult::Aborted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::roots::RootTable;
    use crate::ui::ConsoleUi;
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, RootTable) {
        let dir = tempdir().unwrap();
        let mut roots = RootTable::default();
        roots.add("SDCARD", dir.path());
        (dir, roots)
    }

    fn console() -> ConsoleUi<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleUi::new(Cursor::new(Vec::new()), Vec::new(), false)
    }

    fn installer(command: &str) -> CommandInstaller {
        CommandInstaller::new(command, ExternalCommand::new("/bin/sh", Duration::from_millis(10)))
    }

    #[test]
    fn missing_package_aborts() {
        let (_dir, roots) = setup();
        let result = installer("true").install("SDCARD:absent.zip", &roots, &mut console());
        assert_eq!(result, InstallResult::Aborted);
    }

    #[test]
    fn placeholder_is_substituted() {
        let (dir, roots) = setup();
        fs::write(dir.path().join("update.zip"), b"payload").unwrap();
        let marker = dir.path().join("installed");
        let cmd = format!("cp {PACKAGE_PLACEHOLDER} {}", marker.display());
        let result = installer(&cmd).install("SDCARD:update.zip", &roots, &mut console());
        assert_eq!(result, InstallResult::Success);
        assert_eq!(fs::read(marker).unwrap(), b"payload");
    }

    #[test]
    fn failing_installer_is_error() {
        let (dir, roots) = setup();
        fs::write(dir.path().join("update.zip"), b"payload").unwrap();
        let result = installer("false").install("SDCARD:update.zip", &roots, &mut console());
        assert_eq!(result, InstallResult::Error);
    }

    #[test]
    fn digest_mismatch_is_error() {
        let (dir, roots) = setup();
        fs::write(dir.path().join("update.zip"), b"payload").unwrap();
        fs::write(dir.path().join("update.zip.sha256"), "00".repeat(32)).unwrap();
        let result = installer("true").install("SDCARD:update.zip", &roots, &mut console());
        assert_eq!(result, InstallResult::Error);
    }

    #[test]
    fn matching_digest_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg");
        let digest = hex::encode(Sha256::digest(b"abc"));
        fs::write(dir.path().join("pkg.sha256"), format!("{digest}  pkg\n")).unwrap();
        assert_eq!(verify_digest(&path, b"abc"), Some(true));
        assert_eq!(verify_digest(&dir.path().join("other"), b"abc"), None);
    }
}
