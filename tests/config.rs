// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

use cohrecovery::config::{load_active, RecoveryConfig};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn clear_env() {
    std::env::remove_var("RECOVERY_CONFIG");
    std::env::remove_var("RECOVERY_NO_REBOOT");
    std::env::remove_var("RECOVERY_TMP_LOG");
}

#[test]
#[serial]
fn load_from_env_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("recovery.yaml");
    fs::write(
        &path,
        "misc_device: /dev/block/misc\nmisc_offset: 0\ntext_visible: true\ninstaller: /bin/true\n",
    )
    .unwrap();
    std::env::set_var("RECOVERY_CONFIG", &path);
    let cfg = load_active();
    clear_env();
    assert_eq!(cfg.misc_device, PathBuf::from("/dev/block/misc"));
    assert!(cfg.text_visible);
    assert_eq!(cfg.installer, "/bin/true");
    assert_eq!(cfg.channel().device(), PathBuf::from("/dev/block/misc").as_path());
}

#[test]
#[serial]
fn missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    std::env::set_var("RECOVERY_CONFIG", dir.path().join("absent.yaml"));
    let cfg = load_active();
    clear_env();
    assert_eq!(cfg, RecoveryConfig::default());
}

#[test]
#[serial]
fn invalid_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("recovery.yaml");
    fs::write(&path, "roots: 12\n").unwrap();
    std::env::set_var("RECOVERY_CONFIG", &path);
    let cfg = load_active();
    clear_env();
    assert_eq!(cfg, RecoveryConfig::default());
}

#[test]
#[serial]
fn env_overrides_apply_last() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("recovery.yaml");
    fs::write(&path, "reboot: true\ntemp_log: /tmp/a.log\n").unwrap();
    std::env::set_var("RECOVERY_CONFIG", &path);
    std::env::set_var("RECOVERY_NO_REBOOT", "1");
    std::env::set_var("RECOVERY_TMP_LOG", dir.path().join("b.log"));
    let cfg = load_active();
    clear_env();
    assert!(!cfg.reboot);
    assert!(!cfg.session_config().reboot);
    assert_eq!(cfg.temp_log, dir.path().join("b.log"));
    assert_eq!(cfg.finisher_paths().temp_log, dir.path().join("b.log"));
}
