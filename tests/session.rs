// CLASSIFICATION: COMMUNITY
// Filename: session.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

use cohrecovery::bootloader::{ControlBlock, ControlBlockChannel, MaintenanceAction};
use cohrecovery::error::{RecoveryError, RecoveryResult};
use cohrecovery::firmware::{FirmwareOutcome, FirmwareUpdater};
use cohrecovery::fs::{RootTable, StorageRoots};
use cohrecovery::install::{InstallResult, Installer};
use cohrecovery::power::PowerControl;
use cohrecovery::recovery::{
    Collaborators, FinisherPaths, RecoveryFinisher, RecoverySession, RecoveryStatus, SessionConfig,
    SessionState,
};
use cohrecovery::ui::{Background, MenuCommand, ParkAction, RecoveryUi};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::{tempdir, TempDir};

type Events = Rc<RefCell<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events.borrow_mut().push(event.into());
}

struct ScriptedUi {
    events: Events,
    channel: ControlBlockChannel,
    choices: VecDeque<ParkAction>,
    text_visible: bool,
}

impl RecoveryUi for ScriptedUi {
    fn print(&mut self, text: &str) {
        record(&self.events, format!("print:{}", text.trim()));
    }
    fn set_background(&mut self, background: Background) {
        record(&self.events, format!("background:{background:?}"));
    }
    fn show_indeterminate_progress(&mut self) {}
    fn reset_progress(&mut self) {}
    fn text_visible(&self) -> bool {
        self.text_visible
    }
    fn prompt(&mut self, _commands: &[MenuCommand]) -> ParkAction {
        record(&self.events, format!("prompt:{}", self.channel.get().command));
        self.choices.pop_front().unwrap_or(ParkAction::Reboot)
    }
}

struct FixedInstaller {
    events: Events,
    result: InstallResult,
}

impl Installer for FixedInstaller {
    fn install(&self, package: &str, _roots: &dyn StorageRoots, _ui: &mut dyn RecoveryUi) -> InstallResult {
        record(&self.events, format!("install:{package}"));
        self.result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirmwareScript {
    Nothing,
    Restart,
    Fails,
    ControlBlockFails,
}

struct FakeFirmware {
    events: Events,
    script: FirmwareScript,
    dir: PathBuf,
}

impl FirmwareUpdater for FakeFirmware {
    fn pending(&self) -> bool {
        self.script == FirmwareScript::Restart
    }

    fn maybe_install(
        &mut self,
        _send_intent: Option<&str>,
        channel: &ControlBlockChannel,
        _roots: &dyn StorageRoots,
        _ui: &mut dyn RecoveryUi,
    ) -> RecoveryResult<FirmwareOutcome> {
        record(&self.events, format!("firmware:{}", channel.get().command));
        let mut boot = ControlBlock::for_recovery(["--wipe_cache"]);
        boot.command = "update-radio".into();
        match self.script {
            FirmwareScript::Nothing => Ok(FirmwareOutcome::NothingPending),
            FirmwareScript::Restart => {
                channel.set(&boot)?;
                Ok(FirmwareOutcome::RestartScheduled)
            }
            FirmwareScript::Fails => Err(RecoveryError::Config("firmware unavailable".into())),
            FirmwareScript::ControlBlockFails => {
                ControlBlockChannel::new(self.dir.join("misc-gone"), 0).set(&boot)?;
                Ok(FirmwareOutcome::RestartScheduled)
            }
        }
    }
}

struct FakePower {
    events: Events,
}

impl PowerControl for FakePower {
    fn sync(&self) {
        record(&self.events, "sync");
    }
    fn reboot(&self) -> RecoveryResult<()> {
        record(&self.events, "reboot");
        Ok(())
    }
}

struct Rig {
    dir: TempDir,
    events: Events,
    channel: ControlBlockChannel,
    data: PathBuf,
    cache: PathBuf,
    install: InstallResult,
    firmware: FirmwareScript,
    choices: Vec<ParkAction>,
    text_visible: bool,
    reboot: bool,
}

impl Rig {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        let cache = dir.path().join("cache");
        fs::create_dir_all(&data).unwrap();
        fs::create_dir_all(cache.join("recovery")).unwrap();
        fs::write(data.join("user.db"), b"user").unwrap();
        fs::write(cache.join("downloaded.bin"), b"cache").unwrap();
        let misc = dir.path().join("misc");
        fs::write(&misc, vec![0u8; 2048]).unwrap();
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            channel: ControlBlockChannel::new(&misc, 0),
            data,
            cache,
            dir,
            install: InstallResult::Success,
            firmware: FirmwareScript::Nothing,
            choices: Vec::new(),
            text_visible: false,
            reboot: true,
        }
    }

    fn session(&self) -> RecoverySession {
        let mut roots = RootTable::default();
        roots.add("DATA", &self.data).add("CACHE", &self.cache);
        let parts = Collaborators {
            roots: Box::new(roots),
            installer: Box::new(FixedInstaller {
                events: self.events.clone(),
                result: self.install,
            }),
            firmware: Box::new(FakeFirmware {
                events: self.events.clone(),
                script: self.firmware,
                dir: self.dir.path().to_path_buf(),
            }),
            ui: Box::new(ScriptedUi {
                events: self.events.clone(),
                channel: self.channel.clone(),
                choices: self.choices.clone().into(),
                text_visible: self.text_visible,
            }),
            power: Box::new(FakePower {
                events: self.events.clone(),
            }),
        };
        let config = SessionConfig {
            reboot: self.reboot,
            ..Default::default()
        };
        let finisher = RecoveryFinisher::new(FinisherPaths {
            temp_log: self.dir.path().join("recovery.log"),
            ..Default::default()
        });
        RecoverySession::new(config, self.channel.clone(), finisher, parts)
    }

    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn saw(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[test]
fn wipe_data_from_control_block_runs_to_reboot() {
    let rig = Rig::new();
    rig.channel
        .set(&ControlBlock::for_recovery(["--wipe_data", "--send_intent=wiped"]))
        .unwrap();

    let mut session = rig.session();
    let outcome = session.run(["recovery"]).unwrap();

    assert_eq!(outcome.status, RecoveryStatus::Success);
    assert!(outcome.finished);
    assert!(outcome.rebooted);
    assert_eq!(outcome.options.send_intent.as_deref(), Some("wiped"));
    assert_eq!(session.state(), &SessionState::Reboot);
    assert!(!rig.data.join("user.db").exists());
    assert!(!rig.cache.join("downloaded.bin").exists());
    assert!(rig.channel.get().is_empty());
    assert_eq!(
        fs::read_to_string(rig.cache.join("recovery/intent")).unwrap(),
        "wiped"
    );
    assert_eq!(rig.count("prompt"), 0);
    let events = rig.events();
    let firmware = events.iter().position(|e| e.starts_with("firmware")).unwrap();
    let reboot = events.iter().position(|e| e == "reboot").unwrap();
    assert!(firmware < reboot);
}

#[test]
fn failed_install_parks_then_finishes() {
    let mut rig = Rig::new();
    rig.install = InstallResult::Error;
    let mut session = rig.session();
    let outcome = session
        .run(["recovery", "--update_package=SDCARD:update.zip"])
        .unwrap();

    assert_eq!(outcome.status, RecoveryStatus::Error);
    assert!(outcome.finished);
    assert!(rig.saw("install:SDCARD:update.zip"));
    assert!(rig.saw("print:Installation aborted."));
    assert!(rig.saw("background:Error"));
    assert!(rig.saw("prompt:boot-recovery"));
    assert!(rig.channel.get().is_empty());
}

#[test]
fn control_block_stays_armed_while_parked_and_at_firmware_check() {
    let mut rig = Rig::new();
    rig.firmware = FirmwareScript::Fails;
    rig.choices = vec![ParkAction::Install {
        package: "SDCARD:retry.zip".into(),
    }];
    rig.install = InstallResult::Success;
    rig.channel.set(&ControlBlock::for_recovery(["--bogus"])).unwrap();

    let mut session = rig.session();
    let outcome = session.run(["recovery"]).unwrap();
    // No action was requested, the menu install succeeded with the
    // text hidden, and a firmware error does not stop the finisher.
    assert_eq!(outcome.status, RecoveryStatus::Error);
    assert!(outcome.finished);
    assert!(rig.saw("install:SDCARD:retry.zip"));
    assert_eq!(rig.count("prompt"), 1);
    assert!(rig.saw("prompt:boot-recovery"));
    assert!(rig.saw("firmware:boot-recovery"));
    assert!(rig.channel.get().is_empty());
}

#[test]
fn scheduled_firmware_skips_finisher() {
    let mut rig = Rig::new();
    rig.firmware = FirmwareScript::Restart;
    let mut session = rig.session();
    let outcome = session.run(["recovery", "--wipe_cache"]).unwrap();

    assert_eq!(outcome.status, RecoveryStatus::Success);
    assert!(!outcome.finished);
    assert!(outcome.rebooted);
    let boot = rig.channel.get();
    assert_eq!(boot.command, "update-radio");
    assert_eq!(boot.recovery, "recovery\n--wipe_cache\n");
    assert!(rig.saw("sync"));
}

#[test]
fn visible_menu_stays_open_after_wipe() {
    let mut rig = Rig::new();
    rig.text_visible = true;
    rig.choices = vec![
        ParkAction::Wipe(MaintenanceAction::WipeCache),
        ParkAction::Reboot,
    ];
    let mut session = rig.session();
    let outcome = session.run(["recovery"]).unwrap();

    assert_eq!(outcome.status, RecoveryStatus::Error);
    assert!(rig.saw("print:Formatting CACHE:..."));
    assert!(rig.saw("print:Data wipe complete."));
    assert!(rig.data.join("user.db").exists());
    assert!(!rig.cache.join("downloaded.bin").exists());
    assert_eq!(rig.count("prompt"), 2);
}

#[test]
fn control_block_failure_in_firmware_step_is_fatal() {
    let mut rig = Rig::new();
    rig.firmware = FirmwareScript::ControlBlockFails;
    let mut session = rig.session();
    let err = session.run(["recovery", "--wipe_cache"]).unwrap_err();

    assert!(err.is_control_block());
    assert!(rig.saw("firmware:boot-recovery"));
    assert!(!rig.saw("reboot"));
    assert!(!rig.saw("sync"));
    let boot = rig.channel.get();
    assert_eq!(boot.command, "boot-recovery");
    assert_eq!(boot.recovery, "recovery\n--wipe_cache\n");
}

#[test]
fn reboot_disabled_halts() {
    let mut rig = Rig::new();
    rig.reboot = false;
    let mut session = rig.session();
    let outcome = session.run(["recovery", "--wipe_cache"]).unwrap();
    assert!(outcome.finished);
    assert!(!outcome.rebooted);
    assert_eq!(session.state(), &SessionState::Halt);
    assert!(!rig.saw("reboot"));
}

#[test]
fn interrupted_run_repeats_request() {
    let rig = Rig::new();
    rig.channel
        .set(&ControlBlock::for_recovery(["--wipe_cache"]))
        .unwrap();
    // First boot: the request is re-armed, then power is lost before
    // the finisher runs.
    let list = cohrecovery::bootloader::ArgumentResolver::new(&rig.channel, &RootTable::default())
        .resolve(["recovery"])
        .unwrap();
    assert_eq!(list.args(), ["--wipe_cache"]);

    let mut session = rig.session();
    let outcome = session.run(["recovery"]).unwrap();
    assert!(outcome.options.wipe_cache);
    assert_eq!(outcome.status, RecoveryStatus::Success);
    assert!(rig.channel.get().is_empty());
}
