// CLASSIFICATION: COMMUNITY
// Filename: session.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! One recovery run, from argument resolution to reboot.
//!
//! ```text
//! Start → ArgsResolved → Executing(action) → Completed(status)
//!       → ParkForUser? → FirmwareCheck → Finishing → Reboot | Halt
//! ```
//!
//! The control block stays armed until `Finishing`, so a power cut at
//! any earlier point re-runs the same request.

use log::{error, info, warn};

use crate::bootloader::args::{ArgumentResolver, COMMAND_FILE};
use crate::bootloader::channel::ControlBlockChannel;
use crate::bootloader::options::{MaintenanceAction, RecoveryOptions};
use crate::error::RecoveryResult;
use crate::exec::ExternalCommand;
use crate::firmware::{FirmwareOutcome, FirmwareUpdater};
use crate::fs::roots::StorageRoots;
use crate::install::{InstallResult, Installer};
use crate::power::PowerControl;
use crate::recovery::finisher::RecoveryFinisher;
use crate::ui::{Background, MenuCommand, ParkAction, RecoveryUi};

/// Outcome of the requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStatus {
    Pending,
    Success,
    Error,
}

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Start,
    ArgsResolved,
    Executing(MaintenanceAction),
    Completed(RecoveryStatus),
    ParkForUser,
    FirmwareCheck,
    Finishing,
    Reboot,
    Halt,
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reboot at the end; off for diagnostic runs.
    pub reboot: bool,
    /// Command file read when no other source has arguments.
    pub command_file: String,
    /// Helper commands offered while parked.
    pub menu: Vec<MenuCommand>,
    /// Runner for helper commands.
    pub runner: ExternalCommand,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reboot: true,
            command_file: COMMAND_FILE.into(),
            menu: Vec::new(),
            runner: ExternalCommand::default(),
        }
    }
}

/// External collaborators used by a session.
pub struct Collaborators {
    pub roots: Box<dyn StorageRoots>,
    pub installer: Box<dyn Installer>,
    pub firmware: Box<dyn FirmwareUpdater>,
    pub ui: Box<dyn RecoveryUi>,
    pub power: Box<dyn PowerControl>,
}

/// Summary returned by [`RecoverySession::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub status: RecoveryStatus,
    pub options: RecoveryOptions,
    /// The finisher ran and the control block is disarmed.
    pub finished: bool,
    /// A reboot was requested.
    pub rebooted: bool,
}

enum ParkFlow {
    Stay,
    Leave,
}

/// Orchestrates a single recovery run.
pub struct RecoverySession {
    config: SessionConfig,
    channel: ControlBlockChannel,
    finisher: RecoveryFinisher,
    parts: Collaborators,
    state: SessionState,
    status: RecoveryStatus,
}

impl RecoverySession {
    pub fn new(
        config: SessionConfig,
        channel: ControlBlockChannel,
        finisher: RecoveryFinisher,
        parts: Collaborators,
    ) -> Self {
        Self {
            config,
            channel,
            finisher,
            parts,
            state: SessionState::Start,
            status: RecoveryStatus::Pending,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> RecoveryStatus {
        self.status
    }

    pub fn finisher(&self) -> &RecoveryFinisher {
        &self.finisher
    }

    /// Run the session for the process arguments `argv`.
    ///
    /// Errors are fatal I/O failures on the control block; action
    /// failures are reported through [`SessionOutcome::status`].
    pub fn run<I, S>(&mut self, argv: I) -> RecoveryResult<SessionOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.state = SessionState::Start;
        let list = ArgumentResolver::new(&self.channel, self.parts.roots.as_ref())
            .with_command_file(self.config.command_file.clone())
            .resolve(argv)?;
        self.state = SessionState::ArgsResolved;

        let quoted: Vec<String> = list.to_argv().iter().map(|a| format!("{a:?}")).collect();
        info!("Command: {}", quoted.join(" "));
        let options = RecoveryOptions::parse(&list);

        let action = options.action();
        self.state = SessionState::Executing(action.clone());
        let status = self.execute(&action);
        self.status = status;
        self.state = SessionState::Completed(status);

        if status != RecoveryStatus::Success {
            self.parts.ui.set_background(Background::Error);
        }
        if status != RecoveryStatus::Success || self.parts.ui.text_visible() {
            self.park();
        }

        self.state = SessionState::FirmwareCheck;
        let intent = options.send_intent.clone();
        let firmware = self.parts.firmware.maybe_install(
            intent.as_deref(),
            &self.channel,
            self.parts.roots.as_ref(),
            self.parts.ui.as_mut(),
        );
        match firmware {
            Ok(FirmwareOutcome::RestartScheduled) => {
                info!("Firmware update scheduled; leaving control block armed");
                self.parts.power.sync();
                let rebooted = self.reboot()?;
                return Ok(SessionOutcome {
                    status,
                    options,
                    finished: false,
                    rebooted,
                });
            }
            Ok(FirmwareOutcome::NothingPending) => {}
            // The block may now name a firmware command; finishing would
            // clear it without knowing what the bootloader will see.
            Err(e) if e.is_control_block() => return Err(e),
            Err(e) => error!("Firmware update failed: {e}"),
        }

        self.state = SessionState::Finishing;
        self.finisher.finish(
            intent.as_deref(),
            &self.channel,
            self.parts.roots.as_ref(),
            self.parts.power.as_ref(),
        )?;
        self.parts.power.sync();
        let rebooted = self.reboot()?;
        Ok(SessionOutcome {
            status,
            options,
            finished: true,
            rebooted,
        })
    }

    fn reboot(&mut self) -> RecoveryResult<bool> {
        if !self.config.reboot {
            self.state = SessionState::Halt;
            return Ok(false);
        }
        self.state = SessionState::Reboot;
        self.parts.ui.print("Rebooting...\n");
        self.parts.power.reboot()?;
        Ok(true)
    }

    fn execute(&mut self, action: &MaintenanceAction) -> RecoveryStatus {
        match action {
            MaintenanceAction::Install { package } => {
                let result = self.parts.installer.install(
                    package,
                    self.parts.roots.as_ref(),
                    self.parts.ui.as_mut(),
                );
                if result == InstallResult::Success {
                    RecoveryStatus::Success
                } else {
                    self.parts.ui.print("Installation aborted.\n");
                    RecoveryStatus::Error
                }
            }
            MaintenanceAction::WipeDataAndCache | MaintenanceAction::WipeCache => {
                if self.wipe(action) {
                    RecoveryStatus::Success
                } else {
                    self.parts.ui.print("Data wipe failed.\n");
                    RecoveryStatus::Error
                }
            }
            MaintenanceAction::NoCommand => {
                warn!("No command specified");
                RecoveryStatus::Error
            }
        }
    }

    /// Erase data (when asked) and then cache. A failed erase does not
    /// stop the next one.
    fn wipe(&mut self, action: &MaintenanceAction) -> bool {
        let mut ok = true;
        if *action == MaintenanceAction::WipeDataAndCache {
            ok &= self.erase_root("DATA:");
        }
        ok &= self.erase_root("CACHE:");
        ok
    }

    fn erase_root(&mut self, root: &str) -> bool {
        let ui = self.parts.ui.as_mut();
        ui.set_background(Background::Installing);
        ui.show_indeterminate_progress();
        ui.print(&format!("Formatting {root}...\n"));
        match self.parts.roots.format(root) {
            Ok(()) => true,
            Err(e) => {
                error!("Can't format {root}: {e}");
                false
            }
        }
    }

    fn park(&mut self) {
        self.state = SessionState::ParkForUser;
        loop {
            self.finisher.flush_log(self.parts.roots.as_ref());
            self.parts.ui.reset_progress();
            let choice = self.parts.ui.prompt(&self.config.menu);
            let flow = match choice {
                ParkAction::Reboot => ParkFlow::Leave,
                ParkAction::Install { package } => self.park_install(&package),
                ParkAction::Wipe(action) => self.park_wipe(&action),
                ParkAction::Run(command) => self.park_run(&command),
            };
            if let ParkFlow::Leave = flow {
                return;
            }
        }
    }

    fn park_install(&mut self, package: &str) -> ParkFlow {
        self.parts.ui.print(&format!("\nInstall from {package}...\n"));
        let result =
            self.parts
                .installer
                .install(package, self.parts.roots.as_ref(), self.parts.ui.as_mut());
        if result != InstallResult::Success {
            self.parts.ui.set_background(Background::Error);
            self.parts.ui.print("\nInstallation aborted.\n");
            return ParkFlow::Stay;
        }
        if !self.parts.ui.text_visible() {
            return ParkFlow::Leave;
        }
        if self.parts.firmware.pending() {
            self.parts
                .ui
                .print("\nReboot via menu to complete installation.\n");
        } else {
            self.parts.ui.print("\nInstall complete.\n");
        }
        ParkFlow::Stay
    }

    fn park_wipe(&mut self, action: &MaintenanceAction) -> ParkFlow {
        if !matches!(
            action,
            MaintenanceAction::WipeDataAndCache | MaintenanceAction::WipeCache
        ) {
            warn!("Ignoring non-wipe action {action:?} from menu");
            return ParkFlow::Stay;
        }
        if self.wipe(action) {
            self.parts.ui.print("\nData wipe complete.\n\n");
        } else {
            self.parts.ui.print("\nData wipe failed.\n\n");
        }
        if self.parts.ui.text_visible() {
            ParkFlow::Stay
        } else {
            ParkFlow::Leave
        }
    }

    fn park_run(&mut self, command: &MenuCommand) -> ParkFlow {
        let ui = self.parts.ui.as_mut();
        ui.print(&format!("\n{} : ", command.label));
        let result = self.config.runner.run_checked(&command.command, || ui.print("."));
        ui.print("\n");
        match result {
            Ok(()) => ui.print(&format!("\n{} complete!\n\n", command.label)),
            Err(e) => {
                error!("{e}");
                ui.print(&format!("\nError : run '{}' via adb!\n\n", command.command));
            }
        }
        ParkFlow::Stay
    }
}
