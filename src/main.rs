// CLASSIFICATION: COMMUNITY
// Filename: main.rs v2.0
// Date Modified: 2026-10-16
// Author: Lukas Bower

//! Entry point for the recovery agent.

use std::fs::{self, OpenOptions};
use std::path::Path;

use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::{info, warn};

use cohrecovery::bootloader::lossy_argv;
use cohrecovery::config;
use cohrecovery::power::SystemPower;
use cohrecovery::recovery::{Collaborators, RecoveryFinisher, RecoverySession};
use cohrecovery::ui::ConsoleUi;

/// Send the log to the transient log file so the finisher can copy it
/// out; stderr if that file can't be opened.
fn init_logging(temp_log: &Path) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(parent) = temp_log.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(temp_log) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => eprintln!("Can't open {}: {e}", temp_log.display()),
    }
    builder.init();
}

fn run() -> anyhow::Result<()> {
    let cfg = config::load_active();
    init_logging(&cfg.temp_log);
    info!(
        "Starting recovery on {}",
        Local::now().format("%a %b %e %H:%M:%S %Y")
    );

    let parts = Collaborators {
        roots: Box::new(cfg.root_table()),
        installer: Box::new(cfg.installer()),
        firmware: Box::new(cfg.firmware_stager()),
        ui: Box::new(ConsoleUi::stdio(cfg.text_visible)),
        power: Box::new(SystemPower),
    };
    let mut session = RecoverySession::new(
        cfg.session_config(),
        cfg.channel(),
        RecoveryFinisher::new(cfg.finisher_paths()),
        parts,
    );
    let outcome = session.run(lossy_argv(std::env::args_os()))?;
    if !outcome.rebooted {
        warn!("Reboot disabled; halting with status {:?}", outcome.status);
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
