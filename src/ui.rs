// CLASSIFICATION: COMMUNITY
// Filename: ui.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Display boundary of the recovery agent.
//!
//! The session only talks to [`RecoveryUi`]. [`ConsoleUi`] is a plain
//! line-based implementation for serial consoles and tests.

use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};

use log::{info, warn};
use serde::Deserialize;

use crate::bootloader::options::MaintenanceAction;

/// Background icon shown behind the log text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    None,
    Installing,
    Error,
}

/// External helper offered in the park menu.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MenuCommand {
    /// Text shown in the menu.
    pub label: String,
    /// Shell line executed when chosen.
    pub command: String,
}

/// What the user asked for while the session was parked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParkAction {
    /// Leave the menu and continue towards reboot.
    Reboot,
    /// Install a package from `ROOT:path`.
    Install { package: String },
    /// Run one of the wipe actions.
    Wipe(MaintenanceAction),
    /// Run a configured helper command.
    Run(MenuCommand),
}

/// Screen, progress and menu operations used by the session.
pub trait RecoveryUi {
    /// Append text to the on-screen log.
    fn print(&mut self, text: &str);
    /// Switch the background icon.
    fn set_background(&mut self, background: Background);
    /// Show a spinner with no known completion.
    fn show_indeterminate_progress(&mut self);
    /// Hide any progress indicator.
    fn reset_progress(&mut self);
    /// True when the log text is meant to stay on screen.
    fn text_visible(&self) -> bool;
    /// Block until the user picks something from the park menu.
    fn prompt(&mut self, commands: &[MenuCommand]) -> ParkAction;
}

const FIXED_ITEMS: [&str; 4] = [
    "Reboot system now",
    "Wipe data/factory reset",
    "Wipe cache",
    "Install package <ROOT:path>",
];

/// Line-based [`RecoveryUi`] over any reader/writer pair.
pub struct ConsoleUi<R, W> {
    input: R,
    output: W,
    text_visible: bool,
    background: Background,
}

impl ConsoleUi<BufReader<Stdin>, Stderr> {
    /// Console on stdin/stderr.
    pub fn stdio(text_visible: bool) -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr(), text_visible)
    }
}

impl<R: BufRead, W: Write> ConsoleUi<R, W> {
    /// Console reading choices from `input` and printing to `output`.
    pub fn new(input: R, output: W, text_visible: bool) -> Self {
        Self {
            input,
            output,
            text_visible,
            background: Background::None,
        }
    }

    /// Current background icon.
    pub fn background(&self) -> Background {
        self.background
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    fn show_menu(&mut self, commands: &[MenuCommand]) {
        let _ = writeln!(self.output, "\nRecovery menu:");
        let labels = FIXED_ITEMS
            .iter()
            .copied()
            .chain(commands.iter().map(|c| c.label.as_str()));
        for (i, label) in labels.enumerate() {
            let _ = writeln!(self.output, "  {i}) {label}");
        }
        let _ = self.output.flush();
    }

    fn choose(&self, line: &str, commands: &[MenuCommand]) -> Option<ParkAction> {
        let mut words = line.split_whitespace();
        let index: usize = words.next()?.parse().ok()?;
        match index {
            0 => Some(ParkAction::Reboot),
            1 => Some(ParkAction::Wipe(MaintenanceAction::WipeDataAndCache)),
            2 => Some(ParkAction::Wipe(MaintenanceAction::WipeCache)),
            3 => words.next().map(|package| ParkAction::Install {
                package: package.to_string(),
            }),
            n => commands
                .get(n - FIXED_ITEMS.len())
                .cloned()
                .map(ParkAction::Run),
        }
    }
}

impl<R: BufRead, W: Write> RecoveryUi for ConsoleUi<R, W> {
    fn print(&mut self, text: &str) {
        let _ = write!(self.output, "{text}");
        let _ = self.output.flush();
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed != "." {
            info!("{trimmed}");
        }
    }

    fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    fn show_indeterminate_progress(&mut self) {}

    fn reset_progress(&mut self) {}

    fn text_visible(&self) -> bool {
        self.text_visible
    }

    fn prompt(&mut self, commands: &[MenuCommand]) -> ParkAction {
        loop {
            self.show_menu(commands);
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => return ParkAction::Reboot,
                Ok(_) => {}
                Err(e) => {
                    warn!("Can't read menu choice: {e}");
                    return ParkAction::Reboot;
                }
            }
            match self.choose(&line, commands) {
                Some(action) => return action,
                None => {
                    let _ = writeln!(self.output, "Invalid choice {:?}", line.trim());
                }
            }
        }
    }
}
