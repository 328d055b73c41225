// CLASSIFICATION: COMMUNITY
// Filename: args.rs v0.4
// Date Modified: 2026-10-16
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// Cohesix · Recovery Argument Resolver
//
// Arguments come from, in decreasing precedence:
//
//   1. the process command line
//   2. the boot control block (one per line, after "recovery")
//   3. the command file on the cache root (one per line)
//
// Whatever wins is written straight back into the control block
// so that a reboot at any later point re-enters recovery with the
// same request.
//
// # Public API
// * [`ArgumentList`] – bounded program + argument list
// * [`ArgumentResolver`] – precedence chain + re-persist
// ─────────────────────────────────────────────────────────────

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use log::{info, warn};

use super::channel::ControlBlockChannel;
use super::message::{ControlBlock, BOOT_RECOVERY, RECOVERY_MAGIC};
use crate::error::RecoveryResult;
use crate::fs::roots::StorageRoots;

/// Maximum number of entries, program name included.
pub const MAX_ARGS: usize = 100;
/// Maximum length of a single argument in bytes.
pub const MAX_ARG_LENGTH: usize = 4096;
/// Default location of the command file.
pub const COMMAND_FILE: &str = "CACHE:recovery/command";

/// Process arguments as text; bytes that aren't UTF-8 become U+FFFD.
pub fn lossy_argv<I: IntoIterator<Item = OsString>>(argv: I) -> Vec<String> {
    argv.into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

/// Program name plus a bounded list of arguments.
///
/// Items past [`MAX_ARGS`] are dropped and items longer than
/// [`MAX_ARG_LENGTH`] are cut; neither is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentList {
    program: String,
    args: Vec<String>,
}

impl ArgumentList {
    /// List holding only `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from a process argv (first item is the program name).
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut iter = argv.into_iter();
        let program = iter
            .next()
            .map(|p| p.as_ref().to_string())
            .unwrap_or_else(|| "recovery".to_string());
        let mut list = Self::new(program);
        for arg in iter {
            if !list.push(arg.as_ref()) {
                break;
            }
        }
        list
    }

    /// Append `arg`, truncated to [`MAX_ARG_LENGTH`]. Returns `false`
    /// once the list is full.
    pub fn push(&mut self, arg: &str) -> bool {
        if self.args.len() + 1 >= MAX_ARGS {
            return false;
        }
        self.args.push(cap_length(arg).to_string());
        true
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// True when no argument besides the program name is present.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Program name followed by the arguments.
    pub fn to_argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

fn cap_length(arg: &str) -> &str {
    if arg.len() <= MAX_ARG_LENGTH {
        return arg;
    }
    let mut end = MAX_ARG_LENGTH;
    while !arg.is_char_boundary(end) {
        end -= 1;
    }
    &arg[..end]
}

/// Resolves the effective argument list and re-arms the control block.
pub struct ArgumentResolver<'a> {
    channel: &'a ControlBlockChannel,
    roots: &'a dyn StorageRoots,
    command_file: String,
}

impl<'a> ArgumentResolver<'a> {
    /// Resolver reading the default [`COMMAND_FILE`].
    pub fn new(channel: &'a ControlBlockChannel, roots: &'a dyn StorageRoots) -> Self {
        Self {
            channel,
            roots,
            command_file: COMMAND_FILE.to_string(),
        }
    }

    /// Read the command file from `root_path` instead.
    pub fn with_command_file(mut self, root_path: impl Into<String>) -> Self {
        self.command_file = root_path.into();
        self
    }

    /// Work out the argument list and write it back to the control block.
    ///
    /// Only the write-back can fail, and that failure is fatal.
    pub fn resolve<I, S>(&self, argv: I) -> RecoveryResult<ArgumentList>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = ArgumentList::from_argv(argv);
        let boot = self.channel.get();

        if list.is_empty() {
            self.fill_from_control_block(&mut list, &boot);
        }
        if list.is_empty() {
            self.fill_from_command_file(&mut list);
        }

        let mut armed = ControlBlock::for_recovery(list.args());
        armed.status = boot.status;
        debug_assert_eq!(armed.command, BOOT_RECOVERY);
        self.channel.set(&armed)?;
        Ok(list)
    }

    fn fill_from_control_block(&self, list: &mut ArgumentList, boot: &ControlBlock) {
        let mut lines = boot.recovery.split('\n').filter(|l| !l.is_empty());
        match lines.next() {
            Some(RECOVERY_MAGIC) => {
                for arg in lines {
                    if !list.push(arg) {
                        break;
                    }
                }
                info!("Got arguments from boot message");
            }
            Some(_) => {
                let head: String = boot.recovery.chars().take(20).collect();
                warn!("Bad boot message \"{head}\"");
            }
            None => {}
        }
    }

    fn fill_from_command_file(&self, list: &mut ArgumentList) {
        let path = match self.roots.prepare(&self.command_file, false) {
            Ok(path) => path,
            Err(e) => {
                warn!("Can't mount {}: {e}", self.command_file);
                return;
            }
        };
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("Can't open {}: {e}", self.command_file);
                return;
            }
        };
        // Split on raw bytes so one bad UTF-8 line doesn't hide the rest.
        for line in BufReader::new(file).split(b'\n') {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Error in {}: {e}", self.command_file);
                    break;
                }
            };
            let line = String::from_utf8_lossy(&line);
            let arg = line.trim_end_matches(['\r', '\n']);
            if arg.is_empty() {
                continue;
            }
            if !list.push(arg) {
                break;
            }
        }
        info!("Got arguments from {}", self.command_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_keeps_program_and_order() {
        let list = ArgumentList::from_argv(["recovery", "--wipe_data", "--send_intent=x"]);
        assert_eq!(list.program(), "recovery");
        assert_eq!(list.args(), ["--wipe_data", "--send_intent=x"]);
        assert_eq!(list.to_argv().len(), 3);
    }

    #[test]
    fn non_utf8_argv_is_kept_lossily() {
        use std::os::unix::ffi::OsStringExt;

        let argv = lossy_argv([
            OsString::from("recovery"),
            OsString::from_vec(b"--send_intent=\xff".to_vec()),
            OsString::from("--wipe_cache"),
        ]);
        assert_eq!(argv, ["recovery", "--send_intent=\u{fffd}", "--wipe_cache"]);
    }

    #[test]
    fn empty_argv_gets_default_program() {
        let list = ArgumentList::from_argv(Vec::<String>::new());
        assert_eq!(list.program(), "recovery");
        assert!(list.is_empty());
    }

    #[test]
    fn caps_count_and_length() {
        let mut argv = vec!["recovery".to_string()];
        argv.extend((0..150).map(|i| format!("--arg{i}")));
        argv[1] = "x".repeat(MAX_ARG_LENGTH + 10);
        let list = ArgumentList::from_argv(&argv);
        assert_eq!(list.to_argv().len(), MAX_ARGS);
        assert_eq!(list.args()[0].len(), MAX_ARG_LENGTH);
        assert_eq!(list.args()[1], "--arg1");
    }

    #[test]
    fn cap_length_stays_on_char_boundary() {
        let long = "é".repeat(MAX_ARG_LENGTH);
        let capped = cap_length(&long);
        assert!(capped.len() <= MAX_ARG_LENGTH);
        assert!(capped.chars().all(|c| c == 'é'));
    }
}
