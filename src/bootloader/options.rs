// CLASSIFICATION: COMMUNITY
// Filename: options.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Recovery command options parsed from a resolved [`ArgumentList`].
//!
//! The option names are shared with the main system and the control
//! block, so they keep their underscore spelling. Unknown options are
//! logged and dropped instead of failing the run.

use clap::{Arg, ArgAction, Command};
use log::warn;

use super::args::ArgumentList;

const SEND_INTENT: &str = "send_intent";
const UPDATE_PACKAGE: &str = "update_package";
const WIPE_DATA: &str = "wipe_data";
const WIPE_CACHE: &str = "wipe_cache";

const VALUED: [&str; 2] = [SEND_INTENT, UPDATE_PACKAGE];
const FLAGS: [&str; 2] = [WIPE_DATA, WIPE_CACHE];

/// Maintenance action requested for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Install the update package at a `ROOT:path` location.
    Install { package: String },
    /// Reformat the cache root only.
    WipeCache,
    /// Reformat the data root, then the cache root.
    WipeDataAndCache,
    /// Nothing was asked for.
    NoCommand,
}

/// Options understood by the recovery agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryOptions {
    /// Text to hand back to the main system after the run.
    pub send_intent: Option<String>,
    /// Package to install, as `ROOT:path`.
    pub update_package: Option<String>,
    /// Erase user data (implies `wipe_cache`).
    pub wipe_data: bool,
    /// Erase the cache root.
    pub wipe_cache: bool,
}

fn build_cli() -> Command {
    Command::new("recovery")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true)
        .arg(Arg::new(SEND_INTENT).long(SEND_INTENT).value_name("STRING").num_args(1).allow_hyphen_values(true))
        .arg(Arg::new(UPDATE_PACKAGE).long(UPDATE_PACKAGE).value_name("ROOT:PATH").num_args(1).allow_hyphen_values(true))
        .arg(Arg::new(WIPE_DATA).long(WIPE_DATA).action(ArgAction::SetTrue))
        .arg(Arg::new(WIPE_CACHE).long(WIPE_CACHE).action(ArgAction::SetTrue))
}

/// Drop everything clap would reject, logging each dropped item.
///
/// Valued options come back as `--name=value`; a separate value is
/// taken from the next item whatever it looks like.
fn known_only(args: &[String]) -> Vec<String> {
    let mut kept = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(body) = arg.strip_prefix("--") else {
            warn!("Invalid command argument {arg:?}");
            continue;
        };
        let (name, value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        if FLAGS.contains(&name) && value.is_none() {
            kept.push(arg.clone());
        } else if VALUED.contains(&name) {
            match value.map(str::to_string).or_else(|| iter.next().cloned()) {
                Some(value) => kept.push(format!("--{name}={value}")),
                None => warn!("Invalid command argument {arg:?}: missing value"),
            }
        } else {
            warn!("Invalid command argument {arg:?}");
        }
    }
    kept
}

impl RecoveryOptions {
    /// Parse the arguments of `list`. Never fails.
    pub fn parse(list: &ArgumentList) -> Self {
        let kept = known_only(list.args());
        let matches = match build_cli().try_get_matches_from(&kept) {
            Ok(m) => m,
            Err(e) => {
                warn!("Invalid command arguments: {e}");
                return Self::from_known(&kept);
            }
        };
        let wipe_data = matches.get_flag(WIPE_DATA);
        Self {
            send_intent: matches.get_one::<String>(SEND_INTENT).cloned(),
            update_package: matches.get_one::<String>(UPDATE_PACKAGE).cloned(),
            wipe_data,
            wipe_cache: wipe_data || matches.get_flag(WIPE_CACHE),
        }
    }

    /// Fold already normalised arguments without clap.
    fn from_known(kept: &[String]) -> Self {
        let mut opts = Self::default();
        for arg in kept {
            let body = arg.trim_start_matches("--");
            match body.split_once('=') {
                Some((SEND_INTENT, value)) => opts.send_intent = Some(value.to_string()),
                Some((UPDATE_PACKAGE, value)) => opts.update_package = Some(value.to_string()),
                None if body == WIPE_DATA => opts.wipe_data = true,
                None if body == WIPE_CACHE => opts.wipe_cache = true,
                _ => {}
            }
        }
        opts.wipe_cache |= opts.wipe_data;
        opts
    }

    /// The single action this run performs.
    pub fn action(&self) -> MaintenanceAction {
        if let Some(package) = &self.update_package {
            MaintenanceAction::Install {
                package: package.clone(),
            }
        } else if self.wipe_data {
            MaintenanceAction::WipeDataAndCache
        } else if self.wipe_cache {
            MaintenanceAction::WipeCache
        } else {
            MaintenanceAction::NoCommand
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RecoveryOptions {
        let mut argv = vec!["recovery"];
        argv.extend_from_slice(args);
        RecoveryOptions::parse(&ArgumentList::from_argv(argv))
    }

    #[test]
    fn wipe_data_implies_cache() {
        let opts = parse(&["--wipe_data"]);
        assert!(opts.wipe_data && opts.wipe_cache);
        assert_eq!(opts.action(), MaintenanceAction::WipeDataAndCache);
    }

    #[test]
    fn values_in_both_spellings() {
        let opts = parse(&["--send_intent=done", "--update_package", "CACHE:ota.zip"]);
        assert_eq!(opts.send_intent.as_deref(), Some("done"));
        assert_eq!(
            opts.action(),
            MaintenanceAction::Install {
                package: "CACHE:ota.zip".into()
            }
        );
    }

    #[test]
    fn package_wins_over_wipe() {
        let opts = parse(&["--wipe_cache", "--update_package=SDCARD:update.zip"]);
        assert!(matches!(opts.action(), MaintenanceAction::Install { .. }));
    }

    #[test]
    fn unknown_options_are_dropped() {
        let opts = parse(&["--previous_runs=3", "stray", "--wipe_cache", "--send_intent"]);
        assert_eq!(
            opts,
            RecoveryOptions {
                wipe_cache: true,
                ..Default::default()
            }
        );
        assert_eq!(opts.action(), MaintenanceAction::WipeCache);
    }

    #[test]
    fn separate_value_may_start_with_a_dash() {
        let opts = parse(&["--send_intent", "-5", "--wipe_data"]);
        assert_eq!(opts.send_intent.as_deref(), Some("-5"));
        assert_eq!(opts.action(), MaintenanceAction::WipeDataAndCache);
        let opts = parse(&["--update_package", "--wipe_cache"]);
        assert_eq!(
            opts.action(),
            MaintenanceAction::Install {
                package: "--wipe_cache".into()
            }
        );
    }

    #[test]
    fn fallback_keeps_validated_options() {
        let kept = known_only(&[
            "--wipe_data".to_string(),
            "--send_intent".to_string(),
            "--x".to_string(),
        ]);
        assert_eq!(kept, ["--wipe_data", "--send_intent=--x"]);
        let opts = RecoveryOptions::from_known(&kept);
        assert!(opts.wipe_data && opts.wipe_cache);
        assert_eq!(opts.send_intent.as_deref(), Some("--x"));
    }

    #[test]
    fn nothing_means_no_command() {
        assert_eq!(parse(&[]).action(), MaintenanceAction::NoCommand);
    }
}
