// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Date Modified: 2026-10-16
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// Cohesix · Recovery Bootloader Interface
//
// Everything that talks to the boot firmware through the control
// block lives here.
//
// Current sub-modules
// -------------------
// * `message` – fixed 32/32/1024 byte record layout
// * `channel` – best-effort read, fatal write of that record
// * `args`    – argument precedence chain + re-arm
// * `options` – option parsing into a maintenance action
// ─────────────────────────────────────────────────────────────

/// Control block record layout.
pub mod message;

/// Device access for the control block.
pub mod channel;

/// Argument resolution.
///
/// See [`args::ArgumentResolver::resolve`].
pub mod args;

/// Recovery command options.
pub mod options;

pub use args::{lossy_argv, ArgumentList, ArgumentResolver, MAX_ARGS, MAX_ARG_LENGTH};
pub use channel::ControlBlockChannel;
pub use message::ControlBlock;
pub use options::{MaintenanceAction, RecoveryOptions};
