// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v2.0
// Date Modified: 2026-10-16
// Author: Lukas Bower

//! Restart-safe recovery agent and raw partition image writer.

/// Error type shared by every module
pub mod error;

/// YAML device configuration
pub mod config;

/// Boot control block, argument resolution and option parsing
pub mod bootloader;

/// Logical storage roots (`CACHE:`, `DATA:`, ...)
pub mod fs;

/// Blocking external command runner
pub mod exec;

/// Sync and reboot
pub mod power;

/// Display and park menu boundary
pub mod ui;

/// Update package installer
pub mod install;

/// Companion firmware staging
pub mod firmware;

/// Safe raw partition image writer
pub mod flash;

/// Session state machine and finisher
pub mod recovery;

pub use error::{RecoveryError, RecoveryResult};
