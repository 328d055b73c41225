// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Recovery run orchestration and completion.

pub mod finisher;
pub mod session;

pub use finisher::{FinisherPaths, RecoveryFinisher};
pub use session::{
    Collaborators, RecoverySession, RecoveryStatus, SessionConfig, SessionOutcome, SessionState,
};
