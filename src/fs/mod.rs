// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Storage roots.

pub mod roots;

pub use roots::{RootSpec, RootTable, StorageRoots};
