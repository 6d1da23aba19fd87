//! devbox-updater - Devbox package updater library
//!
//! This library provides the core functionality of the devbox-updater action:
//! - Version parsing and comparison for Devbox packages
//! - devbox.json scanning against the Devbox registry
//! - Manifest rewriting with lock regeneration and commit
//! - Pull request reconciliation on GitHub
//! - Retry with backoff driven by error classification

pub mod cli;
pub mod domain;
pub mod error;
pub mod forge;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod package_manager;
pub mod pull_request;
pub mod registry;
pub mod retry;
pub mod scanner;
pub mod vcs;
