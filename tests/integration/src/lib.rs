//! Integration test utilities for the modmail server
//!
//! This crate provides helpers for running end-to-end tests against
//! the HTTP ingress API, backed by in-memory fakes of Discord.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
