//! Route handlers
//!
//! All HTTP request handlers organized by domain.

pub mod events;
pub mod health;
pub mod threads;
