//! Ports implemented by the infrastructure crates

mod audit;
mod repositories;
mod transport;

pub use audit::AuditSink;
pub use repositories::{RepoResult, ThreadRepository};
pub use transport::{Transport, TransportResult};
