//! Business logic services
//!
//! The thread registry and everything around it: staff commands, audit
//! sinks, startup reconciliation, and the thin service facades used by the
//! API.

pub mod audit;
pub mod commands;
pub mod context;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod registry;
pub mod thread;

// Re-export all services for convenience
pub use audit::{FanoutAuditSink, LogChannelAuditSink, TracingAuditSink};
pub use commands::{CommandParseError, StaffCommand};
pub use context::{ServiceContext, ServiceContextBuilder, DEFAULT_PREFIX};
pub use error::{ServiceError, ServiceResult};
pub use event::EventService;
pub use reconcile::ReconcileReport;
pub use registry::{Delivery, RegistrySettings, ThreadRegistry, MAX_CONTENT_LEN};
pub use thread::ThreadService;
