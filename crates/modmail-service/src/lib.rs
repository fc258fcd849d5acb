//! # modmail-service
//!
//! Application layer: the thread registry and the staff command surface
//! built on top of it, audit sinks, startup reconciliation, and DTOs.

pub mod dto;
pub mod services;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use services::{
    CommandParseError, Delivery, EventService, FanoutAuditSink, LogChannelAuditSink,
    ReconcileReport, RegistrySettings, ServiceContext, ServiceContextBuilder, ServiceError,
    ServiceResult, StaffCommand, ThreadRegistry, ThreadService, TracingAuditSink,
};
