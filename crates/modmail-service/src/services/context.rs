//! Service context - dependency container for services
//!
//! Holds the thread registry together with the store it writes through to.

use std::sync::Arc;

use modmail_core::traits::{AuditSink, ThreadRepository, Transport};
use modmail_core::SnowflakeGenerator;

use super::audit::TracingAuditSink;
use super::error::{ServiceError, ServiceResult};
use super::registry::{RegistrySettings, ThreadRegistry};

/// Prefix used for staff commands when none is configured
pub const DEFAULT_PREFIX: &str = "?";

/// Service context containing all dependencies
///
/// This is the main dependency container that gets passed to all services.
/// It provides access to:
/// - The thread registry (and through it the transport and audit sinks)
/// - The thread repository, for health checks
/// - The staff command prefix
#[derive(Clone)]
pub struct ServiceContext {
    registry: Arc<ThreadRegistry>,
    repo: Arc<dyn ThreadRepository>,
    prefix: Arc<str>,
}

impl ServiceContext {
    /// Create a new service context around an existing registry
    pub fn new(
        registry: Arc<ThreadRegistry>,
        repo: Arc<dyn ThreadRepository>,
        prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            registry,
            repo,
            prefix: prefix.into(),
        }
    }

    /// Get the thread registry
    pub fn registry(&self) -> &ThreadRegistry {
        self.registry.as_ref()
    }

    /// Shared handle to the registry, for spawned tasks
    pub fn registry_handle(&self) -> Arc<ThreadRegistry> {
        Arc::clone(&self.registry)
    }

    /// Get the thread repository
    pub fn repo(&self) -> &dyn ThreadRepository {
        self.repo.as_ref()
    }

    /// Staff command prefix, e.g. `?`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("registry", &self.registry)
            .field("repo", &"dyn ThreadRepository")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Builder for creating ServiceContext with custom configuration
pub struct ServiceContextBuilder {
    settings: Option<RegistrySettings>,
    repo: Option<Arc<dyn ThreadRepository>>,
    transport: Option<Arc<dyn Transport>>,
    audit: Option<Arc<dyn AuditSink>>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
    prefix: Option<String>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            settings: None,
            repo: None,
            transport: None,
            audit: None,
            snowflake_generator: None,
            prefix: None,
        }
    }

    pub fn settings(mut self, settings: RegistrySettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn repository(mut self, repo: Arc<dyn ThreadRepository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Audit sink; defaults to [`TracingAuditSink`]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Thread id generator; defaults to worker 0
    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        let settings = self
            .settings
            .ok_or_else(|| ServiceError::validation("settings are required"))?;
        let repo = self
            .repo
            .ok_or_else(|| ServiceError::validation("repository is required"))?;
        let transport = self
            .transport
            .ok_or_else(|| ServiceError::validation("transport is required"))?;
        let audit = self
            .audit
            .unwrap_or_else(|| Arc::new(TracingAuditSink));
        let ids = self
            .snowflake_generator
            .unwrap_or_else(|| Arc::new(SnowflakeGenerator::default()));
        let prefix = self
            .prefix
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let registry = ThreadRegistry::new(settings, Arc::clone(&repo), transport, audit, ids);
        Ok(ServiceContext::new(Arc::new(registry), repo, prefix))
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
