//! # modmail-db
//!
//! Durable thread storage implementing [`ThreadRepository`](modmail_core::ThreadRepository).
//!
//! ## Overview
//!
//! - Connection pool management and schema setup
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - `PgThreadRepository` (PostgreSQL) and `MemoryThreadRepository`
//!   (process-local, for development and tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modmail_db::{create_pool, run_migrations, DatabaseConfig, PgThreadRepository};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::new("postgres://localhost/modmail")).await?;
//!     run_migrations(&pool).await?;
//!     let repo = PgThreadRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{MemoryThreadRepository, PgThreadRepository};
