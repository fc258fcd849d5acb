//! # modmail-api
//!
//! HTTP surface of the modmail server built with Axum: ingress endpoints for
//! events forwarded by the messaging gateway, read-only thread queries, and
//! health probes.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{create_app, create_app_state, run};
pub use state::AppState;
