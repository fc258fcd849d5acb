//! Axum extractors for request handling
//!
//! Custom extractors for ingress authentication, validation, and ids in paths.

mod auth;
mod path;
mod validated;

pub use auth::IngressAuth;
pub use path::{ChannelIdPath, UserIdPath};
pub use validated::ValidatedJson;
