//! # Auth Module
//!
//! This module handles all authentication functionality including:
//! - Local email/password login and registration (bcrypt)
//! - Federated Google identity login
//! - Opaque session-token minting and validation
//! - Account-identity resolution across the two credential sources
//! - SessionIdentity extractor for session-backed requests

pub mod extractors;
pub mod google;
pub mod handlers;
pub mod models;
pub mod password;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod store;
pub mod validators;

#[cfg(test)]
mod tests;

pub use models::User;
pub use resolver::SessionIdentity;
pub use routes::auth_routes;
