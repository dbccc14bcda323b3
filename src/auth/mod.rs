//! Authentication module
//!
//! Supports: API token (email/token basic auth), Basic, Bearer

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::AuthConfig;
