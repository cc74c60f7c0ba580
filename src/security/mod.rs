//! Security module for shell-relay.
//!
//! - **API Key Authentication**: Bearer token check on the HTTP surface
//! - **Input Validation**: request shape rules applied before any process
//!   interaction
//!
//! ## Example
//!
//! ```rust
//! use shell_relay::security::{ApiKeyStore, CommandValidator};
//!
//! let auth = ApiKeyStore::new(["my-secret-key"]);
//! assert!(auth.authorizes("Bearer my-secret-key"));
//!
//! let validator = CommandValidator::default();
//! assert!(validator.validate_command("echo hello").is_ok());
//! assert!(validator.validate_command("   ").is_err());
//! ```

pub mod auth;
pub mod validation;

pub use auth::{auth_middleware, ApiKeyStore};
pub use validation::{sanitize_for_display, CommandValidator, ValidationConfig, ValidationError};
