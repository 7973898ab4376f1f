//! `stockroom-auth`: authentication boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns a
//! bearer token into a validated caller identity + role, nothing more.

pub mod claims;
pub mod roles;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use roles::Role;
pub use validator::{Hs256JwtValidator, JwtValidator};
