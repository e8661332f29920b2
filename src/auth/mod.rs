//! Authentication and authorization plane.
//!
//! [`token`] owns the token lifecycle (issue, decode, verify, revoke);
//! [`abac`] owns policy decisions. The two are deliberately separate — the
//! policy engine never inspects tokens, and the token authority never makes
//! access decisions.

pub mod abac;
pub mod token;

pub use abac::PolicyEngine;
pub use token::{
    pseudonymize_email, resolve_signing_secret, AuthError, SigningSecret, TokenAuthority,
};
