//! HTTP surface of the gateway.
//!
//! Handlers are thin: routing logic lives in [`crate::router`], policy in
//! [`crate::auth`]. Middleware order (outermost first): trace layer,
//! request-id, tenant context.

pub mod auth;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod request_id;
pub mod tenant;
