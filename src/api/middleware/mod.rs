//! API middleware.
//!
//! Protected routes run behind `identity::require_actor`, which resolves the
//! `Actor` from trusted headers. Tracing and response headers are tower-http
//! layers applied in the router.

pub mod identity;
