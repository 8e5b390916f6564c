//! Identity middleware.
//!
//! Authentication happens upstream; the identity collaborator forwards
//! the resolved caller as `X-Actor-Id` / `X-Actor-Role`. This layer only
//! parses those headers and injects the `Actor` into request extensions.

use std::str::FromStr;

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::authorization::Actor;
use crate::models::enums::Role;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = header(headers, ACTOR_ID_HEADER)
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(ApiError::Unauthorized)?;
    let role = header(headers, ACTOR_ROLE_HEADER)
        .and_then(|v| Role::from_str(&v.to_ascii_lowercase()).ok())
        .ok_or(ApiError::Unauthorized)?;
    Ok(Actor::new(id, role))
}

/// Reject requests without a resolved identity.
pub async fn require_actor(mut req: Request<axum::body::Body>, next: Next) -> Response {
    match actor_from_headers(req.headers()) {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(path = %req.uri().path(), "Request without actor identity");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(id: &str, role: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(ACTOR_ID_HEADER, HeaderValue::from_str(id).unwrap());
        h.insert(ACTOR_ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        h
    }

    #[test]
    fn parses_id_and_role() {
        let actor = actor_from_headers(&headers("3", "Operator")).unwrap();
        assert_eq!(actor, Actor::operator(3));
    }

    #[test]
    fn missing_or_garbled_identity_is_unauthorized() {
        assert!(matches!(actor_from_headers(&HeaderMap::new()), Err(ApiError::Unauthorized)));
        assert!(
            matches!(actor_from_headers(&headers("abc", "operator")), Err(ApiError::Unauthorized))
        );
        assert!(
            matches!(actor_from_headers(&headers("3", "gardener")), Err(ApiError::Unauthorized))
        );
    }
}
