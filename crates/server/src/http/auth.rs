use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use deployment::Deployment;
use services::services::error::ServiceError;

use crate::{DeploymentImpl, error::ApiError};

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn peer(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn reject(req: &Request, reason: &'static str, message: &str) -> Response {
    tracing::warn!(
        path = %req.uri().path(),
        method = %req.method(),
        peer = %peer(req),
        reason,
        "Unauthorized API request"
    );
    ApiError::Unauthorized(message.to_string()).into_response()
}

/// Resolves the bearer token to an [`Actor`](services::services::authz::Actor)
/// and stores it as a request extension. The role is re-read on every request
/// so role changes apply to existing tokens immediately.
pub async fn require_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(header_value) = req.headers().get(header::AUTHORIZATION) else {
        return reject(&req, "missing_header", "Missing Authorization header");
    };
    let Some(token) = header_value
        .to_str()
        .ok()
        .and_then(parse_authorization_bearer)
        .map(str::to_string)
    else {
        return reject(&req, "malformed_header", "Invalid auth header");
    };

    match deployment
        .auth()
        .resolve_actor(&deployment.db().pool, &token)
        .await
    {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(ServiceError::Unauthorized(message)) => reject(&req, "invalid_token", &message),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_authorization_bearer;

    #[test]
    fn bearer_prefix_is_case_insensitive() {
        assert_eq!(parse_authorization_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_authorization_bearer("bearer  abc "), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(parse_authorization_bearer("Basic abc"), None);
        assert_eq!(parse_authorization_bearer("Bearer "), None);
        assert_eq!(parse_authorization_bearer("abc"), None);
    }
}
