//! Authentication gate applied to every route except the public ones.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Extensions, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::AppState;

use super::cookies::{append_set_cookies, cookie_value, removal_cookies, TOKEN_COOKIE};
use super::types::Claims;

/// Paths admitted without a credential. Exact match only.
pub const PUBLIC_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/register"];

/// Rejections on this path always clear the session cookies.
pub const LOGOUT_PATH: &str = "/api/auth/logout";

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    Bearer,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Credential {
    Found {
        token: String,
        source: CredentialSource,
    },
    /// No cookie and no `Authorization` header at all.
    MissingCookie,
    /// An `Authorization` header was sent but carried no usable bearer token.
    MalformedBearer,
}

/// Pick the request's credential. The `token` cookie wins over the header.
pub fn extract_credential(headers: &HeaderMap) -> Credential {
    if let Some(token) = cookie_value(headers, TOKEN_COOKIE) {
        return Credential::Found {
            token,
            source: CredentialSource::Cookie,
        };
    }

    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Credential::MissingCookie;
    };

    value
        .to_str()
        .ok()
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map_or(Credential::MalformedBearer, |token| Credential::Found {
            token: token.to_string(),
            source: CredentialSource::Bearer,
        })
}

/// Middleware that requires a verified session token.
///
/// Used with `axum::middleware::from_fn_with_state`. On success the
/// verified [`Claims`] are inserted into the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let path = request.uri().path();
    let is_logout = path == LOGOUT_PATH;

    let (token, source) = match extract_credential(request.headers()) {
        Credential::Found { token, source } => (token, source),
        Credential::MissingCookie => {
            tracing::debug!("Rejected {}: no session cookie", path);
            return reject(ApiError::unauthorized("Missing session cookie"), is_logout);
        }
        Credential::MalformedBearer => {
            tracing::debug!("Rejected {}: malformed bearer token", path);
            return reject(
                ApiError::unauthorized("Missing or malformed bearer token"),
                is_logout,
            );
        }
    };

    let claims = match state.tokens.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(
                "Token verification failed for {} ({:?}): {}",
                path,
                source,
                e
            );
            return reject(
                ApiError::from(e),
                is_logout || source == CredentialSource::Cookie,
            );
        }
    };

    request.extensions_mut().insert(claims);
    next.run(request).await
}

fn reject(err: ApiError, clear_cookies: bool) -> Response {
    let mut response = err.into_response();
    if clear_cookies {
        append_set_cookies(response.headers_mut(), removal_cookies());
    }
    response
}

/// Claims attached by [`require_auth`], if any.
pub fn current_claims(extensions: &Extensions) -> Option<&Claims> {
    extensions.get::<Claims>()
}

/// Extractor for handlers that only run behind the gate.
#[derive(Debug, Clone)]
pub struct AuthClaims(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_claims(&parts.extensions)
            .cloned()
            .map(AuthClaims)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}
