//! Shared HTTP plumbing
//!
//! Application state, session cookie handling, the authentication
//! middleware and extractors, and the page-level error type.

use crate::models::User;
use crate::services::{ForumError, ForumService, UserService};
use crate::templates::TemplateEngine;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tera::Context as TeraContext;

/// Name of the login session cookie
pub const SESSION_COOKIE: &str = "session";

/// Name of the anonymous viewer cookie used for view counting
pub const VIEWER_COOKIE: &str = "viewer";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub forum: Arc<ForumService>,
    pub templates: Arc<TemplateEngine>,
    /// Session cookie lifetime in days, mirrors the server-side expiry
    pub session_days: i64,
}

/// Authenticated user attached to the request by [`load_user`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Optional authenticated user, present on every request
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Rejection that sends anonymous visitors to the login page,
/// remembering where they were headed
pub struct LoginRedirect(String);

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let target = format!("/login?next={}", urlencoding::encode(&self.0));
        Redirect::to(&target).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(user) => Ok(user.clone()),
            None => {
                // Keep the query string so the user lands back on the
                // exact page they asked for
                let target = match parts.uri.query() {
                    Some(query) => format!("{}?{}", parts.uri.path(), query),
                    None => parts.uri.path().to_string(),
                };
                Err(LoginRedirect(target))
            }
        }
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|u| u.0.clone());
        Ok(MaybeUser(user))
    }
}

/// Resolve the session cookie to a user and attach it to the request.
///
/// Anonymous requests pass through untouched; handlers decide whether
/// a user is required.
pub async fn load_user(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = cookie_value(request.headers(), SESSION_COOKIE) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Session validation failed: {}", e);
            }
        }
    }
    next.run(request).await
}

/// Read a cookie value from the request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Build the Set-Cookie value for a new login session
pub fn session_cookie(token: &str, days: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        days * 24 * 60 * 60
    )
}

/// Build the Set-Cookie value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Build the Set-Cookie value for the anonymous viewer token
pub fn viewer_cookie(token: &str) -> String {
    // One year, same order of magnitude as a browser profile
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=31536000",
        VIEWER_COOKIE, token
    )
}

/// Error shown to the user as an HTML page
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ForumError> for PageError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::NotFound(_) => PageError::NotFound,
            ForumError::NotAuthor => PageError::Forbidden,
            ForumError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PageError::NotFound => (StatusCode::NOT_FOUND, "Page not found".to_string()),
            PageError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You don't have permission to do that".to_string(),
            ),
            PageError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
        };

        // Plain markup keeps error pages independent of the template engine
        let body = format!(
            "<!DOCTYPE html><html><head><title>{status}</title></head>\
             <body><h1>{status}</h1><p>{message}</p>\
             <p><a href=\"/\">Back to the boards</a></p></body></html>",
            status = status.as_u16(),
        );
        (status, Html(body)).into_response()
    }
}

/// Base template context with the current user, if any
pub fn page_context(user: &Option<User>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("user", user);
    context
}

/// Insert a page of items plus pagination variables into the context
pub fn insert_page<T: serde::Serialize>(
    context: &mut TeraContext,
    key: &str,
    result: &crate::models::PagedResult<T>,
) {
    context.insert(key, &result.items);
    context.insert("page", &result.page);
    context.insert("total_pages", &result.total_pages());
    context.insert("has_prev", &result.has_prev());
    context.insert("has_next", &result.has_next());
}

/// Render a template through the shared engine
pub fn render(
    state: &AppState,
    template: &str,
    context: &TeraContext,
) -> Result<Html<String>, PageError> {
    let html = state.templates.render(template, context)?;
    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_cookie_value_single() {
        let headers = headers_with_cookie("session=abc123");
        assert_eq!(cookie_value(&headers, "session"), Some("abc123".to_string()));
    }

    #[test]
    fn test_cookie_value_among_others() {
        let headers = headers_with_cookie("theme=dark; session=abc123; viewer=v-1");
        assert_eq!(cookie_value(&headers, "session"), Some("abc123".to_string()));
        assert_eq!(cookie_value(&headers, "viewer"), Some("v-1".to_string()));
    }

    #[test]
    fn test_cookie_value_prefix_name_no_match() {
        // "session" must not match the "session_old" cookie
        let headers = headers_with_cookie("session_old=stale");
        assert_eq!(cookie_value(&headers, "session"), None);
    }

    #[test]
    fn test_cookie_value_missing() {
        let headers = HeaderMap::new();
        assert_eq!(cookie_value(&headers, "session"), None);
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("tok", 14);
        assert!(cookie.starts_with("session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1209600"));
    }

    #[test]
    fn test_clear_session_cookie_expires_immediately() {
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
