//! Authentication pages: sign-up, login and logout

use crate::api::middleware::{
    clear_session_cookie, cookie_value, page_context, render, session_cookie, AppState, MaybeUser,
    PageError, SESSION_COOKIE,
};
use crate::forms::{LoginForm, RegisterForm, ValidationErrors};
use crate::services::UserServiceError;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use anyhow::Context;
use serde::Deserialize;

/// `?next=` target carried through the login flow
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

/// Only follow same-site relative targets after login
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

/// GET /register - blank sign-up form
pub async fn register_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, PageError> {
    let mut context = page_context(&user);
    context.insert("form", &RegisterForm::default());
    context.insert("errors", &ValidationErrors::new());
    render(&state, "register.html", &context)
}

/// POST /register - create the account and log straight in
pub async fn register(
    State(state): State<AppState>,
    axum::Form(form): axum::Form<RegisterForm>,
) -> Result<Response, PageError> {
    let redisplay = |state: &AppState, form: &RegisterForm, errors: &ValidationErrors| {
        let mut context = page_context(&None);
        context.insert("form", form);
        context.insert("errors", errors);
        render(state, "register.html", &context)
    };

    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(redisplay(&state, &form, &errors)?.into_response()),
    };

    let (user, session) = match state.user_service.register(input).await {
        Ok(created) => created,
        Err(UserServiceError::UsernameTaken) => {
            let mut errors = ValidationErrors::new();
            errors.add("username", "A user with that username already exists");
            return Ok(redisplay(&state, &form, &errors)?.into_response());
        }
        Err(UserServiceError::EmailTaken) => {
            let mut errors = ValidationErrors::new();
            errors.add("email", "A user with that email already exists");
            return Ok(redisplay(&state, &form, &errors)?.into_response());
        }
        Err(e) => return Err(PageError::Internal(anyhow::Error::new(e).context("Registration failed"))),
    };

    tracing::info!("New user registered: {}", user.username);
    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(&session.id, state.session_days),
        )]),
        Redirect::to("/"),
    )
        .into_response())
}

/// GET /login - blank login form, optionally with a `next` target
pub async fn login_form(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, PageError> {
    let mut context = page_context(&user);
    context.insert("form", &LoginForm::default());
    context.insert("errors", &ValidationErrors::new());
    context.insert("next", &query.next);
    render(&state, "login.html", &context)
}

/// POST /login - check credentials and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    axum::Form(form): axum::Form<LoginForm>,
) -> Result<Response, PageError> {
    let redisplay = |state: &AppState, form: &LoginForm, errors: &ValidationErrors| {
        let mut context = page_context(&None);
        context.insert("form", form);
        context.insert("errors", errors);
        context.insert("next", &form.next);
        render(state, "login.html", &context)
    };

    if let Err(errors) = form.validate() {
        return Ok(redisplay(&state, &form, &errors)?.into_response());
    }

    let (user, session) = match state.user_service.login(&form.username, &form.password).await {
        Ok(result) => result,
        Err(UserServiceError::InvalidCredentials) => {
            let mut errors = ValidationErrors::new();
            errors.add(
                "__all__",
                "Please enter a correct username and password. \
                 Note that both fields may be case-sensitive",
            );
            return Ok(redisplay(&state, &form, &errors)?.into_response());
        }
        Err(e) => return Err(PageError::Internal(anyhow::Error::new(e).context("Login failed"))),
    };

    tracing::debug!("User logged in: {}", user.username);
    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(&session.id, state.session_days),
        )]),
        Redirect::to(safe_next(&form.next)),
    )
        .into_response())
}

/// POST /logout - drop the server-side session and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        state
            .user_service
            .logout(&token)
            .await
            .map_err(anyhow::Error::new)
            .context("Logout failed")?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Redirect::to("/"),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_accepts_relative_paths() {
        assert_eq!(safe_next("/boards/1"), "/boards/1");
        assert_eq!(safe_next("/"), "/");
    }

    #[test]
    fn test_safe_next_rejects_external_targets() {
        assert_eq!(safe_next("https://evil.example"), "/");
        assert_eq!(safe_next("//evil.example"), "/");
        assert_eq!(safe_next(""), "/");
    }
}
