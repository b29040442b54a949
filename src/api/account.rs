//! Account settings page

use crate::api::middleware::{page_context, render, AppState, AuthenticatedUser, PageError};
use crate::forms::{AccountForm, ValidationErrors};
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use crate::services::UserServiceError;

/// GET /settings/account - form prefilled with the current profile
pub async fn account_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Html<String>, PageError> {
    let form = AccountForm {
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
    };

    let mut context = page_context(&Some(user));
    context.insert("form", &form);
    context.insert("errors", &ValidationErrors::new());
    render(&state, "my_account.html", &context)
}

/// POST /settings/account - update first name, last name and email,
/// then return home. The username is immutable.
pub async fn update_account(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    axum::Form(form): axum::Form<AccountForm>,
) -> Result<Response, PageError> {
    let redisplay = |state: &AppState,
                     user: &crate::models::User,
                     form: &AccountForm,
                     errors: &ValidationErrors|
     -> Result<Html<String>, PageError> {
        let mut context = page_context(&Some(user.clone()));
        context.insert("form", form);
        context.insert("errors", errors);
        render(state, "my_account.html", &context)
    };

    let update = match form.validate() {
        Ok(update) => update,
        Err(errors) => return Ok(redisplay(&state, &user, &form, &errors)?.into_response()),
    };

    match state.user_service.update_account(user.id, &update).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(UserServiceError::EmailTaken) => {
            let mut errors = ValidationErrors::new();
            errors.add("email", "A user with that email already exists");
            Ok(redisplay(&state, &user, &form, &errors)?.into_response())
        }
        Err(e) => Err(PageError::Internal(
            anyhow::Error::new(e).context("Account update failed"),
        )),
    }
}
