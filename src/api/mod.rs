//! HTTP layer - handlers and routing

pub mod account;
pub mod auth;
pub mod boards;
pub mod middleware;
pub mod topics;

pub use middleware::{AppState, AuthenticatedUser, MaybeUser, PageError};

use crate::config::Config;
use crate::db::repositories::{
    SqlxBoardRepository, SqlxPostRepository, SqlxSessionRepository, SqlxTopicRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{ForumService, UserService};
use crate::templates::TemplateEngine;
use anyhow::{Context, Result};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

/// Wire repositories, services and templates into the shared state
pub fn build_state(pool: DynDatabasePool, config: &Config) -> Result<AppState> {
    let user_service = UserService::with_session_expiration(
        SqlxUserRepository::shared(pool.clone()),
        SqlxSessionRepository::shared(pool.clone()),
        config.server.session_days,
    );
    let forum = ForumService::new(
        SqlxBoardRepository::shared(pool.clone()),
        SqlxTopicRepository::shared(pool.clone()),
        SqlxPostRepository::shared(pool),
    );
    let templates = TemplateEngine::new().context("Failed to load templates")?;

    Ok(AppState {
        user_service: Arc::new(user_service),
        forum: Arc::new(forum),
        templates: Arc::new(templates),
        session_days: config.server.session_days,
    })
}

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(boards::home))
        .route("/boards/{board_id}", get(boards::board_topics))
        .route(
            "/boards/{board_id}/new",
            get(topics::new_topic_form).post(topics::create_topic),
        )
        .route(
            "/boards/{board_id}/topics/{topic_id}",
            get(topics::topic_posts),
        )
        .route(
            "/boards/{board_id}/topics/{topic_id}/reply",
            get(topics::reply_form).post(topics::create_reply),
        )
        .route(
            "/boards/{board_id}/topics/{topic_id}/posts/{post_id}/edit",
            get(topics::edit_post_form).post(topics::update_post),
        )
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", post(auth::logout))
        .route(
            "/settings/account",
            get(account::account_form).post(account::update_account),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_user,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
