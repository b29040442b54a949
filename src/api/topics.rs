//! Topic pages: viewing, starting topics, replying and editing posts

use crate::api::boards::PageQuery;
use crate::api::middleware::{
    cookie_value, insert_page, page_context, render, viewer_cookie, AppState, AuthenticatedUser,
    MaybeUser, PageError, SESSION_COOKIE, VIEWER_COOKIE,
};
use crate::forms::{EditPostForm, NewTopicForm, ReplyForm, ValidationErrors};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use uuid::Uuid;

/// GET /boards/{board_id}/new - blank topic form
pub async fn new_topic_form(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Html<String>, PageError> {
    let board = state.forum.get_board(board_id).await?;

    let mut context = page_context(&Some(user));
    context.insert("board", &board);
    context.insert("form", &NewTopicForm::default());
    context.insert("errors", &ValidationErrors::new());
    render(&state, "new_topic.html", &context)
}

/// POST /boards/{board_id}/new - create a topic with its opening post
pub async fn create_topic(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    AuthenticatedUser(user): AuthenticatedUser,
    axum::Form(form): axum::Form<NewTopicForm>,
) -> Result<Response, PageError> {
    let board = state.forum.get_board(board_id).await?;

    let (subject, message) = match form.validate() {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            let mut context = page_context(&Some(user));
            context.insert("board", &board);
            context.insert("form", &form);
            context.insert("errors", &errors);
            return Ok(render(&state, "new_topic.html", &context)?.into_response());
        }
    };

    let (topic, _first_post) = state
        .forum
        .create_topic(board_id, user.id, subject, message)
        .await?;

    tracing::info!("User {} started topic {}", user.username, topic.id);
    Ok(Redirect::to(&format!("/boards/{}/topics/{}", board_id, topic.id)).into_response())
}

/// GET /boards/{board_id}/topics/{topic_id} - posts in a topic, oldest first.
///
/// Counts one view per viewer. Logged-in viewers are identified by their
/// session token, anonymous ones by a long-lived cookie issued here.
pub async fn topic_posts(
    State(state): State<AppState>,
    Path((board_id, topic_id)): Path<(i64, i64)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    MaybeUser(user): MaybeUser,
) -> Result<Response, PageError> {
    let (mut topic, posts) = state
        .forum
        .topic_posts(board_id, topic_id, query.page())
        .await?;

    // Pick the viewer identity, minting a cookie for first-time visitors
    let session_token = cookie_value(&headers, SESSION_COOKIE);
    let mut new_viewer_token = None;
    let viewer = match session_token {
        Some(token) => token,
        None => match cookie_value(&headers, VIEWER_COOKIE) {
            Some(token) => token,
            None => {
                let token = Uuid::new_v4().to_string();
                new_viewer_token = Some(token.clone());
                token
            }
        },
    };

    if state.forum.record_view(topic.id, &viewer).await? {
        // Reflect the view we just counted without re-reading the row
        topic.views += 1;
    }

    let mut context = page_context(&user);
    let board = state.forum.get_board(board_id).await?;
    context.insert("board", &board);
    context.insert("topic", &topic);
    insert_page(&mut context, "posts", &posts);

    let html = render(&state, "topic_posts.html", &context)?;
    match new_viewer_token {
        Some(token) => Ok((
            AppendHeaders([(header::SET_COOKIE, viewer_cookie(&token))]),
            html,
        )
            .into_response()),
        None => Ok(html.into_response()),
    }
}

/// GET /boards/{board_id}/topics/{topic_id}/reply - blank reply form
pub async fn reply_form(
    State(state): State<AppState>,
    Path((board_id, topic_id)): Path<(i64, i64)>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Html<String>, PageError> {
    let topic = state.forum.get_topic(board_id, topic_id).await?;
    let board = state.forum.get_board(board_id).await?;

    let mut context = page_context(&Some(user));
    context.insert("board", &board);
    context.insert("topic", &topic);
    context.insert("form", &ReplyForm::default());
    context.insert("errors", &ValidationErrors::new());
    render(&state, "reply_topic.html", &context)
}

/// POST /boards/{board_id}/topics/{topic_id}/reply - add a reply
pub async fn create_reply(
    State(state): State<AppState>,
    Path((board_id, topic_id)): Path<(i64, i64)>,
    AuthenticatedUser(user): AuthenticatedUser,
    axum::Form(form): axum::Form<ReplyForm>,
) -> Result<Response, PageError> {
    let topic = state.forum.get_topic(board_id, topic_id).await?;

    let message = match form.validate() {
        Ok(message) => message,
        Err(errors) => {
            let board = state.forum.get_board(board_id).await?;
            let mut context = page_context(&Some(user));
            context.insert("board", &board);
            context.insert("topic", &topic);
            context.insert("form", &form);
            context.insert("errors", &errors);
            return Ok(render(&state, "reply_topic.html", &context)?.into_response());
        }
    };

    state.forum.reply(board_id, topic_id, user.id, &message).await?;

    // Land on the page that shows the new reply
    let (_, posts) = state.forum.topic_posts(board_id, topic_id, 1).await?;
    let last_page = posts.total_pages().max(1);
    Ok(Redirect::to(&format!(
        "/boards/{}/topics/{}?page={}",
        board_id, topic_id, last_page
    ))
    .into_response())
}

/// GET /boards/{board_id}/topics/{topic_id}/posts/{post_id}/edit - edit form
/// prefilled with the current message
pub async fn edit_post_form(
    State(state): State<AppState>,
    Path((board_id, topic_id, post_id)): Path<(i64, i64, i64)>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Html<String>, PageError> {
    let post = state
        .forum
        .post_for_edit(board_id, topic_id, post_id, user.id)
        .await?;
    let topic = state.forum.get_topic(board_id, topic_id).await?;
    let board = state.forum.get_board(board_id).await?;

    let mut context = page_context(&Some(user));
    context.insert("board", &board);
    context.insert("topic", &topic);
    context.insert("post_id", &post_id);
    context.insert("form", &EditPostForm { message: post.message });
    context.insert("errors", &ValidationErrors::new());
    render(&state, "edit_post.html", &context)
}

/// POST /boards/{board_id}/topics/{topic_id}/posts/{post_id}/edit - save
/// changes, allowed only for the post's author
pub async fn update_post(
    State(state): State<AppState>,
    Path((board_id, topic_id, post_id)): Path<(i64, i64, i64)>,
    AuthenticatedUser(user): AuthenticatedUser,
    axum::Form(form): axum::Form<EditPostForm>,
) -> Result<Response, PageError> {
    let message = match form.validate() {
        Ok(message) => message,
        Err(errors) => {
            // Re-check ownership so non-authors get 403, not a form page
            state
                .forum
                .post_for_edit(board_id, topic_id, post_id, user.id)
                .await?;
            let topic = state.forum.get_topic(board_id, topic_id).await?;
            let board = state.forum.get_board(board_id).await?;

            let mut context = page_context(&Some(user));
            context.insert("board", &board);
            context.insert("topic", &topic);
            context.insert("post_id", &post_id);
            context.insert("form", &form);
            context.insert("errors", &errors);
            return Ok(render(&state, "edit_post.html", &context)?.into_response());
        }
    };

    state
        .forum
        .edit_post(board_id, topic_id, post_id, user.id, &message)
        .await?;

    Ok(Redirect::to(&format!("/boards/{}/topics/{}", board_id, topic_id)).into_response())
}
