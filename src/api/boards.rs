//! Board pages: the home board list and per-board topic listings

use crate::api::middleware::{insert_page, page_context, render, AppState, MaybeUser, PageError};
use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use serde::Deserialize;

/// `?page=` query parameter shared by the paginated pages
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

/// GET / - all boards with their topic and post counts
pub async fn home(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, PageError> {
    let boards = state.forum.list_boards().await?;

    let mut context = page_context(&user);
    context.insert("boards", &boards);
    render(&state, "home.html", &context)
}

/// GET /boards/{board_id} - topics in a board, most recently updated first
pub async fn board_topics(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    Query(query): Query<PageQuery>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, PageError> {
    let (board, topics) = state.forum.board_topics(board_id, query.page()).await?;

    let mut context = page_context(&user);
    context.insert("board", &board);
    insert_page(&mut context, "topics", &topics);
    render(&state, "topics.html", &context)
}
