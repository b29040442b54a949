//! Data models
//!
//! Database entities and display projections for the Palaver forum:
//! boards, topics, posts, users, and sessions.

mod board;
mod pagination;
mod post;
mod session;
mod topic;
mod user;

pub use board::{Board, BoardSummary};
pub use pagination::{ListParams, PagedResult};
pub use post::{Post, PostView};
pub use session::Session;
pub use topic::{NewTopic, Topic, TopicSummary};
pub use user::{AccountUpdate, NewUser, User};
