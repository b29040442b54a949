//! Services layer - Business logic
//!
//! This module contains the business logic of the discussion board.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod forum;
pub mod password;
pub mod user;

pub use forum::{ForumError, ForumService, POSTS_PER_PAGE, TOPICS_PER_PAGE};
pub use password::{hash_password, verify_password};
pub use user::{UserService, UserServiceError};
