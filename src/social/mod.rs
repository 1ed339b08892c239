/// Likes and comments on surf sessions

mod comments;
mod likes;

pub use comments::{CommentManager, CommentPage, CommentRequest};
pub use likes::{LikeManager, LikeState};
