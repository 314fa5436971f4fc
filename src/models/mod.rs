pub mod comment;
pub mod events;
pub mod views;

pub use comment::{Comment, EntityType, ReactionKind, MAX_COMMENT_TEXT_LEN};
pub use events::{CommentCountUpdatedEvent, CommentCreatedEvent, CommentEvent, EntityDeletedEvent};
pub use views::{AuthorView, CommentPage, CommentView, CreateCommentResponse};
