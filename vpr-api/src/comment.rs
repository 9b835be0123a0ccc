use uuid::Uuid;

use crate::{Error, ReviewId, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

/// One node of a review's comment tree, as stored by the backend
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub review_id: ReviewId,

    /// None for root-level comments
    pub parent_id: Option<CommentId>,

    pub author_id: UserId,
    pub text: String,
    pub created_at: Time,
}

/// Insertion payload; the backend assigns `id` and `created_at`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub review_id: ReviewId,
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub text: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        if self.text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        crate::validate_string(&self.text)
    }
}
