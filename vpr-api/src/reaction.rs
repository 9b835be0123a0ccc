use uuid::Uuid;

use crate::{CommentId, ReviewId, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ReactionId(pub Uuid);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Emoji {
    #[serde(rename = "👍")]
    Upvote,
    #[serde(rename = "👎")]
    Downvote,
}

impl Emoji {
    pub fn value(self) -> i32 {
        match self {
            Emoji::Upvote => 1,
            Emoji::Downvote => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emoji::Upvote => "👍",
            Emoji::Downvote => "👎",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub comment_id: CommentId,
    pub user_id: UserId,
    pub emoji: Emoji,

    /// Always `emoji.value()`, stored for aggregate scoring
    pub value: i32,
}

impl Reaction {
    pub fn is_consistent(&self) -> bool {
        self.value == self.emoji.value()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewReaction {
    pub comment_id: CommentId,
    pub user_id: UserId,
    pub emoji: Emoji,
    pub value: i32,
}

impl NewReaction {
    pub fn new(comment_id: CommentId, user_id: UserId, emoji: Emoji) -> NewReaction {
        NewReaction {
            comment_id,
            user_id,
            emoji,
            value: emoji.value(),
        }
    }
}

/// Emoji of every new review reaction
pub const REVIEW_HEART: &str = "❤️";

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ReviewReactionId(pub Uuid);

/// A reaction on a whole review, unique per (review, user). Rows written by
/// older clients may carry an emoji other than the heart.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ReviewReaction {
    pub id: ReviewReactionId,
    pub review_id: ReviewId,
    pub user_id: UserId,
    pub emoji: String,
    pub value: i32,
}

impl ReviewReaction {
    pub fn is_heart(&self) -> bool {
        self.emoji == REVIEW_HEART
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewReviewReaction {
    pub review_id: ReviewId,
    pub user_id: UserId,
    pub emoji: String,
    pub value: i32,
}

impl NewReviewReaction {
    pub fn heart(review_id: ReviewId, user_id: UserId) -> NewReviewReaction {
        NewReviewReaction {
            review_id,
            user_id,
            emoji: String::from(REVIEW_HEART),
            value: 1,
        }
    }
}
