use uuid::Uuid;

use crate::{CommentId, ReviewId, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct NotificationId(pub Uuid);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reply,
    ThumbUp,
    ReviewHeart,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Notification {
    pub id: NotificationId,

    /// Recipient
    pub user_id: UserId,

    /// Who did the thing
    pub actor_id: UserId,

    pub kind: NotificationKind,
    pub review_id: Option<ReviewId>,
    pub comment_id: Option<CommentId>,
    pub created_at: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub actor_id: UserId,
    pub kind: NotificationKind,
    pub review_id: Option<ReviewId>,
    pub comment_id: Option<CommentId>,
}
