use std::ops::Range;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    Comment, CommentId, Emoji, Error, NewComment, NewNotification, NewReaction,
    NewReviewReaction, Notification, RawChange, Reaction, ReactionId, ReviewId, ReviewReaction,
    ReviewReactionId, UserId,
};

pub type ChangeFeed = mpsc::UnboundedReceiver<RawChange>;
pub type NotificationFeed = mpsc::UnboundedReceiver<Notification>;

/// The hosted backend, as seen from one authenticated (or anonymous) session.
///
/// Dropping a feed receiver unsubscribes it.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn current_user(&self) -> Result<Option<UserId>, Error>;

    /// Children of `parent` (root-level comments if `None`) in `review`,
    /// ordered by creation time ascending, restricted to the `range` of rows
    async fn fetch_comments(
        &self,
        review: ReviewId,
        parent: Option<CommentId>,
        range: Range<usize>,
    ) -> Result<Vec<Comment>, Error>;

    async fn fetch_comment(&self, id: CommentId) -> Result<Option<Comment>, Error>;
    async fn insert_comment(&self, c: NewComment) -> Result<Comment, Error>;
    async fn review_owner(&self, review: ReviewId) -> Result<Option<UserId>, Error>;

    async fn fetch_reactions(&self, comments: &[CommentId]) -> Result<Vec<Reaction>, Error>;
    async fn fetch_user_reaction(
        &self,
        comment: CommentId,
        user: UserId,
    ) -> Result<Option<Reaction>, Error>;
    async fn insert_reaction(&self, r: NewReaction) -> Result<Reaction, Error>;
    async fn update_reaction(&self, id: ReactionId, emoji: Emoji) -> Result<(), Error>;
    async fn delete_reaction(&self, id: ReactionId) -> Result<(), Error>;

    async fn fetch_review_reactions(
        &self,
        reviews: &[ReviewId],
    ) -> Result<Vec<ReviewReaction>, Error>;
    async fn fetch_user_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
    ) -> Result<Option<ReviewReaction>, Error>;
    async fn insert_review_reaction(&self, r: NewReviewReaction)
        -> Result<ReviewReaction, Error>;

    /// Also sets `value` to 1, the only value review reactions carry
    async fn update_review_reaction(
        &self,
        id: ReviewReactionId,
        emoji: String,
    ) -> Result<(), Error>;
    async fn delete_review_reaction(&self, id: ReviewReactionId) -> Result<(), Error>;

    async fn insert_notification(&self, n: NewNotification) -> Result<(), Error>;

    /// Most recent first
    async fn fetch_notifications(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, Error>;

    async fn subscribe_comments(&self, review: ReviewId) -> Result<ChangeFeed, Error>;
    async fn subscribe_notifications(&self, user: UserId) -> Result<NotificationFeed, Error>;

    /// Every insert, update or delete of a reaction row on `review`
    async fn subscribe_review_reactions(&self, review: ReviewId) -> Result<ChangeFeed, Error>;
}
