use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    ops::Range,
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use vpr_api::{
    Backend, ChangeFeed, Comment, CommentId, Emoji, Error, NewComment, NewNotification,
    NewReaction, NewReviewReaction, Notification, NotificationFeed, NotificationId, RawChange,
    Reaction, ReactionId, ReviewId, ReviewReaction, ReviewReactionId, Time, UserId, Uuid,
};

/// Backend operations, used to inject failures into the mock
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MockOp {
    CurrentUser,
    FetchComments,
    FetchComment,
    InsertComment,
    ReviewOwner,
    FetchReactions,
    FetchUserReaction,
    InsertReaction,
    UpdateReaction,
    DeleteReaction,
    FetchReviewReactions,
    FetchUserReviewReaction,
    InsertReviewReaction,
    UpdateReviewReaction,
    DeleteReviewReaction,
    InsertNotification,
    FetchNotifications,
    SubscribeComments,
    SubscribeNotifications,
    SubscribeReviewReactions,
}

/// In-memory stand-in for the hosted backend, shared by all of its sessions.
///
/// Enforces what the real database enforces: reviews and parents must exist,
/// one reaction per (comment, user) and per (review, user), and writes only on
/// behalf of the session user.
#[derive(Clone, Debug)]
pub struct MockServer(Arc<Mutex<State>>);

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, String>,
    reviews: HashMap<ReviewId, UserId>,

    // insertion order is the tie-break for equal timestamps
    comments: Vec<Comment>,
    reactions: Vec<Reaction>,
    review_reactions: Vec<ReviewReaction>,
    notifications: Vec<Notification>,

    comment_feeds: HashMap<ReviewId, Vec<mpsc::UnboundedSender<RawChange>>>,
    review_reaction_feeds: HashMap<ReviewId, Vec<mpsc::UnboundedSender<RawChange>>>,
    notification_feeds: HashMap<UserId, Vec<mpsc::UnboundedSender<Notification>>>,

    failures: HashMap<MockOp, VecDeque<Error>>,
    last_time: Option<Time>,
}

impl State {
    fn now(&mut self) -> Time {
        let mut now = Utc::now();
        if let Some(last) = self.last_time {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last_time = Some(now);
        now
    }

    fn take_failure(&mut self, op: MockOp) -> Result<(), Error> {
        match self.failures.get_mut(&op).and_then(|f| f.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn relay_comment_change(&mut self, review: ReviewId, change: RawChange) {
        if let Some(feeds) = self.comment_feeds.get_mut(&review) {
            feeds.retain(|f| matches!(f.send(change.clone()), Ok(())));
        }
    }

    fn relay_review_reaction_change(&mut self, review: ReviewId, change: RawChange) {
        if let Some(feeds) = self.review_reaction_feeds.get_mut(&review) {
            feeds.retain(|f| matches!(f.send(change.clone()), Ok(())));
        }
    }

    fn add_review_reaction(&mut self, r: NewReviewReaction) -> Result<ReviewReaction, Error> {
        vpr_api::validate_string(&r.emoji)?;
        if !self.reviews.contains_key(&r.review_id) {
            return Err(Error::ForeignKeyViolation(format!(
                "review {:?} does not exist",
                r.review_id
            )));
        }
        if self
            .review_reactions
            .iter()
            .any(|e| e.review_id == r.review_id && e.user_id == r.user_id)
        {
            return Err(Error::DuplicateKey(String::from(
                "review_reactions_review_id_user_id_key",
            )));
        }
        let reaction = ReviewReaction {
            id: ReviewReactionId(Uuid::new_v4()),
            review_id: r.review_id,
            user_id: r.user_id,
            emoji: r.emoji,
            value: r.value,
        };
        self.review_reactions.push(reaction.clone());
        let change = RawChange::for_rows("INSERT", Some(&reaction), None)?;
        self.relay_review_reaction_change(reaction.review_id, change);
        Ok(reaction)
    }

    fn relay_notification(&mut self, n: &Notification) {
        if let Some(feeds) = self.notification_feeds.get_mut(&n.user_id) {
            feeds.retain(|f| matches!(f.send(n.clone()), Ok(())));
        }
    }

    fn add_comment(&mut self, c: NewComment, created_at: Time) -> Result<Comment, Error> {
        c.validate()?;
        if !self.reviews.contains_key(&c.review_id) {
            return Err(Error::ForeignKeyViolation(format!(
                "review {:?} does not exist",
                c.review_id
            )));
        }
        if let Some(parent) = c.parent_id {
            if !self
                .comments
                .iter()
                .any(|p| p.id == parent && p.review_id == c.review_id)
            {
                return Err(Error::ForeignKeyViolation(format!(
                    "parent comment {parent:?} does not exist in review {:?}",
                    c.review_id
                )));
            }
        }
        let comment = Comment {
            id: CommentId(Uuid::new_v4()),
            review_id: c.review_id,
            parent_id: c.parent_id,
            author_id: c.author_id,
            text: c.text,
            created_at,
        };
        self.comments.push(comment.clone());
        self.relay_comment_change(comment.review_id, RawChange::insert(&comment)?);
        Ok(comment)
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer(Arc::new(Mutex::new(State::default())))
    }

    pub fn create_user(&self, name: &str) -> UserId {
        let id = UserId::new_random();
        self.0.lock().users.insert(id, String::from(name));
        id
    }

    pub fn create_review(&self, owner: UserId) -> ReviewId {
        let id = ReviewId::new_random();
        self.0.lock().reviews.insert(id, owner);
        id
    }

    /// A backend session logged in as `user`, or anonymous if `None`
    pub fn session(&self, user: Option<UserId>) -> MockSession {
        MockSession {
            server: self.clone(),
            user,
        }
    }

    /// Make the next call to `op` (through any session) fail with `err`
    pub fn fail_next(&self, op: MockOp, err: Error) {
        self.0
            .lock()
            .failures
            .entry(op)
            .or_insert_with(VecDeque::new)
            .push_back(err);
    }

    /// Insert a comment with a chosen timestamp, bypassing session checks
    pub fn test_seed_comment(
        &self,
        review: ReviewId,
        parent: Option<CommentId>,
        author: UserId,
        text: &str,
        created_at: Time,
    ) -> Result<Comment, Error> {
        self.0.lock().add_comment(
            NewComment {
                review_id: review,
                parent_id: parent,
                author_id: author,
                text: String::from(text),
            },
            created_at,
        )
    }

    /// Delete a comment and its reactions, relaying the change
    pub fn test_delete_comment(&self, id: CommentId) -> Result<(), Error> {
        let mut s = self.0.lock();
        let pos = s
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::NotFound)?;
        let c = s.comments.remove(pos);
        s.reactions.retain(|r| r.comment_id != id);
        let change = RawChange::delete(&c)?;
        s.relay_comment_change(c.review_id, change);
        Ok(())
    }

    /// Removes a comment without telling the feeds, so tests can relay their
    /// own payload for it
    pub fn test_remove_comment_quietly(&self, id: CommentId) -> Result<Comment, Error> {
        let mut s = self.0.lock();
        let pos = s
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::NotFound)?;
        s.reactions.retain(|r| r.comment_id != id);
        Ok(s.comments.remove(pos))
    }

    /// Push an arbitrary payload to the comment feeds of `review`
    pub fn test_relay_raw(&self, review: ReviewId, change: RawChange) {
        self.0.lock().relay_comment_change(review, change);
    }

    pub fn test_reactions_of(&self, comment: CommentId, user: UserId) -> Vec<Reaction> {
        self.0
            .lock()
            .reactions
            .iter()
            .filter(|r| r.comment_id == comment && r.user_id == user)
            .cloned()
            .collect()
    }

    /// Insert a review reaction with any emoji, bypassing session checks
    pub fn test_seed_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
        emoji: &str,
    ) -> Result<ReviewReaction, Error> {
        self.0.lock().add_review_reaction(NewReviewReaction {
            review_id: review,
            user_id: user,
            emoji: String::from(emoji),
            value: 1,
        })
    }

    pub fn test_review_reactions_of(&self, review: ReviewId, user: UserId) -> Vec<ReviewReaction> {
        self.0
            .lock()
            .review_reactions
            .iter()
            .filter(|r| r.review_id == review && r.user_id == user)
            .cloned()
            .collect()
    }

    pub fn test_notifications(&self) -> Vec<Notification> {
        self.0.lock().notifications.clone()
    }

    pub fn test_num_comments(&self) -> usize {
        self.0.lock().comments.len()
    }

    /// Number of live comment subscriptions for `review`
    pub fn test_num_comment_feeds(&self, review: ReviewId) -> usize {
        self.0
            .lock()
            .comment_feeds
            .get(&review)
            .map(|f| f.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[derive(Clone, Debug)]
pub struct MockSession {
    server: MockServer,
    user: Option<UserId>,
}

impl MockSession {
    fn lock(&self) -> parking_lot::MutexGuard<'_, State> {
        self.server.0.lock()
    }

    fn require_user(&self, acting_as: UserId) -> Result<(), Error> {
        match self.user {
            None => Err(Error::NotAuthenticated),
            Some(u) if u != acting_as => Err(Error::PermissionDenied),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MockSession {
    async fn current_user(&self) -> Result<Option<UserId>, Error> {
        self.lock().take_failure(MockOp::CurrentUser)?;
        Ok(self.user)
    }

    async fn fetch_comments(
        &self,
        review: ReviewId,
        parent: Option<CommentId>,
        range: Range<usize>,
    ) -> Result<Vec<Comment>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::FetchComments)?;
        let mut rows = s
            .comments
            .iter()
            .filter(|c| c.review_id == review && c.parent_id == parent)
            .cloned()
            .collect::<Vec<_>>();
        // stable: equal timestamps keep insertion order
        rows.sort_by_key(|c| c.created_at);
        Ok(rows
            .into_iter()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .collect())
    }

    async fn fetch_comment(&self, id: CommentId) -> Result<Option<Comment>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::FetchComment)?;
        Ok(s.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&self, c: NewComment) -> Result<Comment, Error> {
        self.require_user(c.author_id)?;
        let mut s = self.lock();
        s.take_failure(MockOp::InsertComment)?;
        let now = s.now();
        s.add_comment(c, now)
    }

    async fn review_owner(&self, review: ReviewId) -> Result<Option<UserId>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::ReviewOwner)?;
        Ok(s.reviews.get(&review).copied())
    }

    async fn fetch_reactions(&self, comments: &[CommentId]) -> Result<Vec<Reaction>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::FetchReactions)?;
        Ok(s.reactions
            .iter()
            .filter(|r| comments.contains(&r.comment_id))
            .cloned()
            .collect())
    }

    async fn fetch_user_reaction(
        &self,
        comment: CommentId,
        user: UserId,
    ) -> Result<Option<Reaction>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::FetchUserReaction)?;
        Ok(s.reactions
            .iter()
            .find(|r| r.comment_id == comment && r.user_id == user)
            .cloned())
    }

    async fn insert_reaction(&self, r: NewReaction) -> Result<Reaction, Error> {
        self.require_user(r.user_id)?;
        let mut s = self.lock();
        s.take_failure(MockOp::InsertReaction)?;
        if r.value != r.emoji.value() {
            return Err(Error::Unknown(String::from(
                "reaction value does not match emoji",
            )));
        }
        if !s.comments.iter().any(|c| c.id == r.comment_id) {
            return Err(Error::ForeignKeyViolation(format!(
                "comment {:?} does not exist",
                r.comment_id
            )));
        }
        if s
            .reactions
            .iter()
            .any(|e| e.comment_id == r.comment_id && e.user_id == r.user_id)
        {
            return Err(Error::DuplicateKey(String::from(
                "comment_reactions_comment_id_user_id_key",
            )));
        }
        let reaction = Reaction {
            id: ReactionId(Uuid::new_v4()),
            comment_id: r.comment_id,
            user_id: r.user_id,
            emoji: r.emoji,
            value: r.value,
        };
        s.reactions.push(reaction.clone());
        Ok(reaction)
    }

    async fn update_reaction(&self, id: ReactionId, emoji: Emoji) -> Result<(), Error> {
        let user = self.user.ok_or(Error::NotAuthenticated)?;
        let mut s = self.lock();
        s.take_failure(MockOp::UpdateReaction)?;
        let r = s
            .reactions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::NotFound)?;
        if r.user_id != user {
            return Err(Error::PermissionDenied);
        }
        r.emoji = emoji;
        r.value = emoji.value();
        Ok(())
    }

    async fn delete_reaction(&self, id: ReactionId) -> Result<(), Error> {
        let user = self.user.ok_or(Error::NotAuthenticated)?;
        let mut s = self.lock();
        s.take_failure(MockOp::DeleteReaction)?;
        let pos = s
            .reactions
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::NotFound)?;
        if s.reactions[pos].user_id != user {
            return Err(Error::PermissionDenied);
        }
        s.reactions.remove(pos);
        Ok(())
    }

    async fn fetch_review_reactions(
        &self,
        reviews: &[ReviewId],
    ) -> Result<Vec<ReviewReaction>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::FetchReviewReactions)?;
        Ok(s.review_reactions
            .iter()
            .filter(|r| reviews.contains(&r.review_id))
            .cloned()
            .collect())
    }

    async fn fetch_user_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
    ) -> Result<Option<ReviewReaction>, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::FetchUserReviewReaction)?;
        Ok(s.review_reactions
            .iter()
            .find(|r| r.review_id == review && r.user_id == user)
            .cloned())
    }

    async fn insert_review_reaction(
        &self,
        r: NewReviewReaction,
    ) -> Result<ReviewReaction, Error> {
        self.require_user(r.user_id)?;
        let mut s = self.lock();
        s.take_failure(MockOp::InsertReviewReaction)?;
        s.add_review_reaction(r)
    }

    async fn update_review_reaction(
        &self,
        id: ReviewReactionId,
        emoji: String,
    ) -> Result<(), Error> {
        let user = self.user.ok_or(Error::NotAuthenticated)?;
        vpr_api::validate_string(&emoji)?;
        let mut s = self.lock();
        s.take_failure(MockOp::UpdateReviewReaction)?;
        let r = s
            .review_reactions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::NotFound)?;
        if r.user_id != user {
            return Err(Error::PermissionDenied);
        }
        let old = r.clone();
        r.emoji = emoji;
        r.value = 1;
        let new = r.clone();
        let change = RawChange::for_rows("UPDATE", Some(&new), Some(&old))?;
        s.relay_review_reaction_change(new.review_id, change);
        Ok(())
    }

    async fn delete_review_reaction(&self, id: ReviewReactionId) -> Result<(), Error> {
        let user = self.user.ok_or(Error::NotAuthenticated)?;
        let mut s = self.lock();
        s.take_failure(MockOp::DeleteReviewReaction)?;
        let pos = s
            .review_reactions
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::NotFound)?;
        if s.review_reactions[pos].user_id != user {
            return Err(Error::PermissionDenied);
        }
        let old = s.review_reactions.remove(pos);
        let change = RawChange::for_rows("DELETE", None, Some(&old))?;
        s.relay_review_reaction_change(old.review_id, change);
        Ok(())
    }

    async fn insert_notification(&self, n: NewNotification) -> Result<(), Error> {
        self.require_user(n.actor_id)?;
        let mut s = self.lock();
        s.take_failure(MockOp::InsertNotification)?;
        if !s.users.contains_key(&n.user_id) {
            return Err(Error::ForeignKeyViolation(format!(
                "user {:?} does not exist",
                n.user_id
            )));
        }
        let created_at = s.now();
        let notif = Notification {
            id: NotificationId(Uuid::new_v4()),
            user_id: n.user_id,
            actor_id: n.actor_id,
            kind: n.kind,
            review_id: n.review_id,
            comment_id: n.comment_id,
            created_at,
        };
        s.notifications.push(notif.clone());
        s.relay_notification(&notif);
        Ok(())
    }

    async fn fetch_notifications(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, Error> {
        self.require_user(user)?;
        let mut s = self.lock();
        s.take_failure(MockOp::FetchNotifications)?;
        let mut res = s
            .notifications
            .iter()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect::<Vec<_>>();
        res.sort_by_key(|n| std::cmp::Reverse(n.created_at));
        res.truncate(limit);
        Ok(res)
    }

    async fn subscribe_comments(&self, review: ReviewId) -> Result<ChangeFeed, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::SubscribeComments)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        s.comment_feeds
            .entry(review)
            .or_insert_with(Vec::new)
            .push(sender);
        tracing::debug!(?review, "opened comment feed");
        Ok(receiver)
    }

    async fn subscribe_notifications(&self, user: UserId) -> Result<NotificationFeed, Error> {
        self.require_user(user)?;
        let mut s = self.lock();
        s.take_failure(MockOp::SubscribeNotifications)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        s.notification_feeds
            .entry(user)
            .or_insert_with(Vec::new)
            .push(sender);
        Ok(receiver)
    }

    async fn subscribe_review_reactions(&self, review: ReviewId) -> Result<ChangeFeed, Error> {
        let mut s = self.lock();
        s.take_failure(MockOp::SubscribeReviewReactions)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        s.review_reaction_feeds
            .entry(review)
            .or_insert_with(Vec::new)
            .push(sender);
        tracing::debug!(?review, "opened review reaction feed");
        Ok(receiver)
    }
}
