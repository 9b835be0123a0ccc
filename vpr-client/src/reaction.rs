use std::collections::HashMap;

use crate::{
    api::{
        CommentId, Emoji, Error, NewNotification, NewReaction, NotificationKind, Reaction, UserId,
    },
    Client,
};

/// What the current user has on one comment, or on one review for hearts
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReactionState<E = Emoji> {
    None,
    Voted(E),
}

/// Backend write needed to go from one `ReactionState` to the next
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReactionStep<E = Emoji> {
    Insert(E),
    Delete,
    Switch(E),
}

impl ReactionState {
    pub fn from_row(row: Option<&Reaction>) -> ReactionState {
        match row {
            None => ReactionState::None,
            Some(r) => ReactionState::Voted(r.emoji),
        }
    }
}

impl<E: Clone + Eq> ReactionState<E> {
    /// Applying the emoji already there takes it off; any other emoji
    /// replaces it in place.
    pub fn transition(self, emoji: E) -> (ReactionStep<E>, ReactionState<E>) {
        use ReactionState::{None, Voted};
        match self {
            None => (ReactionStep::Insert(emoji.clone()), Voted(emoji)),
            Voted(e) if e == emoji => (ReactionStep::Delete, None),
            Voted(_) => (ReactionStep::Switch(emoji.clone()), Voted(emoji)),
        }
    }
}

impl ReactionStep {
    pub fn notifies_author(self) -> bool {
        matches!(
            self,
            ReactionStep::Insert(Emoji::Upvote) | ReactionStep::Switch(Emoji::Upvote)
        )
    }

    fn failure_message(self) -> &'static str {
        match self {
            ReactionStep::Insert(_) => "Could not add reaction",
            ReactionStep::Delete => "Could not remove reaction",
            ReactionStep::Switch(_) => "Could not change reaction",
        }
    }
}

pub(crate) fn with_code(message: &str, err: &Error) -> String {
    match err.code() {
        Some(code) => format!("{message} ({code})"),
        None => String::from(message),
    }
}

const SAVE_FIRST: &str = "Save this comment first (needs a real ID).";

/// Toggles the current user's `emoji` on `comment`. Returns the resulting
/// state, or `None` if nothing could be done (the reason having been pushed as
/// a toast).
pub async fn toggle(client: &Client, comment: CommentId, emoji: Emoji) -> Option<ReactionState> {
    let me = client.require_auth().await?;
    let existing = match client.backend().fetch_user_reaction(comment, me).await {
        Ok(r) => r,
        Err(err) => {
            tracing::error!(?err, ?comment, "failed looking up existing reaction");
            client
                .notices()
                .push(with_code("Could not read reactions", &err));
            return None;
        }
    };
    let (step, next) = ReactionState::from_row(existing.as_ref()).transition(emoji);
    tracing::debug!(?comment, ?step, "toggling reaction");

    let res = match (step, &existing) {
        (ReactionStep::Insert(e), _) => {
            match client.backend().fetch_comment(comment).await {
                Ok(Some(_)) => (),
                Ok(None) => {
                    client.notices().push(SAVE_FIRST);
                    return None;
                }
                Err(err) => {
                    tracing::error!(?err, ?comment, "failed checking comment exists");
                    client.notices().push(with_code(step.failure_message(), &err));
                    return None;
                }
            }
            match client
                .backend()
                .insert_reaction(NewReaction::new(comment, me, e))
                .await
            {
                Ok(_) => Ok(()),
                Err(err) if err.is_duplicate_key() => {
                    // raced with another insert for this (comment, user)
                    tracing::debug!(?comment, "reaction insert raced, keeping existing row");
                    return Some(next);
                }
                Err(err) => Err(err),
            }
        }
        (ReactionStep::Delete, Some(row)) => client.backend().delete_reaction(row.id).await,
        (ReactionStep::Switch(e), Some(row)) => client.backend().update_reaction(row.id, e).await,
        (_, None) => Err(Error::NotFound),
    };
    if let Err(err) = res {
        tracing::error!(?err, ?comment, ?step, "failed saving reaction");
        match err {
            Error::ForeignKeyViolation(_) => client.notices().push(SAVE_FIRST),
            _ => client.notices().push(with_code(step.failure_message(), &err)),
        }
        return None;
    }

    if step.notifies_author() {
        notify_thumb_up(client, me, comment).await;
    }
    Some(next)
}

async fn notify_thumb_up(client: &Client, actor: UserId, comment: CommentId) {
    let target = match client.backend().fetch_comment(comment).await {
        Ok(Some(c)) if c.author_id != actor => c,
        Ok(_) => return,
        Err(err) => {
            tracing::warn!(?err, ?comment, "skipped thumb-up notification");
            return;
        }
    };
    let res = client
        .backend()
        .insert_notification(NewNotification {
            user_id: target.author_id,
            actor_id: actor,
            kind: NotificationKind::ThumbUp,
            review_id: Some(target.review_id),
            comment_id: Some(comment),
        })
        .await;
    if let Err(err) = res {
        tracing::warn!(?err, ?comment, "failed sending thumb-up notification");
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReactionTally {
    pub upvotes: usize,
    pub downvotes: usize,

    /// Sum of the rows' values
    pub score: i64,

    /// The viewing user's own reaction, if any
    pub mine: Option<Emoji>,
}

impl ReactionTally {
    fn add(&mut self, r: &Reaction, me: Option<UserId>) {
        match r.emoji {
            Emoji::Upvote => self.upvotes += 1,
            Emoji::Downvote => self.downvotes += 1,
        }
        self.score += i64::from(r.value);
        if Some(r.user_id) == me {
            self.mine = Some(r.emoji);
        }
    }
}

/// Aggregates the reactions on `comments`. Every requested comment gets an
/// entry, zeroed if nobody reacted.
pub async fn tally(
    client: &Client,
    comments: &[CommentId],
    me: Option<UserId>,
) -> Result<HashMap<CommentId, ReactionTally>, Error> {
    let mut res = comments
        .iter()
        .map(|c| (*c, ReactionTally::default()))
        .collect::<HashMap<_, _>>();
    if comments.is_empty() {
        return Ok(res);
    }
    for r in client.backend().fetch_reactions(comments).await? {
        if !r.is_consistent() {
            tracing::warn!(reaction = ?r.id, "reaction value does not match its emoji");
        }
        res.entry(r.comment_id).or_default().add(&r, me);
    }
    Ok(res)
}
