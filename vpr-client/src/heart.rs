use std::collections::HashMap;

use crate::{
    api::{
        ChangeFeed, Error, NewNotification, NewReviewReaction, NotificationKind, ReviewId,
        ReviewReaction, UserId, REVIEW_HEART,
    },
    reaction::{with_code, ReactionState, ReactionStep},
    Client,
};

/// The current user's reaction on a review. Rows left by older clients may be
/// `Voted` with an emoji other than the heart.
pub type HeartState = ReactionState<String>;

const SAVE_FIRST: &str = "Save this review first (needs a real ID).";

fn state_of(row: Option<&ReviewReaction>) -> HeartState {
    match row {
        None => ReactionState::None,
        Some(r) => ReactionState::Voted(r.emoji.clone()),
    }
}

fn failure_message(step: &ReactionStep<String>) -> &'static str {
    match step {
        ReactionStep::Delete => "Could not remove heart",
        ReactionStep::Insert(_) | ReactionStep::Switch(_) => "Could not add heart",
    }
}

/// Toggles the current user's heart on `review`. A reaction row with another
/// emoji is turned into a heart in place. Returns the resulting state, or
/// `None` if nothing could be done (the reason having been pushed as a toast).
pub async fn toggle_review_heart(client: &Client, review: ReviewId) -> Option<HeartState> {
    let me = client.require_auth().await?;
    let existing = match client.backend().fetch_user_review_reaction(review, me).await {
        Ok(r) => r,
        Err(err) => {
            // an existing row still trips the unique key on insert
            tracing::warn!(?err, ?review, "failed looking up existing heart, assuming none");
            None
        }
    };
    let (step, next) = state_of(existing.as_ref()).transition(String::from(REVIEW_HEART));
    tracing::debug!(?review, ?step, "toggling review heart");

    let res = match (&step, &existing) {
        (ReactionStep::Insert(_), _) => {
            match client
                .backend()
                .insert_review_reaction(NewReviewReaction::heart(review, me))
                .await
            {
                Ok(_) => Ok(()),
                Err(err) if err.is_duplicate_key() => {
                    tracing::debug!(?review, "heart insert raced, keeping existing row");
                    return Some(next);
                }
                Err(err) => Err(err),
            }
        }
        (ReactionStep::Delete, Some(row)) => client.backend().delete_review_reaction(row.id).await,
        (ReactionStep::Switch(e), Some(row)) => {
            client
                .backend()
                .update_review_reaction(row.id, e.clone())
                .await
        }
        (_, None) => Err(Error::NotFound),
    };
    if let Err(err) = res {
        tracing::error!(?err, ?review, ?step, "failed saving review heart");
        match err {
            Error::ForeignKeyViolation(_) => client.notices().push(SAVE_FIRST),
            _ => client
                .notices()
                .push(with_code(failure_message(&step), &err)),
        }
        return None;
    }

    if step != ReactionStep::Delete {
        notify_review_heart(client, me, review).await;
    }
    Some(next)
}

async fn notify_review_heart(client: &Client, actor: UserId, review: ReviewId) {
    let owner = match client.backend().review_owner(review).await {
        Ok(Some(owner)) if owner != actor => owner,
        Ok(_) => return,
        Err(err) => {
            tracing::warn!(?err, ?review, "skipped review heart notification");
            return;
        }
    };
    let res = client
        .backend()
        .insert_notification(NewNotification {
            user_id: owner,
            actor_id: actor,
            kind: NotificationKind::ReviewHeart,
            review_id: Some(review),
            comment_id: None,
        })
        .await;
    if let Err(err) = res {
        tracing::warn!(?err, ?review, "failed sending review heart notification");
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeartTally {
    pub hearts: usize,

    /// Whether the viewing user's reaction is a heart
    pub mine: bool,
}

/// Counts the hearts on `reviews`. Reactions with any other emoji are not
/// counted. Every requested review gets an entry.
pub async fn heart_tally(
    client: &Client,
    reviews: &[ReviewId],
    me: Option<UserId>,
) -> Result<HashMap<ReviewId, HeartTally>, Error> {
    let mut res = reviews
        .iter()
        .map(|r| (*r, HeartTally::default()))
        .collect::<HashMap<_, _>>();
    if reviews.is_empty() {
        return Ok(res);
    }
    for r in client.backend().fetch_review_reactions(reviews).await? {
        if !r.is_heart() {
            continue;
        }
        let t = res.entry(r.review_id).or_default();
        t.hearts += 1;
        if Some(r.user_id) == me {
            t.mine = true;
        }
    }
    Ok(res)
}

/// Live heart count of one review, recounted on every change to its reaction
/// rows.
pub struct HeartCounter {
    review: ReviewId,
    me: Option<UserId>,
    tally: HeartTally,
    feed: Option<ChangeFeed>,
}

impl HeartCounter {
    pub async fn open(client: &Client, review: ReviewId, me: Option<UserId>) -> HeartCounter {
        let feed = match client.backend().subscribe_review_reactions(review).await {
            Ok(feed) => Some(feed),
            Err(err) => {
                tracing::warn!(?err, ?review, "failed subscribing to review reactions");
                None
            }
        };
        let mut res = HeartCounter {
            review,
            me,
            tally: HeartTally::default(),
            feed,
        };
        res.refresh(client).await;
        res
    }

    pub fn tally(&self) -> HeartTally {
        self.tally
    }

    /// Failures keep the last known count
    pub async fn refresh(&mut self, client: &Client) {
        match heart_tally(client, &[self.review], self.me).await {
            Ok(mut t) => self.tally = t.remove(&self.review).unwrap_or_default(),
            Err(err) => {
                tracing::warn!(?err, review = ?self.review, "failed counting hearts");
            }
        }
    }

    /// Waits for the next change and returns the recounted tally. Returns
    /// `None` once the feed is gone.
    pub async fn next(&mut self, client: &Client) -> Option<HeartTally> {
        match self.feed.as_mut()?.recv().await {
            Some(_) => {
                self.refresh(client).await;
                Some(self.tally)
            }
            None => {
                tracing::info!(review = ?self.review, "review reaction feed closed");
                self.feed = None;
                None
            }
        }
    }
}
