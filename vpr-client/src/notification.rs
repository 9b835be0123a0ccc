use crate::{
    api::{Comment, NewNotification, Notification, NotificationFeed, NotificationKind, Time, UserId},
    Client,
};

/// Tells the parent comment's author (or the review owner, for a root-level
/// comment) that `actor` replied. Best-effort: failures are only logged.
pub async fn notify_reply(client: &Client, actor: UserId, comment: &Comment) {
    let recipient = match comment.parent_id {
        Some(parent) => client
            .backend()
            .fetch_comment(parent)
            .await
            .map(|p| p.map(|p| p.author_id)),
        None => client.backend().review_owner(comment.review_id).await,
    };
    let recipient = match recipient {
        Ok(Some(r)) if r != actor => r,
        Ok(_) => return,
        Err(err) => {
            tracing::warn!(?err, comment = ?comment.id, "skipped reply notification");
            return;
        }
    };
    let res = client
        .backend()
        .insert_notification(NewNotification {
            user_id: recipient,
            actor_id: actor,
            kind: NotificationKind::Reply,
            review_id: Some(comment.review_id),
            comment_id: Some(comment.id),
        })
        .await;
    if let Err(err) = res {
        tracing::warn!(?err, comment = ?comment.id, "failed sending reply notification");
    }
}

/// Unread-notification badge for one user: counts notifications newer than
/// the last time they looked among the latest `notification_limit`, and
/// recounts whenever a new one arrives.
pub struct NotificationCounter {
    user: UserId,
    last_seen: Time,
    unseen: usize,
    feed: Option<NotificationFeed>,
}

impl NotificationCounter {
    pub async fn open(client: &Client, user: UserId, last_seen: Time) -> NotificationCounter {
        let feed = match client.backend().subscribe_notifications(user).await {
            Ok(feed) => Some(feed),
            Err(err) => {
                tracing::warn!(?err, ?user, "failed subscribing to notifications");
                None
            }
        };
        let mut res = NotificationCounter {
            user,
            last_seen,
            unseen: 0,
            feed,
        };
        res.refresh(client).await;
        res
    }

    pub fn unseen(&self) -> usize {
        self.unseen
    }

    pub fn last_seen(&self) -> Time {
        self.last_seen
    }

    pub async fn refresh(&mut self, client: &Client) {
        let limit = client.config().notification_limit;
        match client.backend().fetch_notifications(self.user, limit).await {
            Ok(recent) => {
                self.unseen = recent
                    .iter()
                    .filter(|n| n.created_at > self.last_seen)
                    .count();
            }
            Err(err) => {
                tracing::error!(?err, user = ?self.user, "failed loading notifications");
            }
        }
    }

    /// Waits for the next pushed notification and returns it, with the count
    /// already recomputed from the backend. Returns `None` once the feed is
    /// gone.
    pub async fn next(&mut self, client: &Client) -> Option<Notification> {
        let n = self.feed.as_mut()?.recv().await;
        match n {
            Some(n) => {
                // recount rather than increment: the push may already have
                // been seen by the initial fetch
                self.refresh(client).await;
                Some(n)
            }
            None => {
                tracing::info!(user = ?self.user, "notification feed closed");
                self.feed = None;
                None
            }
        }
    }

    pub fn mark_all_read(&mut self, now: Time) {
        self.last_seen = now;
        self.unseen = 0;
    }
}
