mod comment;
pub use comment::{Comment, CommentId, NewComment};

mod db;
pub use db::{Backend, ChangeFeed, NotificationFeed};

mod episode;
pub use episode::{Collection, CollectionId, Episode, EpisodeId};

mod error;
pub use error::Error;

mod notification;
pub use notification::{NewNotification, Notification, NotificationId, NotificationKind};

mod query;
pub use query::{EpisodeFilter, SearchIn, SortKey, TagToggle};

mod reaction;
pub use reaction::{
    Emoji, NewReaction, NewReviewReaction, Reaction, ReactionId, ReviewReaction, ReviewReactionId,
    REVIEW_HEART,
};

mod realtime;
pub use realtime::{ChangeEvent, ChangeOp, RawChange};

mod review;
pub use review::ReviewId;

mod user;
pub use user::UserId;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

// Strings that end up in backend rows must not carry null bytes, postgres
// refuses them in text columns.
pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

/// Trims user-provided comment text, refusing anything that would be empty
/// once posted.
pub fn clean_text(s: &str) -> Result<String, Error> {
    let t = s.trim();
    if t.is_empty() {
        return Err(Error::EmptyText);
    }
    validate_string(t)?;
    Ok(String::from(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_trims() {
        assert_eq!(clean_text("  hello \n"), Ok(String::from("hello")));
        assert_eq!(clean_text("a b"), Ok(String::from("a b")));
    }

    #[test]
    fn clean_text_refuses_blank() {
        assert_eq!(clean_text(""), Err(Error::EmptyText));
        assert_eq!(clean_text(" \t\n "), Err(Error::EmptyText));
    }

    #[test]
    fn clean_text_refuses_null_bytes() {
        assert_eq!(
            clean_text("foo\0bar"),
            Err(Error::NullByteInString(String::from("foo\0bar")))
        );
    }
}
