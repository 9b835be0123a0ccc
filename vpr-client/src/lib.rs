mod client;
pub use client::{Client, ClientConfig};

mod heart;
pub use heart::{heart_tally, toggle_review_heart, HeartCounter, HeartState, HeartTally};

mod library;
pub use library::Library;

mod notice;
pub use notice::{Notices, Toast};

mod notification;
pub use notification::{notify_reply, NotificationCounter};

mod order;
pub use order::OrderExt;

mod query;
pub use query::{episode_tags, FilterExt};

pub mod reaction;
pub use reaction::{ReactionState, ReactionStep, ReactionTally};

mod session;
pub use session::{ThreadCommand, ThreadHandle, ThreadSession, ThreadView};

mod tree;
pub use tree::{Branch, BranchKey, CommentTree, LoadTicket};

#[cfg(test)]
mod fuzz;

pub mod api {
    pub use vpr_api::*;
}

pub mod prelude {
    pub use crate::{FilterExt, OrderExt};
}
