#![cfg(test)]

use std::{panic::AssertUnwindSafe, sync::Arc};

use chrono::Utc;
use vpr_mock_server::MockServer;

use crate::{
    api::{Emoji, UserId, REVIEW_HEART},
    reaction::{self, ReactionState},
    toggle_review_heart, Client, ClientConfig, Notices,
};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                let _ = tracing_subscriber::fmt::try_init();
            }
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

fn client_for(server: &MockServer, user: UserId) -> Client {
    let (notices, _) = Notices::channel();
    Client::new(
        Arc::new(server.session(Some(user))),
        notices,
        ClientConfig::default(),
    )
}

fn emoji(upvote: bool) -> Emoji {
    match upvote {
        true => Emoji::Upvote,
        false => Emoji::Downvote,
    }
}

// Each step is (which of the two users acts, upvote or downvote)
do_tokio_test!(
    reaction_rows_follow_toggles,
    Vec<(bool, bool)>,
    |steps: Vec<(bool, bool)>| async move {
        let server = MockServer::new();
        let author = server.create_user("author");
        let other = server.create_user("other");
        let review = server.create_review(author);
        let comment = server
            .test_seed_comment(review, None, author, "root", Utc::now())
            .expect("seeding comment")
            .id;
        let users = [author, other];
        let clients = users.map(|u| client_for(&server, u));
        let mut expected: [ReactionState; 2] = [ReactionState::None; 2];

        for (who, upvote) in steps {
            let who = usize::from(who);
            let e = emoji(upvote);
            let (_, next) = expected[who].transition(e);
            let got = reaction::toggle(&clients[who], comment, e).await;
            assert_eq!(got, Some(next));
            expected[who] = next;

            for (i, u) in users.iter().enumerate() {
                let rows = server.test_reactions_of(comment, *u);
                assert!(rows.len() <= 1, "duplicate reaction rows: {rows:?}");
                assert!(rows.iter().all(|r| r.is_consistent()));
                assert_eq!(ReactionState::from_row(rows.first()), expected[i]);
            }
        }

        // the author never gets notified of their own upvotes
        assert!(server
            .test_notifications()
            .iter()
            .all(|n| n.actor_id == other && n.user_id == author));
    }
);

// Each step is which of the two users toggles their heart
do_tokio_test!(
    review_hearts_follow_toggles,
    Vec<bool>,
    |steps: Vec<bool>| async move {
        let server = MockServer::new();
        let owner = server.create_user("owner");
        let other = server.create_user("other");
        let review = server.create_review(owner);
        let users = [owner, other];
        let clients = users.map(|u| client_for(&server, u));
        let mut hearted = [false; 2];
        let mut expected_notifs = 0;

        for who in steps {
            let who = usize::from(who);
            let got = toggle_review_heart(&clients[who], review).await;
            hearted[who] = !hearted[who];
            let expected = match hearted[who] {
                true => ReactionState::Voted(String::from(REVIEW_HEART)),
                false => ReactionState::None,
            };
            assert_eq!(got, Some(expected));
            if hearted[who] && users[who] != owner {
                expected_notifs += 1;
            }

            for (i, u) in users.iter().enumerate() {
                let rows = server.test_review_reactions_of(review, *u);
                assert_eq!(rows.len(), usize::from(hearted[i]));
                assert!(rows.iter().all(|r| r.is_heart() && r.value == 1));
            }
        }
        assert_eq!(server.test_notifications().len(), expected_notifs);
    }
);
