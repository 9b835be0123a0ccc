use std::collections::{hash_map, HashMap, HashSet};

use crate::{
    api::{Comment, CommentId, NewComment, ReviewId},
    Client,
};

/// Identifies one branch of a review's comment tree: its root level, or the
/// replies to one comment
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BranchKey {
    Root,
    Replies(CommentId),
}

impl BranchKey {
    pub fn parent(self) -> Option<CommentId> {
        match self {
            BranchKey::Root => None,
            BranchKey::Replies(c) => Some(c),
        }
    }
}

impl From<Option<CommentId>> for BranchKey {
    fn from(parent: Option<CommentId>) -> BranchKey {
        match parent {
            None => BranchKey::Root,
            Some(c) => BranchKey::Replies(c),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Branch {
    /// Oldest first, in backend order
    pub comments: Vec<Comment>,
    pub has_more: bool,
}

/// A load in flight. Pages are only applied if the ticket is still current
/// when they come back.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoadTicket {
    pub key: BranchKey,
    pub offset: usize,
    pub reset: bool,
    generation: u64,
}

/// Client-side cache of one review's comment tree, paginated per branch
#[derive(Clone, Debug)]
pub struct CommentTree {
    review: ReviewId,
    page_size: usize,
    branches: HashMap<BranchKey, Branch>,
    open: HashSet<CommentId>,
    drafts: HashMap<BranchKey, String>,

    // bumped on every reset-load, never cleared so that responses to loads
    // issued before a review switch stay stale
    generations: HashMap<BranchKey, u64>,
}

impl CommentTree {
    pub fn new(review: ReviewId, page_size: usize) -> CommentTree {
        CommentTree {
            review,
            page_size: std::cmp::max(1, page_size),
            branches: HashMap::new(),
            open: HashSet::new(),
            drafts: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    pub fn review(&self) -> ReviewId {
        self.review
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn branch(&self, key: BranchKey) -> Option<&Branch> {
        self.branches.get(&key)
    }

    pub fn branches(&self) -> &HashMap<BranchKey, Branch> {
        &self.branches
    }

    pub fn comments(&self, key: BranchKey) -> &[Comment] {
        self.branches
            .get(&key)
            .map(|b| &b.comments as &[Comment])
            .unwrap_or(&[])
    }

    pub fn has_more(&self, key: BranchKey) -> bool {
        self.branches.get(&key).map(|b| b.has_more).unwrap_or(false)
    }

    pub fn is_loaded(&self, key: BranchKey) -> bool {
        self.branches.contains_key(&key)
    }

    pub fn is_open(&self, comment: CommentId) -> bool {
        self.open.contains(&comment)
    }

    pub fn open_branches(&self) -> &HashSet<CommentId> {
        &self.open
    }

    pub fn draft(&self, key: BranchKey) -> &str {
        self.drafts.get(&key).map(|d| d as &str).unwrap_or("")
    }

    pub fn drafts(&self) -> &HashMap<BranchKey, String> {
        &self.drafts
    }

    pub fn set_draft(&mut self, key: BranchKey, text: String) {
        self.drafts.insert(key, text);
    }

    /// Switch to another review, forgetting every branch, expansion flag and
    /// draft. The caller is expected to load the root branch afterwards.
    pub fn switch_review(&mut self, review: ReviewId) {
        self.review = review;
        self.branches.clear();
        self.open.clear();
        self.drafts.clear();
        for g in self.generations.values_mut() {
            *g += 1;
        }
    }

    pub fn plan_load(&mut self, key: BranchKey, reset: bool) -> LoadTicket {
        let offset = match reset {
            true => 0,
            false => self.comments(key).len(),
        };
        let generation = self.generations.entry(key).or_insert(0);
        if reset {
            *generation += 1;
        }
        LoadTicket {
            key,
            offset,
            reset,
            generation: *generation,
        }
    }

    /// Applies a fetched page, which may hold one row more than the page size
    /// to signal that more rows are available. Returns false if the ticket was
    /// superseded in the meantime and the page got discarded.
    pub fn apply_page(&mut self, ticket: LoadTicket, mut rows: Vec<Comment>) -> bool {
        let current = self.generations.get(&ticket.key).copied().unwrap_or(0);
        if ticket.generation != current {
            tracing::debug!(?ticket, current, "discarding page from superseded load");
            return false;
        }
        if !ticket.reset && self.comments(ticket.key).len() != ticket.offset {
            tracing::debug!(?ticket, "discarding page that no longer lines up");
            return false;
        }
        let has_more = rows.len() > self.page_size;
        rows.truncate(self.page_size);
        match self.branches.entry(ticket.key) {
            hash_map::Entry::Vacant(e) => {
                e.insert(Branch {
                    comments: rows,
                    has_more,
                });
            }
            hash_map::Entry::Occupied(mut e) => {
                let branch = e.get_mut();
                if ticket.reset {
                    branch.comments = rows;
                } else {
                    branch.comments.extend(rows);
                }
                branch.has_more = has_more;
            }
        }
        true
    }

    /// Fetches the next page of `key` (or its first page if `reset`). Failures
    /// are logged and leave the branch as it was.
    pub async fn load(&mut self, client: &Client, key: BranchKey, reset: bool) {
        let ticket = self.plan_load(key, reset);
        // one extra row tells whether another page exists
        let end = ticket.offset.saturating_add(self.page_size).saturating_add(1);
        let range = ticket.offset..end;
        match client
            .backend()
            .fetch_comments(self.review, key.parent(), range)
            .await
        {
            Ok(rows) => {
                self.apply_page(ticket, rows);
            }
            Err(err) => {
                tracing::error!(?err, review = ?self.review, ?key, "failed loading comments");
            }
        }
    }

    pub async fn ensure_loaded(&mut self, client: &Client, key: BranchKey) {
        if !self.is_loaded(key) {
            self.load(client, key, true).await;
        }
    }

    pub async fn load_more(&mut self, client: &Client, key: BranchKey) {
        if self.has_more(key) {
            self.load(client, key, false).await;
        }
    }

    pub async fn toggle_open(&mut self, client: &Client, comment: CommentId) {
        if !self.open.remove(&comment) {
            self.open.insert(comment);
            self.ensure_loaded(client, BranchKey::Replies(comment))
                .await;
        }
    }

    /// Posts the draft of `key` as a new comment. Returns the inserted comment,
    /// or `None` if nothing was posted (blank draft, not logged in, or backend
    /// rejection, the latter two having been reported to the user).
    pub async fn submit_reply(&mut self, client: &Client, key: BranchKey) -> Option<Comment> {
        let text = match crate::api::clean_text(self.draft(key)) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(?err, ?key, "not submitting reply");
                return None;
            }
        };
        let me = client.require_auth().await?;
        let inserted = client
            .backend()
            .insert_comment(NewComment {
                review_id: self.review,
                parent_id: key.parent(),
                author_id: me,
                text,
            })
            .await;
        let comment = match inserted {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(?err, review = ?self.review, ?key, "failed posting comment");
                client.notices().push("Could not post comment");
                return None;
            }
        };
        self.drafts.remove(&key);
        self.load(client, key, true).await;
        crate::notify_reply(client, me, &comment).await;
        Some(comment)
    }

    pub async fn submit_reply_text(
        &mut self,
        client: &Client,
        key: BranchKey,
        text: String,
    ) -> Option<Comment> {
        self.set_draft(key, text);
        self.submit_reply(client, key).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;
    use vpr_mock_server::{MockOp, MockServer};

    use super::*;
    use crate::{
        api::{Error, Time, UserId, Uuid},
        ClientConfig, Notices, Toast,
    };

    fn at(secs: i64) -> Time {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    struct Fixture {
        server: MockServer,
        alice: UserId,
        review: ReviewId,
        client: Client,
        toasts: mpsc::UnboundedReceiver<Toast>,
    }

    fn fixture() -> Fixture {
        let server = MockServer::new();
        let alice = server.create_user("alice");
        let review = server.create_review(alice);
        let (notices, toasts) = Notices::channel();
        let client = Client::new(
            Arc::new(server.session(Some(alice))),
            notices,
            ClientConfig::default(),
        );
        Fixture {
            server,
            alice,
            review,
            client,
            toasts,
        }
    }

    fn seed(f: &Fixture, parent: Option<CommentId>, n: i64) -> Vec<Comment> {
        (1..=n)
            .map(|i| {
                f.server
                    .test_seed_comment(f.review, parent, f.alice, &format!("comment {i}"), at(i))
                    .unwrap()
            })
            .collect()
    }

    fn texts(tree: &CommentTree, key: BranchKey) -> Vec<String> {
        tree.comments(key).iter().map(|c| c.text.clone()).collect()
    }

    #[tokio::test]
    async fn twenty_five_roots_paginate_in_two_pages() {
        let f = fixture();
        let seeded = seed(&f, None, 25);
        let mut tree = CommentTree::new(f.review, 20);

        tree.load(&f.client, BranchKey::Root, true).await;
        assert_eq!(tree.comments(BranchKey::Root), &seeded[..20]);
        assert!(tree.has_more(BranchKey::Root));

        tree.load_more(&f.client, BranchKey::Root).await;
        assert_eq!(tree.comments(BranchKey::Root), &seeded[..]);
        assert!(!tree.has_more(BranchKey::Root));

        let ids = tree
            .comments(BranchKey::Root)
            .iter()
            .map(|c| c.id)
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 25);
        assert!(tree
            .comments(BranchKey::Root)
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn short_branch_has_no_more() {
        let f = fixture();
        seed(&f, None, 19);
        let mut tree = CommentTree::new(f.review, 20);
        tree.load(&f.client, BranchKey::Root, true).await;
        assert_eq!(tree.comments(BranchKey::Root).len(), 19);
        assert!(!tree.has_more(BranchKey::Root));
    }

    #[tokio::test]
    async fn page_size_plus_one_needs_two_loads() {
        let f = fixture();
        seed(&f, None, 21);
        let mut tree = CommentTree::new(f.review, 20);
        tree.load(&f.client, BranchKey::Root, true).await;
        assert!(tree.has_more(BranchKey::Root));
        tree.load(&f.client, BranchKey::Root, false).await;
        assert!(!tree.has_more(BranchKey::Root));
        assert_eq!(tree.comments(BranchKey::Root).len(), 21);
    }

    #[tokio::test]
    async fn empty_branch() {
        let f = fixture();
        let mut tree = CommentTree::new(f.review, 20);
        tree.load(&f.client, BranchKey::Root, true).await;
        assert!(tree.is_loaded(BranchKey::Root));
        assert!(tree.comments(BranchKey::Root).is_empty());
        assert!(!tree.has_more(BranchKey::Root));

        // load_more is gated on has_more
        tree.load_more(&f.client, BranchKey::Root).await;
        assert!(tree.comments(BranchKey::Root).is_empty());
    }

    #[tokio::test]
    async fn ensure_loaded_only_loads_once() {
        let f = fixture();
        seed(&f, None, 2);
        let mut tree = CommentTree::new(f.review, 20);
        tree.ensure_loaded(&f.client, BranchKey::Root).await;
        assert_eq!(tree.comments(BranchKey::Root).len(), 2);

        seed(&f, None, 1);
        tree.ensure_loaded(&f.client, BranchKey::Root).await;
        assert_eq!(tree.comments(BranchKey::Root).len(), 2);
    }

    #[tokio::test]
    async fn toggle_open_loads_replies_on_first_expand() {
        let f = fixture();
        let root = seed(&f, None, 1).remove(0);
        seed(&f, Some(root.id), 3);
        let mut tree = CommentTree::new(f.review, 20);
        let replies = BranchKey::Replies(root.id);

        tree.toggle_open(&f.client, root.id).await;
        assert!(tree.is_open(root.id));
        assert_eq!(tree.comments(replies).len(), 3);

        tree.toggle_open(&f.client, root.id).await;
        assert!(!tree.is_open(root.id));
        // collapsing keeps the cache
        assert_eq!(tree.comments(replies).len(), 3);
    }

    #[tokio::test]
    async fn submit_reply_trims_and_refreshes_branch() {
        let mut f = fixture();
        let root = seed(&f, None, 1).remove(0);
        let mut tree = CommentTree::new(f.review, 20);
        let key = BranchKey::Replies(root.id);

        // parent never loaded locally
        let posted = tree
            .submit_reply_text(&f.client, key, String::from("  nice one \n"))
            .await
            .unwrap();
        assert_eq!(posted.parent_id, Some(root.id));
        assert_eq!(posted.text, "nice one");
        assert_eq!(tree.comments(key), &[posted]);
        assert_eq!(tree.draft(key), "");
        assert!(f.toasts.try_recv().is_err());
    }

    #[tokio::test]
    async fn blank_reply_does_nothing() {
        let mut f = fixture();
        seed(&f, None, 2);
        let mut tree = CommentTree::new(f.review, 20);
        tree.load(&f.client, BranchKey::Root, true).await;
        let before = tree.comments(BranchKey::Root).to_vec();

        // any backend call would fail and show up as a toast
        f.server
            .fail_next(MockOp::CurrentUser, Error::Network(String::from("down")));
        let res = tree
            .submit_reply_text(&f.client, BranchKey::Root, String::from(" \t "))
            .await;
        assert_eq!(res, None);
        assert_eq!(f.server.test_num_comments(), 2);
        assert_eq!(tree.comments(BranchKey::Root), &before[..]);
        assert!(f.toasts.try_recv().is_err());
    }

    #[tokio::test]
    async fn huge_page_size_loads_everything() {
        let f = fixture();
        seed(&f, None, 3);
        let mut tree = CommentTree::new(f.review, usize::MAX);
        tree.load(&f.client, BranchKey::Root, true).await;
        assert_eq!(tree.comments(BranchKey::Root).len(), 3);
        assert!(!tree.has_more(BranchKey::Root));

        tree.load_more(&f.client, BranchKey::Root).await;
        assert_eq!(tree.comments(BranchKey::Root).len(), 3);
    }

    #[tokio::test]
    async fn rejected_reply_keeps_draft_and_toasts() {
        let mut f = fixture();
        let mut tree = CommentTree::new(f.review, 20);
        f.server
            .fail_next(MockOp::InsertComment, Error::PermissionDenied);
        let res = tree
            .submit_reply_text(&f.client, BranchKey::Root, String::from("hello"))
            .await;
        assert_eq!(res, None);
        assert_eq!(tree.draft(BranchKey::Root), "hello");
        assert_eq!(f.toasts.try_recv().unwrap().message, "Could not post comment");
        assert_eq!(f.server.test_num_comments(), 0);
    }

    #[tokio::test]
    async fn anonymous_reply_is_refused() {
        let f = fixture();
        let (notices, mut toasts) = Notices::channel();
        let anon = Client::new(
            Arc::new(f.server.session(None)),
            notices,
            ClientConfig::default(),
        );
        let mut tree = CommentTree::new(f.review, 20);
        let res = tree
            .submit_reply_text(&anon, BranchKey::Root, String::from("hello"))
            .await;
        assert_eq!(res, None);
        assert_eq!(toasts.try_recv().unwrap().message, "Please log in first.");
        assert_eq!(f.server.test_num_comments(), 0);
    }

    #[tokio::test]
    async fn failed_load_leaves_branch_untouched() {
        let f = fixture();
        seed(&f, None, 21);
        let mut tree = CommentTree::new(f.review, 20);
        tree.load(&f.client, BranchKey::Root, true).await;
        f.server
            .fail_next(MockOp::FetchComments, Error::Network(String::from("down")));
        tree.load_more(&f.client, BranchKey::Root).await;
        assert_eq!(tree.comments(BranchKey::Root).len(), 20);
        assert!(tree.has_more(BranchKey::Root));
    }

    fn fake_comment(review: ReviewId, i: i64) -> Comment {
        Comment {
            id: CommentId(Uuid::new_v4()),
            review_id: review,
            parent_id: None,
            author_id: UserId::stub(),
            text: format!("fake {i}"),
            created_at: at(i),
        }
    }

    #[test]
    fn stale_append_after_reset_is_discarded() {
        let review = ReviewId(Uuid::new_v4());
        let mut tree = CommentTree::new(review, 2);
        let first = tree.plan_load(BranchKey::Root, true);
        assert!(tree.apply_page(
            first,
            (1..=3).map(|i| fake_comment(review, i)).collect()
        ));
        assert!(tree.has_more(BranchKey::Root));

        // a load-more goes out, then a realtime reset overtakes it
        let more = tree.plan_load(BranchKey::Root, false);
        assert_eq!(more.offset, 2);
        let reset = tree.plan_load(BranchKey::Root, true);
        let fresh = (10..=11).map(|i| fake_comment(review, i)).collect::<Vec<_>>();
        assert!(tree.apply_page(reset, fresh.clone()));
        assert!(!tree.apply_page(more, vec![fake_comment(review, 3)]));
        assert_eq!(tree.comments(BranchKey::Root), &fresh[..]);
        assert!(!tree.has_more(BranchKey::Root));
    }

    #[test]
    fn duplicate_load_more_is_discarded() {
        let review = ReviewId(Uuid::new_v4());
        let mut tree = CommentTree::new(review, 1);
        let first = tree.plan_load(BranchKey::Root, true);
        tree.apply_page(first, vec![fake_comment(review, 1), fake_comment(review, 2)]);
        let a = tree.plan_load(BranchKey::Root, false);
        let b = tree.plan_load(BranchKey::Root, false);
        assert!(tree.apply_page(a, vec![fake_comment(review, 2)]));
        assert!(!tree.apply_page(b, vec![fake_comment(review, 2)]));
        assert_eq!(tree.comments(BranchKey::Root).len(), 2);
    }

    #[test]
    fn switching_review_clears_everything() {
        let review = ReviewId(Uuid::new_v4());
        let mut tree = CommentTree::new(review, 20);
        let c = fake_comment(review, 1);
        let ticket = tree.plan_load(BranchKey::Root, true);
        tree.apply_page(ticket, vec![c.clone()]);
        let pending = tree.plan_load(BranchKey::Replies(c.id), true);
        tree.set_draft(BranchKey::Root, String::from("draft"));
        tree.open.insert(c.id);

        let other = ReviewId(Uuid::new_v4());
        tree.switch_review(other);
        assert_eq!(tree.review(), other);
        assert!(tree.branches().is_empty());
        assert!(tree.open_branches().is_empty());
        assert_eq!(tree.draft(BranchKey::Root), "");
        assert!(!tree.apply_page(pending, vec![]));
    }
}
