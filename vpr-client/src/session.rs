use std::collections::{HashMap, HashSet};

use futures::{select, FutureExt};
use tokio::sync::{mpsc, watch};

use crate::{
    api::{ChangeEvent, ChangeFeed, CommentId, Emoji, RawChange, ReviewId, UserId},
    reaction, Branch, BranchKey, Client, CommentTree, ReactionTally,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ThreadCommand {
    LoadMore(BranchKey),
    ToggleOpen(CommentId),
    SetDraft(BranchKey, String),
    SubmitReply(BranchKey),
    React(CommentId, Emoji),
    SwitchReview(ReviewId),
    Close,
}

/// Snapshot of a thread, republished after every processed message
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadView {
    pub review: ReviewId,
    pub branches: HashMap<BranchKey, Branch>,
    pub open: HashSet<CommentId>,
    pub drafts: HashMap<BranchKey, String>,
    pub tallies: HashMap<CommentId, ReactionTally>,

    /// Number of commands and change events handled so far
    pub processed: u64,
}

impl ThreadView {
    fn empty(review: ReviewId) -> ThreadView {
        ThreadView {
            review,
            branches: HashMap::new(),
            open: HashSet::new(),
            drafts: HashMap::new(),
            tallies: HashMap::new(),
            processed: 0,
        }
    }

    pub fn comments(&self, key: BranchKey) -> &[crate::api::Comment] {
        self.branches
            .get(&key)
            .map(|b| &b.comments as &[_])
            .unwrap_or(&[])
    }

    pub fn has_more(&self, key: BranchKey) -> bool {
        self.branches.get(&key).map(|b| b.has_more).unwrap_or(false)
    }
}

enum Message {
    Command(Option<ThreadCommand>),
    Change(Option<RawChange>),
}

/// Owns the comment tree of one mounted thread. UI commands and realtime
/// changes go through the same loop, so they are handled one at a time.
pub struct ThreadSession {
    client: Client,
    tree: CommentTree,
    me: Option<UserId>,
    tallies: HashMap<CommentId, ReactionTally>,
    processed: u64,
    commands: mpsc::UnboundedReceiver<ThreadCommand>,
    feed: Option<ChangeFeed>,
    view: watch::Sender<ThreadView>,
}

pub struct ThreadHandle {
    commands: mpsc::UnboundedSender<ThreadCommand>,
    view: watch::Receiver<ThreadView>,
    task: tokio::task::JoinHandle<()>,
}

async fn recv_change(feed: &mut Option<ChangeFeed>) -> Option<RawChange> {
    match feed {
        Some(feed) => feed.recv().await,
        None => futures::future::pending().await,
    }
}

impl ThreadSession {
    /// Starts the session on the current tokio runtime. The root branch starts
    /// loading right away; the subscription is opened before it so that no
    /// change can fall between the two.
    pub fn spawn(client: Client, review: ReviewId) -> ThreadHandle {
        let (commands_sender, commands) = mpsc::unbounded_channel();
        let (view_sender, view) = watch::channel(ThreadView::empty(review));
        let page_size = client.config().page_size;
        let session = ThreadSession {
            client,
            tree: CommentTree::new(review, page_size),
            me: None,
            tallies: HashMap::new(),
            processed: 0,
            commands,
            feed: None,
            view: view_sender,
        };
        let task = tokio::spawn(session.run());
        ThreadHandle {
            commands: commands_sender,
            view,
            task,
        }
    }

    async fn run(mut self) {
        self.me = match self.client.backend().current_user().await {
            Ok(me) => me,
            Err(err) => {
                tracing::warn!(?err, "failed resolving current user, showing thread anonymously");
                None
            }
        };
        self.open_review().await;
        loop {
            let msg = {
                let commands = &mut self.commands;
                let feed = &mut self.feed;
                select! {
                    cmd = commands.recv().fuse() => Message::Command(cmd),
                    change = recv_change(feed).fuse() => Message::Change(change),
                }
            };
            match msg {
                Message::Command(None) | Message::Command(Some(ThreadCommand::Close)) => break,
                Message::Command(Some(cmd)) => self.handle_command(cmd).await,
                Message::Change(Some(raw)) => self.handle_change(raw).await,
                Message::Change(None) => {
                    tracing::info!(review = ?self.tree.review(), "comment feed closed");
                    self.feed = None;
                    continue;
                }
            }
            self.processed += 1;
            self.publish().await;
        }
        tracing::debug!(review = ?self.tree.review(), "thread session stopped");
    }

    async fn open_review(&mut self) {
        let review = self.tree.review();
        // the old feed, if any, is dropped before subscribing anew
        self.feed = None;
        self.feed = match self.client.backend().subscribe_comments(review).await {
            Ok(feed) => Some(feed),
            Err(err) => {
                tracing::error!(?err, ?review, "failed subscribing to comment changes");
                None
            }
        };
        self.tree.load(&self.client, BranchKey::Root, true).await;
        self.publish().await;
    }

    async fn handle_command(&mut self, cmd: ThreadCommand) {
        tracing::trace!(?cmd, "thread command");
        match cmd {
            ThreadCommand::LoadMore(key) => self.tree.load_more(&self.client, key).await,
            ThreadCommand::ToggleOpen(c) => self.tree.toggle_open(&self.client, c).await,
            ThreadCommand::SetDraft(key, text) => self.tree.set_draft(key, text),
            ThreadCommand::SubmitReply(key) => {
                self.tree.submit_reply(&self.client, key).await;
            }
            ThreadCommand::React(c, emoji) => {
                reaction::toggle(&self.client, c, emoji).await;
            }
            ThreadCommand::SwitchReview(review) => {
                if review != self.tree.review() {
                    self.tree.switch_review(review);
                    self.tallies.clear();
                    self.open_review().await;
                }
            }
            ThreadCommand::Close => (),
        }
    }

    async fn handle_change(&mut self, raw: RawChange) {
        let event = match ChangeEvent::decode(raw) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(?err, review = ?self.tree.review(), "ignoring malformed comment change");
                return;
            }
        };
        let key = BranchKey::from(event.affected_parent());
        tracing::debug!(op = ?event.op, ?key, "refreshing branch after comment change");
        self.tree.load(&self.client, key, true).await;
    }

    async fn refresh_tallies(&mut self) {
        let ids = self
            .tree
            .branches()
            .values()
            .flat_map(|b| b.comments.iter().map(|c| c.id))
            .collect::<Vec<_>>();
        match reaction::tally(&self.client, &ids, self.me).await {
            Ok(tallies) => self.tallies = tallies,
            Err(err) => {
                tracing::warn!(?err, review = ?self.tree.review(), "failed loading reaction tallies");
            }
        }
    }

    async fn publish(&mut self) {
        self.refresh_tallies().await;
        let view = ThreadView {
            review: self.tree.review(),
            branches: self.tree.branches().clone(),
            open: self.tree.open_branches().clone(),
            drafts: self.tree.drafts().clone(),
            tallies: self.tallies.clone(),
            processed: self.processed,
        };
        // no receiver left means the handle is gone, and the loop ends soon
        let _ = self.view.send(view);
    }
}

impl ThreadHandle {
    /// Queues a command. Returns false if the session already stopped.
    pub fn send(&self, cmd: ThreadCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    pub fn view(&self) -> ThreadView {
        self.view.borrow().clone()
    }

    /// Waits until the published view satisfies `pred`, and returns it.
    /// Returns `None` if the session stopped first.
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&ThreadView) -> bool) -> Option<ThreadView> {
        loop {
            {
                let view = self.view.borrow_and_update();
                if pred(&view) {
                    return Some(view.clone());
                }
            }
            if self.view.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Stops the session and waits for its subscription to be released
    pub async fn close(self) {
        let _ = self.commands.send(ThreadCommand::Close);
        if let Err(err) = self.task.await {
            tracing::error!(?err, "thread session task failed");
        }
    }
}
