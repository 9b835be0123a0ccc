use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use chrono::{NaiveDate, TimeZone, Utc};
use vpr_client::{
    api::{CollectionId, Emoji, EpisodeFilter, NewComment, SearchIn, SortKey, TagToggle, UserId},
    reaction, toggle_review_heart, BranchKey, Client, ClientConfig, HeartCounter, Library,
    Notices, NotificationCounter, ThreadCommand, ThreadHandle, ThreadSession, ThreadView,
};
use vpr_mock_server::MockServer;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Client configuration (JSON), defaults apply when absent
    #[structopt(long, env = "VPR_CONFIG", parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Filter and sort the episodes of a catalog
    Browse {
        /// Catalog file (JSON)
        #[structopt(long, env = "VPR_CATALOG", parse(from_os_str))]
        catalog: PathBuf,

        /// Read the whole filter from a JSON file instead of the flags below
        #[structopt(long, parse(from_os_str))]
        filter: Option<PathBuf>,

        #[structopt(long)]
        collection: Option<String>,

        #[structopt(short, long)]
        query: Option<String>,

        /// all, title, description or reviews
        #[structopt(long, default_value = "all", parse(try_from_str = parse_kebab))]
        search_in: SearchIn,

        #[structopt(long)]
        season: Option<u32>,

        #[structopt(long, default_value = "0")]
        min_rating: u8,

        #[structopt(long)]
        only_favorites: bool,

        #[structopt(long)]
        only_rated: bool,

        #[structopt(long)]
        only_watched: bool,

        #[structopt(long)]
        only_unwatched: bool,

        #[structopt(long)]
        hide_watched: bool,

        /// YYYY-MM-DD
        #[structopt(long)]
        watch_date: Option<NaiveDate>,

        /// costumes, jax-shirt-off, tequila-katie, vegas or reunion
        #[structopt(long = "tag", parse(try_from_str = parse_kebab))]
        tags: Vec<TagToggle>,

        /// season-asc, season-desc, rating-desc or rating-asc
        #[structopt(long, default_value = "season-asc", parse(try_from_str = parse_kebab))]
        sort: SortKey,
    },

    /// List the seasons present in a catalog
    Seasons {
        #[structopt(long, env = "VPR_CATALOG", parse(from_os_str))]
        catalog: PathBuf,
    },

    /// Run a scripted comment thread against the in-memory backend
    Demo {
        /// Root comments to seed
        #[structopt(long, default_value = "25")]
        comments: usize,
    },
}

fn parse_kebab<T: serde::de::DeserializeOwned>(s: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(String::from(s)))
        .with_context(|| format!("unknown value {s:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let config = match &opt.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };

    match opt.cmd {
        Command::Browse {
            catalog,
            filter,
            collection,
            query,
            search_in,
            season,
            min_rating,
            only_favorites,
            only_rated,
            only_watched,
            only_unwatched,
            hide_watched,
            watch_date,
            tags,
            sort,
        } => {
            let lib = Library::from_json_file(&catalog)?;
            let filter = match filter {
                Some(path) => {
                    let data = std::fs::read(&path)
                        .with_context(|| format!("reading filter {}", path.display()))?;
                    serde_json::from_slice(&data)
                        .with_context(|| format!("parsing filter {}", path.display()))?
                }
                None => EpisodeFilter {
                    collection: collection.map(CollectionId),
                    query: query.unwrap_or_default(),
                    search_in,
                    season,
                    min_rating,
                    only_favorites,
                    only_rated,
                    only_watched,
                    only_unwatched,
                    hide_watched,
                    watch_date,
                    tags,
                    sort,
                },
            };
            for e in lib.browse(&filter) {
                let stars = match lib.rating(&e.id) {
                    0 => String::from("-"),
                    r => "*".repeat(usize::from(r)),
                };
                println!("{:<8} {:<6} {}", e.id.0, stars, e.title);
            }
        }
        Command::Seasons { catalog } => {
            let lib = Library::from_json_file(&catalog)?;
            for s in lib.season_options() {
                println!("{s}");
            }
        }
        Command::Demo { comments } => demo(config, comments).await?,
    }

    Ok(())
}

fn client_for(server: &MockServer, user: UserId, config: &ClientConfig) -> Client {
    let (notices, mut toasts) = Notices::channel();
    tokio::spawn(async move {
        while let Some(t) = toasts.recv().await {
            println!("[toast] {}", t.message);
        }
    });
    Client::new(
        Arc::new(server.session(Some(user))),
        notices,
        config.clone(),
    )
}

async fn wait(
    handle: &mut ThreadHandle,
    pred: impl FnMut(&ThreadView) -> bool,
) -> anyhow::Result<ThreadView> {
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for(pred))
        .await
        .context("timed out waiting for the thread to update")?
        .ok_or_else(|| anyhow!("thread session stopped unexpectedly"))
}

fn print_branch(view: &ThreadView, key: BranchKey) {
    let comments = view.comments(key);
    println!(
        "{key:?}: {} comment(s), more available: {}",
        comments.len(),
        view.has_more(key)
    );
    for c in comments {
        let score = view.tallies.get(&c.id).map(|t| t.score).unwrap_or(0);
        println!("  [{score:+}] {}", c.text);
    }
}

async fn demo(config: ClientConfig, comments: usize) -> anyhow::Result<()> {
    let server = MockServer::new();
    let alice = server.create_user("alice");
    let bob = server.create_user("bob");
    let review = server.create_review(alice);
    for i in 0..comments {
        let at = Utc
            .timestamp_opt(1_600_000_000 + i as i64, 0)
            .single()
            .context("building seed timestamp")?;
        server
            .test_seed_comment(review, None, alice, &format!("comment #{}", i + 1), at)
            .context("seeding comment")?;
    }

    let alice_client = client_for(&server, alice, &config);
    let bob_client = client_for(&server, bob, &config);
    let mut counter = NotificationCounter::open(&alice_client, alice, Utc::now()).await;

    let mut hearts = HeartCounter::open(&alice_client, review, Some(alice)).await;

    let mut thread = ThreadSession::spawn(alice_client.clone(), review);
    let view = wait(&mut thread, |v| v.branches.contains_key(&BranchKey::Root)).await?;
    print_branch(&view, BranchKey::Root);

    if view.has_more(BranchKey::Root) {
        let shown = view.comments(BranchKey::Root).len();
        thread.send(ThreadCommand::LoadMore(BranchKey::Root));
        let view = wait(&mut thread, |v| v.comments(BranchKey::Root).len() > shown).await?;
        print_branch(&view, BranchKey::Root);
    }

    let first = match view.comments(BranchKey::Root).first() {
        Some(c) => c.clone(),
        None => {
            println!("no comments to reply to");
            thread.close().await;
            return Ok(());
        }
    };
    thread.send(ThreadCommand::ToggleOpen(first.id));

    // bob replies and upvotes from a second session, alice's thread follows along
    let reply = bob_client
        .backend()
        .insert_comment(NewComment {
            review_id: review,
            parent_id: Some(first.id),
            author_id: bob,
            text: String::from("totally agree"),
        })
        .await
        .context("posting bob's reply")?;
    vpr_client::notify_reply(&bob_client, bob, &reply).await;
    reaction::toggle(&bob_client, first.id, Emoji::Upvote).await;

    let replies = BranchKey::Replies(first.id);
    let view = wait(&mut thread, |v| !v.comments(replies).is_empty()).await?;
    print_branch(&view, replies);

    // alice reacts through the thread session, which refreshes the tallies
    thread.send(ThreadCommand::React(first.id, Emoji::Upvote));
    let view = wait(&mut thread, |v| {
        v.tallies.get(&first.id).map(|t| t.upvotes) == Some(2)
    })
    .await?;
    print_branch(&view, BranchKey::Root);

    // bob also hearts the review itself
    toggle_review_heart(&bob_client, review).await;
    if let Some(t) = hearts.next(&alice_client).await {
        println!("review hearts: {}", t.hearts);
    }

    for _ in 0..3 {
        if let Some(n) = counter.next(&alice_client).await {
            println!("notification: {:?} from {:?}", n.kind, n.actor_id);
        }
    }
    println!("alice has {} unseen notification(s)", counter.unseen());

    thread.close().await;
    tracing::info!("demo finished");
    Ok(())
}
