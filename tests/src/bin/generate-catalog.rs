use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rand::{seq::SliceRandom, Rng};
use vpr_client::{
    api::{Collection, CollectionId, Episode, EpisodeId},
    Library,
};

const NUM_SEASONS: u32 = 10;
const MAX_EPISODES_PER_SEASON: u32 = 24;

const TITLE_WORDS: usize = 4;
const DESCRIPTION_WORDS: usize = 25;
const REVIEW_WORDS: usize = 40;

const NUM_COLLECTIONS: usize = 4;

// Phrases that trip the tag keyword patterns, sprinkled into descriptions
const FLAVOR: &[&str] = &[
    "Halloween costume party",
    "Jax shirtless again",
    "a tequila-fuelled rage text",
    "bachelorette weekend in Vegas",
    "the reunion",
];

fn gen_description(rng: &mut impl Rng) -> String {
    let mut res = lipsum::lipsum_words(DESCRIPTION_WORDS);
    if rng.gen_bool(0.2) {
        if let Some(flavor) = FLAVOR.choose(rng) {
            res.push(' ');
            res.push_str(flavor);
        }
    }
    res
}

fn main() {
    let mut rng = rand::thread_rng();
    let mut lib = Library::default();

    // Generate episodes
    for season in 1..=NUM_SEASONS {
        let episodes = rng.gen_range(8..=MAX_EPISODES_PER_SEASON);
        for episode in 1..=episodes {
            lib.episodes.push(Episode {
                id: EpisodeId::new(season, episode),
                season,
                episode,
                title: lipsum::lipsum_words(TITLE_WORDS),
                description: gen_description(&mut rng),
                tags: Vec::new(),
            });
        }
    }

    // Generate the viewer's personal data
    let start = Utc
        .with_ymd_and_hms(2023, 1, 1, 20, 0, 0)
        .single()
        .expect("valid start date");
    for e in &lib.episodes {
        if rng.gen_bool(0.5) {
            lib.ratings.insert(e.id.clone(), rng.gen_range(1..=5));
        }
        if rng.gen_bool(0.1) {
            lib.favorites.insert(e.id.clone());
        }
        if rng.gen_bool(0.2) {
            lib.reviews
                .insert(e.id.clone(), vec![lipsum::lipsum_words(REVIEW_WORDS)]);
        }
        if rng.gen_bool(0.6) {
            let watched = start + Duration::hours(rng.gen_range(0..24 * 365));
            lib.watched_at.insert(e.id.clone(), watched);
            let dates: Vec<NaiveDate> = vec![watched.naive_utc().date()];
            lib.watch_dates.insert(e.id.clone(), dates);
        }
    }

    // Generate collections, mixing manual picks and keywords
    for i in 0..NUM_COLLECTIONS {
        let episode_ids = lib
            .episodes
            .choose_multiple(&mut rng, 5)
            .map(|e| e.id.clone())
            .collect();
        let keywords = lipsum::lipsum_words(2)
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .collect();
        lib.collections.push(Collection {
            id: CollectionId(format!("collection-{i}")),
            name: lipsum::lipsum_words(3),
            keywords,
            episode_ids,
        });
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&lib).expect("serializing catalog")
    );
}
