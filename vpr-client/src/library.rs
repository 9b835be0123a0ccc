use std::{
    collections::{BTreeSet, HashMap, HashSet},
    path::Path,
};

use anyhow::Context;
use chrono::NaiveDate;

use crate::{
    api::{Collection, CollectionId, Episode, EpisodeFilter, EpisodeId, Time},
    FilterExt, OrderExt,
};

/// The episode catalog along with one viewer's personal data about it
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Library {
    pub episodes: Vec<Episode>,
    pub collections: Vec<Collection>,

    /// Personal star rating, 1 to 5. Absent means unrated.
    pub ratings: HashMap<EpisodeId, u8>,
    pub favorites: HashSet<EpisodeId>,

    /// Text of the viewer's reviews, per episode
    pub reviews: HashMap<EpisodeId, Vec<String>>,

    pub watched_at: HashMap<EpisodeId, Time>,
    pub watch_dates: HashMap<EpisodeId, Vec<NaiveDate>>,
}

impl Library {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Library> {
        let data =
            std::fs::read(path).with_context(|| format!("reading catalog {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parsing catalog {}", path.display()))
    }

    pub fn collection(&self, id: &CollectionId) -> Option<&Collection> {
        self.collections.iter().find(|c| &c.id == id)
    }

    pub fn rating(&self, ep: &EpisodeId) -> u8 {
        self.ratings.get(ep).copied().unwrap_or(0)
    }

    pub fn is_favorite(&self, ep: &EpisodeId) -> bool {
        self.favorites.contains(ep)
    }

    pub fn is_watched(&self, ep: &EpisodeId) -> bool {
        self.watched_at.contains_key(ep)
    }

    pub fn reviews_of(&self, ep: &EpisodeId) -> &[String] {
        self.reviews.get(ep).map(|r| r as &[String]).unwrap_or(&[])
    }

    pub fn watch_dates_of(&self, ep: &EpisodeId) -> &[NaiveDate] {
        self.watch_dates
            .get(ep)
            .map(|d| d as &[NaiveDate])
            .unwrap_or(&[])
    }

    /// Distinct seasons present in the catalog, in increasing order
    pub fn season_options(&self) -> Vec<u32> {
        self.episodes
            .iter()
            .map(|e| e.season)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Narrows the catalog to the filter's collection, applies the other
    /// predicates, then sorts. Deterministic for a given library and filter.
    pub fn browse(&self, filter: &EpisodeFilter) -> Vec<Episode> {
        let mut res = self
            .episodes
            .iter()
            .filter(|e| filter.admits(self, e))
            .filter(|e| filter.matches(self, e))
            .cloned()
            .collect::<Vec<_>>();
        filter.sort.sort(self, &mut res);
        tracing::trace!(
            total = self.episodes.len(),
            shown = res.len(),
            "browsed episodes"
        );
        res
    }
}
