#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct EpisodeId(pub String);

impl EpisodeId {
    pub fn new(season: u32, episode: u32) -> EpisodeId {
        EpisodeId(format!("S{season}E{episode}"))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub description: String,

    /// Explicit tags from the catalog, matched case-insensitively
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CollectionId(pub String);

/// A user-defined episode collection: manual members plus keyword matches
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub episode_ids: Vec<EpisodeId>,
}
