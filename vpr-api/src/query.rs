use chrono::NaiveDate;

use crate::CollectionId;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchIn {
    #[default]
    All,
    Title,
    Description,
    Reviews,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    SeasonAsc,
    SeasonDesc,
    RatingDesc,
    RatingAsc,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagToggle {
    Costumes,
    JaxShirtOff,
    TequilaKatie,
    Vegas,
    Reunion,
}

impl TagToggle {
    pub const ALL: [TagToggle; 5] = [
        TagToggle::Costumes,
        TagToggle::JaxShirtOff,
        TagToggle::TequilaKatie,
        TagToggle::Vegas,
        TagToggle::Reunion,
    ];

    /// Explicit catalog tags that mark an episode with this toggle
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            TagToggle::Costumes => &["costumes"],
            TagToggle::JaxShirtOff => &["jaxshirtoff", "jax_shirt_off", "jax-shirt-off"],
            TagToggle::TequilaKatie => &["tequilakatie", "tequila_katie", "tequila-katie"],
            TagToggle::Vegas => &["vegas"],
            TagToggle::Reunion => &["reunion"],
        }
    }
}

/// Browsing state for the episode list. `Default` is the reset state.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct EpisodeFilter {
    pub collection: Option<CollectionId>,
    pub query: String,
    pub search_in: SearchIn,
    pub season: Option<u32>,
    pub min_rating: u8,
    pub only_favorites: bool,
    pub only_rated: bool,
    pub only_watched: bool,
    pub only_unwatched: bool,
    pub hide_watched: bool,
    pub watch_date: Option<NaiveDate>,
    pub tags: Vec<TagToggle>,
    pub sort: SortKey,
}
