use std::collections::BTreeSet;

use regex::Regex;

use crate::{
    api::{Episode, EpisodeFilter, SearchIn, TagToggle},
    Library,
};

lazy_static::lazy_static! {
    static ref COSTUMES: Regex =
        Regex::new("costume|halloween|surlesque|burlesque|dress|wig").expect("valid regex");
    static ref JAX_SHIRT_OFF: Regex =
        Regex::new("jax[^a-z]*shirt|shirtless|abs").expect("valid regex");
    static ref TEQUILA_KATIE: Regex =
        Regex::new("tequila|katie rant|rage[- ]text|rage text").expect("valid regex");
    static ref VEGAS: Regex =
        Regex::new("vegas|sin city|bachelor|bachelorette").expect("valid regex");
    static ref REUNION: Regex = Regex::new("reunion").expect("valid regex");
}

fn keyword_pattern(tag: TagToggle) -> &'static Regex {
    match tag {
        TagToggle::Costumes => &COSTUMES,
        TagToggle::JaxShirtOff => &JAX_SHIRT_OFF,
        TagToggle::TequilaKatie => &TEQUILA_KATIE,
        TagToggle::Vegas => &VEGAS,
        TagToggle::Reunion => &REUNION,
    }
}

/// Tags an episode carries, either explicitly in the catalog or guessed from
/// its title and description
pub fn episode_tags(ep: &Episode) -> BTreeSet<TagToggle> {
    let explicit = ep
        .tags
        .iter()
        .map(|t| t.to_lowercase())
        .collect::<BTreeSet<_>>();
    let text = format!("{} {}", ep.title, ep.description).to_lowercase();
    TagToggle::ALL
        .iter()
        .copied()
        .filter(|tag| {
            tag.aliases().iter().any(|a| explicit.contains(*a))
                || keyword_pattern(*tag).is_match(&text)
        })
        .collect()
}

pub trait FilterExt {
    /// Whether the selected collection, if any, admits `ep`
    fn admits(&self, lib: &Library, ep: &Episode) -> bool;

    /// Every other predicate of the filter
    fn matches(&self, lib: &Library, ep: &Episode) -> bool;
}

impl FilterExt for EpisodeFilter {
    fn admits(&self, lib: &Library, ep: &Episode) -> bool {
        let collection = match self.collection.as_ref().and_then(|c| lib.collection(c)) {
            None => return true,
            Some(c) => c,
        };
        if collection.episode_ids.contains(&ep.id) {
            return true;
        }
        let text = format!("{} {}", ep.title, ep.description).to_lowercase();
        collection
            .keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty())
            .any(|k| text.contains(&k))
    }

    fn matches(&self, lib: &Library, ep: &Episode) -> bool {
        if self.season.map(|s| s != ep.season).unwrap_or(false) {
            return false;
        }
        if self.only_favorites && !lib.is_favorite(&ep.id) {
            return false;
        }
        let rating = lib.rating(&ep.id);
        if self.only_rated && rating == 0 {
            return false;
        }
        if self.min_rating > 0 && rating < self.min_rating {
            return false;
        }

        let watched = lib.is_watched(&ep.id);
        if (self.only_watched && !watched)
            || (self.only_unwatched && watched)
            || (self.hide_watched && watched)
        {
            return false;
        }
        if let Some(date) = self.watch_date {
            if !lib.watch_dates_of(&ep.id).contains(&date) {
                return false;
            }
        }

        let q = self.query.to_lowercase();
        if !q.is_empty() {
            let in_title = || ep.title.to_lowercase().contains(&q);
            let in_description = || ep.description.to_lowercase().contains(&q);
            let in_reviews = || {
                lib.reviews_of(&ep.id)
                    .iter()
                    .any(|r| r.to_lowercase().contains(&q))
            };
            let found = match self.search_in {
                SearchIn::All => in_title() || in_description() || in_reviews(),
                SearchIn::Title => in_title(),
                SearchIn::Description => in_description(),
                SearchIn::Reviews => in_reviews(),
            };
            if !found {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let tags = episode_tags(ep);
            if !self.tags.iter().all(|t| tags.contains(t)) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EpisodeId;

    fn ep(title: &str, description: &str, tags: &[&str]) -> Episode {
        Episode {
            id: EpisodeId::new(1, 1),
            season: 1,
            episode: 1,
            title: String::from(title),
            description: String::from(description),
            tags: tags.iter().map(|t| String::from(*t)).collect(),
        }
    }

    #[test]
    fn tags_from_keywords() {
        let e = ep("Halloween Havoc", "Jax - shirt off in Vegas", &[]);
        let tags = episode_tags(&e);
        assert!(tags.contains(&TagToggle::Costumes));
        assert!(tags.contains(&TagToggle::JaxShirtOff));
        assert!(tags.contains(&TagToggle::Vegas));
        assert!(!tags.contains(&TagToggle::Reunion));
        assert!(!tags.contains(&TagToggle::TequilaKatie));
    }

    #[test]
    fn tags_from_explicit_aliases() {
        let e = ep("Quiet night", "Nothing happens", &["Tequila-Katie", "REUNION"]);
        let tags = episode_tags(&e);
        assert_eq!(
            tags,
            [TagToggle::TequilaKatie, TagToggle::Reunion]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn rage_text_variants() {
        for d in ["a rage-text at 3am", "another rage text", "the katie rant"] {
            assert!(episode_tags(&ep("x", d, &[])).contains(&TagToggle::TequilaKatie));
        }
    }

    #[test]
    fn search_scopes() {
        let mut lib = Library::default();
        let e = ep("The Pool Party", "Drama at SUR", &[]);
        lib.reviews
            .insert(e.id.clone(), vec![String::from("Loved the fight")]);
        let search = |q: &str, search_in| EpisodeFilter {
            query: String::from(q),
            search_in,
            ..EpisodeFilter::default()
        };

        assert!(search("pool", SearchIn::All).matches(&lib, &e));
        assert!(search("sur", SearchIn::Description).matches(&lib, &e));
        assert!(!search("sur", SearchIn::Title).matches(&lib, &e));
        assert!(search("FIGHT", SearchIn::Reviews).matches(&lib, &e));
        assert!(search("fight", SearchIn::All).matches(&lib, &e));
        assert!(!search("fight", SearchIn::Description).matches(&lib, &e));
        assert!(!search("brunch", SearchIn::All).matches(&lib, &e));
    }

    #[test]
    fn every_selected_tag_is_required() {
        let lib = Library::default();
        let e = ep("Vegas, baby", "", &[]);
        let mut f = EpisodeFilter {
            tags: vec![TagToggle::Vegas],
            ..EpisodeFilter::default()
        };
        assert!(f.matches(&lib, &e));
        f.tags.push(TagToggle::Reunion);
        assert!(!f.matches(&lib, &e));
    }
}
