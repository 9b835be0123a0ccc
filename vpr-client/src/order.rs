use std::cmp::Reverse;

use crate::{
    api::{Episode, SortKey},
    Library,
};

pub trait OrderExt {
    fn sort(&self, lib: &Library, episodes: &mut [Episode]);
}

impl OrderExt for SortKey {
    /// Unrated episodes count as rated 0. Rating ties are broken by title, then
    /// by id, so the order never depends on the input order.
    fn sort(&self, lib: &Library, episodes: &mut [Episode]) {
        match self {
            SortKey::SeasonAsc => {
                episodes.sort_unstable_by(|a, b| {
                    (a.season, a.episode, &a.id).cmp(&(b.season, b.episode, &b.id))
                })
            }
            SortKey::SeasonDesc => episodes.sort_unstable_by(|a, b| {
                (b.season, b.episode, &b.id).cmp(&(a.season, a.episode, &a.id))
            }),
            SortKey::RatingDesc => episodes.sort_by_cached_key(|e| {
                (
                    Reverse(lib.rating(&e.id)),
                    e.title.to_lowercase(),
                    e.title.clone(),
                    e.id.clone(),
                )
            }),
            SortKey::RatingAsc => episodes.sort_by_cached_key(|e| {
                (
                    lib.rating(&e.id),
                    e.title.to_lowercase(),
                    e.title.clone(),
                    e.id.clone(),
                )
            }),
        }
    }
}
