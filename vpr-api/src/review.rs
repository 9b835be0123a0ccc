use uuid::Uuid;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ReviewId(pub Uuid);

impl ReviewId {
    pub fn new_random() -> ReviewId {
        ReviewId(Uuid::new_v4())
    }
}
