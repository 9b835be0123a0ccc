use anyhow::{anyhow, Context};

use crate::{Comment, CommentId, Error};

/// A change notification as the realtime transport delivers it: untyped rows
/// that still need to be validated before use.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawChange {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(default)]
    pub new: serde_json::Value,
    #[serde(default)]
    pub old: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub new: Option<Comment>,

    /// Delete payloads often only carry part of the old row, so only the
    /// fields needed to locate the branch are kept. `None` when the old row
    /// has no `parent_id` at all.
    pub old_parent: Option<Option<CommentId>>,
}

fn row_value<T: serde::Serialize>(row: Option<&T>) -> Result<serde_json::Value, Error> {
    match row {
        None => Ok(serde_json::Value::Null),
        Some(r) => serde_json::to_value(r).map_err(|e| Error::InvalidPayload(e.to_string())),
    }
}

impl RawChange {
    /// Change payload for any table's rows
    pub fn for_rows<T: serde::Serialize>(
        event_type: &str,
        new: Option<&T>,
        old: Option<&T>,
    ) -> Result<RawChange, Error> {
        Ok(RawChange {
            event_type: String::from(event_type),
            new: row_value(new)?,
            old: row_value(old)?,
        })
    }

    pub fn insert(c: &Comment) -> Result<RawChange, Error> {
        RawChange::for_rows("INSERT", Some(c), None)
    }

    pub fn delete(c: &Comment) -> Result<RawChange, Error> {
        RawChange::for_rows("DELETE", None, Some(c))
    }
}

fn is_empty_row(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => true,
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

impl ChangeEvent {
    pub fn decode(raw: RawChange) -> anyhow::Result<ChangeEvent> {
        let op = match &raw.event_type as &str {
            "INSERT" => ChangeOp::Insert,
            "UPDATE" => ChangeOp::Update,
            "DELETE" => ChangeOp::Delete,
            t => return Err(anyhow!("unknown realtime event type {t:?}")),
        };
        let new = match is_empty_row(&raw.new) {
            true => None,
            false => Some(
                serde_json::from_value::<Comment>(raw.new).context("decoding new comment row")?,
            ),
        };
        let old_parent = match raw.old {
            serde_json::Value::Object(o) => match o.get("parent_id") {
                None => None,
                Some(p) => Some(
                    serde_json::from_value::<Option<CommentId>>(p.clone())
                        .context("decoding old row parent_id")?,
                ),
            },
            serde_json::Value::Null => None,
            v => return Err(anyhow!("old row is not an object: {v:?}")),
        };
        Ok(ChangeEvent {
            op,
            new,
            old_parent,
        })
    }

    /// Parent of the affected comment: taken from the new row if present, else
    /// from the old row. `None` is the root branch, which is also where events
    /// without any parent information land.
    pub fn affected_parent(&self) -> Option<CommentId> {
        match (&self.new, self.old_parent) {
            (Some(new), _) => new.parent_id,
            (None, Some(old)) => old,
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReviewId, UserId, Uuid};
    use serde_json::json;

    fn comment(parent_id: Option<CommentId>) -> Comment {
        Comment {
            id: CommentId(Uuid::new_v4()),
            review_id: ReviewId(Uuid::new_v4()),
            parent_id,
            author_id: UserId::stub(),
            text: String::from("hi"),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn insert_uses_new_row_parent() {
        let parent = CommentId(Uuid::new_v4());
        let c = comment(Some(parent));
        let evt = ChangeEvent::decode(RawChange::insert(&c).unwrap()).unwrap();
        assert_eq!(evt.op, ChangeOp::Insert);
        assert_eq!(evt.new, Some(c));
        assert_eq!(evt.affected_parent(), Some(parent));
    }

    #[test]
    fn delete_falls_back_to_old_row() {
        let parent = CommentId(Uuid::new_v4());
        let raw = RawChange {
            event_type: String::from("DELETE"),
            new: json!({}),
            old: json!({ "id": Uuid::new_v4(), "parent_id": parent.0 }),
        };
        let evt = ChangeEvent::decode(raw).unwrap();
        assert_eq!(evt.op, ChangeOp::Delete);
        assert_eq!(evt.affected_parent(), Some(parent));
    }

    #[test]
    fn root_comment_maps_to_root_branch() {
        let evt = ChangeEvent::decode(RawChange::delete(&comment(None)).unwrap()).unwrap();
        assert_eq!(evt.old_parent, Some(None));
        assert_eq!(evt.affected_parent(), None);
    }

    #[test]
    fn rejects_garbage() {
        let raw = RawChange {
            event_type: String::from("TRUNCATE"),
            new: json!({}),
            old: json!({}),
        };
        assert!(ChangeEvent::decode(raw).is_err());

        let raw = RawChange {
            event_type: String::from("INSERT"),
            new: json!({ "id": "not-a-uuid" }),
            old: serde_json::Value::Null,
        };
        assert!(ChangeEvent::decode(raw).is_err());

        let raw = RawChange {
            event_type: String::from("DELETE"),
            new: serde_json::Value::Null,
            old: json!([1, 2]),
        };
        assert!(ChangeEvent::decode(raw).is_err());
    }

    #[test]
    fn key_only_delete_refreshes_root() {
        // default replica identity: the old row only carries the primary key
        let raw = RawChange {
            event_type: String::from("DELETE"),
            new: json!({}),
            old: json!({ "id": Uuid::new_v4() }),
        };
        let evt = ChangeEvent::decode(raw).unwrap();
        assert_eq!(evt.op, ChangeOp::Delete);
        assert_eq!(evt.new, None);
        assert_eq!(evt.old_parent, None);
        assert_eq!(evt.affected_parent(), None);
    }

    #[test]
    fn rowless_update_refreshes_root() {
        let raw = RawChange {
            event_type: String::from("UPDATE"),
            new: serde_json::Value::Null,
            old: serde_json::Value::Null,
        };
        assert_eq!(ChangeEvent::decode(raw).unwrap().affected_parent(), None);
    }
}
