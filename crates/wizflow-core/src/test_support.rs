//! Builders shared by unit tests.

use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};

use crate::application::subject::SubjectClient;
use crate::domain::catalog::Catalog;
use crate::domain::snapshot::{SnapshotPayloads, StateSnapshot};
use crate::error::CoreResult;
use crate::types::{SubjectRequest, SubjectResponse};

mock! {
    pub SubjectClient {}

    #[async_trait]
    impl SubjectClient for SubjectClient {
        async fn send(&self, request: SubjectRequest) -> CoreResult<SubjectResponse>;
    }
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (k, v) in overlay {
                merge(base.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Snapshot from a partial JSON description; unspecified endpoints are empty.
pub fn snapshot_from_json(partial: Value) -> StateSnapshot {
    let mut full = json!({
        "character": {
            "id": 1,
            "public_id": "brave-wolf-test",
            "is_complete": false,
            "validation_status": {"is_complete": false, "missing": []}
        },
        "stats": {},
        "pending_choices": [],
        "spells": [],
        "equipment": [],
        "languages": [],
        "proficiencies": [],
        "features": []
    });
    merge(&mut full, partial);
    let raw: SnapshotPayloads = serde_json::from_value(full).expect("test snapshot payload");
    StateSnapshot::new(1, raw)
}

pub fn catalog_from_json(value: Value) -> Catalog {
    serde_json::from_value(value).expect("test catalog")
}
