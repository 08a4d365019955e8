//! JSON export/import of a whole [`Store`].
//!
//! The document shape is
//! `{ "files": [Record], "tags": {name: [id]}, "collections": [Collection] }`.
//! `files` and `tags` are required; `collections` defaults to an empty list.

use std::collections::{BTreeMap, HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    model::{Collection, Record},
    record_id::RecordId,
    store::Store,
    tag_index::TagIndex,
};

/// Serializable image of a store.
///
/// Produced in canonical order (records and collections oldest first, tag
/// names sorted, id sets sorted) so equal stores export identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub files: Vec<Record>,
    pub tags: BTreeMap<String, Vec<RecordId>>,
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl Snapshot {
    pub fn from_store(store: &Store) -> Self {
        Self {
            files: store.records().into_iter().cloned().collect(),
            tags: store
                .tags()
                .iter()
                .map(|(name, members)| {
                    (name.to_string(), members.iter().cloned().collect())
                })
                .collect(),
            collections: store.collections().into_iter().cloned().collect(),
        }
    }

    /// Parse an export document. Fails without side effects when `files`
    /// or `tags` is missing or the JSON is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::ImportFormat(format!("not valid JSON: {e}")))?;
        let Some(object) = value.as_object() else {
            return Err(Error::ImportFormat(
                "top level must be a JSON object".into(),
            ));
        };
        for key in ["files", "tags"] {
            if !object.contains_key(key) {
                return Err(Error::ImportFormat(format!(
                    "missing required key '{key}'"
                )));
            }
        }
        serde_json::from_value(value)
            .map_err(|e| Error::ImportFormat(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a store from this snapshot.
    ///
    /// Duplicate ids are rejected. Everything else is reconciled: dangling
    /// tag members and memberships are dropped, memberships recorded on
    /// only one side are mirrored, and `locationType` is recomputed.
    pub fn into_store(self) -> Result<Store> {
        let mut records: HashMap<RecordId, Record> =
            HashMap::with_capacity(self.files.len());
        for mut record in self.files {
            record.refresh_location_type();
            match records.entry(record.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(Error::ImportFormat(format!(
                        "duplicate record id {}",
                        record.id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        let mut collections: HashMap<RecordId, Collection> =
            HashMap::with_capacity(self.collections.len());
        for collection in self.collections {
            if records.contains_key(&collection.id)
                || collections.contains_key(&collection.id)
            {
                return Err(Error::ImportFormat(format!(
                    "duplicate collection id {}",
                    collection.id
                )));
            }
            collections.insert(collection.id.clone(), collection);
        }

        for collection in collections.values_mut() {
            collection.member_ids.retain(|id| records.contains_key(id));
        }
        for record in records.values_mut() {
            record
                .collection_ids
                .retain(|id| collections.contains_key(id));
        }
        for collection in collections.values() {
            for member in &collection.member_ids {
                if let Some(record) = records.get_mut(member) {
                    record.collection_ids.insert(collection.id.clone());
                }
            }
        }
        for record in records.values() {
            for collection_id in &record.collection_ids {
                if let Some(collection) = collections.get_mut(collection_id) {
                    collection.member_ids.insert(record.id.clone());
                }
            }
        }

        let mut tags = TagIndex::new();
        let mut dropped = 0usize;
        for (name, ids) in &self.tags {
            for id in ids {
                if records.contains_key(id) {
                    tags.attach(name, id);
                } else {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            warn!(dropped, "ignored tag entries for unknown records");
        }

        debug!(
            records = records.len(),
            collections = collections.len(),
            tags = tags.len(),
            "loaded snapshot"
        );
        Ok(Store {
            records,
            collections,
            tags,
        })
    }
}

impl Store {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_store(self)
    }

    pub fn export_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    /// Parse and load an export document into a fresh store.
    pub fn import_json(json: &str) -> Result<Self> {
        Snapshot::from_json(json)?.into_store()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        model::{LocationType, RecordType},
        store::{NewCollection, NewRecord},
    };

    fn sample_store() -> Store {
        let mut store = Store::new();
        let trips = store
            .create_collection(NewCollection {
                name: "Trips".into(),
                description: "Holiday stuff".into(),
                color: Some("#ff0000".into()),
            })
            .unwrap();
        store
            .create_record(NewRecord {
                name: "Beach".into(),
                description: "Sunset at the beach".into(),
                kind: RecordType::Image,
                location: "/photos/beach.jpg".into(),
                tags: vec!["vacances".into(), "Sea".into()],
                collection_ids: vec![trips],
            })
            .unwrap();
        let link = store
            .create_record(NewRecord {
                name: "Docs".into(),
                kind: RecordType::Link,
                location: "https://docs.rs".into(),
                tags: vec!["rust".into()],
                ..NewRecord::default()
            })
            .unwrap();
        store.view_record(&link).unwrap();
        store
    }

    #[test]
    fn export_then_import_round_trips() {
        let store = sample_store();
        let exported = store.export_json().unwrap();

        let imported = Store::import_json(&exported).unwrap();

        assert_eq!(imported.snapshot(), store.snapshot());
        assert_eq!(imported.export_json().unwrap(), exported);
    }

    #[test]
    fn export_uses_the_documented_keys() {
        let store = sample_store();
        let value: serde_json::Value =
            serde_json::from_str(&store.export_json().unwrap()).unwrap();

        let file = &value["files"][0];
        for key in [
            "id",
            "name",
            "description",
            "type",
            "location",
            "locationType",
            "viewCount",
            "createdAt",
            "updatedAt",
            "collectionIds",
        ] {
            assert!(file.get(key).is_some(), "record is missing {key}");
        }
        assert!(value["tags"]["vacances"].is_array());
        assert_eq!(value["collections"][0]["color"], "#ff0000");
        assert!(value["collections"][0]["memberIds"].is_array());
    }

    #[test]
    fn import_requires_files_and_tags() {
        for json in [
            r#"{"tags": {}}"#,
            r#"{"files": []}"#,
            r#"[]"#,
            "not json",
        ] {
            assert!(
                matches!(Store::import_json(json), Err(Error::ImportFormat(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn collections_default_to_empty() {
        let store = Store::import_json(r#"{"files": [], "tags": {}}"#).unwrap();
        assert!(store.is_empty());
        assert!(store.collections().is_empty());
    }

    #[test]
    fn import_recomputes_location_type_and_reconciles() {
        let json = r#"{
            "files": [{
                "id": "51234567890123456",
                "name": "Site",
                "type": "link",
                "location": "https://example.com",
                "locationType": "internal",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }],
            "tags": {
                "web": ["51234567890123456", "9999"],
                "ghost": ["9999"]
            },
            "collections": [{
                "id": "c1234567890123456",
                "name": "Bookmarks",
                "memberIds": ["51234567890123456", "9999"],
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }]
        }"#;

        let store = Store::import_json(json).unwrap();
        let id = RecordId::from_raw("51234567890123456");
        let cid = RecordId::from_raw("c1234567890123456");

        let record = store.record(&id).unwrap();
        assert_eq!(record.location_type(), LocationType::External);
        assert_eq!(record.view_count(), 0);
        assert_eq!(record.collection_ids, BTreeSet::from([cid.clone()]));
        assert_eq!(
            store.collection(&cid).unwrap().member_ids,
            BTreeSet::from([id.clone()])
        );
        assert!(!store.tags().contains("ghost"));
        assert_eq!(store.tags().members("web").unwrap().len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{
            "files": [
                {"id": "1", "name": "a", "location": "a",
                 "createdAt": "2024-01-01T00:00:00Z",
                 "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "1", "name": "b", "location": "b",
                 "createdAt": "2024-01-01T00:00:00Z",
                 "updatedAt": "2024-01-01T00:00:00Z"}
            ],
            "tags": {}
        }"#;
        assert!(matches!(
            Store::import_json(json),
            Err(Error::ImportFormat(_))
        ));
    }
}
