use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    model::{Collection, Record, RecordType},
    record_id::RecordId,
    tag_index::{TagIndex, normalize_tag},
};

/// Input for [`Store::create_record`].
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub name: String,
    pub description: String,
    pub kind: RecordType,
    pub location: String,
    pub tags: Vec<String>,
    pub collection_ids: Vec<RecordId>,
}

/// Fields to change in [`Store::update_record`]. `None` leaves a field
/// untouched; `Some` replaces it wholesale (tags and collections
/// included).
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<RecordType>,
    pub location: Option<String>,
    pub tags: Option<Vec<String>>,
    pub collection_ids: Option<Vec<RecordId>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCollection {
    pub name: String,
    pub description: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// In-memory owner of records, collections and the tag index.
///
/// Every command validates its input before mutating anything, so a
/// failed command leaves the store as it was.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub(crate) records: HashMap<RecordId, Record>,
    pub(crate) collections: HashMap<RecordId, Collection>,
    pub(crate) tags: TagIndex,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Lookups --

    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn collection(&self, id: &RecordId) -> Option<&Collection> {
        self.collections.get(id)
    }

    /// Collection whose name matches `name`, ignoring case.
    pub fn collection_by_name(&self, name: &str) -> Option<&Collection> {
        let wanted = name.trim().to_lowercase();
        self.collections()
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted)
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn tags_for(&self, id: &RecordId) -> BTreeSet<String> {
        self.tags.tags_for(id)
    }

    /// All records, oldest first (ties broken by id).
    pub fn records(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.records.values().collect();
        records.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// All collections, oldest first (ties broken by id).
    pub fn collections(&self) -> Vec<&Collection> {
        let mut collections: Vec<&Collection> =
            self.collections.values().collect();
        collections.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        collections
    }

    /// Records a search may return: the members of `collection`, or every
    /// record when no collection is active. Canonical order.
    pub fn records_in_scope(
        &self,
        collection: Option<&RecordId>,
    ) -> Result<Vec<&Record>> {
        let Some(collection_id) = collection else {
            return Ok(self.records());
        };
        let collection = self.require_collection(collection_id)?;
        Ok(self
            .records()
            .into_iter()
            .filter(|r| collection.member_ids.contains(&r.id))
            .collect())
    }

    pub fn is_taken(&self, id: &RecordId) -> bool {
        self.records.contains_key(id) || self.collections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // -- Record commands --

    pub fn create_record(&mut self, new: NewRecord) -> Result<RecordId> {
        self.create_record_at(new, Utc::now())
    }

    pub fn create_record_at(
        &mut self,
        new: NewRecord,
        now: DateTime<Utc>,
    ) -> Result<RecordId> {
        let name = required_name("record", &new.name)?;
        self.require_collections(&new.collection_ids)?;

        let id = RecordId::generate(new.kind, |id| self.is_taken(id))?;
        let record = Record::new(
            id.clone(),
            name,
            new.description,
            new.kind,
            new.location,
            now,
        );
        self.records.insert(id.clone(), record);
        self.tags.replace_all(&id, &new.tags);
        self.link_collections(&id, &new.collection_ids, now);

        info!(%id, "created record");
        Ok(id)
    }

    /// Apply `update` to a record. Tag and collection associations named
    /// in the update are detached first, then reattached.
    pub fn update_record(
        &mut self,
        id: &RecordId,
        update: RecordUpdate,
    ) -> Result<&Record> {
        self.update_record_at(id, update, Utc::now())
    }

    pub fn update_record_at(
        &mut self,
        id: &RecordId,
        update: RecordUpdate,
        now: DateTime<Utc>,
    ) -> Result<&Record> {
        self.require_record(id)?;
        let name = update
            .name
            .as_deref()
            .map(|name| required_name("record", name))
            .transpose()?;
        if let Some(ref collection_ids) = update.collection_ids {
            self.require_collections(collection_ids)?;
        }

        if let Some(ref tags) = update.tags {
            self.tags.replace_all(id, tags);
        }
        if let Some(ref collection_ids) = update.collection_ids {
            self.unlink_collections(id);
            self.link_collections(id, collection_ids, now);
        }

        let record = self.record_mut(id)?;
        if let Some(name) = name {
            record.name = name;
        }
        if let Some(description) = update.description {
            record.description = description;
        }
        if let Some(kind) = update.kind {
            record.kind = kind;
        }
        if let Some(location) = update.location {
            record.set_location(location);
        }
        record.updated_at = now;

        debug!(%id, "updated record");
        Ok(record)
    }

    /// Delete a record, removing it from every tag and collection.
    pub fn delete_record(&mut self, id: &RecordId) -> Result<Record> {
        self.require_record(id)?;
        let removed_tags = self.tags.detach_all(id);
        self.unlink_collections(id);
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| not_found("record", id))?;

        info!(%id, tags = removed_tags.len(), "deleted record");
        Ok(record)
    }

    /// The open/view action: bump the view counter and return the record
    /// so the caller can open its location.
    pub fn view_record(&mut self, id: &RecordId) -> Result<&Record> {
        let record = self.record_mut(id)?;
        record.increment_views();
        debug!(%id, views = record.view_count(), "viewed record");
        Ok(record)
    }

    pub fn add_tag(&mut self, id: &RecordId, tag: &str) -> Result<String> {
        self.require_record(id)?;
        let name = normalize_tag(tag)
            .ok_or_else(|| Error::Invalid("tag name is empty".into()))?;
        self.tags.attach(&name, id);
        self.record_mut(id)?.updated_at = Utc::now();
        Ok(name)
    }

    /// Returns whether the record carried the tag.
    pub fn remove_tag(&mut self, id: &RecordId, tag: &str) -> Result<bool> {
        self.require_record(id)?;
        let removed = self.tags.detach(tag, id);
        if removed {
            self.record_mut(id)?.updated_at = Utc::now();
        }
        Ok(removed)
    }

    // -- Collection commands --

    pub fn create_collection(
        &mut self,
        new: NewCollection,
    ) -> Result<RecordId> {
        self.create_collection_at(new, Utc::now())
    }

    pub fn create_collection_at(
        &mut self,
        new: NewCollection,
        now: DateTime<Utc>,
    ) -> Result<RecordId> {
        let name = required_name("collection", &new.name)?;
        self.require_unique_collection_name(&name, None)?;

        let id = RecordId::generate(RecordType::Collection, |id| {
            self.is_taken(id)
        })?;
        let collection =
            Collection::new(id.clone(), name, new.description, new.color, now);
        self.collections.insert(id.clone(), collection);

        info!(%id, "created collection");
        Ok(id)
    }

    pub fn update_collection(
        &mut self,
        id: &RecordId,
        update: CollectionUpdate,
    ) -> Result<&Collection> {
        self.require_collection(id)?;
        let name = update
            .name
            .as_deref()
            .map(|name| required_name("collection", name))
            .transpose()?;
        if let Some(ref name) = name {
            self.require_unique_collection_name(name, Some(id))?;
        }

        let collection = self.collection_mut(id)?;
        if let Some(name) = name {
            collection.name = name;
        }
        if let Some(description) = update.description {
            collection.description = description;
        }
        if let Some(color) = update.color {
            collection.color = color;
        }
        collection.updated_at = Utc::now();
        Ok(collection)
    }

    /// Delete a collection. Member records stay; they only lose the
    /// membership.
    pub fn delete_collection(&mut self, id: &RecordId) -> Result<Collection> {
        let collection = self
            .collections
            .remove(id)
            .ok_or_else(|| not_found("collection", id))?;
        for member in &collection.member_ids {
            if let Some(record) = self.records.get_mut(member) {
                record.collection_ids.remove(id);
            }
        }
        info!(
            %id,
            members = collection.member_ids.len(),
            "deleted collection"
        );
        Ok(collection)
    }

    /// Returns `false` if the record was already a member.
    pub fn add_to_collection(
        &mut self,
        collection_id: &RecordId,
        record_id: &RecordId,
    ) -> Result<bool> {
        self.require_collection(collection_id)?;
        self.require_record(record_id)?;
        let now = Utc::now();

        let record = self.record_mut(record_id)?;
        let added = record.collection_ids.insert(collection_id.clone());
        if added {
            record.updated_at = now;
        }
        let collection = self.collection_mut(collection_id)?;
        collection.member_ids.insert(record_id.clone());
        if added {
            collection.updated_at = now;
        }
        Ok(added)
    }

    /// Returns `false` if the record was not a member.
    pub fn remove_from_collection(
        &mut self,
        collection_id: &RecordId,
        record_id: &RecordId,
    ) -> Result<bool> {
        self.require_collection(collection_id)?;
        self.require_record(record_id)?;
        let now = Utc::now();

        let record = self.record_mut(record_id)?;
        let removed = record.collection_ids.remove(collection_id);
        if removed {
            record.updated_at = now;
        }
        let collection = self.collection_mut(collection_id)?;
        collection.member_ids.remove(record_id);
        if removed {
            collection.updated_at = now;
        }
        Ok(removed)
    }

    // -- Helpers --

    fn record_mut(&mut self, id: &RecordId) -> Result<&mut Record> {
        self.records
            .get_mut(id)
            .ok_or_else(|| not_found("record", id))
    }

    fn collection_mut(&mut self, id: &RecordId) -> Result<&mut Collection> {
        self.collections
            .get_mut(id)
            .ok_or_else(|| not_found("collection", id))
    }

    fn require_record(&self, id: &RecordId) -> Result<&Record> {
        self.records.get(id).ok_or_else(|| not_found("record", id))
    }

    fn require_collection(&self, id: &RecordId) -> Result<&Collection> {
        self.collections
            .get(id)
            .ok_or_else(|| not_found("collection", id))
    }

    fn require_collections(&self, ids: &[RecordId]) -> Result<()> {
        for id in ids {
            self.require_collection(id)?;
        }
        Ok(())
    }

    fn require_unique_collection_name(
        &self,
        name: &str,
        except: Option<&RecordId>,
    ) -> Result<()> {
        match self.collection_by_name(name) {
            Some(existing) if Some(&existing.id) != except => {
                Err(Error::DuplicateName {
                    kind: "collection",
                    name: name.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn link_collections(
        &mut self,
        id: &RecordId,
        collection_ids: &[RecordId],
        now: DateTime<Utc>,
    ) {
        for collection_id in collection_ids {
            if let Some(collection) = self.collections.get_mut(collection_id)
            {
                collection.member_ids.insert(id.clone());
                collection.updated_at = now;
            }
            if let Some(record) = self.records.get_mut(id) {
                record.collection_ids.insert(collection_id.clone());
            }
        }
    }

    fn unlink_collections(&mut self, id: &RecordId) {
        let Some(record) = self.records.get_mut(id) else {
            return;
        };
        for collection_id in std::mem::take(&mut record.collection_ids) {
            if let Some(collection) = self.collections.get_mut(&collection_id)
            {
                collection.member_ids.remove(id);
            }
        }
    }
}

fn required_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Invalid(format!("{kind} name must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn not_found(kind: &'static str, id: &RecordId) -> Error {
    Error::NotFound {
        kind,
        name: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LocationType;

    fn record(name: &str, tags: &[&str]) -> NewRecord {
        NewRecord {
            name: name.to_string(),
            location: format!("/files/{name}"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..NewRecord::default()
        }
    }

    fn collection(name: &str) -> NewCollection {
        NewCollection {
            name: name.to_string(),
            ..NewCollection::default()
        }
    }

    /// Both sides of every membership agree.
    fn assert_memberships_consistent(store: &Store) {
        for record in store.records.values() {
            for cid in &record.collection_ids {
                assert!(store.collections[cid].member_ids.contains(&record.id));
            }
        }
        for collection in store.collections.values() {
            for member in &collection.member_ids {
                assert!(
                    store.records[member]
                        .collection_ids
                        .contains(&collection.id)
                );
            }
        }
    }

    #[test]
    fn create_record_assigns_typed_id_and_tags() {
        let mut store = Store::new();
        let id = store
            .create_record(NewRecord {
                kind: RecordType::Image,
                location: "https://example.com/cat.png".into(),
                ..record("cat", &["pets", "#Cute"])
            })
            .unwrap();

        assert!(id.as_str().starts_with('1'));
        let created = store.record(&id).unwrap();
        assert_eq!(created.location_type(), LocationType::External);
        assert_eq!(created.view_count(), 0);
        assert_eq!(
            store.tags_for(&id),
            BTreeSet::from(["Cute".to_string(), "pets".to_string()])
        );
    }

    #[test]
    fn create_record_rejects_blank_name_and_unknown_collection() {
        let mut store = Store::new();
        assert!(matches!(
            store.create_record(record("  ", &[])),
            Err(Error::Invalid(_))
        ));

        let err = store
            .create_record(NewRecord {
                collection_ids: vec![RecordId::from_raw("c404")],
                ..record("a", &["t"])
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "collection", .. }));
        assert!(store.is_empty());
        assert!(store.tags().is_empty(), "failed create leaves no tags");
    }

    #[test]
    fn update_replaces_tags_and_memberships() {
        let mut store = Store::new();
        let work = store.create_collection(collection("Work")).unwrap();
        let home = store.create_collection(collection("Home")).unwrap();
        let id = store
            .create_record(NewRecord {
                collection_ids: vec![work.clone()],
                ..record("notes", &["old", "keep"])
            })
            .unwrap();

        store
            .update_record(
                &id,
                RecordUpdate {
                    location: Some("http://example.com/notes".into()),
                    tags: Some(vec!["keep".into(), "new".into()]),
                    collection_ids: Some(vec![home.clone()]),
                    ..RecordUpdate::default()
                },
            )
            .unwrap();

        let updated = store.record(&id).unwrap();
        assert_eq!(updated.location_type(), LocationType::External);
        assert_eq!(updated.collection_ids, BTreeSet::from([home.clone()]));
        assert!(store.collection(&work).unwrap().member_ids.is_empty());
        assert!(store.collection(&home).unwrap().member_ids.contains(&id));
        assert!(!store.tags().contains("old"));
        assert_eq!(
            store.tags_for(&id),
            BTreeSet::from(["keep".to_string(), "new".to_string()])
        );
        assert_memberships_consistent(&store);
    }

    #[test]
    fn update_with_unknown_collection_changes_nothing() {
        let mut store = Store::new();
        let id = store.create_record(record("a", &["x"])).unwrap();
        let before = store.record(&id).unwrap().clone();

        let err = store
            .update_record(
                &id,
                RecordUpdate {
                    name: Some("b".into()),
                    tags: Some(vec!["y".into()]),
                    collection_ids: Some(vec![RecordId::from_raw("c0")]),
                    ..RecordUpdate::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(store.record(&id).unwrap(), &before);
        assert!(store.tags().contains("x"));
        assert!(!store.tags().contains("y"));
    }

    #[test]
    fn delete_cascades_to_tags_and_collections() {
        let mut store = Store::new();
        let work = store.create_collection(collection("Work")).unwrap();
        let doomed = store
            .create_record(NewRecord {
                collection_ids: vec![work.clone()],
                ..record("doomed", &["solo", "shared"])
            })
            .unwrap();
        let other = store.create_record(record("other", &["shared"])).unwrap();

        let removed = store.delete_record(&doomed).unwrap();
        assert_eq!(removed.name, "doomed");

        assert!(store.record(&doomed).is_none());
        assert!(!store.tags().contains("solo"), "empty tag must vanish");
        for (_, members) in store.tags().iter() {
            assert!(!members.is_empty());
            assert!(!members.contains(&doomed));
        }
        assert!(store.collection(&work).unwrap().member_ids.is_empty());
        assert_eq!(store.tags_for(&other).len(), 1);
        assert!(matches!(
            store.delete_record(&doomed),
            Err(Error::NotFound { kind: "record", .. })
        ));
    }

    #[test]
    fn view_increments_only_view_count() {
        let mut store = Store::new();
        let id = store.create_record(record("clip", &[])).unwrap();
        let updated_at = store.record(&id).unwrap().updated_at;

        store.view_record(&id).unwrap();
        let viewed = store.view_record(&id).unwrap();

        assert_eq!(viewed.view_count(), 2);
        assert_eq!(viewed.updated_at, updated_at);
    }

    #[test]
    fn add_and_remove_tag() {
        let mut store = Store::new();
        let id = store.create_record(record("a", &[])).unwrap();

        assert_eq!(store.add_tag(&id, "#road trip").unwrap(), "road_trip");
        assert!(store.remove_tag(&id, "Road_Trip").unwrap());
        assert!(!store.remove_tag(&id, "road_trip").unwrap());
        assert!(store.tags().is_empty());
        assert!(matches!(store.add_tag(&id, "#"), Err(Error::Invalid(_))));
    }

    #[test]
    fn collection_names_are_unique_ignoring_case() {
        let mut store = Store::new();
        let id = store.create_collection(collection("Photos")).unwrap();
        assert!(id.as_str().starts_with('c'));

        assert!(matches!(
            store.create_collection(collection("photos")),
            Err(Error::DuplicateName { .. })
        ));
        let other = store.create_collection(collection("Videos")).unwrap();
        assert!(matches!(
            store.update_collection(
                &other,
                CollectionUpdate {
                    name: Some("PHOTOS".into()),
                    ..CollectionUpdate::default()
                }
            ),
            Err(Error::DuplicateName { .. })
        ));
        // Renaming to its own name with different case is fine.
        store
            .update_collection(
                &id,
                CollectionUpdate {
                    name: Some("photos".into()),
                    ..CollectionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(store.collection_by_name("PHOTOS").unwrap().id, id);
    }

    #[test]
    fn collection_membership_commands_keep_both_sides() {
        let mut store = Store::new();
        let c = store.create_collection(collection("Trips")).unwrap();
        let a = store.create_record(record("a", &[])).unwrap();
        let b = store.create_record(record("b", &[])).unwrap();

        assert!(store.add_to_collection(&c, &a).unwrap());
        assert!(!store.add_to_collection(&c, &a).unwrap());
        assert!(store.add_to_collection(&c, &b).unwrap());
        assert!(store.remove_from_collection(&c, &a).unwrap());
        assert!(!store.remove_from_collection(&c, &a).unwrap());
        assert_memberships_consistent(&store);

        let in_scope: Vec<&RecordId> = store
            .records_in_scope(Some(&c))
            .unwrap()
            .into_iter()
            .map(|r| &r.id)
            .collect();
        assert_eq!(in_scope, vec![&b]);
    }

    #[test]
    fn delete_collection_keeps_records() {
        let mut store = Store::new();
        let c = store.create_collection(collection("Trips")).unwrap();
        let a = store
            .create_record(NewRecord {
                collection_ids: vec![c.clone()],
                ..record("a", &[])
            })
            .unwrap();

        store.delete_collection(&c).unwrap();

        assert!(store.record(&a).unwrap().collection_ids.is_empty());
        assert!(matches!(
            store.records_in_scope(Some(&c)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn records_are_listed_oldest_first() {
        let mut store = Store::new();
        let t0 = Utc::now();
        let later = store
            .create_record_at(
                record("later", &[]),
                t0 + chrono::Duration::seconds(5),
            )
            .unwrap();
        let earlier =
            store.create_record_at(record("earlier", &[]), t0).unwrap();

        let ids: Vec<&RecordId> =
            store.records().into_iter().map(|r| &r.id).collect();
        assert_eq!(ids, vec![&earlier, &later]);
    }
}
