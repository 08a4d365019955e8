use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::{
    error::Result,
    history::SearchHistory,
    model::{Collection, Record},
    record_id::RecordId,
    snapshot::Snapshot,
    store::Store,
};

/// Record id -> record JSON.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
/// Collection id -> collection JSON.
const COLLECTIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("collections");
/// Tag name -> JSON array of record ids.
const TAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

pub const HISTORY_KEY: &str = "searchHistory";
pub const DEFAULT_SORT_KEY: &str = "default_sort";

/// Persistent state: the store image plus free-form settings.
pub struct StateDb {
    db: Database,
}

impl StateDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(COLLECTIONS)?;
        txn.open_table(TAGS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Store --

    /// Replace the persisted store with `store` in one transaction.
    pub fn save_store(&self, store: &Store) -> Result<()> {
        self.save_snapshot(&store.snapshot())
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut records = txn.open_table(RECORDS)?;
            records.retain(|_, _| false)?;
            for record in &snapshot.files {
                let bytes = serde_json::to_vec(record)?;
                records.insert(record.id.as_str(), bytes.as_slice())?;
            }

            let mut collections = txn.open_table(COLLECTIONS)?;
            collections.retain(|_, _| false)?;
            for collection in &snapshot.collections {
                let bytes = serde_json::to_vec(collection)?;
                collections
                    .insert(collection.id.as_str(), bytes.as_slice())?;
            }

            let mut tags = txn.open_table(TAGS)?;
            tags.retain(|_, _| false)?;
            for (name, ids) in &snapshot.tags {
                let bytes = serde_json::to_vec(ids)?;
                tags.insert(name.as_str(), bytes.as_slice())?;
            }
        }
        txn.commit()?;

        debug!(
            records = snapshot.files.len(),
            collections = snapshot.collections.len(),
            tags = snapshot.tags.len(),
            "saved store"
        );
        Ok(())
    }

    /// Load the persisted store. An empty database yields an empty store.
    pub fn load_store(&self) -> Result<Store> {
        self.load_snapshot()?.into_store()
    }

    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let txn = self.db.begin_read()?;

        let table = txn.open_table(RECORDS)?;
        let mut files: Vec<Record> = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            files.push(serde_json::from_slice(v.value())?);
        }
        files.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });

        let table = txn.open_table(COLLECTIONS)?;
        let mut collections: Vec<Collection> = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            collections.push(serde_json::from_slice(v.value())?);
        }

        let table = txn.open_table(TAGS)?;
        let mut snapshot = Snapshot {
            files,
            tags: Default::default(),
            collections,
        };
        for entry in table.iter()? {
            let (k, v) = entry?;
            let ids: Vec<RecordId> = serde_json::from_slice(v.value())?;
            snapshot.tags.insert(k.value().to_string(), ids);
        }
        Ok(snapshot)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }

    // -- Search history --

    pub fn load_history(&self) -> Result<SearchHistory> {
        match self.get_setting(HISTORY_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(SearchHistory::new()),
        }
    }

    pub fn save_history(&self, history: &SearchHistory) -> Result<()> {
        self.set_setting(HISTORY_KEY, &serde_json::to_string(history)?)
    }
}

impl std::fmt::Debug for StateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb").finish_non_exhaustive()
    }
}
