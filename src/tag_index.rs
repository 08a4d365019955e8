use std::collections::{BTreeMap, BTreeSet};

use crate::{query::lexer::is_word_breaker, record_id::RecordId};

/// Normalize a user-supplied tag name.
///
/// Leading `#` characters and surrounding whitespace are stripped. Inner
/// runs of whitespace or query punctuation (`( ) , :`) become `_`, so the
/// result is always a single query word. Returns `None` when nothing is
/// left.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let joined = raw
        .trim_start()
        .trim_start_matches('#')
        .split(is_word_breaker)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let name = joined.trim_start_matches('#');
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

fn key_of(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagEntry {
    /// Spelling used for display and export.
    name: String,
    members: BTreeSet<RecordId>,
}

/// Many-to-many mapping between tag names and record ids.
///
/// Names are matched case-insensitively; the first spelling seen is kept
/// for display. An entry never has an empty member set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    entries: BTreeMap<String, TagEntry>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` under `tag`. Idempotent. Returns `false` if the name was
    /// empty after normalization.
    pub fn attach(&mut self, tag: &str, id: &RecordId) -> bool {
        let Some(name) = normalize_tag(tag) else {
            return false;
        };
        self.entries
            .entry(key_of(&name))
            .or_insert_with(|| TagEntry {
                name,
                members: BTreeSet::new(),
            })
            .members
            .insert(id.clone());
        true
    }

    /// Remove `id` from `tag`, deleting the tag once it has no members.
    /// Returns whether anything was removed.
    pub fn detach(&mut self, tag: &str, id: &RecordId) -> bool {
        let Some(name) = normalize_tag(tag) else {
            return false;
        };
        let key = key_of(&name);
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        let removed = entry.members.remove(id);
        if entry.members.is_empty() {
            self.entries.remove(&key);
        }
        removed
    }

    /// Remove `id` from every tag. Returns the display names it was
    /// removed from.
    pub fn detach_all(&mut self, id: &RecordId) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|_, entry| {
            if entry.members.remove(id) {
                removed.push(entry.name.clone());
            }
            !entry.members.is_empty()
        });
        removed
    }

    /// Display names of every tag carrying `id`.
    ///
    /// Scans the whole index.
    pub fn tags_for(&self, id: &RecordId) -> BTreeSet<String> {
        self.entries
            .values()
            .filter(|entry| entry.members.contains(id))
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Detach `id` from all of its tags, then attach it to each name in
    /// `names`. Blank names are dropped and duplicates collapse.
    pub fn replace_all<I, S>(&mut self, id: &RecordId, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.detach_all(id);
        for name in names {
            self.attach(name.as_ref(), id);
        }
    }

    /// Members of `tag`, matched case-insensitively.
    pub fn members(&self, tag: &str) -> Option<&BTreeSet<RecordId>> {
        let name = normalize_tag(tag)?;
        self.entries.get(&key_of(&name)).map(|entry| &entry.members)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.members(tag).is_some()
    }

    /// Iterate `(display name, members)` ordered by lowercase name.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&str, &BTreeSet<RecordId>)> + '_ {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), &entry.members))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
