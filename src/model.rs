use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record_id::RecordId;

/// The kind of object a record points at.
///
/// Determines the id prefix handed out by [`crate::record_id`]. Names are
/// read case-insensitively; unknown names deserialize as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Image,
    Video,
    Document,
    Audio,
    Link,
    #[default]
    Other,
    Collection,
}

impl RecordType {
    pub const ALL: [RecordType; 7] = [
        RecordType::Image,
        RecordType::Video,
        RecordType::Document,
        RecordType::Audio,
        RecordType::Link,
        RecordType::Other,
        RecordType::Collection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Image => "image",
            RecordType::Video => "video",
            RecordType::Document => "document",
            RecordType::Audio => "audio",
            RecordType::Link => "link",
            RecordType::Other => "other",
            RecordType::Collection => "collection",
        }
    }

    /// Look up a type by name, ignoring case. Returns `None` for names
    /// outside the fixed enumeration.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// One-character prefix used when generating ids of this type.
    pub fn id_prefix(self) -> char {
        match self {
            RecordType::Image => '1',
            RecordType::Video => '2',
            RecordType::Audio => '3',
            RecordType::Document => '4',
            RecordType::Link => '5',
            RecordType::Collection => 'c',
            RecordType::Other => '0',
        }
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name).unwrap_or_default())
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Internal,
    External,
}

impl LocationType {
    /// A location is external iff it is an absolute http(s) URL.
    pub fn of(location: &str) -> Self {
        let location = location.trim();
        let is_url = ["http://", "https://"].iter().any(|scheme| {
            location
                .get(..scheme.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
                && location.len() > scheme.len()
        });
        if is_url {
            LocationType::External
        } else {
            LocationType::Internal
        }
    }
}

/// A tagged file or link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: RecordType,
    location: String,
    #[serde(default)]
    location_type: LocationType,
    #[serde(default)]
    view_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub collection_ids: BTreeSet<RecordId>,
}

impl Record {
    pub fn new(
        id: RecordId,
        name: impl Into<String>,
        description: impl Into<String>,
        kind: RecordType,
        location: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let location = location.into();
        Self {
            id,
            name: name.into(),
            description: description.into(),
            kind,
            location_type: LocationType::of(&location),
            location,
            view_count: 0,
            created_at: now,
            updated_at: now,
            collection_ids: BTreeSet::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
        self.location_type = LocationType::of(&self.location);
    }

    /// Recompute the derived location type. Used after deserializing a
    /// record whose stored `locationType` may be stale.
    pub(crate) fn refresh_location_type(&mut self) {
        self.location_type = LocationType::of(&self.location);
    }

    pub fn view_count(&self) -> u64 {
        self.view_count
    }

    pub(crate) fn increment_views(&mut self) {
        self.view_count = self.view_count.saturating_add(1);
    }

    /// Case-insensitive substring match against name or description.
    /// `needle` must already be lowercase.
    pub fn mentions(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

pub const DEFAULT_COLLECTION_COLOR: &str = "#3b82f6";

fn default_color() -> String {
    DEFAULT_COLLECTION_COLOR.to_string()
}

/// A user-defined grouping of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub member_ids: BTreeSet<RecordId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(
        id: RecordId,
        name: impl Into<String>,
        description: impl Into<String>,
        color: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            color: color.unwrap_or_else(default_color),
            member_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_type_follows_location() {
        assert_eq!(
            LocationType::of("https://example.com/a.png"),
            LocationType::External
        );
        assert_eq!(
            LocationType::of("HTTP://example.com"),
            LocationType::External
        );
        assert_eq!(LocationType::of("/home/me/a.png"), LocationType::Internal);
        assert_eq!(LocationType::of("www.example.com"), LocationType::Internal);
        assert_eq!(LocationType::of("ftp://host/file"), LocationType::Internal);
        assert_eq!(LocationType::of("https://"), LocationType::Internal);
    }

    #[test]
    fn set_location_recomputes_type() {
        let mut record = Record::new(
            RecordId::from_raw("1000"),
            "photo",
            "",
            RecordType::Image,
            "/tmp/photo.png",
            Utc::now(),
        );
        assert_eq!(record.location_type(), LocationType::Internal);

        record.set_location("https://example.com/photo.png");
        assert_eq!(record.location_type(), LocationType::External);
    }

    #[test]
    fn record_type_names_are_case_insensitive() {
        assert_eq!(RecordType::from_name("IMAGE"), Some(RecordType::Image));
        assert_eq!(RecordType::from_name(" Link "), Some(RecordType::Link));
        assert_eq!(RecordType::from_name("spreadsheet"), None);
    }

    #[test]
    fn unknown_type_deserializes_as_other() {
        let kind: RecordType = serde_json::from_str("\"hologram\"").unwrap();
        assert_eq!(kind, RecordType::Other);
        let kind: RecordType = serde_json::from_str("\"Video\"").unwrap();
        assert_eq!(kind, RecordType::Video);
    }

    #[test]
    fn mentions_checks_name_and_description() {
        let record = Record::new(
            RecordId::from_raw("4000"),
            "Quarterly Report",
            "Budget figures for Q3",
            RecordType::Document,
            "report.pdf",
            Utc::now(),
        );
        assert!(record.mentions("report"));
        assert!(record.mentions("budget"));
        assert!(record.mentions("rly rep"));
        assert!(!record.mentions("invoice"));
    }
}
