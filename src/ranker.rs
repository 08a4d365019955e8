use std::{cmp::Ordering, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::model::Record;

/// How search results are ordered.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Keep the evaluator's order (xor results stay grouped).
    #[default]
    Relevance,
    /// Most recently created first.
    Newest,
    /// Oldest first.
    Oldest,
    /// Most viewed first.
    Popular,
    /// Alphabetical by name.
    Name,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Relevance => "relevance",
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::Popular => "popular",
            SortKey::Name => "name",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" | "default" => Ok(SortKey::Relevance),
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "popular" => Ok(SortKey::Popular),
            "name" => Ok(SortKey::Name),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn by_name(a: &Record, b: &Record) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

/// Order `results` by `key`. Stable: ties keep their incoming order.
pub fn rank<'s>(mut results: Vec<&'s Record>, key: SortKey) -> Vec<&'s Record> {
    match key {
        SortKey::Relevance => {}
        SortKey::Newest => {
            results.sort_by(|a, b| b.created_at.cmp(&a.created_at))
        }
        SortKey::Oldest => {
            results.sort_by(|a, b| a.created_at.cmp(&b.created_at))
        }
        SortKey::Popular => {
            results.sort_by(|a, b| b.view_count().cmp(&a.view_count()))
        }
        SortKey::Name => results.sort_by(|a, b| by_name(a, b)),
    }
    results
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{model::RecordType, record_id::RecordId};

    fn record(id: &str, name: &str, age_secs: i64, views: u64) -> Record {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = Record::new(
            RecordId::from_raw(id),
            name,
            "",
            RecordType::Other,
            "",
            t0 + Duration::seconds(age_secs),
        );
        for _ in 0..views {
            record.increment_views();
        }
        record
    }

    fn ids(results: &[&Record]) -> Vec<String> {
        results.iter().map(|r| r.id.to_string()).collect()
    }

    fn fixture() -> Vec<Record> {
        vec![
            record("1", "banana", 20, 3),
            record("2", "Apple", 10, 7),
            record("3", "cherry", 30, 3),
            record("4", "apple", 0, 1),
        ]
    }

    #[test]
    fn relevance_preserves_order() {
        let records = fixture();
        let input: Vec<&Record> = records.iter().rev().collect();
        assert_eq!(
            ids(&rank(input, SortKey::Relevance)),
            vec!["4", "3", "2", "1"]
        );
    }

    #[test]
    fn newest_and_oldest() {
        let records = fixture();
        let input: Vec<&Record> = records.iter().collect();
        assert_eq!(
            ids(&rank(input.clone(), SortKey::Newest)),
            vec!["3", "1", "2", "4"]
        );
        assert_eq!(
            ids(&rank(input, SortKey::Oldest)),
            vec!["4", "2", "1", "3"]
        );
    }

    #[test]
    fn popular_is_stable_for_ties() {
        let records = fixture();
        let input: Vec<&Record> = records.iter().collect();
        assert_eq!(
            ids(&rank(input, SortKey::Popular)),
            vec!["2", "1", "3", "4"]
        );

        let reversed: Vec<&Record> = records.iter().rev().collect();
        assert_eq!(
            ids(&rank(reversed, SortKey::Popular)),
            vec!["2", "3", "1", "4"]
        );
    }

    #[test]
    fn name_ignores_case_first() {
        let records = fixture();
        let input: Vec<&Record> = records.iter().collect();
        assert_eq!(
            ids(&rank(input, SortKey::Name)),
            vec!["2", "4", "1", "3"]
        );
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!("Popular".parse::<SortKey>(), Ok(SortKey::Popular));
        assert_eq!("default".parse::<SortKey>(), Ok(SortKey::Relevance));
        assert!("random".parse::<SortKey>().is_err());
    }
}
