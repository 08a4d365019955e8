use std::{
    fmt,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::Result,
    model::{LocationType, Record},
};

/// What gets handed to the desktop's default handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTarget {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for OpenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenTarget::Url(url) => f.write_str(url),
            OpenTarget::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Work out what to launch for `record`.
///
/// A missing local file falls back to its parent directory. Returns `None`
/// when neither exists.
pub fn open_target(record: &Record) -> Option<OpenTarget> {
    let location = record.location().trim();
    if record.location_type() == LocationType::External {
        return Some(OpenTarget::Url(location.to_string()));
    }
    if location.is_empty() {
        return None;
    }

    let path = std::path::absolute(Path::new(location)).ok()?;
    if path.exists() {
        return Some(OpenTarget::Path(path));
    }
    let parent = path.parent()?;
    debug!(path = %path.display(), "missing file, opening its folder");
    parent
        .is_dir()
        .then(|| OpenTarget::Path(parent.to_path_buf()))
}

pub fn launch(target: &OpenTarget) -> Result<()> {
    match target {
        OpenTarget::Url(url) => open::that(url)?,
        OpenTarget::Path(path) => open::that(path)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{model::RecordType, record_id::RecordId};

    fn record_at(location: &str) -> Record {
        Record::new(
            RecordId::from_raw("4000"),
            "notes",
            "",
            RecordType::Document,
            location,
            Utc::now(),
        )
    }

    #[test]
    fn urls_open_as_is() {
        let record = record_at("https://example.com/a.pdf");
        assert_eq!(
            open_target(&record),
            Some(OpenTarget::Url("https://example.com/a.pdf".into()))
        );
    }

    #[test]
    fn existing_file_opens_directly() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "hello").unwrap();

        let record = record_at(file.to_str().unwrap());
        assert_eq!(open_target(&record), Some(OpenTarget::Path(file)));
    }

    #[test]
    fn missing_file_falls_back_to_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("gone.txt");

        let record = record_at(file.to_str().unwrap());
        assert_eq!(
            open_target(&record),
            Some(OpenTarget::Path(tmp.path().to_path_buf()))
        );
    }

    #[test]
    fn missing_folder_has_no_target() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("nope").join("gone.txt");

        assert_eq!(open_target(&record_at(file.to_str().unwrap())), None);
        assert_eq!(open_target(&record_at("  ")), None);
    }
}
