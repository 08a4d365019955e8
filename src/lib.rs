//! tagdex - a local catalogue of files and links organised with tags and
//! collections.
//!
//! Records (images, videos, documents, audio, links) carry free-form tags
//! and may belong to collections. A small query language selects records
//! by tag, type, free words and boolean operators; see [`query`].
//!
//! # Quick start
//!
//! ```no_run
//! use tagdex::{DataDir, NewRecord, RecordType, StateDb};
//! use tagdex::search::{self, SearchParams};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let state = StateDb::open(&data_dir.state_db()).unwrap();
//! let mut store = state.load_store().unwrap();
//!
//! store
//!     .create_record(NewRecord {
//!         name: "Beach at sunset".to_string(),
//!         kind: RecordType::Image,
//!         location: "/photos/beach.jpg".to_string(),
//!         tags: vec!["vacances".to_string()],
//!         ..NewRecord::default()
//!     })
//!     .unwrap();
//! state.save_store(&store).unwrap();
//!
//! let params = SearchParams {
//!     query: "#vacances _image".to_string(),
//!     ..SearchParams::default()
//! };
//! let outcome = search::execute_search(&store, &params).unwrap();
//! for record in &outcome.records {
//!     println!("{} -> {}", record.name, record.location());
//! }
//! println!("{}", outcome.summary);
//! ```

pub mod data_dir;
pub mod error;
pub mod history;
pub mod launcher;
pub mod model;
pub mod query;
pub mod ranker;
pub mod record_id;
pub mod search;
pub mod snapshot;
pub mod state_db;
pub mod store;
pub mod tag_index;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use history::{HistoryEntry, SearchHistory};
pub use model::{Collection, LocationType, Record, RecordType};
pub use ranker::SortKey;
pub use record_id::RecordId;
pub use snapshot::Snapshot;
pub use state_db::StateDb;
pub use store::{
    CollectionUpdate, NewCollection, NewRecord, RecordUpdate, Store,
};
pub use tag_index::TagIndex;
