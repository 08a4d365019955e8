use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use tagdex::{RecordType, SortKey};

#[derive(Debug, Parser)]
#[command(
    name = "tagdex",
    about = "Tag, collect and search your files and links",
    version
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a record
    Add(AddArgs),
    /// Change fields, tags or collections of a record
    Edit(EditArgs),
    /// Delete a record and detach it from its tags and collections
    Remove {
        /// Record id
        id: String,
    },
    /// Show one record
    Show {
        /// Record id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count a view and open the record's location
    Open {
        /// Record id
        id: String,
        /// Print the location instead of launching it
        #[arg(long)]
        print: bool,
    },
    /// List all records
    List(ListArgs),
    /// Manage tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Manage collections
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Search records with the query language
    Search(SearchArgs),
    /// Recent searches
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Write every record, tag and collection to a JSON file
    Export {
        /// Destination (defaults to export.json in the data directory)
        path: Option<PathBuf>,
    },
    /// Replace the current state with a JSON export
    Import {
        /// Export file to load
        path: PathBuf,
    },
    /// Read and write settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show system status and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

/// Accepts any known record type except `collection`.
fn parse_record_type(value: &str) -> Result<RecordType, String> {
    match RecordType::from_name(value) {
        Some(RecordType::Collection) => {
            Err("use `tagdex collection create` for collections".into())
        }
        Some(kind) => Ok(kind),
        None => Err(format!(
            "unknown type '{value}' (expected image, video, document, \
             audio, link or other)"
        )),
    }
}

// -- Records --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Display name
    pub name: String,

    /// File path or URL
    #[arg(short, long)]
    pub location: String,

    /// Record type
    #[arg(
        short = 't',
        long = "type",
        value_parser = parse_record_type,
        default_value = "other"
    )]
    pub kind: RecordType,

    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Tag to attach (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Collection id to join (repeatable)
    #[arg(short, long = "collection")]
    pub collections: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Record id
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(short = 't', long = "type", value_parser = parse_record_type)]
    pub kind: Option<RecordType>,

    #[arg(short, long)]
    pub location: Option<String>,

    /// Replace all tags (repeatable)
    #[arg(long = "tag", conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    /// Remove every tag
    #[arg(long)]
    pub clear_tags: bool,

    /// Replace all collection memberships (repeatable)
    #[arg(short, long = "collection", conflicts_with = "clear_collections")]
    pub collections: Vec<String>,

    /// Leave every collection
    #[arg(long)]
    pub clear_collections: bool,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only records whose location matches this glob
    #[arg(long)]
    pub location_glob: Option<String>,
}

// -- Tag subcommands --

#[derive(Debug, Subcommand)]
pub enum TagAction {
    /// Attach a tag to a record
    Add {
        /// Record id
        id: String,
        tag: String,
    },
    /// Detach a tag from a record
    Remove {
        /// Record id
        id: String,
        tag: String,
    },
    /// List tags with their record counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Collection subcommands --

#[derive(Debug, Subcommand)]
pub enum CollectionAction {
    /// Create a collection
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Display color, e.g. #3b82f6
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a collection (its records are kept)
    Remove {
        /// Collection id
        id: String,
    },
    /// List all collections
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Put a record in a collection
    Add {
        collection_id: String,
        record_id: String,
    },
    /// Take a record out of a collection
    Drop {
        collection_id: String,
        record_id: String,
    },
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Search only within this collection (id or name)
    #[arg(short = 'c', long)]
    pub collection: Option<String>,

    /// Result order (defaults to the `default_sort` setting)
    #[arg(short, long, value_enum)]
    pub sort: Option<SortKey>,

    /// Maximum number of results to print
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output results as JSON
    #[arg(long, conflicts_with = "files")]
    pub json: bool,

    /// Output only locations (one per line)
    #[arg(long)]
    pub files: bool,
}

// -- History --

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// Show recent searches, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget all recent searches
    Clear,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print a setting
    Get { key: String },
    /// Store a setting
    Set { key: String, value: String },
    /// Delete a setting
    Unset { key: String },
    /// Print every setting except the search history
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "tagdex",
            &mut std::io::stdout(),
        );
    }
}
