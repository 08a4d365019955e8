use std::{collections::BTreeSet, io::Write, path::Path};

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{
    AddArgs, Cli, CollectionAction, Command, ConfigAction, EditArgs,
    HistoryAction, ListArgs, SearchArgs, TagAction,
};
use tagdex::{
    DataDir, Error, NewCollection, NewRecord, Record, RecordId,
    RecordUpdate, Result, SortKey, StateDb, Store,
    launcher,
    search::{self, SearchOutcome, SearchParams},
    state_db::{DEFAULT_SORT_KEY, HISTORY_KEY},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("TAGDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let state = StateDb::open(&data_dir.state_db())?;
    let mut store = state.load_store()?;

    match cli.command {
        Command::Add(args) => cmd_add(&state, &mut store, args)?,
        Command::Edit(args) => cmd_edit(&state, &mut store, args)?,
        Command::Remove { id } => {
            let removed = store.delete_record(&RecordId::parse(&id)?)?;
            state.save_store(&store)?;
            println!("Removed record '{}' ({})", removed.name, removed.id);
        }
        Command::Show { id, json } => {
            cmd_show(&store, &RecordId::parse(&id)?, json)?;
        }
        Command::Open { id, print } => {
            cmd_open(&state, &mut store, &RecordId::parse(&id)?, print)?;
        }
        Command::List(args) => cmd_list(&store, &args)?,
        Command::Tag { action } => match action {
            TagAction::Add { id, tag } => {
                let id = RecordId::parse(&id)?;
                let name = store.add_tag(&id, &tag)?;
                state.save_store(&store)?;
                println!("Tagged {id} with '{name}'");
            }
            TagAction::Remove { id, tag } => {
                let id = RecordId::parse(&id)?;
                if store.remove_tag(&id, &tag)? {
                    state.save_store(&store)?;
                    println!("Removed tag '{tag}' from {id}");
                } else {
                    println!("{id} is not tagged '{tag}'");
                }
            }
            TagAction::List { json } => tag_list(&store, json)?,
        },
        Command::Collection { action } => {
            cmd_collection(&state, &mut store, action)?;
        }
        Command::Search(args) => cmd_search(&state, &store, &args)?,
        Command::History { action } => match action {
            HistoryAction::List { json } => history_list(&state, json)?,
            HistoryAction::Clear => {
                let mut history = state.load_history()?;
                history.clear();
                state.save_history(&history)?;
                println!("Cleared search history");
            }
        },
        Command::Export { path } => {
            let path = path.unwrap_or_else(|| data_dir.default_export());
            std::fs::write(&path, store.export_json()?)?;
            println!(
                "Exported {} records and {} collections to {}",
                store.len(),
                store.collections().len(),
                path.display()
            );
        }
        Command::Import { path } => cmd_import(&state, &mut store, &path)?,
        Command::Config { action } => cmd_config(&state, action)?,
        Command::Status(args) => {
            cmd_status(&state, &store, &data_dir, args.json)?
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

/// Accept a collection by id or, failing that, by name.
fn resolve_collection(store: &Store, raw: &str) -> Result<RecordId> {
    let id = RecordId::parse(raw)?;
    if store.collection(&id).is_some() {
        return Ok(id);
    }
    store
        .collection_by_name(raw)
        .map(|c| c.id.clone())
        .ok_or_else(|| Error::NotFound {
            kind: "collection",
            name: raw.to_string(),
        })
}

fn resolve_collections(
    store: &Store,
    raw: &[String],
) -> Result<Vec<RecordId>> {
    raw.iter().map(|r| resolve_collection(store, r)).collect()
}

// -- Records --

fn cmd_add(state: &StateDb, store: &mut Store, args: AddArgs) -> Result<()> {
    let collection_ids = resolve_collections(store, &args.collections)?;
    let id = store.create_record(NewRecord {
        name: args.name,
        description: args.description,
        kind: args.kind,
        location: args.location,
        tags: args.tags,
        collection_ids,
    })?;
    state.save_store(store)?;

    if let Some(record) = store.record(&id) {
        println!("Added record '{}' ({id})", record.name);
    }
    Ok(())
}

fn cmd_edit(
    state: &StateDb,
    store: &mut Store,
    args: EditArgs,
) -> Result<()> {
    let id = RecordId::parse(&args.id)?;
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if !args.tags.is_empty() {
        Some(args.tags)
    } else {
        None
    };
    let collection_ids = if args.clear_collections {
        Some(Vec::new())
    } else if !args.collections.is_empty() {
        Some(resolve_collections(store, &args.collections)?)
    } else {
        None
    };

    let record = store.update_record(
        &id,
        RecordUpdate {
            name: args.name,
            description: args.description,
            kind: args.kind,
            location: args.location,
            tags,
            collection_ids,
        },
    )?;
    println!("Updated record '{}' ({id})", record.name);
    state.save_store(store)?;
    Ok(())
}

fn cmd_open(
    state: &StateDb,
    store: &mut Store,
    id: &RecordId,
    print: bool,
) -> Result<()> {
    let record = store.view_record(id)?;
    if print {
        let location = record.location().to_string();
        state.save_store(store)?;
        println!("{location}");
        return Ok(());
    }

    let target =
        launcher::open_target(record).ok_or_else(|| Error::NotFound {
            kind: "location",
            name: record.location().to_string(),
        })?;
    launcher::launch(&target)?;
    state.save_store(store)?;
    println!("Opened {target}");
    Ok(())
}

/// A record as printed by `show --json` and `list --json`.
#[derive(Serialize)]
struct RecordView<'a> {
    #[serde(flatten)]
    record: &'a Record,
    tags: BTreeSet<String>,
}

impl<'a> RecordView<'a> {
    fn new(store: &Store, record: &'a Record) -> Self {
        Self {
            record,
            tags: store.tags_for(&record.id),
        }
    }
}

fn cmd_show(store: &Store, id: &RecordId, json: bool) -> Result<()> {
    let record = store.record(id).ok_or_else(|| Error::NotFound {
        kind: "record",
        name: id.to_string(),
    })?;

    if json {
        let view = RecordView::new(store, record);
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let tags: Vec<String> = store.tags_for(id).into_iter().collect();
    let collections: Vec<&str> = record
        .collection_ids
        .iter()
        .filter_map(|cid| store.collection(cid))
        .map(|c| c.name.as_str())
        .collect();

    println!("id: {}", record.id);
    println!("name: {}", record.name);
    println!("type: {}", record.kind);
    println!(
        "location: {} ({:?})",
        record.location(),
        record.location_type()
    );
    if !record.description.is_empty() {
        println!("description: {}", record.description);
    }
    println!("tags: {}", tags.join(", "));
    println!("collections: {}", collections.join(", "));
    println!("views: {}", record.view_count());
    println!("created: {}", record.created_at.to_rfc3339());
    println!("updated: {}", record.updated_at.to_rfc3339());
    Ok(())
}

fn cmd_list(store: &Store, args: &ListArgs) -> Result<()> {
    let glob = args
        .location_glob
        .as_deref()
        .map(|pattern| {
            globset::Glob::new(pattern)
                .map(|g| g.compile_matcher())
                .map_err(|e| {
                    Error::Config(format!("invalid glob pattern: {e}"))
                })
        })
        .transpose()?;

    let records: Vec<&Record> = store
        .records()
        .into_iter()
        .filter(|r| glob.as_ref().is_none_or(|g| g.is_match(r.location())))
        .collect();

    if args.json {
        let views: Vec<RecordView> =
            records.iter().map(|r| RecordView::new(store, r)).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if records.is_empty() {
        println!("No records.");
    } else {
        for record in records {
            println!(
                "{}\t[{}]\t{}\t{}",
                record.id,
                record.kind,
                record.name,
                record.location()
            );
        }
    }
    Ok(())
}

// -- Tags --

fn tag_list(store: &Store, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct TagCount<'a> {
        name: &'a str,
        count: usize,
    }

    let tags: Vec<TagCount> = store
        .tags()
        .iter()
        .map(|(name, members)| TagCount {
            name,
            count: members.len(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else if tags.is_empty() {
        println!("No tags.");
    } else {
        for tag in tags {
            println!("{}\t{}", tag.name, tag.count);
        }
    }
    Ok(())
}

// -- Collections --

fn cmd_collection(
    state: &StateDb,
    store: &mut Store,
    action: CollectionAction,
) -> Result<()> {
    match action {
        CollectionAction::Create {
            name,
            description,
            color,
        } => {
            let id = store.create_collection(NewCollection {
                name: name.clone(),
                description,
                color,
            })?;
            state.save_store(store)?;
            println!("Created collection '{}' ({id})", name.trim());
        }
        CollectionAction::Remove { id } => {
            let id = resolve_collection(store, &id)?;
            let removed = store.delete_collection(&id)?;
            state.save_store(store)?;
            println!("Removed collection '{}' ({id})", removed.name);
        }
        CollectionAction::List { json } => {
            let collections = store.collections();
            if json {
                println!("{}", serde_json::to_string_pretty(&collections)?);
            } else if collections.is_empty() {
                println!("No collections.");
            } else {
                for c in collections {
                    println!(
                        "{}\t{}\t{} records\t{}",
                        c.id,
                        c.name,
                        c.member_ids.len(),
                        c.color
                    );
                }
            }
        }
        CollectionAction::Add {
            collection_id,
            record_id,
        } => {
            let cid = resolve_collection(store, &collection_id)?;
            let rid = RecordId::parse(&record_id)?;
            if store.add_to_collection(&cid, &rid)? {
                state.save_store(store)?;
                println!("Added {rid} to {cid}");
            } else {
                println!("{rid} is already in {cid}");
            }
        }
        CollectionAction::Drop {
            collection_id,
            record_id,
        } => {
            let cid = resolve_collection(store, &collection_id)?;
            let rid = RecordId::parse(&record_id)?;
            if store.remove_from_collection(&cid, &rid)? {
                state.save_store(store)?;
                println!("Dropped {rid} from {cid}");
            } else {
                println!("{rid} is not in {cid}");
            }
        }
    }
    Ok(())
}

// -- Search --

fn default_sort(state: &StateDb) -> Result<SortKey> {
    state
        .get_setting_or(DEFAULT_SORT_KEY, "relevance")?
        .parse()
        .map_err(Error::Config)
}

fn cmd_search(
    state: &StateDb,
    store: &Store,
    args: &SearchArgs,
) -> Result<()> {
    let collection = args
        .collection
        .as_deref()
        .map(|raw| resolve_collection(store, raw))
        .transpose()?;
    let sort = match args.sort {
        Some(sort) => sort,
        None => default_sort(state)?,
    };
    let params = SearchParams {
        query: args.query.clone(),
        collection,
        sort,
        limit: args.count,
    };

    let outcome = match search::execute_search(store, &params) {
        Ok(outcome) => {
            let mut history = state.load_history()?;
            history.record(&args.query, outcome.total, Utc::now());
            state.save_history(&history)?;
            outcome
        }
        Err(Error::Parse(err)) => {
            eprintln!("Invalid query: {err}");
            SearchOutcome {
                records: Vec::new(),
                total: 0,
                summary: search::summarize(0, 0, None),
            }
        }
        Err(e) => return Err(e),
    };

    let mut out = std::io::stdout().lock();
    if args.json {
        search::format_json(&mut out, &outcome, &args.query)?;
    } else if args.files {
        search::format_files(&mut out, &outcome)?;
    } else {
        search::format_human(&mut out, &outcome)?;
    }
    out.flush()?;
    Ok(())
}

fn history_list(state: &StateDb, json: bool) -> Result<()> {
    let history = state.load_history()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else if history.is_empty() {
        println!("No recent searches.");
    } else {
        for (i, entry) in history.entries().iter().enumerate() {
            println!(
                "{:>2}. {}\t{} result(s)\t{}",
                i + 1,
                entry.query,
                entry.result_count,
                entry.timestamp.to_rfc3339()
            );
        }
    }
    Ok(())
}

// -- Import / config / status --

fn cmd_import(state: &StateDb, store: &mut Store, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)?;
    let imported = Store::import_json(&json)?;
    state.save_store(&imported)?;
    *store = imported;

    println!(
        "Imported {} records, {} collections and {} tags from {}",
        store.len(),
        store.collections().len(),
        store.tags().len(),
        path.display()
    );
    Ok(())
}

fn cmd_config(state: &StateDb, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => match state.get_setting(&key)? {
            Some(value) => println!("{value}"),
            None => {
                return Err(Error::NotFound {
                    kind: "setting",
                    name: key,
                });
            }
        },
        ConfigAction::Set { key, value } => {
            if key == HISTORY_KEY {
                return Err(Error::Config(
                    "search history is managed by `tagdex history`".into(),
                ));
            }
            if key == DEFAULT_SORT_KEY {
                value.parse::<SortKey>().map_err(Error::Config)?;
            }
            state.set_setting(&key, &value)?;
            println!("{key} = {value}");
        }
        ConfigAction::Unset { key } => {
            if state.remove_setting(&key)? {
                println!("Unset {key}");
            } else {
                println!("{key} was not set");
            }
        }
        ConfigAction::List { json } => {
            let settings: Vec<(String, String)> = state
                .list_settings()?
                .into_iter()
                .filter(|(key, _)| key != HISTORY_KEY)
                .collect();
            if json {
                let map: serde_json::Map<String, serde_json::Value> = settings
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (key, value) in settings {
                    println!("{key} = {value}");
                }
            }
        }
    }
    Ok(())
}

fn cmd_status(
    state: &StateDb,
    store: &Store,
    data_dir: &DataDir,
    json: bool,
) -> Result<()> {
    let history = state.load_history()?;
    let sort = default_sort(state)?;

    if json {
        let status = serde_json::json!({
            "dataDir": data_dir.root().display().to_string(),
            "records": store.len(),
            "collections": store.collections().len(),
            "tags": store.tags().len(),
            "recentSearches": history.len(),
            "defaultSort": sort,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Records: {}", store.len());
        println!("Collections: {}", store.collections().len());
        for c in store.collections() {
            println!("  {}: {} records", c.name, c.member_ids.len());
        }
        println!("Tags: {}", store.tags().len());
        println!("Recent searches: {}", history.len());
        println!("Default sort: {sort}");
    }
    Ok(())
}
