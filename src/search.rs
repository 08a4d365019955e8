use std::io::Write;

use serde::Serialize;
use tracing::debug;

use crate::{
    error::Result,
    model::Record,
    query::{evaluate, parse_query},
    ranker::{SortKey, rank},
    record_id::RecordId,
    store::Store,
};

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    /// Active collection; `None` searches every record.
    pub collection: Option<RecordId>,
    pub sort: SortKey,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome<'s> {
    pub records: Vec<&'s Record>,
    /// Matches before the limit was applied.
    pub total: usize,
    pub summary: String,
}

/// Execute the full search pipeline.
///
/// 1. Parse the query
/// 2. Narrow candidates to the active collection, if any
/// 3. Evaluate the expression over the candidates
/// 4. Rank by the sort key
/// 5. Cut to the limit
pub fn execute_search<'s>(
    store: &'s Store,
    params: &SearchParams,
) -> Result<SearchOutcome<'s>> {
    let expr = parse_query(&params.query)?;
    let candidates = store.records_in_scope(params.collection.as_ref())?;
    debug!(query = %expr, candidates = candidates.len(), "evaluating");

    let mut records = rank(evaluate(&expr, store, &candidates), params.sort);
    let total = records.len();
    if let Some(limit) = params.limit {
        records.truncate(limit);
    }

    let scope = params
        .collection
        .as_ref()
        .and_then(|id| store.collection(id))
        .map(|c| c.name.as_str());
    let summary = summarize(records.len(), total, scope);
    Ok(SearchOutcome {
        records,
        total,
        summary,
    })
}

/// `"No results"`, `"1 result"`, `"12 results in Trips"`,
/// `"12 results, showing 5 of 12"`.
pub fn summarize(shown: usize, total: usize, scope: Option<&str>) -> String {
    let mut summary = match total {
        0 => "No results".to_string(),
        1 => "1 result".to_string(),
        n => format!("{n} results"),
    };
    if let Some(name) = scope {
        summary.push_str(&format!(" in {name}"));
    }
    if shown < total {
        summary.push_str(&format!(", showing {shown} of {total}"));
    }
    summary
}

/// Format results for human-readable terminal output.
pub fn format_human(
    out: &mut impl Write,
    outcome: &SearchOutcome,
) -> Result<()> {
    for (i, record) in outcome.records.iter().enumerate() {
        writeln!(
            out,
            "{:>3}. [{}] {} #{}",
            i + 1,
            record.kind,
            record.name,
            record.id
        )?;
        if !record.location().is_empty() {
            writeln!(out, "     {}", record.location())?;
        }
    }
    if !outcome.records.is_empty() {
        writeln!(out)?;
    }
    writeln!(out, "{}", outcome.summary)?;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutcome<'a> {
    query: &'a str,
    total: usize,
    summary: &'a str,
    results: &'a [&'a Record],
}

/// Format results as a JSON document.
pub fn format_json(
    out: &mut impl Write,
    outcome: &SearchOutcome,
    query: &str,
) -> Result<()> {
    let doc = JsonOutcome {
        query,
        total: outcome.total,
        summary: &outcome.summary,
        results: &outcome.records,
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}

/// Format results as plain locations, one per line.
pub fn format_files(
    out: &mut impl Write,
    outcome: &SearchOutcome,
) -> Result<()> {
    for record in &outcome.records {
        if !record.location().is_empty() {
            writeln!(out, "{}", record.location())?;
        }
    }
    Ok(())
}
