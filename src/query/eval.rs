use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use super::parser::Expr;
use crate::{
    model::{Record, RecordType},
    record_id::RecordId,
    store::Store,
};

type IdSet<'s> = HashSet<&'s RecordId>;

/// Evaluate `expr` over `candidates` and return the matching records.
///
/// `candidates` is the active scope (a collection's members or the whole
/// store) in canonical order, and every result is drawn from it; `not`
/// complements within it. Results come back in candidate order, except
/// when the root is `xor`: then the records matching every operand come
/// first, followed by those matching only some.
pub fn evaluate<'s>(
    expr: &Expr,
    store: &'s Store,
    candidates: &[&'s Record],
) -> Vec<&'s Record> {
    let evaluator = Evaluator { store, candidates };
    match expr {
        Expr::Xor(parts) => evaluator.xor_ordered(parts),
        other => {
            let matched = evaluator.matches(other);
            evaluator.in_order(|id| matched.contains(id))
        }
    }
}

struct Evaluator<'a, 's> {
    store: &'s Store,
    candidates: &'a [&'s Record],
}

impl<'s> Evaluator<'_, 's> {
    fn matches(&self, expr: &Expr) -> IdSet<'s> {
        match expr {
            Expr::All => self.select(|_| true),
            Expr::Tag(name) => match self.store.tags().members(name) {
                Some(members) => self.select(|r| members.contains(&r.id)),
                None => IdSet::new(),
            },
            Expr::Type(name) => match RecordType::from_name(name) {
                Some(kind) => self.select(|r| r.kind == kind),
                None => IdSet::new(),
            },
            Expr::Word(needle) => self.select(|r| r.mentions(needle)),
            Expr::Not(inner) => {
                let excluded = self.matches(inner);
                self.select(|r| !excluded.contains(&r.id))
            }
            Expr::And(parts) => parts
                .iter()
                .map(|part| self.matches(part))
                .reduce(|acc, next| acc.intersection(&next).copied().collect())
                .unwrap_or_default(),
            // Below the root, xor contributes its OR-set.
            Expr::Or(parts) | Expr::Xor(parts) => parts
                .iter()
                .flat_map(|part| self.matches(part))
                .collect(),
            Expr::Scoped { scope, expr } => {
                let mut matched = self.matches(expr);
                match self.folder(scope) {
                    Some(folder) => matched.retain(|id| folder.contains(*id)),
                    None => debug!(
                        scope = scope.as_str(),
                        "unknown folder, matching tags without it"
                    ),
                }
                matched
            }
        }
    }

    // AND-set first, then the OR-set minus the AND-set.
    fn xor_ordered(&self, parts: &[Expr]) -> Vec<&'s Record> {
        let sets: Vec<IdSet<'s>> =
            parts.iter().map(|part| self.matches(part)).collect();
        let both: IdSet<'s> = sets
            .iter()
            .cloned()
            .reduce(|acc, next| acc.intersection(&next).copied().collect())
            .unwrap_or_default();
        let either: IdSet<'s> = sets.into_iter().flatten().collect();

        let mut ordered = self.in_order(|id| both.contains(id));
        ordered.extend(
            self.in_order(|id| either.contains(id) && !both.contains(id)),
        );
        ordered
    }

    /// A folder is a collection with that name, or failing that, a tag.
    fn folder(&self, scope: &str) -> Option<&'s BTreeSet<RecordId>> {
        let store = self.store;
        store
            .collection_by_name(scope)
            .map(|collection| &collection.member_ids)
            .or_else(|| store.tags().members(scope))
    }

    fn select(&self, keep: impl Fn(&Record) -> bool) -> IdSet<'s> {
        self.candidates
            .iter()
            .copied()
            .filter(|r| keep(r))
            .map(|r| &r.id)
            .collect()
    }

    fn in_order(&self, keep: impl Fn(&RecordId) -> bool) -> Vec<&'s Record> {
        self.candidates
            .iter()
            .copied()
            .filter(|r| keep(&r.id))
            .collect()
    }
}
