//! Reconciles the cached timeline with what a mutation returned, so the UI doesn't need a refetch.
//!
//! Each function takes the current snapshot by value and returns the next one. They are only
//! ever applied through [`QueryCache::update`](query_cache::data_model::QueryCache::update),
//! which swaps the snapshot in one step before any listener runs.

use std::collections::BTreeMap;

use crate::model::{Course, CoursePlan, DeletedTerm, Term, TermId};

/// Appends, never sorts: terms stay in the order they were created.
pub fn add_term(mut plan: CoursePlan, added: &Term) -> CoursePlan {
    plan.terms.push(added.clone());
    plan
}

pub fn remove_term(mut plan: CoursePlan, removed: &DeletedTerm) -> CoursePlan {
    plan.terms.retain(|term| term.id != removed.id);
    plan
}

/// Every term matching `added.term_id` gets the course (there should be exactly one).
pub fn add_course(mut plan: CoursePlan, added: &Course) -> CoursePlan {
    plan.terms
        .iter_mut()
        .filter(|term| term.id == added.term_id)
        .for_each(|term| term.courses.push(added.clone()));
    plan
}

pub fn remove_course(mut plan: CoursePlan, removed: &Course) -> CoursePlan {
    plan.terms
        .iter_mut()
        .filter(|term| term.id == removed.term_id)
        .for_each(|term| term.courses.retain(|course| course.id != removed.id));
    plan
}

/// Term name to every id carrying it. Names aren't unique server-side, so a name can map to
/// several ids; callers decide what an ambiguous name means.
pub fn term_lookup(plan: &CoursePlan) -> BTreeMap<&str, Vec<TermId>> {
    let mut lookup: BTreeMap<&str, Vec<TermId>> = BTreeMap::new();
    for term in &plan.terms {
        lookup.entry(term.name.as_str()).or_default().push(term.id);
    }
    lookup
}
