// src/graph.rs

//! Dependency graph expansion
//!
//! Walks a formula's declared edges recursively, consulting a caller-supplied
//! decision function per edge, and produces a deduplicated, tag-merged plan
//! ordered dependency-before-dependent.
//!
//! The decision function returns an explicit [`Decision`] value rather than
//! signaling through exceptions, so prune logic is testable in isolation:
//!
//! - `Prune`: drop the edge and its subtree
//! - `KeepButDontRecurse`: keep the edge, do not expand the target's own
//!   edges (test-only deps of an inner dependency)
//! - `Skip`: the target already satisfies the edge; contributes nothing
//! - `Descend`: keep the edge and expand the target

use crate::error::{Error, Result};
use crate::formula::{BuildOptions, Dependency, Formula, FormulaStore, Options};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Verdict for one declared edge during expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Prune,
    KeepButDontRecurse,
    Skip,
    Descend,
}

/// One entry of an install plan: a merged edge plus the options the
/// dependent's install passes down to it
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub dep: Dependency,
    pub options: Options,
}

impl PlanEntry {
    pub fn new(dep: Dependency) -> Self {
        Self {
            dep,
            options: Options::new(),
        }
    }
}

/// The effective edges of a formula: declared dependencies plus any
/// requirement that is unsatisfied and falls back to a formula
///
/// A fatal requirement with no fallback and a failing probe aborts the plan.
pub fn declared_edges(formula: &Formula) -> Result<Vec<Dependency>> {
    let mut edges = formula.deps.clone();
    for req in &formula.requirements {
        if (req.satisfied)() {
            continue;
        }
        match req.to_dependency() {
            Some(dep) => {
                debug!(
                    "requirement {} of {} resolves to formula {}",
                    req.name, formula.name, dep.name
                );
                edges.push(dep);
            }
            None if req.fatal => {
                return Err(Error::UnsatisfiedRequirement {
                    formula: formula.name.clone(),
                    requirement: req.name.clone(),
                });
            }
            None => {
                warn!(
                    "requirement {} of {} is unsatisfied; continuing",
                    req.name, formula.name
                );
            }
        }
    }
    Ok(edges)
}

/// Expand a formula's dependency graph into an ordered, merged edge list
///
/// The walk is depth-first postorder: a dependency's own edges are emitted
/// before the edge to the dependency itself. Same-target edges merge by tag
/// union, keeping the earliest position; the merged list is then re-ordered
/// so every edge follows everything it depends on.
///
/// A direct or transitive cycle back to any formula on the walk stack is a
/// structural error; no partial plan is returned.
pub fn expand<F>(root: &Formula, store: &dyn FormulaStore, mut decide: F) -> Result<Vec<Dependency>>
where
    F: FnMut(&Formula, &Dependency) -> Decision,
{
    let mut visiting = Vec::new();
    let mut collected = Vec::new();
    expand_inner(root, store, &mut decide, &mut visiting, &mut collected)?;
    let merged = merge_repeats(collected);
    reorder(merged, store)
}

fn expand_inner<F>(
    formula: &Formula,
    store: &dyn FormulaStore,
    decide: &mut F,
    visiting: &mut Vec<String>,
    collected: &mut Vec<Dependency>,
) -> Result<()>
where
    F: FnMut(&Formula, &Dependency) -> Decision,
{
    visiting.push(formula.name.clone());
    for dep in declared_edges(formula)? {
        if dep.name == formula.name {
            return Err(Error::SelfDependency(formula.name.clone()));
        }
        if visiting.contains(&dep.name) {
            // The target is an ancestor on the walk stack
            return Err(Error::CyclicDependency {
                formula: dep.name.clone(),
                dependency: formula.name.clone(),
            });
        }
        match decide(formula, &dep) {
            Decision::Prune => {
                debug!("pruned {} -> {} ({})", formula.name, dep.name, dep.tags);
            }
            Decision::Skip => {
                debug!("skipped {} -> {}: already satisfied", formula.name, dep.name);
            }
            Decision::KeepButDontRecurse => {
                collected.push(dep);
            }
            Decision::Descend => {
                let target = store.find(&dep.name)?;
                expand_inner(&target, store, decide, visiting, collected)?;
                collected.push(dep);
            }
        }
    }
    visiting.pop();
    Ok(())
}

/// Merge edges to the same target by tag union, keeping first positions
fn merge_repeats(edges: Vec<Dependency>) -> Vec<Dependency> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, Dependency> = HashMap::new();
    for dep in edges {
        match by_name.get_mut(&dep.name) {
            Some(existing) => existing.merge_from(&dep),
            None => {
                order.push(dep.name.clone());
                by_name.insert(dep.name.clone(), dep);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}

/// Re-order a merged edge list so every edge follows its own dependencies
///
/// Kahn's algorithm restricted to plan members, preferring the original
/// positions so the result is deterministic. Targets kept without recursion
/// may be unknown to the store; they simply contribute no ordering edges.
fn reorder(merged: Vec<Dependency>, store: &dyn FormulaStore) -> Result<Vec<Dependency>> {
    let index: HashMap<&str, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    // dependents[i] lists plan members that must come after entry i
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); merged.len()];
    let mut in_degree: Vec<usize> = vec![0; merged.len()];
    for (i, dep) in merged.iter().enumerate() {
        let Ok(formula) = store.find(&dep.name) else {
            continue;
        };
        let mut seen = HashSet::new();
        for edge in &formula.deps {
            if let Some(&j) = index.get(edge.name.as_str())
                && j != i
                && seen.insert(j)
            {
                dependents[j].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..merged.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(merged.len());
    while let Some(i) = pop_lowest(&mut ready) {
        order.push(i);
        for &j in &dependents[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push_back(j);
            }
        }
    }

    if order.len() != merged.len() {
        // Expansion already rejects cycles on the walk stack; reaching this
        // means declared metadata disagrees with what was walked
        let stuck = in_degree
            .iter()
            .position(|&d| d > 0)
            .map(|i| merged[i].name.clone())
            .unwrap_or_default();
        return Err(Error::CyclicDependency {
            formula: stuck.clone(),
            dependency: stuck,
        });
    }

    let mut slots: Vec<Option<Dependency>> = merged.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

/// Pop the smallest index from the ready set, for deterministic output
fn pop_lowest(ready: &mut VecDeque<usize>) -> Option<usize> {
    let min_pos = ready
        .iter()
        .enumerate()
        .min_by_key(|(_, &v)| v)
        .map(|(pos, _)| pos)?;
    ready.remove(min_pos)
}

/// The standard decision procedure for install plans
///
/// Inputs, in evaluation order:
/// 1. option pruning: `:optional` edges are kept only when requested,
///    `:recommended` edges are dropped when opted out
/// 2. `:test` edges are followed only when requested, and only one level
///    deep (the root's own edges), without expanding the target
/// 3. build-only edges of a dependent that pours its bottle are pruned
/// 4. an edge whose target already satisfies it is skipped
pub fn standard_decision(
    dep: &Dependency,
    dependent_is_root: bool,
    dependent_pours: bool,
    opts: &BuildOptions,
    include_test: bool,
    satisfied: &dyn Fn(&Dependency) -> bool,
) -> Decision {
    if dep.tags.optional && !opts.with(dep.option_name()) {
        return Decision::Prune;
    }
    if dep.tags.recommended && opts.without(dep.option_name()) {
        return Decision::Prune;
    }
    if dep.tags.test {
        if dependent_is_root && include_test {
            return Decision::KeepButDontRecurse;
        }
        return Decision::Prune;
    }
    if dep.tags.build_only() && dependent_pours {
        return Decision::Prune;
    }
    if satisfied(dep) {
        return Decision::Skip;
    }
    Decision::Descend
}
