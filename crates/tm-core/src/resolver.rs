//! Chain Resolver: dependency graph and execution order.
//!
//! Edges run from a dependency to its dependent (predecessor → record and
//! extra dependency → record), so a topological order applies dependencies
//! first. Among records that are otherwise unordered, the lower discovery
//! index wins so plans are deterministic across runs.

use crate::error::{CoreError, CoreResult};
use crate::record::MigrationRecord;
use crate::revision::RevisionId;
use crate::store::MigrationStore;
use crate::target::Target;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as EdgeDirection;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

/// Whether a step applies a record's forward or reverse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upgrade => write!(f, "upgrade"),
            Direction::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// One step of a plan.
#[derive(Debug)]
pub struct PlannedStep<'s> {
    /// Record whose action runs
    pub record: &'s MigrationRecord,
    /// Marker value once this step commits
    pub marker_after: Option<RevisionId>,
}

/// An ordered sequence of steps between two marker values.
#[derive(Debug)]
pub struct MigrationPlan<'s> {
    pub direction: Direction,
    /// Marker before the first step
    pub from: Option<RevisionId>,
    /// Marker after the last step
    pub to: Option<RevisionId>,
    pub steps: Vec<PlannedStep<'s>>,
}

impl<'s> MigrationPlan<'s> {
    fn empty(direction: Direction, at: Option<RevisionId>) -> Self {
        Self {
            direction,
            from: at.clone(),
            to: at,
            steps: Vec::new(),
        }
    }

    /// True when the marker is already at the target.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Records in execution order.
    pub fn records(&self) -> impl Iterator<Item = &'s MigrationRecord> + '_ {
        self.steps.iter().map(|s| s.record)
    }

    /// Revisions in execution order.
    pub fn revisions(&self) -> Vec<&'s str> {
        self.steps.iter().map(|s| s.record.revision.as_str()).collect()
    }
}

/// Validated dependency graph over a [`MigrationStore`].
///
/// Rebuilt for every run; never cached, because the store is the source of
/// truth.
#[derive(Debug)]
pub struct ChainResolver<'s> {
    store: &'s MigrationStore,
    /// Node `i` is the record at discovery index `i`
    graph: DiGraph<usize, ()>,
    /// Full deterministic topological order (store indices)
    order: Vec<usize>,
}

impl<'s> ChainResolver<'s> {
    /// Build the graph, failing on dangling references or cycles.
    pub fn build(store: &'s MigrationStore) -> CoreResult<Self> {
        let mut graph = DiGraph::with_capacity(store.len(), store.len());
        for i in 0..store.len() {
            graph.add_node(i);
        }

        for (i, record) in store.iter().enumerate() {
            for dep in record.dependencies() {
                let j = store
                    .index_of(dep)
                    .ok_or_else(|| CoreError::BrokenChain {
                        revision: record.revision.to_string(),
                        missing: dep.to_string(),
                    })?;
                graph.add_edge(NodeIndex::new(j), NodeIndex::new(i), ());
            }
        }

        let mut resolver = Self {
            store,
            graph,
            order: Vec::new(),
        };

        if let Err(cycle) = toposort(&resolver.graph, None) {
            return Err(CoreError::CycleDetected {
                cycle: resolver.find_cycle_path(cycle.node_id()),
            });
        }
        resolver.order = resolver.stable_order();
        Ok(resolver)
    }

    /// Kahn's algorithm, always releasing the lowest discovery index first.
    fn stable_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.edges_directed(n, EdgeDirection::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for edge in self.graph.edges(NodeIndex::new(i)) {
                let t = edge.target().index();
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    ready.push(Reverse(t));
                }
            }
        }
        order
    }

    /// Walk edges inside the strongly connected component containing `start`
    /// to produce a readable cycle path.
    fn find_cycle_path(&self, start: NodeIndex) -> String {
        let component: HashSet<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.contains(&start))
            .map(|scc| scc.into_iter().collect())
            .unwrap_or_default();

        let mut path = vec![self.revision_at(start).to_string()];
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut current = start;

        loop {
            let next = self
                .graph
                .edges(current)
                .map(|e| e.target())
                .filter(|t| component.contains(t))
                .min_by_key(|t| (visited.contains(t) && *t != start, t.index()));
            let Some(next) = next else { break };
            path.push(self.revision_at(next).to_string());
            if next == start || !visited.insert(next) {
                break;
            }
            current = next;
        }

        path.join(" -> ")
    }

    fn revision_at(&self, node: NodeIndex) -> &'s RevisionId {
        &self.store.at(self.graph[node]).revision
    }

    fn record(&self, index: usize) -> &'s MigrationRecord {
        self.store.at(index)
    }

    /// Records in full resolved order, root first.
    pub fn history(&self) -> Vec<&'s MigrationRecord> {
        self.order.iter().map(|&i| self.record(i)).collect()
    }

    /// Records covered by `current` (the marker and everything it depends
    /// on), in resolved order.
    pub fn applied(&self, current: Option<&RevisionId>) -> CoreResult<Vec<&'s MigrationRecord>> {
        self.ensure_linear()?;
        let Some(current) = current else {
            return Ok(Vec::new());
        };
        let covered = self.ancestors_inclusive(self.index_of(current)?);
        Ok(self
            .order
            .iter()
            .filter(|i| covered.contains(i))
            .map(|&i| self.record(i))
            .collect())
    }

    /// Records without a successor, in discovery order.
    pub fn heads(&self) -> Vec<&'s MigrationRecord> {
        self.graph
            .node_indices()
            .filter(|&n| self.graph.edges(n).next().is_none())
            .map(|n| self.record(self.graph[n]))
            .collect()
    }

    /// Records without a predecessor, in discovery order.
    pub fn roots(&self) -> Vec<&'s MigrationRecord> {
        self.store.iter().filter(|r| r.is_root()).collect()
    }

    /// The unique head, or `None` for an empty store.
    pub fn head(&self) -> CoreResult<Option<&'s RevisionId>> {
        let heads = self.heads();
        if heads.len() > 1 {
            return Err(CoreError::MultipleHeads {
                heads: heads.iter().map(|r| r.revision.to_string()).collect(),
            });
        }
        Ok(heads.into_iter().next().map(|r| &r.revision))
    }

    /// Fail unless the store forms one unbranched chain.
    ///
    /// A single marker can only describe a prefix of a simple path, so two
    /// records revising the same predecessor are rejected even when a later
    /// record depends on both.
    fn ensure_linear(&self) -> CoreResult<()> {
        let roots = self.roots();
        if roots.len() > 1 {
            return Err(CoreError::MultipleRoots {
                roots: roots.iter().map(|r| r.revision.to_string()).collect(),
            });
        }

        let mut successors: HashMap<&RevisionId, Vec<&'s RevisionId>> = HashMap::new();
        for record in self.store.iter() {
            if let Some(down) = &record.down_revision {
                successors.entry(down).or_default().push(&record.revision);
            }
        }
        let branch = self
            .order
            .iter()
            .filter_map(|&i| successors.get(&self.record(i).revision))
            .find(|children| children.len() > 1);
        if let Some(children) = branch {
            return Err(CoreError::MultipleHeads {
                heads: children.iter().map(|r| r.to_string()).collect(),
            });
        }
        Ok(())
    }

    fn index_of(&self, revision: &str) -> CoreResult<usize> {
        self.store
            .index_of(revision)
            .ok_or_else(|| CoreError::UnknownRevision {
                revision: revision.to_string(),
            })
    }

    /// `revision` plus everything it transitively depends on.
    fn ancestors_inclusive(&self, index: usize) -> HashSet<usize> {
        let mut seen = HashSet::new();
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            if seen.insert(i) {
                stack.extend(
                    self.graph
                        .edges_directed(NodeIndex::new(i), EdgeDirection::Incoming)
                        .map(|e| e.source().index()),
                );
            }
        }
        seen
    }

    fn invalid_target(target: &Target, reason: impl Into<String>) -> CoreError {
        CoreError::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Steps strictly after `current` up to and including `target`.
    pub fn plan_upgrade(
        &self,
        current: Option<&RevisionId>,
        target: &Target,
    ) -> CoreResult<MigrationPlan<'s>> {
        self.ensure_linear()?;
        let current_idx = current.map(|c| self.index_of(c)).transpose()?;

        let target_idx = match target {
            Target::Head => match self.head()? {
                Some(head) => self.index_of(head)?,
                None => return Ok(MigrationPlan::empty(Direction::Upgrade, None)),
            },
            Target::Base => {
                return match current {
                    None => Ok(MigrationPlan::empty(Direction::Upgrade, None)),
                    Some(_) => Err(Self::invalid_target(
                        target,
                        "base is behind the current revision; use downgrade",
                    )),
                };
            }
            Target::Revision(token) => self.index_of(self.store.resolve(token)?)?,
            Target::Relative(steps) => {
                if *steps < 0 {
                    return Err(Self::invalid_target(
                        target,
                        "relative upgrade must be positive",
                    ));
                }
                let applied = current_idx
                    .map(|c| self.ancestors_inclusive(c))
                    .unwrap_or_default();
                let pending: Vec<usize> = self
                    .order
                    .iter()
                    .copied()
                    .filter(|i| !applied.contains(i))
                    .collect();
                let wanted = *steps as usize;
                if wanted == 0 {
                    return Ok(MigrationPlan::empty(Direction::Upgrade, current.cloned()));
                }
                match pending.get(wanted - 1) {
                    Some(&i) => i,
                    None => {
                        return Err(Self::invalid_target(
                            target,
                            format!(
                                "only {} revision(s) ahead of the current marker",
                                pending.len()
                            ),
                        ))
                    }
                }
            }
        };

        let applied = current_idx
            .map(|c| self.ancestors_inclusive(c))
            .unwrap_or_default();

        if Some(target_idx) == current_idx {
            return Ok(MigrationPlan::empty(Direction::Upgrade, current.cloned()));
        }
        if applied.contains(&target_idx) {
            return Err(Self::invalid_target(
                target,
                "target is behind the current revision; use downgrade",
            ));
        }

        let needed = self.ancestors_inclusive(target_idx);
        if let (Some(c), Some(cur)) = (current_idx, current) {
            if !needed.contains(&c) {
                return Err(Self::invalid_target(
                    target,
                    format!("current revision '{cur}' is not an ancestor of the target"),
                ));
            }
        }

        let steps: Vec<PlannedStep<'s>> = self
            .order
            .iter()
            .filter(|i| needed.contains(i) && !applied.contains(i))
            .map(|&i| {
                let record = self.record(i);
                PlannedStep {
                    record,
                    marker_after: Some(record.revision.clone()),
                }
            })
            .collect();

        let plan = MigrationPlan {
            direction: Direction::Upgrade,
            from: current.cloned(),
            to: Some(self.record(target_idx).revision.clone()),
            steps,
        };
        log::debug!(
            "Upgrade plan {:?} -> {:?}: {:?}",
            plan.from,
            plan.to,
            plan.revisions()
        );
        Ok(plan)
    }

    /// Reverse steps from `current` back to immediately after `target`.
    pub fn plan_downgrade(
        &self,
        current: Option<&RevisionId>,
        target: &Target,
    ) -> CoreResult<MigrationPlan<'s>> {
        self.ensure_linear()?;
        let Some(current) = current else {
            return match target {
                Target::Base | Target::Relative(_) => {
                    Ok(MigrationPlan::empty(Direction::Downgrade, None))
                }
                _ => Err(Self::invalid_target(target, "nothing is applied")),
            };
        };
        let current_idx = self.index_of(current)?;

        let target_idx: Option<usize> = match target {
            Target::Base => None,
            Target::Head => {
                let head = self.head()?;
                if head == Some(current) {
                    return Ok(MigrationPlan::empty(
                        Direction::Downgrade,
                        Some(current.clone()),
                    ));
                }
                return Err(Self::invalid_target(
                    target,
                    "head is ahead of the current revision; use upgrade",
                ));
            }
            Target::Revision(token) => Some(self.index_of(self.store.resolve(token)?)?),
            Target::Relative(steps) => {
                if *steps > 0 {
                    return Err(Self::invalid_target(
                        target,
                        "relative downgrade must be negative",
                    ));
                }
                let mut at = Some(current_idx);
                for _ in 0..steps.unsigned_abs() {
                    let Some(i) = at else {
                        return Err(Self::invalid_target(
                            target,
                            "not enough revisions below the current marker",
                        ));
                    };
                    at = match &self.record(i).down_revision {
                        Some(down) => Some(self.index_of(down)?),
                        None => None,
                    };
                }
                at
            }
        };

        if target_idx == Some(current_idx) {
            return Ok(MigrationPlan::empty(
                Direction::Downgrade,
                Some(current.clone()),
            ));
        }

        let applied = self.ancestors_inclusive(current_idx);
        let keep = match target_idx {
            Some(t) => {
                if !applied.contains(&t) {
                    return Err(Self::invalid_target(
                        target,
                        format!("target is not an ancestor of the current revision '{current}'"),
                    ));
                }
                self.ancestors_inclusive(t)
            }
            None => HashSet::new(),
        };

        let to = target_idx.map(|t| self.record(t).revision.clone());
        let mut steps: Vec<PlannedStep<'s>> = self
            .order
            .iter()
            .rev()
            .filter(|i| applied.contains(i) && !keep.contains(i))
            .map(|&i| {
                let record = self.record(i);
                PlannedStep {
                    record,
                    marker_after: record.down_revision.clone(),
                }
            })
            .collect();
        if let Some(last) = steps.last_mut() {
            last.marker_after = to.clone();
        }

        let plan = MigrationPlan {
            direction: Direction::Downgrade,
            from: Some(current.clone()),
            to,
            steps,
        };
        log::debug!(
            "Downgrade plan {:?} -> {:?}: {:?}",
            plan.from,
            plan.to,
            plan.revisions()
        );
        Ok(plan)
    }

    /// Plan from `current` to an explicit revision (`None` = base), choosing
    /// the direction from where the target sits relative to `current`.
    pub fn order(
        &self,
        current: Option<&RevisionId>,
        target: Option<&RevisionId>,
    ) -> CoreResult<MigrationPlan<'s>> {
        let Some(target) = target else {
            return self.plan_downgrade(current, &Target::Base);
        };
        let target_idx = self.index_of(target)?;
        let behind = match current {
            Some(c) => self.ancestors_inclusive(self.index_of(c)?).contains(&target_idx),
            None => false,
        };
        let explicit = Target::Revision(target.to_string());
        if behind {
            self.plan_downgrade(current, &explicit)
        } else {
            self.plan_upgrade(current, &explicit)
        }
    }

    /// Resolve a stamp target to a concrete marker value.
    pub fn resolve_marker(
        &self,
        current: Option<&RevisionId>,
        target: &Target,
    ) -> CoreResult<Option<RevisionId>> {
        self.ensure_linear()?;
        match target {
            Target::Base => Ok(None),
            Target::Head => Ok(self.head()?.cloned()),
            Target::Revision(token) => Ok(Some(self.store.resolve(token)?.clone())),
            Target::Relative(n) if *n > 0 => Ok(self.plan_upgrade(current, target)?.to),
            Target::Relative(_) => Ok(self.plan_downgrade(current, target)?.to),
        }
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
