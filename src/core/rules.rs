//! Status availability engine
//!
//! Decides which statuses a task may legally hold given its neighbourhood:
//!
//! - contexts: nearest non-aggregating ancestors (aggregating parents are
//!   transparent)
//! - children: direct subtasks
//! - sequence neighbours: previous / next sibling under each sequential parent,
//!   collected through aggregating parents at every enclosing level
//! - exclusive neighbours: every other sibling under each exclusive parent,
//!   collected the same way
//!
//! | Status   | Contexts          | Children    | Prev     | Next    | Exclusive  |
//! |----------|-------------------|-------------|----------|---------|------------|
//! | New      | none Done         | all New     |          | all New |            |
//! | Active   | all Active        |             | all Done | all New | none Active|
//! | Inactive | all Active/Inact. | none Active | all Done | all New |            |
//! | Done     | none New          | all Done    | all Done |         |            |

use super::{Flow, Status, Task, TaskGraph, TaskId};
use std::collections::BTreeSet;

/// Statuses of every neighbour category of one task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighborhood {
    pub contexts: Vec<Status>,
    pub children: Vec<Status>,
    pub prev: Vec<Status>,
    pub next: Vec<Status>,
    pub exclusive: Vec<Status>,
}

impl Neighborhood {
    /// Whether a task with this neighbourhood may hold `status`
    pub fn allows(&self, status: Status) -> bool {
        use Status::*;
        match status {
            New => {
                all(&self.contexts, |s| s != Done)
                    && all(&self.children, |s| s == New)
                    && all(&self.next, |s| s == New)
            }
            Active => {
                all(&self.contexts, |s| s == Active)
                    && all(&self.prev, |s| s == Done)
                    && all(&self.next, |s| s == New)
                    && all(&self.exclusive, |s| s != Active)
            }
            Inactive => {
                all(&self.contexts, |s| s == Active || s == Inactive)
                    && all(&self.children, |s| s != Active)
                    && all(&self.prev, |s| s == Done)
                    && all(&self.next, |s| s == New)
            }
            Done => {
                all(&self.contexts, |s| s != New)
                    && all(&self.children, |s| s == Done)
                    && all(&self.prev, |s| s == Done)
            }
        }
    }
}

fn all(statuses: &[Status], pred: impl Fn(Status) -> bool) -> bool {
    statuses.iter().all(|&s| pred(s))
}

/// Availability rules evaluated over a graph
///
/// A flow override evaluates the rules as if one task had a different flow,
/// which is how a flow change is validated before it is applied.
pub struct Rules<'a> {
    graph: &'a TaskGraph,
    flow_override: Option<(TaskId, Flow)>,
}

impl<'a> Rules<'a> {
    /// Rules over the graph as it is
    pub fn new(graph: &'a TaskGraph) -> Self {
        Self {
            graph,
            flow_override: None,
        }
    }

    /// Evaluate as if `id` had `flow`
    pub fn with_flow(graph: &'a TaskGraph, id: TaskId, flow: Flow) -> Self {
        Self {
            graph,
            flow_override: Some((id, flow)),
        }
    }

    fn flow_of(&self, task: &Task) -> Flow {
        match self.flow_override {
            Some((id, flow)) if id == task.id() => flow,
            _ => task.flow(),
        }
    }

    fn statuses(&self, ids: impl IntoIterator<Item = TaskId>) -> Vec<Status> {
        ids.into_iter()
            .filter_map(|id| self.graph.task(id).map(Task::status))
            .collect()
    }

    /// Nearest non-aggregating ancestors of `id`
    pub fn contexts(&self, id: TaskId) -> BTreeSet<TaskId> {
        let mut out = BTreeSet::new();
        self.collect_contexts(id, &mut out);
        out
    }

    fn collect_contexts(&self, id: TaskId, out: &mut BTreeSet<TaskId>) {
        let Some(task) = self.graph.task(id) else {
            return;
        };
        for &parent_id in task.parents() {
            let Some(parent) = self.graph.task(parent_id) else {
                continue;
            };
            if parent.aggregate() {
                self.collect_contexts(parent_id, out);
            } else {
                out.insert(parent_id);
            }
        }
    }

    /// Previous and next siblings under every sequential parent
    pub fn sequence_neighbors(&self, id: TaskId) -> (BTreeSet<TaskId>, BTreeSet<TaskId>) {
        let mut prev = BTreeSet::new();
        let mut next = BTreeSet::new();
        self.collect_sequence(id, &mut prev, &mut next);
        (prev, next)
    }

    fn collect_sequence(&self, id: TaskId, prev: &mut BTreeSet<TaskId>, next: &mut BTreeSet<TaskId>) {
        let Some(task) = self.graph.task(id) else {
            return;
        };
        for &parent_id in task.parents() {
            let Some(parent) = self.graph.task(parent_id) else {
                continue;
            };
            if self.flow_of(parent) == Flow::Sequential {
                let siblings = parent.subtasks();
                if let Some(pos) = siblings.iter().position(|&c| c == id) {
                    if pos > 0 {
                        prev.insert(siblings[pos - 1]);
                    }
                    if let Some(&after) = siblings.get(pos + 1) {
                        next.insert(after);
                    }
                }
            }
            if parent.aggregate() {
                self.collect_sequence(parent_id, prev, next);
            }
        }
    }

    /// Every other sibling under every exclusive parent
    pub fn exclusive_neighbors(&self, id: TaskId) -> BTreeSet<TaskId> {
        let mut out = BTreeSet::new();
        self.collect_exclusive(id, &mut out);
        out
    }

    fn collect_exclusive(&self, id: TaskId, out: &mut BTreeSet<TaskId>) {
        let Some(task) = self.graph.task(id) else {
            return;
        };
        for &parent_id in task.parents() {
            let Some(parent) = self.graph.task(parent_id) else {
                continue;
            };
            if self.flow_of(parent) == Flow::Exclusive {
                out.extend(parent.subtasks().iter().copied().filter(|&c| c != id));
            }
            if parent.aggregate() {
                self.collect_exclusive(parent_id, out);
            }
        }
    }

    /// Statuses of every neighbour category of `id`
    pub fn neighborhood(&self, id: TaskId) -> Neighborhood {
        let children = self
            .graph
            .task(id)
            .map(|t| t.subtasks().to_vec())
            .unwrap_or_default();
        let (prev, next) = self.sequence_neighbors(id);
        Neighborhood {
            contexts: self.statuses(self.contexts(id)),
            children: self.statuses(children),
            prev: self.statuses(prev),
            next: self.statuses(next),
            exclusive: self.statuses(self.exclusive_neighbors(id)),
        }
    }

    /// Whether `id` may hold `status`
    ///
    /// A task aggregating a non-empty child set may only hold the status
    /// computed from its children.
    pub fn is_available(&self, id: TaskId, status: Status) -> bool {
        let Some(task) = self.graph.task(id) else {
            return false;
        };
        if task.is_aggregating() {
            return Status::aggregate(self.statuses(task.subtasks().iter().copied())) == Some(status);
        }
        self.neighborhood(id).allows(status)
    }

    /// All statuses `id` may currently hold
    pub fn available_statuses(&self, id: TaskId) -> BTreeSet<Status> {
        let Some(task) = self.graph.task(id) else {
            return BTreeSet::new();
        };
        if task.is_aggregating() {
            return Status::aggregate(self.statuses(task.subtasks().iter().copied()))
                .into_iter()
                .collect();
        }
        let neighborhood = self.neighborhood(id);
        Status::ALL
            .into_iter()
            .filter(|&s| neighborhood.allows(s))
            .collect()
    }

    /// Forward moves from the current status that are currently available
    pub fn next_statuses(&self, id: TaskId) -> BTreeSet<Status> {
        let Some(task) = self.graph.task(id) else {
            return BTreeSet::new();
        };
        if task.is_aggregating() {
            return BTreeSet::new();
        }
        let neighborhood = self.neighborhood(id);
        task.status()
            .forward()
            .iter()
            .copied()
            .filter(|&s| neighborhood.allows(s))
            .collect()
    }
}

/// Whether switching `id` to `flow` keeps every dependent status available
///
/// Dependents are the children of `id` plus the descendants reached through
/// aggregating children, since their sibling neighbourhoods ascend to `id`.
pub fn flow_allowed(graph: &TaskGraph, id: TaskId, flow: Flow) -> bool {
    let Some(task) = graph.task(id) else {
        return false;
    };
    if task.flow() == flow {
        return true;
    }
    let rules = Rules::with_flow(graph, id, flow);
    let mut dependents = BTreeSet::new();
    collect_dependents(graph, id, &mut dependents);
    dependents.into_iter().all(|dep| {
        graph
            .task(dep)
            .map(|t| rules.is_available(dep, t.status()))
            .unwrap_or(true)
    })
}

fn collect_dependents(graph: &TaskGraph, id: TaskId, out: &mut BTreeSet<TaskId>) {
    let Some(task) = graph.task(id) else {
        return;
    };
    for &child in task.subtasks() {
        if out.insert(child) && graph.task(child).is_some_and(Task::aggregate) {
            collect_dependents(graph, child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_neighborhood_allows_everything() {
        let n = Neighborhood::default();
        for status in Status::ALL {
            assert!(n.allows(status));
        }
    }

    #[test]
    fn test_contexts_must_be_active_to_activate() {
        let n = Neighborhood {
            contexts: vec![Status::New],
            ..Default::default()
        };
        assert!(n.allows(Status::New));
        assert!(!n.allows(Status::Active));
        assert!(!n.allows(Status::Inactive));
        assert!(!n.allows(Status::Done));
    }

    #[test]
    fn test_done_requires_done_children() {
        let n = Neighborhood {
            children: vec![Status::Done, Status::Inactive],
            ..Default::default()
        };
        assert!(!n.allows(Status::Done));
        assert!(n.allows(Status::Inactive));
        assert!(!n.allows(Status::New));
    }

    #[test]
    fn test_sequence_neighbours() {
        let n = Neighborhood {
            prev: vec![Status::Active],
            ..Default::default()
        };
        assert!(n.allows(Status::New));
        assert!(!n.allows(Status::Active));
        assert!(!n.allows(Status::Done));

        let n = Neighborhood {
            next: vec![Status::Active],
            ..Default::default()
        };
        assert!(!n.allows(Status::New));
        assert!(!n.allows(Status::Active));
        assert!(n.allows(Status::Done));
    }

    #[test]
    fn test_exclusive_neighbours() {
        let n = Neighborhood {
            exclusive: vec![Status::New, Status::Active],
            ..Default::default()
        };
        assert!(!n.allows(Status::Active));
        assert!(n.allows(Status::Inactive));
    }

    fn graph_with_children(flow: Flow, aggregate: bool) -> (TaskGraph, TaskId, Vec<TaskId>) {
        let mut graph = TaskGraph::new("root");
        let root = graph.root();
        let parent = graph.create_subtask(root, "parent").unwrap();
        graph.set_aggregate(parent, aggregate).unwrap();
        let children: Vec<TaskId> = ["a", "b", "c"]
            .iter()
            .map(|name| graph.create_subtask(parent, name).unwrap())
            .collect();
        graph.set_flow(parent, flow).unwrap();
        (graph, parent, children)
    }

    #[test]
    fn test_contexts_skip_aggregating_parents() {
        let (mut graph, parent, children) = graph_with_children(Flow::Parallel, true);
        let rules = Rules::new(&graph);
        assert!(rules.contexts(children[0]).is_empty());

        graph.set_aggregate(parent, false).unwrap();
        let rules = Rules::new(&graph);
        assert_eq!(rules.contexts(children[0]), BTreeSet::from([parent]));
    }

    #[test]
    fn test_sequence_neighbours_in_graph() {
        let (graph, _, children) = graph_with_children(Flow::Sequential, true);
        let rules = Rules::new(&graph);
        let (prev, next) = rules.sequence_neighbors(children[1]);
        assert_eq!(prev, BTreeSet::from([children[0]]));
        assert_eq!(next, BTreeSet::from([children[2]]));
        let (prev, _) = rules.sequence_neighbors(children[0]);
        assert!(prev.is_empty());
    }

    #[test]
    fn test_sequence_neighbours_ascend_through_aggregating_parent() {
        let mut graph = TaskGraph::new("root");
        let root = graph.root();
        graph.set_flow(root, Flow::Sequential).unwrap();
        let first = graph.create_subtask(root, "first").unwrap();
        let group = graph.create_subtask(root, "group").unwrap();
        let inner = graph.create_subtask(group, "inner").unwrap();

        let rules = Rules::new(&graph);
        let (prev, _) = rules.sequence_neighbors(inner);
        assert_eq!(prev, BTreeSet::from([first]));
        assert!(!rules.is_available(inner, Status::Active));
    }

    #[test]
    fn test_exclusive_neighbours_in_graph() {
        let (graph, _, children) = graph_with_children(Flow::Exclusive, true);
        let rules = Rules::new(&graph);
        assert_eq!(
            rules.exclusive_neighbors(children[0]),
            BTreeSet::from([children[1], children[2]])
        );
    }

    #[test]
    fn test_exclusive_neighbours_ascend_through_aggregating_parent() {
        let mut graph = TaskGraph::new("root");
        let root = graph.root();
        graph.set_flow(root, Flow::Exclusive).unwrap();
        let group = graph.create_subtask(root, "group").unwrap();
        let x = graph.create_subtask(group, "x").unwrap();
        let b = graph.create_subtask(root, "b").unwrap();
        graph.set_status(b, Status::Active).unwrap();

        let rules = Rules::new(&graph);
        assert_eq!(rules.exclusive_neighbors(x), BTreeSet::from([b]));
        assert!(!rules.is_available(x, Status::Active));
        assert!(graph.set_status(x, Status::Active).is_err());

        graph.set_status(b, Status::Done).unwrap();
        graph.set_status(x, Status::Active).unwrap();
        assert_eq!(graph.task(group).unwrap().status(), Status::Active);
    }

    #[test]
    fn test_every_context_must_allow_status() {
        let mut graph = TaskGraph::new("root");
        let root = graph.root();
        let home = graph.create_subtask(root, "home").unwrap();
        let work = graph.create_subtask(root, "work").unwrap();
        graph.set_aggregate(home, false).unwrap();
        graph.set_aggregate(work, false).unwrap();
        let errand = graph.create_subtask(home, "errand").unwrap();
        graph.add(work, errand, None).unwrap();

        let rules = Rules::new(&graph);
        assert_eq!(rules.contexts(errand), BTreeSet::from([home, work]));

        graph.set_status(home, Status::Active).unwrap();
        assert!(!Rules::new(&graph).is_available(errand, Status::Active));

        graph.set_status(work, Status::Active).unwrap();
        assert!(Rules::new(&graph).is_available(errand, Status::Active));
    }

    #[test]
    fn test_context_through_nested_aggregating_parents() {
        let mut graph = TaskGraph::new("root");
        let root = graph.root();
        let context = graph.create_subtask(root, "context").unwrap();
        graph.set_aggregate(context, false).unwrap();
        let outer = graph.create_subtask(context, "outer").unwrap();
        let inner = graph.create_subtask(outer, "inner").unwrap();
        let leaf = graph.create_subtask(inner, "leaf").unwrap();

        let rules = Rules::new(&graph);
        assert_eq!(rules.contexts(leaf), BTreeSet::from([context]));
        assert!(!rules.is_available(leaf, Status::Active));

        graph.set_status(context, Status::Active).unwrap();
        graph.set_status(leaf, Status::Active).unwrap();
        assert_eq!(graph.task(outer).unwrap().status(), Status::Active);
    }

    #[test]
    fn test_aggregating_task_only_offers_computed_status() {
        let (graph, parent, _) = graph_with_children(Flow::Parallel, true);
        let rules = Rules::new(&graph);
        assert_eq!(rules.available_statuses(parent), BTreeSet::from([Status::New]));
        assert!(rules.next_statuses(parent).is_empty());
    }

    #[test]
    fn test_next_statuses_for_leaf() {
        let (mut graph, _, children) = graph_with_children(Flow::Parallel, true);
        let rules = Rules::new(&graph);
        assert_eq!(rules.next_statuses(children[0]), BTreeSet::from([Status::Active]));

        graph.set_status(children[0], Status::Active).unwrap();
        let rules = Rules::new(&graph);
        assert_eq!(
            rules.next_statuses(children[0]),
            BTreeSet::from([Status::Inactive, Status::Done])
        );
    }

    #[test]
    fn test_flow_change_validated_against_children() {
        let (mut graph, parent, children) = graph_with_children(Flow::Parallel, true);
        graph.set_status(children[0], Status::Active).unwrap();
        graph.set_status(children[1], Status::Active).unwrap();

        assert!(!flow_allowed(&graph, parent, Flow::Exclusive));
        assert!(!flow_allowed(&graph, parent, Flow::Sequential));
        assert!(flow_allowed(&graph, parent, Flow::Parallel));

        graph.set_status(children[1], Status::Inactive).unwrap();
        assert!(flow_allowed(&graph, parent, Flow::Exclusive));
    }
}
