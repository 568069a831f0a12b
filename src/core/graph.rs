//! Task graph - arena of tasks linked as a DAG
//!
//! Tasks are addressed by stable [`TaskId`]s. A task may sit under several
//! parents at once; the graph is assumed acyclic. Every mutator ends with an
//! explicit [`TaskGraph::refresh`] so aggregated statuses and cached progress
//! never go stale.

use super::rules::{flow_allowed, Rules};
use super::{Clock, Flow, JobId, Node, Status, Task, TaskId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The whole task graph, rooted at a single task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraph {
    root: TaskId,
    tasks: BTreeMap<TaskId, Task>,
    next_task_id: u64,
    next_job_id: u64,
    #[serde(skip)]
    clock: Clock,
}

impl TaskGraph {
    /// Create a graph holding only a root task
    pub fn new(root_name: &str) -> Self {
        let clock = Clock::new();
        let root = TaskId(0);
        let mut tasks = BTreeMap::new();
        tasks.insert(root, Task::new(root, root_name, clock.now()));
        let mut graph = Self {
            root,
            tasks,
            next_task_id: 1,
            next_job_id: 0,
            clock,
        };
        graph.refresh(root);
        graph
    }

    /// ID of the root task
    pub fn root(&self) -> TaskId {
        self.root
    }

    /// Get task by ID
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Get task by ID, failing when it is not in the graph
    pub fn get(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(Error::TaskNotFound(id))
    }

    fn get_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))
    }

    /// Mutable access for the job queue, which owns job bookkeeping
    pub(crate) fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Whether `id` is in the arena
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of tasks in the arena, attached or not
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the arena holds no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Clock stamping status changes
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Mutable clock, for pinning to a virtual time
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Current time as seen by the status logs
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn alloc_job_id(&mut self) -> JobId {
        let id = JobId(self.next_job_id);
        self.next_job_id += 1;
        id
    }

    /// Create a detached task
    pub fn create(&mut self, name: &str) -> TaskId {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        let task = Task::new(id, name, self.clock.now());
        self.tasks.insert(id, task);
        self.refresh(id);
        id
    }

    /// Create a task and append it under `parent`
    pub fn create_subtask(&mut self, parent: TaskId, name: &str) -> Result<TaskId> {
        self.get(parent)?;
        let id = self.create(name);
        self.add(parent, id, None)?;
        Ok(id)
    }

    /// Attach `child` under `parent` at `index` (appended when `None`)
    ///
    /// A child already under `parent` is moved to the new position.
    pub fn add(&mut self, parent: TaskId, child: TaskId, index: Option<usize>) -> Result<()> {
        self.get(child)?;
        let subtasks = &mut self.get_mut(parent)?.subtasks;
        subtasks.retain(|&c| c != child);
        let index = index.unwrap_or(subtasks.len()).min(subtasks.len());
        subtasks.insert(index, child);
        self.get_mut(child)?.parents.insert(parent);
        log::debug!("Attached {} under {} at {}", child, parent, index);
        self.refresh(parent);
        Ok(())
    }

    /// Place `child` right before (or after) the task of `node` in its parent
    pub fn insert(&mut self, node: &Node, child: TaskId, after: bool) -> Result<()> {
        if child == node.task {
            return Ok(());
        }
        self.get_mut(node.parent)?.subtasks.retain(|&c| c != child);
        let index = self
            .get(node.parent)?
            .subtasks
            .iter()
            .position(|&c| c == node.task)
            .map(|pos| pos + usize::from(after));
        self.add(node.parent, child, index)
    }

    /// Detach the task of `node` from that one parent
    ///
    /// The task keeps any other parents and stays in the arena.
    pub fn remove(&mut self, node: &Node) -> Result<()> {
        self.detach(node.parent, node.task)
    }

    /// Detach `child` from `parent`; a no-op when it is not attached there
    pub fn detach(&mut self, parent: TaskId, child: TaskId) -> Result<()> {
        self.get_mut(parent)?.subtasks.retain(|&c| c != child);
        if let Some(task) = self.tasks.get_mut(&child) {
            task.parents.remove(&parent);
        }
        log::debug!("Detached {} from {}", child, parent);
        self.refresh(parent);
        Ok(())
    }

    /// Whether `id` is `ancestor` or lies below it
    pub fn is_descendant(&self, ancestor: TaskId, id: TaskId) -> bool {
        let mut stack = vec![ancestor];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == id {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(task) = self.tasks.get(&current) {
                stack.extend(task.subtasks.iter().copied());
            }
        }
        false
    }

    /// Every task reachable from `from`, each once, in pre-order
    pub fn reachable(&self, from: TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(task) = self.tasks.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(task.subtasks.iter().rev().copied());
        }
        out
    }

    /// Drop tasks no longer reachable from the root
    ///
    /// Returns how many tasks were removed.
    pub fn collect_garbage(&mut self) -> usize {
        let keep: BTreeSet<TaskId> = self.reachable(self.root).into_iter().collect();
        let before = self.tasks.len();
        self.tasks.retain(|id, _| keep.contains(id));
        for task in self.tasks.values_mut() {
            task.parents.retain(|p| keep.contains(p));
        }
        let removed = before - self.tasks.len();
        if removed > 0 {
            log::info!("Dropped {} detached tasks", removed);
        }
        removed
    }

    /// Statuses `id` may currently hold
    pub fn available_statuses(&self, id: TaskId) -> BTreeSet<Status> {
        Rules::new(self).available_statuses(id)
    }

    /// Forward moves from the current status of `id` that are available
    pub fn next_statuses(&self, id: TaskId) -> BTreeSet<Status> {
        Rules::new(self).next_statuses(id)
    }

    /// Set the status of `id`
    ///
    /// Fails with [`Error::InvariantViolation`] when `status` is not available,
    /// leaving the log, status and progress untouched.
    pub fn set_status(&mut self, id: TaskId, status: Status) -> Result<()> {
        self.get(id)?;
        if !Rules::new(self).is_available(id, status) {
            return Err(Error::InvariantViolation {
                field: "status",
                value: status.to_string(),
            });
        }
        let now = self.clock.now();
        let task = self.get_mut(id)?;
        if task.log.record(status, now) {
            log::debug!("{} '{}' -> {}", id, task.name, status);
        }
        self.refresh(id);
        Ok(())
    }

    /// Rename a task
    pub fn set_name(&mut self, id: TaskId, name: &str) -> Result<()> {
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Replace a task's note
    pub fn set_note(&mut self, id: TaskId, note: &str) -> Result<()> {
        self.get_mut(id)?.note = note.to_string();
        Ok(())
    }

    /// Set a task's priority; higher sorts first in `todo`
    pub fn set_priority(&mut self, id: TaskId, priority: i64) -> Result<()> {
        self.get_mut(id)?.priority = priority;
        Ok(())
    }

    /// Set the progress weight; negative or NaN weights become unknown
    pub fn set_weight(&mut self, id: TaskId, weight: Option<f64>) -> Result<()> {
        let weight = weight.filter(|w| *w >= 0.0);
        self.get_mut(id)?.weight = weight;
        self.refresh(id);
        Ok(())
    }

    /// Toggle whether a task derives status and progress from its children
    pub fn set_aggregate(&mut self, id: TaskId, aggregate: bool) -> Result<()> {
        self.get_mut(id)?.aggregate = aggregate;
        self.refresh(id);
        Ok(())
    }

    /// Set the sibling flow of the children of `id`
    ///
    /// Fails with [`Error::InvariantViolation`] when a dependent task's current
    /// status would not be available under the new flow.
    pub fn set_flow(&mut self, id: TaskId, flow: Flow) -> Result<()> {
        self.get(id)?;
        if !flow_allowed(self, id, flow) {
            return Err(Error::InvariantViolation {
                field: "flow",
                value: flow.to_string(),
            });
        }
        self.get_mut(id)?.flow = flow;
        Ok(())
    }

    /// Recompute the derived state of `id`, then of every parent
    ///
    /// Aggregating tasks take the status computed from their children
    /// (logged like a manual change, without availability checks). Progress
    /// is recomputed from scratch. Safe to call redundantly.
    pub fn refresh(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get(&id) else {
            return;
        };
        let computed = if task.is_aggregating() {
            Status::aggregate(
                task.subtasks
                    .iter()
                    .filter_map(|c| self.tasks.get(c).map(Task::status)),
            )
        } else {
            None
        };
        let now = self.clock.now();
        if let (Some(status), Some(task)) = (computed, self.tasks.get_mut(&id)) {
            if task.log.record(status, now) {
                log::debug!("{} '{}' aggregated to {}", id, task.name, status);
            }
        }

        let progress = self.compute_progress(id);
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        task.progress = progress;

        let parents: Vec<TaskId> = task.parents.iter().copied().collect();
        for parent in parents {
            self.refresh(parent);
        }
    }

    /// Completion estimate of `id` from its current state
    ///
    /// An aggregating task with children takes the weighted mean of its
    /// children; any child with unknown weight or progress makes it unknown.
    fn compute_progress(&self, id: TaskId) -> Option<f64> {
        let task = self.tasks.get(&id)?;
        if task.is_aggregating() {
            let mut total = 0.0;
            let mut sum = 0.0;
            for child_id in &task.subtasks {
                let child = self.tasks.get(child_id)?;
                let weight = child.weight?;
                let progress = child.progress?;
                total += weight;
                sum += weight * progress;
            }
            return Some(if total == 0.0 { 0.0 } else { sum / total });
        }
        match task.status() {
            Status::Done => Some(1.0),
            _ if task.aggregate => Some(0.0),
            _ => None,
        }
    }
}
