//! Task node - the unit of work in the task graph

use super::{Flow, Job, Status, StatusLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of a task inside a [`TaskGraph`](super::TaskGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn default_weight() -> Option<f64> {
    Some(1.0)
}

fn default_priority() -> i64 {
    1
}

fn default_aggregate() -> bool {
    true
}

/// A task and its adjacency
///
/// Status is derived from the log. Children are owned through `subtasks`,
/// `parents` only holds back-references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) log: StatusLog,
    #[serde(default)]
    pub(crate) flow: Flow,
    #[serde(default = "default_aggregate")]
    pub(crate) aggregate: bool,
    #[serde(default = "default_priority")]
    pub(crate) priority: i64,
    #[serde(default = "default_weight")]
    pub(crate) weight: Option<f64>,
    #[serde(default)]
    pub(crate) progress: Option<f64>,
    #[serde(default)]
    pub(crate) note: String,
    #[serde(default)]
    pub(crate) jobs: Vec<Job>,
    #[serde(default)]
    pub(crate) parents: BTreeSet<TaskId>,
    #[serde(default)]
    pub(crate) subtasks: Vec<TaskId>,
}

impl Task {
    pub(crate) fn new(id: TaskId, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            log: StatusLog::new(now),
            flow: Flow::default(),
            aggregate: default_aggregate(),
            priority: default_priority(),
            weight: default_weight(),
            progress: None,
            note: String::new(),
            jobs: Vec::new(),
            parents: BTreeSet::new(),
            subtasks: Vec::new(),
        }
    }

    /// Arena ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current status (latest log entry)
    pub fn status(&self) -> Status {
        self.log.status()
    }

    /// Full status history
    pub fn log(&self) -> &StatusLog {
        &self.log
    }

    /// How the children of this task are ordered
    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// Whether this task aggregates its children when it has any
    pub fn aggregate(&self) -> bool {
        self.aggregate
    }

    /// Whether the status is computed from children rather than set
    pub fn is_aggregating(&self) -> bool {
        self.aggregate && !self.subtasks.is_empty()
    }

    /// Sort key for `todo`, higher first
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Weight of this task in its parents' progress, `None` when unknown
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Cached completion estimate in `[0, 1]`, `None` when unknown
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Free-form note
    pub fn note(&self) -> &str {
        &self.note
    }

    /// Jobs scheduled against this task
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Tasks this one is attached under
    pub fn parents(&self) -> &BTreeSet<TaskId> {
        &self.parents
    }

    /// Children in sibling order
    pub fn subtasks(&self) -> &[TaskId] {
        &self.subtasks
    }

    /// Whether any child is attached
    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults() {
        let task = Task::new(TaskId(1), "write docs", Utc::now());
        assert_eq!(task.name(), "write docs");
        assert_eq!(task.status(), Status::New);
        assert_eq!(task.flow(), Flow::Parallel);
        assert!(task.aggregate());
        assert!(!task.is_aggregating());
        assert_eq!(task.priority(), 1);
        assert_eq!(task.weight(), Some(1.0));
        assert!(task.jobs().is_empty());
    }

    #[test]
    fn test_task_serialization_defaults() {
        let task = Task::new(TaskId(3), "a", Utc::now());
        let mut json = serde_json::to_value(&task).unwrap();
        let obj = json.as_object_mut().unwrap();
        obj.remove("weight");
        obj.remove("priority");
        obj.remove("subtasks");
        let parsed: Task = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.id(), TaskId(3));
        assert_eq!(parsed.weight(), Some(1.0));
        assert_eq!(parsed.priority(), 1);
        assert!(parsed.subtasks().is_empty());
    }

    #[test]
    fn test_empty_status_log_rejected() {
        let task = Task::new(TaskId(3), "a", Utc::now());
        let mut json = serde_json::to_value(&task).unwrap();
        json["log"]["entries"] = serde_json::json!([]);
        assert!(serde_json::from_value::<Task>(json).is_err());
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(12).to_string(), "#12");
    }
}
