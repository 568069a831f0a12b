//! Core engine - task graph, status rules, traversal and job scheduling

mod fields;
mod graph;
mod history;
mod job;
mod node;
mod rules;
mod status;
mod task;

pub use fields::{Field, FieldRegistry, FieldValue, Writer};
pub use graph::TaskGraph;
pub use history::{Clock, LogEntry, StatusLog};
pub use job::{scheduled_jobs, Job, JobId, Pending, Scheduler};
pub use node::{Node, NodeFilter, SubtaskIter};
pub use rules::{flow_allowed, Neighborhood, Rules};
pub use status::{Flow, Status};
pub use task::{Task, TaskId};
