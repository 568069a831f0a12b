//! Job scheduler - deferred commands replayed against tasks at a given time

use super::{TaskGraph, TaskId};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// Stable identifier of one scheduled job instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// A command to run against `task` once `time` has passed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task: TaskId,
    pub time: DateTime<Utc>,
    pub command: String,
    /// Recurrence period; the job is rescheduled `period` after `time`
    #[serde(default, with = "period_seconds")]
    pub period: Option<Duration>,
}

mod period_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the period as whole seconds
    pub fn serialize<S: Serializer>(period: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        period.map(|p| p.num_seconds()).serialize(s)
    }

    /// Read a period given in seconds
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(d)?.map(Duration::seconds))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    time: DateTime<Utc>,
    seq: u64,
    job: JobId,
    task: TaskId,
}

/// Global min-heap of scheduled jobs ordered by time
///
/// Removal is lazy: a removed job stays in the heap and is skipped when it
/// surfaces, because it is no longer listed on its task.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    seq: u64,
}

impl Scheduler {
    /// Empty queue; call [`Scheduler::init`] to load a graph's jobs
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the heap from the job list of every task reachable from the root
    pub fn init(&mut self, graph: &TaskGraph) {
        for id in graph.reachable(graph.root()) {
            if let Some(task) = graph.task(id) {
                for job in task.jobs() {
                    self.push(job);
                }
            }
        }
        log::debug!("Scheduler seeded with {} jobs", self.heap.len());
    }

    fn push(&mut self, job: &Job) {
        self.heap.push(Reverse(Entry {
            time: job.time,
            seq: self.seq,
            job: job.id,
            task: job.task,
        }));
        self.seq += 1;
    }

    /// Create a job for `task` and queue it
    pub fn schedule(
        &mut self,
        graph: &mut TaskGraph,
        task: TaskId,
        time: DateTime<Utc>,
        command: &str,
        period: Option<Duration>,
    ) -> Result<JobId> {
        if let Some(period) = period.filter(|p| *p <= Duration::zero()) {
            return Err(Error::InvalidValue {
                field: "period",
                value: format!("{}s", period.num_seconds()),
            });
        }
        if let Some(period) = period.filter(|p| time.checked_add_signed(*p).is_none()) {
            return Err(Error::InvalidValue {
                field: "period",
                value: format!("{}s", period.num_seconds()),
            });
        }
        graph.get(task)?;
        let job = Job {
            id: graph.alloc_job_id(),
            task,
            time,
            command: command.to_string(),
            period,
        };
        let id = job.id;
        self.add(graph, job)?;
        Ok(id)
    }

    /// Attach `job` to its task and queue it
    pub fn add(&mut self, graph: &mut TaskGraph, job: Job) -> Result<()> {
        let task = graph.task_mut(job.task).ok_or(Error::TaskNotFound(job.task))?;
        self.push(&job);
        log::debug!("Scheduled {} for {} at {}", job.id, job.task, job.time);
        task.jobs.push(job);
        Ok(())
    }

    /// Drop `job` from its task; true iff it was still scheduled
    pub fn remove(&mut self, graph: &mut TaskGraph, job: &Job) -> bool {
        let Some(task) = graph.task_mut(job.task) else {
            return false;
        };
        let before = task.jobs.len();
        task.jobs.retain(|j| j.id != job.id);
        before != task.jobs.len()
    }

    /// Pop the next job due at the graph's current time
    ///
    /// Stale entries are skipped. A recurring job is re-queued as a new
    /// instance one period later before it is returned.
    pub fn next_due(&mut self, graph: &mut TaskGraph) -> Option<Job> {
        let now = graph.now();
        loop {
            let Reverse(head) = self.heap.peek()?;
            if head.time > now {
                return None;
            }
            let Reverse(entry) = self.heap.pop()?;
            let Some(task) = graph.task_mut(entry.task) else {
                log::debug!("Skipping {}: task {} is gone", entry.job, entry.task);
                continue;
            };
            let Some(pos) = task.jobs.iter().position(|j| j.id == entry.job) else {
                log::debug!("Skipping {}: no longer scheduled", entry.job);
                continue;
            };
            let job = task.jobs.remove(pos);
            if let Some(period) = job.period {
                match job.time.checked_add_signed(period) {
                    Some(time) => {
                        let next = Job {
                            id: graph.alloc_job_id(),
                            time,
                            ..job.clone()
                        };
                        if let Err(e) = self.add(graph, next) {
                            log::warn!("Failed to reschedule {}: {}", job.id, e);
                        }
                    }
                    None => log::warn!("Dropping recurrence of {}: next time out of range", job.id),
                }
            }
            return Some(job);
        }
    }

    /// Iterate over every job due now, consuming each
    pub fn pending<'a>(&'a mut self, graph: &'a mut TaskGraph) -> Pending<'a> {
        Pending {
            scheduler: self,
            graph,
        }
    }

    /// Time of the earliest queued entry, stale or not
    pub fn peek_time(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    /// Number of heap entries, including stale ones
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no entries are queued
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Iterator returned by [`Scheduler::pending`]
pub struct Pending<'a> {
    scheduler: &'a mut Scheduler,
    graph: &'a mut TaskGraph,
}

impl Iterator for Pending<'_> {
    type Item = Job;

    fn next(&mut self) -> Option<Job> {
        self.scheduler.next_due(self.graph)
    }
}

/// Every job still scheduled on a reachable task, earliest first
pub fn scheduled_jobs(graph: &TaskGraph) -> Vec<Job> {
    let mut jobs: Vec<Job> = graph
        .reachable(graph.root())
        .into_iter()
        .filter_map(|id| graph.task(id))
        .flat_map(|task| task.jobs().iter().cloned())
        .collect();
    jobs.sort_by_key(|j| (j.time, j.id));
    jobs
}
