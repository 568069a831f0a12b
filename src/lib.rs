//! orgmate - hierarchical task tracker
//!
//! Tasks form a DAG. Each task carries a status (New, Active, Inactive, Done)
//! whose legal values depend on its contexts, children and siblings. Parents
//! can aggregate status and progress from their children. Deferred commands
//! are replayed against tasks by a job scheduler under a virtual clock.

pub mod app;
pub mod config;
pub mod core;
pub mod duration;
pub mod editor;
pub mod error;
pub mod shell;
pub mod store;
pub mod table;

// Re-exports
pub use app::App;
pub use config::Config;
pub use core::{
    FieldRegistry, Flow, Job, JobId, Node, NodeFilter, Scheduler, Status, Task, TaskGraph, TaskId,
};
pub use error::{Error, Result};
pub use shell::Shell;
pub use store::Store;
