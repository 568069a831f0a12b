//! Task status life-cycle and sibling flow policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Life-cycle stage of a task.
///
/// The ordering is a display convenience only: ACTIVE and INACTIVE are both
/// "in progress" and move back and forth between each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    New,
    Active,
    Inactive,
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::New, Status::Active, Status::Inactive, Status::Done];

    /// Statuses offered as a forward move from this one
    pub fn forward(self) -> &'static [Status] {
        match self {
            Status::New | Status::Inactive => &[Status::Active],
            Status::Active => &[Status::Inactive, Status::Done],
            Status::Done => &[],
        }
    }

    /// Status of an aggregating task given its children's statuses
    ///
    /// Returns `None` for an empty child set.
    pub fn aggregate<I>(children: I) -> Option<Status>
    where
        I: IntoIterator<Item = Status>,
    {
        let mut any = false;
        let mut all_new = true;
        let mut all_done = true;
        let mut any_active = false;
        for status in children {
            any = true;
            all_new &= status == Status::New;
            all_done &= status == Status::Done;
            any_active |= status == Status::Active;
        }
        if !any {
            return None;
        }
        Some(if all_new {
            Status::New
        } else if all_done {
            Status::Done
        } else if any_active {
            Status::Active
        } else {
            Status::Inactive
        })
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::New
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
            Self::Done => write!(f, "Done"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// How the children of a task relate to one another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    /// Unordered
    Parallel,
    /// At most one child active at a time
    Exclusive,
    /// Children complete in order
    Sequential,
}

impl Default for Flow {
    fn default() -> Self {
        Self::Parallel
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => write!(f, "Parallel"),
            Self::Exclusive => write!(f, "Exclusive"),
            Self::Sequential => write!(f, "Sequential"),
        }
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "exclusive" => Ok(Self::Exclusive),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("unknown flow '{}'", other)),
        }
    }
}
