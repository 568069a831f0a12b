//! Traversal view - positional nodes and filtered depth-first iteration

use super::{Status, TaskGraph, TaskId};
use std::collections::BTreeSet;

/// One occurrence of a task in a traversal: the task seen under one parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub parent: TaskId,
    pub task: TaskId,
    /// Direct children of the traversal start have depth 0
    pub depth: usize,
}

impl Node {
    /// Occurrence of `task` under `parent` at `depth`
    pub fn new(parent: TaskId, task: TaskId, depth: usize) -> Self {
        Self {
            parent,
            task,
            depth,
        }
    }
}

/// Pruning rules for [`TaskGraph::iter_subtasks`]
#[derive(Debug, Clone)]
pub struct NodeFilter {
    /// Prune nodes at this depth and below
    pub max_depth: Option<usize>,
    /// Prune subtrees rooted at a done task
    pub skip_done: bool,
    /// Suppress tasks already finished earlier in the traversal
    pub skip_seen: bool,
    seen: BTreeSet<TaskId>,
}

impl Default for NodeFilter {
    fn default() -> Self {
        Self {
            max_depth: None,
            skip_done: false,
            skip_seen: true,
            seen: BTreeSet::new(),
        }
    }
}

impl NodeFilter {
    /// Filter with no depth limit that skips seen subtrees
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop descending below `depth`
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Leave out Done tasks and their subtrees
    pub fn skip_done(mut self, skip: bool) -> Self {
        self.skip_done = skip;
        self
    }

    /// Yield each shared task only once
    pub fn skip_seen(mut self, skip: bool) -> Self {
        self.skip_seen = skip;
        self
    }

    /// Whether `node` (and so its subtree) should be visited
    pub fn check(&self, graph: &TaskGraph, node: &Node) -> bool {
        if self.max_depth.is_some_and(|max| max <= node.depth) {
            return false;
        }
        if self.skip_done && graph.task(node.task).map(|t| t.status()) == Some(Status::Done) {
            return false;
        }
        if self.seen.contains(&node.parent) {
            return false;
        }
        !(self.skip_seen && self.seen.contains(&node.task))
    }

    /// Mark the subtree of `node` as fully emitted
    pub fn finish(&mut self, node: &Node) {
        self.seen.insert(node.task);
    }
}

enum Frame {
    Visit(Node),
    Finish(Node),
}

/// Lazy pre-order walk below one task
pub struct SubtaskIter<'a> {
    graph: &'a TaskGraph,
    filter: NodeFilter,
    stack: Vec<Frame>,
}

impl<'a> SubtaskIter<'a> {
    fn new(graph: &'a TaskGraph, start: TaskId, mut filter: NodeFilter) -> Self {
        filter.seen.clear();
        let mut iter = Self {
            graph,
            filter,
            stack: Vec::new(),
        };
        iter.push_children(start, 0);
        iter
    }

    fn push_children(&mut self, parent: TaskId, depth: usize) {
        if let Some(task) = self.graph.task(parent) {
            self.stack.extend(
                task.subtasks()
                    .iter()
                    .rev()
                    .map(|&child| Frame::Visit(Node::new(parent, child, depth))),
            );
        }
    }
}

impl Iterator for SubtaskIter<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Finish(node) => self.filter.finish(&node),
                Frame::Visit(node) => {
                    if !self.filter.check(self.graph, &node) {
                        continue;
                    }
                    self.stack.push(Frame::Finish(node));
                    self.push_children(node.task, node.depth + 1);
                    return Some(node);
                }
            }
        }
        None
    }
}

impl TaskGraph {
    /// Walk the subtasks of `id` depth-first in pre-order
    ///
    /// Each call starts a fresh traversal with an empty seen set.
    pub fn iter_subtasks(&self, id: TaskId, filter: NodeFilter) -> SubtaskIter<'_> {
        SubtaskIter::new(self, id, filter)
    }
}
