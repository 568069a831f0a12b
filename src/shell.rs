//! Line-oriented command interpreter over the task graph
//!
//! Each input line is alias-expanded (by its first word), tokenised on
//! whitespace and double quotes, then parsed with clap. Before every line the
//! scheduler is drained: each due job runs its command as if typed, with the
//! job's task selected and the clock pinned to the job's time.

use crate::core::{
    scheduled_jobs, FieldRegistry, Job, Node, NodeFilter, Scheduler, Status, TaskGraph, TaskId,
};
use crate::duration::{format_duration, format_time, parse_duration, parse_local_time};
use crate::editor::NoteEditor;
use crate::table::Table;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use thiserror::Error;

const TOKEN_PATTERN: &str = r#""((?:[^"\\]|\\.)*)"|([^\s"]+)"#;
const INDENT: &str = "    ";

/// Errors raised by the interpreter itself
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShellError {
    #[error("Node index out of range: {0}")]
    NodeIndex(usize),

    #[error("Job index out of range: {0}")]
    JobIndex(usize),

    #[error("Unbalanced quotes")]
    Quotes,

    #[error("Cannot link '{0}' under its own subtree")]
    Cycle(String),
}

#[derive(Parser, Debug)]
#[command(name = "orgmate", no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select the current task (the root when no index is given)
    Sel { index: Option<usize> },

    /// Create tasks under the current task
    Add {
        /// Insert before the listed node instead
        #[arg(short, long, value_name = "INDEX", conflicts_with = "index")]
        before: Option<usize>,

        /// Append under the listed node instead
        #[arg(short, long, value_name = "INDEX")]
        index: Option<usize>,

        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List subtasks depth-first
    Tree {
        /// Depth limit; 1 lists direct subtasks only
        #[arg(short, long)]
        depth: Option<usize>,

        /// Extra column to show (repeatable)
        #[arg(short = 'f', long = "field", value_name = "FIELD")]
        fields: Vec<String>,

        /// Show shared tasks under every parent
        #[arg(long)]
        all: bool,

        /// Hide done subtrees
        #[arg(long)]
        skip_done: bool,

        index: Option<usize>,
    },

    /// Detach listed nodes from their parent
    Rm {
        #[arg(required = true)]
        indices: Vec<usize>,
    },

    /// Link listed tasks under the last index (or before it with -b)
    Ln {
        #[arg(short, long)]
        before: bool,

        /// Source indices followed by the destination index
        #[arg(required = true, num_args = 2..)]
        nodes: Vec<usize>,
    },

    /// Move listed nodes under the last index (or before it with -b)
    Mv {
        #[arg(short, long)]
        before: bool,

        /// Source indices followed by the destination index
        #[arg(required = true, num_args = 2..)]
        nodes: Vec<usize>,
    },

    /// Set a field of the current task or of listed nodes
    Set {
        key: String,

        #[arg(allow_hyphen_values = true)]
        value: String,

        indices: Vec<usize>,
    },

    /// Show task details
    Info { index: Option<usize> },

    /// List actionable subtasks by priority
    Todo { index: Option<usize> },

    /// Show the status history
    Log { index: Option<usize> },

    /// Edit the note in an external editor
    Note { index: Option<usize> },

    /// Scheduled commands
    #[command(subcommand)]
    Job(JobCommand),

    /// Command aliases
    #[command(subcommand)]
    Alias(AliasCommand),

    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Subcommand, Debug)]
enum JobCommand {
    /// Schedule a command against the current task
    Add {
        /// Run after a delay ("[<d>d] [<h>:<m>]")
        #[arg(long = "in", value_name = "DURATION", conflicts_with = "at", required_unless_present = "at")]
        after: Option<String>,

        /// Run at a local time ("YYYY-MM-DD HH:MM")
        #[arg(long, value_name = "TIME")]
        at: Option<String>,

        /// Repeat with this period
        #[arg(long, value_name = "DURATION")]
        every: Option<String>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// List scheduled jobs
    Ls,

    /// Cancel listed jobs
    Rm {
        #[arg(required = true)]
        indices: Vec<usize>,
    },
}

#[derive(Subcommand, Debug)]
enum AliasCommand {
    /// List aliases
    Ls,

    /// Define an alias
    Add { key: String, value: String },

    /// Remove aliases
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

/// Interactive session over one task graph
pub struct Shell<W: Write> {
    graph: TaskGraph,
    scheduler: Scheduler,
    fields: FieldRegistry,
    aliases: BTreeMap<String, String>,
    editor: Box<dyn NoteEditor>,
    current: TaskId,
    /// Rows of the last `tree` / `todo` listing
    nodes: Vec<Node>,
    /// Rows of the last `job ls` listing
    jobs: Vec<Job>,
    out: W,
    interactive: bool,
    finished: bool,
}

impl<W: Write> Shell<W> {
    /// Shell over `graph`, writing to `out`
    pub fn new(
        graph: TaskGraph,
        aliases: BTreeMap<String, String>,
        editor: Box<dyn NoteEditor>,
        out: W,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.init(&graph);
        let current = graph.root();
        Self {
            graph,
            scheduler,
            fields: FieldRegistry::standard(),
            aliases,
            editor,
            current,
            nodes: Vec::new(),
            jobs: Vec::new(),
            out,
            interactive: false,
            finished: false,
        }
    }

    /// Print a prompt before reading each line
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Task graph being edited
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Current alias table
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Selected task
    pub fn current(&self) -> TaskId {
        self.current
    }

    /// Output sink
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Whether `quit` was entered
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Prompt naming the selected task
    pub fn prompt(&self) -> String {
        let name = self.graph.task(self.current).map(|t| t.name()).unwrap_or("?");
        format!("{} > ", name)
    }

    /// Hand back the graph and aliases for persisting
    pub fn into_parts(self) -> (TaskGraph, BTreeMap<String, String>) {
        (self.graph, self.aliases)
    }

    /// Read and execute lines until `quit` or end of input
    pub fn run<R: BufRead>(&mut self, mut input: R) -> Result<()> {
        let mut line = String::new();
        while !self.finished {
            if self.interactive {
                write!(self.out, "{}", self.prompt())?;
                self.out.flush()?;
            }
            line.clear();
            if input.read_line(&mut line)? == 0 {
                if self.interactive {
                    writeln!(self.out)?;
                }
                break;
            }
            self.execute(line.trim_end_matches(['\n', '\r']))?;
        }
        Ok(())
    }

    /// Run due jobs, then one input line
    ///
    /// Command failures are printed; only output failures are returned.
    pub fn execute(&mut self, line: &str) -> Result<()> {
        self.run_due_jobs()?;
        self.dispatch(line)?;
        self.out.flush()?;
        Ok(())
    }

    fn run_due_jobs(&mut self) -> Result<()> {
        while let Some(job) = self.scheduler.next_due(&mut self.graph) {
            log::info!("Replaying {} on {} at {}: {}", job.id, job.task, job.time, job.command);
            let previous = self.current;
            let nodes = self.nodes.clone();
            let jobs = self.jobs.clone();
            self.current = job.task;
            self.graph.clock_mut().pin(job.time);
            let result = self.dispatch(&job.command);
            self.graph.clock_mut().unpin();
            self.current = if self.graph.contains(previous) {
                previous
            } else {
                self.graph.root()
            };
            self.nodes = nodes;
            self.jobs = jobs;
            result?;
        }
        Ok(())
    }

    fn dispatch(&mut self, line: &str) -> Result<()> {
        if let Err(err) = self.try_dispatch(line) {
            log::debug!("Command '{}' failed: {:#}", line, err);
            writeln!(self.out, "{:#}", err)?;
        }
        Ok(())
    }

    fn try_dispatch(&mut self, line: &str) -> Result<()> {
        let line = self.expand_alias(line);
        let tokens = tokenize(&line)?;
        if tokens.is_empty() {
            return self.todo(None);
        }
        let parsed = match Line::try_parse_from(tokens) {
            Ok(parsed) => parsed,
            Err(e) => {
                write!(self.out, "{}", e.render())?;
                return Ok(());
            }
        };

        match parsed.command {
            Command::Sel { index } => {
                self.current = match index {
                    Some(i) => self.node(i)?.task,
                    None => self.graph.root(),
                };
                Ok(())
            }
            Command::Add {
                before,
                index,
                names,
            } => self.add(before, index, &names),
            Command::Tree {
                depth,
                fields,
                all,
                skip_done,
                index,
            } => {
                let mut filter = NodeFilter::new().skip_done(skip_done).skip_seen(!all);
                if let Some(depth) = depth {
                    filter = filter.max_depth(depth);
                }
                self.tree(filter, &fields, index)
            }
            Command::Rm { indices } => {
                let nodes = self.resolve_nodes(&indices)?;
                for node in nodes {
                    self.graph.remove(&node)?;
                }
                Ok(())
            }
            Command::Ln { before, nodes } => self.link(&nodes, before, false),
            Command::Mv { before, nodes } => self.link(&nodes, before, true),
            Command::Set {
                key,
                value,
                indices,
            } => {
                let targets = if indices.is_empty() {
                    vec![self.current]
                } else {
                    self.resolve_nodes(&indices)?.iter().map(|n| n.task).collect()
                };
                Ok(self.fields.set_all(&mut self.graph, &targets, &key, &value)?)
            }
            Command::Info { index } => self.info(index),
            Command::Todo { index } => self.todo(index),
            Command::Log { index } => self.log(index),
            Command::Note { index } => {
                let id = self.target(index)?;
                let text = self.graph.get(id)?.note().to_string();
                let edited = self.editor.edit(&text)?;
                if edited != text {
                    self.graph.set_note(id, &edited)?;
                }
                Ok(())
            }
            Command::Job(command) => self.job(command),
            Command::Alias(command) => self.alias(command),
            Command::Quit => {
                if self.graph.clock().is_pinned() {
                    log::warn!("Ignoring quit from a scheduled job");
                } else {
                    self.finished = true;
                }
                Ok(())
            }
        }
    }

    fn expand_alias(&self, line: &str) -> String {
        let trimmed = line.trim_start();
        let (first, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        match self.aliases.get(first) {
            Some(expansion) => format!("{} {}", expansion, rest).trim_end().to_string(),
            None => line.to_string(),
        }
    }

    fn node(&self, index: usize) -> Result<Node> {
        Ok(self
            .nodes
            .get(index)
            .copied()
            .ok_or(ShellError::NodeIndex(index))?)
    }

    fn resolve_nodes(&self, indices: &[usize]) -> Result<Vec<Node>> {
        indices.iter().map(|&i| self.node(i)).collect()
    }

    /// Task of a listed node, or the current task
    fn target(&self, index: Option<usize>) -> Result<TaskId> {
        match index {
            Some(i) => Ok(self.node(i)?.task),
            None => Ok(self.current),
        }
    }

    fn add(&mut self, before: Option<usize>, index: Option<usize>, names: &[String]) -> Result<()> {
        if let Some(before) = before {
            let anchor = self.node(before)?;
            for name in names {
                let id = self.graph.create(name);
                self.graph.insert(&anchor, id, false)?;
            }
            return Ok(());
        }
        let parent = self.target(index)?;
        for name in names {
            self.graph.create_subtask(parent, name)?;
        }
        Ok(())
    }

    fn link(&mut self, indices: &[usize], before: bool, detach: bool) -> Result<()> {
        let Some((&dest, sources)) = indices.split_last() else {
            return Ok(());
        };
        let dest = self.node(dest)?;
        let sources = self.resolve_nodes(sources)?;
        let parent = if before { dest.parent } else { dest.task };

        for source in sources {
            if before && source.task == dest.task {
                continue;
            }
            if self.graph.is_descendant(source.task, parent) {
                let name = self.graph.get(source.task)?.name().to_string();
                return Err(ShellError::Cycle(name).into());
            }
            if detach {
                self.graph.remove(&source)?;
            }
            if before {
                self.graph.insert(&dest, source.task, false)?;
            } else {
                self.graph.add(parent, source.task, None)?;
            }
        }
        Ok(())
    }

    fn tree(&mut self, filter: NodeFilter, fields: &[String], index: Option<usize>) -> Result<()> {
        let start = self.target(index)?;
        for field in fields {
            self.fields.get(field)?;
        }
        let nodes: Vec<Node> = self.graph.iter_subtasks(start, filter).collect();
        let now = self.graph.now();

        let mut table = Table::indexed(2 + fields.len());
        for (idx, node) in nodes.iter().enumerate() {
            let task = self.graph.get(node.task)?;
            let suffix = if task.has_subtasks() { "/" } else { "" };
            let mut row = vec![
                idx.to_string(),
                format!("{}{}{}", INDENT.repeat(node.depth), task.name(), suffix),
            ];
            for field in fields {
                row.push(self.fields.read(field, task, now)?);
            }
            table.add_row(row);
        }
        self.nodes = nodes;
        table.write_to(&mut self.out)?;
        Ok(())
    }

    fn todo(&mut self, index: Option<usize>) -> Result<()> {
        let start = self.target(index)?;
        let mut nodes: Vec<Node> = self
            .graph
            .iter_subtasks(start, NodeFilter::default())
            .filter(|node| {
                self.graph.task(node.task).is_some_and(|t| t.priority() > 0)
                    && !self.graph.next_statuses(node.task).is_empty()
            })
            .collect();
        nodes.sort_by_key(|node| Reverse(self.graph.task(node.task).map_or(0, |t| t.priority())));

        let mut table = Table::indexed(3);
        for (idx, node) in nodes.iter().enumerate() {
            let task = self.graph.get(node.task)?;
            table.add_row([idx.to_string(), task.name().to_string(), task.status().to_string()]);
        }
        self.nodes = nodes;
        table.write_to(&mut self.out)?;
        Ok(())
    }

    fn info(&mut self, index: Option<usize>) -> Result<()> {
        let id = self.target(index)?;
        let task = self.graph.get(id)?;
        let now = self.graph.now();
        let join = |statuses: Vec<Status>| {
            if statuses.is_empty() {
                "-".to_string()
            } else {
                statuses.iter().map(Status::to_string).collect::<Vec<_>>().join(", ")
            }
        };

        let mut table = Table::new(2);
        table.add_row(["Name".to_string(), task.name().to_string()]);
        table.add_row(["Status".to_string(), task.status().to_string()]);
        table.add_row(["Since".to_string(), format_time(task.log().since())]);
        table.add_row(["Duration".to_string(), format_duration(task.log().duration(now))]);
        for field in ["flow", "priority", "aggregate", "weight", "progress"] {
            let mut label = field.to_string();
            label[..1].make_ascii_uppercase();
            table.add_row([label, self.fields.read(field, task, now)?]);
        }
        table.add_row([
            "Next statuses".to_string(),
            join(self.graph.next_statuses(id).into_iter().collect()),
        ]);
        table.add_row([
            "Available".to_string(),
            join(self.graph.available_statuses(id).into_iter().collect()),
        ]);
        table.add_row(["Subtasks".to_string(), task.subtasks().len().to_string()]);
        table.add_row(["Parents".to_string(), task.parents().len().to_string()]);
        table.add_row(["Jobs".to_string(), task.jobs().len().to_string()]);
        if let Some(first) = task.note().lines().next() {
            table.add_row(["Note", first]);
        }
        table.write_to(&mut self.out)?;
        Ok(())
    }

    fn log(&mut self, index: Option<usize>) -> Result<()> {
        let id = self.target(index)?;
        let mut table = Table::new(2);
        for entry in self.graph.get(id)?.log().entries() {
            table.add_row([entry.status.to_string(), format_time(entry.timestamp)]);
        }
        table.write_to(&mut self.out)?;
        Ok(())
    }

    fn job(&mut self, command: JobCommand) -> Result<()> {
        match command {
            JobCommand::Add {
                after,
                at,
                every,
                command,
            } => {
                let time = match (after, at) {
                    (Some(after), _) => self
                        .graph
                        .now()
                        .checked_add_signed(parse_duration(&after)?)
                        .context("Time out of range")?,
                    (None, Some(at)) => parse_local_time(&at)?,
                    (None, None) => anyhow::bail!("Either --in or --at is required"),
                };
                let period = every.as_deref().map(parse_duration).transpose()?;
                let command = command.iter().map(|t| quote(t)).collect::<Vec<_>>().join(" ");
                let id = self
                    .scheduler
                    .schedule(&mut self.graph, self.current, time, &command, period)?;
                log::info!("Scheduled {} at {}", id, time);
                Ok(())
            }
            JobCommand::Ls => {
                self.jobs = scheduled_jobs(&self.graph);
                let mut table = Table::indexed(5);
                for (idx, job) in self.jobs.iter().enumerate() {
                    let name = self.graph.get(job.task)?.name().to_string();
                    let every = job.period.map_or_else(|| "-".to_string(), format_duration);
                    table.add_row([idx.to_string(), format_time(job.time), every, name, job.command.clone()]);
                }
                table.write_to(&mut self.out)?;
                Ok(())
            }
            JobCommand::Rm { indices } => {
                let jobs = indices
                    .iter()
                    .map(|&i| self.jobs.get(i).cloned().ok_or(ShellError::JobIndex(i)))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                for job in jobs {
                    if !self.scheduler.remove(&mut self.graph, &job) {
                        writeln!(self.out, "Job already ran or was removed: {}", job.command)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn alias(&mut self, command: AliasCommand) -> Result<()> {
        match command {
            AliasCommand::Ls => {
                let mut table = Table::new(2);
                for (key, value) in &self.aliases {
                    table.add_row([key, value]);
                }
                table.write_to(&mut self.out)?;
            }
            AliasCommand::Add { key, value } => {
                self.aliases.insert(key, value);
            }
            AliasCommand::Rm { keys } => {
                for key in keys {
                    self.aliases.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Split a line on whitespace, keeping double-quoted runs together
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let re = Regex::new(TOKEN_PATTERN)?;
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(line) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !line[last..whole.start()].trim().is_empty() {
            return Err(ShellError::Quotes.into());
        }
        last = whole.end();
        if let Some(quoted) = caps.get(1) {
            tokens.push(unescape(quoted.as_str()));
        } else if let Some(word) = caps.get(2) {
            tokens.push(word.as_str().to_string());
        }
    }
    if !line[last..].trim().is_empty() {
        return Err(ShellError::Quotes.into());
    }
    Ok(tokens)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`tokenize`] for a single token
pub fn quote(token: &str) -> String {
    if !token.is_empty() && !token.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\') {
        return token.to_string();
    }
    format!("\"{}\"", token.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_aliases;
    use chrono::Duration;

    struct FixedEditor(&'static str);

    impl NoteEditor for FixedEditor {
        fn edit(&mut self, _text: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn shell() -> Shell<Vec<u8>> {
        Shell::new(
            TaskGraph::new("me"),
            default_aliases(),
            Box::new(FixedEditor("a note")),
            Vec::new(),
        )
    }

    fn run(shell: &mut Shell<Vec<u8>>, line: &str) -> String {
        let start = shell.output().len();
        shell.execute(line).unwrap();
        String::from_utf8(shell.output()[start..].to_vec()).unwrap()
    }

    fn task_named(shell: &Shell<Vec<u8>>, name: &str) -> TaskId {
        shell
            .graph()
            .reachable(shell.graph().root())
            .into_iter()
            .find(|&id| shell.graph().task(id).unwrap().name() == name)
            .unwrap()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize(r#"add "buy milk" eggs"#).unwrap(), vec!["add", "buy milk", "eggs"]);
        assert_eq!(tokenize(r#"set note "say \"hi\"""#).unwrap(), vec!["set", "note", "say \"hi\""]);
        assert!(tokenize(r#"add "oops"#).is_err());
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quote_roundtrips_through_tokenize() {
        let tokens = ["set", "name", "two words", "", r#"a"b"#];
        let line = tokens.iter().map(|t| quote(t)).collect::<Vec<_>>().join(" ");
        assert_eq!(tokenize(&line).unwrap(), tokens);
    }

    #[test]
    fn test_add_and_tree() {
        let mut shell = shell();
        run(&mut shell, r#"add "write report" review"#);
        run(&mut shell, "tree");
        run(&mut shell, "add -i 0 draft outline");
        let out = run(&mut shell, "tree");
        assert_eq!(
            out,
            "0 write report/\n1     draft\n2     outline\n3 review\n"
        );
    }

    #[test]
    fn test_add_before() {
        let mut shell = shell();
        run(&mut shell, "add a c");
        run(&mut shell, "tree");
        run(&mut shell, "add -b 1 b");
        let out = run(&mut shell, "tree");
        assert_eq!(out, "0 a\n1 b\n2 c\n");
    }

    #[test]
    fn test_alias_expansion_and_status() {
        let mut shell = shell();
        run(&mut shell, "add task");
        run(&mut shell, "tree");
        run(&mut shell, "start 0");
        let out = run(&mut shell, "ls");
        assert_eq!(out, "0 task Active 0.00%\n");
        run(&mut shell, "finish 0");
        let out = run(&mut shell, "ls");
        assert_eq!(out, "0 task Done 100.00%\n");
    }

    #[test]
    fn test_errors_are_printed() {
        let mut shell = shell();
        assert_eq!(run(&mut shell, "sel 3"), "Node index out of range: 3\n");

        run(&mut shell, "set aggregate false");
        run(&mut shell, "add step");
        run(&mut shell, "tree");
        let out = run(&mut shell, "set status done 0");
        assert_eq!(out, "status invariant violation: done is not available\n");
        assert!(!shell.is_finished());

        let out = run(&mut shell, "frobnicate");
        assert!(out.contains("unrecognized subcommand"));
    }

    #[test]
    fn test_sel_changes_prompt() {
        let mut shell = shell();
        assert_eq!(shell.prompt(), "me > ");
        run(&mut shell, "add project");
        run(&mut shell, "tree");
        run(&mut shell, "sel 0");
        assert_eq!(shell.prompt(), "project > ");
        run(&mut shell, "sel");
        assert_eq!(shell.current(), shell.graph().root());
    }

    #[test]
    fn test_todo_by_priority() {
        let mut shell = shell();
        run(&mut shell, "add low high done");
        run(&mut shell, "tree");
        run(&mut shell, "set priority 5 1");
        run(&mut shell, "set priority 0 2");
        let out = run(&mut shell, "");
        assert_eq!(out, "0 high New\n1 low  New\n");
        // indices now refer to the todo rows
        run(&mut shell, "start 0");
        let high = task_named(&shell, "high");
        assert_eq!(shell.graph().task(high).unwrap().status(), Status::Active);
    }

    #[test]
    fn test_ln_shares_and_refuses_cycles() {
        let mut shell = shell();
        run(&mut shell, "add a b");
        run(&mut shell, "tree");
        run(&mut shell, "ln 1 0");
        let out = run(&mut shell, "tree");
        assert_eq!(out, "0 a/\n1     b\n");
        let out = run(&mut shell, "tree --all");
        assert_eq!(out, "0 a/\n1     b\n2 b\n");

        let out = run(&mut shell, "ln 0 1");
        assert_eq!(out, "Cannot link 'a' under its own subtree\n");
    }

    #[test]
    fn test_mv_and_rm() {
        let mut shell = shell();
        run(&mut shell, "add a b c");
        run(&mut shell, "tree");
        run(&mut shell, "mv 2 0");
        let out = run(&mut shell, "tree");
        assert_eq!(out, "0 a/\n1     c\n2 b\n");

        run(&mut shell, "mv -b 2 0");
        let out = run(&mut shell, "tree -d 1");
        assert_eq!(out, "0 b\n1 a/\n");

        run(&mut shell, "rm 0");
        let out = run(&mut shell, "tree");
        assert_eq!(out, "0 a/\n1     c\n");
    }

    #[test]
    fn test_set_negative_priority() {
        let mut shell = shell();
        run(&mut shell, "add a");
        run(&mut shell, "tree");
        assert_eq!(run(&mut shell, "set priority -1 0"), "");
        let a = task_named(&shell, "a");
        assert_eq!(shell.graph().task(a).unwrap().priority(), -1);
    }

    #[test]
    fn test_note_uses_editor() {
        let mut shell = shell();
        run(&mut shell, "note");
        let root = shell.graph().root();
        assert_eq!(shell.graph().task(root).unwrap().note(), "a note");
        let out = run(&mut shell, "info");
        assert!(out.contains("Note          a note"));
    }

    #[test]
    fn test_alias_commands() {
        let mut shell = shell();
        run(&mut shell, r#"alias add wip "set status inactive""#);
        run(&mut shell, "alias rm ls restart");
        assert_eq!(shell.aliases()["wip"], "set status inactive");
        assert!(!shell.aliases().contains_key("ls"));
        let out = run(&mut shell, "alias ls");
        assert!(out.contains("wip    set status inactive"));
    }

    #[test]
    fn test_due_job_runs_under_virtual_clock() {
        let mut shell = shell();
        run(&mut shell, "add project");
        run(&mut shell, "tree");
        run(&mut shell, "sel 0");
        run(&mut shell, "job add --at \"2020-01-01 08:00\" add chore");
        run(&mut shell, "sel");

        // the job is overdue, so it runs before this line
        let out = run(&mut shell, "job ls");
        assert_eq!(out, "");
        let project = task_named(&shell, "project");
        assert!(shell.graph().task(project).unwrap().jobs().is_empty());
        let chore = task_named(&shell, "chore");
        let task = shell.graph().task(chore).unwrap();
        assert!(task.parents().contains(&project));
        assert_eq!(format_time(task.log().since()), "2020-01-01 08:00:00");
        assert_eq!(shell.current(), shell.graph().root());
        assert!(!shell.graph().clock().is_pinned());
    }

    #[test]
    fn test_recurring_job_listing_and_removal() {
        let mut shell = shell();
        run(&mut shell, "job add --in 1d --every \"1d 0:30\" add \"daily standup\"");
        let out = run(&mut shell, "job ls");
        assert!(out.contains("1 day, 0:30:00"));
        assert!(out.contains(r#"add "daily standup""#));
        let root = shell.graph().root();
        let job = &shell.graph().task(root).unwrap().jobs()[0];
        assert!(job.time > shell.graph().now() + Duration::hours(23));

        run(&mut shell, "job rm 0");
        assert!(shell.graph().task(root).unwrap().jobs().is_empty());
        assert_eq!(run(&mut shell, "job rm 0"), "Job already ran or was removed: add \"daily standup\"\n");
        assert_eq!(run(&mut shell, "job rm 4"), "Job index out of range: 4\n");
    }

    #[test]
    fn test_job_time_out_of_range() {
        let mut shell = shell();
        let out = run(&mut shell, "job add --in 100000000d add x");
        assert_eq!(out, "Time out of range\n");
        let root = shell.graph().root();
        assert!(shell.graph().task(root).unwrap().jobs().is_empty());
    }

    #[test]
    fn test_replayed_job_keeps_listing() {
        let mut shell = shell();
        run(&mut shell, "add a b");
        run(&mut shell, "tree");
        run(&mut shell, "set priority 5 1");
        run(&mut shell, "tree");
        run(&mut shell, "job add --at \"2020-01-01 08:00\" todo");

        // the replayed todo lists b first; index 0 must still be a
        run(&mut shell, "start 0");
        let a = task_named(&shell, "a");
        let b = task_named(&shell, "b");
        assert_eq!(shell.graph().task(a).unwrap().status(), Status::Active);
        assert_eq!(shell.graph().task(b).unwrap().status(), Status::New);
    }

    #[test]
    fn test_set_on_several_targets_is_all_or_nothing() {
        let mut shell = shell();
        run(&mut shell, "set flow exclusive");
        run(&mut shell, "add a b");
        run(&mut shell, "tree");
        let out = run(&mut shell, "set status active 0 1");
        assert_eq!(out, "status invariant violation: active is not available\n");
        for name in ["a", "b"] {
            let id = task_named(&shell, name);
            assert_eq!(shell.graph().task(id).unwrap().status(), Status::New);
        }
    }

    #[test]
    fn test_run_until_quit() {
        let mut shell = shell();
        let input = "add a\nquit\nadd b\n";
        shell.run(input.as_bytes()).unwrap();
        assert!(shell.is_finished());
        let (graph, _) = shell.into_parts();
        assert_eq!(graph.task(graph.root()).unwrap().subtasks().len(), 1);
    }
}
