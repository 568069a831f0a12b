//! Application state - store, shell and the load/run/save cycle

use crate::config::Config;
use crate::core::TaskGraph;
use crate::editor::ExternalEditor;
use crate::shell::Shell;
use crate::store::{Store, ALIASES_KEY, ROOT_KEY};
use anyhow::Result;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Name of a fresh root task: the login name when known
pub fn default_root_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "me".to_string())
}

/// Application state
pub struct App<W: Write> {
    store: Store,
    shell: Shell<W>,
}

impl<W: Write> App<W> {
    /// Load the graph and aliases from `data_file` (or start fresh on `clear`)
    pub fn open(config: &Config, data_file: &Path, clear: bool, out: W) -> Result<Self> {
        let mut store = Store::open(data_file)?;
        if clear {
            log::info!("Clearing stored state in {}", data_file.display());
            store.clear();
        }

        let graph = match store.get::<TaskGraph>(ROOT_KEY)? {
            Some(graph) => {
                log::info!("Loaded {} tasks from {}", graph.len(), data_file.display());
                graph
            }
            None => TaskGraph::new(&default_root_name()),
        };
        let aliases = store
            .get::<BTreeMap<String, String>>(ALIASES_KEY)?
            .unwrap_or_else(|| config.aliases());

        let editor = Box::new(ExternalEditor::new(config.editor()));
        let shell = Shell::new(graph, aliases, editor, out);
        Ok(Self { store, shell })
    }

    /// Print prompts (for a terminal on stdin)
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.shell = self.shell.interactive(interactive);
        self
    }

    /// The underlying shell
    pub fn shell(&self) -> &Shell<W> {
        &self.shell
    }

    /// Mutable access to the shell
    pub fn shell_mut(&mut self) -> &mut Shell<W> {
        &mut self.shell
    }

    /// Run the shell until `quit` or end of input
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        self.shell.run(input)
    }

    /// Persist the graph (minus detached tasks) and aliases
    pub fn save(self) -> Result<()> {
        let Self { mut store, shell } = self;
        let (mut graph, aliases) = shell.into_parts();
        graph.collect_garbage();
        store.put(ROOT_KEY, &graph)?;
        store.put(ALIASES_KEY, &aliases)?;
        store.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let config = Config::default();

        let mut app = App::open(&config, &data, false, Vec::new()).unwrap();
        app.run("add first second\nalias add hi \"tree\"\n".as_bytes()).unwrap();
        app.save().unwrap();

        let mut app = App::open(&config, &data, false, Vec::new()).unwrap();
        assert_eq!(app.shell().aliases()["hi"], "tree");
        app.run("hi\n".as_bytes()).unwrap();
        let out = String::from_utf8(app.shell().output().clone()).unwrap();
        assert_eq!(out, "0 first\n1 second\n");
    }

    #[test]
    fn test_clear_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let config = Config::default();

        let mut app = App::open(&config, &data, false, Vec::new()).unwrap();
        app.run("add first\n".as_bytes()).unwrap();
        app.save().unwrap();

        let app = App::open(&config, &data, true, Vec::new()).unwrap();
        let graph = app.shell().graph();
        assert!(graph.task(graph.root()).unwrap().subtasks().is_empty());
        assert_eq!(app.shell().aliases(), &config.aliases());
    }

    #[test]
    fn test_detached_tasks_dropped_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let config = Config::default();

        let mut app = App::open(&config, &data, false, Vec::new()).unwrap();
        app.run("add keep drop\ntree\nrm 1\n".as_bytes()).unwrap();
        app.save().unwrap();

        let app = App::open(&config, &data, false, Vec::new()).unwrap();
        assert_eq!(app.shell().graph().len(), 2);
    }
}
