//! Field registry - named task fields with parsers, validators and appliers
//!
//! Backs `set key value` and the columns of `tree -f`. Each writable field
//! parses its raw text, optionally checks the value against the graph, then
//! applies it through the graph's mutation surface.

use super::rules::flow_allowed;
use super::{Flow, Status, Task, TaskGraph, TaskId};
use crate::duration::format_duration;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A parsed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Name(String),
    Status(Status),
    Flow(Flow),
    Priority(i64),
    Aggregate(bool),
    Weight(Option<f64>),
    Note(String),
}

type Parser = fn(&str) -> Result<FieldValue>;
type Validator = fn(&TaskGraph, TaskId, &FieldValue) -> bool;
type Applier = fn(&mut TaskGraph, TaskId, FieldValue) -> Result<()>;
type Reader = fn(&Task, DateTime<Utc>) -> String;

/// Parse, validate and apply steps of a writable field
#[derive(Clone, Copy)]
pub struct Writer {
    pub parse: Parser,
    pub validate: Option<Validator>,
    pub apply: Applier,
}

/// One named field
#[derive(Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub read: Reader,
    pub writer: Option<Writer>,
}

/// Registry of task fields by name
#[derive(Clone)]
pub struct FieldRegistry {
    fields: BTreeMap<&'static str, Field>,
}

impl FieldRegistry {
    /// Registry with no fields
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Registry with every built-in field
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Field {
            name: "name",
            read: |t, _| t.name().to_string(),
            writer: Some(Writer {
                parse: parse_name,
                validate: None,
                apply: |g, id, v| match v {
                    FieldValue::Name(name) => g.set_name(id, &name),
                    other => Err(mismatch("name", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "status",
            read: |t, _| t.status().to_string(),
            writer: Some(Writer {
                parse: |raw| {
                    raw.parse().map(FieldValue::Status).map_err(|_| invalid("status", raw))
                },
                validate: Some(status_available),
                apply: |g, id, v| match v {
                    FieldValue::Status(s) => g.set_status(id, s),
                    other => Err(mismatch("status", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "flow",
            read: |t, _| t.flow().to_string(),
            writer: Some(Writer {
                parse: |raw| raw.parse().map(FieldValue::Flow).map_err(|_| invalid("flow", raw)),
                validate: Some(flow_consistent),
                apply: |g, id, v| match v {
                    FieldValue::Flow(f) => g.set_flow(id, f),
                    other => Err(mismatch("flow", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "priority",
            read: |t, _| t.priority().to_string(),
            writer: Some(Writer {
                parse: |raw| {
                    raw.trim()
                        .parse()
                        .map(FieldValue::Priority)
                        .map_err(|_| invalid("priority", raw))
                },
                validate: None,
                apply: |g, id, v| match v {
                    FieldValue::Priority(p) => g.set_priority(id, p),
                    other => Err(mismatch("priority", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "aggregate",
            read: |t, _| t.aggregate().to_string(),
            writer: Some(Writer {
                parse: parse_bool,
                validate: None,
                apply: |g, id, v| match v {
                    FieldValue::Aggregate(a) => g.set_aggregate(id, a),
                    other => Err(mismatch("aggregate", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "weight",
            read: |t, _| t.weight().map_or_else(|| "-".to_string(), |w| w.to_string()),
            writer: Some(Writer {
                parse: parse_weight,
                validate: None,
                apply: |g, id, v| match v {
                    FieldValue::Weight(w) => g.set_weight(id, w),
                    other => Err(mismatch("weight", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "note",
            read: |t, _| t.note().lines().next().unwrap_or_default().to_string(),
            writer: Some(Writer {
                parse: |raw| Ok(FieldValue::Note(raw.to_string())),
                validate: None,
                apply: |g, id, v| match v {
                    FieldValue::Note(n) => g.set_note(id, &n),
                    other => Err(mismatch("note", &other)),
                },
            }),
        });
        registry.register(Field {
            name: "progress",
            read: |t, _| match t.progress() {
                Some(p) => format!("{:.2}%", p * 100.0),
                None => "-".to_string(),
            },
            writer: None,
        });
        registry.register(Field {
            name: "duration",
            read: |t, now| format_duration(t.log().duration(now)),
            writer: None,
        });
        registry
    }

    /// Add or replace a field
    pub fn register(&mut self, field: Field) {
        self.fields.insert(field.name, field);
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Names of every registered field, sorted
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Render field `name` of `task`
    pub fn read(&self, name: &str, task: &Task, now: DateTime<Utc>) -> Result<String> {
        Ok((self.get(name)?.read)(task, now))
    }

    /// Parse `raw` for field `name` without touching any task
    pub fn parse(&self, name: &str, raw: &str) -> Result<FieldValue> {
        let field = self.get(name)?;
        let writer = field.writer.ok_or_else(|| read_only(field.name))?;
        (writer.parse)(raw)
    }

    /// Parse, validate and apply `raw` to field `name` of task `id`
    pub fn set(&self, graph: &mut TaskGraph, id: TaskId, name: &str, raw: &str) -> Result<()> {
        self.set_all(graph, &[id], name, raw)
    }

    /// Set field `name` on every task in `ids`, or on none of them
    ///
    /// The value is parsed once and validated against each task before any
    /// change. If applying still fails part way, the graph is restored.
    pub fn set_all(&self, graph: &mut TaskGraph, ids: &[TaskId], name: &str, raw: &str) -> Result<()> {
        let field = self.get(name)?;
        let writer = field.writer.ok_or_else(|| read_only(field.name))?;
        let value = (writer.parse)(raw)?;
        for &id in ids {
            graph.get(id)?;
            if let Some(validate) = writer.validate {
                if !validate(graph, id, &value) {
                    return Err(Error::InvariantViolation {
                        field: field.name,
                        value: raw.to_string(),
                    });
                }
            }
        }
        let snapshot = graph.clone();
        for &id in ids {
            if let Err(e) = (writer.apply)(graph, id, value.clone()) {
                *graph = snapshot;
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn invalid(field: &'static str, raw: &str) -> Error {
    Error::InvalidValue {
        field,
        value: raw.to_string(),
    }
}

fn read_only(field: &'static str) -> Error {
    Error::InvalidValue {
        field,
        value: "field is read-only".to_string(),
    }
}

fn mismatch(field: &'static str, value: &FieldValue) -> Error {
    Error::InvalidValue {
        field,
        value: format!("{:?}", value),
    }
}

fn status_available(graph: &TaskGraph, id: TaskId, value: &FieldValue) -> bool {
    match value {
        FieldValue::Status(s) => graph.available_statuses(id).contains(s),
        _ => false,
    }
}

/// Every task whose neighbourhood depends on the flow keeps its status
fn flow_consistent(graph: &TaskGraph, id: TaskId, value: &FieldValue) -> bool {
    match value {
        FieldValue::Flow(f) => flow_allowed(graph, id, *f),
        _ => false,
    }
}

fn parse_name(raw: &str) -> Result<FieldValue> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(invalid("name", raw));
    }
    Ok(FieldValue::Name(name.to_string()))
}

fn parse_bool(raw: &str) -> Result<FieldValue> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(FieldValue::Aggregate(true)),
        "false" | "no" | "off" | "0" => Ok(FieldValue::Aggregate(false)),
        _ => Err(invalid("aggregate", raw)),
    }
}

fn parse_weight(raw: &str) -> Result<FieldValue> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "-" | "none" | "unknown" => Ok(FieldValue::Weight(None)),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|w| !w.is_nan())
            .map(|w| FieldValue::Weight((w >= 0.0).then_some(w)))
            .ok_or_else(|| invalid("weight", raw)),
    }
}
