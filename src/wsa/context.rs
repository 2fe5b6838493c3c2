use crate::ws::instruction::Label;
use num_bigint::BigInt;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use tracing::warn;

/// Settings fixed before a compilation starts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Allows the bitwise instructions and the debugger marker
    pub extensions: bool,
}

impl CompileOptions {
    pub fn extensions() -> CompileOptions {
        CompileOptions { extensions: true }
    }
}

/// The value bound to a compile-time variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(BigInt),
    Str(String),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Str(_) => "string",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{:?}", value),
        }
    }
}

/// State owned by a single compilation: which sources were included, the label numbering and
/// the variables defined so far. Nothing survives from one compilation to the next.
#[derive(Debug, Default)]
pub struct Context {
    options: CompileOptions,
    included: HashSet<String>,
    labels: HashMap<String, u64>,
    label_names: Vec<String>,
    variables: HashMap<String, Value>,
}

impl Context {
    pub fn new(options: CompileOptions) -> Context {
        Context {
            options,
            ..Context::default()
        }
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Records an include, returning `false` if the source was already included
    pub fn mark_included(&mut self, name: &str) -> bool {
        self.included.insert(name.to_string())
    }

    /// The numeric label for `name`, assigned densely from 0 on first use
    pub fn label(&mut self, name: &str) -> Label {
        if let Some(id) = self.labels.get(name) {
            return Label::from(*id);
        }
        let id = self.next_label(name.to_string());
        self.labels.insert(name.to_string(), id);
        Label::from(id)
    }

    /// A fresh label that no source name can refer to
    pub fn internal_label(&mut self) -> Label {
        let id = self.label_names.len() as u64;
        Label::from(self.next_label(format!("__internal_label_{}", id)))
    }

    fn next_label(&mut self, name: String) -> u64 {
        self.label_names.push(name);
        self.label_names.len() as u64 - 1
    }

    /// Source names of the assigned labels, indexed by label number
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Binds `name` unless it is already bound; the first definition wins
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(existing) = self.variables.get(name) {
            warn!(variable = name, %existing, ignored = %value, "variable is already defined");
            return;
        }
        self.variables.insert(name.to_string(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}
