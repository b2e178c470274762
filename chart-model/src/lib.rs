use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub mod tree;
pub use tree::{
    add_function, attach_function, detach_function, ensure_acyclic, reachable_from_root,
    remove_function, validate_attachment,
};

/// A persisted chart dashboard: axes, series groups and series, each series
/// carrying the function tree that computes its points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub title: String,
    #[serde(default)]
    pub title_tip: String,
    #[serde(default)]
    pub y_axes: Vec<AxisDefinition>,
    #[serde(default)]
    pub series_groups: Vec<SeriesGroupDefinition>,
    #[serde(default)]
    pub series: Vec<SeriesDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit_name: String,
    #[serde(default)]
    pub min_interval: Option<f64>,
    /// Optional function tree used to format axis labels. Evaluated with the
    /// label value bound as the current value.
    #[serde(default)]
    pub label_provider: Option<FunctionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesGroupDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stacked: bool,
    #[serde(default)]
    pub show_sum: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub y_axis_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    /// When set, the series is a template repeated once per data source whose
    /// name starts with this prefix.
    #[serde(default)]
    pub repeat_per_source: Option<String>,
    pub data: FunctionTree,
}

/// One node of a function tree. The function name is kept as a plain string
/// tag so that unrecognized names survive deserialization and can be reported
/// by the evaluator instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub id: u64,
    pub function_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// An edge binding a child function to one argument slot of its parent.
/// `position` orders children within repeated slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub parent: u64,
    pub argument: String,
    pub child: u64,
    #[serde(default)]
    pub position: usize,
}

/// The in-memory editor form of a function tree: an arena of nodes plus
/// attachment edges. Nodes may stay in the arena while detached from the
/// root; a child may be attached under several parents, but never under
/// itself (directly or transitively).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionTree {
    #[serde(default)]
    pub root: Option<u64>,
    #[serde(default)]
    pub functions: Vec<FunctionNode>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// The nested persisted form of a function tree, matching the shape produced
/// by dashboard serialization: a function name with named argument subtrees
/// and constant parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub function_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, ArgumentSpec>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentSpec {
    Single(Box<FunctionSpec>),
    Repeated(Vec<FunctionSpec>),
}

#[derive(thiserror::Error, Debug)]
pub enum ChartModelError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TreeRuleError {
    #[error("a function cannot be attached to itself")]
    SelfAttachment,
    #[error("function is already attached to this argument")]
    DuplicateAttachment,
    #[error("argument slot already holds its maximum number of functions")]
    SlotOccupied,
    #[error("attachment would create a cycle in the function tree")]
    WouldCreateCycle,
    #[error("function {0} does not exist in the tree")]
    MissingNode(u64),
    #[error("function tree contains a cycle")]
    CyclicFunctionTree,
}

impl ChartDefinition {
    pub fn load_from_file(path: &Path) -> Result<Self, ChartModelError> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ChartModelError> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}

impl FunctionTree {
    pub fn node(&self, id: u64) -> Option<&FunctionNode> {
        self.functions.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: u64) -> Option<&mut FunctionNode> {
        self.functions.iter_mut().find(|node| node.id == id)
    }

    /// Ids of children attached to one argument slot, ordered by position.
    pub fn argument_children(&self, parent: u64, argument: &str) -> Vec<u64> {
        let mut slot: Vec<&Attachment> = self
            .attachments
            .iter()
            .filter(|att| att.parent == parent && att.argument == argument)
            .collect();
        slot.sort_by_key(|att| att.position);
        slot.iter().map(|att| att.child).collect()
    }

    /// First child of an argument slot, for single-valued slots.
    pub fn argument_child(&self, parent: u64, argument: &str) -> Option<u64> {
        self.argument_children(parent, argument).first().copied()
    }

    pub fn parameter(&self, id: u64, name: &str) -> Option<&serde_json::Value> {
        self.node(id).and_then(|node| node.parameters.get(name))
    }

    pub fn next_function_id(&self) -> u64 {
        self.functions
            .iter()
            .map(|node| node.id)
            .max()
            .map(|id| id + 1)
            .unwrap_or(1)
    }
}
