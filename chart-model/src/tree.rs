use crate::{ArgumentSpec, Attachment, FunctionNode, FunctionSpec, FunctionTree, TreeRuleError};
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn add_function(
    tree: &mut FunctionTree,
    function_name: &str,
    parameters: serde_json::Value,
) -> u64 {
    let id = tree.next_function_id();
    tree.functions.push(FunctionNode {
        id,
        function_name: function_name.to_string(),
        parameters,
    });
    id
}

/// Checks whether a child may be attached to the given argument slot.
/// `max_per_slot` limits slot arity: 1 for single-valued arguments,
/// `usize::MAX` for repeated ones.
pub fn validate_attachment(
    tree: &FunctionTree,
    parent: u64,
    argument: &str,
    child: u64,
    max_per_slot: usize,
) -> Result<(), TreeRuleError> {
    if parent == child {
        return Err(TreeRuleError::SelfAttachment);
    }
    if tree.node(parent).is_none() {
        return Err(TreeRuleError::MissingNode(parent));
    }
    if tree.node(child).is_none() {
        return Err(TreeRuleError::MissingNode(child));
    }
    let slot_children = tree.argument_children(parent, argument);
    if slot_children.contains(&child) {
        return Err(TreeRuleError::DuplicateAttachment);
    }
    if slot_children.len() >= max_per_slot {
        return Err(TreeRuleError::SlotOccupied);
    }
    // Attaching `child` under `parent` closes a cycle exactly when `parent`
    // is already reachable from `child`.
    if reachable_from(tree, child).contains(&parent) {
        return Err(TreeRuleError::WouldCreateCycle);
    }
    Ok(())
}

pub fn attach_function(
    tree: &mut FunctionTree,
    parent: u64,
    argument: &str,
    child: u64,
    max_per_slot: usize,
) -> Result<(), TreeRuleError> {
    validate_attachment(tree, parent, argument, child, max_per_slot)?;
    let position = tree
        .attachments
        .iter()
        .filter(|att| att.parent == parent && att.argument == argument)
        .map(|att| att.position + 1)
        .max()
        .unwrap_or(0);
    tree.attachments.push(Attachment {
        parent,
        argument: argument.to_string(),
        child,
        position,
    });
    Ok(())
}

/// Removes the attachment edge only. The child stays in the arena and, when
/// no longer reachable from the root, is reported by validation as detached.
pub fn detach_function(
    tree: &mut FunctionTree,
    parent: u64,
    argument: &str,
    child: u64,
) -> Result<(), TreeRuleError> {
    let before = tree.attachments.len();
    tree.attachments
        .retain(|att| !(att.parent == parent && att.argument == argument && att.child == child));
    if tree.attachments.len() == before {
        return Err(TreeRuleError::MissingNode(child));
    }
    Ok(())
}

/// Removes a function and every descendant that is not referenced from
/// anywhere else in the tree.
pub fn remove_function(tree: &mut FunctionTree, id: u64) -> Result<(), TreeRuleError> {
    if tree.node(id).is_none() {
        return Err(TreeRuleError::MissingNode(id));
    }
    let mut pending = vec![id];
    while let Some(current) = pending.pop() {
        let children: Vec<u64> = tree
            .attachments
            .iter()
            .filter(|att| att.parent == current)
            .map(|att| att.child)
            .collect();
        tree.functions.retain(|node| node.id != current);
        tree.attachments
            .retain(|att| att.parent != current && att.child != current);
        if tree.root == Some(current) {
            tree.root = None;
        }
        for child in children {
            let still_referenced = tree.attachments.iter().any(|att| att.child == child);
            if !still_referenced && tree.node(child).is_some() {
                pending.push(child);
            }
        }
    }
    Ok(())
}

/// Ids reachable from `start` through attachment edges, `start` included.
fn reachable_from(tree: &FunctionTree, start: u64) -> HashSet<u64> {
    let mut edges: HashMap<u64, Vec<u64>> = HashMap::new();
    for att in &tree.attachments {
        edges.entry(att.parent).or_default().push(att.child);
    }
    let mut visited = HashSet::new();
    let mut pending = vec![start];
    while let Some(id) = pending.pop() {
        if visited.insert(id) {
            if let Some(children) = edges.get(&id) {
                pending.extend(children.iter().copied());
            }
        }
    }
    visited
}

pub fn reachable_from_root(tree: &FunctionTree) -> HashSet<u64> {
    match tree.root {
        Some(root) => reachable_from(tree, root),
        None => HashSet::new(),
    }
}

/// Confirms the attachment graph is acyclic. Both evaluation and validation
/// walk the tree recursively and call this first so that a corrupted
/// definition cannot make them loop forever.
pub fn ensure_acyclic(tree: &FunctionTree) -> Result<(), TreeRuleError> {
    let mut edges: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut indegree: HashMap<u64, usize> =
        tree.functions.iter().map(|node| (node.id, 0)).collect();
    for att in &tree.attachments {
        edges.entry(att.parent).or_default().push(att.child);
        if let Some(count) = indegree.get_mut(&att.child) {
            *count += 1;
        }
    }

    let mut ready: Vec<u64> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut visited = 0;
    while let Some(id) = ready.pop() {
        visited += 1;
        if let Some(children) = edges.get(&id) {
            for child in children {
                if let Some(count) = indegree.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(*child);
                    }
                }
            }
        }
    }

    if visited == tree.functions.len() {
        Ok(())
    } else {
        Err(TreeRuleError::CyclicFunctionTree)
    }
}

impl FunctionTree {
    /// Builds an arena tree from the nested persisted form. Every occurrence
    /// of a nested function becomes its own node with a fresh id.
    pub fn from_spec(spec: &FunctionSpec) -> FunctionTree {
        let mut tree = FunctionTree::default();
        let root = insert_spec(&mut tree, spec);
        tree.root = Some(root);
        tree
    }

    /// Serializes the part of the tree reachable from the root back into the
    /// nested form. Detached nodes are not representable there and are
    /// dropped. Returns `Ok(None)` when the tree has no root.
    pub fn to_spec(&self) -> Result<Option<FunctionSpec>, TreeRuleError> {
        ensure_acyclic(self)?;
        match self.root {
            Some(root) => Ok(Some(node_to_spec(self, root)?)),
            None => Ok(None),
        }
    }
}

fn insert_spec(tree: &mut FunctionTree, spec: &FunctionSpec) -> u64 {
    let id = add_function(tree, &spec.function_name, spec.parameters.clone());
    for (argument, argument_spec) in &spec.arguments {
        match argument_spec {
            ArgumentSpec::Single(child_spec) => {
                let child = insert_spec(tree, child_spec);
                tree.attachments.push(Attachment {
                    parent: id,
                    argument: argument.clone(),
                    child,
                    position: 0,
                });
            }
            ArgumentSpec::Repeated(child_specs) => {
                for (position, child_spec) in child_specs.iter().enumerate() {
                    let child = insert_spec(tree, child_spec);
                    tree.attachments.push(Attachment {
                        parent: id,
                        argument: argument.clone(),
                        child,
                        position,
                    });
                }
            }
        }
    }
    id
}

fn node_to_spec(tree: &FunctionTree, id: u64) -> Result<FunctionSpec, TreeRuleError> {
    let node = tree.node(id).ok_or(TreeRuleError::MissingNode(id))?;
    let mut slots: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for att in &tree.attachments {
        if att.parent == id {
            slots.entry(att.argument.clone()).or_default();
        }
    }
    for (argument, children) in slots.iter_mut() {
        *children = tree.argument_children(id, argument);
    }

    let mut arguments = BTreeMap::new();
    for (argument, children) in slots {
        let mut specs = Vec::with_capacity(children.len());
        for child in children {
            specs.push(node_to_spec(tree, child)?);
        }
        let argument_spec = if specs.len() == 1 && !is_repeated_argument(&argument) {
            ArgumentSpec::Single(Box::new(specs.remove(0)))
        } else {
            ArgumentSpec::Repeated(specs)
        };
        arguments.insert(argument, argument_spec);
    }

    Ok(FunctionSpec {
        function_name: node.function_name.clone(),
        arguments,
        parameters: node.parameters.clone(),
    })
}

// The only repeated slot across the known function set. Kept here so that
// spec round-trips do not collapse a one-element operand list into a single
// argument.
fn is_repeated_argument(argument: &str) -> bool {
    argument == "operands"
}
