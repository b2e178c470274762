use crate::function::{DataType, FunctionKind};
use crate::EvalError;
use chart_model::{ensure_acyclic, reachable_from_root, ChartDefinition, FunctionTree};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Machine-readable validation error kinds. The presentation layer maps the
/// serialized `code` to human-readable text; this crate never renders
/// messages itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    UnknownFunction { function_name: String },
    EmptyArgument,
    WrongArgumentType { expected: Vec<DataType>, actual: DataType },
    UndefinedReturnType,
    DetachedFunction,
    InvalidParameter { parameter: String },
    MissingRoot,
    CyclicFunctionTree,
    EmptyName,
    DuplicateIdentifier { id: String },
    AxisNotAssigned,
    UnknownAxis { axis_id: String },
    UnknownGroup { group_id: String },
}

/// One advisory validation finding. Validation output is data for the
/// editor UI; it never prevents evaluation from running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    #[serde(flatten)]
    pub kind: ValidationErrorKind,
    /// Offending function node, when the error is tree-local.
    pub node_id: Option<u64>,
    /// Offending argument slot of that node, when applicable.
    pub argument: Option<String>,
    /// Offending chart element (series/axis/group) id, when chart-level.
    pub element_id: Option<String>,
}

impl ValidationError {
    fn node(kind: ValidationErrorKind, node_id: u64) -> Self {
        Self {
            kind,
            node_id: Some(node_id),
            argument: None,
            element_id: None,
        }
    }

    fn argument(kind: ValidationErrorKind, node_id: u64, argument: &str) -> Self {
        Self {
            kind,
            node_id: Some(node_id),
            argument: Some(argument.to_string()),
            element_id: None,
        }
    }

    fn tree(kind: ValidationErrorKind) -> Self {
        Self {
            kind,
            node_id: None,
            argument: None,
            element_id: None,
        }
    }

    fn element(kind: ValidationErrorKind, element_id: &str) -> Self {
        Self {
            kind,
            node_id: None,
            argument: None,
            element_id: Some(element_id.to_string()),
        }
    }
}

/// Result of the static walk over one function tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeValidation {
    /// Inferred output type per node; `None` means undefined.
    pub node_types: HashMap<u64, Option<DataType>>,
    pub errors: Vec<ValidationError>,
}

impl TreeValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn output_type(&self, tree: &FunctionTree) -> Option<DataType> {
        tree.root
            .and_then(|root| self.node_types.get(&root).copied())
            .flatten()
    }
}

/// Result of validating a whole chart definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartValidation {
    pub errors: Vec<ValidationError>,
    /// Tree validations keyed by series id (and axis id for label
    /// providers), with `element_id` filled in on every error.
    pub trees: BTreeMap<String, TreeValidation>,
}

impl ChartValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.trees.values().all(TreeValidation::is_valid)
    }
}

/// Statically walks a function tree without evaluating any data: infers
/// each node's output type bottom-up and records advisory errors. Total for
/// any acyclic tree, however malformed; a cycle is the only failure.
pub fn validate_tree(tree: &FunctionTree) -> Result<TreeValidation, EvalError> {
    ensure_acyclic(tree)?;

    let mut validation = TreeValidation::default();
    for node in &tree.functions {
        infer_type(tree, node.id, &mut validation.node_types);
    }
    for node in &tree.functions {
        collect_node_errors(tree, node.id, &validation.node_types, &mut validation.errors);
    }

    match tree.root {
        Some(_) => {
            let reachable: HashSet<u64> = reachable_from_root(tree);
            for node in &tree.functions {
                if !reachable.contains(&node.id) {
                    validation
                        .errors
                        .push(ValidationError::node(
                            ValidationErrorKind::DetachedFunction,
                            node.id,
                        ));
                }
            }
        }
        None => {
            validation
                .errors
                .push(ValidationError::tree(ValidationErrorKind::MissingRoot));
        }
    }

    Ok(validation)
}

fn infer_type(
    tree: &FunctionTree,
    id: u64,
    memo: &mut HashMap<u64, Option<DataType>>,
) -> Option<DataType> {
    if let Some(inferred) = memo.get(&id) {
        return *inferred;
    }

    let inferred = match tree
        .node(id)
        .and_then(|node| FunctionKind::parse(&node.function_name))
    {
        None => None,
        Some(FunctionKind::Literal) => match tree.parameter(id, "data") {
            Some(serde_json::Value::Number(_)) | Some(serde_json::Value::Array(_)) => {
                Some(DataType::Number)
            }
            Some(serde_json::Value::String(_)) => Some(DataType::Text),
            _ => None,
        },
        Some(FunctionKind::CurrentValue) => Some(DataType::Number),
        Some(FunctionKind::LoadSeries) | Some(FunctionKind::LoadRepeatedSeries) => {
            Some(DataType::Points)
        }
        Some(FunctionKind::Multiply) => {
            let children = tree.argument_children(id, "operands");
            if children.is_empty() {
                None
            } else {
                let mut result = Some(DataType::Number);
                for child in children {
                    match infer_type(tree, child, memo) {
                        Some(DataType::Points) => result = result.map(|_| DataType::Points),
                        Some(DataType::Number) => {}
                        _ => {
                            result = None;
                            break;
                        }
                    }
                }
                result
            }
        }
        Some(FunctionKind::Abs)
        | Some(FunctionKind::Rate)
        | Some(FunctionKind::TimeDerivative)
        | Some(FunctionKind::ReplaceEmpty) => {
            match tree
                .argument_child(id, "input")
                .and_then(|child| infer_type(tree, child, memo))
            {
                Some(DataType::Number) => Some(DataType::Number),
                Some(DataType::Points) => Some(DataType::Points),
                _ => None,
            }
        }
        Some(FunctionKind::AsBytes) => {
            match tree
                .argument_child(id, "input")
                .and_then(|child| infer_type(tree, child, memo))
            {
                Some(DataType::Number) | Some(DataType::Points) => Some(DataType::Text),
                _ => None,
            }
        }
    };

    memo.insert(id, inferred);
    inferred
}

fn collect_node_errors(
    tree: &FunctionTree,
    id: u64,
    types: &HashMap<u64, Option<DataType>>,
    errors: &mut Vec<ValidationError>,
) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let Some(kind) = FunctionKind::parse(&node.function_name) else {
        errors.push(ValidationError::node(
            ValidationErrorKind::UnknownFunction {
                function_name: node.function_name.clone(),
            },
            id,
        ));
        return;
    };

    let errors_before = errors.len();

    for spec in kind.argument_specs() {
        let children = tree.argument_children(id, spec.name);
        if children.is_empty() {
            errors.push(ValidationError::argument(
                ValidationErrorKind::EmptyArgument,
                id,
                spec.name,
            ));
            continue;
        }
        for child in children {
            if let Some(Some(actual)) = types.get(&child) {
                if !spec.compatible_types.contains(actual) {
                    errors.push(ValidationError::argument(
                        ValidationErrorKind::WrongArgumentType {
                            expected: spec.compatible_types.to_vec(),
                            actual: *actual,
                        },
                        id,
                        spec.name,
                    ));
                }
            }
        }
    }

    collect_parameter_errors(tree, id, kind, errors);

    let type_undefined = types.get(&id).copied().flatten().is_none();
    if type_undefined && errors.len() == errors_before {
        errors.push(ValidationError::node(
            ValidationErrorKind::UndefinedReturnType,
            id,
        ));
    }
}

fn collect_parameter_errors(
    tree: &FunctionTree,
    id: u64,
    kind: FunctionKind,
    errors: &mut Vec<ValidationError>,
) {
    let invalid = |parameter: &str| {
        ValidationError::node(
            ValidationErrorKind::InvalidParameter {
                parameter: parameter.to_string(),
            },
            id,
        )
    };

    match kind {
        FunctionKind::Literal => {
            if tree.parameter(id, "data").is_none() {
                errors.push(invalid("data"));
            }
        }
        FunctionKind::LoadSeries => {
            let name_is_usable = tree
                .parameter(id, "source_name")
                .and_then(|value| value.as_str())
                .map(|name| !name.trim().is_empty())
                .unwrap_or(false);
            if !name_is_usable {
                errors.push(invalid("source_name"));
            }
        }
        FunctionKind::Rate | FunctionKind::TimeDerivative => {
            if let Some(time_span) = tree.parameter(id, "time_span") {
                let usable = time_span
                    .as_f64()
                    .map(|value| value.is_finite() && value > 0.0)
                    .unwrap_or(false);
                if !usable {
                    errors.push(invalid("time_span"));
                }
            }
        }
        FunctionKind::AsBytes => {
            if let Some(format) = tree.parameter(id, "format") {
                let usable = format
                    .as_str()
                    .map(|name| matches!(name, "iec" | "si" | "bit"))
                    .unwrap_or(false);
                if !usable {
                    errors.push(invalid("format"));
                }
            }
        }
        FunctionKind::ReplaceEmpty => {
            if let Some(strategy) = tree.parameter(id, "strategy") {
                let usable = strategy
                    .as_str()
                    .map(|name| matches!(name, "use_fallback" | "use_previous"))
                    .unwrap_or(false);
                if !usable {
                    errors.push(invalid("strategy"));
                }
            }
        }
        _ => {}
    }
}

/// Validates identifiers and cross-references of a chart definition and
/// every function tree it embeds. Total: a cyclic tree inside one series is
/// reported as a finding instead of aborting the other checks.
pub fn validate_chart(chart: &ChartDefinition) -> ChartValidation {
    let mut validation = ChartValidation::default();

    let mut seen_axes = HashSet::new();
    for axis in &chart.y_axes {
        if axis.name.trim().is_empty() {
            validation
                .errors
                .push(ValidationError::element(ValidationErrorKind::EmptyName, &axis.id));
        }
        if !seen_axes.insert(axis.id.clone()) {
            validation.errors.push(ValidationError::element(
                ValidationErrorKind::DuplicateIdentifier { id: axis.id.clone() },
                &axis.id,
            ));
        }
        if let Some(label_provider) = &axis.label_provider {
            validate_embedded_tree(&mut validation, &axis.id, label_provider);
        }
    }

    let mut seen_groups = HashSet::new();
    for group in &chart.series_groups {
        if group.name.trim().is_empty() {
            validation
                .errors
                .push(ValidationError::element(ValidationErrorKind::EmptyName, &group.id));
        }
        if !seen_groups.insert(group.id.clone()) {
            validation.errors.push(ValidationError::element(
                ValidationErrorKind::DuplicateIdentifier { id: group.id.clone() },
                &group.id,
            ));
        }
    }

    let mut seen_series = HashSet::new();
    for series in &chart.series {
        if series.name.trim().is_empty() {
            validation
                .errors
                .push(ValidationError::element(ValidationErrorKind::EmptyName, &series.id));
        }
        if !seen_series.insert(series.id.clone()) {
            validation.errors.push(ValidationError::element(
                ValidationErrorKind::DuplicateIdentifier { id: series.id.clone() },
                &series.id,
            ));
        }
        if series.y_axis_id.trim().is_empty() {
            validation.errors.push(ValidationError::element(
                ValidationErrorKind::AxisNotAssigned,
                &series.id,
            ));
        } else if !seen_axes.contains(&series.y_axis_id) {
            validation.errors.push(ValidationError::element(
                ValidationErrorKind::UnknownAxis {
                    axis_id: series.y_axis_id.clone(),
                },
                &series.id,
            ));
        }
        if let Some(group_id) = &series.group_id {
            if !seen_groups.contains(group_id) {
                validation.errors.push(ValidationError::element(
                    ValidationErrorKind::UnknownGroup {
                        group_id: group_id.clone(),
                    },
                    &series.id,
                ));
            }
        }
        validate_embedded_tree(&mut validation, &series.id, &series.data);
    }

    validation
}

fn validate_embedded_tree(validation: &mut ChartValidation, element_id: &str, tree: &FunctionTree) {
    match validate_tree(tree) {
        Ok(mut tree_validation) => {
            for error in &mut tree_validation.errors {
                error.element_id = Some(element_id.to_string());
            }
            validation
                .trees
                .insert(element_id.to_string(), tree_validation);
        }
        Err(_) => {
            validation.errors.push(ValidationError::element(
                ValidationErrorKind::CyclicFunctionTree,
                element_id,
            ));
        }
    }
}
