use chart_eval::function::DataType;
use chart_eval::{validate_chart, validate_tree, EvalError, ValidationErrorKind};
use chart_model::{
    add_function, attach_function, Attachment, AxisDefinition, ChartDefinition, FunctionTree,
    SeriesDefinition, SeriesGroupDefinition,
};

fn literal(tree: &mut FunctionTree, data: serde_json::Value) -> u64 {
    add_function(tree, "literal", serde_json::json!({ "data": data }))
}

fn series_tree() -> FunctionTree {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "abs", serde_json::Value::Null);
    tree.root = Some(root);
    let load = add_function(
        &mut tree,
        "loadSeries",
        serde_json::json!({ "source_name": "bytes" }),
    );
    attach_function(&mut tree, root, "input", load, 1).expect("attach");
    tree
}

fn axis(id: &str) -> AxisDefinition {
    AxisDefinition {
        id: id.to_string(),
        name: "Bytes".to_string(),
        unit_name: "B".to_string(),
        min_interval: None,
        label_provider: None,
    }
}

fn series(id: &str, y_axis_id: &str) -> SeriesDefinition {
    SeriesDefinition {
        id: id.to_string(),
        name: id.to_string(),
        color: None,
        y_axis_id: y_axis_id.to_string(),
        group_id: None,
        repeat_per_source: None,
        data: series_tree(),
    }
}

#[test]
fn well_formed_tree_validates_cleanly() {
    let tree = series_tree();
    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation.is_valid(), "unexpected: {:?}", validation.errors);
    assert_eq!(validation.output_type(&tree), Some(DataType::Points));
}

#[test]
fn literal_types_follow_their_data() {
    let mut tree = FunctionTree::default();
    let root = literal(&mut tree, serde_json::json!(5));
    tree.root = Some(root);
    let validation = validate_tree(&tree).expect("acyclic");
    assert_eq!(validation.output_type(&tree), Some(DataType::Number));

    let mut tree = FunctionTree::default();
    let root = literal(&mut tree, serde_json::json!("label"));
    tree.root = Some(root);
    let validation = validate_tree(&tree).expect("acyclic");
    assert_eq!(validation.output_type(&tree), Some(DataType::Text));
}

#[test]
fn unknown_function_is_reported_not_fatal() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "median", serde_json::Value::Null);
    tree.root = Some(root);

    let validation = validate_tree(&tree).expect("acyclic");
    assert_eq!(validation.errors.len(), 1);
    assert_eq!(
        validation.errors[0].kind,
        ValidationErrorKind::UnknownFunction {
            function_name: "median".to_string()
        }
    );
    assert_eq!(validation.errors[0].node_id, Some(root));
}

#[test]
fn empty_required_argument_is_reported() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "multiply", serde_json::Value::Null);
    tree.root = Some(root);

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation
        .errors
        .iter()
        .any(|error| error.kind == ValidationErrorKind::EmptyArgument
            && error.argument.as_deref() == Some("operands")));
    assert_eq!(validation.output_type(&tree), None);
}

#[test]
fn text_input_to_numeric_transform_is_reported() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "abs", serde_json::Value::Null);
    tree.root = Some(root);
    let text = literal(&mut tree, serde_json::json!("not a number"));
    attach_function(&mut tree, root, "input", text, 1).expect("attach");

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation.errors.iter().any(|error| matches!(
        &error.kind,
        ValidationErrorKind::WrongArgumentType { actual, .. } if *actual == DataType::Text
    )));
}

#[test]
fn unresolved_input_marks_parent_return_type_undefined() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "abs", serde_json::Value::Null);
    tree.root = Some(root);
    let unknown = add_function(&mut tree, "median", serde_json::Value::Null);
    attach_function(&mut tree, root, "input", unknown, 1).expect("attach");

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation
        .errors
        .iter()
        .any(|error| error.kind == ValidationErrorKind::UndefinedReturnType
            && error.node_id == Some(root)));
    assert_eq!(validation.output_type(&tree), None);
}

#[test]
fn detached_functions_are_reported() {
    let mut tree = series_tree();
    let orphan = literal(&mut tree, serde_json::json!(1));

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation
        .errors
        .iter()
        .any(|error| error.kind == ValidationErrorKind::DetachedFunction
            && error.node_id == Some(orphan)));
}

#[test]
fn missing_root_is_reported() {
    let mut tree = FunctionTree::default();
    literal(&mut tree, serde_json::json!(1));

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation
        .errors
        .iter()
        .any(|error| error.kind == ValidationErrorKind::MissingRoot));
}

#[test]
fn bad_parameters_are_reported() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "rate", serde_json::json!({ "time_span": -3 }));
    tree.root = Some(root);
    let input = literal(&mut tree, serde_json::json!(1));
    attach_function(&mut tree, root, "input", input, 1).expect("attach");

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation.errors.iter().any(|error| {
        error.kind
            == ValidationErrorKind::InvalidParameter {
                parameter: "time_span".to_string(),
            }
    }));
}

#[test]
fn load_series_without_source_name_is_reported() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "loadSeries", serde_json::json!({ "source_name": " " }));
    tree.root = Some(root);

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation.errors.iter().any(|error| {
        error.kind
            == ValidationErrorKind::InvalidParameter {
                parameter: "source_name".to_string(),
            }
    }));
    // Type is still known; the name is fixable without reshaping the tree.
    assert_eq!(validation.output_type(&tree), Some(DataType::Points));
}

#[test]
fn multiply_type_is_points_when_any_operand_is_points() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "multiply", serde_json::Value::Null);
    tree.root = Some(root);
    let number = literal(&mut tree, serde_json::json!(2));
    attach_function(&mut tree, root, "operands", number, usize::MAX).expect("attach");
    let load = add_function(
        &mut tree,
        "loadSeries",
        serde_json::json!({ "source_name": "bytes" }),
    );
    attach_function(&mut tree, root, "operands", load, usize::MAX).expect("attach");

    let validation = validate_tree(&tree).expect("acyclic");
    assert!(validation.is_valid());
    assert_eq!(validation.output_type(&tree), Some(DataType::Points));
}

#[test]
fn cyclic_tree_is_the_only_fatal_case() {
    let mut tree = FunctionTree::default();
    let a = add_function(&mut tree, "abs", serde_json::Value::Null);
    let b = add_function(&mut tree, "abs", serde_json::Value::Null);
    tree.root = Some(a);
    tree.attachments.push(Attachment {
        parent: a,
        argument: "input".to_string(),
        child: b,
        position: 0,
    });
    tree.attachments.push(Attachment {
        parent: b,
        argument: "input".to_string(),
        child: a,
        position: 0,
    });

    assert_eq!(validate_tree(&tree), Err(EvalError::CyclicFunctionTree));
}

#[test]
fn chart_validation_checks_cross_references() {
    let chart = ChartDefinition {
        title: "Dashboard".to_string(),
        title_tip: String::new(),
        y_axes: vec![axis("bytes-axis"), axis("bytes-axis")],
        series_groups: vec![SeriesGroupDefinition {
            id: "group-1".to_string(),
            name: " ".to_string(),
            stacked: false,
            show_sum: false,
        }],
        series: vec![
            series("ok", "bytes-axis"),
            series("dangling", "no-such-axis"),
            series("unassigned", ""),
            SeriesDefinition {
                group_id: Some("no-such-group".to_string()),
                ..series("grouped", "bytes-axis")
            },
        ],
    };

    let validation = validate_chart(&chart);
    let kinds: Vec<&ValidationErrorKind> =
        validation.errors.iter().map(|error| &error.kind).collect();
    assert!(kinds.contains(&&ValidationErrorKind::DuplicateIdentifier {
        id: "bytes-axis".to_string()
    }));
    assert!(kinds.contains(&&ValidationErrorKind::EmptyName));
    assert!(kinds.contains(&&ValidationErrorKind::UnknownAxis {
        axis_id: "no-such-axis".to_string()
    }));
    assert!(kinds.contains(&&ValidationErrorKind::AxisNotAssigned));
    assert!(kinds.contains(&&ValidationErrorKind::UnknownGroup {
        group_id: "no-such-group".to_string()
    }));
    assert!(validation.trees.contains_key("ok"));
    assert!(validation.trees["ok"].is_valid());
}

#[test]
fn chart_validation_records_cyclic_series_without_aborting() {
    let mut cyclic = FunctionTree::default();
    let a = add_function(&mut cyclic, "abs", serde_json::Value::Null);
    let b = add_function(&mut cyclic, "abs", serde_json::Value::Null);
    cyclic.root = Some(a);
    cyclic.attachments.push(Attachment {
        parent: a,
        argument: "input".to_string(),
        child: b,
        position: 0,
    });
    cyclic.attachments.push(Attachment {
        parent: b,
        argument: "input".to_string(),
        child: a,
        position: 0,
    });

    let chart = ChartDefinition {
        title: "Dashboard".to_string(),
        title_tip: String::new(),
        y_axes: vec![axis("bytes-axis")],
        series_groups: Vec::new(),
        series: vec![
            SeriesDefinition {
                data: cyclic,
                ..series("broken", "bytes-axis")
            },
            series("ok", "bytes-axis"),
        ],
    };

    let validation = validate_chart(&chart);
    assert!(validation
        .errors
        .iter()
        .any(|error| error.kind == ValidationErrorKind::CyclicFunctionTree
            && error.element_id.as_deref() == Some("broken")));
    assert!(validation.trees["ok"].is_valid());
}
