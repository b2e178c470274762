use chart_eval::{
    axis_label, evaluate_chart, DataSourceResolver, RawPoint, SeriesQuery, ViewWindow,
};
use chart_model::{
    add_function, attach_function, AxisDefinition, ChartDefinition, FunctionTree, SeriesDefinition,
};
use std::collections::HashMap;

struct StubResolver {
    series: HashMap<String, Vec<RawPoint>>,
}

impl StubResolver {
    fn new(entries: &[(&str, &[(i64, Option<f64>)])]) -> Self {
        let mut series = HashMap::new();
        for (name, samples) in entries {
            series.insert(
                name.to_string(),
                samples
                    .iter()
                    .map(|(timestamp, value)| RawPoint {
                        timestamp: *timestamp,
                        value: *value,
                    })
                    .collect(),
            );
        }
        Self { series }
    }
}

impl DataSourceResolver for StubResolver {
    fn fetch_series(&self, source_name: &str, _query: &SeriesQuery) -> Option<Vec<RawPoint>> {
        self.series.get(source_name).cloned()
    }

    fn list_sources(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .series
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn window() -> ViewWindow {
    ViewWindow {
        time_resolution: 5,
        points_count: 3,
        last_point_timestamp: Some(20),
        now_timestamp: 20,
    }
}

fn load_series_tree(source_name: &str) -> FunctionTree {
    let mut tree = FunctionTree::default();
    let root = add_function(
        &mut tree,
        "loadSeries",
        serde_json::json!({ "source_name": source_name }),
    );
    tree.root = Some(root);
    tree
}

fn load_repeated_series_tree() -> FunctionTree {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "loadRepeatedSeries", serde_json::Value::Null);
    tree.root = Some(root);
    tree
}

fn chart_with_series(series: Vec<SeriesDefinition>) -> ChartDefinition {
    ChartDefinition {
        title: "Cluster throughput".to_string(),
        title_tip: String::new(),
        y_axes: vec![AxisDefinition {
            id: "bytes-axis".to_string(),
            name: "Bytes".to_string(),
            unit_name: "B".to_string(),
            min_interval: None,
            label_provider: None,
        }],
        series_groups: Vec::new(),
        series,
    }
}

const SAMPLES: &[(i64, Option<f64>)] =
    &[(5, Some(0.0)), (10, Some(1.0)), (15, Some(2.0)), (20, Some(3.0))];

#[test]
fn evaluate_chart_produces_points_per_series() {
    let resolver = StubResolver::new(&[("bytes", SAMPLES)]);
    let chart = chart_with_series(vec![SeriesDefinition {
        id: "throughput".to_string(),
        name: "Throughput".to_string(),
        color: Some("#00ff00".to_string()),
        y_axis_id: "bytes-axis".to_string(),
        group_id: None,
        repeat_per_source: None,
        data: load_series_tree("bytes"),
    }]);

    let states = evaluate_chart(&resolver, &chart, &window()).expect("evaluate");
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].id, "throughput");
    assert_eq!(states[0].y_axis_id, "bytes-axis");
    assert_eq!(
        states[0].points.iter().map(|p| p.value).collect::<Vec<_>>(),
        vec![Some(1.0), Some(2.0), Some(3.0)]
    );
}

#[test]
fn repeated_series_expands_per_matching_source() {
    let resolver = StubResolver::new(&[
        ("node-1", SAMPLES),
        ("node-2", SAMPLES),
        ("other", SAMPLES),
    ]);
    let chart = chart_with_series(vec![SeriesDefinition {
        id: "cpu".to_string(),
        name: "CPU".to_string(),
        color: None,
        y_axis_id: "bytes-axis".to_string(),
        group_id: None,
        repeat_per_source: Some("node-".to_string()),
        data: load_repeated_series_tree(),
    }]);

    let states = evaluate_chart(&resolver, &chart, &window()).expect("evaluate");
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].id, "cpu-node-1");
    assert_eq!(states[0].name, "CPU (node-1)");
    assert_eq!(states[1].id, "cpu-node-2");
    assert_eq!(
        states[0].points.iter().map(|p| p.value).collect::<Vec<_>>(),
        vec![Some(1.0), Some(2.0), Some(3.0)]
    );
}

#[test]
fn repeated_series_without_matching_sources_expands_to_nothing() {
    let resolver = StubResolver::new(&[("other", SAMPLES)]);
    let chart = chart_with_series(vec![SeriesDefinition {
        id: "cpu".to_string(),
        name: "CPU".to_string(),
        color: None,
        y_axis_id: "bytes-axis".to_string(),
        group_id: None,
        repeat_per_source: Some("node-".to_string()),
        data: load_repeated_series_tree(),
    }]);

    let states = evaluate_chart(&resolver, &chart, &window()).expect("evaluate");
    assert!(states.is_empty());
}

#[test]
fn non_points_series_result_yields_empty_points() {
    let mut tree = FunctionTree::default();
    let root = add_function(&mut tree, "literal", serde_json::json!({ "data": 5 }));
    tree.root = Some(root);

    let resolver = StubResolver::new(&[]);
    let chart = chart_with_series(vec![SeriesDefinition {
        id: "scalar".to_string(),
        name: "Scalar".to_string(),
        color: None,
        y_axis_id: "bytes-axis".to_string(),
        group_id: None,
        repeat_per_source: None,
        data: tree,
    }]);

    let states = evaluate_chart(&resolver, &chart, &window()).expect("evaluate");
    assert_eq!(states.len(), 1);
    assert!(states[0].points.is_empty());
}

#[test]
fn axis_label_uses_the_label_provider_tree() {
    let mut label_tree = FunctionTree::default();
    let root = add_function(&mut label_tree, "asBytes", serde_json::Value::Null);
    label_tree.root = Some(root);
    let input = add_function(&mut label_tree, "currentValue", serde_json::Value::Null);
    attach_function(&mut label_tree, root, "input", input, 1).expect("attach");

    let axis = AxisDefinition {
        id: "bytes-axis".to_string(),
        name: "Bytes".to_string(),
        unit_name: "B".to_string(),
        min_interval: None,
        label_provider: Some(label_tree),
    };

    let resolver = StubResolver::new(&[]);
    let label = axis_label(&resolver, &axis, &window(), 1536.0).expect("label");
    assert_eq!(label, "1.5 KiB");
}

#[test]
fn axis_label_falls_back_to_plain_rendering() {
    let axis = AxisDefinition {
        id: "bytes-axis".to_string(),
        name: "Bytes".to_string(),
        unit_name: "B/s".to_string(),
        min_interval: None,
        label_provider: None,
    };

    let resolver = StubResolver::new(&[]);
    let label = axis_label(&resolver, &axis, &window(), 1536.0).expect("label");
    assert_eq!(label, "1536 B/s");
}
