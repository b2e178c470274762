use crate::context::{EvaluationContext, RawPoint};
use crate::function::transform::{replace_nulls, ReplaceStrategy};
use crate::point::{Point, PointParams};
use crate::value::Value;
use chart_model::FunctionTree;
use serde::Deserialize;

/// How empty (null) values of a loaded series are filled before the series
/// leaves the source function.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplaceEmptyOptions {
    #[serde(default)]
    pub strategy: ReplaceStrategy,
    #[serde(default)]
    pub fallback_value: Option<f64>,
}

pub(super) fn literal(tree: &FunctionTree, id: u64) -> Value {
    match tree.parameter(id, "data") {
        Some(data) => Value::from_json(data),
        None => Value::None,
    }
}

pub(super) fn current_value(ctx: &EvaluationContext<'_>) -> Value {
    match ctx.current_value {
        Some(value) => Value::Number(value),
        None => Value::None,
    }
}

pub(super) fn load_series(ctx: &EvaluationContext<'_>, tree: &FunctionTree, id: u64) -> Value {
    let source_name = tree
        .parameter(id, "source_name")
        .and_then(|value| value.as_str())
        .map(str::to_string);
    match source_name {
        Some(name) => load_named_series(ctx, tree, id, &name),
        None => Value::None,
    }
}

pub(super) fn load_repeated_series(
    ctx: &EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Value {
    match ctx.repeated_source.clone() {
        Some(name) => load_named_series(ctx, tree, id, &name),
        None => Value::None,
    }
}

fn load_named_series(
    ctx: &EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
    source_name: &str,
) -> Value {
    if ctx.window.time_resolution == 0 || ctx.window.points_count == 0 {
        return Value::Points(Vec::new());
    }
    if source_name.trim().is_empty() {
        return Value::None;
    }

    let options: ReplaceEmptyOptions = tree
        .parameter(id, "replace_empty")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();

    // One extra point is requested so that reaching the end of the stored
    // series can be detected and the oldest points flagged.
    let mut query = ctx.series_query();
    query.points_count += 1;

    match ctx.resolver.fetch_series(source_name, &query) {
        Some(raw_points) => Value::Points(fit_points_to_window(ctx, &options, raw_points)),
        None => {
            log::debug!("data source '{source_name}' is unavailable, series degrades to no data");
            Value::None
        }
    }
}

/// Normalizes raw store samples into exactly `points_count` chart points:
/// sorted ascending, aligned to the time resolution, gaps filled with fake
/// null points, null values replaced per the configured strategy, and
/// oldest/newest edges flagged.
fn fit_points_to_window(
    ctx: &EvaluationContext<'_>,
    options: &ReplaceEmptyOptions,
    raw_points: Vec<RawPoint>,
) -> Vec<Point> {
    let resolution = ctx.window.time_resolution as i64;
    let points_count = ctx.window.points_count;

    // Newest first while the window is being assembled.
    let mut points: Vec<Point> = raw_points
        .into_iter()
        .map(|raw| {
            Point::with_params(
                raw.timestamp,
                raw.value,
                PointParams {
                    point_duration: Some(resolution as u64),
                    ..Default::default()
                },
            )
        })
        .collect();
    points.sort_by_key(|point| std::cmp::Reverse(point.timestamp));

    if let Some(last) = ctx.window.last_point_timestamp {
        points.retain(|point| point.timestamp <= last);
    }

    let is_last_point_newest = match ctx.window.last_point_timestamp {
        Some(last) => ctx.window.now_timestamp - last < resolution,
        None => true,
    };

    // The query asked for one extra point; receiving fewer means the whole
    // stored history is already visible.
    let globally_oldest_timestamp = if !points.is_empty() && points.len() < points_count + 1 {
        points.last().map(|point| point.timestamp)
    } else {
        None
    };

    points.retain(|point| point.timestamp.rem_euclid(resolution) == 0);

    if points.is_empty() {
        return match ctx.window.last_point_timestamp {
            Some(last) => fake_window(ctx, options, last, is_last_point_newest),
            None => Vec::new(),
        };
    }

    // Fill the gap between the newest received point and the requested
    // window edge.
    if let Some(last) = ctx.window.last_point_timestamp {
        if last - resolution >= points[0].timestamp {
            let missing_seconds = last - points[0].timestamp;
            let normalized_missing = missing_seconds - missing_seconds % resolution;
            let mut next_timestamp = points[0].timestamp + normalized_missing;
            let mut to_prepend = Vec::new();
            while next_timestamp > points[0].timestamp && to_prepend.len() < points_count {
                to_prepend.push(fake_point(next_timestamp, resolution));
                next_timestamp -= resolution;
            }
            to_prepend.append(&mut points);
            points = to_prepend;
        }
    }

    // Fill gaps between and before received points, cutting the window to
    // exactly `points_count` entries.
    let with_gaps = points;
    let mut windowed: Vec<Point> = Vec::with_capacity(points_count);
    let mut next_timestamp = with_gaps[0].timestamp;
    let mut origin_idx = 0;
    while windowed.len() < points_count {
        if origin_idx < with_gaps.len() && with_gaps[origin_idx].timestamp == next_timestamp {
            windowed.push(with_gaps[origin_idx].clone());
            origin_idx += 1;
        } else {
            windowed.push(fake_point(next_timestamp, resolution));
        }
        next_timestamp -= resolution;
    }

    // Ascending from here on. For the use-previous strategy the replacement
    // is seeded with the newest non-empty point older than the window, so
    // the oldest visible point can still inherit a value.
    let oldest_timestamp = windowed.last().map(|point| point.timestamp).unwrap_or(0);
    let seed_value = with_gaps
        .iter()
        .find(|point| point.timestamp < oldest_timestamp && point.value.is_some())
        .and_then(|point| point.value);
    windowed.reverse();

    let mut values: Vec<Option<f64>> = Vec::with_capacity(windowed.len() + 1);
    values.push(seed_value);
    values.extend(windowed.iter().map(|point| point.value));
    let fallbacks = vec![options.fallback_value; values.len()];
    let replaced = replace_nulls(&values, options.strategy, &fallbacks);
    for (point, value) in windowed.iter_mut().zip(replaced.into_iter().skip(1)) {
        point.value = value;
    }

    if is_last_point_newest {
        for point in windowed.iter_mut().rev() {
            let is_real = !point.fake;
            point.newest = true;
            if is_real {
                break;
            }
        }
    }

    if let Some(oldest) = globally_oldest_timestamp {
        for point in windowed.iter_mut() {
            if point.timestamp > oldest {
                break;
            }
            point.oldest = true;
        }
    }

    windowed
}

fn fake_point(timestamp: i64, resolution: i64) -> Point {
    Point::with_params(
        timestamp,
        None,
        PointParams {
            point_duration: Some(resolution as u64),
            fake: true,
            ..Default::default()
        },
    )
}

/// A full window of fake points, produced when the source returned nothing
/// usable for the requested range.
fn fake_window(
    ctx: &EvaluationContext<'_>,
    options: &ReplaceEmptyOptions,
    last_point_timestamp: i64,
    is_last_point_newest: bool,
) -> Vec<Point> {
    let resolution = ctx.window.time_resolution as i64;
    let aligned_last = last_point_timestamp - last_point_timestamp.rem_euclid(resolution);

    let mut points = Vec::with_capacity(ctx.window.points_count);
    let mut timestamp = aligned_last - (ctx.window.points_count as i64 - 1) * resolution;
    while points.len() < ctx.window.points_count {
        let mut point = fake_point(timestamp, resolution);
        point.oldest = true;
        point.newest = is_last_point_newest;
        points.push(point);
        timestamp += resolution;
    }

    let values: Vec<Option<f64>> = points.iter().map(|point| point.value).collect();
    let fallbacks = vec![options.fallback_value; values.len()];
    let replaced = replace_nulls(&values, options.strategy, &fallbacks);
    for (point, value) in points.iter_mut().zip(replaced) {
        point.value = value;
    }

    points
}
