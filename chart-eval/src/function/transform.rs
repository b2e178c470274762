use crate::context::EvaluationContext;
use crate::format::{self, ByteNotation};
use crate::point::{merge_point_arrays, Point};
use crate::value::{normalize_number, Value};
use crate::EvalError;
use chart_model::FunctionTree;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStrategy {
    #[default]
    UseFallback,
    UsePrevious,
}

/// Operands of an element-wise transform, broadcast to a common length.
/// `None` when array operands disagree on length; that inconsistency is not
/// repairable, so the whole transform degrades to "no data".
struct Broadcast {
    arrays: Vec<Vec<Option<f64>>>,
    /// The first points-shaped operand. Its timestamps and provenance
    /// metadata survive into a points-shaped result.
    first_points: Option<Vec<Point>>,
    any_array: bool,
    len: usize,
}

fn broadcast(operands: &[Value]) -> Option<Broadcast> {
    let mut len: Option<usize> = None;
    for operand in operands {
        if let Some(operand_len) = operand.array_len() {
            match len {
                Some(len) if len != operand_len => return None,
                _ => len = Some(operand_len),
            }
        }
    }
    let any_array = len.is_some();
    let len = len.unwrap_or(1);

    Some(Broadcast {
        arrays: operands
            .iter()
            .map(|operand| operand.broadcast_numeric(len))
            .collect(),
        first_points: operands
            .iter()
            .find_map(|operand| operand.points().map(|points| points.to_vec())),
        any_array,
        len,
    })
}

/// Shapes the computed values back into a `Value`: points stay points,
/// arrays stay arrays, scalar-only input yields a scalar.
fn finish(
    values: Vec<Option<f64>>,
    first_points: Option<Vec<Point>>,
    any_array: bool,
) -> Result<Value, EvalError> {
    if let Some(points) = first_points {
        let merged = merge_point_arrays(&[&points], &values)?;
        return Ok(Value::Points(merged));
    }
    if any_array {
        return Ok(Value::Numbers(values));
    }
    match values.first().copied().flatten() {
        Some(number) => Ok(Value::Number(number)),
        None => Ok(Value::None),
    }
}

pub(super) fn multiply(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Result<Value, EvalError> {
    let mut operands = Vec::new();
    for child in tree.argument_children(id, "operands") {
        operands.push(ctx.evaluate(tree, Some(child))?);
    }
    if operands.is_empty() {
        return Ok(Value::None);
    }

    let Some(broadcast) = broadcast(&operands) else {
        return Ok(Value::None);
    };

    let mut result = broadcast.arrays[0].clone();
    for operand in &broadcast.arrays[1..] {
        for i in 0..broadcast.len {
            result[i] = match (result[i], operand[i]) {
                (Some(left), Some(right)) => Some(left * right),
                _ => None,
            };
        }
    }
    finish(result, broadcast.first_points, broadcast.any_array)
}

pub(super) fn abs(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Result<Value, EvalError> {
    let input = ctx.evaluate(tree, tree.argument_child(id, "input"))?;
    let Some(broadcast) = broadcast(std::slice::from_ref(&input)) else {
        return Ok(Value::None);
    };
    let values = broadcast.arrays[0]
        .iter()
        .map(|value| value.map(f64::abs))
        .collect();
    finish(values, broadcast.first_points, broadcast.any_array)
}

/// `value / measurement_duration * time_span` per sample: turns absolute
/// counters into per-time-span rates. Non-point input falls back to the
/// window's time resolution as the duration.
pub(super) fn rate(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Result<Value, EvalError> {
    let input = ctx.evaluate(tree, tree.argument_child(id, "input"))?;
    let time_span = normalized_time_span(tree.parameter(id, "time_span"));
    let resolution = ctx.window.time_resolution.max(1) as f64;

    match input {
        Value::Points(points) => {
            let values: Vec<Option<f64>> = points
                .iter()
                .map(|point| {
                    normalize_number(point.value)
                        .map(|value| value / point.measurement_duration() as f64 * time_span)
                })
                .collect();
            Ok(Value::Points(merge_point_arrays(&[&points], &values)?))
        }
        Value::Numbers(values) => Ok(Value::Numbers(
            values
                .into_iter()
                .map(|value| normalize_number(value).map(|value| value / resolution * time_span))
                .collect(),
        )),
        Value::Number(value) => Ok(Value::Number(value / resolution * time_span)),
        _ => Ok(Value::None),
    }
}

/// Difference between adjacent samples scaled to the time span. The output
/// is one element shorter than the input: there is nothing to subtract from
/// the first sample.
pub(super) fn time_derivative(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Result<Value, EvalError> {
    let input = ctx.evaluate(tree, tree.argument_child(id, "input"))?;
    let time_span = normalized_time_span(tree.parameter(id, "time_span"));
    let resolution = ctx.window.time_resolution.max(1) as f64;

    match input {
        Value::Points(points) => {
            if points.is_empty() {
                return Ok(Value::Points(Vec::new()));
            }
            let values = derive_values(
                &points.iter().map(|point| point.value).collect::<Vec<_>>(),
                resolution,
                time_span,
            );
            Ok(Value::Points(merge_point_arrays(&[&points[1..]], &values)?))
        }
        Value::Numbers(values) => {
            if values.is_empty() {
                return Ok(Value::Numbers(Vec::new()));
            }
            Ok(Value::Numbers(derive_values(&values, resolution, time_span)))
        }
        _ => Ok(Value::None),
    }
}

fn derive_values(values: &[Option<f64>], resolution: f64, time_span: f64) -> Vec<Option<f64>> {
    values
        .windows(2)
        .map(|pair| {
            match (normalize_number(pair[0]), normalize_number(pair[1])) {
                (Some(previous), Some(current)) => {
                    Some((current - previous) / resolution * time_span)
                }
                _ => None,
            }
        })
        .collect()
}

fn normalized_time_span(parameter: Option<&serde_json::Value>) -> f64 {
    match parameter.and_then(|value| value.as_f64()) {
        Some(time_span) if time_span.is_finite() && time_span > 0.0 => time_span,
        _ => 1.0,
    }
}

pub(super) fn as_bytes(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Result<Value, EvalError> {
    let input = ctx.evaluate(tree, tree.argument_child(id, "input"))?;
    let notation = tree
        .parameter(id, "format")
        .and_then(|value| value.as_str())
        .and_then(ByteNotation::parse)
        .unwrap_or(ByteNotation::Iec);

    let format_one =
        |value: Option<f64>| normalize_number(value).map(|value| format::format_bytes(value, notation));

    match input {
        Value::Number(value) => Ok(match format_one(Some(value)) {
            Some(text) => Value::Text(text),
            None => Value::None,
        }),
        Value::Numbers(values) => Ok(Value::Texts(
            values.into_iter().map(format_one).collect(),
        )),
        Value::Points(points) => Ok(Value::Texts(
            points.iter().map(|point| format_one(point.value)).collect(),
        )),
        _ => Ok(Value::None),
    }
}

pub(super) fn replace_empty(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
) -> Result<Value, EvalError> {
    let input = ctx.evaluate(tree, tree.argument_child(id, "input"))?;
    let fallback = ctx.evaluate(tree, tree.argument_child(id, "fallback"))?;
    let strategy = tree
        .parameter(id, "strategy")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();

    match input {
        Value::Points(points) => {
            let Some(fallbacks) = fallback_values_for_points(&points, &fallback) else {
                return Ok(Value::None);
            };
            let values: Vec<Option<f64>> = points.iter().map(|point| point.value).collect();
            let replaced = replace_nulls(&values, strategy, &fallbacks);
            Ok(Value::Points(merge_point_arrays(&[&points], &replaced)?))
        }
        Value::Numbers(values) => {
            let fallbacks = match &fallback {
                Value::Points(fallback_points) => {
                    if fallback_points.len() != values.len() {
                        return Ok(Value::None);
                    }
                    fallback_points.iter().map(|point| point.value).collect()
                }
                Value::Numbers(fallback_values) => {
                    if fallback_values.len() != values.len() {
                        return Ok(Value::None);
                    }
                    fallback_values.clone()
                }
                Value::Number(number) => vec![Some(*number); values.len()],
                _ => vec![None; values.len()],
            };
            Ok(Value::Numbers(replace_nulls(&values, strategy, &fallbacks)))
        }
        // A scalar cannot be patched with an array of fallbacks, present or
        // not.
        input => {
            if fallback.is_array() {
                return Ok(Value::None);
            }
            match input {
                Value::None => Ok(fallback),
                other => Ok(other),
            }
        }
    }
}

/// Fallbacks aligned to the input points: a points-shaped fallback matches
/// by timestamp, a plain array element-wise (lengths must agree), a scalar
/// everywhere. `None` signals unusable shapes.
fn fallback_values_for_points(points: &[Point], fallback: &Value) -> Option<Vec<Option<f64>>> {
    match fallback {
        Value::Points(fallback_points) => {
            let mut values = Vec::with_capacity(points.len());
            let mut fallback_idx = 0;
            for point in points {
                while fallback_idx < fallback_points.len()
                    && fallback_points[fallback_idx].timestamp < point.timestamp
                {
                    fallback_idx += 1;
                }
                if fallback_idx < fallback_points.len()
                    && fallback_points[fallback_idx].timestamp == point.timestamp
                {
                    values.push(fallback_points[fallback_idx].value);
                } else {
                    values.push(None);
                }
            }
            Some(values)
        }
        Value::Numbers(fallback_values) => {
            if fallback_values.len() != points.len() {
                return None;
            }
            Some(fallback_values.clone())
        }
        Value::Number(number) => Some(vec![Some(*number); points.len()]),
        _ => Some(vec![None; points.len()]),
    }
}

/// Substitutes nulls: with the previous non-null result value when the
/// strategy asks for it and one exists, otherwise with the fallback at the
/// same index.
pub(crate) fn replace_nulls(
    source: &[Option<f64>],
    strategy: ReplaceStrategy,
    fallbacks: &[Option<f64>],
) -> Vec<Option<f64>> {
    let mut result: Vec<Option<f64>> = Vec::with_capacity(source.len());
    for (i, value) in source.iter().enumerate() {
        if value.is_some() {
            result.push(*value);
        } else if strategy == ReplaceStrategy::UsePrevious && i > 0 && result[i - 1].is_some() {
            result.push(result[i - 1]);
        } else {
            result.push(fallbacks.get(i).copied().flatten());
        }
    }
    result
}
