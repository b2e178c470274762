use crate::point::Point;

/// Result of evaluating a function node. Transforms must check the shape:
/// scalar-only inputs produce scalars, array inputs produce arrays, and a
/// points input keeps its point metadata through same-length transforms.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// "No data". Missing sources, absent argument slots and operand shape
    /// mismatches all degrade to this instead of failing the evaluation.
    None,
    Number(f64),
    Numbers(Vec<Option<f64>>),
    Text(String),
    Texts(Vec<Option<String>>),
    Points(Vec<Point>),
}

impl Value {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::Numbers(_) | Value::Texts(_) | Value::Points(_)
        )
    }

    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::Numbers(values) => Some(values.len()),
            Value::Texts(values) => Some(values.len()),
            Value::Points(points) => Some(points.len()),
            _ => None,
        }
    }

    pub fn points(&self) -> Option<&[Point]> {
        match self {
            Value::Points(points) => Some(points),
            _ => None,
        }
    }

    /// The value as a numeric array of the given length, with scalars
    /// repeated and every non-numeric entry mapped to `None`.
    pub fn broadcast_numeric(&self, len: usize) -> Vec<Option<f64>> {
        match self {
            Value::Number(number) => vec![normalize_number(Some(*number)); len],
            Value::Numbers(values) => values
                .iter()
                .map(|value| normalize_number(*value))
                .collect(),
            Value::Points(points) => points
                .iter()
                .map(|point| normalize_number(point.value))
                .collect(),
            _ => vec![None; len],
        }
    }

    /// Converts defensively from the JSON form used by `literal` parameters.
    /// Anything that is not a number, a string, or an array of those becomes
    /// "no data" rather than an error.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Number(number) => match number.as_f64() {
                Some(number) if number.is_finite() => Value::Number(number),
                _ => Value::None,
            },
            serde_json::Value::String(text) => Value::Text(text.clone()),
            serde_json::Value::Array(items) => Value::Numbers(
                items
                    .iter()
                    .map(|item| normalize_number(item.as_f64()))
                    .collect(),
            ),
            _ => Value::None,
        }
    }
}

pub(crate) fn normalize_number(value: Option<f64>) -> Option<f64> {
    value.filter(|number| number.is_finite())
}
