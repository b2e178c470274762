use crate::function::{self, FunctionKind};
use crate::value::Value;
use crate::EvalError;
use chart_model::{ensure_acyclic, FunctionTree};
use std::collections::HashMap;

/// Time window requested from a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub last_point_timestamp: Option<i64>,
    pub time_resolution: u64,
    pub points_count: usize,
}

/// A sample as delivered by a backing store, before it is fitted to the
/// chart's time window.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub timestamp: i64,
    pub value: Option<f64>,
}

/// Boundary to the backing time-series stores. Data is expected to be
/// fetched (and awaited, if remote) by the caller before the synchronous
/// evaluation walk starts; implementations here only hand it over.
pub trait DataSourceResolver {
    /// Returns the raw samples of a named source, or `None` when the source
    /// does not exist or is unavailable right now.
    fn fetch_series(&self, source_name: &str, query: &SeriesQuery) -> Option<Vec<RawPoint>>;

    /// Names of available sources starting with the given prefix, used to
    /// expand repeated series. Sources that cannot be enumerated report none.
    fn list_sources(&self, _prefix: &str) -> Vec<String> {
        Vec::new()
    }
}

/// The requested view of the chart: resolution and point count of the
/// X axis, plus the newest point to show.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewWindow {
    pub time_resolution: u64,
    pub points_count: usize,
    pub last_point_timestamp: Option<i64>,
    pub now_timestamp: i64,
}

/// Per-render evaluation state. A context is created fresh for every
/// render/preview request and discarded afterwards; the memoization cache
/// therefore never leaks results between renders, and concurrent renders
/// cannot observe each other.
pub struct EvaluationContext<'a> {
    pub resolver: &'a dyn DataSourceResolver,
    pub window: ViewWindow,
    /// Scalar bound while evaluating label-formatting subtrees.
    pub current_value: Option<f64>,
    /// Source name bound while evaluating one expansion of a repeated series.
    pub repeated_source: Option<String>,
    cache: HashMap<u64, Value>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(resolver: &'a dyn DataSourceResolver, window: ViewWindow) -> Self {
        Self {
            resolver,
            window,
            current_value: None,
            repeated_source: None,
            cache: HashMap::new(),
        }
    }

    pub fn series_query(&self) -> SeriesQuery {
        SeriesQuery {
            last_point_timestamp: self.window.last_point_timestamp,
            time_resolution: self.window.time_resolution,
            points_count: self.window.points_count,
        }
    }

    /// Evaluates a whole tree. The acyclicity check runs once up front so
    /// the recursive walk cannot loop on a corrupted definition.
    pub fn evaluate_root(&mut self, tree: &FunctionTree) -> Result<Value, EvalError> {
        ensure_acyclic(tree)?;
        match tree.root {
            Some(root) => self.evaluate(tree, Some(root)),
            None => Ok(Value::None),
        }
    }

    /// Evaluates one node. An empty argument slot (`None`) is "no data", so
    /// partially configured trees still produce a degraded result. A node
    /// attached under several parents is computed once per context.
    pub fn evaluate(&mut self, tree: &FunctionTree, node: Option<u64>) -> Result<Value, EvalError> {
        let Some(id) = node else {
            return Ok(Value::None);
        };
        if let Some(cached) = self.cache.get(&id) {
            return Ok(cached.clone());
        }

        let node = tree.node(id).ok_or(EvalError::MissingNode(id))?;
        let kind = FunctionKind::parse(&node.function_name)
            .ok_or_else(|| EvalError::UnknownFunction(node.function_name.clone()))?;
        let value = function::evaluate(self, tree, id, kind)?;
        self.cache.insert(id, value.clone());
        Ok(value)
    }
}
