use crate::context::{DataSourceResolver, EvaluationContext, ViewWindow};
use crate::point::Point;
use crate::value::Value;
use crate::EvalError;
use chart_model::{AxisDefinition, ChartDefinition, SeriesDefinition};

/// One fully evaluated series, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesState {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub y_axis_id: String,
    pub group_id: Option<String>,
    pub points: Vec<Point>,
}

/// Evaluates every series of a chart for one view window. Repeated series
/// templates are expanded first, one instance per matching data source, each
/// instance evaluated in its own context with the source name bound.
pub fn evaluate_chart(
    resolver: &dyn DataSourceResolver,
    chart: &ChartDefinition,
    window: &ViewWindow,
) -> Result<Vec<SeriesState>, EvalError> {
    let mut states = Vec::new();
    for series in &chart.series {
        match &series.repeat_per_source {
            Some(prefix) => {
                for source_name in resolver.list_sources(prefix) {
                    let mut ctx = EvaluationContext::new(resolver, window.clone());
                    ctx.repeated_source = Some(source_name.clone());
                    let mut state = evaluate_series(&mut ctx, series)?;
                    state.id = format!("{}-{source_name}", series.id);
                    state.name = format!("{} ({source_name})", series.name);
                    states.push(state);
                }
            }
            None => {
                let mut ctx = EvaluationContext::new(resolver, window.clone());
                states.push(evaluate_series(&mut ctx, series)?);
            }
        }
    }
    Ok(states)
}

fn evaluate_series(
    ctx: &mut EvaluationContext<'_>,
    series: &SeriesDefinition,
) -> Result<SeriesState, EvalError> {
    let points = match ctx.evaluate_root(&series.data)? {
        Value::Points(points) => points,
        // Anything else cannot be charted against a time axis.
        _ => Vec::new(),
    };
    Ok(SeriesState {
        id: series.id.clone(),
        name: series.name.clone(),
        color: series.color.clone(),
        y_axis_id: series.y_axis_id.clone(),
        group_id: series.group_id.clone(),
        points,
    })
}

/// Formats one axis tick label. When the axis carries a label provider tree
/// it is evaluated with the tick value bound as the current value; a result
/// that is not a usable text or number falls back to the plain rendering.
pub fn axis_label(
    resolver: &dyn DataSourceResolver,
    axis: &AxisDefinition,
    window: &ViewWindow,
    value: f64,
) -> Result<String, EvalError> {
    if let Some(label_provider) = &axis.label_provider {
        let mut ctx = EvaluationContext::new(resolver, window.clone());
        ctx.current_value = Some(value);
        match ctx.evaluate_root(label_provider)? {
            Value::Text(text) => return Ok(text),
            Value::Number(number) => return Ok(plain_label(number, &axis.unit_name)),
            _ => {}
        }
    }
    Ok(plain_label(value, &axis.unit_name))
}

fn plain_label(value: f64, unit_name: &str) -> String {
    if unit_name.is_empty() {
        format!("{value}")
    } else {
        format!("{value} {unit_name}")
    }
}
