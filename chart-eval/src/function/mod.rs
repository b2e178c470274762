pub mod source;
pub mod transform;

use crate::context::EvaluationContext;
use crate::value::Value;
use crate::EvalError;
use chart_model::FunctionTree;
use serde::Serialize;

/// Static type category of a function result, used by validation to match
/// argument slots without evaluating any data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Number,
    Text,
    Points,
}

/// Declared shape of one argument slot.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentSpec {
    pub name: &'static str,
    pub compatible_types: &'static [DataType],
    pub repeated: bool,
}

const NUMERIC_INPUT: &[DataType] = &[DataType::Number, DataType::Points];

/// The closed set of chart functions. Function names in persisted
/// definitions are plain strings; anything that does not parse into this
/// enum is rejected as `EvalError::UnknownFunction` instead of being
/// silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Literal,
    CurrentValue,
    LoadSeries,
    LoadRepeatedSeries,
    Multiply,
    Abs,
    Rate,
    TimeDerivative,
    AsBytes,
    ReplaceEmpty,
}

impl FunctionKind {
    pub const ALL: &'static [FunctionKind] = &[
        FunctionKind::Literal,
        FunctionKind::CurrentValue,
        FunctionKind::LoadSeries,
        FunctionKind::LoadRepeatedSeries,
        FunctionKind::Multiply,
        FunctionKind::Abs,
        FunctionKind::Rate,
        FunctionKind::TimeDerivative,
        FunctionKind::AsBytes,
        FunctionKind::ReplaceEmpty,
    ];

    pub fn parse(name: &str) -> Option<FunctionKind> {
        FunctionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::Literal => "literal",
            FunctionKind::CurrentValue => "currentValue",
            FunctionKind::LoadSeries => "loadSeries",
            FunctionKind::LoadRepeatedSeries => "loadRepeatedSeries",
            FunctionKind::Multiply => "multiply",
            FunctionKind::Abs => "abs",
            FunctionKind::Rate => "rate",
            FunctionKind::TimeDerivative => "timeDerivative",
            FunctionKind::AsBytes => "asBytes",
            FunctionKind::ReplaceEmpty => "replaceEmpty",
        }
    }

    /// Argument slots accepting attached subtrees. Constant configuration
    /// lives in node parameters and is not listed here.
    pub fn argument_specs(&self) -> &'static [ArgumentSpec] {
        match self {
            FunctionKind::Literal
            | FunctionKind::CurrentValue
            | FunctionKind::LoadSeries
            | FunctionKind::LoadRepeatedSeries => &[],
            FunctionKind::Multiply => &[ArgumentSpec {
                name: "operands",
                compatible_types: NUMERIC_INPUT,
                repeated: true,
            }],
            FunctionKind::Abs
            | FunctionKind::Rate
            | FunctionKind::TimeDerivative
            | FunctionKind::AsBytes => &[ArgumentSpec {
                name: "input",
                compatible_types: NUMERIC_INPUT,
                repeated: false,
            }],
            FunctionKind::ReplaceEmpty => &[
                ArgumentSpec {
                    name: "input",
                    compatible_types: NUMERIC_INPUT,
                    repeated: false,
                },
                ArgumentSpec {
                    name: "fallback",
                    compatible_types: NUMERIC_INPUT,
                    repeated: false,
                },
            ],
        }
    }

    /// Slot arity for attachment validation: single slots hold one child.
    pub fn slot_capacity(&self, argument: &str) -> usize {
        match self
            .argument_specs()
            .iter()
            .find(|spec| spec.name == argument)
        {
            Some(spec) if spec.repeated => usize::MAX,
            _ => 1,
        }
    }
}

pub(crate) fn evaluate(
    ctx: &mut EvaluationContext<'_>,
    tree: &FunctionTree,
    id: u64,
    kind: FunctionKind,
) -> Result<Value, EvalError> {
    match kind {
        FunctionKind::Literal => Ok(source::literal(tree, id)),
        FunctionKind::CurrentValue => Ok(source::current_value(ctx)),
        FunctionKind::LoadSeries => Ok(source::load_series(ctx, tree, id)),
        FunctionKind::LoadRepeatedSeries => Ok(source::load_repeated_series(ctx, tree, id)),
        FunctionKind::Multiply => transform::multiply(ctx, tree, id),
        FunctionKind::Abs => transform::abs(ctx, tree, id),
        FunctionKind::Rate => transform::rate(ctx, tree, id),
        FunctionKind::TimeDerivative => transform::time_derivative(ctx, tree, id),
        FunctionKind::AsBytes => transform::as_bytes(ctx, tree, id),
        FunctionKind::ReplaceEmpty => transform::replace_empty(ctx, tree, id),
    }
}
