pub mod chart;
pub mod context;
pub mod format;
pub mod function;
pub mod point;
pub mod validation;
pub mod value;

pub use chart::{axis_label, evaluate_chart, SeriesState};
pub use context::{DataSourceResolver, EvaluationContext, RawPoint, SeriesQuery, ViewWindow};
pub use function::FunctionKind;
pub use point::{merge_point_arrays, Point};
pub use validation::{
    validate_chart, validate_tree, ChartValidation, TreeValidation, ValidationError,
    ValidationErrorKind,
};
pub use value::Value;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EvalError {
    /// The persisted definition names a function this engine does not know.
    /// Treating it as "no data" would hide dashboard corruption, so it is
    /// the one runtime condition that surfaces as an error.
    #[error("unknown chart function: {0}")]
    UnknownFunction(String),
    #[error("function tree references missing node {0}")]
    MissingNode(u64),
    #[error("function tree contains a cycle")]
    CyclicFunctionTree,
    #[error("point arrays have mismatched lengths ({0} vs {1})")]
    LengthMismatch(usize, usize),
}

impl From<chart_model::TreeRuleError> for EvalError {
    fn from(error: chart_model::TreeRuleError) -> Self {
        match error {
            chart_model::TreeRuleError::MissingNode(id) => EvalError::MissingNode(id),
            _ => EvalError::CyclicFunctionTree,
        }
    }
}
