//! Error type shared by every tabula crate.
//!
//! [`ExprError`] carries only strings so embedders can map it to their own error
//! types without depending on Polars. The main crate converts Polars errors with
//! `polars_to_expr_error`.

use thiserror::Error;

/// Unified error type for expression construction, discovery and evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Bad or conflicting constructor arguments.
    #[error("{0}")]
    InvalidArgument(String),
    /// Operation not defined for the operand's datashape.
    #[error("type error: {0}")]
    Type(String),
    /// Field or resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed datashape text.
    #[error("datashape parse error: {0}")]
    Parse(String),
    /// Evaluation failed in the backend.
    #[error("compute error: {0}")]
    Compute(String),
}

impl From<serde_json::Error> for ExprError {
    fn from(e: serde_json::Error) -> Self {
        ExprError::Compute(e.to_string())
    }
}

pub type Result<T, E = ExprError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_prints_raw_message() {
        let e = ExprError::InvalidArgument("specify one of schema= or dshape= keyword".into());
        assert_eq!(e.to_string(), "specify one of schema= or dshape= keyword");
    }

    #[test]
    fn other_variants_are_prefixed() {
        assert_eq!(ExprError::NotFound("x".into()).to_string(), "not found: x");
        assert!(ExprError::Parse("eof".into()).to_string().starts_with("datashape"));
    }
}
