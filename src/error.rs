//! Error mapping for the Polars backend.
//!
//! [`ExprError`] lives in `tabula-core`, which has no Polars dependency, so Polars
//! errors are converted with [`polars_to_expr_error`] at the call site.

use polars::error::PolarsError;

pub use tabula_core::ExprError;

/// Map a PolarsError to the core error type.
pub fn polars_to_expr_error(e: PolarsError) -> ExprError {
    let msg = e.to_string();
    match &e {
        PolarsError::ColumnNotFound(_) => ExprError::NotFound(msg),
        PolarsError::SchemaMismatch(_) | PolarsError::InvalidOperation(_) => ExprError::Type(msg),
        _ => ExprError::Compute(msg),
    }
}
