//! Merge and transform: derive new columns alongside an existing table.

use std::collections::HashSet;

use tabula_core::{ExprError, Result};

use crate::discover::merge_columns;
use crate::expression::{Expr, Node};

/// Concatenate the columns of several expressions over the same rows.
///
/// Record-valued arguments contribute all their fields; other arguments must be
/// named (usually via [`Expr::label`]). Column names must be unique.
pub fn merge(args: Vec<Expr>) -> Result<Expr> {
    let first = args
        .first()
        .ok_or_else(|| ExprError::InvalidArgument("merge needs at least one expression".into()))?;
    let shape = first.shape()?;
    let mut seen = HashSet::new();
    for arg in &args {
        let arg_shape = arg.shape()?;
        if !arg_shape.is_empty() && arg_shape != shape {
            return Err(ExprError::Type(format!(
                "cannot merge {arg} with shape {arg_shape:?} into shape {shape:?}"
            )));
        }
        for (name, _) in merge_columns(arg)? {
            if !seen.insert(name.clone()) {
                return Err(ExprError::InvalidArgument(format!(
                    "repeated column name {name:?} in merge"
                )));
            }
        }
    }
    tracing::debug!(args = args.len(), "built merge");
    Ok(Expr::new(Node::Merge { args, shape }))
}

/// Add derived columns to `table`: `transform(t, [("c", t.a + t.b)])` is
/// `merge(t, label(t.a + t.b, 'c'))`.
pub fn transform<S: Into<String>>(
    table: &Expr,
    columns: impl IntoIterator<Item = (S, Expr)>,
) -> Result<Expr> {
    let mut args = vec![table.clone()];
    args.extend(columns.into_iter().map(|(name, e)| e.label(name)));
    merge(args)
}
