//! Evaluate expressions against their in-memory data with Polars.
//!
//! The single leaf of an expression is materialized as a Polars DataFrame and the
//! rest of the tree is lowered to Polars lazy expressions over it.

use std::collections::HashMap;
use std::fmt;

use polars::prelude::{
    col, lit, AnyValue, DataFrame, DataType as PlDataType, Expr as PlExpr, IntoLazy, Series,
    NULL,
};
use serde_json::Value as JsonValue;
use tabula_core::{ExprError, Result, Value};

use crate::error::polars_to_expr_error;
use crate::expression::{BinOp, Expr, Node, Source};
use crate::schema_conv::value_to_frame;

/// Result of evaluating an expression: a table for leaves and merges, a column for
/// everything else.
#[derive(Debug, Clone)]
pub enum Computed {
    Frame(DataFrame),
    Column(Series),
}

impl Computed {
    pub fn frame(&self) -> Option<&DataFrame> {
        match self {
            Computed::Frame(df) => Some(df),
            Computed::Column(_) => None,
        }
    }

    pub fn column(&self) -> Option<&Series> {
        match self {
            Computed::Column(s) => Some(s),
            Computed::Frame(_) => None,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Computed::Frame(df) => df.height(),
            Computed::Column(s) => s.len(),
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Computed {
        match self {
            Computed::Frame(df) => Computed::Frame(df.head(Some(n))),
            Computed::Column(s) => Computed::Column(s.head(Some(n))),
        }
    }

    /// The result as a table; a column becomes a one-column frame.
    pub fn into_frame(self) -> DataFrame {
        match self {
            Computed::Frame(df) => df,
            Computed::Column(s) => s.into_frame(),
        }
    }
}

impl fmt::Display for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Frame(df) => fmt::Display::fmt(df, f),
            Computed::Column(s) => fmt::Display::fmt(s, f),
        }
    }
}

/// Materialize a leaf as a Polars DataFrame.
pub fn leaf_frame(leaf: &Expr) -> Result<DataFrame> {
    match leaf.node() {
        Node::Data {
            source: Source::Frame(df),
            ..
        } => Ok(df.clone()),
        Node::Data {
            source: Source::Value(value),
            dshape,
            name,
        } => value_to_frame(value, dshape, name),
        Node::Literal {
            value,
            dshape,
            name,
        } => value_to_frame(value, dshape, name.as_deref().unwrap_or("_")),
        _ => Err(ExprError::Compute(format!("{leaf} is not a leaf"))),
    }
}

struct Lowering<'a> {
    leaf: &'a Expr,
    columns: Vec<String>,
}

impl Lowering<'_> {
    fn constant(v: &Value) -> Result<PlExpr> {
        let e = match v {
            Value::Null => lit(NULL),
            Value::Bool(b) => lit(*b),
            Value::Int(i) => lit(*i),
            Value::Float(x) => lit(*x),
            Value::Str(s) => lit(s.clone()),
            Value::Tuple(_) | Value::List(_) => {
                return Err(ExprError::Compute(format!(
                    "sequence constant {} cannot be used as a scalar",
                    v.repr()
                )))
            }
        };
        Ok(e)
    }

    fn leaf_column(&self) -> Result<PlExpr> {
        match self.columns.as_slice() {
            [only] => Ok(col(only.as_str())),
            _ => Err(ExprError::Compute(format!(
                "table {} used where a column is expected",
                self.leaf
            ))),
        }
    }

    fn field(&self, child: &Expr, name: &str) -> Result<PlExpr> {
        if child.isidentical(self.leaf) {
            return Ok(col(name));
        }
        if let Node::Merge { args, .. } = child.node() {
            for arg in args {
                if arg.isidentical(self.leaf) {
                    if self.columns.iter().any(|c| c == name) {
                        return Ok(col(name));
                    }
                } else if arg.name() == Some(name) {
                    return self.lower(arg);
                }
            }
        }
        Err(ExprError::Compute(format!(
            "cannot evaluate field {name:?} of {child}"
        )))
    }

    fn lower(&self, expr: &Expr) -> Result<PlExpr> {
        if expr.isidentical(self.leaf) {
            return self.leaf_column();
        }
        match expr.node() {
            Node::Constant(v) => Self::constant(v),
            Node::Field { child, name } => self.field(child, name),
            Node::Arith { op, lhs, rhs } => {
                let (l, r) = (self.lower(lhs)?, self.lower(rhs)?);
                Ok(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l.cast(PlDataType::Float64) / r.cast(PlDataType::Float64),
                })
            }
            Node::StrLen { child } => Ok(self
                .lower(child)?
                .str()
                .len_chars()
                .cast(PlDataType::Int64)),
            Node::Label { child, label } => Ok(self.lower(child)?.alias(label.as_str())),
            Node::Merge { .. } | Node::Literal { .. } | Node::Data { .. } => Err(
                ExprError::Compute(format!("cannot evaluate {expr} as a column")),
            ),
        }
    }
}

/// Evaluate an expression. Leaves and merges evaluate to a frame, every other
/// expression to a single column.
pub fn compute(expr: &Expr) -> Result<Computed> {
    let leaves = expr.leaves();
    let leaf = match leaves.as_slice() {
        [leaf] => leaf,
        [] => {
            return Err(ExprError::Compute(format!(
                "{expr} has no data to compute over"
            )))
        }
        _ => {
            return Err(ExprError::Compute(format!(
                "{expr} spans {} data sources; only one is supported",
                leaves.len()
            )))
        }
    };
    let frame = leaf_frame(leaf)?;
    if expr.isidentical(leaf) {
        return Ok(Computed::Frame(frame));
    }
    let lowering = Lowering {
        leaf,
        columns: frame
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    };
    tracing::debug!(expr = %expr, rows = frame.height(), "computing expression");
    match expr.node() {
        Node::Merge { args, .. } => {
            let mut exprs = Vec::new();
            for arg in args {
                if arg.isidentical(leaf) {
                    exprs.extend(lowering.columns.iter().map(|c| col(c.as_str())));
                } else {
                    exprs.push(lowering.lower(arg)?);
                }
            }
            let out = frame
                .lazy()
                .select(exprs)
                .collect()
                .map_err(polars_to_expr_error)?;
            Ok(Computed::Frame(out))
        }
        _ => {
            let column = lowering.lower(expr)?;
            let out = frame
                .lazy()
                .select([column])
                .collect()
                .map_err(polars_to_expr_error)?;
            match out.get_columns() {
                [only] => Ok(Computed::Column(only.as_materialized_series().clone())),
                cols => Err(ExprError::Compute(format!(
                    "{expr} produced {} columns, expected one",
                    cols.len()
                ))),
            }
        }
    }
}

/// Evaluate and collect the result as JSON rows keyed by column name.
pub fn collect_json_rows(expr: &Expr) -> Result<Vec<HashMap<String, JsonValue>>> {
    let df = compute(expr)?.into_frame();
    let names = df.get_column_names();
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = HashMap::with_capacity(names.len());
        for (name, c) in names.iter().zip(df.get_columns()) {
            let av = c.get(i).map_err(polars_to_expr_error)?;
            row.insert(name.to_string(), any_value_to_json(av));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn any_value_to_json(av: AnyValue<'_>) -> JsonValue {
    match av {
        AnyValue::Null => JsonValue::Null,
        AnyValue::Boolean(b) => JsonValue::Bool(b),
        AnyValue::Int8(i) => JsonValue::from(i),
        AnyValue::Int16(i) => JsonValue::from(i),
        AnyValue::Int32(i) => JsonValue::from(i),
        AnyValue::Int64(i) => JsonValue::from(i),
        AnyValue::UInt8(u) => JsonValue::from(u),
        AnyValue::UInt16(u) => JsonValue::from(u),
        AnyValue::UInt32(u) => JsonValue::from(u),
        AnyValue::UInt64(u) => JsonValue::from(u),
        // NaN and infinities have no JSON number form.
        AnyValue::Float32(f) => serde_json::Number::from_f64(f64::from(f))
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AnyValue::Float64(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AnyValue::String(s) => JsonValue::String(s.to_string()),
        AnyValue::StringOwned(s) => JsonValue::String(s.to_string()),
        other => JsonValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{data, data_frame, literal, DataOptions};
    use crate::transform::transform;
    use polars::prelude::{NamedFrom, Series};
    use tabula_core::tuple_of;

    fn zzz() -> Expr {
        data(
            tuple_of([("aa", 1), ("b", 2)]),
            DataOptions::new()
                .name("ZZZ")
                .dshape("2 * {a: string, b: int64}"),
        )
        .unwrap()
    }

    #[test]
    fn compute_transform() {
        let d = zzz();
        let c = d.field("a").unwrap().str().len().unwrap() + d.field("b").unwrap();
        let out = compute(&transform(&d, [("c", c)]).unwrap()).unwrap().into_frame();
        assert_eq!(out.get_column_names().len(), 3);
        let c = out.column("c").unwrap().as_materialized_series().i64().unwrap();
        assert_eq!(c.get(0), Some(3));
        assert_eq!(c.get(1), Some(3));
    }

    #[test]
    fn compute_column_arith() {
        let d = zzz();
        let out = compute(&(d.field("b").unwrap() * 10 - 1)).unwrap();
        assert!(out.frame().is_none());
        let col = out.column().unwrap().i64().unwrap();
        assert_eq!(col.get(0), Some(9));
        assert_eq!(col.get(1), Some(19));
    }

    #[test]
    fn compute_true_division() {
        let d = zzz();
        let out = compute(&(d.field("b").unwrap() / 2).label("half")).unwrap();
        let half = out.column().unwrap();
        assert_eq!(half.name().as_str(), "half");
        let half = half.f64().unwrap();
        assert_eq!(half.get(0), Some(0.5));
    }

    #[test]
    fn json_rows() {
        let d = zzz();
        let rows = collect_json_rows(&transform(&d, [("c", d.field("b").unwrap() + 1)]).unwrap())
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["a"], serde_json::json!("aa"));
        assert_eq!(rows[1]["c"], serde_json::json!(3));
    }

    #[test]
    fn compute_leaf_is_frame() {
        let out = compute(&zzz()).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out.frame().unwrap().width(), 2);
    }

    #[test]
    fn compute_over_polars_frame() {
        let df = DataFrame::new(vec![
            Series::new("x".into(), &[1.0f64, 2.0]).into(),
        ])
        .unwrap();
        let t = data_frame(df, DataOptions::new().name("pf")).unwrap();
        let out = compute(&(t.field("x").unwrap() + 1)).unwrap();
        let x = out.column().unwrap().f64().unwrap();
        assert_eq!(x.get(1), Some(3.0));
    }

    #[test]
    fn two_sources_rejected() {
        let a = zzz();
        let b = data(
            tuple_of([("x", 1), ("y", 2)]),
            DataOptions::new().name("other").fields(["a", "b"]),
        )
        .unwrap();
        let err = compute(&(a.field("b").unwrap() + b.field("b").unwrap())).unwrap_err();
        assert!(matches!(err, ExprError::Compute(m) if m.contains("2 data sources")));
    }

    #[test]
    fn unnamed_literal_computes() {
        let l = literal(Value::from(vec![1, 2, 3])).unwrap();
        let out = compute(&(l * 2)).unwrap();
        assert_eq!(out.column().unwrap().i64().unwrap().get(2), Some(6));
    }

    #[test]
    fn column_result_renders_as_series() {
        let d = zzz();
        let out = compute(&d.field("b").unwrap()).unwrap();
        let series = out.column().unwrap();
        assert_eq!(series.name().as_str(), "b");
        assert_eq!(series.len(), 2);
        assert!(out.head(1).to_string().contains("Series"));
        assert_eq!(out.into_frame().width(), 1);
    }

    #[test]
    fn out_of_range_declared_column_fails() {
        let t = data(
            Value::from(vec![300, -1]),
            DataOptions::new().name("t").dshape("2 * uint8"),
        )
        .unwrap();
        assert!(matches!(compute(&(t + 0)), Err(ExprError::Type(_))));
    }
}
