//! Datashape discovery over values, Polars frames and expressions.

use polars::prelude::DataFrame;
use tabula_core::{promote, DataShape, Dim, ExprError, Measure, Primitive, Result, Value};

use crate::expression::{BinOp, Expr, Node};
use crate::schema_conv::frame_dshape;

/// Anything with a discoverable datashape.
pub trait Discover {
    fn discover(&self) -> Result<DataShape>;
}

impl Discover for Value {
    fn discover(&self) -> Result<DataShape> {
        tabula_core::discover(self)
    }
}

impl Discover for DataFrame {
    fn discover(&self) -> Result<DataShape> {
        frame_dshape(self)
    }
}

impl Discover for Expr {
    fn discover(&self) -> Result<DataShape> {
        self.dshape()
    }
}

/// Datashape of a value, frame or expression.
pub fn discover<T: Discover + ?Sized>(x: &T) -> Result<DataShape> {
    x.discover()
}

fn wrap_optional(m: Measure, optional: bool) -> Measure {
    if optional && !matches!(m, Measure::Option(_)) {
        Measure::Option(Box::new(m))
    } else {
        m
    }
}

/// Outer dims shared by two operands: a dimensionless side broadcasts.
fn broadcast(a: &[Dim], b: &[Dim]) -> Result<Vec<Dim>> {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => Ok(b.to_vec()),
        (_, true) => Ok(a.to_vec()),
        _ if a == b => Ok(a.to_vec()),
        _ => Err(ExprError::Type(format!(
            "shape mismatch: {a:?} vs {b:?}"
        ))),
    }
}

fn arith_measure(op: BinOp, l: &Measure, r: &Measure) -> Result<Measure> {
    let optional = matches!(l, Measure::Option(_)) || matches!(r, Measure::Option(_));
    let (ln, rn) = (l.non_optional(), r.non_optional());
    let m = if op == BinOp::Add && ln.is_string() && rn.is_string() {
        Measure::STRING
    } else if ln.is_numeric() && rn.is_numeric() {
        if op == BinOp::Div {
            Measure::FLOAT64
        } else {
            promote(ln, rn)?
        }
    } else {
        return Err(ExprError::Type(format!(
            "unsupported operand types for {}: {l} and {r}",
            op.symbol()
        )));
    };
    Ok(wrap_optional(m, optional))
}

/// Columns contributed by one argument of a merge.
pub(crate) fn merge_columns(arg: &Expr) -> Result<Vec<(String, Measure)>> {
    let ds = arg.dshape()?;
    match ds.measure().non_optional() {
        Measure::Record(fields) => Ok(fields.clone()),
        m => {
            let name = arg.name().ok_or_else(|| {
                ExprError::InvalidArgument(format!(
                    "cannot merge unnamed expression {arg}; label it first"
                ))
            })?;
            Ok(vec![(name.to_string(), m.clone())])
        }
    }
}

/// One step of type inference. Children are read through their cached datashape.
pub(crate) fn infer(expr: &Expr) -> Result<DataShape> {
    match expr.node() {
        Node::Literal { dshape, .. } | Node::Data { dshape, .. } => Ok(dshape.clone()),
        Node::Constant(v) => tabula_core::discover(v),
        Node::Field { child, name } => {
            let ds = child.dshape()?;
            let optional = matches!(ds.measure(), Measure::Option(_));
            let m = ds.measure().non_optional().field(name).ok_or_else(|| {
                ExprError::NotFound(format!("field {name:?} not in {}", ds.measure()))
            })?;
            Ok(ds.with_measure(wrap_optional(m.clone(), optional)))
        }
        Node::StrLen { child } => {
            let ds = child.dshape()?;
            if !ds.measure().is_string() {
                return Err(ExprError::Type(format!(
                    "len() of non-string measure {}",
                    ds.measure()
                )));
            }
            let optional = matches!(ds.measure(), Measure::Option(_));
            Ok(ds.with_measure(wrap_optional(
                Measure::Primitive(Primitive::Int64),
                optional,
            )))
        }
        Node::Arith { op, lhs, rhs } => {
            let (l, r) = (lhs.dshape()?, rhs.dshape()?);
            let dims = broadcast(l.dims(), r.dims())?;
            Ok(DataShape::new(
                dims,
                arith_measure(*op, l.measure(), r.measure())?,
            ))
        }
        Node::Label { child, .. } => child.dshape(),
        Node::Merge { args, shape } => {
            let mut fields = Vec::new();
            for arg in args {
                fields.extend(merge_columns(arg)?);
            }
            Ok(DataShape::new(shape.clone(), Measure::Record(fields)))
        }
    }
}
