//! The symbolic expression tree.
//!
//! An [`Expr`] is a cheap-to-clone handle on an immutable node. Leaves wrap in-memory
//! data (literals and named data nodes); inner nodes describe derived columns.
//! Building an expression never evaluates anything.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Sub};
use std::sync::{Arc, OnceLock};

use polars::prelude::DataFrame;
use tabula_core::{DataShape, Dim, ExprError, Result, Value};

use crate::discover::infer;

/// Backing data of a data node.
#[derive(Debug, Clone)]
pub enum Source {
    Value(Value),
    Frame(DataFrame),
}

impl Source {
    /// Host type name shown in the data node representation.
    pub fn type_name(&self) -> &'static str {
        match self {
            Source::Value(v) => v.type_name(),
            Source::Frame(_) => "DataFrame",
        }
    }

    pub fn identical(&self, other: &Source) -> bool {
        match (self, other) {
            (Source::Value(a), Source::Value(b)) => a.identical(b),
            (Source::Frame(a), Source::Frame(b)) => a.equals_missing(b),
            _ => false,
        }
    }

    fn identity_hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Source::Value(v) => {
                0u8.hash(state);
                v.identity_hash(state);
            }
            Source::Frame(df) => {
                1u8.hash(state);
                df.height().hash(state);
                for c in df.get_columns() {
                    c.name().as_str().hash(state);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }
}

#[derive(Debug)]
pub enum Node {
    /// A raw in-memory value, optionally named.
    Literal {
        value: Value,
        dshape: DataShape,
        name: Option<String>,
    },
    /// A named leaf over a dataset with a known datashape.
    Data {
        source: Source,
        dshape: DataShape,
        name: String,
    },
    /// Scalar operand of an arithmetic expression (`t.b + 1`).
    Constant(Value),
    Field {
        child: Expr,
        name: String,
    },
    Arith {
        op: BinOp,
        lhs: Expr,
        rhs: Expr,
    },
    StrLen {
        child: Expr,
    },
    Label {
        child: Expr,
        label: String,
    },
    Merge {
        args: Vec<Expr>,
        shape: Vec<Dim>,
    },
}

/// Handle on an immutable node. Clones share the node and its inferred datashape.
#[derive(Debug, Clone)]
pub struct Expr {
    node: Arc<Node>,
    dshape: Arc<OnceLock<Result<DataShape>>>,
}

impl Expr {
    pub(crate) fn new(node: Node) -> Expr {
        Expr {
            node: Arc::new(node),
            dshape: Arc::new(OnceLock::new()),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Wrap a scalar so it can take part in arithmetic.
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::new(Node::Constant(value.into()))
    }

    /// True for literal and data nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(self.node(), Node::Literal { .. } | Node::Data { .. })
    }

    /// Name of the expression, if it has one.
    ///
    /// Fields and labels are named by their field or label; string length and
    /// arithmetic inherit the name of their (first non-constant) operand.
    pub fn name(&self) -> Option<&str> {
        match self.node() {
            Node::Literal { name, .. } => name.as_deref(),
            Node::Data { name, .. } => Some(name.as_str()),
            Node::Constant(_) | Node::Merge { .. } => None,
            Node::Field { name, .. } => Some(name.as_str()),
            Node::Label { label, .. } => Some(label.as_str()),
            Node::StrLen { child } => child.name(),
            Node::Arith { lhs, rhs, .. } => lhs.name().or_else(|| rhs.name()),
        }
    }

    /// Inferred datashape, computed once per node.
    pub fn dshape(&self) -> Result<DataShape> {
        self.dshape.get_or_init(|| infer(self)).clone()
    }

    /// Outer dimensions of the expression's datashape.
    pub fn shape(&self) -> Result<Vec<Dim>> {
        Ok(self.dshape()?.shape().to_vec())
    }

    /// Column names: record field names, or the expression's own name.
    pub fn fields(&self) -> Result<Vec<String>> {
        let ds = self.dshape()?;
        let names = ds.measure().non_optional().names();
        if !names.is_empty() {
            return Ok(names.into_iter().map(str::to_string).collect());
        }
        Ok(self.name().map(str::to_string).into_iter().collect())
    }

    /// Select a field of a record-valued expression (`t.amount`).
    pub fn field(&self, name: &str) -> Result<Expr> {
        let ds = self.dshape()?;
        if ds.measure().non_optional().field(name).is_none() {
            return Err(ExprError::NotFound(format!(
                "field {name:?} not in {}",
                ds.measure()
            )));
        }
        Ok(Expr::new(Node::Field {
            child: self.clone(),
            name: name.to_string(),
        }))
    }

    /// String operations on a string-valued expression.
    pub fn str(&self) -> StrNamespace<'_> {
        StrNamespace(self)
    }

    pub fn label(&self, label: impl Into<String>) -> Expr {
        Expr::new(Node::Label {
            child: self.clone(),
            label: label.into(),
        })
    }

    pub fn binary(&self, op: BinOp, rhs: &Expr) -> Expr {
        Expr::new(Node::Arith {
            op,
            lhs: self.clone(),
            rhs: rhs.clone(),
        })
    }

    /// Structural identity. Unlike value equality this holds for data containing NaN.
    pub fn isidentical(&self, other: &Expr) -> bool {
        if Arc::ptr_eq(&self.node, &other.node) {
            return true;
        }
        match (self.node(), other.node()) {
            (
                Node::Literal {
                    value: a,
                    dshape: da,
                    name: na,
                },
                Node::Literal {
                    value: b,
                    dshape: db,
                    name: nb,
                },
            ) => na == nb && da == db && a.identical(b),
            (
                Node::Data {
                    source: a,
                    dshape: da,
                    name: na,
                },
                Node::Data {
                    source: b,
                    dshape: db,
                    name: nb,
                },
            ) => na == nb && da == db && a.identical(b),
            (Node::Constant(a), Node::Constant(b)) => a.identical(b),
            (Node::Field { child: a, name: na }, Node::Field { child: b, name: nb }) => {
                na == nb && a.isidentical(b)
            }
            (
                Node::Arith {
                    op: oa,
                    lhs: la,
                    rhs: ra,
                },
                Node::Arith {
                    op: ob,
                    lhs: lb,
                    rhs: rb,
                },
            ) => oa == ob && la.isidentical(lb) && ra.isidentical(rb),
            (Node::StrLen { child: a }, Node::StrLen { child: b }) => a.isidentical(b),
            (
                Node::Label {
                    child: a,
                    label: la,
                },
                Node::Label {
                    child: b,
                    label: lb,
                },
            ) => la == lb && a.isidentical(b),
            (
                Node::Merge {
                    args: aa,
                    shape: sa,
                },
                Node::Merge {
                    args: ab,
                    shape: sb,
                },
            ) => {
                sa == sb
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| x.isidentical(y))
            }
            _ => false,
        }
    }

    /// Leaves of the tree, in first-seen order, without duplicates.
    pub fn leaves(&self) -> Vec<Expr> {
        let mut out: Vec<Expr> = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<Expr>) {
        match self.node() {
            Node::Literal { .. } | Node::Data { .. } => {
                if !out.iter().any(|e| e.isidentical(self)) {
                    out.push(self.clone());
                }
            }
            Node::Constant(_) => {}
            Node::Field { child, .. } | Node::StrLen { child } | Node::Label { child, .. } => {
                child.collect_leaves(out)
            }
            Node::Arith { lhs, rhs, .. } => {
                lhs.collect_leaves(out);
                rhs.collect_leaves(out);
            }
            Node::Merge { args, .. } => {
                for a in args {
                    a.collect_leaves(out);
                }
            }
        }
    }

    /// Map from each leaf to the data it wraps.
    pub fn resources(&self) -> std::collections::HashMap<Expr, Source> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| {
                let source = match leaf.node() {
                    Node::Literal { value, .. } => Source::Value(value.clone()),
                    Node::Data { source, .. } => source.clone(),
                    _ => return None,
                };
                Some((leaf, source))
            })
            .collect()
    }

    fn identity_hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self.node()).hash(state);
        match self.node() {
            Node::Literal { value, dshape, name } => {
                value.identity_hash(state);
                dshape.hash(state);
                name.hash(state);
            }
            Node::Data {
                source,
                dshape,
                name,
            } => {
                source.identity_hash(state);
                dshape.hash(state);
                name.hash(state);
            }
            Node::Constant(v) => v.identity_hash(state),
            Node::Field { child, name } => {
                child.identity_hash(state);
                name.hash(state);
            }
            Node::Arith { op, lhs, rhs } => {
                op.hash(state);
                lhs.identity_hash(state);
                rhs.identity_hash(state);
            }
            Node::StrLen { child } => child.identity_hash(state),
            Node::Label { child, label } => {
                child.identity_hash(state);
                label.hash(state);
            }
            Node::Merge { args, shape } => {
                shape.hash(state);
                for a in args {
                    a.identity_hash(state);
                }
            }
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.isidentical(other)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_hash(state)
    }
}

/// `expr.str()` accessor.
pub struct StrNamespace<'a>(&'a Expr);

impl StrNamespace<'_> {
    /// Length in characters of each string.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Result<Expr> {
        let ds = self.0.dshape()?;
        if !ds.measure().is_string() {
            return Err(ExprError::Type(format!(
                "str.len() requires a string expression, got {}",
                ds.measure()
            )));
        }
        Ok(Expr::new(Node::StrLen {
            child: self.0.clone(),
        }))
    }
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                self.binary($op, &rhs)
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                self.binary($op, rhs)
            }
        }

        impl $trait<i64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                self.binary($op, &Expr::constant(rhs))
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                self.binary($op, &Expr::constant(rhs))
            }
        }
    };
}

impl_binop!(Add, add, BinOp::Add);
impl_binop!(Sub, sub, BinOp::Sub);
impl_binop!(Mul, mul, BinOp::Mul);
impl_binop!(Div, div, BinOp::Div);

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr, parent: BinOp, right: bool) -> fmt::Result {
    let needs_parens = match operand.node() {
        Node::Arith { op, .. } => {
            op.precedence() < parent.precedence()
                || (right
                    && op.precedence() == parent.precedence()
                    && matches!(parent, BinOp::Sub | BinOp::Div))
        }
        _ => false,
    };
    if needs_parens {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

fn write_tuple(f: &mut fmt::Formatter<'_>, items: &[impl fmt::Display]) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    if items.len() == 1 {
        f.write_str(",")?;
    }
    f.write_str(")")
}

/// The string form. It only walks the tree and never evaluates data; see
/// [`Expr::repr`](crate::repr) for the evaluating form.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Literal {
                name: Some(name), ..
            } => f.write_str(name),
            Node::Literal { value, .. } => write!(f, "{value}"),
            Node::Data { name, .. } => f.write_str(name),
            Node::Constant(v) => write!(f, "{v}"),
            Node::Field { child, name } => {
                if is_identifier(name) {
                    write!(f, "{child}.{name}")
                } else {
                    write!(f, "{child}[{}]", Value::from(name.as_str()))
                }
            }
            Node::Arith { op, lhs, rhs } => {
                write_operand(f, lhs, *op, false)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, rhs, *op, true)
            }
            Node::StrLen { child } => write!(f, "len(_child={child})"),
            Node::Label { child, label } => {
                write!(f, "label({child}, {})", Value::from(label.as_str()))
            }
            Node::Merge { args, shape } => {
                f.write_str("Merge(args=")?;
                write_tuple(f, args)?;
                f.write_str(", _varargsexpr=VarArgsExpr(_inputs=")?;
                write_tuple(f, args)?;
                f.write_str("), _shape=")?;
                write_tuple(f, shape)?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{data, literal, DataOptions};
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
    fn display_fields_and_arith() {
        let d = zzz();
        let e = d.field("a").unwrap().str().len().unwrap() + d.field("b").unwrap();
        assert_eq!(e.to_string(), "len(_child=ZZZ.a) + ZZZ.b");
        assert_eq!(e.label("c").to_string(), "label(len(_child=ZZZ.a) + ZZZ.b, 'c')");
    }

    #[test]
    fn display_parenthesizes_by_precedence() {
        let d = zzz();
        let b = d.field("b").unwrap();
        let e = (b.clone() + 1) * 2;
        assert_eq!(e.to_string(), "(ZZZ.b + 1) * 2");
        let e = b.clone() - (b.clone() - 1);
        assert_eq!(e.to_string(), "ZZZ.b - (ZZZ.b - 1)");
        let e = b.clone() * 2 + 1.5;
        assert_eq!(e.to_string(), "ZZZ.b * 2 + 1.5");
    }

    #[test]
    fn missing_field_is_not_found() {
        let err = zzz().field("nope").unwrap_err();
        assert!(matches!(err, ExprError::NotFound(_)));
    }

    #[test]
    fn str_len_requires_string() {
        let err = zzz().field("b").unwrap().str().len().unwrap_err();
        assert!(matches!(err, ExprError::Type(_)));
    }

    #[test]
    fn names_propagate() {
        let d = zzz();
        let b = d.field("b").unwrap();
        assert_eq!(b.name(), Some("b"));
        assert_eq!((Expr::constant(1) + b.clone()).name(), Some("b"));
        assert_eq!(d.field("a").unwrap().str().len().unwrap().name(), Some("a"));
        assert_eq!(b.label("x").name(), Some("x"));
        assert_eq!(d.fields().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn identical_is_structural() {
        let d = zzz();
        assert!(d.field("a").unwrap().isidentical(&d.field("a").unwrap()));
        assert!(!d.field("a").unwrap().isidentical(&d.field("b").unwrap()));
        assert_eq!(d.field("b").unwrap() + 1, d.field("b").unwrap() + 1);
        assert_ne!(d.field("b").unwrap() + 1, d.field("b").unwrap() + 1.0);
    }

    #[test]
    fn unnamed_literal_displays_value() {
        let l = literal(tuple_of([("Alice", 100)])).unwrap();
        assert_eq!(l.to_string(), "(('Alice', 100),)");
        assert!(l.is_leaf());
        assert_eq!(l.leaves().len(), 1);
    }

    #[test]
    fn quoted_field_access() {
        let d = data(
            tuple_of([("x",)]),
            DataOptions::new().name("t").fields(["first name"]),
        )
        .unwrap();
        assert_eq!(d.field("first name").unwrap().to_string(), "t['first name']");
    }

    #[test]
    fn dshape_is_inferred_once_per_node() {
        let d = zzz();
        let mut e = d.field("b").unwrap();
        for _ in 0..500 {
            e = e + 1;
        }
        assert!(e.dshape.get().is_none());
        assert_eq!(e.dshape().unwrap().to_string(), "2 * int64");
        let copy = e.clone();
        assert!(copy.dshape.get().is_some());
        if let Node::Arith { lhs, .. } = e.node() {
            assert!(lhs.dshape.get().is_some());
        }
    }
}
