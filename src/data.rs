//! Leaf constructors: [`literal`], [`data`] and [`data_frame`].

use std::sync::atomic::{AtomicUsize, Ordering};

use polars::prelude::DataFrame;
use tabula_core::{
    config, discover_with_fields, dshape as parse_dshape, name_fields, DataShape, Dim, ExprError,
    Result, Value,
};

use crate::expression::{Expr, Node, Source};
use crate::schema_conv::frame_dshape;

static NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh name for an anonymous data node: `_0`, `_1`, ...
pub fn fresh_name() -> String {
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", config().name_prefix, n)
}

/// A datashape given either as text or already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeSpec {
    Text(String),
    Shape(DataShape),
}

impl ShapeSpec {
    fn resolve(&self) -> Result<DataShape> {
        match self {
            ShapeSpec::Text(s) => parse_dshape(s),
            ShapeSpec::Shape(ds) => Ok(ds.clone()),
        }
    }
}

impl From<&str> for ShapeSpec {
    fn from(s: &str) -> Self {
        ShapeSpec::Text(s.to_string())
    }
}

impl From<String> for ShapeSpec {
    fn from(s: String) -> Self {
        ShapeSpec::Text(s)
    }
}

impl From<DataShape> for ShapeSpec {
    fn from(ds: DataShape) -> Self {
        ShapeSpec::Shape(ds)
    }
}

/// Keyword arguments of [`data`].
#[derive(Debug, Clone, Default)]
pub struct DataOptions {
    pub name: Option<String>,
    pub fields: Option<Vec<String>>,
    /// Row measure; the outer dimensions are discovered from the data.
    pub schema: Option<ShapeSpec>,
    /// Full datashape, used as given.
    pub dshape: Option<ShapeSpec>,
}

impl DataOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn schema(mut self, schema: impl Into<ShapeSpec>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn dshape(mut self, dshape: impl Into<ShapeSpec>) -> Self {
        self.dshape = Some(dshape.into());
        self
    }
}

/// Wrap an in-memory value; its datashape is discovered.
pub fn literal(value: impl Into<Value>) -> Result<Expr> {
    build_literal(value.into(), None)
}

/// Wrap an in-memory value under a name.
pub fn literal_named(value: impl Into<Value>, name: impl Into<String>) -> Result<Expr> {
    build_literal(value.into(), Some(name.into()))
}

fn build_literal(value: Value, name: Option<String>) -> Result<Expr> {
    let dshape = tabula_core::discover(&value)?;
    Ok(Expr::new(Node::Literal { value, dshape, name }))
}

/// Number of rows in the outermost dimension of the data, if it is a sequence.
fn outer_len(value: &Value) -> Option<usize> {
    value.items().map(<[Value]>::len)
}

fn resolve_dshape(
    discovered: impl FnOnce(Option<&[String]>) -> Result<DataShape>,
    rows: Option<usize>,
    opts: &DataOptions,
) -> Result<DataShape> {
    let fields = opts.fields.as_deref();
    let ds = match (&opts.schema, &opts.dshape) {
        (Some(_), Some(_)) => {
            return Err(ExprError::InvalidArgument(
                "specify one of schema= or dshape= keyword".to_string(),
            ))
        }
        (None, Some(spec)) => spec.resolve()?,
        (Some(spec), None) => {
            let schema = spec.resolve()?;
            if !schema.dims().is_empty() {
                return Err(ExprError::InvalidArgument(format!(
                    "schema= takes a measure without dimensions, got {schema}"
                )));
            }
            let dims = match rows {
                Some(n) => vec![Dim::Fixed(n)],
                None => Vec::new(),
            };
            DataShape::new(dims, schema.measure().clone())
        }
        (None, None) => return discovered(fields),
    };
    if let (Some(Dim::Fixed(n)), Some(actual)) = (ds.dims().first(), rows) {
        if *n != actual {
            return Err(ExprError::InvalidArgument(format!(
                "dshape {ds} declares {n} rows but the data has {actual}"
            )));
        }
    }
    match fields {
        Some(fields) => Ok(ds.with_measure(name_fields(ds.measure(), fields)?)),
        None => Ok(ds),
    }
}

/// Create a named data node over an in-memory value.
///
/// Exactly one of `schema` and `dshape` may be given. Without either, the datashape
/// is discovered and `fields` names the columns of each row.
pub fn data(value: impl Into<Value>, opts: DataOptions) -> Result<Expr> {
    let value = value.into();
    let dshape = resolve_dshape(
        |fields| match fields {
            Some(fields) => discover_with_fields(&value, fields),
            None => tabula_core::discover(&value),
        },
        outer_len(&value),
        &opts,
    )?;
    Ok(build_data(Source::Value(value), dshape, opts.name))
}

/// Create a named data node over a Polars DataFrame.
pub fn data_frame(df: DataFrame, opts: DataOptions) -> Result<Expr> {
    let dshape = resolve_dshape(
        |fields| {
            let ds = frame_dshape(&df)?;
            match fields {
                Some(fields) => Ok(ds.with_measure(name_fields(ds.measure(), fields)?)),
                None => Ok(ds),
            }
        },
        Some(df.height()),
        &opts,
    )?;
    Ok(build_data(Source::Frame(df), dshape, opts.name))
}

fn build_data(source: Source, dshape: DataShape, name: Option<String>) -> Expr {
    let name = name.unwrap_or_else(fresh_name);
    tracing::debug!(name = %name, dshape = %dshape, source = source.type_name(), "created data node");
    Expr::new(Node::Data {
        source,
        dshape,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::tuple_of;

    fn tdata() -> Value {
        tuple_of([("Alice", 100), ("Bob", 200)])
    }

    #[test]
    fn conflicting_schema_and_dshape() {
        let err = data(
            tdata(),
            DataOptions::new()
                .schema("{name: string, amount: float32}")
                .dshape(parse_dshape("{name: string, amount: float32}").unwrap()),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("specify one of schema= or dshape= keyword"));
    }

    #[test]
    fn schema_keeps_discovered_dims() {
        let t = data(
            tdata(),
            DataOptions::new().schema("{name: string, amount: float32}"),
        )
        .unwrap();
        assert_eq!(
            t.dshape().unwrap().to_string(),
            "2 * {name: string, amount: float32}"
        );
    }

    #[test]
    fn dshape_row_count_must_match() {
        let err = data(tdata(), DataOptions::new().dshape("3 * (string, int64)")).unwrap_err();
        assert!(matches!(err, ExprError::InvalidArgument(_)));
    }

    #[test]
    fn fields_rename_declared_dshape() {
        let t = data(
            tdata(),
            DataOptions::new()
                .dshape("2 * (string, int32)")
                .fields(["who", "n"]),
        )
        .unwrap();
        assert_eq!(t.dshape().unwrap().to_string(), "2 * {who: string, n: int32}");
    }

    #[test]
    fn anonymous_names_are_fresh() {
        let a = data(tdata(), DataOptions::new()).unwrap();
        let b = data(tdata(), DataOptions::new()).unwrap();
        assert_ne!(a.name(), b.name());
        assert!(a.name().unwrap().starts_with('_'));
    }

    #[test]
    fn literal_names() {
        assert_eq!(literal(tdata()).unwrap().name(), None);
        assert_eq!(
            literal_named(tdata(), "amounts").unwrap().name(),
            Some("amounts")
        );
    }
}
