//! Datashape discovery over in-memory values.

use crate::datashape::{promote, DataShape, Dim, Measure, Primitive};
use crate::error::{ExprError, Result};
use crate::value::Value;

fn scalar_measure(v: &Value) -> Option<Measure> {
    let p = match v {
        Value::Null => Primitive::Null,
        Value::Bool(_) => Primitive::Bool,
        Value::Int(_) => Primitive::Int64,
        Value::Float(_) => Primitive::Float64,
        Value::Str(_) => Primitive::String,
        Value::Tuple(_) | Value::List(_) => return None,
    };
    Some(Measure::Primitive(p))
}

/// Measure of a single row: scalars map to primitives, sequences to tuples.
fn row_measure(row: &Value) -> Result<Measure> {
    match row.items() {
        None => Ok(scalar_measure(row).unwrap_or(Measure::NULL)),
        Some(items) => items
            .iter()
            .map(|item| match item.items() {
                None => Ok(scalar_measure(item).unwrap_or(Measure::NULL)),
                Some(_) => Err(ExprError::Type(format!(
                    "nested sequences inside a row are not supported: {item}"
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Measure::Tuple),
    }
}

/// Infer the datashape of a value.
///
/// A sequence of rows becomes `n * (t1, t2, ...)`, a sequence of scalars
/// `n * t`, and a scalar a dimensionless shape.
pub fn discover(value: &Value) -> Result<DataShape> {
    let Some(items) = value.items() else {
        return Ok(DataShape::scalar(row_measure(value)?));
    };
    let mut measure: Option<Measure> = None;
    for (i, item) in items.iter().enumerate() {
        let m = row_measure(item)?;
        measure = Some(match measure {
            None => m,
            Some(prev) => promote(&prev, &m).map_err(|e| match e {
                ExprError::Type(msg) => ExprError::Type(format!("row {i}: {msg}")),
                other => other,
            })?,
        });
    }
    Ok(DataShape::new(
        vec![Dim::Fixed(items.len())],
        measure.unwrap_or(Measure::NULL),
    ))
}

/// Discover, then name the columns of the row tuple.
pub fn discover_with_fields<S: AsRef<str>>(value: &Value, fields: &[S]) -> Result<DataShape> {
    let ds = discover(value)?;
    let measure = name_fields(ds.measure(), fields)?;
    Ok(ds.with_measure(measure))
}

/// Turn a tuple measure (or a record, renaming it) into a record with the given names.
pub fn name_fields<S: AsRef<str>>(measure: &Measure, fields: &[S]) -> Result<Measure> {
    let types: Vec<Measure> = match measure {
        Measure::Tuple(items) => items.clone(),
        Measure::Record(fs) => fs.iter().map(|(_, m)| m.clone()).collect(),
        other if fields.len() == 1 => vec![other.clone()],
        other => {
            return Err(ExprError::InvalidArgument(format!(
                "cannot assign {} field names to measure {other}",
                fields.len()
            )))
        }
    };
    if types.len() != fields.len() {
        return Err(ExprError::InvalidArgument(format!(
            "got {} field names for {} columns",
            fields.len(),
            types.len()
        )));
    }
    Ok(Measure::Record(
        fields
            .iter()
            .map(|f| f.as_ref().to_string())
            .zip(types)
            .collect(),
    ))
}
