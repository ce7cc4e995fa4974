//! Polars conversions: datashape measures to and from Polars dtypes, and in-memory
//! values to Polars DataFrames. Kept in the main crate (has Polars dependency).

use polars::prelude::{
    Column, DataFrame, DataType as PlDataType, NamedFrom, Series, TimeUnit,
};
use tabula_core::{DataShape, Dim, ExprError, Measure, Primitive, Result, Value};

use crate::error::polars_to_expr_error;

pub(crate) fn primitive_to_polars(p: Primitive) -> PlDataType {
    match p {
        Primitive::Bool => PlDataType::Boolean,
        Primitive::Int8 => PlDataType::Int8,
        Primitive::Int16 => PlDataType::Int16,
        Primitive::Int32 => PlDataType::Int32,
        Primitive::Int64 => PlDataType::Int64,
        Primitive::UInt8 => PlDataType::UInt8,
        Primitive::UInt16 => PlDataType::UInt16,
        Primitive::UInt32 => PlDataType::UInt32,
        Primitive::UInt64 => PlDataType::UInt64,
        Primitive::Float32 => PlDataType::Float32,
        Primitive::Float64 => PlDataType::Float64,
        Primitive::String => PlDataType::String,
        Primitive::Date => PlDataType::Date,
        Primitive::DateTime => PlDataType::Datetime(TimeUnit::Microseconds, None),
        Primitive::Null => PlDataType::Null,
    }
}

pub(crate) fn polars_to_primitive(dtype: &PlDataType) -> Result<Primitive> {
    let p = match dtype {
        PlDataType::Boolean => Primitive::Bool,
        PlDataType::Int8 => Primitive::Int8,
        PlDataType::Int16 => Primitive::Int16,
        PlDataType::Int32 => Primitive::Int32,
        PlDataType::Int64 => Primitive::Int64,
        PlDataType::UInt8 => Primitive::UInt8,
        PlDataType::UInt16 => Primitive::UInt16,
        PlDataType::UInt32 => Primitive::UInt32,
        PlDataType::UInt64 => Primitive::UInt64,
        PlDataType::Float32 => Primitive::Float32,
        PlDataType::Float64 => Primitive::Float64,
        PlDataType::String => Primitive::String,
        PlDataType::Date => Primitive::Date,
        PlDataType::Datetime(_, _) => Primitive::DateTime,
        PlDataType::Null => Primitive::Null,
        other => {
            return Err(ExprError::Type(format!(
                "unsupported Polars dtype {other:?}"
            )))
        }
    };
    Ok(p)
}

/// Datashape of a Polars DataFrame: `height * {col: type, ...}`. Columns holding
/// nulls discover as optional.
pub fn frame_dshape(df: &DataFrame) -> Result<DataShape> {
    let fields = df
        .get_columns()
        .iter()
        .map(|c| {
            let m = Measure::Primitive(polars_to_primitive(c.dtype())?);
            let m = if c.null_count() > 0 {
                Measure::Option(Box::new(m))
            } else {
                m
            };
            Ok((c.name().to_string(), m))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataShape::new(
        vec![Dim::Fixed(df.height())],
        Measure::Record(fields),
    ))
}

/// Inclusive bounds of an integer primitive.
fn integer_bounds(p: Primitive) -> (i128, i128) {
    match p {
        Primitive::Int8 => (i8::MIN.into(), i8::MAX.into()),
        Primitive::Int16 => (i16::MIN.into(), i16::MAX.into()),
        Primitive::Int32 => (i32::MIN.into(), i32::MAX.into()),
        Primitive::UInt8 => (0, u8::MAX.into()),
        Primitive::UInt16 => (0, u16::MAX.into()),
        Primitive::UInt32 => (0, u32::MAX.into()),
        Primitive::UInt64 => (0, u64::MAX.into()),
        _ => (i64::MIN.into(), i64::MAX.into()),
    }
}

fn series_from_cells(name: &str, cells: &[&Value], measure: &Measure) -> Result<Series> {
    let prim = measure.as_primitive().ok_or_else(|| {
        ExprError::Type(format!(
            "column {name:?} has non-scalar measure {measure}"
        ))
    })?;
    let mismatch = |v: &Value| {
        ExprError::Type(format!(
            "column {name:?} of type {prim} cannot hold {}",
            v.repr()
        ))
    };
    let series = if prim.is_integer() {
        let (lo, hi) = integer_bounds(prim);
        let vals = cells
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                Value::Int(i) if (lo..=hi).contains(&i128::from(*i)) => Ok(Some(*i)),
                Value::Int(i) => Err(ExprError::Type(format!(
                    "column {name:?} row {row}: {i} is out of range for {prim}"
                ))),
                Value::Null => Ok(None),
                other => Err(mismatch(other)),
            })
            .collect::<Result<Vec<Option<i64>>>>()?;
        Series::new(name.into(), vals)
    } else if prim.is_float() {
        let vals = cells
            .iter()
            .map(|v| match v {
                Value::Float(x) => Ok(Some(*x)),
                Value::Int(i) => Ok(Some(*i as f64)),
                Value::Null => Ok(None),
                other => Err(mismatch(other)),
            })
            .collect::<Result<Vec<Option<f64>>>>()?;
        Series::new(name.into(), vals)
    } else {
        match prim {
            Primitive::String => {
                let vals = cells
                    .iter()
                    .map(|v| match v {
                        Value::Str(s) => Ok(Some(s.clone())),
                        Value::Null => Ok(None),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<Option<String>>>>()?;
                Series::new(name.into(), vals)
            }
            Primitive::Bool => {
                let vals = cells
                    .iter()
                    .map(|v| match v {
                        Value::Bool(b) => Ok(Some(*b)),
                        Value::Null => Ok(None),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<Option<bool>>>>()?;
                Series::new(name.into(), vals)
            }
            Primitive::Null => Series::full_null(name.into(), cells.len(), &PlDataType::Null),
            other => {
                return Err(ExprError::Type(format!(
                    "cannot build a Polars column of type {other} from in-memory values"
                )))
            }
        }
    };
    let target = primitive_to_polars(prim);
    if series.dtype() == &target {
        Ok(series)
    } else {
        series.strict_cast(&target).map_err(polars_to_expr_error)
    }
}

/// Convert an in-memory table to a Polars DataFrame laid out by `dshape`.
///
/// Record rows become one column per field; a one-dimensional sequence of scalars
/// becomes a single column called `name`; unnamed tuple columns are numbered.
pub fn value_to_frame(value: &Value, dshape: &DataShape, name: &str) -> Result<DataFrame> {
    let rows = value.items().ok_or_else(|| {
        ExprError::Type(format!(
            "cannot convert scalar {} to a table",
            value.repr()
        ))
    })?;
    let measure = dshape.measure().non_optional();
    let columns: Vec<(String, &Measure)> = match measure {
        Measure::Record(fields) => fields.iter().map(|(n, m)| (n.clone(), m)).collect(),
        Measure::Tuple(items) => items
            .iter()
            .enumerate()
            .map(|(i, m)| (i.to_string(), m))
            .collect(),
        scalar => {
            let cells: Vec<&Value> = rows.iter().collect();
            let series = series_from_cells(name, &cells, scalar)?;
            return DataFrame::new(vec![series.into()]).map_err(polars_to_expr_error);
        }
    };
    let width = columns.len();
    let mut series: Vec<Column> = Vec::with_capacity(width);
    for (j, (col_name, m)) in columns.iter().enumerate() {
        let cells = rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row.items() {
                Some(items) if items.len() == width => Ok(&items[j]),
                _ => Err(ExprError::Type(format!(
                    "row {i} does not match {measure}: {}",
                    row.repr()
                ))),
            })
            .collect::<Result<Vec<&Value>>>()?;
        series.push(series_from_cells(col_name, &cells, m)?.into());
    }
    DataFrame::new(series).map_err(polars_to_expr_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::{dshape, tuple_of};

    #[test]
    fn frame_dshape_from_polars() {
        let df = DataFrame::new(vec![
            Series::new("id".into(), &[1i64, 2, 3]).into(),
            Series::new("name".into(), &[Some("a"), None, Some("c")]).into(),
            Series::new("score".into(), &[0.5f64, 1.5, 2.5]).into(),
        ])
        .unwrap();
        assert_eq!(
            frame_dshape(&df).unwrap().to_string(),
            "3 * {id: int64, name: ?string, score: float64}"
        );
    }

    #[test]
    fn record_rows_to_frame() {
        let v = tuple_of([("Alice", 100), ("Bob", 200)]);
        let ds = dshape("2 * {name: string, amount: int32}").unwrap();
        let df = value_to_frame(&v, &ds, "t").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
        assert_eq!(df.column("amount").unwrap().dtype(), &PlDataType::Int32);
        assert_eq!(frame_dshape(&df).unwrap(), ds);
    }

    #[test]
    fn scalar_sequence_to_single_column() {
        let v = Value::from(vec![1.0, f64::NAN]);
        let ds = dshape("2 * float64").unwrap();
        let df = value_to_frame(&v, &ds, "x").unwrap();
        assert_eq!(df.width(), 1);
        assert!(df.column("x").is_ok());
    }

    #[test]
    fn mismatched_cells_fail() {
        let v = tuple_of([("Alice", "oops")]);
        let ds = dshape("1 * {name: string, amount: int64}").unwrap();
        assert!(matches!(
            value_to_frame(&v, &ds, "t"),
            Err(ExprError::Type(_))
        ));
    }

    #[test]
    fn dtype_mapping_roundtrip() {
        for p in [
            Primitive::Bool,
            Primitive::Int16,
            Primitive::UInt64,
            Primitive::Float32,
            Primitive::String,
            Primitive::Date,
            Primitive::DateTime,
        ] {
            let dt = primitive_to_polars(p);
            assert_eq!(polars_to_primitive(&dt).unwrap(), p);
        }
    }

    #[test]
    fn out_of_range_integers_fail() {
        let v = Value::from(vec![300, -1]);
        let ds = dshape("2 * uint8").unwrap();
        let err = value_to_frame(&v, &ds, "t").unwrap_err();
        assert!(matches!(&err, ExprError::Type(m) if m.contains("300")));

        let v = Value::from(vec![Value::from(7), Value::from(-1)]);
        let err = value_to_frame(&v, &ds, "t").unwrap_err();
        assert!(matches!(&err, ExprError::Type(m) if m.contains("row 1")));

        let ds = dshape("2 * int8").unwrap();
        let df = value_to_frame(&Value::from(vec![-128, 127]), &ds, "t").unwrap();
        assert_eq!(df.column("t").unwrap().dtype(), &PlDataType::Int8);
        assert_eq!(df.column("t").unwrap().null_count(), 0);
    }
}
