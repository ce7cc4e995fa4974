//! Tabula - symbolic expressions over in-memory tabular data.
//!
//! Wrap data in [`literal`] or [`data`] nodes, derive columns with field access,
//! arithmetic and [`transform`], inspect the result with [`discover`], and evaluate
//! it with [`compute`] on top of Polars.

pub mod compute;
pub mod data;
pub mod discover;
pub mod error;
pub mod expression;
pub mod repr;
pub mod schema_conv;
pub mod transform;

pub use compute::{collect_json_rows, compute, Computed};
pub use data::{data, data_frame, literal, literal_named, DataOptions, ShapeSpec};
pub use discover::{discover, Discover};
pub use error::{polars_to_expr_error, ExprError};
pub use expression::{BinOp, Expr, Node, Source};
pub use repr::normalize;
pub use transform::{merge, transform};

pub use tabula_core::{
    config, dshape, schema, set_config, tuple_of, DataShape, Dim, Measure, Primitive, Result,
    TabulaConfig, Value,
};
