//! Tabula core: datashapes, in-memory values, discovery, config and errors (no Polars dependency).

pub mod config;
pub mod datashape;
pub mod discover;
pub mod error;
pub mod value;

pub use config::{config, set_config, TabulaConfig};
pub use datashape::{dshape, promote, schema, DataShape, Dim, Measure, Primitive};
pub use discover::{discover, discover_with_fields, name_fields};
pub use error::{ExprError, Result};
pub use value::{tuple_of, Value};
