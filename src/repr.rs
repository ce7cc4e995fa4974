//! The evaluating representation of expressions.
//!
//! `to_string()` (see the `Display` impl on [`Expr`]) only describes the tree.
//! [`Expr::repr`] is the interactive form: leaves show their data, everything
//! else is computed and the resulting table or column is rendered.

use tabula_core::{config, Result, Value};

use crate::compute::compute;
use crate::expression::{Expr, Node};

impl Expr {
    /// Interactive representation.
    ///
    /// - unnamed literal: the host representation of its value
    /// - named literal: its name
    /// - data node: `<'tuple' data; _name='_0', dshape='2 * {...}'>`
    /// - anything else: the first rows of the computed table or column
    pub fn repr(&self) -> Result<String> {
        match self.node() {
            Node::Literal {
                name: Some(name), ..
            } => Ok(name.clone()),
            Node::Literal { value, .. } => Ok(value.repr()),
            Node::Data {
                source,
                dshape,
                name,
            } => Ok(format!(
                "<{} data; _name={}, dshape={}>",
                Value::from(source.type_name()),
                Value::from(name.as_str()),
                Value::from(dshape.to_string()),
            )),
            _ => Ok(compute(self)?.head(config().display_rows).to_string()),
        }
    }
}

/// Strip all whitespace so multi-line string forms compare equal to one-line ones.
pub fn normalize(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{data, literal, literal_named, DataOptions};
    use crate::transform::transform;
    use tabula_core::tuple_of;

    fn tdata() -> Value {
        tuple_of([("Alice", 100), ("Bob", 200)])
    }

    #[test]
    fn literal_repr() {
        assert_eq!(
            literal(tdata()).unwrap().repr().unwrap(),
            "(('Alice', 100), ('Bob', 200))"
        );
    }

    #[test]
    fn literal_name_repr() {
        assert_eq!(
            literal_named(tdata(), "amounts").unwrap().repr().unwrap(),
            "amounts"
        );
    }

    #[test]
    fn data_repr() {
        let t = data(tdata(), DataOptions::new().name("_0").fields(["name", "amount"])).unwrap();
        assert_eq!(
            t.repr().unwrap(),
            "<'tuple' data; _name='_0', dshape='2 * {name: string, amount: int64}'>"
        );
    }

    #[test]
    fn computed_repr_shows_values() {
        let t = data(tdata(), DataOptions::new().fields(["name", "amount"])).unwrap();
        let out = (t.field("amount").unwrap() + 1).repr().unwrap();
        assert!(out.contains("101"));
        assert!(out.contains("201"));
    }

    #[test]
    fn column_repr_is_a_series() {
        let t = data(tdata(), DataOptions::new().name("t").fields(["name", "amount"])).unwrap();
        let out = t.field("amount").unwrap().repr().unwrap();
        assert!(out.contains("Series: 'amount'"));
        let table = transform(&t, [("c", t.field("amount").unwrap() * 2)])
            .unwrap()
            .repr()
            .unwrap();
        assert!(!table.contains("Series"));
        assert!(table.contains("400"));
    }

    #[test]
    fn str_does_not_evaluate() {
        // A date column cannot be materialized from in-memory values, so any
        // evaluation of this tree fails.
        let d = data(
            tuple_of([("aa", 1), ("b", 2)]),
            DataOptions::new()
                .name("ZZZ")
                .dshape("2 * {a: string, b: date}"),
        )
        .unwrap();
        let expr = transform(&d, [("n", d.field("a").unwrap().str().len().unwrap())]).unwrap();
        assert!(expr.repr().is_err());
        assert_eq!(
            normalize(&expr.to_string()),
            "Merge(args=(ZZZ,label(len(_child=ZZZ.a),'n')),_varargsexpr=VarArgsExpr(_inputs=(ZZZ,label(len(_child=ZZZ.a),'n'))),_shape=(2,))"
        );
    }

    #[test]
    fn normalize_strips_whitespace() {
        assert_eq!(normalize(" a (\n\t b ) "), "a(b)");
    }
}
