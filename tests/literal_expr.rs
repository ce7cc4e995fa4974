//! Literal and data nodes: discovery, representations, transform and identity.

mod common;

use common::{l_rows, replace_name, tdata};
use tabula::{
    data, discover, dshape, literal, literal_named, normalize, transform, DataOptions, Expr,
    ExprError, Source, Value,
};

fn t() -> Expr {
    data(tdata(), DataOptions::new().fields(["name", "amount"])).unwrap()
}

#[test]
fn discover_on_data() {
    assert_eq!(
        discover(&t()).unwrap(),
        dshape("2 * {name: string, amount: int64}").unwrap()
    );
}

#[test]
fn discover_on_literal() {
    let l = literal(tdata()).unwrap();
    assert_eq!(discover(&l).unwrap(), dshape("2 * (string, int64)").unwrap());
}

#[test]
fn discover_on_nested_lists() {
    let l = literal(l_rows()).unwrap();
    assert_eq!(discover(&l).unwrap().to_string(), "5 * (int64, string, int64)");
}

#[test]
fn table_raises_on_inconsistent_inputs() {
    let err = data(
        tdata(),
        DataOptions::new()
            .schema("{name: string, amount: float32}")
            .dshape(dshape("{name: string, amount: float32}").unwrap()),
    )
    .unwrap_err();
    assert!(matches!(err, ExprError::InvalidArgument(_)));
    assert!(err
        .to_string()
        .contains("specify one of schema= or dshape= keyword"));
}

#[test]
fn resources() {
    let t = t();
    let res = t.resources();
    assert_eq!(res.len(), 1);
    match res.get(&t) {
        Some(Source::Value(v)) => assert!(v.identical(&tdata())),
        other => panic!("expected the wrapped tuple, got {other:?}"),
    }
}

#[test]
fn resources_of_derived_expression_point_at_leaf() {
    let t = t();
    let e = t.field("amount").unwrap() * 2 + t.field("amount").unwrap();
    let res = e.resources();
    assert_eq!(res.len(), 1);
    assert!(res.contains_key(&t));
}

#[test]
fn literal_repr() {
    let l = literal(tdata()).unwrap();
    assert_eq!("(('Alice', 100), ('Bob', 200))", l.repr().unwrap());
}

#[test]
fn literal_name_repr() {
    let nl = literal_named(tdata(), "amounts").unwrap();
    assert_eq!("amounts", nl.repr().unwrap());
}

#[test]
fn data_repr() {
    let expected = "<'tuple' data; _name='.+', dshape='2 * {name: string, amount: int64}'>";
    assert_eq!(replace_name(expected), replace_name(&t().repr().unwrap()));
}

#[test]
fn str_does_not_repr() {
    let d = data(
        vec![Value::from(("aa", 1)), Value::from(("b", 2))],
        DataOptions::new()
            .name("ZZZ")
            .dshape("2 * {a: string, b: int64}"),
    )
    .unwrap();
    let expr = transform(
        &d,
        [("c", d.field("a").unwrap().str().len().unwrap() + d.field("b").unwrap())],
    )
    .unwrap();
    assert_eq!(
        normalize(&expr.to_string()),
        normalize(
            "
            Merge(
                args=(ZZZ, label(len(_child=ZZZ.a) + ZZZ.b, 'c')),
                _varargsexpr=VarArgsExpr(
                    _inputs=(ZZZ, label(len(_child=ZZZ.a) + ZZZ.b, 'c'))
                ),
                _shape=(2,)
            )
            "
        )
    );
}

#[test]
fn isidentical_with_nan_column() {
    let rows = Value::from(vec![(f64::NAN,), (f64::NAN,)]);
    let ds = data(rows.clone(), DataOptions::new().fields(["a"])).unwrap();
    assert_eq!(ds.dshape().unwrap().to_string(), "2 * {a: float64}");
    assert!(ds.field("a").unwrap().isidentical(&ds.field("a").unwrap()));

    // Separately built nodes over equal NaN data are still identical.
    let again = data(
        rows,
        DataOptions::new().name(ds.name().unwrap()).fields(["a"]),
    )
    .unwrap();
    assert!(again.field("a").unwrap().isidentical(&ds.field("a").unwrap()));
}
