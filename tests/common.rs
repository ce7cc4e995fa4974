//! Shared fixtures for integration tests.

#![allow(dead_code)]

use tabula::{tuple_of, Value};

/// Two rows of (name, amount).
pub fn tdata() -> Value {
    tuple_of([("Alice", 100), ("Bob", 200)])
}

/// Five rows of (id, name, amount) with mixed-sign amounts.
pub fn l_rows() -> Value {
    Value::from(vec![
        Value::from(vec![Value::from(1), "Alice".into(), 100.into()]),
        Value::from(vec![Value::from(2), "Bob".into(), (-200).into()]),
        Value::from(vec![Value::from(3), "Charlie".into(), 300.into()]),
        Value::from(vec![Value::from(4), "Denis".into(), 400.into()]),
        Value::from(vec![Value::from(5), "Edith".into(), (-500).into()]),
    ])
}

/// Replace the value of `_name='...'` with `_0` so autogenerated names compare equal.
pub fn replace_name(s: &str) -> String {
    const KEY: &str = "_name='";
    let Some(start) = s.find(KEY).map(|i| i + KEY.len()) else {
        return s.to_string();
    };
    match s[start..].find('\'') {
        Some(len) => format!("{}_0{}", &s[..start], &s[start + len..]),
        None => s.to_string(),
    }
}
