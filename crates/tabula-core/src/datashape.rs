//! Datashape: the structural type of a value or expression.
//!
//! A datashape is a list of dimensions followed by a measure, written
//! `2 * {name: string, amount: int64}` or `var * (string, ?float64)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExprError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Date,
    DateTime,
    Null,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt8 => "uint8",
            Primitive::UInt16 => "uint16",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Date => "date",
            Primitive::DateTime => "datetime",
            Primitive::Null => "null",
        }
    }

    /// Look up a primitive by name, accepting the usual aliases (`int`, `real`, `double`).
    pub fn from_name(name: &str) -> Option<Primitive> {
        let p = match name {
            "bool" | "boolean" => Primitive::Bool,
            "int8" => Primitive::Int8,
            "int16" => Primitive::Int16,
            "int32" | "int" => Primitive::Int32,
            "int64" => Primitive::Int64,
            "uint8" => Primitive::UInt8,
            "uint16" => Primitive::UInt16,
            "uint32" => Primitive::UInt32,
            "uint64" => Primitive::UInt64,
            "float32" | "float" => Primitive::Float32,
            "float64" | "real" | "double" => Primitive::Float64,
            "string" | "str" => Primitive::String,
            "date" => Primitive::Date,
            "datetime" => Primitive::DateTime,
            "null" => Primitive::Null,
            _ => return None,
        };
        Some(p)
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64
        )
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Primitive::UInt8 | Primitive::UInt16 | Primitive::UInt32 | Primitive::UInt64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    fn bits(self) -> u8 {
        match self {
            Primitive::Int8 | Primitive::UInt8 => 8,
            Primitive::Int16 | Primitive::UInt16 => 16,
            Primitive::Int32 | Primitive::UInt32 | Primitive::Float32 => 32,
            _ => 64,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The per-element type of a datashape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    Primitive(Primitive),
    /// Nullable measure, written `?T`.
    Option(Box<Measure>),
    Tuple(Vec<Measure>),
    Record(Vec<(String, Measure)>),
}

impl Measure {
    pub const STRING: Measure = Measure::Primitive(Primitive::String);
    pub const INT64: Measure = Measure::Primitive(Primitive::Int64);
    pub const FLOAT64: Measure = Measure::Primitive(Primitive::Float64);
    pub const BOOL: Measure = Measure::Primitive(Primitive::Bool);
    pub const NULL: Measure = Measure::Primitive(Primitive::Null);

    pub fn record<S: Into<String>>(fields: impl IntoIterator<Item = (S, Measure)>) -> Measure {
        Measure::Record(fields.into_iter().map(|(n, m)| (n.into(), m)).collect())
    }

    /// Field names of a record measure; empty for anything else.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Measure::Record(fields) => fields.iter().map(|(n, _)| n.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn fields(&self) -> &[(String, Measure)] {
        match self {
            Measure::Record(fields) => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&Measure> {
        self.fields()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    /// Strip one level of `?`.
    pub fn non_optional(&self) -> &Measure {
        match self {
            Measure::Option(inner) => inner,
            other => other,
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.non_optional() {
            Measure::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(Primitive::is_numeric)
    }

    pub fn is_string(&self) -> bool {
        self.as_primitive() == Some(Primitive::String)
    }

    fn optional(self) -> Measure {
        match self {
            Measure::Option(_) => self,
            Measure::Primitive(Primitive::Null) => self,
            other => Measure::Option(Box::new(other)),
        }
    }
}

impl From<Primitive> for Measure {
    fn from(p: Primitive) -> Self {
        Measure::Primitive(p)
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Primitive(p) => write!(f, "{p}"),
            Measure::Option(inner) => write!(f, "?{inner}"),
            Measure::Tuple(items) => {
                f.write_str("(")?;
                for (i, m) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{m}")?;
                }
                f.write_str(")")
            }
            Measure::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, m)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_identifier(name) {
                        write!(f, "{name}: {m}")?;
                    } else {
                        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
                        write!(f, "'{escaped}': {m}")?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Fixed(usize),
    Var,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Var => f.write_str("var"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataShape {
    dims: Vec<Dim>,
    measure: Measure,
}

impl DataShape {
    pub fn new(dims: Vec<Dim>, measure: Measure) -> Self {
        DataShape { dims, measure }
    }

    /// A dimensionless shape (a single scalar of `measure`).
    pub fn scalar(measure: Measure) -> Self {
        DataShape {
            dims: Vec::new(),
            measure,
        }
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// Outer dimensions, the counterpart of an array's shape.
    pub fn shape(&self) -> &[Dim] {
        &self.dims
    }

    /// Drop the outermost dimension.
    pub fn subshape(&self) -> DataShape {
        DataShape {
            dims: self.dims.iter().skip(1).copied().collect(),
            measure: self.measure.clone(),
        }
    }

    pub fn with_measure(&self, measure: Measure) -> DataShape {
        DataShape {
            dims: self.dims.clone(),
            measure,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for DataShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.dims {
            write!(f, "{d} * ")?;
        }
        write!(f, "{}", self.measure)
    }
}

impl std::str::FromStr for DataShape {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        dshape(s)
    }
}

/// Common measure two values can both be represented as.
pub fn promote(a: &Measure, b: &Measure) -> Result<Measure> {
    if a == b {
        return Ok(a.clone());
    }
    match (a, b) {
        (Measure::Primitive(Primitive::Null), other) | (other, Measure::Primitive(Primitive::Null)) => {
            Ok(other.clone().optional())
        }
        (Measure::Option(x), y) | (y, Measure::Option(x)) => {
            Ok(promote(x, y.non_optional())?.optional())
        }
        (Measure::Primitive(x), Measure::Primitive(y)) => promote_primitive(*x, *y)
            .map(Measure::Primitive)
            .ok_or_else(|| ExprError::Type(format!("cannot promote {a} and {b}"))),
        (Measure::Tuple(xs), Measure::Tuple(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| promote(x, y))
            .collect::<Result<Vec<_>>>()
            .map(Measure::Tuple),
        (Measure::Record(xs), Measure::Record(ys))
            if xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.0 == y.0) =>
        {
            xs.iter()
                .zip(ys)
                .map(|((n, x), (_, y))| -> Result<(String, Measure)> {
                    Ok((n.clone(), promote(x, y)?))
                })
                .collect::<Result<Vec<_>>>()
                .map(Measure::Record)
        }
        _ => Err(ExprError::Type(format!("cannot promote {a} and {b}"))),
    }
}

fn promote_primitive(a: Primitive, b: Primitive) -> Option<Primitive> {
    if a == b {
        return Some(a);
    }
    let wider = |x: Primitive, y: Primitive| if x.bits() >= y.bits() { x } else { y };
    if a.is_signed_integer() && b.is_signed_integer() {
        return Some(wider(a, b));
    }
    if a.is_unsigned_integer() && b.is_unsigned_integer() {
        return Some(wider(a, b));
    }
    if a.is_integer() && b.is_integer() {
        return Some(Primitive::Int64);
    }
    if a.is_numeric() && b.is_numeric() {
        return Some(Primitive::Float64);
    }
    None
}

// ---------- Parser ----------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(usize),
    Ident(String),
    Quoted(String),
    Star,
    Comma,
    Colon,
    Question,
    LParen,
    RParen,
    LBrace,
    RBrace,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' | ',' | ':' | '?' | '(' | ')' | '{' | '}' => {
                chars.next();
                tokens.push(match c {
                    '*' => Token::Star,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    '?' => Token::Question,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    _ => Token::RBrace,
                });
            }
            '\'' | '"' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => s.push(ch),
                    }
                }
                if !closed {
                    return Err(ExprError::Parse(format!(
                        "unterminated string starting at offset {pos}"
                    )));
                }
                tokens.push(Token::Quoted(s));
            }
            c if c.is_ascii_digit() => {
                let mut n = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    n.push(d);
                    chars.next();
                }
                let value = n
                    .parse()
                    .map_err(|_| ExprError::Parse(format!("dimension {n} out of range")))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_') {
                        break;
                    }
                    ident.push(d);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(ExprError::Parse(format!(
                    "unexpected character {other:?} at offset {pos}"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        match self.next() {
            Some(t) if t == want => Ok(()),
            Some(t) => Err(ExprError::Parse(format!("expected {want:?}, got {t:?}"))),
            None => Err(ExprError::Parse(format!("expected {want:?}, got end of input"))),
        }
    }

    fn datashape(&mut self) -> Result<DataShape> {
        let mut dims = Vec::new();
        loop {
            let dim = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Int(n)), Some(Token::Star)) => Dim::Fixed(*n),
                (Some(Token::Ident(v)), Some(Token::Star)) if v == "var" => Dim::Var,
                _ => break,
            };
            self.pos += 2;
            dims.push(dim);
        }
        let measure = self.measure()?;
        Ok(DataShape { dims, measure })
    }

    fn measure(&mut self) -> Result<Measure> {
        match self.next() {
            Some(Token::Question) => Ok(self.measure()?.optional()),
            Some(Token::LParen) => {
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RParen) {
                    items.push(self.measure()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Measure::Tuple(items))
            }
            Some(Token::LBrace) => {
                let mut fields = Vec::new();
                while self.peek() != Some(&Token::RBrace) {
                    let name = match self.next() {
                        Some(Token::Ident(s)) | Some(Token::Quoted(s)) => s,
                        other => {
                            return Err(ExprError::Parse(format!(
                                "expected field name, got {other:?}"
                            )))
                        }
                    };
                    self.expect(Token::Colon)?;
                    fields.push((name, self.measure()?));
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Measure::Record(fields))
            }
            Some(Token::Ident(name)) => Primitive::from_name(&name)
                .map(Measure::Primitive)
                .ok_or_else(|| ExprError::Parse(format!("unknown type {name:?}"))),
            Some(t) => Err(ExprError::Parse(format!("unexpected token {t:?}"))),
            None => Err(ExprError::Parse("unexpected end of input".into())),
        }
    }
}

/// Parse a datashape from its textual form.
pub fn dshape(text: &str) -> Result<DataShape> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };
    let ds = parser.datashape()?;
    if let Some(t) = parser.peek() {
        return Err(ExprError::Parse(format!(
            "trailing input after datashape: {t:?}"
        )));
    }
    Ok(ds)
}

/// Parse a bare measure (a schema) such as `{name: string, amount: float32}`.
pub fn schema(text: &str) -> Result<Measure> {
    let ds = dshape(text)?;
    if !ds.dims.is_empty() {
        return Err(ExprError::Parse(format!(
            "schema must not have dimensions, got {ds}"
        )));
    }
    Ok(ds.measure)
}
