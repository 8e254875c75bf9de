//! Query string construction: value quoting, condition encoding and clause
//! assembly.
//!
//! # Design
//! Everything here is pure string work with no I/O. Values are handled in
//! their textual form: a value whose text is all decimal digits is emitted
//! bare, anything else is wrapped in single quotes. Embedded quotes are not
//! escaped.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::AtomicsError;

/// Quote `value` for the query string: pure digit strings unchanged,
/// everything else in single quotes.
pub fn quote_value(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.to_string()
    } else {
        format!("'{value}'")
    }
}

/// A column list (`SELECT`, `ORDER BY`) or table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    /// Emitted verbatim, e.g. `*` or `last_name DESC`.
    Raw(String),
    /// Emitted comma-joined, in order.
    List(Vec<String>),
}

impl Columns {
    pub fn wildcard() -> Self {
        Columns::Raw("*".to_string())
    }

    /// Column list taken from the keys of a mapping, in its iteration order.
    pub fn keys<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        Columns::List(pairs.into_iter().map(|(k, _)| k.into()).collect())
    }

    pub fn render(&self) -> String {
        match self {
            Columns::Raw(s) => s.clone(),
            Columns::List(cols) => cols.join(","),
        }
    }
}

impl From<&str> for Columns {
    fn from(s: &str) -> Self {
        Columns::Raw(s.to_string())
    }
}

impl From<String> for Columns {
    fn from(s: String) -> Self {
        Columns::Raw(s)
    }
}

impl From<Vec<String>> for Columns {
    fn from(cols: Vec<String>) -> Self {
        Columns::List(cols)
    }
}

impl From<Vec<&str>> for Columns {
    fn from(cols: Vec<&str>) -> Self {
        Columns::List(cols.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Columns {
    fn from(cols: [&str; N]) -> Self {
        Columns::List(cols.iter().map(|c| c.to_string()).collect())
    }
}

/// The `WHERE` contribution of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditions {
    /// Already valid SQL; passed through untouched.
    Raw(String),
    /// Format string followed by substitution values. `?` markers are
    /// replaced left to right; without markers the format is expanded
    /// printf-style (`%s`, `%05d`, `%-8s`, `%x`, ...).
    Positional { format: String, values: Vec<String> },
    /// `col=value` pairs joined by ` AND `, in the given order.
    Associative(Vec<(String, String)>),
}

impl Conditions {
    pub fn raw(sql: impl Into<String>) -> Self {
        Conditions::Raw(sql.into())
    }

    pub fn positional<I, V>(format: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        Conditions::Positional {
            format: format.into(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Conditions::Associative(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

impl From<&str> for Conditions {
    fn from(s: &str) -> Self {
        Conditions::Raw(s.to_string())
    }
}

impl From<String> for Conditions {
    fn from(s: String) -> Self {
        Conditions::Raw(s)
    }
}

/// Encode `conditions` as a boolean expression.
pub fn construct_sql_for_conditions(conditions: &Conditions) -> Result<String, AtomicsError> {
    match conditions {
        Conditions::Raw(sql) => Ok(sql.clone()),
        Conditions::Positional { format, values } => construct_sql_for_positional(format, values),
        Conditions::Associative(pairs) => Ok(construct_sql_for_pairs(pairs)),
    }
}

fn construct_sql_for_positional(format: &str, values: &[String]) -> Result<String, AtomicsError> {
    if format.contains('?') {
        let placeholders = format.matches('?').count();
        if placeholders != values.len() {
            return Err(AtomicsError::PlaceholderMismatch {
                placeholders,
                values: values.len(),
            });
        }
        let mut values = values.iter();
        let mut out = String::with_capacity(format.len());
        for c in format.chars() {
            match c {
                '?' => out.push_str(&quote_value(values.next().map_or("", String::as_str))),
                _ => out.push(c),
            }
        }
        Ok(out)
    } else if format.trim().is_empty() {
        Ok(format.to_string())
    } else {
        let quoted: Vec<String> = values.iter().map(|v| quote_value(v)).collect();
        sprintf(format, &quoted)
    }
}

fn construct_sql_for_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", quote_value(v)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// printf expansion over pre-quoted arguments.
///
/// Supports the flags `-`, `+`, space and `0`, a width, a `.precision`, and
/// the conversions `s d i x X o b %`. Negative numbers in non-decimal bases
/// are written as a sign and magnitude (`-ff`). Surplus arguments are
/// ignored.
fn sprintf(format: &str, args: &[String]) -> Result<String, AtomicsError> {
    let mut args = args.iter();
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let directive = Directive::parse(&mut chars)?;
        match directive.conversion {
            '%' => out.push('%'),
            's' => {
                let arg = next_arg(&mut args)?;
                let text: String = match directive.precision {
                    Some(p) => arg.chars().take(p).collect(),
                    None => arg.to_string(),
                };
                directive.pad(&mut out, "", &text, false);
            }
            conversion @ ('d' | 'i' | 'x' | 'X' | 'o' | 'b') => {
                let arg = next_arg(&mut args)?;
                let n: i64 = arg.trim().parse().map_err(|_| {
                    AtomicsError::Format(format!("invalid value for %{conversion}: {arg}"))
                })?;
                let magnitude = n.unsigned_abs();
                let mut digits = match conversion {
                    'x' => format!("{magnitude:x}"),
                    'X' => format!("{magnitude:X}"),
                    'o' => format!("{magnitude:o}"),
                    'b' => format!("{magnitude:b}"),
                    _ => magnitude.to_string(),
                };
                if let Some(p) = directive.precision {
                    if digits.len() < p {
                        digits.insert_str(0, &"0".repeat(p - digits.len()));
                    }
                }
                let sign = if n < 0 {
                    "-"
                } else if directive.plus {
                    "+"
                } else if directive.space {
                    " "
                } else {
                    ""
                };
                directive.pad(&mut out, sign, &digits, directive.precision.is_none());
            }
            other => {
                return Err(AtomicsError::Format(format!("unsupported directive %{other}")));
            }
        }
    }
    Ok(out)
}

/// One `%[flags][width][.precision]conversion` specifier.
#[derive(Debug, Default)]
struct Directive {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

impl Directive {
    fn parse(chars: &mut Peekable<Chars<'_>>) -> Result<Self, AtomicsError> {
        let mut directive = Directive::default();
        while let Some(&c) = chars.peek() {
            match c {
                '-' => directive.left = true,
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                '0' => directive.zero = true,
                _ => break,
            }
            chars.next();
        }
        directive.width = count(chars)?;
        if chars.next_if_eq(&'.').is_some() {
            directive.precision = Some(count(chars)?);
        }
        directive.conversion = chars
            .next()
            .ok_or_else(|| AtomicsError::Format("incomplete format specifier".to_string()))?;
        Ok(directive)
    }

    /// Write `sign` and `body` padded to the width. Zero fill goes between
    /// the sign and the digits and only applies when `zero_fill` allows it.
    fn pad(&self, out: &mut String, sign: &str, body: &str, zero_fill: bool) {
        let fill = self
            .width
            .saturating_sub(sign.chars().count() + body.chars().count());
        if self.left {
            out.push_str(sign);
            out.push_str(body);
            out.extend(std::iter::repeat(' ').take(fill));
        } else if self.zero && zero_fill {
            out.push_str(sign);
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(body);
        } else {
            out.extend(std::iter::repeat(' ').take(fill));
            out.push_str(sign);
            out.push_str(body);
        }
    }
}

fn count(chars: &mut Peekable<Chars<'_>>) -> Result<usize, AtomicsError> {
    let mut n: usize = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(d as usize))
            .ok_or_else(|| AtomicsError::Format("width or precision too large".to_string()))?;
        chars.next();
    }
    Ok(n)
}

fn next_arg<'a>(args: &mut std::slice::Iter<'a, String>) -> Result<&'a str, AtomicsError> {
    args.next()
        .map(String::as_str)
        .ok_or_else(|| AtomicsError::Format("too few arguments".to_string()))
}

/// Per-call query options. Unset clauses are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub select: Option<Columns>,
    pub from: Option<String>,
    pub conditions: Option<Conditions>,
    pub order: Option<Columns>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: impl Into<Columns>) -> Self {
        self.select = Some(columns.into());
        self
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    pub fn conditions(mut self, conditions: impl Into<Conditions>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn order(mut self, columns: impl Into<Columns>) -> Self {
        self.order = Some(columns.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Fill every unset option from `defaults`; options already set win.
    pub fn or(self, defaults: QueryOptions) -> Self {
        Self {
            select: self.select.or(defaults.select),
            from: self.from.or(defaults.from),
            conditions: self.conditions.or(defaults.conditions),
            order: self.order.or(defaults.order),
            limit: self.limit.or(defaults.limit),
            offset: self.offset.or(defaults.offset),
        }
    }
}

/// Assemble the query string. Clause order is fixed:
/// `SELECT`, `FROM`, `WHERE`, `ORDER BY`, `LIMIT`, `OFFSET`.
pub fn construct_sql(options: &QueryOptions) -> Result<String, AtomicsError> {
    let mut sql = Vec::with_capacity(6);
    let select = options.select.as_ref().map(Columns::render).unwrap_or_default();
    sql.push(format!("SELECT {select}"));
    sql.push(format!("FROM {}", options.from.as_deref().unwrap_or_default()));
    if let Some(conditions) = &options.conditions {
        sql.push(format!("WHERE {}", construct_sql_for_conditions(conditions)?));
    }
    if let Some(order) = &options.order {
        sql.push(format!("ORDER BY {}", order.render()));
    }
    if let Some(limit) = options.limit {
        sql.push(format!("LIMIT {limit}"));
    }
    if let Some(offset) = options.offset {
        sql.push(format!("OFFSET {offset}"));
    }
    Ok(sql.join(" "))
}
