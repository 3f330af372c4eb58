//! Where clauses: operators, compare operands and row matching
//!
//! A [`WhereClause`] can only be built with a compare operand whose shape
//! fits its operator, so malformed predicates fail when the query is built
//! rather than when it runs.

use crate::{DataType, Row, TabulaError, TabulaResult, Value};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a where clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Between,
    NotBetween,
    Like,
    NotLike,
    In,
    NotIn,
}

/// Shape of compare operand an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareShape {
    Scalar,
    Range,
    Pattern,
    List,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    pub fn shape(&self) -> CompareShape {
        match self {
            Operator::Between | Operator::NotBetween => CompareShape::Range,
            Operator::Like | Operator::NotLike => CompareShape::Pattern,
            Operator::In | Operator::NotIn => CompareShape::List,
            _ => CompareShape::Scalar,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        match normalized.as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Gte),
            "<=" => Ok(Operator::Lte),
            "BETWEEN" => Ok(Operator::Between),
            "NOT BETWEEN" => Ok(Operator::NotBetween),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            "IN" => Ok(Operator::In),
            "NOT IN" => Ok(Operator::NotIn),
            _ => Err(TabulaError::invalid_argument(format!("unknown operator: {}", s))),
        }
    }
}

impl TryFrom<&str> for Operator {
    type Error = TabulaError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// LIKE PATTERNS
// ============================================================================

/// SQL `LIKE` pattern: `%` matches any run, `_` one character,
/// case-insensitive.
#[derive(Debug, Clone)]
pub struct LikePattern {
    raw: String,
    regex: Regex,
}

impl LikePattern {
    pub fn new(raw: impl Into<String>) -> TabulaResult<Self> {
        let raw = raw.into();
        let mut source = String::from("(?is)^");
        for ch in raw.chars() {
            match ch {
                '%' => source.push_str(".*"),
                '_' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');
        let regex = Regex::new(&source)
            .map_err(|e| TabulaError::invalid_argument(format!("invalid LIKE pattern {}: {}", raw, e)))?;
        Ok(Self { raw, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

// ============================================================================
// COMPARE OPERANDS
// ============================================================================

/// Right-hand side of a where clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Compare {
    Scalar(Value),
    Range(Value, Value),
    List(Vec<Value>),
    Pattern(LikePattern),
}

impl Compare {
    pub fn shape(&self) -> CompareShape {
        match self {
            Compare::Scalar(_) => CompareShape::Scalar,
            Compare::Range(_, _) => CompareShape::Range,
            Compare::List(_) => CompareShape::List,
            Compare::Pattern(_) => CompareShape::Pattern,
        }
    }

    fn coerce(&self, data_type: DataType) -> Option<Compare> {
        let one = |v: &Value| -> Option<Value> {
            if v.is_null() {
                Some(Value::Null)
            } else {
                data_type.coerce(v)
            }
        };
        match self {
            Compare::Scalar(v) => one(v).map(Compare::Scalar),
            Compare::Range(lo, hi) => Some(Compare::Range(one(lo)?, one(hi)?)),
            Compare::List(items) => items
                .iter()
                .map(one)
                .collect::<Option<Vec<_>>>()
                .map(Compare::List),
            Compare::Pattern(_) => Some(self.clone()),
        }
    }
}

macro_rules! scalar_compare_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Compare {
                fn from(value: $ty) -> Self {
                    Compare::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_compare_from!(Value, &str, String, i32, i64, i128, f64, bool, DateTime<Utc>);

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Compare {
    fn from((lo, hi): (A, B)) -> Self {
        Compare::Range(lo.into(), hi.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Compare {
    fn from(items: Vec<T>) -> Self {
        Compare::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Compare {
    fn from(items: [T; N]) -> Self {
        Compare::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<LikePattern> for Compare {
    fn from(pattern: LikePattern) -> Self {
        Compare::Pattern(pattern)
    }
}

// ============================================================================
// WHERE CLAUSES
// ============================================================================

/// A single `column operator compare` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    column: String,
    operator: Operator,
    compare: Compare,
}

impl WhereClause {
    /// Build a clause, rejecting compare operands whose shape does not fit
    /// the operator. Text scalars given to `LIKE`/`NOT LIKE` become patterns.
    pub fn new(
        column: impl Into<String>,
        operator: Operator,
        compare: impl Into<Compare>,
    ) -> TabulaResult<Self> {
        let column = column.into();
        if column.is_empty() {
            return Err(TabulaError::invalid_argument("where clause column cannot be empty"));
        }

        let compare = match (operator.shape(), compare.into()) {
            (CompareShape::Pattern, Compare::Scalar(Value::Text(raw))) => {
                Compare::Pattern(LikePattern::new(raw)?)
            }
            (expected, compare) if compare.shape() != expected => {
                return Err(TabulaError::invalid_argument(format!(
                    "{} on {} expects a {} operand, got {:?}",
                    operator,
                    column,
                    shape_name(expected),
                    compare
                )));
            }
            (_, compare) => compare,
        };

        Ok(Self {
            column,
            operator,
            compare,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn compare(&self) -> &Compare {
        &self.compare
    }

    /// Coerce compare values into the column's declared type.
    ///
    /// Returns `InvalidArgument` when a value cannot be represented in that
    /// type. Patterns are left untouched.
    pub fn coerce_to(&self, data_type: DataType) -> TabulaResult<Self> {
        let compare = self.compare.coerce(data_type).ok_or_else(|| {
            TabulaError::invalid_argument(format!(
                "compare value {:?} does not fit {} column {}",
                self.compare, data_type, self.column
            ))
        })?;
        Ok(Self {
            column: self.column.clone(),
            operator: self.operator,
            compare,
        })
    }

    /// Evaluate the predicate against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(&self.column).unwrap_or(Value::Null);
        let eq = |other: &Value| value.compare(other) == Some(Ordering::Equal);

        match (&self.operator, &self.compare) {
            (Operator::Eq, Compare::Scalar(c)) => eq(c),
            (Operator::Ne, Compare::Scalar(c)) => !eq(c),
            (Operator::Gt, Compare::Scalar(c)) => value.compare(c) == Some(Ordering::Greater),
            (Operator::Lt, Compare::Scalar(c)) => value.compare(c) == Some(Ordering::Less),
            (Operator::Gte, Compare::Scalar(c)) => matches!(
                value.compare(c),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            (Operator::Lte, Compare::Scalar(c)) => {
                matches!(value.compare(c), Some(Ordering::Less | Ordering::Equal))
            }
            (Operator::Between, Compare::Range(lo, hi)) => between(&value, lo, hi),
            (Operator::NotBetween, Compare::Range(lo, hi)) => {
                !value.is_null() && !between(&value, lo, hi)
            }
            (Operator::Like, Compare::Pattern(p)) => {
                !value.is_null() && p.is_match(&value.to_string())
            }
            (Operator::NotLike, Compare::Pattern(p)) => {
                !value.is_null() && !p.is_match(&value.to_string())
            }
            (Operator::In, Compare::List(items)) => items.iter().any(eq),
            (Operator::NotIn, Compare::List(items)) => !items.iter().any(eq),
            _ => false,
        }
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.compare {
            Compare::Scalar(v) => write!(f, "{} {} {}", self.column, self.operator, v),
            Compare::Range(lo, hi) => {
                write!(f, "{} {} {} AND {}", self.column, self.operator, lo, hi)
            }
            Compare::Pattern(p) => write!(f, "{} {} '{}'", self.column, self.operator, p.as_str()),
            Compare::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{} {} ({})", self.column, self.operator, rendered.join(", "))
            }
        }
    }
}

/// True when every clause matches.
pub fn matches_all(wheres: &[WhereClause], row: &Row) -> bool {
    wheres.iter().all(|w| w.matches(row))
}

fn between(value: &Value, lo: &Value, hi: &Value) -> bool {
    matches!(value.compare(lo), Some(Ordering::Greater | Ordering::Equal))
        && matches!(value.compare(hi), Some(Ordering::Less | Ordering::Equal))
}

fn shape_name(shape: CompareShape) -> &'static str {
    match shape {
        CompareShape::Scalar => "scalar",
        CompareShape::Range => "2-tuple",
        CompareShape::Pattern => "string pattern",
        CompareShape::List => "list",
    }
}

// ============================================================================
// TESTS
// ============================================================================
