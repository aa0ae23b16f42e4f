//! Criteria parser: `field:operator:value` text into a [`Predicate`].
//!
//! Only the first two colons delimit; the value may contain more. Fields and
//! operators are checked against fixed vocabularies here, because the query
//! builder interpolates them into SQL text.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::schema;

/// Comparison operator, matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::Like,
        Operator::NotLike,
        Operator::In,
        Operator::NotIn,
    ];

    /// SQL token, also the accepted criteria spelling.
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    /// Set-membership operators take a comma-separated list.
    pub fn is_set(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_sql() == s)
            .ok_or(())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Store column name, always a registered column.
    pub field: &'static str,
    pub op: Operator,
    /// Compared after SQLite's own type affinity is applied.
    pub value: String,
}

impl Predicate {
    /// Values to bind for this predicate, one per placeholder.
    pub fn params(&self) -> Vec<&str> {
        if self.op.is_set() {
            self.value.split(',').map(str::trim).collect()
        } else {
            vec![self.value.as_str()]
        }
    }
}

/// Parse one criteria string.
pub fn parse(text: &str) -> Result<Predicate> {
    let invalid = |reason: String| Error::InvalidFilter {
        criteria: text.to_string(),
        reason,
    };

    let mut parts = text.splitn(3, ':');
    let (field, op, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(f), Some(o), Some(v)) => (f, o, v),
        _ => {
            return Err(invalid(
                "expected the format 'field:operator:value'".to_string(),
            ))
        }
    };

    let column = schema::by_internal(field)
        .ok_or_else(|| invalid(format!("unknown field '{}'", field)))?;

    let op = Operator::from_str(op).map_err(|_| {
        let known: Vec<_> = Operator::ALL.iter().map(|o| o.as_sql()).collect();
        invalid(format!(
            "unknown operator '{}' (expected one of: {})",
            op,
            known.join(", ")
        ))
    })?;

    let predicate = Predicate {
        field: column.internal,
        op,
        value: value.to_string(),
    };

    if op.is_set() && predicate.params().iter().any(|item| item.is_empty()) {
        return Err(invalid(format!(
            "'{}' needs a comma-separated list without empty items",
            op
        )));
    }

    Ok(predicate)
}

/// Parse every criteria string, failing on the first bad one.
pub fn parse_all<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Predicate>> {
    texts.iter().map(|t| parse(t.as_ref())).collect()
}
