use std::fmt;
use std::str::FromStr;

use sea_orm::{ColumnTrait, Condition, Value};

use crate::error::DepotError;

/// Comparison applied by a [`Criterion`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// SQL `LIKE` pattern match (`%` and `_` wildcards).
    Like,
    StartsWith,
}

impl Operator {
    pub const ALL: &'static [Operator] = &[
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Like,
        Self::StartsWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "like",
            Self::StartsWith => "startswith",
        }
    }

    fn is_textual(&self) -> bool {
        matches!(self, Self::Like | Self::StartsWith)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = DepotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DepotError::InvalidCriteria(format!("unknown operator '{s}'")))
    }
}

/// Right-hand side of a [`Criterion`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<common::Category> for FieldValue {
    fn from(v: common::Category) -> Self {
        Self::Text(v.as_str().to_string())
    }
}

impl From<common::Verdict> for FieldValue {
    fn from(v: common::Verdict) -> Self {
        Self::Text(v.as_str().to_string())
    }
}

impl From<FieldValue> for Value {
    fn from(v: FieldValue) -> Self {
        match v {
            FieldValue::Text(s) => s.into(),
            FieldValue::Float(f) => f.into(),
            FieldValue::Int(i) => i.into(),
            FieldValue::Bool(b) => b.into(),
        }
    }
}

/// One `(field, operator, value)` predicate. Criteria are ANDed.
#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    pub field: String,
    pub op: Operator,
    pub value: FieldValue,
}

impl Criterion {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Shorthand for the common identity lookup.
    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// Build the SQL condition for this criterion against `column`.
    pub(crate) fn to_condition<C: ColumnTrait>(&self, column: C) -> Result<Condition, DepotError> {
        let cond = Condition::all();
        if self.op.is_textual() {
            let FieldValue::Text(text) = &self.value else {
                return Err(DepotError::InvalidCriteria(format!(
                    "operator '{}' on field '{}' needs a string value",
                    self.op, self.field
                )));
            };
            return Ok(match self.op {
                Operator::Like => cond.add(column.like(text.as_str())),
                _ => cond.add(column.starts_with(text.as_str())),
            });
        }

        let value: Value = self.value.clone().into();
        Ok(match self.op {
            Operator::Eq => cond.add(column.eq(value)),
            Operator::Ne => cond.add(column.ne(value)),
            Operator::Lt => cond.add(column.lt(value)),
            Operator::Le => cond.add(column.lte(value)),
            Operator::Gt => cond.add(column.gt(value)),
            _ => cond.add(column.gte(value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parse() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), *op);
        }
        assert!(matches!(
            "~=".parse::<Operator>(),
            Err(DepotError::InvalidCriteria(_))
        ));
    }

    #[test]
    fn test_criterion_from_values() {
        let c = Criterion::equals("category", common::Category::Validate);
        assert_eq!(c.value, FieldValue::Text("validate".into()));
        assert_eq!(c.op, Operator::Eq);

        let c = Criterion::new("timestamp", Operator::Ge, 1.5);
        assert_eq!(c.value, FieldValue::Float(1.5));
    }
}
