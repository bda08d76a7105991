//! Boolean filter expressions
//!
//! An [`Expression`] is either a [`Predicate`] over one `series.path` or a
//! [`Group`] joining children with AND/OR. Expressions are values: combining
//! them (`merge`, `&`, `|`) builds a new tree and leaves the inputs intact.
//!
//! ```ignore
//! let active = parse_filter("$user.active = true")?;
//! let named = parse_filter("$user.name ~ 'a%' | $user.name = :name")?;
//! let both = active & named;
//! ```

mod parser;

pub use parser::{parse_filter, parse_sort};

use core::ops::{BitAnd, BitOr};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tangle_types::{Path, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    /// Pattern match (`~`).
    #[serde(rename = "~")]
    Like,
    #[serde(rename = "!~")]
    NotLike,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "!in")]
    NotIn,
}

impl Operator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "~",
            Operator::NotLike => "!~",
            Operator::In => "in",
            Operator::NotIn => "!in",
        }
    }

    /// `in` and `!in` compare against a list.
    pub const fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Joiner {
    #[default]
    And,
    Or,
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Named placeholder (`:name`) bound by the connector.
    Param { param: CompactString },
    Value(Value),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub series: CompactString,
    pub path: Path,
    pub operation: Operator,
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Group {
    pub join: Joiner,
    pub expressables: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expression {
    Group(Group),
    Predicate(Predicate),
}

impl Default for Expression {
    /// The empty AND group, which matches everything.
    fn default() -> Self {
        Expression::Group(Group::default())
    }
}

impl Expression {
    pub fn compare(
        series: impl Into<CompactString>,
        path: impl Into<Path>,
        operation: Operator,
        value: Operand,
    ) -> Self {
        Expression::Predicate(Predicate {
            series: series.into(),
            path: path.into(),
            operation,
            value,
        })
    }

    /// Predicate against a literal value.
    pub fn predicate(
        series: impl Into<CompactString>,
        path: impl Into<Path>,
        operation: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self::compare(series, path, operation, Operand::Value(value.into()))
    }

    /// Predicate against a named placeholder.
    pub fn param(
        series: impl Into<CompactString>,
        path: impl Into<Path>,
        operation: Operator,
        name: impl Into<CompactString>,
    ) -> Self {
        Self::compare(series, path, operation, Operand::Param { param: name.into() })
    }

    pub fn and<I: IntoIterator<Item = Expression>>(children: I) -> Self {
        Self::group(Joiner::And, children)
    }

    pub fn or<I: IntoIterator<Item = Expression>>(children: I) -> Self {
        Self::group(Joiner::Or, children)
    }

    /// Builds a group, inlining children that are groups with the same joiner
    /// and dropping empty groups.
    pub fn group<I: IntoIterator<Item = Expression>>(join: Joiner, children: I) -> Self {
        let mut expressables = Vec::new();
        for child in children {
            match child {
                Expression::Group(group) if group.expressables.is_empty() => {}
                Expression::Group(group) if group.join == join => {
                    expressables.extend(group.expressables);
                }
                other => expressables.push(other),
            }
        }
        Expression::Group(Group { join, expressables })
    }

    /// AND of `self` and `other`.
    pub fn merge(&self, other: &Expression) -> Expression {
        Self::and([self.clone(), other.clone()])
    }

    /// True for a group without children.
    pub fn is_empty(&self) -> bool {
        matches!(self, Expression::Group(g) if g.expressables.is_empty())
    }

    /// Every predicate in the tree, depth first.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expression::Predicate(p) => out.push(p),
                Expression::Group(g) => stack.extend(g.expressables.iter().rev()),
            }
        }
        out
    }

    /// Rewrites every predicate's series through `rename`.
    pub fn map_series<F: Fn(&str) -> CompactString>(&self, rename: &F) -> Expression {
        match self {
            Expression::Predicate(p) => Expression::Predicate(Predicate {
                series: rename(&p.series),
                ..p.clone()
            }),
            Expression::Group(g) => Expression::Group(Group {
                join: g.join,
                expressables: g.expressables.iter().map(|e| e.map_series(rename)).collect(),
            }),
        }
    }
}

impl BitAnd for Expression {
    type Output = Expression;

    fn bitand(self, rhs: Self) -> Self::Output {
        Expression::and([self, rhs])
    }
}

impl BitOr for Expression {
    type Output = Expression;

    fn bitor(self, rhs: Self) -> Self::Output {
        Expression::or([self, rhs])
    }
}

/// One sort key: `[-]$series.path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub series: CompactString,
    pub path: Path,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub descending: bool,
}
