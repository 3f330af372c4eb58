//! Accumulated query state

use crate::{Row, WhereClause};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub column: String,
    pub ascending: bool,
}

/// Predicates, ordering, pagination and projection gathered by a query
/// builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub wheres: Vec<WhereClause>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub order: Vec<OrderTerm>,
    pub columns: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_where(&mut self, clause: WhereClause) {
        self.wheres.push(clause);
    }

    pub fn push_order(&mut self, column: impl Into<String>, ascending: bool) {
        self.order.push(OrderTerm {
            column: column.into(),
            ascending,
        });
    }

    /// Union the projection with `columns`, keeping first-seen order.
    pub fn add_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Every column the options refer to, projection excluded.
    pub fn referenced_columns(&self) -> impl Iterator<Item = &str> {
        self.wheres
            .iter()
            .map(|w| w.column())
            .chain(self.order.iter().map(|o| o.column.as_str()))
    }

    /// Sort by the order terms left to right, then by `rowid` ascending.
    pub fn sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| self.compare_rows(a, b));
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for term in &self.order {
            let left = a.get(&term.column).unwrap_or(crate::Value::Null);
            let right = b.get(&term.column).unwrap_or(crate::Value::Null);
            let ordering = left.sort_cmp(&right);
            let ordering = if term.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.rowid.cmp(&b.rowid)
    }

    /// Apply skip then take to already ordered rows.
    pub fn paginate(&self, rows: Vec<Row>) -> Vec<Row> {
        let skip = self.skip.unwrap_or(0);
        let take = self.take.unwrap_or(usize::MAX);
        rows.into_iter().skip(skip).take(take).collect()
    }

    /// Number of rows a page covers out of `total` matches.
    pub fn page_len(&self, total: usize) -> usize {
        let remaining = total.saturating_sub(self.skip.unwrap_or(0));
        self.take.map_or(remaining, |take| remaining.min(take))
    }
}
