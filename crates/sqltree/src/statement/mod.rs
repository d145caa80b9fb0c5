//! SELECT, INSERT, UPDATE and DELETE constructs.
//!
//! Every builder method is generative: it returns a new statement whose clone
//! ancestry points at the receiver and leaves the receiver untouched. The
//! `append_*` methods mutate in place and only work on a statement nobody else
//! holds yet.
//!
//! ```
//! use sqltree::{ColumnDef, FromClause, SqlType, Table, select};
//!
//! let users = Table::build("users")
//!     .column(ColumnDef::new("id", SqlType::Integer).primary_key())
//!     .column(ColumnDef::new("name", SqlType::String))
//!     .finish()
//!     .unwrap();
//!
//! let base = select([users.c("id").unwrap()]);
//! let filtered = base.where_(users.c("name").unwrap().eq("jack"));
//! assert_eq!(base.to_string(), "SELECT users.id FROM users");
//! assert_eq!(
//!     filtered.to_string(),
//!     "SELECT users.id FROM users WHERE users.name = :name_1"
//! );
//! ```

mod delete;
mod insert;
mod select;
mod update;

pub use delete::{Delete, DeleteData};
pub use insert::{Excluded, Insert, InsertData, OnConflict, ValueTarget};
pub use select::{Select, SelectData};
pub(crate) use select::projection_label;
pub use update::{Update, UpdateData};

use crate::error::{SqlError, SqlResult};
use crate::expression::and_;
use crate::node::Element;
use std::collections::HashSet;

/// `SELECT columns...`; FROM objects are derived from the columns and criteria.
pub fn select(columns: impl IntoIterator<Item = Element>) -> Select {
    Select::new(columns)
}

/// `INSERT INTO table`.
pub fn insert(table: impl Into<Element>) -> Insert {
    Insert::new(table)
}

/// `UPDATE table`.
pub fn update(table: impl Into<Element>) -> Update {
    Update::new(table)
}

/// `DELETE FROM table`.
pub fn delete(table: impl Into<Element>) -> Delete {
    Delete::new(table)
}

/// FROM objects of `items`, de-duplicated by clone lineage, in first-seen order.
pub(crate) fn collect_froms<'a>(items: impl IntoIterator<Item = &'a Element>) -> Vec<Element> {
    let mut froms = Vec::new();
    let mut seen: HashSet<Element> = HashSet::new();
    for item in items {
        for from in item.from_objects() {
            let chain = from.clone_chain();
            if chain.iter().any(|c| seen.contains(c)) {
                continue;
            }
            seen.extend(chain);
            froms.push(from);
        }
    }
    froms
}

/// Fails when any of `items` uses a column whose table or alias was dropped,
/// since that column can no longer supply its FROM object.
pub(crate) fn check_attached<'a>(items: impl IntoIterator<Item = &'a Element>) -> SqlResult<()> {
    let detached = items.into_iter().flat_map(|e| e.detached_columns()).next();
    match detached {
        Some(col) => Err(SqlError::invalid_request(format!(
            "column '{}' belongs to a selectable that is no longer alive; keep the table or alias \
             referenced while statements use its columns",
            col.qualified_name()
        ))),
        None => Ok(()),
    }
}

/// `existing AND criterion`, or just `criterion`.
pub(crate) fn and_criteria(existing: Option<Element>, criterion: Element) -> Element {
    match existing {
        Some(w) => and_([w, criterion]),
        None => criterion,
    }
}

#[cfg(test)]
mod tests;
