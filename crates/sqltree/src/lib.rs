//! # sqltree
//!
//! In-memory SQL statement trees: the construction and structural-resolution
//! layer of a SQL toolkit. Rendering to a real dialect is somebody else's job;
//! this crate builds the tree, keeps track of where every node came from and
//! infers what can be inferred.
//!
//! ## Features
//!
//! - **Generative builders**: every builder call returns a new statement; the receiver is never touched
//! - **Annotations**: context-marked copies that hash and compare like the original node
//! - **Lineage**: clone ancestry and column proxy chains recognize derived copies of one entity
//! - **Correspondence**: find the column of an alias or subquery that stands for a given column
//! - **Join inference**: ON clauses derived from declared foreign keys, with ambiguity detection
//! - **Anonymous labels**: identity-keyed templates resolved once per rendering
//!
//! ## Example
//!
//! ```
//! use sqltree::{ColumnDef, FromClause, SqlType, Table, select};
//!
//! let users = Table::build("users")
//!     .column(ColumnDef::new("id", SqlType::Integer).primary_key())
//!     .column(ColumnDef::new("name", SqlType::String))
//!     .finish()
//!     .unwrap();
//! let addresses = Table::build("addresses")
//!     .column(ColumnDef::new("id", SqlType::Integer).primary_key())
//!     .column(ColumnDef::new("user_id", SqlType::Integer).references(&users.c("id").unwrap()))
//!     .finish()
//!     .unwrap();
//!
//! let j = users.join(&addresses, None).unwrap();
//! let s = select([users.c("name").unwrap()]).select_from(&j).unwrap();
//! assert_eq!(
//!     s.to_string(),
//!     "SELECT users.name FROM users JOIN addresses ON users.id = addresses.user_id"
//! );
//! ```

pub mod annotation;
pub mod collection;
pub mod config;
pub mod error;
pub mod expression;
pub mod generative;
pub mod join_condition;
pub mod labels;
pub mod lineage;
pub mod node;
pub mod render;
pub mod schema;
pub mod selectable;
pub mod statement;
pub mod types;

pub use annotation::{
    AnnotatedShape, AnnotationValue, Annotations, NO_REPLACEMENT_TRAVERSE, UPSERT_EXCLUDED, WEIGHT,
    deep_annotate, deep_deannotate,
};
pub use collection::ColumnCollection;
pub use config::CompileConfig;
pub use error::{NoForeignKeysReason, SqlError, SqlResult};
pub use expression::{
    Operand, and_, asc, bindparam, cast, column, count, desc, distinct, false_, func, label,
    literal, literal_column, not_, null, or_, text, true_, tuple_, typed_func,
};
pub use generative::Generative;
pub use join_condition::{JoinResolver, can_join, resolve_join};
pub use labels::{AnonLabel, LabelName, LabelResolver};
pub use lineage::expand_cloned;
pub use node::{
    Element, KindTag, NodeId, NodeKind, Operator, Visitors, cloned_traverse, deep_clone,
    find_columns, find_tables, iterate, replacement_traverse, traverse,
};
pub use render::{Renderer, to_sql};
pub use schema::{ColumnDef, ForeignKey, ForeignKeyConstraint, MetaData, Table, TableBuilder};
pub use selectable::{
    Alias, ClauseAdapter, CompoundKeyword, CompoundSelect, FromClause, Join,
    correspond_on_equivalents, exists, reduce_columns,
};
pub use statement::{
    Delete, Excluded, Insert, OnConflict, Select, Update, ValueTarget, delete, insert, select,
    update,
};
pub use types::{SqlType, Value};
