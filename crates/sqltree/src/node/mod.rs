//! Node protocol: the tagged, immutable SQL expression tree.
//!
//! Every syntactic unit is an [`Element`], a cheap reference-counted handle to
//! an immutable [`Node`]. A node has a stable [`KindTag`], an ordered list of
//! children (see [`NodeKind::children`]) and a `copy_internals` operation that
//! rebuilds its children through a caller-supplied function; deep cloning,
//! deep annotation and replacement traversal are all built on it.
//!
//! Equality and hashing of elements are identity based: two separately built
//! nodes never compare equal, while an annotated copy compares and hashes like
//! the node it was made from. Use [`Element::same_instance`] for strict
//! instance identity.

mod operators;
mod visitors;

pub use operators::{Operator, is_precedent};
pub use visitors::{
    Visitors, cloned_traverse, deep_clone, find_columns, find_tables, iterate,
    replacement_traverse, traverse,
};

use crate::annotation::Annotation;
use crate::collection::ColumnCollection;
use crate::labels::LabelName;
use crate::schema::{ForeignKey, ForeignKeyTarget, TableData};
use crate::selectable::{AliasData, CompoundSelectData, JoinData};
use crate::statement::{DeleteData, InsertData, SelectData, UpdateData};
use crate::types::{SqlType, Value};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Transient runtime identity of a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Rebuild an identity read back from a rendered label template.
    pub(crate) fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }
}

/// Stable kind of a node; never changes after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KindTag {
    BindParam,
    Null,
    True,
    False,
    Text,
    Column,
    Label,
    Binary,
    Unary,
    ClauseList,
    Grouping,
    Function,
    Cast,
    Table,
    Alias,
    Join,
    FromGrouping,
    Select,
    CompoundSelect,
    ScalarSelect,
    Insert,
    Update,
    Delete,
}

impl KindTag {
    pub fn name(self) -> &'static str {
        match self {
            KindTag::BindParam => "BindParameter",
            KindTag::Null => "Null",
            KindTag::True => "True",
            KindTag::False => "False",
            KindTag::Text => "TextClause",
            KindTag::Column => "Column",
            KindTag::Label => "Label",
            KindTag::Binary => "BinaryExpression",
            KindTag::Unary => "UnaryExpression",
            KindTag::ClauseList => "ClauseList",
            KindTag::Grouping => "Grouping",
            KindTag::Function => "Function",
            KindTag::Cast => "Cast",
            KindTag::Table => "Table",
            KindTag::Alias => "Alias",
            KindTag::Join => "Join",
            KindTag::FromGrouping => "FromGrouping",
            KindTag::Select => "Select",
            KindTag::CompoundSelect => "CompoundSelect",
            KindTag::ScalarSelect => "ScalarSelect",
            KindTag::Insert => "Insert",
            KindTag::Update => "Update",
            KindTag::Delete => "Delete",
        }
    }

    /// Column expressions: usable in a projection or a predicate.
    pub fn is_column_element(self) -> bool {
        matches!(
            self,
            KindTag::BindParam
                | KindTag::Null
                | KindTag::True
                | KindTag::False
                | KindTag::Text
                | KindTag::Column
                | KindTag::Label
                | KindTag::Binary
                | KindTag::Unary
                | KindTag::ClauseList
                | KindTag::Grouping
                | KindTag::Function
                | KindTag::Cast
                | KindTag::ScalarSelect
        )
    }

    /// Table-like entities that expose a column collection.
    pub fn is_from_clause(self) -> bool {
        matches!(
            self,
            KindTag::Table
                | KindTag::Alias
                | KindTag::Join
                | KindTag::FromGrouping
                | KindTag::Select
                | KindTag::CompoundSelect
        )
    }

    /// Kinds that are returned as-is when cloned.
    pub fn is_immutable(self) -> bool {
        matches!(self, KindTag::Table | KindTag::Column)
    }
}

/// Weak back-reference from a surfaced column to the selectable owning it.
///
/// The selectable owns its columns; the column only looks its parent up.
#[derive(Clone)]
pub struct ParentRef {
    id: NodeId,
    name: LabelName,
    node: Weak<Node>,
}

impl ParentRef {
    pub(crate) fn new(id: NodeId, name: LabelName, node: Weak<Node>) -> Self {
        Self { id, name, node }
    }

    /// Identity of the parent node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &LabelName {
        &self.name
    }

    /// The parent element, if it is still alive.
    pub fn upgrade(&self) -> Option<Element> {
        self.node.upgrade().map(Element)
    }

    /// `false` once the last strong handle to the parent is gone.
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

impl fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentRef")
            .field("id", &self.id.get())
            .field("name", &self.name.description())
            .finish()
    }
}

/// A bound parameter.
#[derive(Debug, Clone)]
pub struct BindParamData {
    pub key: LabelName,
    pub value: Option<Value>,
    pub type_: SqlType,
}

/// A column of a table, alias, subquery or free-standing column clause.
#[derive(Debug, Clone)]
pub struct ColumnData {
    pub name: String,
    pub key: String,
    pub type_: SqlType,
    pub parent: Option<ParentRef>,
    /// Immediate source columns this column was surfaced from.
    pub proxies: Vec<Element>,
    pub primary_key: bool,
    pub nullable: bool,
    pub foreign_keys: Vec<ForeignKeyTarget>,
    /// Render the name verbatim instead of as an identifier.
    pub is_literal: bool,
}

impl ColumnData {
    pub fn new(name: impl Into<String>, type_: SqlType) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            type_,
            parent: None,
            proxies: Vec::new(),
            primary_key: false,
            nullable: true,
            foreign_keys: Vec::new(),
            is_literal: false,
        }
    }
}

/// `element AS name`.
#[derive(Debug, Clone)]
pub struct LabelData {
    pub name: LabelName,
    pub element: Element,
    pub type_: SqlType,
}

/// `left <op> right`.
#[derive(Debug, Clone)]
pub struct BinaryData {
    pub left: Element,
    pub right: Element,
    pub operator: Operator,
    pub negate: Option<Operator>,
    pub type_: SqlType,
}

/// `<op> element` or `element <modifier>`.
#[derive(Debug, Clone)]
pub struct UnaryData {
    pub element: Element,
    pub operator: Option<Operator>,
    pub modifier: Option<Operator>,
    pub type_: SqlType,
}

/// A list of clauses joined by one operator (`AND`, `OR`, `,`).
#[derive(Debug, Clone)]
pub struct ClauseListData {
    pub operator: Operator,
    pub clauses: Vec<Element>,
    /// May be wrapped in a grouping when embedded.
    pub group: bool,
    /// Always rendered inside parentheses (tuples).
    pub parenthesized: bool,
}

/// `name(args...)`.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub args: Vec<Element>,
    pub type_: SqlType,
}

/// `CAST(element AS type)`.
#[derive(Debug, Clone)]
pub struct CastData {
    pub element: Element,
    pub type_: SqlType,
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    BindParam(BindParamData),
    Null,
    True,
    False,
    Text(String),
    Column(ColumnData),
    Label(LabelData),
    Binary(BinaryData),
    Unary(UnaryData),
    ClauseList(ClauseListData),
    Grouping(Element),
    Function(FunctionData),
    Cast(CastData),
    Table(TableData),
    Alias(AliasData),
    Join(JoinData),
    FromGrouping(Element),
    Select(SelectData),
    CompoundSelect(CompoundSelectData),
    ScalarSelect(Element),
    Insert(InsertData),
    Update(UpdateData),
    Delete(DeleteData),
}

/// Function used by [`NodeKind::copy_internals`] to produce each new child.
pub type CloneFn<'a> = dyn FnMut(&Element) -> Element + 'a;

impl NodeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            NodeKind::BindParam(_) => KindTag::BindParam,
            NodeKind::Null => KindTag::Null,
            NodeKind::True => KindTag::True,
            NodeKind::False => KindTag::False,
            NodeKind::Text(_) => KindTag::Text,
            NodeKind::Column(_) => KindTag::Column,
            NodeKind::Label(_) => KindTag::Label,
            NodeKind::Binary(_) => KindTag::Binary,
            NodeKind::Unary(_) => KindTag::Unary,
            NodeKind::ClauseList(_) => KindTag::ClauseList,
            NodeKind::Grouping(_) => KindTag::Grouping,
            NodeKind::Function(_) => KindTag::Function,
            NodeKind::Cast(_) => KindTag::Cast,
            NodeKind::Table(_) => KindTag::Table,
            NodeKind::Alias(_) => KindTag::Alias,
            NodeKind::Join(_) => KindTag::Join,
            NodeKind::FromGrouping(_) => KindTag::FromGrouping,
            NodeKind::Select(_) => KindTag::Select,
            NodeKind::CompoundSelect(_) => KindTag::CompoundSelect,
            NodeKind::ScalarSelect(_) => KindTag::ScalarSelect,
            NodeKind::Insert(_) => KindTag::Insert,
            NodeKind::Update(_) => KindTag::Update,
            NodeKind::Delete(_) => KindTag::Delete,
        }
    }

    /// Owned children in traversal order.
    pub fn children(&self) -> Vec<&Element> {
        match self {
            NodeKind::BindParam(_)
            | NodeKind::Null
            | NodeKind::True
            | NodeKind::False
            | NodeKind::Text(_)
            | NodeKind::Column(_)
            | NodeKind::Table(_) => Vec::new(),
            NodeKind::Label(l) => vec![&l.element],
            NodeKind::Binary(b) => vec![&b.left, &b.right],
            NodeKind::Unary(u) => vec![&u.element],
            NodeKind::ClauseList(c) => c.clauses.iter().collect(),
            NodeKind::Grouping(e) | NodeKind::FromGrouping(e) | NodeKind::ScalarSelect(e) => {
                vec![e]
            }
            NodeKind::Function(f) => f.args.iter().collect(),
            NodeKind::Cast(c) => vec![&c.element],
            NodeKind::Alias(a) => a.children(),
            NodeKind::Join(j) => j.children(),
            NodeKind::Select(s) => s.children(),
            NodeKind::CompoundSelect(c) => c.children(),
            NodeKind::Insert(i) => i.children(),
            NodeKind::Update(u) => u.children(),
            NodeKind::Delete(d) => d.children(),
        }
    }

    /// A copy of this payload whose children were produced by `clone`.
    pub fn copy_internals(&self, clone: &mut CloneFn<'_>) -> NodeKind {
        match self {
            NodeKind::BindParam(_)
            | NodeKind::Null
            | NodeKind::True
            | NodeKind::False
            | NodeKind::Text(_)
            | NodeKind::Column(_)
            | NodeKind::Table(_) => self.clone(),
            NodeKind::Label(l) => NodeKind::Label(LabelData {
                name: l.name.clone(),
                element: clone(&l.element),
                type_: l.type_,
            }),
            NodeKind::Binary(b) => NodeKind::Binary(BinaryData {
                left: clone(&b.left),
                right: clone(&b.right),
                operator: b.operator,
                negate: b.negate,
                type_: b.type_,
            }),
            NodeKind::Unary(u) => NodeKind::Unary(UnaryData {
                element: clone(&u.element),
                operator: u.operator,
                modifier: u.modifier,
                type_: u.type_,
            }),
            NodeKind::ClauseList(c) => NodeKind::ClauseList(ClauseListData {
                operator: c.operator,
                clauses: c.clauses.iter().map(|e| clone(e)).collect(),
                group: c.group,
                parenthesized: c.parenthesized,
            }),
            NodeKind::Grouping(e) => NodeKind::Grouping(clone(e)),
            NodeKind::FromGrouping(e) => NodeKind::FromGrouping(clone(e)),
            NodeKind::ScalarSelect(e) => NodeKind::ScalarSelect(clone(e)),
            NodeKind::Function(f) => NodeKind::Function(FunctionData {
                name: f.name.clone(),
                args: f.args.iter().map(|e| clone(e)).collect(),
                type_: f.type_,
            }),
            NodeKind::Cast(c) => NodeKind::Cast(CastData {
                element: clone(&c.element),
                type_: c.type_,
            }),
            NodeKind::Alias(a) => NodeKind::Alias(a.copy_internals(clone)),
            NodeKind::Join(j) => NodeKind::Join(j.copy_internals(clone)),
            NodeKind::Select(s) => NodeKind::Select(s.copy_internals(clone)),
            NodeKind::CompoundSelect(c) => NodeKind::CompoundSelect(c.copy_internals(clone)),
            NodeKind::Insert(i) => NodeKind::Insert(i.copy_internals(clone)),
            NodeKind::Update(u) => NodeKind::Update(u.copy_internals(clone)),
            NodeKind::Delete(d) => NodeKind::Delete(d.copy_internals(clone)),
        }
    }
}

/// `true` when both payloads hold the very same child instances.
pub(crate) fn same_children(old: &NodeKind, new: &NodeKind) -> bool {
    let (a, b) = (old.children(), new.children());
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_instance(y))
}

/// Lazily derived collections; never copied into clones.
#[derive(Default)]
pub(crate) struct Memo {
    /// Transitive proxies, excluding the node itself.
    pub(crate) proxies: OnceLock<Arc<HashSet<Element>>>,
    pub(crate) columns: OnceLock<ColumnCollection>,
    pub(crate) foreign_keys: OnceLock<Vec<ForeignKey>>,
}

/// One immutable tree node. Reached through [`Element`].
pub struct Node {
    pub(crate) id: NodeId,
    /// Identity used for hashing and equality; snapshot of the source for annotated copies.
    pub(crate) hash_key: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) clone_of: Option<Element>,
    pub(crate) annotation: Option<Annotation>,
    pub(crate) memo: Memo,
}

/// Shared handle to a node.
#[derive(Clone)]
pub struct Element(pub(crate) Arc<Node>);

impl Element {
    pub(crate) fn from_kind(kind: NodeKind) -> Self {
        Self::from_kind_with_id(NodeId::next(), kind)
    }

    pub(crate) fn from_kind_with_id(id: NodeId, kind: NodeKind) -> Self {
        Element(Arc::new(Node {
            id,
            hash_key: id,
            kind,
            clone_of: None,
            annotation: None,
            memo: Memo::default(),
        }))
    }

    /// Build a node whose payload holds weak references back to the node itself.
    pub(crate) fn from_kind_cyclic(
        id: NodeId,
        build: impl FnOnce(&Weak<Node>) -> NodeKind,
    ) -> Self {
        Element(Arc::new_cyclic(|weak| Node {
            id,
            hash_key: id,
            kind: build(weak),
            clone_of: None,
            annotation: None,
            memo: Memo::default(),
        }))
    }

    pub(crate) fn from_node(node: Node) -> Self {
        Element(Arc::new(node))
    }

    /// Instance identity of this node.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Identity used by `Eq`/`Hash`; shared between a node and its annotated copies.
    pub fn identity(&self) -> NodeId {
        self.0.hash_key
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn tag(&self) -> KindTag {
        self.0.kind.tag()
    }

    /// Name of the node's shape, e.g. `Column` or `AnnotatedColumn`.
    pub fn type_name(&self) -> &str {
        match &self.0.annotation {
            Some(a) => a.shape.name(),
            None => self.tag().name(),
        }
    }

    /// Strict instance identity; distinguishes an annotated copy from its source.
    pub fn same_instance(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn children(&self) -> Vec<&Element> {
        self.0.kind.children()
    }

    pub(crate) fn downgrade(&self) -> Weak<Node> {
        Arc::downgrade(&self.0)
    }

    /// Column payload, if this is a column.
    pub fn as_column(&self) -> Option<&ColumnData> {
        match &self.0.kind {
            NodeKind::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_column(&self) -> bool {
        matches!(self.0.kind, NodeKind::Column(_))
    }

    /// Wrap this node in a grouping when it is about to be embedded inside an
    /// expression built with `against` and would otherwise bind too loosely.
    pub fn self_group(&self, against: Option<Operator>) -> Element {
        match &self.0.kind {
            NodeKind::Binary(b) => match against {
                Some(a) if is_precedent(b.operator, a) => Element::grouping(self),
                _ => self.clone(),
            },
            NodeKind::ClauseList(c) => match against {
                Some(a) if c.group && !c.clauses.is_empty() && is_precedent(c.operator, a) => {
                    Element::grouping(self)
                }
                _ => self.clone(),
            },
            NodeKind::Unary(u) => match (u.operator, against) {
                (Some(op), Some(a)) if is_precedent(op, a) => Element::grouping(self),
                _ => self.clone(),
            },
            NodeKind::Join(_) => Element::from_kind(NodeKind::FromGrouping(self.clone())),
            _ => self.clone(),
        }
    }

    pub(crate) fn grouping(inner: &Element) -> Element {
        Element::from_kind(NodeKind::Grouping(inner.clone()))
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash_key == other.0.hash_key
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_key.hash(state);
    }
}

impl From<&Element> for Element {
    fn from(e: &Element) -> Self {
        e.clone()
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name(), self.id().get())?;
        match &self.0.kind {
            NodeKind::Column(c) => match &c.parent {
                Some(p) => write!(f, "({}.{})", p.name().description(), c.name),
                None => write!(f, "({})", c.name),
            },
            NodeKind::Table(t) => write!(f, "({})", t.name),
            NodeKind::Alias(a) => write!(f, "({})", a.name.description()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
