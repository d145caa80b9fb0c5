//! Annotated copies of nodes.
//!
//! An annotated node behaves like its source for every operation except
//! instance identity: it has the same kind and payload, hashes and compares
//! equal to the source, and carries an out-of-band [`Annotations`] map. The
//! wrapper shape is produced once per [`KindTag`] and kept in a process-wide
//! registry.

use crate::node::{Element, KindTag, Node, NodeId, NodeKind, same_children};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

/// Marks columns of the `excluded` pseudo-table of an upsert.
pub const UPSERT_EXCLUDED: &str = "upsert_excluded";
/// Stops [`replacement_traverse`](crate::node::replacement_traverse) from descending.
pub const NO_REPLACEMENT_TRAVERSE: &str = "no_replacement_traverse";
/// Ranks set-operation branch columns in correspondence lookups; lower wins.
pub const WEIGHT: &str = "weight";

/// A small annotation value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl AnnotationValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AnnotationValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        AnnotationValue::Bool(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        AnnotationValue::Int(v)
    }
}

impl From<i32> for AnnotationValue {
    fn from(v: i32) -> Self {
        AnnotationValue::Int(v.into())
    }
}

impl From<usize> for AnnotationValue {
    fn from(v: usize) -> Self {
        AnnotationValue::Int(v as i64)
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        AnnotationValue::Str(v.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        AnnotationValue::Str(v)
    }
}

/// Order-irrelevant map of annotation keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, AnnotationValue>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AnnotationValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AnnotationValue> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnnotationValue)> {
        self.0.iter()
    }

    /// `self` updated with every entry of `other`.
    pub fn union(&self, other: &Annotations) -> Annotations {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }
}

/// The wrapper shape shared by every annotated node of one kind.
#[derive(Debug)]
pub struct AnnotatedShape {
    base: KindTag,
    name: String,
}

impl AnnotatedShape {
    pub fn base(&self) -> KindTag {
        self.base
    }

    /// `Annotated` followed by the base kind name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Annotation state held by an annotated node.
#[derive(Debug, Clone)]
pub(crate) struct Annotation {
    pub(crate) shape: Arc<AnnotatedShape>,
    /// The non-annotated node this copy was made from.
    pub(crate) source: Element,
    pub(crate) values: Annotations,
}

type ShapeRegistry = RwLock<HashMap<KindTag, Arc<AnnotatedShape>>>;

fn shape_registry() -> &'static ShapeRegistry {
    static REGISTRY: OnceLock<ShapeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The annotated shape for `tag`, creating and registering it on first use.
pub fn annotated_shape(tag: KindTag) -> Arc<AnnotatedShape> {
    let registry = shape_registry();
    if let Some(shape) = registry
        .read()
        .expect("annotation registry poisoned")
        .get(&tag)
    {
        return shape.clone();
    }
    let mut shapes = registry.write().expect("annotation registry poisoned");
    shapes
        .entry(tag)
        .or_insert_with(|| {
            tracing::trace!(target: "sqltree", kind = tag.name(), "registered annotated shape");
            Arc::new(AnnotatedShape {
                base: tag,
                name: format!("Annotated{}", tag.name()),
            })
        })
        .clone()
}

/// Kinds that currently have a registered annotated shape.
pub fn registered_shapes() -> Vec<KindTag> {
    let mut tags: Vec<KindTag> = shape_registry()
        .read()
        .expect("annotation registry poisoned")
        .keys()
        .copied()
        .collect();
    tags.sort();
    tags
}

impl Element {
    /// Wrap `source` (never itself annotated) with `kind` as payload.
    pub(crate) fn wrap_annotated(source: &Element, kind: NodeKind, values: Annotations) -> Element {
        debug_assert!(source.0.annotation.is_none());
        Element::from_node(Node {
            id: NodeId::next(),
            hash_key: source.0.hash_key,
            kind,
            clone_of: source.0.clone_of.clone(),
            annotation: Some(Annotation {
                shape: annotated_shape(source.tag()),
                source: source.clone(),
                values,
            }),
            memo: Default::default(),
        })
    }

    pub fn is_annotated(&self) -> bool {
        self.0.annotation.is_some()
    }

    /// The annotation map; empty for non-annotated nodes.
    pub fn annotations(&self) -> Annotations {
        self.0
            .annotation
            .as_ref()
            .map(|a| a.values.clone())
            .unwrap_or_default()
    }

    /// A single annotation value.
    pub fn annotation(&self, key: &str) -> Option<&AnnotationValue> {
        self.0.annotation.as_ref().and_then(|a| a.values.get(key))
    }

    /// The non-annotated node this one wraps, or `self`.
    pub fn annotation_source(&self) -> &Element {
        match &self.0.annotation {
            Some(a) => &a.source,
            None => self,
        }
    }

    /// Copy of `self` carrying `values` merged over any existing annotations.
    pub fn annotate(&self, values: Annotations) -> Element {
        match &self.0.annotation {
            Some(a) => Element::wrap_annotated(&a.source, self.kind().clone(), a.values.union(&values)),
            None => Element::wrap_annotated(self, self.kind().clone(), values),
        }
    }

    /// Copy of `self` carrying exactly `values`.
    pub fn with_annotations(&self, values: Annotations) -> Element {
        let source = self.annotation_source();
        Element::wrap_annotated(source, self.kind().clone(), values)
    }

    /// Strip annotations: all of them with `None`, or only `keys`.
    ///
    /// Stripping everything returns the original source node.
    pub fn deannotate(&self, keys: Option<&[&str]>) -> Element {
        let Some(annotation) = &self.0.annotation else {
            return self.clone();
        };
        match keys {
            None => annotation.source.clone(),
            Some(keys) => {
                let mut remaining = annotation.values.clone();
                for k in keys {
                    remaining.remove(k);
                }
                if remaining.is_empty() {
                    annotation.source.clone()
                } else {
                    self.with_annotations(remaining)
                }
            }
        }
    }
}

/// Rebuild `elem` around `kind`, keeping its lineage and annotations.
fn rebuild(elem: &Element, kind: NodeKind) -> Element {
    if same_children(elem.kind(), &kind) {
        elem.clone()
    } else {
        elem.derive(kind)
    }
}

/// Annotate `element` and every node below it with `values`.
///
/// Nodes whose proxy set intersects `exclude` are cloned but not annotated, so
/// a nested selectable can be left unmarked. Shared subtrees are processed once.
pub fn deep_annotate(element: &Element, values: &Annotations, exclude: &[Element]) -> Element {
    let exclude: HashSet<Element> = exclude.iter().cloned().collect();
    let mut memo: HashMap<NodeId, Element> = HashMap::new();
    deep_annotate_inner(element, values, &exclude, &mut memo)
}

fn deep_annotate_inner(
    elem: &Element,
    values: &Annotations,
    exclude: &HashSet<Element>,
    memo: &mut HashMap<NodeId, Element>,
) -> Element {
    if let Some(done) = memo.get(&elem.id()) {
        return done.clone();
    }
    let kind = {
        let mut clone = |child: &Element| deep_annotate_inner(child, values, exclude, memo);
        elem.kind().copy_internals(&mut clone)
    };
    let excluded = !exclude.is_empty() && elem.proxy_set().iter().any(|p| exclude.contains(p));
    let result = if excluded {
        if elem.tag().is_immutable() {
            elem.clone()
        } else {
            elem.derive(kind)
        }
    } else if elem.annotations() != *values {
        let merged = elem.annotations().union(values);
        Element::wrap_annotated(elem.annotation_source(), kind, merged)
    } else {
        rebuild(elem, kind)
    };
    memo.insert(elem.id(), result.clone());
    result
}

/// Strip annotations from `element` and every node below it.
pub fn deep_deannotate(element: &Element, keys: Option<&[&str]>) -> Element {
    let mut memo: HashMap<NodeId, Element> = HashMap::new();
    deep_deannotate_inner(element, keys, &mut memo)
}

fn deep_deannotate_inner(
    elem: &Element,
    keys: Option<&[&str]>,
    memo: &mut HashMap<NodeId, Element>,
) -> Element {
    if let Some(done) = memo.get(&elem.id()) {
        return done.clone();
    }
    let kind = {
        let mut clone = |child: &Element| deep_deannotate_inner(child, keys, memo);
        elem.kind().copy_internals(&mut clone)
    };
    let stripped = elem.deannotate(keys);
    let result = if stripped.is_annotated() {
        Element::wrap_annotated(stripped.annotation_source(), kind, stripped.annotations())
    } else {
        rebuild(&stripped, kind)
    };
    memo.insert(elem.id(), result.clone());
    result
}
