//! Clone ancestry and column proxy chains.
//!
//! Two mechanisms let independently derived copies of one logical entity be
//! recognized as equivalent:
//!
//! - clone ancestry: every shallow clone points back at the node it was copied
//!   from, and the *cloned set* of a node is that chain including the node;
//! - proxy chains: a column surfaced through an alias, subquery or set
//!   operation lists the column(s) it was generated from, and its *proxy set*
//!   is the transitive closure including itself.

use crate::node::{Element, Node, NodeId, NodeKind};
use std::collections::HashSet;
use std::sync::Arc;

impl Element {
    /// Shallow structural copy: same children, same kind, fresh identity and a
    /// back-pointer to `self`. Tables and columns are returned as-is.
    pub fn clone_node(&self) -> Element {
        if self.tag().is_immutable() {
            return self.clone();
        }
        self.derive(self.kind().clone())
    }

    /// Build a node of the same lineage as `self` with a new payload.
    ///
    /// Annotated nodes stay annotated with the same values.
    pub(crate) fn derive(&self, kind: NodeKind) -> Element {
        if let Some(annotation) = &self.0.annotation {
            let base = annotation.source.derive(kind.clone());
            return Element::wrap_annotated(&base, kind, annotation.values.clone());
        }
        let id = NodeId::next();
        Element::from_node(Node {
            id,
            hash_key: id,
            kind,
            clone_of: Some(self.clone()),
            annotation: None,
            memo: Default::default(),
        })
    }

    /// The node this one was cloned from, if any.
    pub fn clone_of(&self) -> Option<&Element> {
        self.0.clone_of.as_ref()
    }

    /// Ancestry chain starting with `self`.
    pub fn clone_chain(&self) -> Vec<Element> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone_of();
        while let Some(node) = current {
            chain.push(node.clone());
            current = node.clone_of();
        }
        chain
    }

    /// `self` plus every node it was (transitively) cloned from.
    pub fn cloned_set(&self) -> HashSet<Element> {
        self.clone_chain().into_iter().collect()
    }

    /// `true` when the two nodes share any clone ancestor, in either direction.
    pub fn shares_clone_lineage(&self, other: &Element) -> bool {
        let mine = self.cloned_set();
        other.clone_chain().iter().any(|n| mine.contains(n))
    }

    /// Immediate sources this column-like node was generated from.
    pub fn proxies(&self) -> &[Element] {
        match self.kind() {
            NodeKind::Column(c) => &c.proxies,
            NodeKind::Label(l) => std::slice::from_ref(&l.element),
            _ => &[],
        }
    }

    fn proxy_ancestors(&self) -> &Arc<HashSet<Element>> {
        self.0.memo.proxies.get_or_init(|| {
            let mut set = HashSet::new();
            for proxy in self.proxies() {
                if !set.contains(proxy) {
                    set.insert(proxy.clone());
                }
                for ancestor in proxy.proxy_ancestors().iter() {
                    if !set.contains(ancestor) {
                        set.insert(ancestor.clone());
                    }
                }
            }
            Arc::new(set)
        })
    }

    /// Transitive closure of proxies, always including `self`.
    pub fn proxy_set(&self) -> HashSet<Element> {
        let ancestors = self.proxy_ancestors();
        let mut set = HashSet::with_capacity(ancestors.len() + 1);
        set.insert(self.clone());
        for a in ancestors.iter() {
            if !set.contains(a) {
                set.insert(a.clone());
            }
        }
        set
    }

    /// `true` when `other` is `self` or one of its transitive proxies.
    pub fn proxies_to(&self, other: &Element) -> bool {
        self == other || self.proxy_ancestors().contains(other)
    }

    /// Proxy set members that proxy nothing further: the physical columns.
    pub fn base_columns(&self) -> HashSet<Element> {
        self.proxy_set()
            .into_iter()
            .filter(|c| c.proxies().is_empty())
            .collect()
    }

    /// `true` when the two nodes have a common proxy ancestor.
    pub fn shares_lineage(&self, other: &Element) -> bool {
        if self.proxies_to(other) || other.proxies_to(self) {
            return true;
        }
        let theirs = other.proxy_ancestors();
        self.proxy_ancestors().iter().any(|c| theirs.contains(c))
    }
}

/// Union of the cloned sets of every member.
pub fn expand_cloned<'a>(elements: impl IntoIterator<Item = &'a Element>) -> HashSet<Element> {
    let mut out = HashSet::new();
    for e in elements {
        for n in e.clone_chain() {
            if !out.contains(&n) {
                out.insert(n);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{column, literal};
    use crate::types::SqlType;

    #[test]
    fn test_clone_points_back() {
        let expr = column("x", SqlType::Integer).eq(literal(5));
        let c = expr.clone_node();
        assert_ne!(c, expr);
        assert!(c.clone_of().unwrap().same_instance(&expr));
        assert!(c.cloned_set().contains(&expr));
        assert!(c.shares_clone_lineage(&expr));
        assert!(expr.shares_clone_lineage(&c));
    }

    #[test]
    fn test_clone_chain_is_finite() {
        let expr = column("x", SqlType::Integer).eq(literal(5));
        let c3 = expr.clone_node().clone_node().clone_node();
        assert_eq!(c3.clone_chain().len(), 4);
        assert!(c3.clone_chain().last().unwrap().same_instance(&expr));
    }

    #[test]
    fn test_columns_are_immutable_under_clone() {
        let col = column("x", SqlType::Integer);
        assert!(col.clone_node().same_instance(&col));
    }

    #[test]
    fn test_siblings_share_lineage_through_source() {
        let expr = column("x", SqlType::Integer).eq(literal(5));
        let a = expr.clone_node();
        let b = expr.clone_node();
        assert!(a.shares_clone_lineage(&b));
        let expanded = expand_cloned([&a, &b]);
        assert_eq!(expanded.len(), 3);
    }

    #[test]
    fn test_proxy_set_includes_self() {
        let col = column("x", SqlType::Integer);
        let set = col.proxy_set();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&col));
        assert!(col.base_columns().contains(&col));
    }
}
