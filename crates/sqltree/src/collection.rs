//! Ordered, keyed column collections and correspondence lookup.

use crate::annotation::WEIGHT;
use crate::lineage::expand_cloned;
use crate::node::{Element, NodeKind};
use std::collections::{HashMap, HashSet};

/// Ordered map from key to column.
///
/// Every added column stays in iteration order; when two columns share a key,
/// lookup by key finds the first one.
#[derive(Debug, Clone, Default)]
pub struct ColumnCollection {
    all: Vec<(String, Element)>,
    by_key: HashMap<String, usize>,
    members: HashMap<Element, usize>,
}

impl ColumnCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column` under its own key.
    pub fn add(&mut self, column: Element) {
        let key = column.column_key();
        self.add_keyed(key, column);
    }

    /// Add `column` under `key`.
    pub fn add_keyed(&mut self, key: impl Into<String>, column: Element) {
        let key = key.into();
        let idx = self.all.len();
        self.by_key.entry(key.clone()).or_insert(idx);
        self.members.entry(column.clone()).or_insert(idx);
        self.all.push((key, column));
    }

    pub fn get(&self, key: &str) -> Option<&Element> {
        self.by_key.get(key).map(|&i| &self.all[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// `true` when `column` (or an annotated copy of it) is a member.
    pub fn contains_column(&self, column: &Element) -> bool {
        self.members.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Columns in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.all.iter().map(|(_, c)| c)
    }

    /// `(key, column)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.all.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.all.iter().map(|(k, _)| k.as_str())
    }

    /// Column at `index` in insertion order.
    pub fn at(&self, index: usize) -> Option<&Element> {
        self.all.get(index).map(|(_, c)| c)
    }

    /// The member of this collection that represents `target`.
    ///
    /// A direct member is returned as stored. Otherwise the member whose
    /// (clone-expanded) proxy set overlaps the target's proxy set the most is
    /// chosen; ties go to the member closer to the target's root column, where
    /// set-operation branch columns weigh their `weight` annotation, then to a
    /// member with the target's key, then to the earliest member.
    ///
    /// A key match is only consulted after overlap and lineage distance, so a
    /// differently named member one proxy away beats a same-named member two
    /// proxies away.
    ///
    /// With `require_embedded`, every proxy of the target must be found inside
    /// the candidate's derivation, so sibling aliases of one table never match.
    pub fn corresponding_column(&self, target: &Element, require_embedded: bool) -> Option<Element> {
        if let Some(&idx) = self.members.get(target) {
            return Some(self.all[idx].1.clone());
        }
        let target_set = target.proxy_set();
        let target_key = target.column_key();

        let mut best: Option<(&Element, HashSet<Element>)> = None;
        for (_, candidate) in &self.all {
            let expanded = expand_cloned(candidate.proxy_set().iter());
            let shared: HashSet<Element> = target_set.intersection(&expanded).cloned().collect();
            if shared.is_empty() {
                continue;
            }
            if require_embedded && !embedded(&expanded, &target_set) {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((_, intersect)) if shared.len() > intersect.len() => true,
                Some((current, intersect)) if shared == *intersect => {
                    let current_distance = lineage_distance(current, target);
                    let distance = lineage_distance(candidate, target);
                    distance < current_distance
                        || (distance == current_distance
                            && candidate.column_key() == target_key
                            && current.column_key() != target_key)
                }
                Some(_) => false,
            };
            if replace {
                best = Some((candidate, shared));
            }
        }
        match best {
            Some((column, _)) => Some(column.clone()),
            None => {
                tracing::trace!(target: "sqltree", column = %target_key, "no corresponding column");
                None
            }
        }
    }
}

/// Every target proxy missing from `expanded` must at least share a clone
/// ancestor with it.
fn embedded(expanded: &HashSet<Element>, target_set: &HashSet<Element>) -> bool {
    target_set
        .iter()
        .filter(|t| !expanded.contains(*t))
        .all(|t| t.clone_chain().iter().any(|n| expanded.contains(n)))
}

/// Sum of weights of the candidate's proxies related to `target`.
fn lineage_distance(candidate: &Element, target: &Element) -> i64 {
    candidate
        .proxy_set()
        .iter()
        .filter(|p| p.shares_lineage(target))
        .map(|p| p.annotation(WEIGHT).and_then(|w| w.as_int()).unwrap_or(1))
        .sum()
}

impl Element {
    /// Key under which this element is collected: a column's key, a plain
    /// label's name, or the unresolved label template otherwise.
    pub fn column_key(&self) -> String {
        match self.kind() {
            NodeKind::Column(c) => c.key.clone(),
            NodeKind::Label(l) => l.name.to_string(),
            _ => self.anon_label().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotations;
    use crate::expression::column;
    use crate::labels::LabelName;
    use crate::schema::{ColumnDef, Table};
    use crate::selectable::FromClause;
    use crate::types::SqlType;

    fn users() -> Table {
        Table::build("users")
            .column(ColumnDef::new("id", SqlType::Integer).primary_key())
            .column(ColumnDef::new("name", SqlType::String))
            .finish()
            .unwrap()
    }

    #[test]
    fn test_keyed_lookup_and_order() {
        let mut cc = ColumnCollection::new();
        let a = column("a", SqlType::Integer);
        let b = column("b", SqlType::Integer);
        cc.add(a.clone());
        cc.add(b.clone());
        assert_eq!(cc.len(), 2);
        assert_eq!(cc.get("b"), Some(&b));
        assert_eq!(cc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(cc.contains_column(&a));
        assert!(cc.contains_column(&a.annotate(Annotations::new().with("x", 1))));
    }

    #[test]
    fn test_duplicate_key_keeps_first_for_lookup() {
        let mut cc = ColumnCollection::new();
        let a1 = column("a", SqlType::Integer);
        let a2 = column("a", SqlType::String);
        cc.add(a1.clone());
        cc.add(a2.clone());
        assert_eq!(cc.len(), 2);
        assert!(cc.get("a").unwrap().same_instance(&a1));
    }

    #[test]
    fn test_direct_member_fast_path() {
        let t = users();
        let id = t.c("id").unwrap();
        let found = t.columns().corresponding_column(&id, false).unwrap();
        assert!(found.same_instance(&id));

        let annotated = id.annotate(Annotations::new().with("x", true));
        let found = t.columns().corresponding_column(&annotated, false).unwrap();
        assert!(found.same_instance(&id));
    }

    #[test]
    fn test_alias_column_corresponds_to_table_column() {
        let t = users();
        let a = t.alias(Some("u"));
        let table_id = t.c("id").unwrap();
        let alias_id = a.c("id").unwrap();
        assert_eq!(a.corresponding_column(&table_id, false), Some(alias_id.clone()));
        assert_eq!(t.corresponding_column(&alias_id, false), Some(table_id));
    }

    #[test]
    fn test_require_embedded_rejects_sibling_alias() {
        let t = users();
        let a1 = t.alias(Some("a1"));
        let a2 = t.alias(Some("a2"));
        let a1_id = a1.c("id").unwrap();
        assert!(a2.corresponding_column(&a1_id, false).is_some());
        assert!(a2.corresponding_column(&a1_id, true).is_none());
    }

    #[test]
    fn test_nested_alias_prefers_larger_overlap() {
        let t = users();
        let inner = t.alias(Some("inner_u"));
        let outer = inner.alias(Some("outer_u"));
        let found = outer.corresponding_column(&inner.c("name").unwrap(), true).unwrap();
        assert!(found.same_instance(&outer.c("name").unwrap()));
    }

    #[test]
    fn test_tie_break_distance_then_key() {
        let t = users();
        let id = t.c("id").unwrap();
        let owner = LabelName::Plain("sq".to_string());
        let proxy = |of: &Element, key: &str| {
            of.make_proxy(t.element(), &owner, key.to_string(), key.to_string())
        };

        let far_same_key = proxy(&proxy(&id, "mid"), "id");
        let near_other_key = proxy(&id, "other");
        let mut cc = ColumnCollection::new();
        cc.add(far_same_key.clone());
        cc.add(near_other_key.clone());
        let found = cc.corresponding_column(&id, false).unwrap();
        assert!(found.same_instance(&near_other_key));

        let first = proxy(&id, "first");
        let keyed = proxy(&id, "id");
        let mut cc = ColumnCollection::new();
        cc.add(first.clone());
        cc.add(keyed.clone());
        let found = cc.corresponding_column(&id, false).unwrap();
        assert!(found.same_instance(&keyed));
    }

    #[test]
    fn test_unrelated_column_has_no_match() {
        let t = users();
        let other = column("id", SqlType::Integer);
        assert!(t.corresponding_column(&other, false).is_none());
    }
}
