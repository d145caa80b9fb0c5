//! Foreign-key driven ON-clause inference.
//!
//! Given two FROM entities, [`resolve_join`] scans the foreign keys of each
//! side for keys that reference a column of the other, groups the resulting
//! column pairs by owning constraint and turns the single surviving constraint
//! into an equality predicate (an `AND` of equalities for composite keys).
//!
//! When the left side is itself a join, its right-most member can be passed as
//! `left_subset`. It is scanned first and wins when it matches, so
//! `a.join(b).join(c)` joins `c` to `b` when `c` only references `b`.

use crate::error::{NoForeignKeysReason, SqlError, SqlResult};
use crate::expression::and_;
use crate::node::{Element, NodeKind};
use crate::schema::{ForeignKey, ForeignKeyConstraint};
use std::sync::Arc;

/// Column pairs contributed by one constraint, oriented `(left side, right side)`.
#[derive(Debug, Clone)]
struct ConstraintPairs {
    constraint: Arc<ForeignKeyConstraint>,
    pairs: Vec<(Element, Element)>,
    parents: Vec<Element>,
}

/// Builder for one join-condition resolution.
///
/// ```
/// use sqltree::{ColumnDef, FromClause, JoinResolver, SqlType, Table};
///
/// let b = Table::build("b")
///     .column(ColumnDef::new("id", SqlType::Integer).primary_key())
///     .finish()
///     .unwrap();
/// let a = Table::build("a")
///     .column(ColumnDef::new("b_id", SqlType::Integer).references(&b.c("id").unwrap()))
///     .finish()
///     .unwrap();
/// let on = JoinResolver::new(a.element(), b.element()).resolve().unwrap();
/// assert_eq!(on.to_string(), "a.b_id = b.id");
/// ```
#[derive(Debug, Clone)]
pub struct JoinResolver<'a> {
    left: &'a Element,
    right: &'a Element,
    left_subset: Option<&'a Element>,
    consider_only: &'a [Element],
    secondary: Option<&'a Element>,
}

impl<'a> JoinResolver<'a> {
    pub fn new(left: &'a Element, right: &'a Element) -> Self {
        Self {
            left,
            right,
            left_subset: None,
            consider_only: &[],
            secondary: None,
        }
    }

    /// Narrower part of `left` scanned first, typically a join's right member.
    pub fn left_subset(mut self, subset: &'a Element) -> Self {
        self.left_subset = Some(subset);
        self
    }

    /// Only foreign keys whose referencing columns are exactly these count.
    pub fn consider_only(mut self, columns: &'a [Element]) -> Self {
        self.consider_only = columns;
        self
    }

    /// Association table named in ambiguity errors.
    pub fn secondary(mut self, secondary: &'a Element) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Build the ON clause.
    pub fn resolve(&self) -> SqlResult<Element> {
        let mut constraints = self.scan();
        if constraints.len() > 1 {
            constraints = self.trim(constraints)?;
        }
        let Some(found) = constraints.into_iter().next() else {
            return Err(self.no_foreign_keys());
        };
        let mut criteria: Vec<Element> = found.pairs.iter().map(|(l, r)| l.eq(r)).collect();
        let onclause = if criteria.len() == 1 {
            criteria.remove(0)
        } else {
            and_(criteria)
        };
        tracing::debug!(
            target: "sqltree",
            left = %self.left.description(),
            right = %self.right.description(),
            constraint = ?found.constraint.name(),
            pairs = found.pairs.len(),
            "resolved join condition"
        );
        Ok(onclause)
    }

    /// `true` when exactly one constraint links the two sides.
    pub fn can_join(&self) -> bool {
        let constraints = self.scan();
        match constraints.len() {
            0 => false,
            1 => true,
            _ => self.trim(constraints).is_ok(),
        }
    }

    fn considered(&self, fk: &ForeignKey) -> bool {
        self.consider_only.is_empty() || self.consider_only.iter().any(|c| fk.parent.proxies_to(c))
    }

    fn scan(&self) -> Vec<ConstraintPairs> {
        let mut constraints: Vec<ConstraintPairs> = Vec::new();
        for side in [self.left_subset, Some(self.left)].into_iter().flatten() {
            for fk in self.right.foreign_keys() {
                if !self.considered(fk) {
                    continue;
                }
                if let Some(col) = fk.get_referent(side) {
                    record(&mut constraints, fk, (col, fk.parent.clone()));
                }
            }
            if !side.same_instance(self.right) {
                for fk in side.foreign_keys() {
                    if !self.considered(fk) {
                        continue;
                    }
                    if let Some(col) = fk.get_referent(self.right) {
                        record(&mut constraints, fk, (fk.parent.clone(), col));
                    }
                }
            }
            if !constraints.is_empty() {
                break;
            }
        }
        constraints
    }

    fn trim(&self, mut constraints: Vec<ConstraintPairs>) -> SqlResult<Vec<ConstraintPairs>> {
        if !self.consider_only.is_empty() {
            constraints.retain(|c| {
                c.parents
                    .iter()
                    .all(|p| self.consider_only.iter().any(|k| p.proxies_to(k)))
                    && self
                        .consider_only
                        .iter()
                        .all(|k| c.parents.iter().any(|p| p.proxies_to(k)))
            });
        }
        if constraints.len() > 1 {
            let first = pair_set(&constraints[0]);
            if constraints.iter().skip(1).all(|c| pair_set(c) == first) {
                constraints.truncate(1);
            }
        }
        if constraints.len() != 1 {
            return Err(SqlError::AmbiguousForeignKeys {
                left: self.left.description(),
                right: self.right.description(),
                secondary: self.secondary.map(|s| s.description()),
            });
        }
        Ok(constraints)
    }

    fn no_foreign_keys(&self) -> SqlError {
        let declared = !self.right.foreign_keys().is_empty()
            || !self.left.foreign_keys().is_empty()
            || self.left_subset.is_some_and(|s| !s.foreign_keys().is_empty());
        let reason = if declared {
            NoForeignKeysReason::NoneLinking
        } else {
            NoForeignKeysReason::NoneDeclared
        };
        let hint = matches!(self.right.kind(), NodeKind::FromGrouping(_)).then(|| {
            "Perhaps you meant to convert the right side to a subquery using alias()?".to_string()
        });
        SqlError::NoForeignKeys {
            left: self.left.description(),
            right: self.right.description(),
            reason,
            hint,
        }
    }
}

fn record(constraints: &mut Vec<ConstraintPairs>, fk: &ForeignKey, pair: (Element, Element)) {
    match constraints.iter_mut().find(|c| c.constraint == fk.constraint) {
        Some(existing) => {
            existing.pairs.push(pair);
            existing.parents.push(fk.parent.clone());
        }
        None => constraints.push(ConstraintPairs {
            constraint: fk.constraint.clone(),
            pairs: vec![pair],
            parents: vec![fk.parent.clone()],
        }),
    }
}

/// Order-insensitive identity of a constraint's column pairs.
fn pair_set(c: &ConstraintPairs) -> Vec<(Element, Element)> {
    let mut pairs = c.pairs.clone();
    pairs.sort_by_key(|(l, r)| (l.identity(), r.identity()));
    pairs
}

/// Infer the ON clause joining `left` to `right` from foreign keys.
pub fn resolve_join(
    left: &Element,
    right: &Element,
    left_subset: Option<&Element>,
    consider_only: &[Element],
) -> SqlResult<Element> {
    let mut resolver = JoinResolver::new(left, right).consider_only(consider_only);
    if let Some(subset) = left_subset {
        resolver = resolver.left_subset(subset);
    }
    resolver.resolve()
}

/// Whether [`resolve_join`] would find exactly one linking constraint.
pub fn can_join(left: &Element, right: &Element, left_subset: Option<&Element>) -> bool {
    let mut resolver = JoinResolver::new(left, right);
    if let Some(subset) = left_subset {
        resolver = resolver.left_subset(subset);
    }
    resolver.can_join()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::schema::{ColumnDef, Table};
    use crate::selectable::FromClause;
    use crate::types::SqlType;

    fn b_table() -> Table {
        Table::build("b")
            .column(ColumnDef::new("id", SqlType::Integer).primary_key())
            .finish()
            .unwrap()
    }

    fn binary_sides(e: &Element) -> (Element, Element) {
        match e.kind() {
            NodeKind::Binary(b) => (b.left.clone(), b.right.clone()),
            other => panic!("expected binary, got {:?}", other.tag()),
        }
    }

    #[test]
    fn test_single_fk_oriented_left_first() {
        let b = b_table();
        let a = Table::build("a")
            .column(ColumnDef::new("b_id", SqlType::Integer).references(&b.c("id").unwrap()))
            .finish()
            .unwrap();
        let on = resolve_join(a.element(), b.element(), None, &[]).unwrap();
        let (l, r) = binary_sides(&on);
        assert!(l.same_instance(&a.c("b_id").unwrap()));
        assert!(r.same_instance(&b.c("id").unwrap()));

        let reverse = resolve_join(b.element(), a.element(), None, &[]).unwrap();
        let (l, r) = binary_sides(&reverse);
        assert!(l.same_instance(&b.c("id").unwrap()));
        assert!(r.same_instance(&a.c("b_id").unwrap()));
    }

    #[test]
    fn test_two_fks_ambiguous_then_filtered() {
        let b = b_table();
        let a = Table::build("a")
            .column(ColumnDef::new("b1_id", SqlType::Integer).references(&b.c("id").unwrap()))
            .column(ColumnDef::new("b2_id", SqlType::Integer).references(&b.c("id").unwrap()))
            .finish()
            .unwrap();
        let err = resolve_join(a.element(), b.element(), None, &[]).unwrap_err();
        assert!(err.is_ambiguous_foreign_keys());
        assert!(!can_join(a.element(), b.element(), None));

        let consider = [a.c("b1_id").unwrap()];
        let on = resolve_join(a.element(), b.element(), None, &consider).unwrap();
        let (l, r) = binary_sides(&on);
        assert!(l.same_instance(&a.c("b1_id").unwrap()));
        assert!(r.same_instance(&b.c("id").unwrap()));
    }

    #[test]
    fn test_no_foreign_keys_reasons() {
        let b = b_table();
        let c = Table::build("c")
            .column(ColumnDef::new("id", SqlType::Integer))
            .finish()
            .unwrap();
        match resolve_join(b.element(), c.element(), None, &[]) {
            Err(SqlError::NoForeignKeys { reason, hint, .. }) => {
                assert_eq!(reason, NoForeignKeysReason::NoneDeclared);
                assert!(hint.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let d = Table::build("d")
            .column(ColumnDef::new("b_id", SqlType::Integer).references(&b.c("id").unwrap()))
            .finish()
            .unwrap();
        match resolve_join(c.element(), d.element(), None, &[]) {
            Err(SqlError::NoForeignKeys { reason, .. }) => {
                assert_eq!(reason, NoForeignKeysReason::NoneLinking)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!can_join(c.element(), d.element(), None));
    }

    #[test]
    fn test_composite_key_and_of_equalities() {
        let parent = Table::build("parent")
            .column(ColumnDef::new("a", SqlType::Integer).primary_key())
            .column(ColumnDef::new("b", SqlType::Integer).primary_key())
            .finish()
            .unwrap();
        let child = Table::build("child")
            .column(ColumnDef::new("pa", SqlType::Integer))
            .column(ColumnDef::new("pb", SqlType::Integer))
            .foreign_key(&["pa", "pb"], &[parent.c("a").unwrap(), parent.c("b").unwrap()])
            .finish()
            .unwrap();
        let on = resolve_join(child.element(), parent.element(), None, &[]).unwrap();
        match on.kind() {
            NodeKind::ClauseList(list) => assert_eq!(list.clauses.len(), 2),
            other => panic!("expected clause list, got {:?}", other.tag()),
        }
    }

    #[test]
    fn test_left_subset_wins() {
        let a = Table::build("a")
            .column(ColumnDef::new("id", SqlType::Integer).primary_key())
            .finish()
            .unwrap();
        let b = Table::build("b")
            .column(ColumnDef::new("id", SqlType::Integer).primary_key())
            .column(ColumnDef::new("a_id", SqlType::Integer).references(&a.c("id").unwrap()))
            .finish()
            .unwrap();
        let c = Table::build("c")
            .column(ColumnDef::new("b_id", SqlType::Integer).references(&b.c("id").unwrap()))
            .column(ColumnDef::new("a_id", SqlType::Integer).references(&a.c("id").unwrap()))
            .finish()
            .unwrap();
        let ab = a.join(&b, None).unwrap();
        let err = resolve_join(ab.element(), c.element(), None, &[]).unwrap_err();
        assert!(err.is_ambiguous_foreign_keys());

        let on = resolve_join(ab.element(), c.element(), Some(b.element()), &[]).unwrap();
        let (l, r) = binary_sides(&on);
        assert!(l.same_instance(&b.c("id").unwrap()));
        assert!(r.same_instance(&c.c("b_id").unwrap()));
    }

    #[test]
    fn test_grouped_right_side_hint() {
        let b = b_table();
        let c = Table::build("c")
            .column(ColumnDef::new("id", SqlType::Integer))
            .finish()
            .unwrap();
        let j = b.join(&c, Some(b.c("id").unwrap().eq(&c.c("id").unwrap()))).unwrap();
        let grouped = j.element().self_group(None);
        let other = Table::build("other")
            .column(ColumnDef::new("x", SqlType::Integer))
            .finish()
            .unwrap();
        let err = resolve_join(other.element(), &grouped, None, &[]).unwrap_err();
        assert!(err.to_string().contains("alias()"));
    }

    #[test]
    fn test_alias_resolves_through_lineage() {
        let b = b_table();
        let a = Table::build("a")
            .column(ColumnDef::new("b_id", SqlType::Integer).references(&b.c("id").unwrap()))
            .finish()
            .unwrap();
        let b_alias = b.alias(Some("bb"));
        let on = resolve_join(a.element(), b_alias.element(), None, &[]).unwrap();
        let (l, r) = binary_sides(&on);
        assert!(l.same_instance(&a.c("b_id").unwrap()));
        assert!(r.same_instance(&b_alias.c("id").unwrap()));
    }
}
