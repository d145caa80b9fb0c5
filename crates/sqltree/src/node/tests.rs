use super::*;
use crate::annotation::Annotations;
use crate::expression::{and_, column, literal, or_};
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
fn test_identity_equality() {
    let a = column("a", SqlType::Integer);
    let b = column("a", SqlType::Integer);
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
    assert!(a.same_instance(&a.clone()));
}

#[test]
fn test_node_ids_are_unique() {
    let a = literal(1);
    let b = literal(1);
    assert_ne!(a.id(), b.id());
    assert!(a.id() < b.id());
}

#[test]
fn test_children_in_traversal_order() {
    let t = users();
    let expr = t.c("id").unwrap().eq(5);
    let children = expr.children();
    assert_eq!(children.len(), 2);
    assert!(children[0].same_instance(&t.c("id").unwrap()));
    assert_eq!(children[1].tag(), KindTag::BindParam);
}

#[test]
fn test_tag_is_stable_under_annotation() {
    let c = column("a", SqlType::Integer);
    let annotated = c.annotate(Annotations::new().with("k", 1));
    assert_eq!(annotated.tag(), KindTag::Column);
    assert_eq!(annotated.type_name(), "AnnotatedColumn");
    assert_eq!(c.type_name(), "Column");
}

#[test]
fn test_kind_classification() {
    assert!(KindTag::Binary.is_column_element());
    assert!(!KindTag::Table.is_column_element());
    assert!(KindTag::Alias.is_from_clause());
    assert!(KindTag::Column.is_immutable());
    assert!(!KindTag::Select.is_immutable());
}

#[test]
fn test_self_group_wraps_lower_precedence() {
    let a = column("a", SqlType::Boolean);
    let b = column("b", SqlType::Boolean);
    let c = column("c", SqlType::Boolean);
    let either = or_([a.clone(), b.clone()]);
    let both = and_([either, c]);
    let NodeKind::ClauseList(list) = both.kind() else {
        panic!("expected clause list");
    };
    assert_eq!(list.clauses[0].tag(), KindTag::Grouping);
    assert_eq!(list.clauses[1].tag(), KindTag::Column);
}

#[test]
fn test_join_self_groups_to_from_grouping() {
    let t = users();
    let other = Table::build("other")
        .column(ColumnDef::new("id", SqlType::Integer))
        .finish()
        .unwrap();
    let j = t
        .join(&other, Some(t.c("id").unwrap().eq(&other.c("id").unwrap())))
        .unwrap();
    let grouped = j.element().self_group(None);
    assert_eq!(grouped.tag(), KindTag::FromGrouping);
    assert_eq!(grouped.columns().len(), j.columns().len());
}

#[test]
fn test_copy_internals_rebuilds_children() {
    let t = users();
    let expr = t.c("id").unwrap().add(1);
    let mut seen = Vec::new();
    let copied = expr.kind().copy_internals(&mut |child: &Element| {
        seen.push(child.clone());
        child.clone_node()
    });
    assert_eq!(seen.len(), 2);
    assert!(!same_children(expr.kind(), &copied));
    assert!(same_children(expr.kind(), expr.kind()));
}

#[test]
fn test_debug_names_column_and_parent() {
    let t = users();
    let rendered = format!("{:?}", t.c("name").unwrap());
    assert!(rendered.starts_with("Column#"));
    assert!(rendered.ends_with("(users.name)"));
}

#[test]
fn test_parent_ref_is_weak() {
    let col = {
        let t = users();
        t.c("id").unwrap()
    };
    assert!(col.as_column().unwrap().parent.is_some());
    assert!(col.column_parent().is_none());
}
