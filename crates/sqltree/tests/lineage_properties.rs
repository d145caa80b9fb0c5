use sqltree::{
    Annotations, ColumnDef, Element, FromClause, NO_REPLACEMENT_TRAVERSE, SqlType, Table, and_,
    count, deep_annotate, deep_clone, deep_deannotate, expand_cloned, iterate, literal, select,
};
use std::collections::HashSet;

fn users() -> Table {
    Table::build("users")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("name", SqlType::String))
        .finish()
        .unwrap()
}

fn criteria(t: &Table) -> Element {
    and_([
        t.c("id").unwrap().eq(5),
        t.c("name").unwrap().like("j%"),
    ])
}

#[test]
fn test_deep_annotate_keeps_identity_and_rendering() {
    let t = users();
    let expr = criteria(&t);
    let marked = deep_annotate(&expr, &Annotations::new().with("entity", "user"), &[]);

    assert_eq!(marked, expr);
    assert!(!marked.same_instance(&expr));
    assert!(iterate(&marked).all(|e| e.annotation("entity").is_some()));
    assert_eq!(marked.to_string(), expr.to_string());

    let mut set = HashSet::new();
    set.insert(expr.clone());
    assert!(set.contains(&marked));

    let stripped = deep_deannotate(&marked, None);
    assert!(iterate(&stripped).all(|e| !e.is_annotated()));
    assert!(stripped.same_instance(&expr));
}

#[test]
fn test_deep_clone_preserves_structure() {
    let t = users();
    let expr = criteria(&t);
    let copy = deep_clone(&expr);

    assert_ne!(copy, expr);
    assert_eq!(copy.clone_of(), Some(&expr));
    assert_eq!(copy.to_string(), "users.id = :id_1 AND users.name LIKE :name_1");
    let original: Vec<_> = iterate(&expr).map(|e| e.tag()).collect();
    let cloned: Vec<_> = iterate(&copy).map(|e| e.tag()).collect();
    assert_eq!(original, cloned);
    // columns are shared, everything else is fresh
    for (a, b) in iterate(&expr).zip(iterate(&copy)) {
        assert_eq!(a.is_column(), a.same_instance(&b));
    }
}

#[test]
fn test_generative_chain_lineage() {
    let t = users();
    let s1 = select([t.c("id").unwrap()]);
    let s2 = s1.where_(t.c("id").unwrap().gt(1));
    let s3 = s2.limit(10);
    let unrelated = select([t.c("id").unwrap()]);

    assert_eq!(s3.element().clone_chain().len(), 3);
    assert!(s3.element().shares_clone_lineage(s1.element()));
    assert!(s1.element().shares_clone_lineage(s3.element()));
    assert!(!unrelated.element().shares_clone_lineage(s3.element()));
    assert!(expand_cloned([s3.element()]).contains(s1.element()));
}

#[test]
fn test_nested_alias_correspondence() {
    let t = users();
    let inner = t.alias(Some("u1"));
    let outer = inner.alias(Some("u2"));
    let id = t.c("id").unwrap();

    let found = outer.corresponding_column(&id, false).unwrap();
    assert_eq!(found, outer.c("id").unwrap());
    assert!(found.proxies_to(&id));
    assert!(found.proxies_to(&inner.c("id").unwrap()));
    assert_eq!(found.base_columns(), HashSet::from([id.clone()]));
    assert!(outer.is_derived_from(t.element()));
    assert!(!inner.is_derived_from(outer.element()));
}

#[test]
fn test_union_column_stands_for_every_branch() {
    let t = users();
    let other = Table::build("admins")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .finish()
        .unwrap();
    let u = select([t.c("id").unwrap()])
        .union(&select([other.c("id").unwrap()]))
        .unwrap();

    let from_users = u.corresponding_column(&t.c("id").unwrap(), false);
    let from_admins = u.corresponding_column(&other.c("id").unwrap(), false);
    assert_eq!(from_users, u.c("id").ok());
    assert_eq!(from_admins, u.c("id").ok());
}

#[test]
fn test_adapt_to_alias() {
    let t = users();
    let a = t.alias(Some("u"));
    let expr = t.c("id").unwrap().eq(5);
    let adapted = a.adapt(&expr);
    assert_eq!(adapted.to_string(), "u.id = :id_1");
    assert_eq!(expr.to_string(), "users.id = :id_1");

    let pinned = t
        .c("id")
        .unwrap()
        .annotate(Annotations::new().with(NO_REPLACEMENT_TRAVERSE, true))
        .eq(5);
    assert_eq!(a.adapt(&pinned).to_string(), "users.id = :id_1");
}

#[test]
fn test_anonymous_labels_numbered_per_pass() {
    let t = users();
    let id = t.c("id").unwrap();
    let s = select([id.label_anon(), id.label_anon()]);
    assert_eq!(s.to_string(), "SELECT users.id AS id_1, users.id AS id_2 FROM users");
    assert_eq!(s.to_string(), s.to_string());

    let sub = select([count(Some(&id))]).subquery(None);
    let total = sub.columns().at(0).cloned().unwrap();
    assert_eq!(
        select([total]).to_string(),
        "SELECT anon_1.count_1 FROM (SELECT count(users.id) AS count_1 FROM users) AS anon_1"
    );
}

#[test]
fn test_independently_built_statements_get_distinct_labels() {
    let t = users();
    let id = t.c("id").unwrap();
    let first = id.label_anon();
    let second = id.label_anon();

    let a = select([first.clone()]).order_by([first]);
    assert_eq!(a.to_string(), "SELECT users.id AS id_1 FROM users ORDER BY id_1");
    let b = select([second]);
    assert_eq!(b.to_string(), "SELECT users.id AS id_1 FROM users");

    let u = a.union(&b).unwrap();
    assert_eq!(
        u.to_string(),
        "SELECT users.id AS id_1 FROM users ORDER BY id_1 UNION SELECT users.id AS id_2 FROM users"
    );
}

#[test]
fn test_deeply_nested_expression_walks() {
    let t = users();
    let mut expr = t.c("id").unwrap();
    for i in 0..500i64 {
        expr = expr.add(literal(i));
    }
    let sql = expr.to_string();
    assert_eq!(sql.matches(" + ").count(), 500);
    assert!(sql.contains("users.id + "));

    let copy = deep_clone(&expr);
    assert_eq!(iterate(&copy).count(), iterate(&expr).count());
    assert_eq!(copy.to_string(), sql);

    let marked = deep_annotate(&expr, &Annotations::new().with("entity", "user"), &[]);
    assert_eq!(marked, expr);
    assert!(iterate(&marked).all(|e| e.annotation("entity").is_some()));
    assert_eq!(marked.to_string(), sql);

    let stripped = deep_deannotate(&marked, None);
    assert!(stripped.same_instance(&expr));

    let stmt = select([t.c("id").unwrap()]).where_(expr.gt(0));
    assert!(stmt.element().to_sql(&sqltree::CompileConfig::default()).is_ok());
}
