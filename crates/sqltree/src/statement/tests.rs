//! Unit tests for the statement builders.

use crate::annotation::{Annotations, UPSERT_EXCLUDED, deep_annotate, deep_deannotate};
use crate::config::CompileConfig;
use crate::expression::{count, desc};
use crate::generative::Generative;
use crate::node::{Element, KindTag, iterate};
use crate::schema::{ColumnDef, Table};
use crate::selectable::FromClause;
use crate::statement::{delete, insert, select, update};
use crate::types::SqlType;

fn users() -> Table {
    Table::build("users")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("name", SqlType::String))
        .finish()
        .unwrap()
}

fn addresses(users: &Table) -> Table {
    Table::build("addresses")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("user_id", SqlType::Integer).references(&users.c("id").unwrap()))
        .column(ColumnDef::new("email", SqlType::String))
        .finish()
        .unwrap()
}

#[test]
fn test_select_basic() {
    let t = users();
    let s = select([t.c("id").unwrap(), t.c("name").unwrap()]);
    assert_eq!(s.to_string(), "SELECT users.id, users.name FROM users");
}

#[test]
fn test_builders_leave_receiver_untouched() {
    let t = users();
    let base = select([t.c("id").unwrap()]);
    let before = base.to_string();
    let filtered = base.where_(t.c("id").unwrap().gt(3)).order_by([desc(&t.c("id").unwrap())]);
    assert_eq!(base.to_string(), before);
    assert!(base.where_clause().is_none());
    assert!(filtered.where_clause().is_some());
    let grandparent = filtered.element().clone_of().and_then(|c| c.clone_of());
    assert!(grandparent.is_some_and(|g| g.same_instance(base.element())));
    assert_eq!(
        filtered.to_string(),
        "SELECT users.id FROM users WHERE users.id > :id_1 ORDER BY users.id DESC"
    );
}

#[test]
fn test_where_criteria_are_anded() {
    let t = users();
    let s = select([t.c("id").unwrap()])
        .where_(t.c("id").unwrap().gt(1))
        .where_(t.c("name").unwrap().like("j%"));
    assert_eq!(
        s.to_string(),
        "SELECT users.id FROM users WHERE users.id > :id_1 AND users.name LIKE :name_1"
    );
}

#[test]
fn test_froms_deduplicated_and_hidden_by_join() {
    let u = users();
    let a = addresses(&u);
    let s = select([u.c("name").unwrap(), a.c("email").unwrap()]);
    assert_eq!(s.froms(&[]).unwrap().len(), 2);

    let j = u.join(&a, None).unwrap();
    let joined = s.select_from(&j).unwrap();
    let froms = joined.froms(&[]).unwrap();
    assert_eq!(froms.len(), 1);
    assert!(froms[0].same_instance(j.element()));
}

#[test]
fn test_select_join_extends_last_from() {
    let u = users();
    let a = addresses(&u);
    let s = select([u.c("name").unwrap()]).join(&a, None).unwrap();
    assert_eq!(
        s.to_string(),
        "SELECT users.name FROM users JOIN addresses ON users.id = addresses.user_id"
    );
}

#[test]
fn test_select_from_self_is_invalid() {
    let t = users();
    let s = select([t.c("id").unwrap()]);
    let err = s.select_from(&s).unwrap_err();
    assert!(err.is_invalid_request());

    let derived = s.where_(t.c("id").unwrap().eq(1));
    assert!(derived.select_from(&s).unwrap_err().is_invalid_request());
}

#[test]
fn test_subquery_columns_proxy_projection() {
    let t = users();
    let s = select([t.c("id").unwrap(), t.c("name").unwrap().label("n")]);
    let sub = s.subquery(Some("sq"));
    let n = sub.c("n").unwrap();
    assert!(n.base_columns().contains(&t.c("name").unwrap()));
    assert_eq!(sub.corresponding_column(&t.c("id").unwrap(), false), sub.c("id").ok());
    let outer = select([n]);
    assert_eq!(
        outer.to_string(),
        "SELECT sq.n FROM (SELECT users.id, users.name AS n FROM users) AS sq"
    );
}

#[test]
fn test_filter_by_uses_last_from() {
    let t = users();
    let s = select([t.c("id").unwrap()]).filter_by([("name", "jack")]).unwrap();
    assert_eq!(s.to_string(), "SELECT users.id FROM users WHERE users.name = :name_1");
    let err = select([t.c("id").unwrap()]).filter_by([("missing", 1)]).unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn test_union_and_scalar_helpers() {
    let t = users();
    let s1 = select([t.c("id").unwrap()]).where_(t.c("id").unwrap().lt(5));
    let s2 = select([t.c("id").unwrap()]).where_(t.c("id").unwrap().gt(10));
    let u = s1.union(&s2).unwrap();
    assert_eq!(
        u.to_string(),
        "SELECT users.id FROM users WHERE users.id < :id_1 UNION SELECT users.id FROM users WHERE users.id > :id_2"
    );
    assert_eq!(s1.as_scalar().tag(), KindTag::ScalarSelect);
    assert_eq!(s1.exists().type_(), SqlType::Boolean);
    assert_eq!(s1.label("x").tag(), KindTag::Label);
}

#[test]
fn test_group_by_having_limit() {
    let t = users();
    let n = count(Some(&t.c("id").unwrap())).label("n");
    let s = select([t.c("name").unwrap(), n.clone()])
        .group_by([t.c("name").unwrap()])
        .having(count(Some(&t.c("id").unwrap())).gt(1))
        .order_by([n.desc()])
        .limit(10)
        .offset(5)
        .distinct();
    assert_eq!(
        s.to_string(),
        "SELECT DISTINCT users.name, count(users.id) AS n FROM users GROUP BY users.name HAVING count(users.id) > :count_1 ORDER BY n DESC LIMIT :param_1 OFFSET :param_2"
    );
}

#[test]
fn test_in_place_append_requires_unique_owner() {
    let t = users();
    let mut s = select([t.c("id").unwrap()]);
    s.append_whereclause(t.c("id").unwrap().eq(1)).unwrap();
    s.append_column(t.c("name").unwrap()).unwrap();
    assert_eq!(s.raw_columns().len(), 2);

    let held = s.clone();
    let err = s.append_column(t.c("id").unwrap()).unwrap_err();
    assert!(err.is_invalid_request());
    drop(held);

    let _ = s.columns();
    assert!(s.append_order_by([t.c("id").unwrap()]).is_err());
}

#[test]
fn test_insert_values_and_errors() {
    let t = users();
    let i = insert(&t).values([("id", 1)]).unwrap();
    let i = i.values([(t.c("name").unwrap(), "jack")]).unwrap();
    assert_eq!(i.to_string(), "INSERT INTO users (id, name) VALUES (:id_1, :name_1)");

    let err = insert(&t).values([("nope", 1)]).unwrap_err();
    assert!(err.is_argument());

    let s = select([t.c("id").unwrap(), t.c("name").unwrap()]);
    let from_select = insert(&t).from_select(&["id", "name"], &s).unwrap();
    assert_eq!(
        from_select.to_string(),
        "INSERT INTO users (id, name) SELECT users.id, users.name FROM users"
    );
    assert!(from_select.values([("id", 1)]).unwrap_err().is_argument());
    assert!(i.from_select(&["id", "name"], &s).unwrap_err().is_argument());
}

#[test]
fn test_insert_on_conflict() {
    let t = users();
    let i = insert(&t).values([("id", 1)]).unwrap().values([("name", "jack")]).unwrap();
    let nothing = i.on_conflict_do_nothing([t.c("id").unwrap()]);
    assert_eq!(
        nothing.to_string(),
        "INSERT INTO users (id, name) VALUES (:id_1, :name_1) ON CONFLICT (id) DO NOTHING"
    );

    let excluded = i.excluded();
    let name = excluded.c("name").unwrap();
    assert!(name.annotation(UPSERT_EXCLUDED).is_some());
    let upsert = i
        .on_conflict_do_update([t.c("id").unwrap()], [("name", name)], None)
        .unwrap()
        .returning([t.c("id").unwrap()]);
    assert_eq!(
        upsert.to_string(),
        "INSERT INTO users (id, name) VALUES (:id_1, :name_1) ON CONFLICT (id) DO UPDATE SET name = excluded.name RETURNING users.id"
    );
}

#[test]
fn test_deep_annotate_reaches_value_targets() {
    let t = users();
    let name = insert(&t).excluded().c("name").unwrap();
    let upsert = insert(&t)
        .values([("id", 1)])
        .unwrap()
        .on_conflict_do_update([t.c("id").unwrap()], [("name", name)], None)
        .unwrap();
    let change = update(&t).values([("name", "jack")]).unwrap();

    let values = Annotations::new().with("entity", "user");
    for stmt in [upsert.element(), change.element()] {
        let marked = deep_annotate(stmt, &values, &[]);
        assert_eq!(iterate(&marked).count(), iterate(stmt).count());
        assert!(iterate(&marked).all(|e| e.annotation("entity").is_some()));
        assert_eq!(marked.to_string(), stmt.to_string());

        let stripped = deep_deannotate(&marked, Some(&["entity"][..]));
        assert!(iterate(&stripped).all(|e| e.annotation("entity").is_none()));
    }
}

#[test]
fn test_update_extra_froms() {
    let u = users();
    let a = addresses(&u);
    let stmt = update(&u)
        .values([("name", a.c("email").unwrap())])
        .unwrap()
        .where_(a.c("user_id").unwrap().eq(&u.c("id").unwrap()));
    assert_eq!(stmt.extra_froms().len(), 1);
    assert!(stmt.extra_froms()[0].same_instance(a.element()));
    assert_eq!(
        stmt.to_string(),
        "UPDATE users SET name = addresses.email FROM addresses WHERE addresses.user_id = users.id"
    );
}

#[test]
fn test_columns_of_dropped_selectable_are_reported() {
    let id = users().c("id").unwrap();
    let stmt = select([id.clone()]).where_(id.eq(5));
    let err = stmt.froms(&[]).unwrap_err();
    assert!(err.is_invalid_request());
    assert!(err.to_string().contains("'users.id'"));
    assert!(stmt.element().to_sql(&CompileConfig::default()).unwrap_err().is_invalid_request());

    let t = users();
    let aliased = t.alias(Some("u")).c("id").unwrap();
    let err = select([aliased]).froms(&[]).unwrap_err();
    assert!(err.to_string().contains("'u.id'"));

    let u = users();
    let email = addresses(&u).c("email").unwrap();
    let stmt = update(&u).values([("name", email)]).unwrap();
    assert!(stmt.check_froms().unwrap_err().is_invalid_request());
    assert!(stmt.element().to_sql(&CompileConfig::default()).is_err());
}

#[test]
fn test_statement_keeps_implicit_froms_alive() {
    let stmt = {
        let t = users();
        select([t.c("id").unwrap()]).where_(t.c("name").unwrap().eq("jack"))
    };
    assert_eq!(stmt.froms(&[]).unwrap().len(), 1);
    assert_eq!(
        stmt.element().to_sql(&CompileConfig::default()).unwrap(),
        "SELECT users.id FROM users WHERE users.name = :name_1"
    );
}

#[test]
fn test_delete_generative_and_in_place() {
    let t = users();
    let d = delete(&t);
    let filtered = d.where_(t.c("id").unwrap().eq(1));
    assert_eq!(d.to_string(), "DELETE FROM users");
    assert_eq!(filtered.to_string(), "DELETE FROM users WHERE users.id = :id_1");

    let mut owned = delete(&t);
    owned.append_whereclause(t.c("id").unwrap().eq(2)).unwrap();
    assert_eq!(owned.to_string(), "DELETE FROM users WHERE users.id = :id_1");
}

#[test]
fn test_statement_deep_clone_is_independent() {
    let t = users();
    let s = select([t.c("id").unwrap()]).where_(t.c("id").unwrap().eq(1));
    let copy: Element = crate::node::deep_clone(s.element());
    assert_ne!(copy, *s.element());
    assert!(copy.shares_clone_lineage(s.element()));
    assert_eq!(copy.to_string(), s.to_string());
}
