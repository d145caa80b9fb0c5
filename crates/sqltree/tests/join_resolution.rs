use sqltree::{
    ColumnDef, FromClause, JoinResolver, NoForeignKeysReason, SqlError, SqlType, Table, can_join,
    resolve_join, select,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Shop {
    users: Table,
    orders: Table,
    items: Table,
}

fn shop() -> Shop {
    let users = Table::build("users")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("name", SqlType::String))
        .finish()
        .unwrap();
    let orders = Table::build("orders")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("user_id", SqlType::Integer).references(&users.c("id").unwrap()))
        .finish()
        .unwrap();
    let items = Table::build("items")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("order_id", SqlType::Integer).references(&orders.c("id").unwrap()))
        .finish()
        .unwrap();
    Shop {
        users,
        orders,
        items,
    }
}

#[test]
fn test_join_chain_uses_nearest_member() {
    init_tracing();
    let s = shop();
    let j = s.users.join(&s.orders, None).unwrap().join(&s.items, None).unwrap();
    assert_eq!(
        j.to_string(),
        "users JOIN orders ON users.id = orders.user_id JOIN items ON orders.id = items.order_id"
    );
}

#[test]
fn test_condition_oriented_by_join_side() {
    let s = shop();
    let forward = resolve_join(s.users.element(), s.orders.element(), None, &[]).unwrap();
    let backward = resolve_join(s.orders.element(), s.users.element(), None, &[]).unwrap();
    assert_eq!(forward.to_string(), "users.id = orders.user_id");
    assert_eq!(backward.to_string(), "orders.user_id = users.id");
    assert!(can_join(s.users.element(), s.orders.element(), None));
    assert!(can_join(s.orders.element(), s.users.element(), None));
}

#[test]
fn test_outer_join_keywords() {
    let s = shop();
    let left = s.users.outerjoin(&s.orders, None).unwrap();
    let full = s.users.full_outer_join(&s.orders, None).unwrap();
    assert_eq!(
        left.to_string(),
        "users LEFT OUTER JOIN orders ON users.id = orders.user_id"
    );
    assert_eq!(
        full.to_string(),
        "users FULL OUTER JOIN orders ON users.id = orders.user_id"
    );
    assert!(left.is_outer() && !left.is_full());
    assert!(full.is_outer() && full.is_full());
}

#[test]
fn test_ambiguous_constraints_need_narrowing() {
    init_tracing();
    let s = shop();
    let transfers = Table::build("transfers")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .column(ColumnDef::new("sender_id", SqlType::Integer).references(&s.users.c("id").unwrap()))
        .column(ColumnDef::new("receiver_id", SqlType::Integer).references(&s.users.c("id").unwrap()))
        .finish()
        .unwrap();

    let err = s.users.join(&transfers, None).unwrap_err();
    assert!(err.is_ambiguous_foreign_keys());
    assert!(
        err.to_string()
            .starts_with("Can't determine join between 'users' and 'transfers'; tables have more than one foreign key constraint")
    );

    let err = JoinResolver::new(s.users.element(), transfers.element())
        .secondary(s.orders.element())
        .resolve()
        .unwrap_err();
    assert!(err.to_string().contains("via secondary table 'orders'"));

    let only = [transfers.c("receiver_id").unwrap()];
    let on = JoinResolver::new(s.users.element(), transfers.element())
        .consider_only(&only)
        .resolve()
        .unwrap();
    assert_eq!(on.to_string(), "users.id = transfers.receiver_id");
}

#[test]
fn test_no_foreign_keys_reason() {
    let s = shop();
    let tags = Table::build("tags")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key())
        .finish()
        .unwrap();

    match s.users.join(&tags, None).unwrap_err() {
        SqlError::NoForeignKeys { reason, hint, .. } => {
            assert_eq!(reason, NoForeignKeysReason::NoneDeclared);
            assert!(hint.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = s.users.join(&s.items, None).unwrap_err();
    assert!(
        err.to_string()
            .starts_with("Can't find any foreign key relationships between 'users' and 'items'")
    );
    assert!(matches!(
        err,
        SqlError::NoForeignKeys {
            reason: NoForeignKeysReason::NoneLinking,
            ..
        }
    ));
}

#[test]
fn test_join_through_alias_and_subquery() {
    let s = shop();
    let o = s.orders.alias(Some("o"));
    let j = s.users.join(&o, None).unwrap();
    assert_eq!(j.to_string(), "users JOIN orders AS o ON users.id = o.user_id");

    let recent = select([s.orders.c("id").unwrap(), s.orders.c("user_id").unwrap()])
        .subquery(Some("recent"));
    let j = s.users.join(&recent, None).unwrap();
    assert_eq!(
        j.to_string(),
        "users JOIN (SELECT orders.id, orders.user_id FROM orders) AS recent ON users.id = recent.user_id"
    );
}

#[test]
fn test_select_join_extends_from_list() {
    let s = shop();
    let stmt = select([s.users.c("name").unwrap()])
        .join(&s.orders, None)
        .unwrap()
        .join(&s.items, None)
        .unwrap();
    assert_eq!(
        stmt.to_string(),
        "SELECT users.name FROM users JOIN orders ON users.id = orders.user_id JOIN items ON orders.id = items.order_id"
    );
    assert_eq!(stmt.froms(&[]).unwrap().len(), 1);
}
