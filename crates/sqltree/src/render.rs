//! Dialect-neutral diagnostic rendering.
//!
//! Produces readable SQL for messages and tests. Bound parameters render as
//! `<bind_prefix><label>`; anonymous labels go through one [`LabelResolver`]
//! per rendering, so a label referenced twice renders the same both times.
//! This is not a dialect compiler: no quoting, no type-specific literal
//! rendering, no parameter ordering.

use crate::annotation::UPSERT_EXCLUDED;
use crate::config::CompileConfig;
use crate::error::{SqlError, SqlResult};
use crate::labels::{AnonLabel, LabelResolver};
use crate::node::{ColumnData, Element, NodeId, NodeKind, Operator};
use crate::selectable::{Alias, CompoundSelect, CompoundSelectData, Join};
use crate::statement::{Delete, Insert, OnConflict, Select, SelectData, Update, projection_label};
use crate::schema::Table;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn template_regex() -> &'static Regex {
    static TEMPLATE_RE: OnceLock<Regex> = OnceLock::new();
    TEMPLATE_RE.get_or_init(|| {
        Regex::new(r"%\((\d+) ([^)]*)\)s").expect("invalid built-in label template regex")
    })
}

/// Render `element` with `config`.
///
/// Fails when a nested select loses all of its FROM objects to
/// auto-correlation, when a select refers to itself as a FROM, or when a
/// statement uses a column whose table or alias was dropped.
pub fn to_sql(element: &Element, config: &CompileConfig) -> SqlResult<String> {
    let mut renderer = Renderer::new(config.clone());
    let sql = renderer.render(element);
    match renderer.error {
        Some(err) => Err(err),
        None => Ok(sql),
    }
}

/// One rendering pass.
pub struct Renderer {
    resolver: LabelResolver,
    bind_prefix: String,
    /// FROM objects of the enclosing statements, for correlation.
    correlating: Vec<Element>,
    error: Option<SqlError>,
}

impl Renderer {
    pub fn new(config: CompileConfig) -> Self {
        let bind_prefix = config.bind_prefix.clone();
        Self {
            resolver: LabelResolver::new(config),
            bind_prefix,
            correlating: Vec::new(),
            error: None,
        }
    }

    /// Labels resolved so far in this pass.
    pub fn resolver(&self) -> &LabelResolver {
        &self.resolver
    }

    /// Render any element, statement or FROM entity.
    pub fn render(&mut self, element: &Element) -> String {
        match element.kind() {
            NodeKind::Table(_) | NodeKind::Alias(_) | NodeKind::Join(_) | NodeKind::FromGrouping(_) => {
                self.from_item(element)
            }
            NodeKind::Select(s) => self.select(element, s),
            NodeKind::CompoundSelect(c) => self.compound(c),
            _ => self.expr(element),
        }
    }

    fn fail(&mut self, err: SqlError) {
        tracing::debug!(target: "sqltree", error = %err, "rendering with best-effort FROM list");
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Substitute every anonymous slot in `text`.
    fn resolve_text(&mut self, text: &str) -> String {
        if !text.contains("%(") {
            return text.to_string();
        }
        let re = template_regex();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(id), Some(hint)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let Ok(raw) = id.as_str().parse::<u64>() else { continue };
            out.push_str(&text[last..whole.start()]);
            let label = AnonLabel::new(NodeId::from_raw(raw), hint.as_str());
            out.push_str(&self.resolver.resolve_anon(&label));
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }

    fn table_name(t: &crate::schema::TableData) -> String {
        match &t.schema {
            Some(schema) => format!("{}.{}", schema, t.name),
            None => t.name.clone(),
        }
    }

    fn column(&mut self, element: &Element, c: &ColumnData) -> String {
        let name = self.resolve_text(&c.name);
        if c.is_literal {
            return name;
        }
        if element.annotation(UPSERT_EXCLUDED).is_some() {
            return format!("excluded.{}", name);
        }
        let Some(parent) = &c.parent else {
            return name;
        };
        match parent.upgrade() {
            Some(owner) => match owner.kind() {
                NodeKind::Table(t) => format!("{}.{}", Self::table_name(t), name),
                NodeKind::Alias(a) => format!("{}.{}", self.resolver.resolve(&a.name), name),
                _ => name,
            },
            None => format!("{}.{}", self.resolver.resolve(parent.name()), name),
        }
    }

    fn expr(&mut self, element: &Element) -> String {
        match element.kind() {
            NodeKind::BindParam(b) => {
                let key = self.resolver.resolve(&b.key);
                format!("{}{}", self.bind_prefix, key)
            }
            NodeKind::Null => "NULL".to_string(),
            NodeKind::True => "true".to_string(),
            NodeKind::False => "false".to_string(),
            NodeKind::Text(sql) => sql.clone(),
            NodeKind::Column(c) => self.column(element, c),
            NodeKind::Label(l) => self.expr(&l.element),
            NodeKind::Binary(b) => {
                let left = self.expr(&b.left);
                let right = self.expr(&b.right);
                format!("{} {} {}", left, b.operator.symbol(), right)
            }
            NodeKind::Unary(u) => {
                let inner = self.expr(&u.element);
                let mut out = match u.operator {
                    Some(Operator::Neg) => format!("-{}", inner),
                    Some(op) => format!("{} {}", op.symbol(), inner),
                    None => inner,
                };
                if let Some(modifier) = u.modifier {
                    out.push(' ');
                    out.push_str(modifier.symbol());
                }
                out
            }
            NodeKind::ClauseList(c) => {
                let sep = match c.operator {
                    Operator::Comma => ", ".to_string(),
                    op => format!(" {} ", op.symbol()),
                };
                let parts: Vec<String> = c
                    .clauses
                    .iter()
                    .map(|e| self.expr(e))
                    .filter(|s| !s.is_empty())
                    .collect();
                let joined = parts.join(&sep);
                if c.parenthesized {
                    format!("({})", joined)
                } else {
                    joined
                }
            }
            NodeKind::Grouping(e) => format!("({})", self.render(e)),
            NodeKind::Function(f) => {
                let args: Vec<String> = f.args.iter().map(|a| self.expr(a)).collect();
                format!("{}({})", f.name, args.join(", "))
            }
            NodeKind::Cast(c) => {
                let inner = self.expr(&c.element);
                format!("CAST({} AS {})", inner, c.type_.sql_name())
            }
            NodeKind::ScalarSelect(inner) => format!("({})", self.render(inner)),
            NodeKind::Table(_) | NodeKind::Alias(_) | NodeKind::Join(_) | NodeKind::FromGrouping(_) => {
                self.from_item(element)
            }
            NodeKind::Select(s) => format!("({})", self.select(element, s)),
            NodeKind::CompoundSelect(c) => format!("({})", self.compound(c)),
            NodeKind::Insert(_) => self.insert(element),
            NodeKind::Update(_) => self.update(element),
            NodeKind::Delete(_) => self.delete(element),
        }
    }

    fn from_item(&mut self, element: &Element) -> String {
        // FROM-list subqueries never correlate to the enclosing statement.
        let outer = std::mem::take(&mut self.correlating);
        let sql = match element.kind() {
            NodeKind::Table(t) => Self::table_name(t),
            NodeKind::Alias(a) => {
                let inner = match a.element.kind() {
                    NodeKind::Table(t) => Self::table_name(t),
                    NodeKind::Select(s) => format!("({})", self.select(&a.element, s)),
                    NodeKind::CompoundSelect(c) => format!("({})", self.compound(c)),
                    _ => self.from_item(&a.element),
                };
                format!("{} AS {}", inner, self.resolver.resolve(&a.name))
            }
            NodeKind::Join(j) => {
                let left = self.from_item(&j.left);
                let right = self.from_item(&j.right);
                let keyword = match (j.is_outer, j.full) {
                    (_, true) => "FULL OUTER JOIN",
                    (true, false) => "LEFT OUTER JOIN",
                    (false, false) => "JOIN",
                };
                self.correlating = outer.clone();
                let on = self.expr(&j.onclause);
                format!("{} {} {} ON {}", left, keyword, right, on)
            }
            NodeKind::FromGrouping(e) => format!("({})", self.from_item(e)),
            NodeKind::Select(s) => format!("({})", self.select(element, s)),
            NodeKind::CompoundSelect(c) => format!("({})", self.compound(c)),
            _ => self.expr(element),
        };
        self.correlating = outer;
        sql
    }

    fn projection_item(&mut self, item: &Element) -> String {
        match item.kind() {
            NodeKind::Column(c) => self.column(item, c),
            NodeKind::Label(l) => {
                let inner = self.expr(&l.element);
                let name = self.resolver.resolve(&l.name);
                format!("{} AS {}", inner, name)
            }
            _ => {
                let inner = self.expr(item);
                let name = self.resolver.resolve_anon(&projection_label(item));
                format!("{} AS {}", inner, name)
            }
        }
    }

    fn order_item(&mut self, item: &Element) -> String {
        match item.kind() {
            NodeKind::Label(l) => self.resolver.resolve(&l.name),
            NodeKind::Unary(u) if u.operator.is_none() => {
                let inner = self.order_item(&u.element);
                match u.modifier {
                    Some(m) => format!("{} {}", inner, m.symbol()),
                    None => inner,
                }
            }
            _ => self.expr(item),
        }
    }

    fn select(&mut self, owner: &Element, s: &SelectData) -> String {
        let outer = self.correlating.clone();
        let froms = match Select(owner.clone()).froms(&outer) {
            Ok(froms) => froms,
            Err(err) => {
                self.fail(err);
                s.locate_froms()
                    .into_iter()
                    .filter(|f| !f.shares_clone_lineage(owner))
                    .collect()
            }
        };
        let from_sql: Vec<String> = froms.iter().map(|f| self.from_item(f)).collect();
        self.correlating = outer.iter().chain(froms.iter()).cloned().collect();

        let columns: Vec<String> = s.raw_columns.iter().map(|c| self.projection_item(c)).collect();
        let mut sql = String::from("SELECT ");
        if s.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&columns.join(", "));
        if !from_sql.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&from_sql.join(", "));
        }
        if let Some(w) = &s.where_clause {
            let rendered = self.expr(w);
            if !rendered.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&rendered);
            }
        }
        if !s.group_by.is_empty() {
            let items: Vec<String> = s.group_by.iter().map(|g| self.order_item(g)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&items.join(", "));
        }
        if let Some(h) = &s.having {
            let rendered = self.expr(h);
            if !rendered.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&rendered);
            }
        }
        self.tail(&mut sql, &s.order_by, s.limit.as_ref(), s.offset.as_ref());
        self.correlating = outer;
        sql
    }

    fn tail(&mut self, sql: &mut String, order_by: &[Element], limit: Option<&Element>, offset: Option<&Element>) {
        if !order_by.is_empty() {
            let items: Vec<String> = order_by.iter().map(|o| self.order_item(o)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&self.expr(limit));
        }
        if let Some(offset) = offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&self.expr(offset));
        }
    }

    fn compound(&mut self, c: &CompoundSelectData) -> String {
        let keyword = format!(" {} ", c.keyword.as_sql());
        let parts: Vec<String> = c
            .selects
            .iter()
            .map(|s| match s.kind() {
                NodeKind::Select(data) => self.select(s, data),
                _ => format!("({})", self.render(s)),
            })
            .collect();
        let mut sql = parts.join(&keyword);
        self.tail(&mut sql, &c.order_by, c.limit.as_ref(), c.offset.as_ref());
        sql
    }

    fn bare_name(&mut self, column: &Element) -> String {
        match column.as_column() {
            Some(c) => self.resolve_text(&c.name),
            None => self.expr(column),
        }
    }

    fn returning(&mut self, sql: &mut String, returning: &[Element]) {
        if !returning.is_empty() {
            let items: Vec<String> = returning.iter().map(|r| self.expr(r)).collect();
            sql.push_str(" RETURNING ");
            sql.push_str(&items.join(", "));
        }
    }

    fn insert(&mut self, element: &Element) -> String {
        let NodeKind::Insert(i) = element.kind() else {
            return String::new();
        };
        let mut sql = format!("INSERT INTO {}", self.from_item(&i.table));
        if let Some(select) = &i.select {
            let names: Vec<String> = i.select_columns.iter().map(|c| self.bare_name(c)).collect();
            let body = self.render(select);
            sql.push_str(&format!(" ({}) {}", names.join(", "), body));
        } else if i.values.is_empty() {
            sql.push_str(" DEFAULT VALUES");
        } else {
            let names: Vec<String> = i.values.iter().map(|(c, _)| self.bare_name(c)).collect();
            let values: Vec<String> = i.values.iter().map(|(_, v)| self.expr(v)).collect();
            sql.push_str(&format!(" ({}) VALUES ({})", names.join(", "), values.join(", ")));
        }
        if let Some(on_conflict) = &i.on_conflict {
            let (index_elements, action) = match on_conflict {
                OnConflict::DoNothing { index_elements } => (index_elements, "DO NOTHING".to_string()),
                OnConflict::DoUpdate {
                    index_elements,
                    set,
                    where_clause,
                } => {
                    let pairs: Vec<String> = set
                        .iter()
                        .map(|(c, v)| {
                            let name = self.bare_name(c);
                            format!("{} = {}", name, self.expr(v))
                        })
                        .collect();
                    let mut action = format!("DO UPDATE SET {}", pairs.join(", "));
                    if let Some(w) = where_clause {
                        action.push_str(" WHERE ");
                        action.push_str(&self.expr(w));
                    }
                    (index_elements, action)
                }
            };
            sql.push_str(" ON CONFLICT ");
            if !index_elements.is_empty() {
                let targets: Vec<String> = index_elements.iter().map(|c| self.bare_name(c)).collect();
                sql.push_str(&format!("({}) ", targets.join(", ")));
            }
            sql.push_str(&action);
        }
        self.returning(&mut sql, &i.returning);
        sql
    }

    fn update(&mut self, element: &Element) -> String {
        let NodeKind::Update(u) = element.kind() else {
            return String::new();
        };
        let update = Update(element.clone());
        if let Err(err) = update.check_froms() {
            self.fail(err);
        }
        let mut sql = format!("UPDATE {}", self.from_item(&u.table));
        let pairs: Vec<String> = u
            .values
            .iter()
            .map(|(c, v)| {
                let name = self.bare_name(c);
                format!("{} = {}", name, self.expr(v))
            })
            .collect();
        sql.push_str(" SET ");
        sql.push_str(&pairs.join(", "));
        let extra = update.extra_froms().to_vec();
        if !extra.is_empty() {
            let items: Vec<String> = extra.iter().map(|f| self.from_item(f)).collect();
            sql.push_str(" FROM ");
            sql.push_str(&items.join(", "));
        }
        let outer = std::mem::replace(
            &mut self.correlating,
            std::iter::once(u.table.clone()).chain(extra).collect(),
        );
        if let Some(w) = &u.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(w));
        }
        self.correlating = outer;
        self.returning(&mut sql, &u.returning);
        sql
    }

    fn delete(&mut self, element: &Element) -> String {
        let NodeKind::Delete(d) = element.kind() else {
            return String::new();
        };
        let mut sql = format!("DELETE FROM {}", self.from_item(&d.table));
        let outer = std::mem::replace(&mut self.correlating, vec![d.table.clone()]);
        if let Some(w) = &d.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(w));
        }
        self.correlating = outer;
        self.returning(&mut sql, &d.returning);
        sql
    }
}

impl Element {
    /// Render with `config`; see [`to_sql`].
    pub fn to_sql(&self, config: &CompileConfig) -> SqlResult<String> {
        to_sql(self, config)
    }
}

impl fmt::Display for Element {
    /// Best-effort rendering with the default configuration.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut renderer = Renderer::new(CompileConfig::default());
        f.write_str(&renderer.render(self))
    }
}

macro_rules! display_via_element {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(self.element(), f)
                }
            }
        )*
    };
}

display_via_element!(Table, Alias, Join, CompoundSelect, Select, Insert, Update, Delete);
