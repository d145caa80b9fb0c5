//! Column expression constructors and operator methods.
//!
//! The comparator lives here: given the left operand and an operator it picks
//! which node to build. Comparing to `NULL` with `==`/`!=` yields `IS` /
//! `IS NOT`, literal right operands become anonymous bind parameters typed
//! after the left side, `+` between strings becomes `||`, and `IN` over an
//! empty list folds to a constant.

use crate::labels::{AnonLabel, LabelName};
use crate::node::{
    BinaryData, BindParamData, CastData, ClauseListData, ColumnData, Element, FunctionData,
    LabelData, NodeId, NodeKind, Operator, UnaryData,
};
use crate::types::{SqlType, Value};

/// Right-hand side of an operator: an expression or a literal to be bound.
#[derive(Debug, Clone)]
pub enum Operand {
    Expr(Element),
    Value(Value),
}

impl From<Element> for Operand {
    fn from(e: Element) -> Self {
        Operand::Expr(e)
    }
}

impl From<&Element> for Operand {
    fn from(e: &Element) -> Self {
        Operand::Expr(e.clone())
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

macro_rules! operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(v.into())
                }
            }
        )*
    };
}

operand_from_value!(bool, i16, i32, i64, u8, u16, u32, f32, f64, String, &str);

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(v.into())
    }
}

impl Operand {
    /// Turn the operand into an element placed opposite `left`.
    pub(crate) fn into_element(self, left: &Element) -> Element {
        match self {
            Operand::Expr(e) => e,
            Operand::Value(Value::Null) => null(),
            Operand::Value(v) => {
                let type_ = left.type_().coalesce(v.implied_type());
                anon_bind(&left.column_key_hint(), Some(v), type_)
            }
        }
    }
}

fn anon_bind(hint: &str, value: Option<Value>, type_: SqlType) -> Element {
    let id = NodeId::next();
    Element::from_kind_with_id(
        id,
        NodeKind::BindParam(BindParamData {
            key: LabelName::anon(id, hint),
            value,
            type_,
        }),
    )
}

fn binary(left: &Element, right: &Element, operator: Operator, type_: SqlType) -> Element {
    Element::from_kind(NodeKind::Binary(BinaryData {
        left: left.self_group(Some(operator)),
        right: right.self_group(Some(operator)),
        operator,
        negate: operator.negation(),
        type_,
    }))
}

fn unary(element: &Element, operator: Option<Operator>, modifier: Option<Operator>, type_: SqlType) -> Element {
    let against = operator.or(modifier);
    Element::from_kind(NodeKind::Unary(UnaryData {
        element: element.self_group(against),
        operator,
        modifier,
        type_,
    }))
}

/// Free-standing column clause, not attached to any table.
pub fn column(name: impl Into<String>, type_: SqlType) -> Element {
    Element::from_kind(NodeKind::Column(ColumnData::new(name, type_)))
}

/// Column rendered verbatim, e.g. `literal_column("count(*)")`.
pub fn literal_column(text: impl Into<String>, type_: SqlType) -> Element {
    let mut data = ColumnData::new(text, type_);
    data.is_literal = true;
    Element::from_kind(NodeKind::Column(data))
}

/// Anonymous bound literal.
pub fn literal(value: impl Into<Value>) -> Element {
    let value = value.into();
    let type_ = value.implied_type();
    anon_bind("param", Some(value), type_)
}

/// Named bound parameter; `value` may be supplied at execution time instead.
pub fn bindparam(key: impl Into<String>, value: Option<Value>, type_: SqlType) -> Element {
    let type_ = match &value {
        Some(v) if type_.is_null() => v.implied_type(),
        _ => type_,
    };
    Element::from_kind(NodeKind::BindParam(BindParamData {
        key: LabelName::Plain(key.into()),
        value,
        type_,
    }))
}

/// Raw SQL text.
pub fn text(sql: impl Into<String>) -> Element {
    Element::from_kind(NodeKind::Text(sql.into()))
}

pub fn null() -> Element {
    Element::from_kind(NodeKind::Null)
}

pub fn true_() -> Element {
    Element::from_kind(NodeKind::True)
}

pub fn false_() -> Element {
    Element::from_kind(NodeKind::False)
}

fn is_empty_list(e: &Element) -> bool {
    matches!(e.kind(), NodeKind::ClauseList(c) if c.clauses.is_empty())
}

fn boolean_list(operator: Operator, clauses: impl IntoIterator<Item = Element>) -> Element {
    // `AND` absorbs TRUE and collapses on FALSE; `OR` the other way round.
    let (continue_on, skip_on) = match operator {
        Operator::And => (NodeKind::True, NodeKind::False),
        _ => (NodeKind::False, NodeKind::True),
    };
    let mut members = Vec::new();
    for clause in clauses {
        let tag = clause.tag();
        if tag == continue_on.tag() || is_empty_list(&clause) {
            continue;
        }
        if tag == skip_on.tag() {
            return clause;
        }
        members.push(clause);
    }
    if members.len() == 1 {
        return members.remove(0);
    }
    let clauses = members
        .iter()
        .map(|c| c.self_group(Some(operator)))
        .collect();
    Element::from_kind(NodeKind::ClauseList(ClauseListData {
        operator,
        clauses,
        group: true,
        parenthesized: false,
    }))
}

/// Conjunction. An empty conjunction renders as nothing and vanishes when combined.
pub fn and_(clauses: impl IntoIterator<Item = Element>) -> Element {
    boolean_list(Operator::And, clauses)
}

/// Disjunction.
pub fn or_(clauses: impl IntoIterator<Item = Element>) -> Element {
    boolean_list(Operator::Or, clauses)
}

/// Negation, using the negated operator of a comparison when there is one.
pub fn not_(element: &Element) -> Element {
    match element.kind() {
        NodeKind::Binary(b) => match b.negate {
            Some(negate) => Element::from_kind(NodeKind::Binary(BinaryData {
                left: b.left.clone(),
                right: b.right.clone(),
                operator: negate,
                negate: Some(b.operator),
                type_: b.type_,
            })),
            None => unary(element, Some(Operator::Not), None, SqlType::Boolean),
        },
        NodeKind::Unary(u) if u.operator == Some(Operator::Not) => u.element.clone(),
        NodeKind::True => false_(),
        NodeKind::False => true_(),
        _ => unary(element, Some(Operator::Not), None, SqlType::Boolean),
    }
}

/// `name(args...)` with no declared return type.
pub fn func(name: impl Into<String>, args: impl IntoIterator<Item = Element>) -> Element {
    typed_func(name, args, SqlType::Null)
}

/// `name(args...)` returning `type_`.
pub fn typed_func(
    name: impl Into<String>,
    args: impl IntoIterator<Item = Element>,
    type_: SqlType,
) -> Element {
    Element::from_kind(NodeKind::Function(FunctionData {
        name: name.into(),
        args: args.into_iter().collect(),
        type_,
    }))
}

/// `count(expr)`, or `count(*)` without an argument.
pub fn count(expr: Option<&Element>) -> Element {
    let arg = match expr {
        Some(e) => e.clone(),
        None => literal_column("*", SqlType::Null),
    };
    typed_func("count", [arg], SqlType::Integer)
}

pub fn cast(element: &Element, type_: SqlType) -> Element {
    Element::from_kind(NodeKind::Cast(CastData {
        element: element.clone(),
        type_,
    }))
}

/// `element AS name`.
pub fn label(name: impl Into<String>, element: &Element) -> Element {
    element.label(name)
}

pub fn desc(element: &Element) -> Element {
    element.desc()
}

pub fn asc(element: &Element) -> Element {
    element.asc()
}

pub fn distinct(element: &Element) -> Element {
    element.distinct()
}

/// Parenthesized, comma separated list.
pub fn tuple_(items: impl IntoIterator<Item = Element>) -> Element {
    Element::from_kind(NodeKind::ClauseList(ClauseListData {
        operator: Operator::Comma,
        clauses: items.into_iter().collect(),
        group: false,
        parenthesized: true,
    }))
}

impl Element {
    /// Declared type of the expression.
    pub fn type_(&self) -> SqlType {
        match self.kind() {
            NodeKind::BindParam(b) => b.type_,
            NodeKind::Null | NodeKind::Text(_) => SqlType::Null,
            NodeKind::True | NodeKind::False => SqlType::Boolean,
            NodeKind::Column(c) => c.type_,
            NodeKind::Label(l) => l.type_,
            NodeKind::Binary(b) => b.type_,
            NodeKind::Unary(u) => u.type_,
            NodeKind::ClauseList(c) if c.operator.is_boolean() => SqlType::Boolean,
            NodeKind::Grouping(e) => e.type_(),
            NodeKind::Function(f) => f.type_,
            NodeKind::Cast(c) => c.type_,
            NodeKind::ScalarSelect(s) => s.columns().at(0).map(|c| c.type_()).unwrap_or_default(),
            _ => SqlType::Null,
        }
    }

    /// Template for an anonymous name tied to this node's identity.
    pub fn anon_label(&self) -> AnonLabel {
        match self.kind() {
            NodeKind::Label(LabelData { name: LabelName::Anon(a), .. }) => a.clone(),
            _ => AnonLabel::new(self.identity(), self.column_key_hint()),
        }
    }

    /// The most specific readable name for anonymous labels and bind keys.
    pub(crate) fn column_key_hint(&self) -> String {
        match self.kind() {
            NodeKind::Column(c) if !c.is_literal => c.key.clone(),
            NodeKind::Label(l) => l.name.description(),
            NodeKind::Function(f) => f.name.clone(),
            NodeKind::Grouping(e) => e.column_key_hint(),
            _ => "param".to_string(),
        }
    }

    fn is_null_literal(&self) -> bool {
        matches!(self.kind(), NodeKind::Null)
    }

    fn compare(&self, operator: Operator, other: Operand) -> Element {
        let right = other.into_element(self);
        if right.is_null_literal() {
            match operator {
                Operator::Eq => return binary(self, &right, Operator::Is, SqlType::Boolean),
                Operator::Ne => return binary(self, &right, Operator::IsNot, SqlType::Boolean),
                _ => {}
            }
        }
        binary(self, &right, operator, SqlType::Boolean)
    }

    fn arithmetic(&self, operator: Operator, other: Operand) -> Element {
        let right = other.into_element(self);
        let operator = if operator == Operator::Add
            && (self.type_().is_string() || right.type_().is_string())
        {
            Operator::Concat
        } else {
            operator
        };
        let type_ = self.type_().coalesce(right.type_());
        Element::from_kind(NodeKind::Binary(BinaryData {
            left: self.self_group(Some(operator)),
            right: right.self_group(Some(operator)),
            operator,
            negate: None,
            type_,
        }))
    }

    pub fn eq(&self, other: impl Into<Operand>) -> Element {
        self.compare(Operator::Eq, other.into())
    }

    pub fn ne(&self, other: impl Into<Operand>) -> Element {
        self.compare(Operator::Ne, other.into())
    }

    pub fn lt(&self, other: impl Into<Operand>) -> Element {
        self.compare(Operator::Lt, other.into())
    }

    pub fn le(&self, other: impl Into<Operand>) -> Element {
        self.compare(Operator::Le, other.into())
    }

    pub fn gt(&self, other: impl Into<Operand>) -> Element {
        self.compare(Operator::Gt, other.into())
    }

    pub fn ge(&self, other: impl Into<Operand>) -> Element {
        self.compare(Operator::Ge, other.into())
    }

    pub fn like(&self, pattern: impl Into<Operand>) -> Element {
        self.compare(Operator::Like, pattern.into())
    }

    pub fn not_like(&self, pattern: impl Into<Operand>) -> Element {
        self.compare(Operator::NotLike, pattern.into())
    }

    pub fn ilike(&self, pattern: impl Into<Operand>) -> Element {
        self.compare(Operator::ILike, pattern.into())
    }

    pub fn is_null(&self) -> Element {
        binary(self, &null(), Operator::Is, SqlType::Boolean)
    }

    pub fn is_not_null(&self) -> Element {
        binary(self, &null(), Operator::IsNot, SqlType::Boolean)
    }

    /// `IN (...)`; an empty list is always false.
    pub fn in_<T: Into<Operand>>(&self, values: impl IntoIterator<Item = T>) -> Element {
        self.in_list(Operator::In, values)
    }

    /// `NOT IN (...)`; an empty list is always true.
    pub fn not_in<T: Into<Operand>>(&self, values: impl IntoIterator<Item = T>) -> Element {
        self.in_list(Operator::NotIn, values)
    }

    fn in_list<T: Into<Operand>>(&self, operator: Operator, values: impl IntoIterator<Item = T>) -> Element {
        let items: Vec<Element> = values
            .into_iter()
            .map(|v| v.into().into_element(self))
            .collect();
        if items.is_empty() {
            return if operator == Operator::In { false_() } else { true_() };
        }
        binary(self, &tuple_(items), operator, SqlType::Boolean)
    }

    /// `IN (<subquery>)`.
    pub fn in_subquery(&self, subquery: impl Into<Element>) -> Element {
        let grouped = Element::grouping(&subquery.into());
        binary(self, &grouped, Operator::In, SqlType::Boolean)
    }

    pub fn between(&self, low: impl Into<Operand>, high: impl Into<Operand>) -> Element {
        let range = Element::from_kind(NodeKind::ClauseList(ClauseListData {
            operator: Operator::And,
            clauses: vec![low.into().into_element(self), high.into().into_element(self)],
            group: false,
            parenthesized: false,
        }));
        binary(self, &range, Operator::Between, SqlType::Boolean)
    }

    pub fn add(&self, other: impl Into<Operand>) -> Element {
        self.arithmetic(Operator::Add, other.into())
    }

    pub fn sub(&self, other: impl Into<Operand>) -> Element {
        self.arithmetic(Operator::Sub, other.into())
    }

    pub fn mul(&self, other: impl Into<Operand>) -> Element {
        self.arithmetic(Operator::Mul, other.into())
    }

    pub fn div(&self, other: impl Into<Operand>) -> Element {
        self.arithmetic(Operator::Div, other.into())
    }

    pub fn modulo(&self, other: impl Into<Operand>) -> Element {
        self.arithmetic(Operator::Mod, other.into())
    }

    pub fn concat(&self, other: impl Into<Operand>) -> Element {
        self.arithmetic(Operator::Concat, other.into())
    }

    pub fn neg(&self) -> Element {
        unary(self, Some(Operator::Neg), None, self.type_())
    }

    pub fn and_(&self, other: &Element) -> Element {
        and_([self.clone(), other.clone()])
    }

    pub fn or_(&self, other: &Element) -> Element {
        or_([self.clone(), other.clone()])
    }

    pub fn not_(&self) -> Element {
        not_(self)
    }

    /// `self AS name`.
    pub fn label(&self, name: impl Into<String>) -> Element {
        Element::from_kind(NodeKind::Label(LabelData {
            name: LabelName::Plain(name.into()),
            element: self.self_group(Some(Operator::As)),
            type_: self.type_(),
        }))
    }

    /// `self AS <anonymous name>`, resolved per compilation.
    pub fn label_anon(&self) -> Element {
        let id = NodeId::next();
        Element::from_kind_with_id(
            id,
            NodeKind::Label(LabelData {
                name: LabelName::anon(id, self.column_key_hint()),
                element: self.self_group(Some(Operator::As)),
                type_: self.type_(),
            }),
        )
    }

    pub fn desc(&self) -> Element {
        unary(self, None, Some(Operator::Desc), self.type_())
    }

    pub fn asc(&self) -> Element {
        unary(self, None, Some(Operator::Asc), self.type_())
    }

    pub fn distinct(&self) -> Element {
        unary(self, Some(Operator::Distinct), None, self.type_())
    }

    pub fn cast(&self, type_: SqlType) -> Element {
        cast(self, type_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Element {
        column("x", SqlType::Integer)
    }

    #[test]
    fn test_eq_none_becomes_is() {
        let e = x().eq(None::<i32>);
        match e.kind() {
            NodeKind::Binary(b) => {
                assert_eq!(b.operator, Operator::Is);
                assert_eq!(b.negate, Some(Operator::IsNot));
            }
            _ => panic!("expected binary"),
        }
        let ne = x().ne(null());
        assert!(matches!(ne.kind(), NodeKind::Binary(b) if b.operator == Operator::IsNot));
    }

    #[test]
    fn test_literal_binds_take_left_type_and_key() {
        let e = column("amount", SqlType::Numeric).gt(5);
        let NodeKind::Binary(b) = e.kind() else { panic!("expected binary") };
        let NodeKind::BindParam(p) = b.right.kind() else { panic!("expected bind") };
        assert_eq!(p.type_, SqlType::Numeric);
        assert_eq!(p.value, Some(Value::Int(5)));
        assert!(p.key.is_anonymous());
        assert_eq!(p.key.description(), "amount");
        assert_eq!(e.type_(), SqlType::Boolean);
    }

    #[test]
    fn test_string_add_is_concat() {
        let name = column("name", SqlType::String);
        let e = name.add("!");
        assert!(matches!(e.kind(), NodeKind::Binary(b) if b.operator == Operator::Concat));
        let n = x().add(1);
        assert!(matches!(n.kind(), NodeKind::Binary(b) if b.operator == Operator::Add));
        assert_eq!(n.type_(), SqlType::Integer);
    }

    #[test]
    fn test_empty_in_folds_to_constant() {
        assert_eq!(x().in_(Vec::<i32>::new()).tag(), crate::node::KindTag::False);
        assert_eq!(x().not_in(Vec::<i32>::new()).tag(), crate::node::KindTag::True);
        let e = x().in_([1, 2, 3]);
        let NodeKind::Binary(b) = e.kind() else { panic!("expected binary") };
        assert_eq!(b.right.children().len(), 3);
    }

    #[test]
    fn test_not_uses_negated_operator() {
        let e = not_(&x().eq(1));
        assert!(matches!(e.kind(), NodeKind::Binary(b) if b.operator == Operator::Ne));
        let back = not_(&e);
        assert!(matches!(back.kind(), NodeKind::Binary(b) if b.operator == Operator::Eq));
        let t = not_(&true_());
        assert_eq!(t.tag(), crate::node::KindTag::False);
    }

    #[test]
    fn test_and_or_grouping() {
        let a = x().eq(1);
        let b = x().eq(2);
        let c = x().eq(3);
        let e = and_([or_([a.clone(), b.clone()]), c.clone()]);
        let NodeKind::ClauseList(list) = e.kind() else { panic!("expected list") };
        assert_eq!(list.clauses[0].tag(), crate::node::KindTag::Grouping);
        assert_eq!(list.clauses[1], c);

        let nested = and_([and_([a.clone(), b.clone()]), c]);
        let NodeKind::ClauseList(list) = nested.kind() else { panic!("expected list") };
        assert_eq!(list.clauses[0].tag(), crate::node::KindTag::ClauseList);
    }

    #[test]
    fn test_and_skips_empty_and_true() {
        let a = x().eq(1);
        assert_eq!(and_([and_([]), a.clone(), true_()]), a);
        assert_eq!(and_([a.clone(), false_()]).tag(), crate::node::KindTag::False);
        assert_eq!(or_([a.clone(), true_()]).tag(), crate::node::KindTag::True);
        assert!(is_empty_list(&and_([])));
    }

    #[test]
    fn test_arithmetic_grouping_respects_precedence() {
        let e = x().add(1).mul(2);
        let NodeKind::Binary(b) = e.kind() else { panic!("expected binary") };
        assert_eq!(b.left.tag(), crate::node::KindTag::Grouping);
        let f = x().mul(2).add(1);
        let NodeKind::Binary(b) = f.kind() else { panic!("expected binary") };
        assert_eq!(b.left.tag(), crate::node::KindTag::Binary);
    }

    #[test]
    fn test_anon_label_is_stable_for_annotated_copies() {
        let col = x();
        let annotated = col.annotate(crate::annotation::Annotations::new().with("k", 1));
        assert_eq!(col.anon_label(), annotated.anon_label());
    }
}
