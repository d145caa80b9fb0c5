//! Operators, their precedence, and negation.

use std::fmt;

/// SQL operator attached to binary, unary and clause-list nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    Like,
    NotLike,
    ILike,
    NotILike,
    In,
    NotIn,
    Between,
    NotBetween,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Neg,
    Not,
    Desc,
    Asc,
    Distinct,
    Exists,
    Collate,
    As,
}

impl Operator {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> i8 {
        use Operator::*;
        match self {
            Neg | Mul | Div | Mod => 8,
            Add | Sub => 7,
            Concat => 6,
            Eq | Ne | Lt | Le | Gt | Ge | Is | IsNot | Like | NotLike | ILike | NotILike | In
            | NotIn | Between | NotBetween | Distinct | Not => 5,
            Collate => 4,
            And | Desc | Asc => 3,
            Or => 2,
            Exists => 0,
            Comma | As => -1,
        }
    }

    /// `a op (b op c)` may drop its parentheses.
    pub fn is_natural_self_precedent(self) -> bool {
        matches!(
            self,
            Operator::And | Operator::Or | Operator::Add | Operator::Mul | Operator::Concat
        )
    }

    /// Operators producing a boolean result.
    pub fn is_comparison(self) -> bool {
        use Operator::*;
        matches!(
            self,
            Eq | Ne | Lt | Le | Gt | Ge | Is | IsNot | Like | NotLike | ILike | NotILike | In
                | NotIn | Between | NotBetween
        )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Not) || self.is_comparison()
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne | Operator::Add | Operator::Mul)
    }

    /// The operator expressing `NOT (a op b)` directly, if one exists.
    pub fn negation(self) -> Option<Operator> {
        use Operator::*;
        Some(match self {
            Eq => Ne,
            Ne => Eq,
            Lt => Ge,
            Ge => Lt,
            Gt => Le,
            Le => Gt,
            Is => IsNot,
            IsNot => Is,
            Like => NotLike,
            NotLike => Like,
            ILike => NotILike,
            NotILike => ILike,
            In => NotIn,
            NotIn => In,
            Between => NotBetween,
            NotBetween => Between,
            _ => return None,
        })
    }

    /// SQL spelling used by the diagnostic renderer.
    pub fn symbol(self) -> &'static str {
        use Operator::*;
        match self {
            And => "AND",
            Or => "OR",
            Comma => ", ",
            Eq => "=",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Is => "IS",
            IsNot => "IS NOT",
            Like => "LIKE",
            NotLike => "NOT LIKE",
            ILike => "ILIKE",
            NotILike => "NOT ILIKE",
            In => "IN",
            NotIn => "NOT IN",
            Between => "BETWEEN",
            NotBetween => "NOT BETWEEN",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Concat => "||",
            Neg => "-",
            Not => "NOT",
            Desc => "DESC",
            Asc => "ASC",
            Distinct => "DISTINCT",
            Exists => "EXISTS",
            Collate => "COLLATE",
            As => "AS",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `true` when an expression built with `op` must be parenthesized to sit
/// inside an expression built with `against`.
pub fn is_precedent(op: Operator, against: Operator) -> bool {
    if op == against && op.is_natural_self_precedent() {
        false
    } else {
        op.precedence() <= against.precedence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_inside_and_needs_grouping() {
        assert!(is_precedent(Operator::Or, Operator::And));
        assert!(!is_precedent(Operator::And, Operator::Or));
    }

    #[test]
    fn test_associative_self_nesting() {
        assert!(!is_precedent(Operator::And, Operator::And));
        assert!(!is_precedent(Operator::Add, Operator::Add));
        assert!(is_precedent(Operator::Sub, Operator::Sub));
        assert!(is_precedent(Operator::Eq, Operator::Eq));
    }

    #[test]
    fn test_negation_round_trips() {
        for op in [Operator::Eq, Operator::Lt, Operator::In, Operator::Like, Operator::Is] {
            let neg = op.negation().unwrap();
            assert_eq!(neg.negation(), Some(op));
        }
        assert_eq!(Operator::Add.negation(), None);
    }
}
