use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    // Logical
    AndAlso,
    OrElse,
    Coalesce,
}

impl BinaryOperator {
    pub fn to_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::AndAlso => "&&",
            BinaryOperator::OrElse => "||",
            BinaryOperator::Coalesce => "??",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::AndAlso | BinaryOperator::OrElse)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
}

impl UnaryOperator {
    pub fn to_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Negate => "-",
        }
    }
}

/// Methods callable on a receiver: sequence operators and string methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    // Sequence -> sequence
    Where,
    Select,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Skip,
    Take,
    Distinct,
    // Sequence -> scalar
    Any,
    All,
    Count,
    Contains,
    First,
    FirstOrDefault,
    Sum,
    Min,
    Max,
    // String
    StartsWith,
    EndsWith,
    ContainsText,
    ToUpper,
    ToLower,
    Length,
}

impl Method {
    /// Name used by the expression language and by `Display`.
    pub fn name(&self) -> &'static str {
        match self {
            Method::Where => "where",
            Method::Select => "select",
            Method::OrderBy => "order_by",
            Method::OrderByDescending => "order_by_descending",
            Method::ThenBy => "then_by",
            Method::ThenByDescending => "then_by_descending",
            Method::Skip => "skip",
            Method::Take => "take",
            Method::Distinct => "distinct",
            Method::Any => "any",
            Method::All => "all",
            Method::Count => "count",
            Method::Contains => "contains",
            Method::First => "first",
            Method::FirstOrDefault => "first_or_default",
            Method::Sum => "sum",
            Method::Min => "min",
            Method::Max => "max",
            Method::StartsWith => "starts_with",
            Method::EndsWith => "ends_with",
            Method::ContainsText => "contains_text",
            Method::ToUpper => "to_upper",
            Method::ToLower => "to_lower",
            Method::Length => "len",
        }
    }

    pub fn is_sequence_operator(&self) -> bool {
        !self.is_string_method()
    }

    pub fn is_string_method(&self) -> bool {
        matches!(
            self,
            Method::StartsWith
                | Method::EndsWith
                | Method::ContainsText
                | Method::ToUpper
                | Method::ToLower
                | Method::Length
        )
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Method::OrderBy | Method::OrderByDescending | Method::ThenBy | Method::ThenByDescending
        )
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, Method::OrderByDescending | Method::ThenByDescending)
    }

    /// Number of arguments accepted besides the receiver, as (min, max).
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Method::Where
            | Method::Select
            | Method::OrderBy
            | Method::OrderByDescending
            | Method::ThenBy
            | Method::ThenByDescending
            | Method::All
            | Method::Skip
            | Method::Take
            | Method::Contains
            | Method::StartsWith
            | Method::EndsWith
            | Method::ContainsText => (1, 1),
            Method::Any
            | Method::Count
            | Method::First
            | Method::FirstOrDefault
            | Method::Sum
            | Method::Min
            | Method::Max => (0, 1),
            Method::Distinct | Method::ToUpper | Method::ToLower | Method::Length => (0, 0),
        }
    }

    /// Whether the argument, when present, is a lambda over the receiver's
    /// elements.
    pub fn takes_lambda(&self) -> bool {
        matches!(
            self,
            Method::Where
                | Method::Select
                | Method::OrderBy
                | Method::OrderByDescending
                | Method::ThenBy
                | Method::ThenByDescending
                | Method::All
                | Method::Any
                | Method::Count
                | Method::First
                | Method::FirstOrDefault
                | Method::Sum
                | Method::Min
                | Method::Max
        )
    }
}

/// Look up a method by its expression-language name.
pub fn method_by_name(name: &str) -> Option<Method> {
    METHODS_BY_NAME.get(name).copied()
}

const ALL_METHODS: &[Method] = &[
    Method::Where,
    Method::Select,
    Method::OrderBy,
    Method::OrderByDescending,
    Method::ThenBy,
    Method::ThenByDescending,
    Method::Skip,
    Method::Take,
    Method::Distinct,
    Method::Any,
    Method::All,
    Method::Count,
    Method::Contains,
    Method::First,
    Method::FirstOrDefault,
    Method::Sum,
    Method::Min,
    Method::Max,
    Method::StartsWith,
    Method::EndsWith,
    Method::ContainsText,
    Method::ToUpper,
    Method::ToLower,
    Method::Length,
];

// Static method name table
lazy_static::lazy_static! {
    static ref METHODS_BY_NAME: HashMap<&'static str, Method> = {
        let mut m: HashMap<&'static str, Method> =
            ALL_METHODS.iter().map(|method| (method.name(), *method)).collect();

        // Aliases
        m.insert("filter", Method::Where);
        m.insert("map", Method::Select);
        m.insert("length", Method::Length);
        m
    };
}
