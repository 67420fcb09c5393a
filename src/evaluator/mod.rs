//! Tree-walking interpreter over [`Value`]s.
//!
//! The in-memory data sources execute translated trees with it, and the
//! mapping service uses it to evaluate conversion rules while materializing
//! destination values.
//!
//! Semantics:
//! - member access on `null` yields `null`
//! - `&&` and `||` short-circuit; a `null` operand counts as false
//! - arithmetic promotes to float when either side is a float, and `+`
//!   concatenates when either side is a string
//! - relational comparisons involving `null` are false
//! - enums order by declaration order in the catalog

use std::cmp::Ordering;

use crate::expression::types::{DataType, EnumValue, ParameterValues, Record, Value};
use crate::expression::{BinaryOperator, Expr, Lambda, UnaryOperator};
use crate::mapping::catalog::TypeCatalog;

pub mod errors;
mod sequence;

pub use errors::EvalError;

/// Lambda parameter bindings, innermost last.
type Env = Vec<(String, Value)>;

pub struct Evaluator<'a> {
    catalog: &'a TypeCatalog,
    parameters: &'a ParameterValues,
    source: Option<(&'a str, &'a [Value])>,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalog: &'a TypeCatalog, parameters: &'a ParameterValues) -> Self {
        Evaluator {
            catalog,
            parameters,
            source: None,
        }
    }

    /// Rows produced by `source<element_type>` nodes.
    pub fn with_source(mut self, element_type: &'a str, rows: &'a [Value]) -> Self {
        self.source = Some((element_type, rows));
        self
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        self.eval(expr, &mut Env::new())
    }

    /// Invoke `lambda` with `argument` bound to its parameter.
    pub fn apply(&self, lambda: &Lambda, argument: Value) -> Result<Value, EvalError> {
        let mut env = vec![(lambda.parameter.name.clone(), argument)];
        self.eval(&lambda.body, &mut env)
    }

    fn eval(&self, expr: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        match expr {
            Expr::Source(source) => match self.source {
                Some((element_type, rows)) if element_type == source.element_type => {
                    Ok(Value::List(rows.to_vec()))
                }
                _ => Err(EvalError::NoSource(source.element_type.clone())),
            },

            Expr::Parameter(p) => env
                .iter()
                .rev()
                .find(|(name, _)| *name == p.name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| EvalError::UnboundParameter(p.name.clone())),

            Expr::External(p) => self
                .parameters
                .get(&p.name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundExternal(p.name.clone())),

            Expr::Constant(c) => Ok(c.value.clone()),

            Expr::Member(m) => match self.eval(&m.target, env)? {
                Value::Null => Ok(Value::Null),
                Value::Record(record) => Ok(record.get(&m.member).clone()),
                other => Err(EvalError::type_error(
                    expr,
                    format!("member access on {}", other),
                )),
            },

            Expr::Unary(u) => {
                let operand = self.eval(&u.operand, env)?;
                match (u.op, operand) {
                    (_, Value::Null) => Ok(Value::Null),
                    (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOperator::Negate, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| EvalError::Overflow(expr.to_string())),
                    (UnaryOperator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
                    (_, other) => Err(EvalError::type_error(
                        expr,
                        format!("cannot apply `{}` to {}", u.op.to_str(), other),
                    )),
                }
            }

            Expr::Binary(b) => match b.op {
                BinaryOperator::AndAlso => {
                    if !self.truthy(&b.left, env)? {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.truthy(&b.right, env)?))
                }
                BinaryOperator::OrElse => {
                    if self.truthy(&b.left, env)? {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.truthy(&b.right, env)?))
                }
                BinaryOperator::Coalesce => match self.eval(&b.left, env)? {
                    Value::Null => self.eval(&b.right, env),
                    value => Ok(value),
                },
                op => {
                    let left = self.eval(&b.left, env)?;
                    let right = self.eval(&b.right, env)?;
                    self.binary(op, left, right, expr)
                }
            },

            Expr::Conditional(c) => {
                if self.truthy(&c.test, env)? {
                    self.eval(&c.if_true, env)
                } else {
                    self.eval(&c.if_false, env)
                }
            }

            Expr::Convert(c) => {
                let value = self.eval(&c.operand, env)?;
                self.convert(value, &c.target)
            }

            Expr::Call(call) => self.call(call, expr, env),

            Expr::Lambda(_) => Err(EvalError::type_error(
                expr,
                "lambdas can only be evaluated as method arguments",
            )),

            Expr::New(n) => {
                let mut record = Record::new(&n.type_name);
                for (name, field) in &n.fields {
                    let value = self.eval(field, env)?;
                    record.fields.insert(name.clone(), value);
                }
                Ok(Value::Record(record))
            }
        }
    }

    /// Evaluate a condition; `null` counts as false.
    fn truthy(&self, expr: &Expr, env: &mut Env) -> Result<bool, EvalError> {
        match self.eval(expr, env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvalError::type_error(
                expr,
                format!("expected a bool, found {}", other),
            )),
        }
    }

    fn binary(
        &self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        expr: &Expr,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOperator::Equal => Ok(Value::Bool(left.loosely_equals(&right))),
            BinaryOperator::NotEqual => Ok(Value::Bool(!left.loosely_equals(&right))),
            BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Bool(false));
                }
                let ordering = self.compare_values(&left, &right).ok_or_else(|| {
                    EvalError::Incomparable {
                        left: left.to_string(),
                        right: right.to_string(),
                    }
                })?;
                Ok(Value::Bool(match op {
                    BinaryOperator::LessThan => ordering == Ordering::Less,
                    BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => arithmetic(op, left, right, expr),
        }
    }

    /// Ordering that uses enum declaration order from the catalog.
    pub(crate) fn compare_values(&self, left: &Value, right: &Value) -> Option<Ordering> {
        if let (Value::Enum(a), Value::Enum(b)) = (left, right) {
            if a.enum_type == b.enum_type {
                if let Some(def) = self.catalog.enumeration(&a.enum_type) {
                    return Some(def.ordinal(&a.variant)?.cmp(&def.ordinal(&b.variant)?));
                }
            }
        }
        left.compare(right)
    }

    fn convert(&self, value: Value, target: &DataType) -> Result<Value, EvalError> {
        let invalid = |value: &Value| EvalError::InvalidConversion {
            value: value.to_string(),
            target: target.to_string(),
        };

        match (target, value) {
            (_, Value::Null) | (DataType::Null, _) => Ok(Value::Null),

            (DataType::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (DataType::Int, Value::Float(f)) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
            (DataType::Int, Value::Bool(b)) => Ok(Value::Int(b as i64)),
            (DataType::Int, Value::String(s)) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| invalid(&Value::String(s))),
            (DataType::Int, Value::Enum(e)) => self
                .catalog
                .enumeration(&e.enum_type)
                .and_then(|def| def.ordinal(&e.variant))
                .map(|ordinal| Value::Int(ordinal as i64))
                .ok_or_else(|| invalid(&Value::Enum(e))),

            (DataType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (DataType::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (DataType::Float, Value::String(s)) => s
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| invalid(&Value::String(s))),

            (DataType::String, value) => Ok(Value::String(to_text(&value))),

            (DataType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (DataType::Bool, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid(&Value::String(s))),
            },

            (DataType::Enum(name), Value::Enum(e)) if &e.enum_type == name => Ok(Value::Enum(e)),
            // Different enums convert by variant name
            (DataType::Enum(name), Value::Enum(e)) if self.catalog.has_variant(name, &e.variant) => {
                Ok(Value::Enum(EnumValue::new(name, e.variant)))
            }
            (DataType::Enum(name), Value::String(s)) if self.catalog.has_variant(name, &s) => {
                Ok(Value::Enum(EnumValue::new(name, s)))
            }
            (DataType::Enum(name), Value::Int(i)) => self
                .catalog
                .enumeration(name)
                .and_then(|def| usize::try_from(i).ok().and_then(|i| def.variants.get(i)))
                .map(|variant| Value::Enum(EnumValue::new(name, variant)))
                .ok_or_else(|| invalid(&Value::Int(i))),

            (DataType::Record(name), Value::Record(r)) if &r.type_name == name => {
                Ok(Value::Record(r))
            }
            (DataType::Sequence(_), Value::List(items)) => Ok(Value::List(items)),

            (_, value) => Err(invalid(&value)),
        }
    }
}

fn arithmetic(
    op: BinaryOperator,
    left: Value,
    right: Value,
    expr: &Expr,
) -> Result<Value, EvalError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    if op == BinaryOperator::Add
        && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
    {
        return Ok(Value::String(format!("{}{}", to_text(&left), to_text(&right))));
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOperator::Add => a.checked_add(b),
                BinaryOperator::Subtract => a.checked_sub(b),
                BinaryOperator::Multiply => a.checked_mul(b),
                BinaryOperator::Divide | BinaryOperator::Modulo if b == 0 => {
                    return Err(EvalError::DivisionByZero)
                }
                BinaryOperator::Divide => a.checked_div(b),
                BinaryOperator::Modulo => a.checked_rem(b),
                _ => None,
            };
            result
                .map(Value::Int)
                .ok_or_else(|| EvalError::Overflow(expr.to_string()))
        }
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                BinaryOperator::Add => a + b,
                BinaryOperator::Subtract => a - b,
                BinaryOperator::Multiply => a * b,
                BinaryOperator::Divide => a / b,
                _ => a % b,
            })),
            _ => Err(EvalError::type_error(
                expr,
                format!("cannot apply `{}` to {} and {}", op.to_str(), left, right),
            )),
        },
    }
}

/// Plain text rendering used by string concatenation and `as string`.
fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Enum(e) => e.variant.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
