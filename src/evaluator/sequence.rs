//! Method calls: sequence operators and string methods.

use std::cmp::Ordering;

use crate::expression::types::{DataType, Value};
use crate::expression::{Expr, Method, MethodCall};

use super::{Env, EvalError, Evaluator};

impl<'a> Evaluator<'a> {
    pub(super) fn call(
        &self,
        call: &MethodCall,
        expr: &Expr,
        env: &mut Env,
    ) -> Result<Value, EvalError> {
        if call.method.is_ordering() {
            return self.order(call, env);
        }

        let receiver = self.eval(&call.receiver, env)?;
        if call.method.is_string_method() {
            return self.string_method(call, receiver, expr, env);
        }

        let items = match receiver {
            Value::List(items) => items,
            // A missing collection behaves as an empty one
            Value::Null => Vec::new(),
            other => {
                return Err(EvalError::type_error(
                    expr,
                    format!("`{}` needs a sequence, found {}", call.method.name(), other),
                ))
            }
        };
        let argument = call.arguments.first();

        match call.method {
            Method::Where => {
                let predicate = required(argument, call)?;
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if self.test(predicate, item.clone(), env)? {
                        kept.push(item);
                    }
                }
                Ok(Value::List(kept))
            }
            Method::Select => {
                let selector = required(argument, call)?;
                items
                    .into_iter()
                    .map(|item| self.invoke(selector, item, env))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            Method::Skip | Method::Take => {
                let count = self.count_argument(required(argument, call)?, env)?;
                Ok(Value::List(if call.method == Method::Skip {
                    items.into_iter().skip(count).collect()
                } else {
                    items.into_iter().take(count).collect()
                }))
            }
            Method::Distinct => {
                let mut unique: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !unique.iter().any(|seen| seen.loosely_equals(&item)) {
                        unique.push(item);
                    }
                }
                Ok(Value::List(unique))
            }
            Method::Any => match argument {
                None => Ok(Value::Bool(!items.is_empty())),
                Some(predicate) => {
                    for item in items {
                        if self.test(predicate, item, env)? {
                            return Ok(Value::Bool(true));
                        }
                    }
                    Ok(Value::Bool(false))
                }
            },
            Method::All => {
                let predicate = required(argument, call)?;
                for item in items {
                    if !self.test(predicate, item, env)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Method::Count => {
                let count = match argument {
                    None => items.len(),
                    Some(predicate) => {
                        let mut count = 0;
                        for item in items {
                            if self.test(predicate, item, env)? {
                                count += 1;
                            }
                        }
                        count
                    }
                };
                Ok(Value::Int(count as i64))
            }
            Method::Contains => {
                let needle = self.eval(required(argument, call)?, env)?;
                Ok(Value::Bool(items.iter().any(|item| item.loosely_equals(&needle))))
            }
            Method::First | Method::FirstOrDefault => {
                let found = match argument {
                    None => items.into_iter().next(),
                    Some(predicate) => {
                        let mut found = None;
                        for item in items {
                            if self.test(predicate, item.clone(), env)? {
                                found = Some(item);
                                break;
                            }
                        }
                        found
                    }
                };
                match (found, call.method) {
                    (Some(item), _) => Ok(item),
                    (None, Method::FirstOrDefault) => Ok(Value::Null),
                    (None, _) => Err(EvalError::EmptySequence(call.method.name().to_string())),
                }
            }
            Method::Sum | Method::Min | Method::Max => {
                let values = match argument {
                    None => items,
                    Some(selector) => items
                        .into_iter()
                        .map(|item| self.invoke(selector, item, env))
                        .collect::<Result<Vec<_>, _>>()?,
                };
                let values: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
                if call.method == Method::Sum {
                    sum(values, &expr.ty(), expr)
                } else {
                    self.extreme(values, call.method == Method::Max)
                }
            }
            _ => Err(EvalError::type_error(expr, "unsupported method")),
        }
    }

    fn string_method(
        &self,
        call: &MethodCall,
        receiver: Value,
        expr: &Expr,
        env: &mut Env,
    ) -> Result<Value, EvalError> {
        let text = match receiver {
            Value::Null => return Ok(Value::Null),
            Value::String(s) => s,
            other => {
                return Err(EvalError::type_error(
                    expr,
                    format!("`{}` needs a string, found {}", call.method.name(), other),
                ))
            }
        };

        let pattern = match call.arguments.first() {
            Some(argument) => match self.eval(argument, env)? {
                Value::String(s) => Some(s),
                Value::Null => return Ok(Value::Null),
                other => {
                    return Err(EvalError::type_error(
                        expr,
                        format!("expected a string argument, found {}", other),
                    ))
                }
            },
            None => None,
        };
        let pattern = pattern.as_deref().unwrap_or_default();

        Ok(match call.method {
            Method::StartsWith => Value::Bool(text.starts_with(pattern)),
            Method::EndsWith => Value::Bool(text.ends_with(pattern)),
            Method::ContainsText => Value::Bool(text.contains(pattern)),
            Method::ToUpper => Value::String(text.to_uppercase()),
            Method::ToLower => Value::String(text.to_lowercase()),
            Method::Length => Value::Int(text.chars().count() as i64),
            _ => return Err(EvalError::type_error(expr, "unsupported string method")),
        })
    }

    /// Evaluate an `order_by ... then_by ...` chain as one stable multi-key
    /// sort.
    fn order(&self, call: &MethodCall, env: &mut Env) -> Result<Value, EvalError> {
        let mut keys = Vec::new();
        let mut current = call;
        let base = loop {
            keys.push((required(current.arguments.first(), current)?, current.method.is_descending()));
            if matches!(current.method, Method::OrderBy | Method::OrderByDescending) {
                break &current.receiver;
            }
            match current.receiver.as_ref() {
                Expr::Call(inner) if inner.method.is_ordering() => current = inner,
                _ => break &current.receiver,
            }
        };
        keys.reverse();

        let items = match self.eval(base, env)? {
            Value::List(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(EvalError::type_error(
                    base,
                    format!("ordering needs a sequence, found {}", other),
                ))
            }
        };

        let mut keyed = Vec::with_capacity(items.len());
        for item in items {
            let mut row_keys = Vec::with_capacity(keys.len());
            for (selector, _) in &keys {
                row_keys.push(self.invoke(selector, item.clone(), env)?);
            }
            keyed.push((row_keys, item));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (index, (_, descending)) in keys.iter().enumerate() {
                let ordering = self.sort_order(&a[index], &b[index]);
                let ordering = if *descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
    }

    /// Nulls sort first; incomparable values keep their relative order.
    fn sort_order(&self, a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => self.compare_values(a, b).unwrap_or(Ordering::Equal),
        }
    }

    fn extreme(&self, values: Vec<Value>, max: bool) -> Result<Value, EvalError> {
        let mut best: Option<Value> = None;
        for value in values {
            best = Some(match best {
                None => value,
                Some(current) => {
                    let ordering = self.compare_values(&value, &current).ok_or_else(|| {
                        EvalError::Incomparable {
                            left: value.to_string(),
                            right: current.to_string(),
                        }
                    })?;
                    let replace = if max {
                        ordering == Ordering::Greater
                    } else {
                        ordering == Ordering::Less
                    };
                    if replace {
                        value
                    } else {
                        current
                    }
                }
            });
        }
        Ok(best.unwrap_or(Value::Null))
    }

    fn invoke(&self, lambda: &Expr, argument: Value, env: &mut Env) -> Result<Value, EvalError> {
        let Expr::Lambda(lambda) = lambda else {
            return Err(EvalError::type_error(lambda, "expected a lambda"));
        };
        env.push((lambda.parameter.name.clone(), argument));
        let result = self.eval(&lambda.body, env);
        env.pop();
        result
    }

    fn test(&self, predicate: &Expr, argument: Value, env: &mut Env) -> Result<bool, EvalError> {
        match self.invoke(predicate, argument, env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvalError::type_error(
                predicate,
                format!("predicate returned {}", other),
            )),
        }
    }

    fn count_argument(&self, argument: &Expr, env: &mut Env) -> Result<usize, EvalError> {
        match self.eval(argument, env)? {
            Value::Int(n) => Ok(usize::try_from(n).unwrap_or(0)),
            other => Err(EvalError::type_error(
                argument,
                format!("expected an int, found {}", other),
            )),
        }
    }
}

fn required<'e>(argument: Option<&'e Expr>, call: &MethodCall) -> Result<&'e Expr, EvalError> {
    argument.ok_or_else(|| {
        EvalError::type_error(call.method.name(), "missing argument")
    })
}

fn sum(values: Vec<Value>, result_type: &DataType, expr: &Expr) -> Result<Value, EvalError> {
    if *result_type == DataType::Float || values.iter().any(|v| matches!(v, Value::Float(_))) {
        let mut total = 0.0;
        for value in &values {
            total += value.as_float().ok_or_else(|| {
                EvalError::type_error(expr, format!("cannot sum {}", value))
            })?;
        }
        return Ok(Value::Float(total));
    }

    let mut total: i64 = 0;
    for value in &values {
        let n = value
            .as_int()
            .ok_or_else(|| EvalError::type_error(expr, format!("cannot sum {}", value)))?;
        total = total
            .checked_add(n)
            .ok_or_else(|| EvalError::Overflow(expr.to_string()))?;
    }
    Ok(Value::Int(total))
}
