//! Name and type resolution for parsed expressions.
//!
//! Turns the untyped [`ParsedExpr`] produced by the parser into a typed
//! [`Expr`], resolving identifiers against the lambda scope, member accesses
//! against the [`TypeCatalog`] and `$names` against the declared parameter
//! types.

use log::debug;

use crate::mapping::catalog::TypeCatalog;

use super::errors::ParseError;
use super::operators::{method_by_name, BinaryOperator, Method, UnaryOperator};
use super::parser::{self, Literal, ParsedExpr};
use super::types::{DataType, EnumValue, ParameterTypes, Value};
use super::{Expr, Lambda, NewRecord, Parameter};

/// Parse `text` as a single-parameter lambda whose parameter has type
/// `parameter_type`.
pub fn parse_lambda(
    text: &str,
    parameter_type: &DataType,
    catalog: &TypeCatalog,
    externals: &ParameterTypes,
) -> Result<Lambda, ParseError> {
    let parsed = parser::parse(text)?;
    let ParsedExpr::Lambda { parameter, body } = parsed else {
        return Err(ParseError::NotALambda(text.to_string()));
    };

    let mut binder = Binder::new(catalog, externals);
    let lambda = binder.bind_lambda(&parameter, &body, parameter_type.clone())?;
    debug!("Bound lambda `{}` over {}", lambda, parameter_type);
    Ok(lambda)
}

/// Parse `text` as an expression with the given parameters in scope.
pub fn parse_expression(
    text: &str,
    scope: &[Parameter],
    catalog: &TypeCatalog,
    externals: &ParameterTypes,
) -> Result<Expr, ParseError> {
    let parsed = parser::parse(text)?;
    let mut binder = Binder::new(catalog, externals);
    binder.scope.extend(scope.iter().cloned());
    binder.bind(&parsed)
}

struct Binder<'a> {
    catalog: &'a TypeCatalog,
    externals: &'a ParameterTypes,
    scope: Vec<Parameter>,
}

impl<'a> Binder<'a> {
    fn new(catalog: &'a TypeCatalog, externals: &'a ParameterTypes) -> Self {
        Binder {
            catalog,
            externals,
            scope: Vec::new(),
        }
    }

    fn bind_lambda(
        &mut self,
        name: &str,
        body: &ParsedExpr,
        parameter_type: DataType,
    ) -> Result<Lambda, ParseError> {
        let parameter = Parameter::new(name, parameter_type);
        self.scope.push(parameter.clone());
        let body = self.bind(body);
        self.scope.pop();
        Ok(Lambda::new(parameter, body?))
    }

    fn bind(&mut self, parsed: &ParsedExpr) -> Result<Expr, ParseError> {
        match parsed {
            ParsedExpr::Identifier(name) => self
                .scope
                .iter()
                .rev()
                .find(|p| &p.name == name)
                .map(|p| Expr::Parameter(p.clone()))
                .ok_or_else(|| ParseError::UnknownIdentifier(name.clone())),

            ParsedExpr::Literal(literal) => Ok(bind_literal(literal)),

            ParsedExpr::EnumLiteral { enum_type, variant } => {
                if self.catalog.enumeration(enum_type).is_none() {
                    return Err(ParseError::UnknownType(enum_type.clone()));
                }
                if !self.catalog.has_variant(enum_type, variant) {
                    return Err(ParseError::UnknownVariant {
                        enum_type: enum_type.clone(),
                        variant: variant.clone(),
                    });
                }
                Ok(Expr::typed_constant(
                    Value::Enum(EnumValue::new(enum_type, variant)),
                    DataType::enumeration(enum_type),
                ))
            }

            ParsedExpr::External(name) => self
                .externals
                .get(name)
                .map(|ty| Expr::external(name, ty.clone()))
                .ok_or_else(|| ParseError::UnknownParameter(name.clone())),

            ParsedExpr::Member { target, member } => {
                let target = self.bind(target)?;
                let target_type = target.ty();
                let Some(record) = target_type.record_name() else {
                    return Err(ParseError::TypeMismatch {
                        context: format!("{}.{}", target, member),
                        message: format!("`{}` has no members", target_type),
                    });
                };
                let ty = self
                    .catalog
                    .field_type(record, member)
                    .cloned()
                    .ok_or_else(|| ParseError::UnknownMember {
                        type_name: record.to_string(),
                        member: member.clone(),
                    })?;
                Ok(target.member(member, ty))
            }

            ParsedExpr::Call {
                receiver,
                method,
                args,
            } => self.bind_call(receiver, method, args),

            ParsedExpr::Unary { op, operand } => {
                // Fold negative numeric literals into constants
                if *op == UnaryOperator::Negate {
                    match operand.as_ref() {
                        ParsedExpr::Literal(Literal::Integer(i)) => return Ok(Expr::constant(-*i)),
                        ParsedExpr::Literal(Literal::Float(f)) => return Ok(Expr::constant(-*f)),
                        _ => {}
                    }
                }
                let operand = self.bind(operand)?;
                let operand_type = operand.ty();
                let valid = match op {
                    UnaryOperator::Not => DataType::Bool.accepts(&operand_type),
                    UnaryOperator::Negate => {
                        operand_type.is_numeric() || operand_type == DataType::Null
                    }
                };
                if !valid {
                    return Err(ParseError::TypeMismatch {
                        context: format!("{}{}", op.to_str(), operand),
                        message: format!("operand has type `{}`", operand_type),
                    });
                }
                Ok(Expr::unary(*op, operand))
            }

            ParsedExpr::Binary { op, left, right } => {
                let left = self.bind(left)?;
                let right = self.bind(right)?;
                check_binary(*op, &left, &right)?;
                Ok(Expr::binary(*op, left, right))
            }

            ParsedExpr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let test = self.bind(test)?;
                if !DataType::Bool.accepts(&test.ty()) {
                    return Err(ParseError::TypeMismatch {
                        context: test.to_string(),
                        message: "condition must be a bool".to_string(),
                    });
                }
                let if_true = self.bind(if_true)?;
                let if_false = self.bind(if_false)?;
                let (a, b) = (if_true.ty(), if_false.ty());
                if !a.accepts(&b) && !b.accepts(&a) {
                    return Err(ParseError::TypeMismatch {
                        context: format!("{} : {}", if_true, if_false),
                        message: format!("branches have types `{}` and `{}`", a, b),
                    });
                }
                Ok(Expr::conditional(test, if_true, if_false))
            }

            ParsedExpr::Cast { operand, type_name } => {
                let operand = self.bind(operand)?;
                let target = self
                    .catalog
                    .resolve_type(type_name)
                    .map_err(|_| ParseError::UnknownType(type_name.clone()))?;
                Ok(Expr::convert(operand, target))
            }

            ParsedExpr::Lambda { parameter, .. } => Err(ParseError::TypeMismatch {
                context: format!("{} => ...", parameter),
                message: "lambdas are only allowed as method arguments".to_string(),
            }),

            ParsedExpr::New { type_name, fields } => {
                let record = self
                    .catalog
                    .record(type_name)
                    .ok_or_else(|| ParseError::UnknownType(type_name.clone()))?;
                let mut bound = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    if record.field_type(name).is_none() {
                        return Err(ParseError::UnknownMember {
                            type_name: type_name.clone(),
                            member: name.clone(),
                        });
                    }
                    bound.push((name.clone(), self.bind(value)?));
                }
                Ok(Expr::New(NewRecord {
                    type_name: type_name.clone(),
                    fields: bound,
                }))
            }
        }
    }

    fn bind_call(
        &mut self,
        receiver: &ParsedExpr,
        name: &str,
        args: &[ParsedExpr],
    ) -> Result<Expr, ParseError> {
        let method =
            method_by_name(name).ok_or_else(|| ParseError::UnknownMethod(name.to_string()))?;
        let receiver = self.bind(receiver)?;
        let receiver_type = receiver.ty();

        let (min, max) = method.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}..{}", min, max)
            };
            return Err(ParseError::ArgumentCount {
                method: method.name().to_string(),
                expected,
                actual: args.len(),
            });
        }

        let element_type = if method.is_string_method() {
            if !DataType::String.accepts(&receiver_type) {
                return Err(receiver_mismatch(method, &receiver, "a string"));
            }
            None
        } else {
            match receiver_type.element_type() {
                Some(element) => Some(element.clone()),
                None => return Err(receiver_mismatch(method, &receiver, "a sequence")),
            }
        };

        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            let bound = match (arg, &element_type) {
                (ParsedExpr::Lambda { parameter, body }, Some(element))
                    if method.takes_lambda() =>
                {
                    let lambda = self.bind_lambda(parameter, body, element.clone())?;
                    if matches!(method, Method::Where | Method::All | Method::Any | Method::Count)
                        && !DataType::Bool.accepts(&lambda.return_type())
                    {
                        return Err(ParseError::TypeMismatch {
                            context: lambda.to_string(),
                            message: format!("`{}` needs a predicate", method.name()),
                        });
                    }
                    Expr::Lambda(lambda)
                }
                (other, _) if method.takes_lambda() => {
                    return Err(ParseError::TypeMismatch {
                        context: format!("{:?}", other),
                        message: format!("`{}` expects a lambda argument", method.name()),
                    });
                }
                (other, _) => self.bind(other)?,
            };
            arguments.push(bound);
        }

        if matches!(method, Method::Skip | Method::Take) {
            if let Some(count) = arguments.first() {
                if !DataType::Int.accepts(&count.ty()) {
                    return Err(ParseError::TypeMismatch {
                        context: count.to_string(),
                        message: format!("`{}` expects an int", method.name()),
                    });
                }
            }
        }

        if method == Method::Contains {
            if let (Some(item), Some(element)) = (arguments.first(), &element_type) {
                if !element.accepts(&item.ty()) {
                    return Err(ParseError::TypeMismatch {
                        context: item.to_string(),
                        message: format!(
                            "`contains` over `{}` cannot look for `{}`",
                            element,
                            item.ty()
                        ),
                    });
                }
            }
        }

        Ok(Expr::call(method, receiver, arguments))
    }
}

fn bind_literal(literal: &Literal) -> Expr {
    match literal {
        Literal::String(s) => Expr::constant(s.as_str()),
        Literal::Integer(i) => Expr::constant(*i),
        Literal::Float(f) => Expr::constant(*f),
        Literal::Bool(b) => Expr::constant(*b),
        Literal::Null => Expr::typed_constant(Value::Null, DataType::Null),
    }
}

fn receiver_mismatch(method: Method, receiver: &Expr, expected: &str) -> ParseError {
    ParseError::TypeMismatch {
        context: format!("{}.{}()", receiver, method.name()),
        message: format!(
            "receiver has type `{}`, expected {}",
            receiver.ty(),
            expected
        ),
    }
}

fn check_binary(op: BinaryOperator, left: &Expr, right: &Expr) -> Result<(), ParseError> {
    let (l, r) = (left.ty(), right.ty());
    let valid = if op.is_logical() {
        DataType::Bool.accepts(&l) && DataType::Bool.accepts(&r)
    } else if op.is_arithmetic() {
        let numeric = |t: &DataType| t.is_numeric() || *t == DataType::Null;
        (numeric(&l) && numeric(&r))
            || (op == BinaryOperator::Add && (l == DataType::String || r == DataType::String))
    } else {
        // Comparisons and coalesce need compatible operands
        l.accepts(&r) || r.accepts(&l)
    };

    if valid {
        Ok(())
    } else {
        Err(ParseError::TypeMismatch {
            context: format!("({} {} {})", left, op.to_str(), right),
            message: format!("operands have types `{}` and `{}`", l, r),
        })
    }
}
