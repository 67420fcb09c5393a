//! Typed expression trees
//!
//! Queries, predicates, orderings and projections are all represented as
//! immutable `Expr` trees. Every node exposes its static type through
//! [`Expr::ty`], which is what lets the translator decide when a member access
//! crosses from destination vocabulary into source vocabulary.
//!
//! Trees are rebuilt, never mutated: rewriters consume a tree and return a new
//! one (see [`visitors`]).

use std::fmt;

pub mod binder;
pub mod errors;
pub mod operators;
pub mod parser;
pub mod types;
pub mod visitors;

pub use binder::{parse_expression, parse_lambda};
pub use errors::ParseError;
pub use operators::{BinaryOperator, Method, UnaryOperator};
pub use types::{DataType, EnumValue, ParameterTypes, ParameterValues, Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Root of a query: the sequence produced by the data source.
    Source(SourceRef),

    /// Lambda parameter reference.
    Parameter(Parameter),

    /// Named scalar parameter supplied with the query (`$name`).
    External(Parameter),

    Constant(Constant),

    /// Member access, e.g. `dto.Nested.AnotherBoolean`.
    Member(MemberAccess),

    Unary(UnaryExpr),

    Binary(BinaryExpr),

    /// `test ? if_true : if_false`
    Conditional(ConditionalExpr),

    /// Type conversion, `operand as target`.
    Convert(ConvertExpr),

    /// Method call on a receiver (sequence operators, string methods).
    Call(MethodCall),

    Lambda(Lambda),

    /// Record construction used by projections.
    New(NewRecord),
}

/// Query root over records of `element_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub element_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: DataType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Parameter {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: Value,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccess {
    pub target: Box<Expr>,
    pub member: String,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOperator,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOperator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpr {
    pub test: Box<Expr>,
    pub if_true: Box<Expr>,
    pub if_false: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertExpr {
    pub operand: Box<Expr>,
    pub target: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: Method,
    pub receiver: Box<Expr>,
    pub arguments: Vec<Expr>,
}

/// Single-parameter lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub parameter: Parameter,
    pub body: Box<Expr>,
}

impl Lambda {
    pub fn new(parameter: Parameter, body: Expr) -> Self {
        Lambda {
            parameter,
            body: Box::new(body),
        }
    }

    pub fn return_type(&self) -> DataType {
        self.body.ty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub type_name: String,
    pub fields: Vec<(String, Expr)>,
}

impl Expr {
    pub fn source(element_type: impl Into<String>) -> Expr {
        Expr::Source(SourceRef {
            element_type: element_type.into(),
        })
    }

    pub fn parameter(name: impl Into<String>, ty: DataType) -> Expr {
        Expr::Parameter(Parameter::new(name, ty))
    }

    pub fn external(name: impl Into<String>, ty: DataType) -> Expr {
        Expr::External(Parameter::new(name, ty))
    }

    /// Constant typed after its value.
    pub fn constant(value: impl Into<Value>) -> Expr {
        let value = value.into();
        let ty = value.data_type();
        Expr::Constant(Constant { value, ty })
    }

    pub fn typed_constant(value: Value, ty: DataType) -> Expr {
        Expr::Constant(Constant { value, ty })
    }

    pub fn member(self, member: impl Into<String>, ty: DataType) -> Expr {
        Expr::Member(MemberAccess {
            target: Box::new(self),
            member: member.into(),
            ty,
        })
    }

    pub fn unary(op: UnaryOperator, operand: Expr) -> Expr {
        Expr::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::Conditional(ConditionalExpr {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }

    pub fn convert(operand: Expr, target: DataType) -> Expr {
        Expr::Convert(ConvertExpr {
            operand: Box::new(operand),
            target,
        })
    }

    pub fn call(method: Method, receiver: Expr, arguments: Vec<Expr>) -> Expr {
        Expr::Call(MethodCall {
            method,
            receiver: Box::new(receiver),
            arguments,
        })
    }

    pub fn lambda(parameter: Parameter, body: Expr) -> Expr {
        Expr::Lambda(Lambda::new(parameter, body))
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, Expr::Constant(c) if c.value.is_null())
    }

    /// Static type of the node. For lambdas this is the type of the body.
    pub fn ty(&self) -> DataType {
        match self {
            Expr::Source(source) => DataType::sequence_of(DataType::record(&source.element_type)),
            Expr::Parameter(p) | Expr::External(p) => p.ty.clone(),
            Expr::Constant(c) => c.ty.clone(),
            Expr::Member(m) => m.ty.clone(),
            Expr::Unary(u) => match u.op {
                UnaryOperator::Not => DataType::Bool,
                UnaryOperator::Negate => u.operand.ty(),
            },
            Expr::Binary(b) => binary_result_type(b.op, &b.left.ty(), &b.right.ty()),
            Expr::Conditional(c) => match c.if_true.ty() {
                DataType::Null => c.if_false.ty(),
                ty => ty,
            },
            Expr::Convert(c) => c.target.clone(),
            Expr::Call(call) => call_result_type(call),
            Expr::Lambda(l) => l.body.ty(),
            Expr::New(n) => DataType::record(&n.type_name),
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Source(_) | Expr::Parameter(_) | Expr::External(_) | Expr::Constant(_) => {
                vec![]
            }
            Expr::Member(m) => vec![&*m.target],
            Expr::Unary(u) => vec![&*u.operand],
            Expr::Binary(b) => vec![&*b.left, &*b.right],
            Expr::Conditional(c) => vec![&*c.test, &*c.if_true, &*c.if_false],
            Expr::Convert(c) => vec![&*c.operand],
            Expr::Call(call) => {
                let mut children = vec![&*call.receiver];
                children.extend(call.arguments.iter());
                children
            }
            Expr::Lambda(l) => vec![&*l.body],
            Expr::New(n) => n.fields.iter().map(|(_, e)| e).collect(),
        }
    }

    /// Rebuild this node with every direct child passed through `f`.
    pub fn map_children<E>(self, f: &mut impl FnMut(Expr) -> Result<Expr, E>) -> Result<Expr, E> {
        Ok(match self {
            Expr::Source(_) | Expr::Parameter(_) | Expr::External(_) | Expr::Constant(_) => self,
            Expr::Member(m) => Expr::Member(MemberAccess {
                target: Box::new(f(*m.target)?),
                member: m.member,
                ty: m.ty,
            }),
            Expr::Unary(u) => Expr::unary(u.op, f(*u.operand)?),
            Expr::Binary(b) => Expr::binary(b.op, f(*b.left)?, f(*b.right)?),
            Expr::Conditional(c) => {
                Expr::conditional(f(*c.test)?, f(*c.if_true)?, f(*c.if_false)?)
            }
            Expr::Convert(c) => Expr::convert(f(*c.operand)?, c.target),
            Expr::Call(call) => {
                let receiver = f(*call.receiver)?;
                let arguments = call
                    .arguments
                    .into_iter()
                    .map(&mut *f)
                    .collect::<Result<Vec<_>, E>>()?;
                Expr::call(call.method, receiver, arguments)
            }
            Expr::Lambda(l) => Expr::lambda(l.parameter, f(*l.body)?),
            Expr::New(n) => Expr::New(NewRecord {
                type_name: n.type_name,
                fields: n
                    .fields
                    .into_iter()
                    .map(|(name, e)| Ok((name, f(e)?)))
                    .collect::<Result<Vec<_>, E>>()?,
            }),
        })
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}

pub(crate) fn binary_result_type(op: BinaryOperator, left: &DataType, right: &DataType) -> DataType {
    if op.is_comparison() || op.is_logical() {
        return DataType::Bool;
    }
    match op {
        BinaryOperator::Coalesce => match left {
            DataType::Null => right.clone(),
            _ => left.clone(),
        },
        BinaryOperator::Add if *left == DataType::String || *right == DataType::String => {
            DataType::String
        }
        _ => match (left, right) {
            (DataType::Float, _) | (_, DataType::Float) => DataType::Float,
            (DataType::Int, _) | (_, DataType::Int) => DataType::Int,
            _ => left.clone(),
        },
    }
}

fn call_result_type(call: &MethodCall) -> DataType {
    let receiver = call.receiver.ty();
    let element = receiver.element_type().cloned().unwrap_or(DataType::Null);
    let lambda_type = call.arguments.first().map(|arg| arg.ty());
    match call.method {
        Method::Where
        | Method::OrderBy
        | Method::OrderByDescending
        | Method::ThenBy
        | Method::ThenByDescending
        | Method::Skip
        | Method::Take
        | Method::Distinct => receiver,
        Method::Select => DataType::sequence_of(lambda_type.unwrap_or(element)),
        Method::Any
        | Method::All
        | Method::Contains
        | Method::StartsWith
        | Method::EndsWith
        | Method::ContainsText => DataType::Bool,
        Method::Count | Method::Length => DataType::Int,
        Method::First | Method::FirstOrDefault => element,
        Method::Sum | Method::Min | Method::Max => lambda_type.unwrap_or(element),
        Method::ToUpper | Method::ToLower => DataType::String,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Source(source) => write!(f, "source<{}>", source.element_type),
            Expr::Parameter(p) => write!(f, "{}", p.name),
            Expr::External(p) => write!(f, "${}", p.name),
            Expr::Constant(c) => write!(f, "{}", c.value),
            Expr::Member(m) => write!(f, "{}.{}", m.target, m.member),
            Expr::Unary(u) => write!(f, "{}{}", u.op.to_str(), u.operand),
            Expr::Binary(b) => write!(f, "({} {} {})", b.left, b.op.to_str(), b.right),
            Expr::Conditional(c) => {
                write!(f, "({} ? {} : {})", c.test, c.if_true, c.if_false)
            }
            Expr::Convert(c) => write!(f, "({} as {})", c.operand, c.target),
            Expr::Call(call) => {
                write!(f, "{}.{}(", call.receiver, call.method.name())?;
                for (i, arg) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Lambda(l) => write!(f, "{}", l),
            Expr::New(n) => {
                write!(f, "new {} {{", n.type_name)?;
                for (i, (name, value)) in n.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.parameter.name, self.body)
    }
}
