//! Destination-to-source expression translation
//!
//! [`ExpressionTranslator`] rewrites a tree written against destination
//! (view) types into an equivalent tree over source (entity) types:
//!
//! - the query root `source<Dto>` becomes `source<Entity>`
//! - lambda parameters are retyped to the source element type of the
//!   receiver they iterate over
//! - member chains go through [`member_resolver::MemberResolver`]
//! - comparisons between a translated source enum and a destination enum
//!   convert the destination side through the enum map, and so does the
//!   receiver of `contains` when its argument became a source enum
//!
//! Translation is all-or-nothing: the first failure aborts with the
//! offending sub-expression.

use crate::config::TranslationConfig;
use crate::expression::types::{DataType, EnumValue, Value};
use crate::expression::{BinaryOperator, Expr, Lambda, Method, NewRecord, Parameter};
use crate::mapping::MappingService;

pub mod errors;
pub mod member_resolver;

pub use errors::TranslationError;
use member_resolver::{MemberResolver, MemberStep};

pub struct ExpressionTranslator<'m> {
    mapping: &'m dyn MappingService,
    max_depth: usize,
    /// Destination parameter name -> translated parameter, innermost last.
    scopes: Vec<(String, Parameter)>,
    /// (destination element type, source element type) of the query root.
    root: Option<(String, String)>,
}

impl<'m> ExpressionTranslator<'m> {
    pub fn new(mapping: &'m dyn MappingService) -> Self {
        ExpressionTranslator {
            mapping,
            max_depth: TranslationConfig::default().max_expression_depth,
            scopes: Vec::new(),
            root: None,
        }
    }

    pub fn with_config(mut self, config: &TranslationConfig) -> Self {
        self.max_depth = config.max_expression_depth;
        self
    }

    /// Translate a query tree whose root is `source<root_destination>`.
    pub fn translate(
        &mut self,
        expr: &Expr,
        root_destination: &str,
        root_source: &str,
    ) -> Result<Expr, TranslationError> {
        self.check_depth(expr)?;
        self.root = Some((root_destination.to_string(), root_source.to_string()));
        let result = self.visit(expr);
        self.root = None;
        self.scopes.clear();

        let translated = result?;
        log::debug!("🔄 Translated `{}` into `{}`", expr, translated);
        Ok(translated)
    }

    /// Translate a lambda, giving its parameter `source_parameter_type`.
    pub fn translate_lambda(
        &mut self,
        lambda: &Lambda,
        source_parameter_type: &DataType,
    ) -> Result<Lambda, TranslationError> {
        self.check_depth(&lambda.body)?;
        let result = self.visit_lambda(lambda, source_parameter_type.clone());
        self.scopes.clear();
        result
    }

    fn check_depth(&self, expr: &Expr) -> Result<(), TranslationError> {
        let depth = expr.depth();
        if depth > self.max_depth {
            return Err(TranslationError::failed(
                expr,
                format!(
                    "expression depth {} exceeds the limit of {}",
                    depth, self.max_depth
                ),
            ));
        }
        Ok(())
    }

    fn visit(&mut self, expr: &Expr) -> Result<Expr, TranslationError> {
        match expr {
            Expr::Source(source) => match &self.root {
                Some((destination, root_source)) if *destination == source.element_type => {
                    Ok(Expr::source(root_source))
                }
                _ => Ok(expr.clone()),
            },

            Expr::Parameter(p) => Ok(self
                .scopes
                .iter()
                .rev()
                .find(|(name, _)| *name == p.name)
                .map(|(_, translated)| Expr::Parameter(translated.clone()))
                .unwrap_or_else(|| expr.clone())),

            Expr::External(_) | Expr::Constant(_) => Ok(expr.clone()),

            Expr::Member(_) => self.visit_member_chain(expr),

            Expr::Unary(u) => Ok(Expr::unary(u.op, self.visit(&u.operand)?)),

            Expr::Binary(b) => {
                let left = self.visit(&b.left)?;
                let right = self.visit(&b.right)?;
                let (left, right) = if b.op.is_comparison() || b.op == BinaryOperator::Coalesce {
                    self.reconcile_enums(&b.left, left, &b.right, right)?
                } else {
                    (left, right)
                };
                Ok(Expr::binary(b.op, left, right))
            }

            Expr::Conditional(c) => {
                let test = self.visit(&c.test)?;
                let if_true = self.visit(&c.if_true)?;
                let if_false = self.visit(&c.if_false)?;
                let (if_true, if_false) =
                    self.reconcile_enums(&c.if_true, if_true, &c.if_false, if_false)?;
                Ok(Expr::conditional(test, if_true, if_false))
            }

            Expr::Convert(c) => {
                let operand = self.visit(&c.operand)?;
                let target = self.source_type_for(&c.target, &operand.ty());
                Ok(Expr::convert(operand, target))
            }

            Expr::Call(call) => {
                let receiver = self.visit(&call.receiver)?;
                let element_type = receiver.ty().element_type().cloned();
                let mut arguments = Vec::with_capacity(call.arguments.len());
                for argument in &call.arguments {
                    let translated = match (argument, &element_type) {
                        (Expr::Lambda(lambda), Some(element)) => {
                            Expr::Lambda(self.visit_lambda(lambda, element.clone())?)
                        }
                        _ => self.visit(argument)?,
                    };
                    arguments.push(translated);
                }
                if call.method == Method::Contains && arguments.len() == 1 {
                    let argument = arguments.remove(0);
                    let (receiver, argument) = self.reconcile_contains(
                        &call.receiver,
                        receiver,
                        &call.arguments[0],
                        argument,
                    )?;
                    return Ok(Expr::call(call.method, receiver, vec![argument]));
                }
                Ok(Expr::call(call.method, receiver, arguments))
            }

            Expr::Lambda(lambda) => {
                let parameter_type =
                    self.source_type_for(&lambda.parameter.ty, &lambda.parameter.ty);
                Ok(Expr::Lambda(self.visit_lambda(lambda, parameter_type)?))
            }

            Expr::New(n) => {
                let fields = n
                    .fields
                    .iter()
                    .map(|(name, field)| Ok((name.clone(), self.visit(field)?)))
                    .collect::<Result<Vec<_>, TranslationError>>()?;
                Ok(Expr::New(NewRecord {
                    type_name: n.type_name.clone(),
                    fields,
                }))
            }
        }
    }

    fn visit_lambda(
        &mut self,
        lambda: &Lambda,
        parameter_type: DataType,
    ) -> Result<Lambda, TranslationError> {
        let parameter = Parameter::new(&lambda.parameter.name, parameter_type);
        self.scopes
            .push((lambda.parameter.name.clone(), parameter.clone()));
        let body = self.visit(&lambda.body);
        self.scopes.pop();
        Ok(Lambda::new(parameter, body?))
    }

    /// Flatten `base.a.b.c` to its base, translate the base, then resolve the
    /// steps against the mapping.
    fn visit_member_chain(&mut self, expr: &Expr) -> Result<Expr, TranslationError> {
        let mut steps: Vec<MemberStep> = Vec::new();
        let mut base = expr;
        while let Expr::Member(member) = base {
            steps.push((member.member.clone(), member.ty.clone()));
            base = member.target.as_ref();
        }
        steps.reverse();

        let translated_base = self.visit(base)?;
        let destination_type = base.ty();
        if translated_base.ty() == destination_type {
            // Nothing was retyped underneath, keep the chain as written
            return Ok(steps.into_iter().fold(translated_base, |target, (name, ty)| {
                target.member(name, ty)
            }));
        }

        MemberResolver::new(self.mapping).resolve(translated_base, &destination_type, &steps)
    }

    /// Bring two sibling operands to the same enum type when translation left
    /// one of them over a source enum and the other over a destination enum.
    fn reconcile_enums(
        &self,
        left_original: &Expr,
        left: Expr,
        right_original: &Expr,
        right: Expr,
    ) -> Result<(Expr, Expr), TranslationError> {
        let (left_type, right_type) = (left.ty(), right.ty());
        let (Some(left_enum), Some(right_enum)) = (left_type.enum_name(), right_type.enum_name())
        else {
            return Ok((left, right));
        };
        if left_enum == right_enum {
            return Ok((left, right));
        }

        let left_changed = left_type != left_original.ty();
        let right_changed = right_type != right_original.ty();
        match (left_changed, right_changed) {
            (true, false) => {
                let right = self.to_source_enum(right, left_enum, right_enum)?;
                Ok((left, right))
            }
            (false, true) => {
                let left = self.to_source_enum(left, right_enum, left_enum)?;
                Ok((left, right))
            }
            _ => Ok((left, right)),
        }
    }

    /// `receiver.contains(argument)` where one side was retyped to a source
    /// enum and the other still holds destination enum values.
    fn reconcile_contains(
        &self,
        receiver_original: &Expr,
        receiver: Expr,
        argument_original: &Expr,
        argument: Expr,
    ) -> Result<(Expr, Expr), TranslationError> {
        let (receiver_type, argument_type) = (receiver.ty(), argument.ty());
        let (Some(element_enum), Some(argument_enum)) = (
            receiver_type.element_type().and_then(|e| e.enum_name()),
            argument_type.enum_name(),
        ) else {
            return Ok((receiver, argument));
        };
        if element_enum == argument_enum {
            return Ok((receiver, argument));
        }

        let receiver_changed = receiver_type != receiver_original.ty();
        let argument_changed = argument_type != argument_original.ty();
        match (receiver_changed, argument_changed) {
            (false, true) => {
                let receiver = self.sequence_to_source_enum(receiver, argument_enum, element_enum)?;
                Ok((receiver, argument))
            }
            (true, false) => {
                let argument = self.to_source_enum(argument, element_enum, argument_enum)?;
                Ok((receiver, argument))
            }
            _ => Ok((receiver, argument)),
        }
    }

    /// Element-wise [`Self::to_source_enum`] over a sequence of destination
    /// enum values. Constant lists are converted in place; anything else
    /// (including `$parameters` bound after translation) gets a `select`.
    fn sequence_to_source_enum(
        &self,
        expr: Expr,
        source: &str,
        destination: &str,
    ) -> Result<Expr, TranslationError> {
        let source_sequence = DataType::sequence_of(DataType::enumeration(source));
        if let Expr::Constant(constant) = &expr {
            return match &constant.value {
                Value::Null => Ok(Expr::typed_constant(Value::Null, source_sequence)),
                Value::List(items) => {
                    let converted = items
                        .iter()
                        .map(|item| {
                            let element = Expr::typed_constant(
                                item.clone(),
                                DataType::enumeration(destination),
                            );
                            match self.to_source_enum(element, source, destination)? {
                                Expr::Constant(c) => Ok(c.value),
                                other => Err(TranslationError::failed(
                                    &other,
                                    "expected an enum constant",
                                )),
                            }
                        })
                        .collect::<Result<Vec<_>, TranslationError>>()?;
                    Ok(Expr::typed_constant(Value::List(converted), source_sequence))
                }
                _ => Err(TranslationError::failed(&expr, "expected a list of enum constants")),
            };
        }

        let item = Parameter::new("item", DataType::enumeration(destination));
        let converted = self.to_source_enum(Expr::Parameter(item.clone()), source, destination)?;
        Ok(Expr::call(
            Method::Select,
            expr,
            vec![Expr::lambda(item, converted)],
        ))
    }

    /// Convert `expr` of destination enum `destination` into source enum
    /// `source`.
    fn to_source_enum(
        &self,
        expr: Expr,
        source: &str,
        destination: &str,
    ) -> Result<Expr, TranslationError> {
        let map = self.mapping.enum_map(source, destination).ok_or_else(|| {
            TranslationError::failed(
                &expr,
                format!("no enum map from `{}` to `{}`", source, destination),
            )
        })?;
        let source_type = DataType::enumeration(source);

        if let Expr::Constant(constant) = &expr {
            return match &constant.value {
                Value::Null => Ok(Expr::typed_constant(Value::Null, source_type)),
                Value::Enum(value) => match map.to_source(&value.variant) {
                    Some(variant) => Ok(Expr::typed_constant(
                        Value::Enum(EnumValue::new(source, variant)),
                        source_type,
                    )),
                    None => Err(TranslationError::failed(
                        &expr,
                        format!("`{}` has no counterpart in `{}`", value.variant, source),
                    )),
                },
                _ => Err(TranslationError::failed(&expr, "expected an enum constant")),
            };
        }

        // x == D::a ? S::a : (x == D::b ? S::b : null)
        let fallback = Expr::typed_constant(Value::Null, source_type.clone());
        Ok(map
            .pairs
            .iter()
            .rev()
            .fold(fallback, |otherwise, (source_variant, destination_variant)| {
                let test = Expr::binary(
                    BinaryOperator::Equal,
                    expr.clone(),
                    Expr::typed_constant(
                        Value::Enum(EnumValue::new(destination, destination_variant)),
                        DataType::enumeration(destination),
                    ),
                );
                let converted = Expr::typed_constant(
                    Value::Enum(EnumValue::new(source, source_variant)),
                    source_type.clone(),
                );
                Expr::conditional(test, converted, otherwise)
            }))
    }

    /// Source-side counterpart of a destination type, using `hint` (the type
    /// of the translated operand) to pick among several candidates.
    fn source_type_for(&self, destination: &DataType, hint: &DataType) -> DataType {
        match destination {
            DataType::Sequence(element) => {
                let hint = hint.element_type().unwrap_or(hint);
                DataType::sequence_of(self.source_type_for(element, hint))
            }
            DataType::Record(name) => {
                if let Some(hinted) = hint.record_name() {
                    if self.mapping.has_type_map(hinted, name) {
                        return hint.clone();
                    }
                }
                if let Some((dest, source)) = &self.root {
                    if dest == name {
                        return DataType::record(source);
                    }
                }
                match self.mapping.source_types_for(name).as_slice() {
                    [only] => DataType::record(only),
                    _ => destination.clone(),
                }
            }
            DataType::Enum(name) => match hint.enum_name() {
                Some(hinted) if self.mapping.enum_map(hinted, name).is_some() => hint.clone(),
                _ => destination.clone(),
            },
            _ => destination.clone(),
        }
    }
}
