//! Resolves a destination member chain into source vocabulary.
//!
//! Given the translated base of a chain (already typed over the source) and
//! the destination type it stood for, each step either stays a plain member
//! access (types already agree) or is looked up in the mapping service:
//!
//! - `Path`: append the source member chain
//! - `Nested`: keep the same source expression for the nested destination
//!   record
//! - `Convert`: inline the conversion lambda over the current expression
//!
//! After a conversion, remaining steps continue from the inlined body, so
//! `dto.Address.City` works when `Address` is produced by a conversion whose
//! result type has its own type map to the destination `Address`.

use crate::expression::visitors::substitute_parameter;
use crate::expression::{DataType, Expr};
use crate::mapping::{MappingRule, MappingService};

use super::errors::TranslationError;

/// One destination member step: (member name, destination member type).
pub type MemberStep = (String, DataType);

pub struct MemberResolver<'m> {
    mapping: &'m dyn MappingService,
}

impl<'m> MemberResolver<'m> {
    pub fn new(mapping: &'m dyn MappingService) -> Self {
        MemberResolver { mapping }
    }

    pub fn resolve(
        &self,
        base: Expr,
        destination: &DataType,
        steps: &[MemberStep],
    ) -> Result<Expr, TranslationError> {
        let mut current = base;
        let mut current_destination = destination.clone();

        for (member, member_type) in steps {
            let source_type = current.ty();
            if source_type == current_destination {
                current = current.member(member, member_type.clone());
                current_destination = member_type.clone();
                continue;
            }

            let (Some(source_record), Some(destination_record)) =
                (source_type.record_name(), current_destination.record_name())
            else {
                return Err(TranslationError::failed(
                    &current,
                    format!(
                        "cannot resolve `{}` of `{}` against `{}`",
                        member, current_destination, source_type
                    ),
                ));
            };

            let rule = self
                .mapping
                .mapping_rule(source_record, destination_record, member)
                .ok_or_else(|| TranslationError::MappingNotFound {
                    source_type: source_record.to_string(),
                    destination_type: destination_record.to_string(),
                    member: member.clone(),
                })?;

            log::debug!(
                "Resolving {}.{} over {} via {}",
                destination_record,
                member,
                source_record,
                rule
            );

            current = match rule {
                MappingRule::Path(path) => {
                    let mut expr = current;
                    for segment in path.segments() {
                        expr = self.source_member(expr, segment)?;
                    }
                    expr
                }
                MappingRule::Nested => current,
                MappingRule::Convert(lambda) => {
                    substitute_parameter((*lambda.body).clone(), &lambda.parameter.name, &current)
                }
            };
            current_destination = member_type.clone();
        }

        Ok(current)
    }

    fn source_member(&self, target: Expr, member: &str) -> Result<Expr, TranslationError> {
        let target_type = target.ty();
        let member_type = target_type
            .record_name()
            .and_then(|record| self.mapping.catalog().field_type(record, member))
            .cloned();
        match member_type {
            Some(ty) => Ok(target.member(member, ty)),
            None => Err(TranslationError::failed(
                &target,
                format!("source type `{}` has no member `{}`", target_type, member),
            )),
        }
    }
}
