//! Materialization of source values as destination values.

use log::{debug, warn};

use crate::evaluator::Evaluator;
use crate::expression::types::{DataType, EnumValue, ParameterValues, Record, Value};

use super::{MappingConfiguration, MappingError, MappingRule, MappingService, MemberPath};

impl MappingConfiguration {
    pub(super) fn materialize(
        &self,
        value: &Value,
        destination: &DataType,
        parameters: &ParameterValues,
    ) -> Result<Value, MappingError> {
        match (value, destination) {
            (Value::Null, _) => Ok(Value::Null),

            (Value::List(items), DataType::Sequence(element)) => items
                .iter()
                .map(|item| self.materialize(item, element, parameters))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),

            (Value::Record(record), DataType::Record(name)) if &record.type_name == name => {
                Ok(value.clone())
            }
            (Value::Record(record), DataType::Record(name)) => {
                self.materialize_record(record, name, parameters)
            }

            (Value::Enum(e), DataType::Enum(name)) if &e.enum_type == name => Ok(value.clone()),
            (Value::Enum(e), DataType::Enum(name)) => {
                let map = self.enum_map(&e.enum_type, name).ok_or_else(|| {
                    MappingError::EnumMapNotFound {
                        source_type: e.enum_type.clone(),
                        destination_type: name.clone(),
                    }
                })?;
                let variant = map.to_destination(&e.variant).ok_or_else(|| {
                    MappingError::UnknownVariant {
                        enum_type: e.enum_type.clone(),
                        variant: e.variant.clone(),
                    }
                })?;
                Ok(Value::Enum(EnumValue::new(name, variant)))
            }

            (Value::Int(i), DataType::Float) => Ok(Value::Float(*i as f64)),

            (value, ty) if !matches!(ty, DataType::Record(_) | DataType::Enum(_))
                && ty.accepts(&value.data_type()) =>
            {
                Ok(value.clone())
            }

            (value, ty) => Err(MappingError::ValueMismatch {
                expected: ty.to_string(),
                actual: value.to_string(),
            }),
        }
    }

    fn materialize_record(
        &self,
        source: &Record,
        destination: &str,
        parameters: &ParameterValues,
    ) -> Result<Value, MappingError> {
        let map = self
            .type_map(&source.type_name, destination)
            .ok_or_else(|| MappingError::type_map_not_found(&source.type_name, destination))?;
        let definition = self
            .catalog()
            .record(destination)
            .ok_or_else(|| MappingError::UnknownType(destination.to_string()))?;

        let mut result = Record::new(destination);
        for field in &definition.fields {
            let value = match map.members.get(&field.name) {
                None => {
                    warn!(
                        "No mapping for {}.{} from {}, leaving it null",
                        destination, field.name, source.type_name
                    );
                    Value::Null
                }
                Some(MappingRule::Path(path)) => {
                    let raw = follow_path(source, path)?;
                    self.materialize(&raw, &field.ty, parameters)?
                }
                Some(MappingRule::Nested) => {
                    let nested = nested_type(&field.ty, destination, &field.name)?;
                    self.materialize_record(source, nested, parameters)?
                }
                Some(MappingRule::Convert(lambda)) => {
                    let evaluator = Evaluator::new(self.catalog(), parameters);
                    let raw = evaluator
                        .apply(lambda, Value::Record(source.clone()))
                        .map_err(|e| MappingError::Evaluation {
                            expression: lambda.to_string(),
                            error: e.to_string(),
                        })?;
                    self.materialize(&raw, &field.ty, parameters)?
                }
            };
            result.fields.insert(field.name.clone(), value);
        }

        debug!("Mapped {} -> {}", source.type_name, destination);
        Ok(Value::Record(result))
    }
}

fn nested_type<'t>(ty: &'t DataType, owner: &str, member: &str) -> Result<&'t str, MappingError> {
    ty.record_name().ok_or_else(|| {
        MappingError::invalid_config(format!(
            "nested rule on `{}.{}` needs a record member, found `{}`",
            owner, member, ty
        ))
    })
}

/// Follow `path` from `root`; a null anywhere along the way yields null.
fn follow_path(root: &Record, path: &MemberPath) -> Result<Value, MappingError> {
    let mut current = Value::Record(root.clone());
    for segment in path.segments() {
        current = match current {
            Value::Null => return Ok(Value::Null),
            Value::Record(record) => record.get(segment).clone(),
            other => {
                return Err(MappingError::UnknownMember {
                    type_name: other.data_type().to_string(),
                    member: segment.clone(),
                })
            }
        };
    }
    Ok(current)
}
