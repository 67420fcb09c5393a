//! Record and enum definitions shared by source and destination types.
//!
//! The catalog is what gives member accesses their static types: binding
//! `dto.Nested.Flag` asks the catalog for the type of `Nested` on `Dto`, then
//! for `Flag` on the result.

use std::collections::HashMap;

use crate::expression::types::{DataType, EnumValue, Record, Value};

use super::errors::MappingError;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl RecordDef {
    pub fn new(name: impl Into<String>) -> Self {
        RecordDef {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: DataType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, variants: &[&str]) -> Self {
        EnumDef {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn ordinal(&self, variant: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == variant)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    records: HashMap<String, RecordDef>,
    enums: HashMap<String, EnumDef>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: RecordDef) -> Self {
        self.add_record(record);
        self
    }

    pub fn with_enum(mut self, def: EnumDef) -> Self {
        self.add_enum(def);
        self
    }

    pub fn add_record(&mut self, record: RecordDef) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn add_enum(&mut self, def: EnumDef) {
        self.enums.insert(def.name.clone(), def);
    }

    pub fn record(&self, name: &str) -> Option<&RecordDef> {
        self.records.get(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Type of `member` on record `record`.
    pub fn field_type(&self, record: &str, member: &str) -> Option<&DataType> {
        self.records.get(record)?.field_type(member)
    }

    pub fn has_variant(&self, enum_type: &str, variant: &str) -> bool {
        self.enums
            .get(enum_type)
            .is_some_and(|e| e.ordinal(variant).is_some())
    }

    /// Resolve a type name: builtin scalars, `[T]` sequences, or catalog
    /// records and enums.
    pub fn resolve_type(&self, name: &str) -> Result<DataType, MappingError> {
        let name = name.trim();
        if let Some(inner) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
            return Ok(DataType::sequence_of(self.resolve_type(inner)?));
        }
        match name {
            "bool" => Ok(DataType::Bool),
            "int" => Ok(DataType::Int),
            "float" => Ok(DataType::Float),
            "string" => Ok(DataType::String),
            _ if self.records.contains_key(name) => Ok(DataType::record(name)),
            _ if self.enums.contains_key(name) => Ok(DataType::enumeration(name)),
            _ => Err(MappingError::UnknownType(name.to_string())),
        }
    }

    /// Build a typed value from plain JSON. Enums are given by variant name.
    pub fn value_from_json(
        &self,
        json: &serde_json::Value,
        ty: &DataType,
    ) -> Result<Value, MappingError> {
        use serde_json::Value as Json;

        let mismatch = || MappingError::ValueMismatch {
            expected: ty.to_string(),
            actual: json.to_string(),
        };

        match (ty, json) {
            (_, Json::Null) => Ok(Value::Null),
            (DataType::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (DataType::Int, Json::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(mismatch),
            (DataType::Float, Json::Number(n)) => {
                n.as_f64().map(Value::Float).ok_or_else(mismatch)
            }
            (DataType::String, Json::String(s)) => Ok(Value::String(s.clone())),
            (DataType::Enum(name), Json::String(variant)) => {
                if self.has_variant(name, variant) {
                    Ok(Value::Enum(EnumValue::new(name, variant)))
                } else {
                    Err(MappingError::UnknownVariant {
                        enum_type: name.clone(),
                        variant: variant.clone(),
                    })
                }
            }
            (DataType::Record(name), Json::Object(map)) => {
                let def = self
                    .record(name)
                    .ok_or_else(|| MappingError::UnknownType(name.clone()))?;
                if let Some(unknown) = map.keys().find(|k| def.field_type(k).is_none()) {
                    return Err(MappingError::UnknownMember {
                        type_name: name.clone(),
                        member: unknown.clone(),
                    });
                }
                let mut record = Record::new(name);
                for field in &def.fields {
                    let value = match map.get(&field.name) {
                        Some(json) => self.value_from_json(json, &field.ty)?,
                        None => Value::Null,
                    };
                    record.fields.insert(field.name.clone(), value);
                }
                Ok(Value::Record(record))
            }
            (DataType::Sequence(element), Json::Array(items)) => items
                .iter()
                .map(|item| self.value_from_json(item, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Err(mismatch()),
        }
    }
}
