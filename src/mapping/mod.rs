//! Mapping metadata between source (entity) and destination (view) types.
//!
//! A [`TypeMap`] says, for every member of a destination record, how to derive
//! it from the source record: follow a member path, reuse the whole source
//! record for a nested destination record, or evaluate a conversion lambda.
//! An [`EnumMap`] pairs variants of a source enum with variants of a
//! destination enum.
//!
//! The translator only needs the read-only [`MappingService`] view; the
//! shipped implementation is [`MappingConfiguration`], built in code or loaded
//! from YAML through [`config::MappingDefinition`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::expression::types::{DataType, ParameterTypes, ParameterValues, Value};
use crate::expression::{parse_lambda, Lambda};

pub mod catalog;
pub mod config;
pub mod errors;
mod mapper;

pub use catalog::{EnumDef, FieldDef, RecordDef, TypeCatalog};
pub use config::MappingDefinition;
pub use errors::MappingError;

/// Ordered member names from a root, e.g. `Nested.Flag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberPath(pub Vec<String>);

impl MemberPath {
    pub fn parse(path: &str) -> Self {
        MemberPath(
            path.split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// How one destination member is derived from the source record.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingRule {
    /// Follow a member chain on the source record.
    Path(MemberPath),
    /// The destination member is itself a record built from the same source
    /// record.
    Nested,
    /// Evaluate a lambda over the source record.
    Convert(Lambda),
}

impl MappingRule {
    pub fn path(path: &str) -> Self {
        MappingRule::Path(MemberPath::parse(path))
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingRule::Path(path) => write!(f, "from {}", path),
            MappingRule::Nested => write!(f, "nested"),
            MappingRule::Convert(lambda) => write!(f, "convert {}", lambda),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeMap {
    pub source_type: String,
    pub destination_type: String,
    pub members: BTreeMap<String, MappingRule>,
}

impl TypeMap {
    pub fn new(source_type: impl Into<String>, destination_type: impl Into<String>) -> Self {
        TypeMap {
            source_type: source_type.into(),
            destination_type: destination_type.into(),
            members: BTreeMap::new(),
        }
    }

    pub fn rule(mut self, member: impl Into<String>, rule: MappingRule) -> Self {
        self.members.insert(member.into(), rule);
        self
    }

    /// Map `member` from the source member chain `path`.
    pub fn path(self, member: impl Into<String>, path: &str) -> Self {
        self.rule(member, MappingRule::path(path))
    }

    pub fn nested(self, member: impl Into<String>) -> Self {
        self.rule(member, MappingRule::Nested)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMap {
    pub source_type: String,
    pub destination_type: String,
    /// (source variant, destination variant)
    pub pairs: Vec<(String, String)>,
}

impl EnumMap {
    pub fn new(source_type: impl Into<String>, destination_type: impl Into<String>) -> Self {
        EnumMap {
            source_type: source_type.into(),
            destination_type: destination_type.into(),
            pairs: Vec::new(),
        }
    }

    pub fn pair(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.pairs.push((source.into(), destination.into()));
        self
    }

    pub fn to_destination(&self, source_variant: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(s, _)| s == source_variant)
            .map(|(_, d)| d.as_str())
    }

    pub fn to_source(&self, destination_variant: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(_, d)| d == destination_variant)
            .map(|(s, _)| s.as_str())
    }
}

/// Read-only mapping lookups consumed by the translator and the query
/// provider.
pub trait MappingService: Send + Sync {
    fn catalog(&self) -> &TypeCatalog;

    /// Rule for `member` of `destination`, when mapping from `source`.
    fn mapping_rule(&self, source: &str, destination: &str, member: &str) -> Option<&MappingRule>;

    fn has_type_map(&self, source: &str, destination: &str) -> bool;

    fn enum_map(&self, source: &str, destination: &str) -> Option<&EnumMap>;

    /// Source types with a type map to `destination`, in a stable order.
    fn source_types_for(&self, destination: &str) -> Vec<String>;

    /// Materialize a source value (record, enum, list or scalar) as a value
    /// of `destination`.
    fn map_value(
        &self,
        value: &Value,
        destination: &DataType,
        parameters: &ParameterValues,
    ) -> Result<Value, MappingError>;
}

/// In-memory mapping metadata.
#[derive(Debug, Clone, Default)]
pub struct MappingConfiguration {
    catalog: Arc<TypeCatalog>,
    type_maps: BTreeMap<(String, String), TypeMap>,
    enum_maps: BTreeMap<(String, String), EnumMap>,
    parameter_types: ParameterTypes,
}

impl MappingConfiguration {
    pub fn new(catalog: TypeCatalog) -> Self {
        MappingConfiguration {
            catalog: Arc::new(catalog),
            ..Default::default()
        }
    }

    pub fn with_type_map(mut self, map: TypeMap) -> Self {
        self.add_type_map(map);
        self
    }

    pub fn with_enum_map(mut self, map: EnumMap) -> Self {
        self.add_enum_map(map);
        self
    }

    pub fn add_type_map(&mut self, map: TypeMap) {
        debug!(
            "Registering type map {} -> {} ({} members)",
            map.source_type,
            map.destination_type,
            map.members.len()
        );
        self.type_maps.insert(
            (map.source_type.clone(), map.destination_type.clone()),
            map,
        );
    }

    pub fn add_enum_map(&mut self, map: EnumMap) {
        self.enum_maps.insert(
            (map.source_type.clone(), map.destination_type.clone()),
            map,
        );
    }

    /// Declare the type of a `$parameter` usable in conversion rules.
    pub fn declare_parameter(&mut self, name: impl Into<String>, ty: DataType) {
        self.parameter_types.insert(name.into(), ty);
    }

    pub fn parameter_types(&self) -> &ParameterTypes {
        &self.parameter_types
    }

    pub fn shared_catalog(&self) -> Arc<TypeCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn type_map(&self, source: &str, destination: &str) -> Option<&TypeMap> {
        self.type_maps
            .get(&(source.to_string(), destination.to_string()))
    }

    pub fn type_maps(&self) -> impl Iterator<Item = &TypeMap> {
        self.type_maps.values()
    }

    pub fn enum_maps(&self) -> impl Iterator<Item = &EnumMap> {
        self.enum_maps.values()
    }

    /// Parse a conversion rule written as a lambda over `source_type`.
    pub fn conversion(&self, source_type: &str, text: &str) -> Result<MappingRule, MappingError> {
        let parameter_type = self.catalog.resolve_type(source_type)?;
        parse_lambda(text, &parameter_type, &self.catalog, &self.parameter_types)
            .map(MappingRule::Convert)
            .map_err(|e| {
                MappingError::invalid_config(format!(
                    "conversion `{}` over `{}`: {}",
                    text, source_type, e
                ))
            })
    }

    /// Type map that maps every destination member to the source member of
    /// the same name, where one exists.
    pub fn auto_type_map(&self, source: &str, destination: &str) -> Result<TypeMap, MappingError> {
        let source_def = self
            .catalog
            .record(source)
            .ok_or_else(|| MappingError::UnknownType(source.to_string()))?;
        let destination_def = self
            .catalog
            .record(destination)
            .ok_or_else(|| MappingError::UnknownType(destination.to_string()))?;

        let mut map = TypeMap::new(source, destination);
        for field in &destination_def.fields {
            if source_def.field_type(&field.name).is_some() {
                map = map.path(field.name.clone(), &field.name);
            }
        }
        Ok(map)
    }

    /// Enum map pairing variants with equal names.
    pub fn enum_map_by_name(&self, source: &str, destination: &str) -> Result<EnumMap, MappingError> {
        let source_def = self
            .catalog
            .enumeration(source)
            .ok_or_else(|| MappingError::UnknownType(source.to_string()))?;
        let destination_def = self
            .catalog
            .enumeration(destination)
            .ok_or_else(|| MappingError::UnknownType(destination.to_string()))?;

        let mut map = EnumMap::new(source, destination);
        for variant in &source_def.variants {
            if destination_def.ordinal(variant).is_some() {
                map = map.pair(variant.clone(), variant.clone());
            }
        }
        Ok(map)
    }

    /// Structural validation: referenced types, members, paths, conversion
    /// parameter types and enum variants must all exist. Completeness (every
    /// destination member mapped) is not checked.
    pub fn validate(&self) -> Result<(), MappingError> {
        for map in self.type_maps.values() {
            let source = self
                .catalog
                .record(&map.source_type)
                .ok_or_else(|| MappingError::UnknownType(map.source_type.clone()))?;
            let destination = self
                .catalog
                .record(&map.destination_type)
                .ok_or_else(|| MappingError::UnknownType(map.destination_type.clone()))?;

            for (member, rule) in &map.members {
                let member_type = destination.field_type(member).ok_or_else(|| {
                    MappingError::UnknownMember {
                        type_name: map.destination_type.clone(),
                        member: member.clone(),
                    }
                })?;
                match rule {
                    MappingRule::Path(path) => {
                        if path.is_empty() {
                            return Err(MappingError::invalid_config(format!(
                                "empty path for `{}.{}`",
                                map.destination_type, member
                            )));
                        }
                        self.path_type(&source.name, path)?;
                    }
                    MappingRule::Nested => {
                        if member_type.record_name().is_none() {
                            return Err(MappingError::invalid_config(format!(
                                "nested rule on `{}.{}` needs a record member, found `{}`",
                                map.destination_type, member, member_type
                            )));
                        }
                    }
                    MappingRule::Convert(lambda) => {
                        if lambda.parameter.ty != DataType::record(&source.name) {
                            return Err(MappingError::invalid_config(format!(
                                "conversion for `{}.{}` takes `{}`, expected `{}`",
                                map.destination_type, member, lambda.parameter.ty, source.name
                            )));
                        }
                    }
                }
            }
        }

        for map in self.enum_maps.values() {
            for (source, destination) in &map.pairs {
                for (enum_type, variant) in [
                    (&map.source_type, source),
                    (&map.destination_type, destination),
                ] {
                    if !self.catalog.has_variant(enum_type, variant) {
                        return Err(MappingError::UnknownVariant {
                            enum_type: enum_type.clone(),
                            variant: variant.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Type at the end of `path` starting from record `root`.
    pub fn path_type(&self, root: &str, path: &MemberPath) -> Result<DataType, MappingError> {
        let mut current = DataType::record(root);
        for segment in path.segments() {
            let record = current.record_name().ok_or_else(|| MappingError::UnknownMember {
                type_name: current.to_string(),
                member: segment.clone(),
            })?;
            current = self
                .catalog
                .field_type(record, segment)
                .cloned()
                .ok_or_else(|| MappingError::UnknownMember {
                    type_name: record.to_string(),
                    member: segment.clone(),
                })?;
        }
        Ok(current)
    }
}

impl MappingService for MappingConfiguration {
    fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    fn mapping_rule(&self, source: &str, destination: &str, member: &str) -> Option<&MappingRule> {
        self.type_map(source, destination)?.members.get(member)
    }

    fn has_type_map(&self, source: &str, destination: &str) -> bool {
        self.type_map(source, destination).is_some()
    }

    fn enum_map(&self, source: &str, destination: &str) -> Option<&EnumMap> {
        self.enum_maps
            .get(&(source.to_string(), destination.to_string()))
    }

    fn source_types_for(&self, destination: &str) -> Vec<String> {
        self.type_maps
            .keys()
            .filter(|(_, d)| d == destination)
            .map(|(s, _)| s.clone())
            .collect()
    }

    fn map_value(
        &self,
        value: &Value,
        destination: &DataType,
        parameters: &ParameterValues,
    ) -> Result<Value, MappingError> {
        self.materialize(value, destination, parameters)
    }
}
