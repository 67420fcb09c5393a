//! Mapping definitions loaded from YAML.
//!
//! ```yaml
//! name: people
//! types:
//!   enums:
//!     Color: [Red, Blue]
//!     Shade: [Warm, Cool]
//!   records:
//!     Person: { First: string, Last: string, Color: Color }
//!     PersonDto: { FullName: string, Shade: Shade }
//! parameters:
//!   suffix: string
//! maps:
//!   - source: Person
//!     destination: PersonDto
//!     auto_map: true              # map same-named members
//!     members:
//!       FullName: { convert: "p => p.First + ' ' + p.Last" }
//!       Shade: Color              # plain path, `nested` for nested records
//! enum_maps:
//!   - source: Color
//!     destination: Shade
//!     pairs: { Red: Warm, Blue: Cool }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::catalog::{EnumDef, FieldDef, RecordDef, TypeCatalog};
use super::errors::MappingError;
use super::{EnumMap, MappingConfiguration, MappingRule, MemberPath, TypeMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: TypesDefinition,
    /// Declared types of `$parameters` usable in conversions.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub maps: Vec<TypeMapDefinition>,
    #[serde(default)]
    pub enum_maps: Vec<EnumMapDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypesDefinition {
    /// Record name -> (field name -> type name)
    #[serde(default)]
    pub records: BTreeMap<String, BTreeMap<String, String>>,
    /// Enum name -> variants in declaration order
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMapDefinition {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub auto_map: bool,
    #[serde(default)]
    pub members: BTreeMap<String, MemberDefinition>,
}

/// One member rule: `nested`, a bare member path, `{ from: A.B }` or
/// `{ convert: "s => ..." }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MemberDefinition {
    Shorthand(String),
    From { from: String },
    Convert { convert: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumMapDefinition {
    pub source: String,
    pub destination: String,
    /// Pair variants with equal names before applying `pairs`.
    #[serde(default)]
    pub by_name: bool,
    #[serde(default)]
    pub pairs: BTreeMap<String, String>,
}

impl MappingDefinition {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, MappingError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| MappingError::ConfigRead {
            error: format!("{}: {}", path.as_ref().display(), e),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MappingError> {
        let definition: MappingDefinition =
            serde_yaml::from_str(yaml).map_err(|e| MappingError::ConfigParse {
                error: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load, validate and build a configuration in one step.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MappingConfiguration, MappingError> {
        Self::from_yaml_file(path)?.to_configuration()
    }

    /// Checks that need no type resolution.
    pub fn validate(&self) -> Result<(), MappingError> {
        for (name, variants) in &self.types.enums {
            if variants.is_empty() {
                return Err(MappingError::invalid_config(format!(
                    "enum `{}` has no variants",
                    name
                )));
            }
            let unique: BTreeSet<&String> = variants.iter().collect();
            if unique.len() != variants.len() {
                return Err(MappingError::invalid_config(format!(
                    "enum `{}` repeats a variant",
                    name
                )));
            }
        }

        for name in self.types.records.keys() {
            if self.types.enums.contains_key(name) {
                return Err(MappingError::invalid_config(format!(
                    "`{}` is declared both as a record and as an enum",
                    name
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for map in &self.maps {
            if !seen.insert((&map.source, &map.destination)) {
                return Err(MappingError::invalid_config(format!(
                    "duplicate map from `{}` to `{}`",
                    map.source, map.destination
                )));
            }
            if !map.auto_map && map.members.is_empty() {
                return Err(MappingError::invalid_config(format!(
                    "map from `{}` to `{}` has no members and auto_map is off",
                    map.source, map.destination
                )));
            }
        }

        Ok(())
    }

    fn build_catalog(&self) -> Result<TypeCatalog, MappingError> {
        let mut catalog = TypeCatalog::new();
        for (name, variants) in &self.types.enums {
            catalog.add_enum(EnumDef {
                name: name.clone(),
                variants: variants.clone(),
            });
        }
        // Register every record name first so fields can reference records
        // declared later in the file
        for name in self.types.records.keys() {
            catalog.add_record(RecordDef::new(name));
        }

        let mut records = Vec::with_capacity(self.types.records.len());
        for (name, fields) in &self.types.records {
            let fields = fields
                .iter()
                .map(|(field, type_name)| {
                    Ok(FieldDef {
                        name: field.clone(),
                        ty: catalog.resolve_type(type_name)?,
                    })
                })
                .collect::<Result<Vec<_>, MappingError>>()?;
            records.push(RecordDef {
                name: name.clone(),
                fields,
            });
        }
        for record in records {
            catalog.add_record(record);
        }
        Ok(catalog)
    }

    pub fn to_configuration(&self) -> Result<MappingConfiguration, MappingError> {
        let catalog = self.build_catalog()?;
        let parameters = self
            .parameters
            .iter()
            .map(|(name, type_name)| Ok((name.clone(), catalog.resolve_type(type_name)?)))
            .collect::<Result<Vec<_>, MappingError>>()?;

        let mut configuration = MappingConfiguration::new(catalog);
        for (name, ty) in parameters {
            configuration.declare_parameter(name, ty);
        }

        for map in &self.maps {
            let mut type_map = if map.auto_map {
                configuration.auto_type_map(&map.source, &map.destination)?
            } else {
                TypeMap::new(&map.source, &map.destination)
            };
            for (member, definition) in &map.members {
                let rule = match definition {
                    MemberDefinition::Shorthand(keyword) if keyword == "nested" => {
                        MappingRule::Nested
                    }
                    MemberDefinition::Shorthand(path) | MemberDefinition::From { from: path } => {
                        MappingRule::Path(MemberPath::parse(path))
                    }
                    MemberDefinition::Convert { convert } => {
                        configuration.conversion(&map.source, convert)?
                    }
                };
                type_map = type_map.rule(member.clone(), rule);
            }
            configuration.add_type_map(type_map);
        }

        for map in &self.enum_maps {
            let mut enum_map = if map.by_name {
                configuration.enum_map_by_name(&map.source, &map.destination)?
            } else {
                EnumMap::new(&map.source, &map.destination)
            };
            for (source, destination) in &map.pairs {
                enum_map.pairs.retain(|(s, _)| s != source);
                enum_map = enum_map.pair(source.clone(), destination.clone());
            }
            configuration.add_enum_map(enum_map);
        }

        configuration.validate()?;
        info!(
            "Loaded mapping definition `{}`: {} type maps, {} enum maps",
            self.name.as_deref().unwrap_or("unnamed"),
            self.maps.len(),
            self.enum_maps.len()
        );
        Ok(configuration)
    }
}
