//! Static types and runtime values shared by expression trees, the
//! interpreter and the mapping service.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Values bound to named `$parameters` at execution time.
pub type ParameterValues = BTreeMap<String, Value>;

/// Declared types of named `$parameters`.
pub type ParameterTypes = BTreeMap<String, DataType>;

/// Static type carried by every expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of the `null` literal; compatible with every other type.
    Null,
    Bool,
    Int,
    Float,
    String,
    /// Enum declared in the type catalog.
    Enum(String),
    /// Record declared in the type catalog.
    Record(String),
    Sequence(Box<DataType>),
}

impl DataType {
    pub fn record(name: impl Into<String>) -> Self {
        DataType::Record(name.into())
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        DataType::Enum(name.into())
    }

    pub fn sequence_of(element: DataType) -> Self {
        DataType::Sequence(Box::new(element))
    }

    /// Element type of a sequence, `None` for everything else.
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Sequence(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn record_name(&self) -> Option<&str> {
        match self {
            DataType::Record(name) => Some(name),
            _ => None,
        }
    }

    pub fn enum_name(&self) -> Option<&str> {
        match self {
            DataType::Enum(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, DataType::Sequence(_))
    }

    /// Whether a value of `other` may be used where `self` is expected.
    pub fn accepts(&self, other: &DataType) -> bool {
        match (self, other) {
            (_, DataType::Null) | (DataType::Null, _) => true,
            (DataType::Float, DataType::Int) => true,
            (DataType::Sequence(a), DataType::Sequence(b)) => a.accepts(b),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "null"),
            DataType::Bool => write!(f, "bool"),
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::String => write!(f, "string"),
            DataType::Enum(name) | DataType::Record(name) => write!(f, "{}", name),
            DataType::Sequence(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// Value of a catalog enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub enum_type: String,
    pub variant: String,
}

impl EnumValue {
    pub fn new(enum_type: impl Into<String>, variant: impl Into<String>) -> Self {
        EnumValue {
            enum_type: enum_type.into(),
            variant: variant.into(),
        }
    }
}

/// Instance of a catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Record {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Field value; missing fields read as `Null`.
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }
}

/// Dynamically typed runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(EnumValue),
    Record(Record),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Best-effort type of this value. Lists report the type of their first
    /// element.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Enum(e) => DataType::Enum(e.enum_type.clone()),
            Value::Record(r) => DataType::Record(r.type_name.clone()),
            Value::List(items) => DataType::sequence_of(
                items.first().map(Value::data_type).unwrap_or(DataType::Null),
            ),
        }
    }

    /// Equality with numeric promotion (`1 == 1.0`).
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }

    /// Ordering between comparable values. Enums compare by variant name here;
    /// the interpreter orders them by declaration order when it has a catalog.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_))
            | (Value::Float(_), Value::Float(_)) => {
                self.as_float()?.partial_cmp(&other.as_float()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) if a.enum_type == b.enum_type => {
                Some(a.variant.cmp(&b.variant))
            }
            _ => None,
        }
    }

    /// Plain JSON rendering. Enums become their variant name and records
    /// become objects.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Enum(e) => serde_json::Value::String(e.variant.clone()),
            Value::Record(r) => serde_json::Value::Object(
                r.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Enum(e) => write!(f, "{}::{}", e.enum_type, e.variant),
            Value::Record(r) => {
                write!(f, "{} {{", r.type_name)?;
                for (i, (name, value)) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
