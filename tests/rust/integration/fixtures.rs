//! Shared catalog, mapping and rows for the query scenarios.
//!
//! `Model` and `BoolModel` are two unrelated source types that both map onto
//! `Dto`; `Dto.Nested` is a nested destination record built from the same
//! source row.

use std::sync::Arc;

use exprmap::mapping::{EnumDef, EnumMap, RecordDef, TypeCatalog, TypeMap};
use exprmap::query::{AsyncInMemorySource, InMemorySource, MappedQuery, UseAsDataSource};
use exprmap::expression::types::ParameterValues;
use exprmap::{DataType, EnumValue, MappingConfiguration, Record, Value};

pub fn catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with_enum(EnumDef::new("Color", &["Red", "Green", "Blue"]))
        .with_enum(EnumDef::new("Shade", &["Warm", "Neutral", "Cool"]))
        .with_record(
            RecordDef::new("Model")
                .field("Id", DataType::Int)
                .field("ABoolean", DataType::Bool)
                .field("First", DataType::String)
                .field("Last", DataType::String)
                .field("Color", DataType::enumeration("Color"))
                .field("Score", DataType::Int),
        )
        .with_record(RecordDef::new("BoolModel").field("ABoolean", DataType::Bool))
        .with_record(RecordDef::new("DtoNested").field("AnotherBoolean", DataType::Bool))
        .with_record(
            RecordDef::new("Dto")
                .field("Id", DataType::Int)
                .field("Nested", DataType::record("DtoNested"))
                .field("FullName", DataType::String)
                .field("Shade", DataType::enumeration("Shade"))
                .field("Score", DataType::Int),
        )
}

pub fn mapping() -> Arc<MappingConfiguration> {
    let mut config = MappingConfiguration::new(catalog());
    let full_name = config
        .conversion("Model", "m => m.First + ' ' + m.Last")
        .expect("full name conversion");
    config.add_type_map(
        TypeMap::new("Model", "Dto")
            .path("Id", "Id")
            .nested("Nested")
            .rule("FullName", full_name)
            .path("Shade", "Color")
            .path("Score", "Score"),
    );
    config.add_type_map(TypeMap::new("Model", "DtoNested").path("AnotherBoolean", "ABoolean"));
    config.add_type_map(TypeMap::new("BoolModel", "Dto").nested("Nested"));
    config.add_type_map(TypeMap::new("BoolModel", "DtoNested").path("AnotherBoolean", "ABoolean"));
    config.add_enum_map(
        EnumMap::new("Color", "Shade")
            .pair("Red", "Warm")
            .pair("Green", "Neutral")
            .pair("Blue", "Cool"),
    );
    Arc::new(config)
}

fn model(id: i64, flag: bool, first: &str, last: &str, color: &str, score: i64) -> Value {
    Value::Record(
        Record::new("Model")
            .with("Id", id)
            .with("ABoolean", flag)
            .with("First", first)
            .with("Last", last)
            .with("Color", EnumValue::new("Color", color))
            .with("Score", score),
    )
}

pub fn models() -> Vec<Value> {
    vec![
        model(1, true, "Ada", "Lovelace", "Blue", 90),
        model(2, false, "Alan", "Turing", "Red", 75),
        model(3, true, "Grace", "Hopper", "Green", 82),
        model(4, false, "Edsger", "Dijkstra", "Blue", 68),
    ]
}

pub fn bool_models() -> Vec<Value> {
    [true, false, true, false]
        .iter()
        .map(|flag| Value::Record(Record::new("BoolModel").with("ABoolean", *flag)))
        .collect()
}

pub fn model_source(mapping: &MappingConfiguration) -> InMemorySource {
    InMemorySource::new(mapping.shared_catalog(), "Model", models())
}

/// `Dto` query over the in-memory `Model` rows.
pub fn model_query() -> MappedQuery {
    let mapping = mapping();
    model_source(&mapping)
        .use_as_data_source(mapping)
        .for_type("Dto")
        .expect("Model maps to Dto")
}

/// `Dto` query over `Model` rows through a source with async capability.
pub fn async_model_query() -> MappedQuery {
    let mapping = mapping();
    AsyncInMemorySource::new(model_source(&mapping))
        .use_as_data_source(mapping)
        .for_type("Dto")
        .expect("Model maps to Dto")
}

pub fn bool_model_query() -> MappedQuery {
    let mapping = mapping();
    InMemorySource::new(mapping.shared_catalog(), "BoolModel", bool_models())
        .use_as_data_source(mapping)
        .for_type("Dto")
        .expect("BoolModel maps to Dto")
}

pub fn ids(items: &[Value]) -> Vec<i64> {
    items
        .iter()
        .filter_map(|item| item.as_record())
        .filter_map(|dto| dto.get("Id").as_int())
        .collect()
}

pub fn nested_flag(item: &Value) -> Option<bool> {
    item.as_record()?
        .get("Nested")
        .as_record()?
        .get("AnotherBoolean")
        .as_bool()
}

/// `Order` rows carry a collection of `Line`s; `OrderDto.HasBig` is a
/// conversion whose body iterates that collection with its own lambda.
pub fn order_mapping() -> Arc<MappingConfiguration> {
    let catalog = catalog()
        .with_record(RecordDef::new("Line").field("Qty", DataType::Int))
        .with_record(RecordDef::new("LineDto").field("Amount", DataType::Int))
        .with_record(
            RecordDef::new("Order")
                .field("Id", DataType::Int)
                .field("Min", DataType::Int)
                .field("State", DataType::enumeration("Color"))
                .field("Lines", DataType::sequence_of(DataType::record("Line"))),
        )
        .with_record(
            RecordDef::new("OrderDto")
                .field("Id", DataType::Int)
                .field("Threshold", DataType::Int)
                .field("Status", DataType::enumeration("Shade"))
                .field("Lines", DataType::sequence_of(DataType::record("LineDto")))
                .field("HasBig", DataType::Bool),
        );
    let mut config = MappingConfiguration::new(catalog);
    let has_big = config
        .conversion("Order", "m => m.Lines.any(o => o.Qty > m.Min)")
        .expect("has big conversion");
    config.add_type_map(
        TypeMap::new("Order", "OrderDto")
            .path("Id", "Id")
            .path("Threshold", "Min")
            .path("Status", "State")
            .path("Lines", "Lines")
            .rule("HasBig", has_big),
    );
    config.add_type_map(TypeMap::new("Line", "LineDto").path("Amount", "Qty"));
    config.add_enum_map(
        EnumMap::new("Color", "Shade")
            .pair("Red", "Warm")
            .pair("Green", "Neutral")
            .pair("Blue", "Cool"),
    );
    Arc::new(config)
}

fn order(id: i64, min: i64, color: &str, quantities: &[i64]) -> Value {
    let lines = quantities
        .iter()
        .map(|qty| Value::Record(Record::new("Line").with("Qty", *qty)))
        .collect::<Vec<_>>();
    Value::Record(
        Record::new("Order")
            .with("Id", id)
            .with("Min", min)
            .with("State", EnumValue::new("Color", color))
            .with("Lines", lines),
    )
}

pub fn orders() -> Vec<Value> {
    vec![
        order(1, 10, "Blue", &[1, 2]),
        order(2, 1, "Red", &[5]),
        order(3, 3, "Green", &[]),
        order(4, 0, "Blue", &[4, 7]),
    ]
}

/// `$shades` bound to `[Shade::Cool, Shade::Neutral]`.
pub fn order_parameters() -> ParameterValues {
    let mut parameters = ParameterValues::new();
    parameters.insert(
        "shades".to_string(),
        Value::List(vec![
            Value::Enum(EnumValue::new("Shade", "Cool")),
            Value::Enum(EnumValue::new("Shade", "Neutral")),
        ]),
    );
    parameters
}

pub fn order_query() -> MappedQuery {
    let mapping = order_mapping();
    InMemorySource::new(mapping.shared_catalog(), "Order", orders())
        .use_as_data_source(mapping)
        .with_parameters(order_parameters())
        .for_type("OrderDto")
        .expect("Order maps to OrderDto")
}
