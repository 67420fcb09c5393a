//! Synchronous query scenarios over the `Model` -> `Dto` mapping.

use exprmap::{EnumValue, Value};

use super::fixtures::{bool_model_query, ids, model_query, nested_flag};

#[test]
fn test_where_over_nested_member_returns_matching_rows() {
    let result = model_query()
        .filter("dto => dto.Nested.AnotherBoolean")
        .unwrap()
        .to_list()
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|dto| nested_flag(dto) == Some(true)));
    assert_eq!(ids(&result), vec![1, 3]);
}

#[test]
fn test_second_source_type_maps_to_same_destination() {
    let query = bool_model_query()
        .filter("dto => dto.Nested.AnotherBoolean")
        .unwrap();
    let translated = query.provider().translate(query.expression()).unwrap();
    assert_eq!(
        translated.to_string(),
        "source<BoolModel>.where(dto => dto.ABoolean)"
    );

    let result = query.to_list().unwrap();
    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|dto| nested_flag(dto) == Some(true)));
    // Unmapped destination members come back null
    assert_eq!(result[0].as_record().unwrap().get("Id"), &Value::Null);
}

#[test]
fn test_fan_out_member_is_inlined() {
    let query = model_query()
        .filter("d => d.FullName == 'Grace Hopper'")
        .unwrap();
    let translated = query.provider().translate(query.expression()).unwrap();
    assert_eq!(
        translated.to_string(),
        "source<Model>.where(d => (((d.First + ' ') + d.Last) == 'Grace Hopper'))"
    );

    let result = query.to_list().unwrap();
    assert_eq!(ids(&result), vec![3]);
    assert_eq!(
        result[0].as_record().unwrap().get("FullName"),
        &Value::from("Grace Hopper")
    );
}

#[test]
fn test_enum_comparison_is_converted() {
    let query = model_query().filter("d => d.Shade == Shade::Cool").unwrap();
    let translated = query.provider().translate(query.expression()).unwrap();
    assert_eq!(
        translated.to_string(),
        "source<Model>.where(d => (d.Color == Color::Blue))"
    );

    let result = query.to_list().unwrap();
    assert_eq!(ids(&result), vec![1, 4]);
    for dto in &result {
        assert_eq!(
            dto.as_record().unwrap().get("Shade"),
            &Value::Enum(EnumValue::new("Shade", "Cool"))
        );
    }
}

#[test]
fn test_ordering_paging_and_projection() {
    let top_two = model_query()
        .order_by_descending("d => d.Score")
        .unwrap()
        .take(2)
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(ids(&top_two), vec![1, 3]);

    let by_shade_then_id = model_query()
        .order_by("d => d.Shade")
        .unwrap()
        .then_by_descending("d => d.Id")
        .unwrap()
        .skip(1)
        .unwrap()
        .to_list()
        .unwrap();
    // Warm(2), Neutral(3), Cool(4, 1) with the first skipped
    assert_eq!(ids(&by_shade_then_id), vec![3, 4, 1]);

    let names = model_query()
        .filter("d => d.Score > 80")
        .unwrap()
        .select("d => d.FullName")
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(
        names,
        vec![Value::from("Ada Lovelace"), Value::from("Grace Hopper")]
    );

    let shades = model_query()
        .select("d => d.Shade")
        .unwrap()
        .distinct()
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(
        shades,
        vec![
            Value::Enum(EnumValue::new("Shade", "Cool")),
            Value::Enum(EnumValue::new("Shade", "Warm")),
            Value::Enum(EnumValue::new("Shade", "Neutral")),
        ]
    );
}

#[test]
fn test_terminal_operators() {
    let query = model_query();
    assert_eq!(query.count().unwrap(), 4);
    assert!(query.any().unwrap());
    assert!(!query.filter("d => d.Score > 100").unwrap().any().unwrap());

    let first = query
        .filter("d => !d.Nested.AnotherBoolean")
        .unwrap()
        .first()
        .unwrap();
    assert_eq!(first.as_record().unwrap().get("Id"), &Value::Int(2));
    assert_eq!(
        query
            .filter("d => d.FullName.starts_with('Z')")
            .unwrap()
            .first_or_default()
            .unwrap(),
        None
    );
}

#[test]
fn test_external_parameters_are_bound_at_execution() {
    let mapping = super::fixtures::mapping();
    let query = exprmap::query::UseAsDataSource::use_as_data_source(
        super::fixtures::model_source(&mapping),
        mapping,
    )
    .with_parameter("minimum", 80)
    .for_type("Dto")
    .unwrap()
    .filter("d => d.Score >= $minimum")
    .unwrap();

    let translated = query.provider().translate(query.expression()).unwrap();
    assert_eq!(
        translated.to_string(),
        "source<Model>.where(d => (d.Score >= 80))"
    );
    assert_eq!(ids(&query.to_list().unwrap()), vec![1, 3]);
}

#[test]
fn test_execution_is_deterministic_and_never_cached() {
    let query = model_query()
        .filter("d => d.Shade != Shade::Warm && d.Score > 70")
        .unwrap();

    let first = query.provider().translate(query.expression()).unwrap();
    let second = query.provider().translate(query.expression()).unwrap();
    assert_eq!(first, second);

    let a = query.to_list().unwrap();
    let b = query.to_list().unwrap();
    assert_eq!(a, b);
    assert_eq!(ids(&a), vec![1, 3]);
}

#[test]
fn test_composition_leaves_original_query_untouched() {
    let all = model_query();
    let filtered = all.filter("d => d.Score < 70").unwrap();
    assert_eq!(all.count().unwrap(), 4);
    assert_eq!(filtered.count().unwrap(), 1);
}
