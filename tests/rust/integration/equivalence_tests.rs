//! Round-trip equivalence: a predicate over the destination type selects the
//! same rows whether it is evaluated on materialized DTOs or translated and
//! executed against the source rows.

use test_case::test_case;

use exprmap::evaluator::Evaluator;
use exprmap::expression::{parse_lambda, ParameterTypes};
use exprmap::expression::types::ParameterValues;
use exprmap::{DataType, MappingService, Value};

use super::fixtures::{
    ids, mapping, model_query, models, order_mapping, order_parameters, order_query, orders,
};

#[test_case("d => d.Nested.AnotherBoolean" ; "nested boolean")]
#[test_case("d => !d.Nested.AnotherBoolean" ; "negated nested boolean")]
#[test_case("d => d.FullName.starts_with('A')" ; "fan out string method")]
#[test_case("d => d.Shade == Shade::Cool" ; "enum equality")]
#[test_case("d => d.Shade > Shade::Warm" ; "enum ordering")]
#[test_case("d => d.Shade != Shade::Warm && d.Score > 70" ; "enum and scalar")]
#[test_case("d => d.Score >= 80 || d.FullName.len() > 12" ; "disjunction")]
#[test_case("d => (d.Shade == Shade::Neutral ? d.Score : 0) > 10" ; "conditional")]
#[test_case("d => (d.Score as float) / 2.0 > 40.0" ; "conversion")]
fn test_translated_predicate_selects_same_rows(predicate: &str) {
    let mapping = mapping();
    let parameters = ParameterValues::new();
    let lambda = parse_lambda(
        predicate,
        &DataType::record("Dto"),
        mapping.catalog(),
        mapping.parameter_types(),
    )
    .unwrap();

    let dtos: Vec<_> = models()
        .iter()
        .map(|row| {
            mapping
                .map_value(row, &DataType::record("Dto"), &parameters)
                .unwrap()
        })
        .collect();
    let evaluator = Evaluator::new(mapping.catalog(), &parameters);
    let expected: Vec<_> = dtos
        .into_iter()
        .filter(|dto| {
            evaluator.apply(&lambda, dto.clone()).unwrap().as_bool() == Some(true)
        })
        .collect();

    let actual = model_query().filter(predicate).unwrap().to_list().unwrap();
    assert_eq!(ids(&actual), ids(&expected));
    assert_eq!(actual, expected);
}

#[test_case("o => o.HasBig" ; "conversion with inner lambda")]
#[test_case("o => !o.HasBig && o.Threshold > 0" ; "negated conversion with inner lambda")]
#[test_case("o => o.Lines.any(l => l.Amount > 4)" ; "nested lambda over mapped collection")]
#[test_case("o => o.Lines.all(l => l.Amount >= o.Threshold)" ; "nested lambda reading outer parameter")]
#[test_case("o => o.Lines.count() == 0 || o.Status == Shade::Warm" ; "collection count and enum")]
#[test_case("o => $shades.contains(o.Status)" ; "enum parameter list contains")]
#[test_case("o => !$shades.contains(o.Status) || o.HasBig" ; "contains combined with conversion")]
#[test_case("o => o.Lines.select(l => l.Amount).contains(5)" ; "projected collection contains")]
fn test_translated_order_predicate_selects_same_rows(predicate: &str) {
    let mapping = order_mapping();
    let parameters = order_parameters();
    let parameter_types: ParameterTypes = parameters
        .iter()
        .map(|(name, value)| (name.clone(), value.data_type()))
        .collect();
    let lambda = parse_lambda(
        predicate,
        &DataType::record("OrderDto"),
        mapping.catalog(),
        &parameter_types,
    )
    .unwrap();

    let evaluator = Evaluator::new(mapping.catalog(), &parameters);
    let expected: Vec<_> = orders()
        .iter()
        .map(|row| {
            mapping
                .map_value(row, &DataType::record("OrderDto"), &parameters)
                .unwrap()
        })
        .filter(|dto| evaluator.apply(&lambda, dto.clone()).unwrap().as_bool() == Some(true))
        .collect();

    let actual = order_query().filter(predicate).unwrap().to_list().unwrap();
    assert_eq!(ids(&actual), ids(&expected));
    assert_eq!(actual, expected);
}

#[test]
fn test_conversion_with_inner_lambda_keeps_outer_reference() {
    let query = order_query().filter("o => o.HasBig").unwrap();
    let items = query.to_list().unwrap();
    assert_eq!(ids(&items), vec![2, 4]);
    let translated = query.provider().translate(query.expression()).unwrap();
    assert!(translated
        .to_string()
        .contains("o.Lines.any(o1 => (o1.Qty > o.Min))"));
}

#[test]
fn test_enum_parameter_list_matches_mapped_rows() {
    // Cool <- Blue (1, 4), Neutral <- Green (3)
    let items = order_query()
        .filter("o => $shades.contains(o.Status)")
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(ids(&items), vec![1, 3, 4]);
}

#[test_case("d => d.Shade", "s => s != Shade::Warm" ; "enum projection")]
#[test_case("d => d.Nested", "n => n.AnotherBoolean" ; "nested record projection")]
#[test_case("d => d.FullName", "n => n.starts_with('A')" ; "conversion projection")]
#[test_case("d => d.Score", "s => s > 70" ; "scalar projection")]
fn test_projection_then_filter_selects_same_values(projection: &str, predicate: &str) {
    let mapping = mapping();
    let parameters = ParameterValues::new();
    let projection_lambda = parse_lambda(
        projection,
        &DataType::record("Dto"),
        mapping.catalog(),
        mapping.parameter_types(),
    )
    .unwrap();
    let predicate_lambda = parse_lambda(
        predicate,
        &projection_lambda.return_type(),
        mapping.catalog(),
        mapping.parameter_types(),
    )
    .unwrap();

    let evaluator = Evaluator::new(mapping.catalog(), &parameters);
    let expected: Vec<Value> = models()
        .iter()
        .map(|row| {
            let dto = mapping
                .map_value(row, &DataType::record("Dto"), &parameters)
                .unwrap();
            evaluator.apply(&projection_lambda, dto).unwrap()
        })
        .filter(|value| {
            evaluator
                .apply(&predicate_lambda, value.clone())
                .unwrap()
                .as_bool()
                == Some(true)
        })
        .collect();

    let actual = model_query()
        .select(projection)
        .unwrap()
        .filter(predicate)
        .unwrap()
        .to_list()
        .unwrap();
    assert!(!expected.is_empty());
    assert_eq!(actual, expected);
}
