//! Destination lambdas and the source lambdas they translate into.

use test_case::test_case;

use exprmap::expression::{parse_lambda, DataType};
use exprmap::mapping::{EnumDef, EnumMap, RecordDef, TypeCatalog, TypeMap};
use exprmap::{ExpressionTranslator, MappingConfiguration, MappingService, TranslationError};

fn mapping() -> MappingConfiguration {
    let catalog = TypeCatalog::new()
        .with_enum(EnumDef::new("Grade", &["Junior", "Senior"]))
        .with_enum(EnumDef::new("Level", &["L1", "L2"]))
        .with_record(
            RecordDef::new("Dept")
                .field("Code", DataType::String)
                .field("Floor", DataType::Int),
        )
        .with_record(
            RecordDef::new("Employee")
                .field("GivenName", DataType::String)
                .field("FamilyName", DataType::String)
                .field("Salary", DataType::Int)
                .field("Grade", DataType::enumeration("Grade"))
                .field("Dept", DataType::record("Dept"))
                .field("Reports", DataType::sequence_of(DataType::record("Employee"))),
        )
        .with_record(
            RecordDef::new("DeptView")
                .field("Name", DataType::String)
                .field("Level", DataType::Int),
        )
        .with_record(
            RecordDef::new("EmployeeView")
                .field("Name", DataType::String)
                .field("Pay", DataType::Int)
                .field("Level", DataType::enumeration("Level"))
                .field("Department", DataType::record("DeptView"))
                .field("Team", DataType::sequence_of(DataType::record("EmployeeView")))
                .field("Unmapped", DataType::Bool),
        );

    let mut config = MappingConfiguration::new(catalog);
    let name = config
        .conversion("Employee", "e => e.GivenName + ' ' + e.FamilyName")
        .unwrap();
    config.add_type_map(
        TypeMap::new("Employee", "EmployeeView")
            .rule("Name", name)
            .path("Pay", "Salary")
            .path("Level", "Grade")
            .path("Department", "Dept")
            .path("Team", "Reports"),
    );
    config.add_type_map(
        TypeMap::new("Dept", "DeptView")
            .path("Name", "Code")
            .path("Level", "Floor"),
    );
    config.add_enum_map(
        EnumMap::new("Grade", "Level")
            .pair("Junior", "L1")
            .pair("Senior", "L2"),
    );
    config
}

fn translate(text: &str) -> Result<String, TranslationError> {
    let mapping = mapping();
    let lambda = parse_lambda(
        text,
        &DataType::record("EmployeeView"),
        mapping.catalog(),
        mapping.parameter_types(),
    )
    .unwrap();
    ExpressionTranslator::new(&mapping)
        .translate_lambda(&lambda, &DataType::record("Employee"))
        .map(|lambda| lambda.to_string())
}

#[test_case("v => v.Pay > 100", "v => (v.Salary > 100)" ; "renamed member")]
#[test_case("v => v.Department.Name == 'R&D'", "v => (v.Dept.Code == 'R&D')" ; "nested record path")]
#[test_case(
    "v => v.Name.starts_with('A')",
    "v => ((v.GivenName + ' ') + v.FamilyName).starts_with('A')" ;
    "inlined conversion"
)]
#[test_case("v => v.Level == Level::L2", "v => (v.Grade == Grade::Senior)" ; "enum constant")]
#[test_case(
    "v => v.Team.any(t => t.Pay > v.Pay)",
    "v => v.Reports.any(t => (t.Salary > v.Salary))" ;
    "nested lambda over collection"
)]
#[test_case(
    "v => v.Team.select(t => t.Department.Level).sum() > 3",
    "v => (v.Reports.select(t => t.Dept.Floor).sum() > 3)" ;
    "projection and aggregate"
)]
#[test_case(
    "v => (v.Level == Level::L1 ? v.Pay : 0) >= 10",
    "v => (((v.Grade == Grade::Junior) ? v.Salary : 0) >= 10)" ;
    "conditional"
)]
fn test_translation(destination: &str, expected: &str) {
    assert_eq!(translate(destination).unwrap(), expected);
}

#[test]
fn test_enum_compared_with_enum_member_of_other_record() {
    // Both sides retyped, no conversion needed
    assert_eq!(
        translate("v => v.Team.all(t => t.Level == v.Level)").unwrap(),
        "v => v.Reports.all(t => (t.Grade == v.Grade))"
    );
}

#[test]
fn test_missing_member_mapping() {
    assert_eq!(
        translate("v => v.Unmapped").unwrap_err(),
        TranslationError::MappingNotFound {
            source_type: "Employee".to_string(),
            destination_type: "EmployeeView".to_string(),
            member: "Unmapped".to_string(),
        }
    );
}

#[test]
fn test_translation_is_deterministic() {
    let text = "v => v.Team.where(t => t.Level == Level::L2).count() > 1 && v.Name != ''";
    assert_eq!(translate(text).unwrap(), translate(text).unwrap());
}
