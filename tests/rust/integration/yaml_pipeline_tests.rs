//! End to end: mapping loaded from a YAML file, rows loaded from JSON.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use tempfile::NamedTempFile;

use exprmap::query::{InMemorySource, UseAsDataSource};
use exprmap::{MappingDefinition, Value};

const PEOPLE: &str = r#"
name: people
types:
  enums:
    Color: [Red, Blue]
    Shade: [Warm, Cool]
  records:
    Person: { First: string, Last: string, Age: int, Color: Color }
    PersonDto: { First: string, FullName: string, Age: float, Shade: Shade, Label: string }
parameters:
  prefix: string
maps:
  - source: Person
    destination: PersonDto
    auto_map: true
    members:
      FullName: { convert: "p => p.First + ' ' + p.Last" }
      Shade: Color
      Label: { convert: "p => $prefix + p.First" }
enum_maps:
  - source: Color
    destination: Shade
    pairs: { Red: Warm, Blue: Cool }
"#;

fn mapping_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(PEOPLE.as_bytes()).unwrap();
    file
}

#[test]
fn test_query_with_yaml_mapping_and_json_rows() {
    let file = mapping_file();
    let mapping = Arc::new(MappingDefinition::load(file.path()).unwrap());

    let source = InMemorySource::from_json(
        mapping.shared_catalog(),
        "Person",
        &[
            json!({ "First": "Ada", "Last": "Lovelace", "Age": 36, "Color": "Blue" }),
            json!({ "First": "Alan", "Last": "Turing", "Age": 41, "Color": "Red" }),
            json!({ "First": "Grace", "Last": "Hopper", "Age": 85, "Color": "Blue" }),
        ],
    )
    .unwrap();

    let query = source
        .use_as_data_source(mapping)
        .with_parameter("prefix", "Dr. ")
        .for_type("PersonDto")
        .unwrap()
        .filter("p => p.Shade == Shade::Cool && p.Age < 50.0")
        .unwrap();

    let people = query.to_list().unwrap();
    assert_eq!(people.len(), 1);
    let ada = people[0].as_record().unwrap();
    assert_eq!(ada.get("FullName"), &Value::from("Ada Lovelace"));
    assert_eq!(ada.get("Age"), &Value::Float(36.0));
    assert_eq!(ada.get("Label"), &Value::from("Dr. Ada"));
    assert_eq!(
        people[0].to_json(),
        json!({
            "First": "Ada",
            "FullName": "Ada Lovelace",
            "Age": 36.0,
            "Shade": "Cool",
            "Label": "Dr. Ada"
        })
    );
}

#[test]
fn test_missing_file_is_reported() {
    let result = MappingDefinition::load("/nonexistent/mapping.yaml");
    assert!(matches!(
        result,
        Err(exprmap::MappingError::ConfigRead { .. })
    ));
}
