//! Parsing edge cases and error handling for the lambda language.

use exprmap::expression::{parse_lambda, DataType, ParameterTypes, ParseError};
use exprmap::mapping::{EnumDef, RecordDef, TypeCatalog};

fn catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with_enum(EnumDef::new("Status", &["Open", "Closed"]))
        .with_record(RecordDef::new("Tag").field("Label", DataType::String))
        .with_record(
            RecordDef::new("Issue")
                .field("Title", DataType::String)
                .field("Votes", DataType::Int)
                .field("Status", DataType::enumeration("Status"))
                .field("Tags", DataType::sequence_of(DataType::record("Tag"))),
        )
}

fn parse(text: &str) -> Result<exprmap::Lambda, ParseError> {
    let mut externals = ParameterTypes::new();
    externals.insert("floor".to_string(), DataType::Int);
    parse_lambda(text, &DataType::record("Issue"), &catalog(), &externals)
}

/// Malformed input returns an error instead of panicking
#[test]
fn test_malformed_lambdas_are_errors() {
    let malformed = vec![
        "",
        "=>",
        "i =>",
        "i => ",
        "i => i.",
        "i => (i.Votes",
        "i => i.Votes >",
        "i => i.Votes ? 1",
        "i => 'unterminated",
        "i => i.Tags.any(",
        "i => new Issue { Title: }",
        "i => i.Votes i.Votes",
        "i => Status::",
    ];

    for text in malformed {
        assert!(parse(text).is_err(), "expected an error for {:?}", text);
    }
}

#[test]
fn test_resolution_errors() {
    assert!(matches!(parse("i => i.Nope"), Err(ParseError::UnknownMember { .. })));
    assert!(matches!(parse("i => i.Status == Status::Gone"), Err(ParseError::UnknownVariant { .. })));
    assert!(matches!(parse("i => i.Votes > $ceiling"), Err(ParseError::UnknownParameter(_))));
    assert!(matches!(parse("i => i.Tags.frobnicate()"), Err(ParseError::UnknownMethod(_))));
    assert!(matches!(parse("i => x.Votes"), Err(ParseError::UnknownIdentifier(_))));
    assert!(matches!(parse("i => i.Title > 3"), Err(ParseError::TypeMismatch { .. })));
    assert!(matches!(parse("i.Votes"), Err(ParseError::NotALambda(_))));
}

/// `Display` output parses back into the same tree
#[test]
fn test_display_round_trips_through_parser() {
    let cases = [
        "i => i.Votes >= $floor",
        "i => i.Tags.any(t => t.Label.starts_with('bug'))",
        "i => (i.Status == Status::Open ? i.Votes : -1)",
        "i => i.Title.to_upper() ?? 'none'",
        "i => new Tag { Label: i.Title }",
        "i => (i.Votes as float) * 1.5",
    ];

    for text in cases {
        let lambda = parse(text).unwrap();
        let reparsed = parse(&lambda.to_string()).unwrap();
        assert_eq!(lambda, reparsed, "round trip of {:?}", text);
    }
}

#[test]
fn test_static_types() {
    assert_eq!(parse("i => i.Tags.count()").unwrap().return_type(), DataType::Int);
    assert_eq!(
        parse("i => i.Tags.select(t => t.Label)").unwrap().return_type(),
        DataType::sequence_of(DataType::String)
    );
    assert_eq!(
        parse("i => i.Tags.first_or_default()").unwrap().return_type(),
        DataType::record("Tag")
    );
}
