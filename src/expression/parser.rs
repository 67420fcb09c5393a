/// Lambda expression parser
///
/// Parses the small expression language used for predicates, orderings,
/// projections and mapping conversions:
/// - Lambdas: `dto => dto.Nested.AnotherBoolean`
/// - Member chains and method calls: `o.Lines.any(l => l.Qty > 2)`
/// - Literals: `'text'`, `42`, `2.5`, `true`, `false`, `null`
/// - Enum literals: `Status::Active`
/// - Named parameters: `$tenant`
/// - Operators: `! -` (unary), `* / %`, `+ -`, `< <= > >=`, `== !=`, `&&`,
///   `||`, `??`, ternary `c ? a : b`, casts `x as float`
/// - Record construction: `new Summary { name: c.Name, total: c.Total }`
///
/// The output is untyped; `binder` resolves names and types against the
/// type catalog.
use nom::{
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, multispace1},
    combinator::{opt, recognize},
    multi::{many0, separated_list0},
    branch::alt,
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::errors::ParseError;
use super::operators::{BinaryOperator, UnaryOperator};

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedExpr {
    Identifier(String),
    Literal(Literal),
    EnumLiteral {
        enum_type: String,
        variant: String,
    },
    External(String),
    Member {
        target: Box<ParsedExpr>,
        member: String,
    },
    Call {
        receiver: Box<ParsedExpr>,
        method: String,
        args: Vec<ParsedExpr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<ParsedExpr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<ParsedExpr>,
        right: Box<ParsedExpr>,
    },
    Conditional {
        test: Box<ParsedExpr>,
        if_true: Box<ParsedExpr>,
        if_false: Box<ParsedExpr>,
    },
    Cast {
        operand: Box<ParsedExpr>,
        type_name: String,
    },
    Lambda {
        parameter: String,
        body: Box<ParsedExpr>,
    },
    New {
        type_name: String,
        fields: Vec<(String, ParsedExpr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

const OR_OPERATORS: &[(&str, BinaryOperator)] = &[("||", BinaryOperator::OrElse)];
const AND_OPERATORS: &[(&str, BinaryOperator)] = &[("&&", BinaryOperator::AndAlso)];
const COALESCE_OPERATORS: &[(&str, BinaryOperator)] = &[("??", BinaryOperator::Coalesce)];
const EQUALITY_OPERATORS: &[(&str, BinaryOperator)] = &[
    ("==", BinaryOperator::Equal),
    ("!=", BinaryOperator::NotEqual),
];
// Two-character operators must be tried before their one-character prefixes
const RELATIONAL_OPERATORS: &[(&str, BinaryOperator)] = &[
    ("<=", BinaryOperator::LessThanOrEqual),
    (">=", BinaryOperator::GreaterThanOrEqual),
    ("<", BinaryOperator::LessThan),
    (">", BinaryOperator::GreaterThan),
];
const ADDITIVE_OPERATORS: &[(&str, BinaryOperator)] = &[
    ("+", BinaryOperator::Add),
    ("-", BinaryOperator::Subtract),
];
const MULTIPLICATIVE_OPERATORS: &[(&str, BinaryOperator)] = &[
    ("*", BinaryOperator::Multiply),
    ("/", BinaryOperator::Divide),
    ("%", BinaryOperator::Modulo),
];

/// Parse a complete expression, rejecting trailing input.
pub fn parse(input: &str) -> Result<ParsedExpr, ParseError> {
    match parse_expr(input.trim()) {
        Ok((remaining, expr)) => {
            let remaining = remaining.trim();
            if !remaining.is_empty() {
                return Err(ParseError::TrailingInput(remaining.to_string()));
            }
            Ok(expr)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseError::Syntax {
            fragment: e.input.chars().take(32).collect(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Syntax {
            fragment: input.to_string(),
        }),
    }
}

/// Parse an expression (entry point for nested expressions)
pub(crate) fn parse_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (input, _) = multispace0(input)?;
    if let Ok(result) = parse_lambda_expr(input) {
        return Ok(result);
    }
    parse_conditional_expr(input)
}

/// Parse lambda: `param => body`
fn parse_lambda_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (input, parameter) = parse_identifier_str(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = tag("=>")(input)?;
    let (input, body) = parse_expr(input)?;
    Ok((
        input,
        ParsedExpr::Lambda {
            parameter: parameter.to_string(),
            body: Box::new(body),
        },
    ))
}

/// Parse ternary conditional: `test ? a : b` (right associative)
fn parse_conditional_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (input, test) = parse_coalesce_expr(input)?;
    let (after_ws, _) = multispace0(input)?;

    match char::<_, nom::error::Error<_>>('?')(after_ws) {
        Ok((rest, _)) => {
            let (rest, if_true) = parse_expr(rest)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = char(':')(rest)?;
            let (rest, if_false) = parse_expr(rest)?;
            Ok((
                rest,
                ParsedExpr::Conditional {
                    test: Box::new(test),
                    if_true: Box::new(if_true),
                    if_false: Box::new(if_false),
                },
            ))
        }
        Err(_) => Ok((input, test)),
    }
}

fn parse_coalesce_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_or_expr, COALESCE_OPERATORS)
}

fn parse_or_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_and_expr, OR_OPERATORS)
}

fn parse_and_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_equality_expr, AND_OPERATORS)
}

fn parse_equality_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_relational_expr, EQUALITY_OPERATORS)
}

fn parse_relational_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_additive_expr, RELATIONAL_OPERATORS)
}

fn parse_additive_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_multiplicative_expr, ADDITIVE_OPERATORS)
}

fn parse_multiplicative_expr(input: &str) -> IResult<&str, ParsedExpr> {
    parse_left_associative(input, parse_cast_expr, MULTIPLICATIVE_OPERATORS)
}

/// Parse one precedence level of left-associative binary operators
fn parse_left_associative<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, ParsedExpr>,
    operators: &[(&'static str, BinaryOperator)],
) -> IResult<&'a str, ParsedExpr> {
    let (mut input, mut left) = operand(input)?;

    while let Some((rest, op)) = match_operator(input, operators) {
        let (rest, _) = multispace0(rest)?;
        let (rest, right) = operand(rest)?;
        left = ParsedExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        input = rest;
    }

    Ok((input, left))
}

fn match_operator<'a>(
    input: &'a str,
    operators: &[(&'static str, BinaryOperator)],
) -> Option<(&'a str, BinaryOperator)> {
    let (input, _) = multispace0::<_, nom::error::Error<_>>(input).ok()?;
    operators.iter().find_map(|(token, op)| {
        tag::<_, _, nom::error::Error<_>>(*token)(input)
            .ok()
            .map(|(rest, _)| (rest, *op))
    })
}

/// Parse casts: `operand as type`
fn parse_cast_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (mut input, mut expr) = parse_unary_expr(input)?;

    loop {
        let attempt = (
            multispace1::<_, nom::error::Error<_>>,
            tag("as"),
            multispace1,
            parse_type_name,
        )
            .parse(input);
        match attempt {
            Ok((rest, (_, _, _, type_name))) => {
                expr = ParsedExpr::Cast {
                    operand: Box::new(expr),
                    type_name,
                };
                input = rest;
            }
            Err(_) => return Ok((input, expr)),
        }
    }
}

/// Type names: `int`, `Status`, `[Line]`
fn parse_type_name(input: &str) -> IResult<&str, String> {
    if let Ok((rest, _)) = char::<_, nom::error::Error<_>>('[')(input) {
        let (rest, _) = multispace0(rest)?;
        let (rest, inner) = parse_type_name(rest)?;
        let (rest, _) = multispace0(rest)?;
        let (rest, _) = char(']')(rest)?;
        return Ok((rest, format!("[{}]", inner)));
    }
    let (rest, name) = parse_identifier_str(input)?;
    Ok((rest, name.to_string()))
}

fn parse_unary_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = char::<_, nom::error::Error<_>>('!')(input) {
        let (rest, operand) = parse_unary_expr(rest)?;
        return Ok((
            rest,
            ParsedExpr::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            },
        ));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<_>>('-')(input) {
        let (rest, operand) = parse_unary_expr(rest)?;
        return Ok((
            rest,
            ParsedExpr::Unary {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            },
        ));
    }
    parse_postfix_expr(input)
}

/// Parse postfix member access and method calls: `a.b.c(x)`
fn parse_postfix_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (input, mut expr) = parse_primary_expr(input)?;

    let mut current_input = input;
    loop {
        let (new_input, _) = multispace0(current_input)?;

        match preceded(char::<_, nom::error::Error<_>>('.'), parse_identifier_str).parse(new_input)
        {
            Ok((new_input, name)) => {
                let (after_ws, _) = multispace0(new_input)?;
                match char::<_, nom::error::Error<_>>('(')(after_ws) {
                    Ok((args_input, _)) => {
                        let (args_input, args) = separated_list0(
                            delimited(multispace0, char(','), multispace0),
                            parse_expr,
                        )
                        .parse(args_input)?;
                        let (args_input, _) = multispace0(args_input)?;
                        let (args_input, _) = char(')')(args_input)?;
                        expr = ParsedExpr::Call {
                            receiver: Box::new(expr),
                            method: name.to_string(),
                            args,
                        };
                        current_input = args_input;
                    }
                    Err(_) => {
                        expr = ParsedExpr::Member {
                            target: Box::new(expr),
                            member: name.to_string(),
                        };
                        current_input = new_input;
                    }
                }
            }
            Err(_) => break,
        }
    }

    Ok((current_input, expr))
}

/// Parse primary expressions (highest precedence)
fn parse_primary_expr(input: &str) -> IResult<&str, ParsedExpr> {
    alt((
        delimited(
            char('('),
            delimited(multispace0, parse_expr, multispace0),
            char(')'),
        ),
        parse_string_expr,
        parse_number_literal,
        parse_external_expr,
        parse_word_expr,
    ))
    .parse(input)
}

fn parse_string_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (rest, value) = parse_string_literal(input)?;
    Ok((rest, ParsedExpr::Literal(Literal::String(value))))
}

/// Parse named parameter: `$name`
fn parse_external_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (rest, name) = preceded(char('$'), parse_identifier_str).parse(input)?;
    Ok((rest, ParsedExpr::External(name.to_string())))
}

/// Keywords, enum literals, record construction and plain identifiers
fn parse_word_expr(input: &str) -> IResult<&str, ParsedExpr> {
    let (rest, word) = parse_identifier_str(input)?;
    match word {
        "true" => return Ok((rest, ParsedExpr::Literal(Literal::Bool(true)))),
        "false" => return Ok((rest, ParsedExpr::Literal(Literal::Bool(false)))),
        "null" => return Ok((rest, ParsedExpr::Literal(Literal::Null))),
        "new" => return parse_new_record(rest),
        _ => {}
    }

    if let Ok((after, _)) = tag::<_, _, nom::error::Error<_>>("::")(rest) {
        let (after, variant) = parse_identifier_str(after)?;
        return Ok((
            after,
            ParsedExpr::EnumLiteral {
                enum_type: word.to_string(),
                variant: variant.to_string(),
            },
        ));
    }

    Ok((rest, ParsedExpr::Identifier(word.to_string())))
}

/// Parse `new Type { field: expr, ... }` (after the `new` keyword)
fn parse_new_record(input: &str) -> IResult<&str, ParsedExpr> {
    let (input, _) = multispace1(input)?;
    let (input, type_name) = parse_identifier_str(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('{')(input)?;
    let (input, _) = multispace0(input)?;

    let (input, fields) = separated_list0(
        delimited(multispace0, char(','), multispace0),
        parse_record_field,
    )
    .parse(input)?;

    let (input, _) = multispace0(input)?;
    let (input, _) = char('}')(input)?;

    Ok((
        input,
        ParsedExpr::New {
            type_name: type_name.to_string(),
            fields,
        },
    ))
}

fn parse_record_field(input: &str) -> IResult<&str, (String, ParsedExpr)> {
    let (input, name) = parse_identifier_str(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(':')(input)?;
    let (input, value) = parse_expr(input)?;
    Ok((input, (name.to_string(), value)))
}

fn parse_identifier_str(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// Parse `'text'` with backslash escapes
fn parse_string_literal(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('\'')(input)?;
    let mut value = String::new();
    let mut chars = rest.char_indices();

    while let Some((index, c)) = chars.next() {
        match c {
            '\'' => return Ok((&rest[index + 1..], value)),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            other => value.push(other),
        }
    }

    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Parse unsigned numeric literal: `123`, `45.67`
fn parse_number_literal(input: &str) -> IResult<&str, ParsedExpr> {
    let (rest, text) = recognize((digit1, opt(preceded(char('.'), digit1)))).parse(input)?;

    let literal = if text.contains('.') {
        text.parse().map(Literal::Float).ok()
    } else {
        text.parse().map(Literal::Integer).ok()
    };

    match literal {
        Some(literal) => Ok((rest, ParsedExpr::Literal(literal))),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}
