use crate::types::{
    ArithOp, CompareOp, Function, JqpathError, MapExpr, PathComponent, PathsFilter, Predicate,
    Result, SliceSpec,
};
use crate::value::parse_literal;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while1},
    character::complete::{char, digit1, multispace0, none_of},
    combinator::{all_consuming, cut, map, map_res, not, opt, recognize, value},
    error::{context, ErrorKind, ParseError as _},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use nom_language::error::{convert_error, VerboseError};
use serde_json::Value;
use tracing::debug;

type Res<T, U> = IResult<T, U, VerboseError<T>>;

/// A component as it comes out of the grammar. Function arguments and
/// construct fields are kept as text until the whole expression is known to
/// be well formed, then resolved once.
#[derive(Debug)]
enum RawComponent<'a> {
    Ready(PathComponent),
    Function {
        name: &'a str,
        arg: Option<&'a str>,
    },
    Construct(Vec<(String, Option<&'a str>)>),
}

/// Parses a path expression into its components.
///
/// ## Arguments
///
/// * `input` - The expression, e.g. `users.*.age` or `items[?(@.price > 10)].name`
///
/// ## Returns
///
/// The ordered components, or a `ParseError` for malformed text. Unsupported
/// function arguments are reported as `ValueError`.
pub fn parse_path(input: &str) -> Result<Vec<PathComponent>> {
    let text = input.trim();
    if text.is_empty() || text == "." {
        return Ok(Vec::new());
    }

    let raw = match all_consuming(path).parse(text) {
        Ok((_, raw)) => raw,
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
            return Err(JqpathError::ParseError(convert_error(text, err)))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(JqpathError::ParseError(format!(
                "incomplete expression '{text}'"
            )))
        }
    };

    let components = raw.into_iter().map(resolve).collect::<Result<Vec<_>>>()?;
    debug!(expression = %text, components = components.len(), "parsed path expression");
    Ok(components)
}

fn path(input: &str) -> Res<&str, Vec<RawComponent<'_>>> {
    let (input, first) = preceded(opt(char('.')), segment).parse(input)?;
    let (input, rest) = many0(preceded(opt(char('.')), segment)).parse(input)?;

    let components = first.into_iter().chain(rest.into_iter().flatten()).collect();
    Ok((input, components))
}

fn segment(input: &str) -> Res<&str, Vec<RawComponent<'_>>> {
    alt((
        map(construct, |c| vec![c]),
        map(star, |c| vec![RawComponent::Ready(c)]),
        keyed,
    ))
    .parse(input)
}

fn star(input: &str) -> Res<&str, PathComponent> {
    let (input, _) = char('*').parse(input)?;
    let (input, question) = opt(char('?')).parse(input)?;
    let component = if question.is_some() {
        PathComponent::OptionalWildcard
    } else {
        PathComponent::Wildcard
    };
    Ok((input, component))
}

/// A key, number or function name followed by any number of brackets, or
/// brackets on their own.
fn keyed(input: &str) -> Res<&str, Vec<RawComponent<'_>>> {
    let (input, head) = opt(head).parse(input)?;
    let (input, brackets) = many0(bracket).parse(input)?;

    if head.is_none() && brackets.is_empty() {
        return Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::Many1,
        )));
    }

    let mut components = Vec::with_capacity(brackets.len() + 1);
    components.extend(head);
    components.extend(brackets.into_iter().map(RawComponent::Ready));
    Ok((input, components))
}

fn head(input: &str) -> Res<&str, RawComponent<'_>> {
    alt((quoted_head, named_head)).parse(input)
}

fn quoted_head(input: &str) -> Res<&str, RawComponent<'_>> {
    let (input, key) = alt((quoted_string, single_quoted_string)).parse(input)?;
    let (input, question) = opt(char('?')).parse(input)?;
    let component = if question.is_some() {
        PathComponent::OptionalKey(key)
    } else {
        PathComponent::Key(key)
    };
    Ok((input, RawComponent::Ready(component)))
}

fn named_head(input: &str) -> Res<&str, RawComponent<'_>> {
    let (input, name) = identifier(input)?;

    if Function::is_function_name(name) {
        let (input, arg) = opt(parenthesized).parse(input)?;
        return Ok((input, RawComponent::Function { name, arg }));
    }

    let (input, question) = opt(char('?')).parse(input)?;
    let component = match name.parse::<i64>() {
        Ok(index) => PathComponent::Index(index),
        Err(_) => PathComponent::Key(name.to_string()),
    };
    let component = if question.is_some() {
        optional(component)
    } else {
        component
    };
    Ok((input, RawComponent::Ready(component)))
}

fn bracket(input: &str) -> Res<&str, PathComponent> {
    let (input, _) = char('[').parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, body) = opt(bracket_body).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("closing bracket", cut(char(']'))).parse(input)?;
    let (input, question) = opt(char('?')).parse(input)?;

    let component = body.unwrap_or(PathComponent::ArrayWildcard);
    let component = if question.is_some() {
        optional(component)
    } else {
        component
    };
    Ok((input, component))
}

fn bracket_body(input: &str) -> Res<&str, PathComponent> {
    alt((
        selector,
        value(PathComponent::Wildcard, char('*')),
        map(alt((quoted_string, single_quoted_string)), PathComponent::Key),
        map(slice, PathComponent::Slice),
        map(integer, PathComponent::Index),
    ))
    .parse(input)
}

fn optional(component: PathComponent) -> PathComponent {
    match component {
        PathComponent::Key(key) => PathComponent::OptionalKey(key),
        PathComponent::Index(index) => PathComponent::OptionalIndex(index),
        PathComponent::Wildcard => PathComponent::OptionalWildcard,
        PathComponent::ArrayWildcard => PathComponent::OptionalArrayWildcard,
        other => other,
    }
}

fn slice(input: &str) -> Res<&str, SliceSpec> {
    let (input, start) = opt(integer).parse(input)?;
    let (input, _) = delimited(multispace0, char(':'), multispace0).parse(input)?;
    let (input, stop) = opt(integer).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("slice with a step", cut(not(char(':')))).parse(input)?;
    Ok((input, SliceSpec::new(start, stop)))
}

fn integer(input: &str) -> Res<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })
    .parse(input)
}

fn selector(input: &str) -> Res<&str, PathComponent> {
    let start = input;
    let (input, _) = char('?').parse(input)?;
    let (input, predicate) = context("selector", cut(alt((compare, dict_match)))).parse(input)?;
    let raw = start[..start.len() - input.len()].to_string();
    Ok((input, PathComponent::Selector { predicate, raw }))
}

fn compare(input: &str) -> Res<&str, Predicate> {
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = tag("@.").parse(input)?;
    let (input, key) = alt((
        quoted_string,
        single_quoted_string,
        map(identifier, str::to_string),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = map_res(
        alt((
            tag("=="),
            tag("!="),
            tag(">="),
            tag("<="),
            tag(">"),
            tag("<"),
        )),
        |s: &str| s.parse::<CompareOp>(),
    )
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, literal) = literal_text(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')').parse(input)?;

    Ok((
        input,
        Predicate::Compare {
            key,
            op,
            literal: parse_literal(literal),
        },
    ))
}

fn literal_text(input: &str) -> Res<&str, &str> {
    alt((
        recognize(quoted_string),
        recognize(single_quoted_string),
        map(take_while1(|c: char| c != ')'), str::trim_end),
    ))
    .parse(input)
}

fn dict_match(input: &str) -> Res<&str, Predicate> {
    let (rest, _) = char('{').parse(input)?;
    let Some(end) = scan_balanced(rest, &['}']) else {
        return Err(nom::Err::Failure(VerboseError::from_char(rest, '}')));
    };
    let text = &input[..end + 2];
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok((&rest[end + 1..], Predicate::DictMatch(map))),
        _ => Err(nom::Err::Failure(VerboseError::from_error_kind(
            input,
            ErrorKind::Verify,
        ))),
    }
}

fn construct(input: &str) -> Res<&str, RawComponent<'_>> {
    let (input, _) = char('{').parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, fields) = separated_list0(
        delimited(multispace0, char(','), multispace0),
        construct_field,
    )
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("closing brace", cut(char('}'))).parse(input)?;
    Ok((input, RawComponent::Construct(fields)))
}

fn construct_field(input: &str) -> Res<&str, (String, Option<&str>)> {
    let (input, name) = alt((
        quoted_string,
        single_quoted_string,
        map(identifier, str::to_string),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = opt(preceded(pair(char(':'), multispace0), field_value)).parse(input)?;
    Ok((input, (name, value)))
}

fn field_value(input: &str) -> Res<&str, &str> {
    let end = scan_balanced(input, &[',', '}']).unwrap_or(input.len());
    let text = input[..end].trim_end();
    if text.is_empty() {
        return Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::TakeWhile1,
        )));
    }
    Ok((&input[end..], text))
}

/// The argument text between a pair of parentheses, with nesting and quotes respected.
fn parenthesized(input: &str) -> Res<&str, &str> {
    let (rest, _) = char('(').parse(input)?;
    match scan_balanced(rest, &[')']) {
        Some(end) => Ok((&rest[end + 1..], &rest[..end])),
        None => Err(nom::Err::Failure(VerboseError::from_char(rest, ')'))),
    }
}

/// Byte offset of the first `stops` character at nesting depth zero,
/// skipping quoted strings and bracketed groups.
fn scan_balanced(input: &str, stops: &[char]) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            _ if depth == 0 && stops.contains(&c) => return Some(i),
            _ => {}
        }
    }
    None
}

fn identifier(input: &str) -> Res<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '$' || c == '@')
        .parse(input)
}

fn quoted_string(input: &str) -> Res<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                none_of("\\\""),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('"', char('"')),
                    value('/', char('/')),
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )
    .parse(input)
}

fn single_quoted_string(input: &str) -> Res<&str, String> {
    delimited(
        char('\''),
        map(
            opt(escaped_transform(
                none_of("\\'"),
                '\\',
                alt((value('\\', char('\\')), value('\'', char('\'')))),
            )),
            Option::unwrap_or_default,
        ),
        char('\''),
    )
    .parse(input)
}

fn resolve(raw: RawComponent<'_>) -> Result<PathComponent> {
    match raw {
        RawComponent::Ready(component) => Ok(component),
        RawComponent::Function { name, arg } => {
            let function = build_function(name, arg)?;
            let raw = match arg {
                Some(arg) => format!("{name}({arg})"),
                None => name.to_string(),
            };
            Ok(PathComponent::Function { function, raw })
        }
        RawComponent::Construct(fields) => fields
            .into_iter()
            .map(|(name, value)| -> Result<(String, Vec<PathComponent>)> {
                let path = match value {
                    Some(text) => field_path(text)?,
                    None => vec![PathComponent::Key(name.clone())],
                };
                Ok((name, path))
            })
            .collect::<Result<Vec<_>>>()
            .map(PathComponent::Construct),
    }
}

/// A construct field is either a scalar literal or a sub-path; container
/// literals are only taken when the text is not a valid path.
fn field_path(text: &str) -> Result<Vec<PathComponent>> {
    let text = text.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(literal) if !literal.is_array() && !literal.is_object() => {
            return Ok(vec![PathComponent::Literal(literal)])
        }
        _ => {}
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Ok(vec![PathComponent::Literal(parse_literal(text))]);
    }
    match parse_path(text) {
        Ok(path) => Ok(path),
        Err(err) => match serde_json::from_str::<Value>(text) {
            Ok(literal) => Ok(vec![PathComponent::Literal(literal)]),
            Err(_) => Err(err),
        },
    }
}

fn text_argument(arg: &str) -> String {
    if arg.trim().is_empty() {
        return arg.to_string();
    }
    match parse_literal(arg) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn build_function(name: &str, arg: Option<&str>) -> Result<Function> {
    let present = arg.filter(|a| !a.trim().is_empty());
    let required = || {
        arg.filter(|a| !a.is_empty()).ok_or_else(|| {
            JqpathError::ValueError(format!("function '{name}' requires an argument"))
        })
    };
    let no_argument = |function: Function| match present {
        None => Ok(function),
        Some(arg) => Err(JqpathError::ValueError(format!(
            "function '{name}' takes no argument, got '{arg}'"
        ))),
    };

    match name {
        "keys" => no_argument(Function::Keys),
        "length" => no_argument(Function::Length),
        "type" => no_argument(Function::Type),
        "has" => Ok(Function::Has(parse_literal(required()?))),
        "map" => Ok(Function::Map(build_map_expr(required()?)?)),
        "paths" => match present.map(str::trim) {
            None => Ok(Function::Paths(None)),
            Some("objects") => Ok(Function::Paths(Some(PathsFilter::Objects))),
            Some("arrays") => Ok(Function::Paths(Some(PathsFilter::Arrays))),
            Some("scalars") => Ok(Function::Paths(Some(PathsFilter::Scalars))),
            Some(other) => Err(JqpathError::ValueError(format!(
                "unsupported paths filter '{other}', expected objects, arrays or scalars"
            ))),
        },
        "split" => Ok(Function::Split(text_argument(required()?))),
        "join" => Ok(Function::Join(arg.map(text_argument).unwrap_or_default())),
        "lowercase" | "lower" | "ascii_downcase" => no_argument(Function::Lowercase),
        "uppercase" | "upper" | "ascii_upcase" => no_argument(Function::Uppercase),
        "trim" => no_argument(Function::Trim),
        "startswith" => Ok(Function::StartsWith(text_argument(required()?))),
        "endswith" => Ok(Function::EndsWith(text_argument(required()?))),
        "contains" => Ok(Function::Contains(parse_literal(required()?))),
        "add" => no_argument(Function::Add),
        "min" => no_argument(Function::Min),
        "max" => no_argument(Function::Max),
        "sort" => no_argument(Function::Sort),
        "reverse" => no_argument(Function::Reverse),
        "unique" => no_argument(Function::Unique),
        "flatten" => match present.map(str::trim) {
            None => Ok(Function::Flatten(None)),
            Some(depth) => depth
                .parse::<usize>()
                .map(|d| Function::Flatten(Some(d)))
                .map_err(|_| {
                    JqpathError::ValueError(format!(
                        "flatten depth must be a non-negative integer, got '{depth}'"
                    ))
                }),
        },
        other => Err(JqpathError::ValueError(format!("unknown function '{other}'"))),
    }
}

fn build_map_expr(arg: &str) -> Result<MapExpr> {
    let text = arg.trim();
    if let Some(rest) = text.strip_prefix('.') {
        let rest = rest.trim_start();
        for (symbol, op) in [('*', ArithOp::Mul), ('+', ArithOp::Add)] {
            if let Some(operand) = rest.strip_prefix(symbol) {
                if let Ok(operand) = operand.trim().parse::<f64>() {
                    return Ok(MapExpr::Arithmetic { op, operand });
                }
            }
        }
    }
    parse_path(text).map(MapExpr::Path)
}
