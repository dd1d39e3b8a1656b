//! InfluxQL Parser
//!
//! Parses the SELECT subset of InfluxQL into the statement AST.
//!
//! # Supported Syntax
//!
//! ```text
//! SELECT field_expr [AS alias] [, ...]
//! FROM [db.[rp].]measurement | /regex/ | (subquery)
//! [WHERE condition]
//! [GROUP BY tag [, tag ...] [, time(interval [, offset])]]
//! [LIMIT n] [OFFSET n]
//! [; SELECT ...]
//! ```
//!
//! # Examples
//!
//! ```text
//! SELECT mean(value) FROM db0..cpu GROUP BY host
//! SELECT max(usage) AS peak FROM cpu WHERE time > now() - 1h AND host =~ /^web/
//! SELECT count(value) FROM cpu GROUP BY time(5m, -1m); SELECT last(value) FROM mem
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value, verify},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::influxql::ast::*;
use crate::influxql::error::{ParseError, ParseResult};

const RESERVED: &[&str] = &[
    "select", "from", "where", "group", "by", "limit", "offset", "as", "and", "or", "not",
    "true", "false",
];

/// Parse a query string into statements
pub fn parse_query(input: &str) -> ParseResult<Query> {
    let input = input.trim();
    if input.trim_end_matches(';').trim().is_empty() {
        return Err(ParseError::Empty);
    }

    match parse_statements(input) {
        Ok((remaining, statements)) => {
            if remaining.trim().is_empty() {
                Ok(Query { statements })
            } else {
                Err(ParseError::TrailingInput(remaining.trim().to_string()))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ParseError::Syntax(snippet(e.input)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Syntax(String::new())),
    }
}

/// Parse a single SELECT statement
pub fn parse_statement(input: &str) -> ParseResult<SelectStatement> {
    let mut query = parse_query(input)?;
    if query.statements.len() != 1 {
        return Err(ParseError::TrailingInput(input.trim().to_string()));
    }
    Ok(query.statements.remove(0))
}

fn snippet(input: &str) -> String {
    input.chars().take(24).collect()
}

/// `;`-separated statements with an optional trailing `;`
fn parse_statements(input: &str) -> IResult<&str, Vec<SelectStatement>> {
    terminated(
        separated_list1(delimited(multispace0, char(';'), multispace0), parse_select),
        opt(preceded(multispace0, char(';'))),
    )(input)
}

/// Parse the full SELECT statement
fn parse_select(input: &str) -> IResult<&str, SelectStatement> {
    let (input, _) = keyword("SELECT")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, fields) = separated_list1(comma, parse_field)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, sources) = separated_list1(comma, parse_source)(input)?;
    let (input, condition) = opt(parse_where_clause)(input)?;
    let (input, dimensions) = opt(parse_group_by_clause)(input)?;
    let (input, limit) = opt(|i| parse_count_clause("LIMIT", i))(input)?;
    let (input, offset) = opt(|i| parse_count_clause("OFFSET", i))(input)?;

    Ok((
        input,
        SelectStatement {
            fields,
            sources,
            condition,
            dimensions: dimensions.unwrap_or_default(),
            limit,
            offset,
        },
    ))
}

/// Parse a field with optional alias
fn parse_field(input: &str) -> IResult<&str, Field> {
    let (input, expr) = parse_expr(input)?;
    let (input, alias) = opt(preceded(
        tuple((multispace1, keyword("AS"), multispace1)),
        parse_identifier,
    ))(input)?;

    Ok((input, Field { expr, alias }))
}

/// Parse a FROM source
fn parse_source(input: &str) -> IResult<&str, Source> {
    alt((
        map(parse_regex, Source::Regex),
        map(
            delimited(
                pair(char('('), multispace0),
                parse_select,
                pair(multispace0, char(')')),
            ),
            |stmt| Source::Subquery(Box::new(stmt)),
        ),
        map(parse_measurement, Source::Measurement),
    ))(input)
}

/// Parse `m`, `rp.m`, `db.rp.m` or `db..m`
fn parse_measurement(input: &str) -> IResult<&str, Measurement> {
    let start = input;
    let (input, first) = parse_identifier(input)?;
    let (input, second) = opt(preceded(char('.'), opt(parse_identifier)))(input)?;
    let (input, third) = match second {
        Some(_) => opt(preceded(char('.'), parse_identifier))(input)?,
        None => (input, None),
    };

    let measurement = match (second, third) {
        (None, _) => Measurement::new(first),
        (Some(Some(name)), None) => Measurement {
            database: None,
            retention_policy: Some(first),
            name,
        },
        (Some(rp), Some(name)) => Measurement {
            database: Some(first),
            retention_policy: rp,
            name,
        },
        (Some(None), None) => {
            return Err(nom::Err::Error(nom::error::Error::new(
                start,
                nom::error::ErrorKind::Verify,
            )))
        }
    };

    Ok((input, measurement))
}

/// Parse WHERE clause
fn parse_where_clause(input: &str) -> IResult<&str, Expr> {
    preceded(tuple((multispace0, keyword("WHERE"), multispace0)), parse_expr)(input)
}

/// Parse GROUP BY clause
fn parse_group_by_clause(input: &str) -> IResult<&str, Vec<Dimension>> {
    let (input, _) = multispace0(input)?;
    let (input, _) = keyword("GROUP")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("BY")(input)?;
    let (input, _) = multispace0(input)?;
    separated_list1(comma, map(parse_expr, |expr| Dimension { expr }))(input)
}

/// Parse `LIMIT n` / `OFFSET n`
fn parse_count_clause<'a>(kw: &'static str, input: &'a str) -> IResult<&'a str, u64> {
    let (input, _) = multispace0(input)?;
    let (input, _) = keyword(kw)(input)?;
    let (input, _) = multispace1(input)?;
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

/// Parse an expression (lowest precedence: OR)
pub(crate) fn parse_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, parse_and, |i| value(BinaryOp::Or, keyword("OR"))(i))
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, parse_not, |i| value(BinaryOp::And, keyword("AND"))(i))
}

fn parse_not(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(pair(keyword("NOT"), multispace0), parse_not), |e| {
            Expr::Not(Box::new(e))
        }),
        parse_comparison,
    ))(input)
}

/// Comparisons do not chain
fn parse_comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = parse_additive(input)?;
    let (input, rhs) = opt(tuple((
        multispace0,
        parse_comparison_operator,
        multispace0,
        parse_additive,
    )))(input)?;

    Ok(match rhs {
        Some((_, op, _, rhs)) => (input, Expr::binary(lhs, op, rhs)),
        None => (input, lhs),
    })
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, parse_multiplicative, |i| {
        alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))(i)
    })
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    fold_binary(input, parse_primary, |i| {
        alt((value(BinaryOp::Mul, char('*')), value(BinaryOp::Div, char('/'))))(i)
    })
}

/// Left-associative fold of `operand (op operand)*`
fn fold_binary<'a, F, O>(input: &'a str, operand: F, mut operator: O) -> IResult<&'a str, Expr>
where
    F: Fn(&'a str) -> IResult<&'a str, Expr>,
    O: FnMut(&'a str) -> IResult<&'a str, BinaryOp>,
{
    let (mut input, mut lhs) = operand(input)?;
    loop {
        let attempt = tuple((multispace0, &mut operator, multispace0, &operand))(input);
        match attempt {
            Ok((rest, (_, op, _, rhs))) => {
                lhs = Expr::binary(lhs, op, rhs);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        }
    }
}

/// Parse comparison operator
fn parse_comparison_operator(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::RegexMatch, tag("=~")),
        value(BinaryOp::RegexNotMatch, tag("!~")),
        value(BinaryOp::Ne, alt((tag("!="), tag("<>")))),
        value(BinaryOp::Gte, tag(">=")),
        value(BinaryOp::Lte, tag("<=")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Eq, tag("=")),
    ))(input)
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            delimited(
                pair(char('('), multispace0),
                parse_expr,
                pair(multispace0, char(')')),
            ),
            |e| Expr::Paren(Box::new(e)),
        ),
        parse_call,
        map(parse_literal, Expr::Literal),
        value(Expr::Wildcard, char('*')),
        map(parse_identifier, Expr::VarRef),
    ))(input)
}

/// Parse a call like `mean(value)` or `now()`
fn parse_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = parse_bare_identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = delimited(
        pair(char('('), multispace0),
        separated_list0(comma, parse_expr),
        pair(multispace0, char(')')),
    )(input)?;

    Ok((
        input,
        Expr::Call {
            name: name.to_string(),
            args,
        },
    ))
}

fn parse_literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(parse_quoted_string, Literal::String),
        map(parse_regex, Literal::Regex),
        value(Literal::Boolean(true), keyword("TRUE")),
        value(Literal::Boolean(false), keyword("FALSE")),
        map(parse_duration, Literal::Duration),
        parse_number,
    ))(input)
}

/// Parse duration like `10m`, `-15s`, `1h`
fn parse_duration(input: &str) -> IResult<&str, i64> {
    let (input, sign) = opt(char('-'))(input)?;
    let (input, amount) = map_res(digit1, |s: &str| s.parse::<i64>())(input)?;
    let (input, unit) = terminated(
        alt((
            value(1i64, tag("ns")),
            value(1_000i64, alt((tag("us"), tag("µs"), tag("µ"), tag("u")))),
            value(1_000_000i64, tag("ms")),
            value(1_000_000_000i64, tag("s")),
            value(60_000_000_000i64, tag("m")),
            value(3_600_000_000_000i64, tag("h")),
            value(86_400_000_000_000i64, tag("d")),
            value(604_800_000_000_000i64, tag("w")),
        )),
        not(peek(satisfy(is_ident_char))),
    )(input)?;

    let nanos = amount.checked_mul(unit).ok_or_else(|| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::TooLarge))
    })?;

    Ok((input, if sign.is_some() { -nanos } else { nanos }))
}

/// Parse integer or floating point number
fn parse_number(input: &str) -> IResult<&str, Literal> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        |s: &str| {
            if s.contains('.') {
                s.parse::<f64>().map(Literal::Float).map_err(|_| ())
            } else {
                s.parse::<i64>().map(Literal::Integer).map_err(|_| ())
            }
        },
    )(input)
}

/// Parse `'single quoted'` string with `\'` and `\\` escapes
fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    parse_delimited('\'', input)
}

/// Parse `/regex/` with `\/` escapes
fn parse_regex(input: &str) -> IResult<&str, String> {
    parse_delimited('/', input)
}

fn parse_delimited(delim: char, input: &str) -> IResult<&str, String> {
    let (rest, _) = char(delim)(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, next)) if next == delim => out.push(next),
                Some((_, '\\')) if delim == '\'' => out.push('\\'),
                Some((_, next)) => {
                    out.push('\\');
                    out.push(next);
                }
                None => break,
            },
            c if c == delim => return Ok((&rest[i + c.len_utf8()..], out)),
            c => out.push(c),
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Parse identifier (bare or double quoted)
fn parse_identifier(input: &str) -> IResult<&str, String> {
    alt((
        map(parse_bare_identifier, str::to_string),
        |i| parse_delimited('"', i),
    ))(input)
}

fn parse_bare_identifier(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |s: &str| !RESERVED.contains(&s.to_lowercase().as_str()),
    )(input)
}

/// Case-insensitive keyword not followed by an identifier character
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(peek(satisfy(is_ident_char))))
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
