//! Infix filter and sort parsing using nom
//!
//! ```text
//! filter    := or
//! or        := and ('|' and)*
//! and       := unary ('&' unary)*
//! unary     := '(' or ')' | predicate
//! predicate := '$' series '.' path operator operand
//! operand   := ':' param | literal
//! literal   := int | float | 'text' | "text" | true | false | null | '[' literal,* ']'
//! sort      := key (',' key)*
//! key       := ['-'] '$' series '.' path
//! ```

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize},
    multi::{many0, separated_list0, separated_list1},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded},
};
use tangle_types::{Path, Value};

use super::{Expression, Joiner, Operand, Operator, SortKey};
use crate::error::{Result, TangleError};

// =============================================================================
// Basic Combinators
// =============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

/// `$series.path`
fn column(input: &str) -> IResult<&str, (&str, Path)> {
    let (input, _) = char('$').parse(input)?;
    let (input, series) = identifier(input)?;
    let (input, _) = char('.').parse(input)?;
    let (input, path) =
        recognize(pair(identifier, many0(preceded(char('.'), identifier)))).parse(input)?;
    Ok((input, (series, Path::parse(path))))
}

fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        map(tag("!in"), |_| Operator::NotIn),
        map(tag("in"), |_| Operator::In),
        map(tag("<="), |_| Operator::Le),
        map(tag(">="), |_| Operator::Ge),
        map(tag("!="), |_| Operator::Ne),
        map(tag("<>"), |_| Operator::Ne),
        map(tag("!~"), |_| Operator::NotLike),
        map(tag("="), |_| Operator::Eq),
        map(tag("<"), |_| Operator::Lt),
        map(tag(">"), |_| Operator::Gt),
        map(tag("~"), |_| Operator::Like),
    ))
    .parse(input)
}

// =============================================================================
// Literals
// =============================================================================

fn quoted(input: &str) -> IResult<&str, Value> {
    map(
        alt((
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        )),
        Value::from,
    )
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize_float(input)?;
    let value = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(Value::Float).ok()
    } else {
        text.parse::<i64>().map(Value::Int).ok()
    };
    match value {
        Some(value) => Ok((rest, value)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn keyword(input: &str) -> IResult<&str, Value> {
    let (rest, word) = identifier(input)?;
    match word {
        "true" => Ok((rest, Value::Bool(true))),
        "false" => Ok((rest, Value::Bool(false))),
        "null" => Ok((rest, Value::Null)),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn list(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('['),
            separated_list0(char(','), ws(literal)),
            preceded(multispace0, char(']')),
        ),
        Value::List,
    )
    .parse(input)
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((list, quoted, number, keyword)).parse(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(preceded(char(':'), identifier), |name| Operand::Param {
            param: name.into(),
        }),
        map(literal, Operand::Value),
    ))
    .parse(input)
}

// =============================================================================
// Boolean structure
// =============================================================================

fn predicate(input: &str) -> IResult<&str, Expression> {
    let (input, (series, path)) = column(input)?;
    let (input, operation) = ws(operator).parse(input)?;
    let (input, value) = operand(input)?;
    Ok((input, Expression::compare(series, path, operation, value)))
}

fn unary(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        delimited(char('('), or_expr, char(')')),
        predicate,
    )))
    .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    map(separated_list1(char('&'), unary), |mut items| {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Expression::group(Joiner::And, items)
        }
    })
    .parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    map(separated_list1(char('|'), and_expr), |mut items| {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Expression::group(Joiner::Or, items)
        }
    })
    .parse(input)
}

fn sort_key(input: &str) -> IResult<&str, SortKey> {
    map(ws(pair(opt(char('-')), column)), |(desc, (series, path))| {
        SortKey {
            series: series.into(),
            path,
            descending: desc.is_some(),
        }
    })
    .parse(input)
}

// =============================================================================
// Entry points
// =============================================================================

fn finish<T>(source: &str, result: IResult<&str, T>) -> Result<T> {
    match result {
        Ok((rest, value)) if rest.trim().is_empty() => Ok(value),
        Ok((rest, _)) => Err(TangleError::parse(
            source,
            source.len() - rest.len(),
            "unexpected trailing input",
        )),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(TangleError::parse(
            source,
            source.len() - e.input.len(),
            "invalid expression",
        )),
        Err(nom::Err::Incomplete(_)) => Err(TangleError::parse(
            source,
            source.len(),
            "incomplete expression",
        )),
    }
}

/// Parses a filter such as `$user.age >= 18 & ($user.role = 'admin' | $user.id in [1, 2])`.
pub fn parse_filter(input: &str) -> Result<Expression> {
    if input.trim().is_empty() {
        return Err(TangleError::parse(input, 0, "empty filter"));
    }
    finish(input, or_expr(input))
}

/// Parses a sort list such as `-$post.createdAt, $post.title`.
pub fn parse_sort(input: &str) -> Result<Vec<SortKey>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    finish(input, separated_list1(char(','), sort_key).parse(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_predicate() {
        let expr = parse_filter("$user.age >= 18").unwrap();
        assert_eq!(expr, Expression::predicate("user", "age", Operator::Ge, 18));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_filter("$u.a = 1 | $u.b = 2 & $u.c = 3").unwrap();
        let expected = Expression::or([
            Expression::predicate("u", "a", Operator::Eq, 1),
            Expression::and([
                Expression::predicate("u", "b", Operator::Eq, 2),
                Expression::predicate("u", "c", Operator::Eq, 3),
            ]),
        ]);
        assert_eq!(expr, expected);
    }

    #[test]
    fn parentheses_group() {
        let expr = parse_filter("($u.a = 1 | $u.b = 2) & $u.c != null").unwrap();
        let Expression::Group(group) = &expr else {
            panic!("expected group");
        };
        assert_eq!(group.join, Joiner::And);
        assert!(matches!(&group.expressables[0], Expression::Group(g) if g.join == Joiner::Or));
    }

    #[test]
    fn literals_and_params() {
        let expr = parse_filter(
            "$p.title ~ 'a%' & $p.score < -1.5 & $p.id in [1, 2 ,3] & $p.tag !in [] & $p.owner = :owner & $p.ok <> false & $p.note = \"it's\"",
        )
        .unwrap();
        let values: Vec<&Operand> = expr.predicates().into_iter().map(|p| &p.value).collect();
        assert_eq!(values[0], &Operand::Value(Value::from("a%")));
        assert_eq!(values[1], &Operand::Value(Value::Float(-1.5)));
        assert_eq!(
            values[2],
            &Operand::Value(Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(values[3], &Operand::Value(Value::List(vec![])));
        assert_eq!(values[4], &Operand::Param { param: "owner".into() });
        assert_eq!(values[5], &Operand::Value(Value::Bool(false)));
        assert_eq!(values[6], &Operand::Value(Value::from("it's")));

        let ops: Vec<Operator> = expr.predicates().into_iter().map(|p| p.operation).collect();
        assert_eq!(
            ops,
            [
                Operator::Like,
                Operator::Lt,
                Operator::In,
                Operator::NotIn,
                Operator::Eq,
                Operator::Ne,
                Operator::Eq
            ]
        );
    }

    #[test]
    fn nested_paths() {
        let expr = parse_filter("$user.address.city = 'Oslo'").unwrap();
        assert_eq!(expr.predicates()[0].path, Path::parse("address.city"));
    }

    #[test]
    fn errors() {
        for input in ["", "$u.a", "$u.a = ", "u.a = 1", "$u.a = 1 &", "($u.a = 1", "$u.a = 1 )", "$u.a = bogus"] {
            assert!(
                matches!(parse_filter(input), Err(TangleError::Parse { .. })),
                "{input:?} should fail"
            );
        }
        match parse_filter("$u.a = 1 )") {
            Err(TangleError::Parse { position, .. }) => assert_eq!(position, 9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sort_keys() {
        let keys = parse_sort("-$post.createdAt, $post.title").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].descending);
        assert_eq!(keys[1].path, Path::parse("title"));
        assert!(parse_sort("").unwrap().is_empty());
        assert!(parse_sort("$post").is_err());
    }
}
