//! Path-expression tokenizer and accessor construction using nom

use compact_str::CompactString;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{pair, preceded, terminated},
};

use super::Accessor;
use crate::error::{Result, TangleError};

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Join { optional: bool },
    Mount {
        alias: Option<&'a str>,
        model: &'a str,
        field: Option<&'a str>,
    },
    Include { alias: Option<&'a str>, model: &'a str },
    Reference(&'a str),
    Bind(&'a str),
    Method { name: &'a str, body: &'a str },
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// Dotted field path: `address.city`
fn field_path(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier, many0(preceded(char('.'), identifier)))).parse(input)
}

/// `[alias:]model`
fn aliased_model(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    pair(opt(terminated(identifier, char(':'))), identifier).parse(input)
}

/// Content up to the parenthesis closing an already opened one.
fn balanced(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    for (idx, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Ok((&input[idx..], &input[..idx])),
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn join(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(char('>'), opt(char('?'))), |q| Token::Join {
        optional: q.is_some(),
    })
    .parse(input)
}

fn mount(input: &str) -> IResult<&str, Token<'_>> {
    map(
        preceded(char('$'), pair(aliased_model, opt(preceded(char('.'), field_path)))),
        |((alias, model), field)| Token::Mount {
            alias,
            model,
            field,
        },
    )
    .parse(input)
}

fn include(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(char('#'), aliased_model), |(alias, model)| {
        Token::Include { alias, model }
    })
    .parse(input)
}

fn reference(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(char('.'), field_path), Token::Reference).parse(input)
}

fn bind(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(char('@'), identifier), Token::Bind).parse(input)
}

fn method(input: &str) -> IResult<&str, Token<'_>> {
    let (input, name) = preceded(char('='), identifier).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char('(').parse(input)?;
    let (input, body) = balanced(input)?;
    let (input, _) = char(')').parse(input)?;
    Ok((input, Token::Method { name, body }))
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((join, mount, include, reference, bind, method)).parse(input)
}

/// Splits `input` into tokens paired with their byte offset into `input`.
fn tokenize<'a>(input: &'a str, source: &str, base: usize) -> Result<Vec<(usize, Token<'a>)>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }
        let offset = input.len() - rest.len();
        match token(rest) {
            Ok((next, token)) => {
                tokens.push((offset, token));
                rest = next;
            }
            Err(_) => {
                let found = rest.chars().next().unwrap_or_default();
                return Err(TangleError::parse(
                    source,
                    base + offset,
                    format!("unexpected '{found}'"),
                ));
            }
        }
    }
}

// =============================================================================
// Accessor construction
// =============================================================================

/// Compiles a path expression into its ordered accessor list.
pub fn compile(input: &str) -> Result<Vec<Accessor>> {
    compile_at(input, input, 0)
}

fn compile_at(input: &str, source: &str, base: usize) -> Result<Vec<Accessor>> {
    let tokens = tokenize(input, source, base)?;
    if tokens.is_empty() {
        return Err(TangleError::parse(source, base, "empty path expression"));
    }

    let err = |offset: usize, message: &str| TangleError::parse(source, base + offset, message);

    let mut accessors: Vec<Accessor> = Vec::new();
    let mut expect_segment = true;
    let mut optional = false;
    let mut target: Option<(usize, &str)> = None;

    for (offset, token) in tokens {
        match token {
            Token::Join { optional: outer } => {
                if expect_segment {
                    return Err(err(offset, "expected a segment before '>'"));
                }
                expect_segment = true;
                optional = outer;
            }
            Token::Reference(field) => {
                if !expect_segment {
                    return Err(err(offset, "expected '>' before reference"));
                }
                if accessors.is_empty() {
                    return Err(err(offset, "reference must follow a join"));
                }
                if target.is_some() {
                    return Err(err(offset, "reference must be followed by a model"));
                }
                target = Some((offset, field));
            }
            Token::Bind(name) => {
                let Some(last) = accessors.last_mut().filter(|_| !expect_segment) else {
                    return Err(err(offset, "bind must follow a segment"));
                };
                if last.bind.is_some() {
                    return Err(err(offset, "segment already has a bind"));
                }
                last.bind = Some(name.into());
            }
            Token::Mount {
                alias,
                model,
                field,
            } => {
                if !expect_segment {
                    return Err(err(offset, "expected '>' between segments"));
                }
                let accessor = with_alias(Accessor::access(model, field), alias);
                accessors.push(place(accessor, &mut target, optional, accessors.is_empty()));
                expect_segment = false;
            }
            Token::Include { alias, model } => {
                if !expect_segment {
                    return Err(err(offset, "expected '>' between segments"));
                }
                let accessor = with_alias(Accessor::include(model), alias);
                accessors.push(place(accessor, &mut target, optional, accessors.is_empty()));
                expect_segment = false;
            }
            Token::Method { name, body } => {
                if !expect_segment {
                    return Err(err(offset, "expected '>' between segments"));
                }
                if target.is_some() {
                    return Err(err(offset, "a method cannot follow a reference"));
                }
                let open = input[offset..].find('(').map_or(0, |idx| idx + 1);
                let args = method_args(body, source, base + offset + open)?;
                let accessor = Accessor::method(name, args);
                accessors.push(place(accessor, &mut target, optional, accessors.is_empty()));
                expect_segment = false;
            }
        }
    }

    if let Some((offset, _)) = target {
        return Err(err(offset, "reference must be followed by a model"));
    }
    if expect_segment {
        return Err(err(input.len(), "path ends with '>'"));
    }
    Ok(accessors)
}

/// Splits a method body on top-level commas and compiles every argument.
fn method_args(body: &str, source: &str, base: usize) -> Result<Vec<Vec<Accessor>>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(compile_at(&body[start..idx], source, base + start)?);
                start = idx + 1;
            }
            _ => {}
        }
    }
    args.push(compile_at(&body[start..], source, base + start)?);
    Ok(args)
}

fn with_alias(accessor: Accessor, alias: Option<&str>) -> Accessor {
    match alias {
        Some(alias) => accessor.alias(alias),
        None => accessor,
    }
}

/// Applies the pending reference and join flag to a new segment.
fn place(
    mut accessor: Accessor,
    target: &mut Option<(usize, &str)>,
    optional: bool,
    first: bool,
) -> Accessor {
    accessor.target = target.take().map(|(_, field)| CompactString::from(field));
    accessor.optional = optional && !first;
    accessor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Loader;

    #[test]
    fn forward_chain() {
        let accessors = compile("$post.title > $author:user.email").unwrap();
        assert_eq!(
            accessors,
            vec![
                Accessor::access("post", Some("title")),
                Accessor::access("user", Some("email")).alias("author"),
            ]
        );
        assert!(accessors[1].is_aliased());
    }

    #[test]
    fn incoming_hop_and_include() {
        let accessors = compile("$user>.id$post.title>?#tag").unwrap();
        assert_eq!(accessors[1].target.as_deref(), Some("id"));
        assert_eq!(accessors[1].model, "post");
        assert_eq!(accessors[2].loader, Loader::Include);
        assert!(accessors[2].optional);
        assert!(!accessors[1].optional);
    }

    #[test]
    fn optional_resets_on_plain_join() {
        let accessors = compile("$a>?$b>$c>?$d").unwrap();
        let flags: Vec<bool> = accessors.iter().map(|a| a.optional).collect();
        assert_eq!(flags, [false, true, false, true]);
    }

    #[test]
    fn bind_attaches_to_previous() {
        let accessors = compile("$user.email @contact").unwrap();
        assert_eq!(accessors.len(), 1);
        assert_eq!(accessors[0].bind.as_deref(), Some("contact"));
    }

    #[test]
    fn method_with_nested_arguments() {
        let accessors = compile("=concat( $user.first , $post>$user.last )@name").unwrap();
        let call = accessors[0].method.as_ref().unwrap();
        assert_eq!(call.name, "concat");
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[1].len(), 2);
        assert_eq!(accessors[0].bind.as_deref(), Some("name"));

        let empty = compile("=now()").unwrap();
        assert!(empty[0].method.as_ref().unwrap().args.is_empty());
    }

    #[test]
    fn dotted_field_paths() {
        let accessors = compile("$user.address.city").unwrap();
        assert_eq!(accessors[0].field.as_deref(), Some("address.city"));
    }

    #[test]
    fn errors_carry_position() {
        let cases = [
            ("", 0),
            ("$a>", 3),
            (">$a", 0),
            ("$a $b", 3),
            ("$a>.id", 3),
            (".id$a", 0),
            ("@x", 0),
            ("$a@x@y", 4),
            ("$a>%b", 3),
            ("=f($a>)", 6),
        ];
        for (input, position) in cases {
            match compile(input) {
                Err(TangleError::Parse { position: at, .. }) => {
                    assert_eq!(at, position, "input {input:?}")
                }
                other => panic!("expected parse error for {input:?}, got {other:?}"),
            }
        }
    }
}
