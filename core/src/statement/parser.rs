use std::cmp::Reverse;

use common::grant::{Grantee, GranteeKind};
use common::object::ObjectKind;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_till, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::error::{ErrorKind, VerboseError, VerboseErrorKind, convert_error};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated, tuple};

use super::ast::Statement;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}")]
    Message(String),
}

type IResult<'a, O> = nom::IResult<&'a str, O, VerboseError<&'a str>>;

const READY_MARKER: &str = "-- Ready ...";
const DONE_MARKER: &str = "-- ... Done.";

fn failure<'a, O>(input: &'a str, context: &'static str) -> IResult<'a, O> {
    Err(nom::Err::Error(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(context))],
    }))
}

/// Matches a space-separated keyword phrase, case-insensitively.
fn keywords<'a>(phrase: &'static str) -> impl FnMut(&'a str) -> IResult<'a, ()> {
    move |mut input: &'a str| {
        for word in phrase.split(' ') {
            let (rest, _) = preceded(multispace0, tag_no_case(word))(input)?;
            input = rest;
        }
        Ok((input, ()))
    }
}

fn object_kind(input: &str) -> IResult<ObjectKind> {
    let input = input.trim_start();
    let mut kinds = ObjectKind::ALL;
    kinds.sort_by_key(|kind| Reverse(kind.keyword().len()));
    for kind in kinds {
        if let Ok((rest, ())) = keywords(kind.keyword())(input) {
            return Ok((rest, kind));
        }
    }
    failure(input, "object kind")
}

fn plural_kind(input: &str) -> IResult<ObjectKind> {
    terminated(object_kind, tag_no_case("S"))(input)
}

fn quoted_identifier(input: &str) -> IResult<&str> {
    recognize(delimited(
        char('"'),
        many0(alt((tag("\"\""), take_while1(|c| c != '"')))),
        char('"'),
    ))(input)
}

fn bare_identifier(input: &str) -> IResult<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '$')(input)
}

fn identifier(input: &str) -> IResult<&str> {
    alt((quoted_identifier, bare_identifier))(input)
}

fn object_key(input: &str) -> IResult<String> {
    let key = recognize(pair(identifier, many0(pair(char('.'), identifier))));
    map(preceded(multispace1, key), str::to_string)(input)
}

/// Recognizes a parenthesised group, nested groups included, up to the
/// `)` that closes the first `(`.
pub(crate) fn balanced_group<'a, E>(input: &'a str) -> nom::IResult<&'a str, &'a str, E>
where
    E: nom::error::ParseError<&'a str>,
{
    if !input.starts_with('(') {
        return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Char)));
    }
    let mut depth = 0usize;
    for (index, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = index + 1;
                    return Ok((&input[end..], &input[..end]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Eof)))
}

fn signature(input: &str) -> IResult<String> {
    map(opt(preceded(multispace0, balanced_group)), |sig: Option<&str>| {
        sig.map(str::to_string).unwrap_or_default()
    })(input)
}

fn grantee_kind(input: &str) -> IResult<GranteeKind> {
    let input = input.trim_start();
    for (phrase, kind) in [
        ("DATABASE ROLE", GranteeKind::DatabaseRole),
        ("APPLICATION", GranteeKind::Application),
        ("ROLE", GranteeKind::Role),
        ("USER", GranteeKind::User),
        ("SHARE", GranteeKind::Share),
    ] {
        if let Ok((rest, ())) = keywords(phrase)(input) {
            return Ok((rest, kind));
        }
    }
    failure(input, "grantee kind")
}

fn principal_name(input: &str) -> IResult<&str> {
    preceded(
        multispace1,
        alt((
            quoted_identifier,
            take_while1(|c: char| !c.is_whitespace() && c != ';'),
        )),
    )(input)
}

fn grantee(input: &str) -> IResult<Grantee> {
    map(pair(grantee_kind, principal_name), |(kind, name)| {
        Grantee::new(kind, name)
    })(input)
}

fn role_name(input: &str) -> IResult<String> {
    map(preceded(keywords("TO ROLE"), principal_name), str::to_string)(input)
}

/// The audit note may follow the statement separator.
fn previous_owner(input: &str) -> IResult<Option<String>> {
    let owner = take_till(|c| c == ';' || c == '\n' || c == '\r');
    opt(map(
        preceded(
            tuple((multispace0, opt(char(';')), multispace0, tag("--"))),
            preceded(keywords("instead of"), preceded(multispace0, owner)),
        ),
        |previous: &str| previous.trim().to_string(),
    ))(input)
}

fn show_statement(input: &str) -> IResult<Statement> {
    let show_grants = map(
        preceded(keywords("GRANTS ON"), tuple((object_kind, object_key, signature))),
        |(on, key, signature)| Statement::ShowGrants { on, key, signature },
    );
    let show_future = map(
        preceded(keywords("FUTURE GRANTS IN"), pair(object_kind, object_key)),
        |(container, key)| Statement::ShowFutureGrants { container, key },
    );
    let show_objects = map(terminated(plural_kind, keywords("IN ACCOUNT")), |kind| {
        Statement::ShowObjects { kind }
    });

    preceded(keywords("SHOW"), alt((show_grants, show_future, show_objects)))(input)
}

fn revoke_statement(input: &str) -> IResult<Statement> {
    let revoke_future = map(
        preceded(
            keywords("FUTURE"),
            tuple((
                plural_kind,
                preceded(keywords("IN"), object_kind),
                object_key,
                preceded(keywords("FROM"), grantee),
            )),
        ),
        |(on, container, key, grantee)| Statement::RevokeFuture {
            on: on.keyword().to_string(),
            container,
            key,
            grantee,
        },
    );
    let revoke_current = map(
        tuple((
            object_kind,
            object_key,
            signature,
            preceded(keywords("FROM"), grantee),
        )),
        |(on, key, signature, grantee)| Statement::Revoke {
            on: on.keyword().to_string(),
            key,
            signature,
            grantee,
        },
    );

    preceded(
        keywords("REVOKE ALL PRIVILEGES ON"),
        alt((revoke_future, revoke_current)),
    )(input)
}

fn grant_statement(input: &str) -> IResult<Statement> {
    let ownership = map(
        preceded(
            keywords("OWNERSHIP ON"),
            tuple((
                object_kind,
                object_key,
                signature,
                preceded(keywords("TO"), grantee),
                previous_owner,
            )),
        ),
        |(on, key, signature, grantee, previous)| Statement::GrantOwnership {
            on: on.keyword().to_string(),
            key,
            signature,
            grantee,
            previous,
        },
    );
    let usage = map(
        preceded(
            keywords("USAGE ON"),
            tuple((object_kind, object_key, role_name)),
        ),
        |(container, key, role)| Statement::GrantUsage {
            container,
            key,
            role,
        },
    );
    let all_future = map(
        preceded(
            keywords("ALL PRIVILEGES ON FUTURE"),
            tuple((
                plural_kind,
                preceded(keywords("IN SCHEMA"), object_key),
                role_name,
            )),
        ),
        |(kind, schema, role)| Statement::GrantAllOnFuture { kind, schema, role },
    );
    let all_existing = map(
        preceded(
            keywords("ALL PRIVILEGES ON ALL"),
            tuple((
                plural_kind,
                preceded(keywords("IN SCHEMA"), object_key),
                role_name,
            )),
        ),
        |(kind, schema, role)| Statement::GrantAllOnAll { kind, schema, role },
    );

    preceded(
        keywords("GRANT"),
        alt((ownership, usage, all_future, all_existing)),
    )(input)
}

fn select_current_role(input: &str) -> IResult<Statement> {
    map(keywords("SELECT CURRENT_ROLE()"), |()| Statement::SelectCurrentRole)(input)
}

fn statement(input: &str) -> IResult<Statement> {
    terminated(
        alt((
            show_statement,
            revoke_statement,
            grant_statement,
            select_current_role,
        )),
        tuple((multispace0, opt(char(';')), multispace0)),
    )(input)
}

/// Parses one statement in the grammar the engine produces.
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    match all_consuming(statement)(input) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
            Err(ParseError::Message(convert_error(input, err)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Message("unexpected end of input".into())),
    }
}

/// Parses a persisted statement artifact back into statements.
pub fn parse_artifact(input: &str) -> Result<Vec<Statement>, ParseError> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != READY_MARKER && *line != DONE_MARKER)
        .map(parse_statement)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_routine_grant_lookup() {
        let stmt = parse_statement("SHOW GRANTS ON PROCEDURE D.S.P(FLOAT, VARCHAR)").unwrap();
        assert_eq!(
            stmt,
            Statement::ShowGrants {
                on: ObjectKind::Procedure,
                key: "D.S.P".into(),
                signature: "(FLOAT, VARCHAR)".into(),
            }
        );
    }

    #[test]
    fn prefers_longest_kind_keyword() {
        let stmt = parse_statement("SHOW EXTERNAL TABLES IN ACCOUNT").unwrap();
        assert_eq!(
            stmt,
            Statement::ShowObjects {
                kind: ObjectKind::ExternalTable
            }
        );
    }

    #[test]
    fn parses_quoted_keys_and_database_roles() {
        let stmt =
            parse_statement("REVOKE ALL PRIVILEGES ON TABLE D.\"my schema\".T FROM DATABASE ROLE D.READER;")
                .unwrap();
        match stmt {
            Statement::Revoke { on, key, grantee, .. } => {
                assert_eq!(on, "TABLE");
                assert_eq!(key, "D.\"my schema\".T");
                assert_eq!(grantee, Grantee::new(GranteeKind::DatabaseRole, "D.READER"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn keeps_ownership_audit_note() {
        let stmt = parse_statement("GRANT OWNERSHIP ON VIEW D.S.V TO ROLE C -- instead of B").unwrap();
        match stmt {
            Statement::GrantOwnership { previous, grantee, .. } => {
                assert_eq!(previous.as_deref(), Some("B"));
                assert_eq!(grantee, Grantee::role("C"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn audit_note_may_follow_separator() {
        let stmt = parse_statement("GRANT OWNERSHIP ON TABLE D.S.T TO ROLE C; -- instead of LOADER").unwrap();
        match stmt {
            Statement::GrantOwnership { previous, grantee, .. } => {
                assert_eq!(previous.as_deref(), Some("LOADER"));
                assert_eq!(grantee, Grantee::role("C"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn routine_signature_keeps_nested_groups() {
        let stmt = parse_statement("REVOKE ALL PRIVILEGES ON FUNCTION D.S.F(VECTOR(FLOAT, 256), NUMBER(38,0)) FROM ROLE A")
            .unwrap();
        match stmt {
            Statement::Revoke { key, signature, .. } => {
                assert_eq!(key, "D.S.F");
                assert_eq!(signature, "(VECTOR(FLOAT, 256), NUMBER(38,0))");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn balanced_group_requires_closing_paren() {
        let parsed: nom::IResult<&str, &str> = balanced_group("(A(B)C) rest");
        assert_eq!(parsed, Ok((" rest", "(A(B)C)")));
        assert!(balanced_group::<nom::error::Error<&str>>("(A(B)").is_err());
        assert!(balanced_group::<nom::error::Error<&str>>("A(B)").is_err());
    }

    #[test]
    fn rejects_foreign_statements() {
        assert!(parse_statement("DROP TABLE D.S.T").is_err());
        assert!(parse_statement("GRANT SELECT ON TABLE D.S.T TO ROLE A").is_err());
    }

    #[test]
    fn artifact_skips_markers() {
        let artifact = "-- Ready ...\nGRANT USAGE ON SCHEMA D.S TO ROLE C;\nGRANT ALL PRIVILEGES ON FUTURE TABLES IN SCHEMA D.S TO ROLE C\n-- ... Done.";
        let statements = parse_artifact(artifact).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1],
            Statement::GrantAllOnFuture {
                kind: ObjectKind::Table,
                schema: "D.S".into(),
                role: "C".into(),
            }
        );
    }
}
