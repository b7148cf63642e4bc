use nom::IResult;
use nom::bytes::complete::is_not;
use nom::sequence::preceded;

use crate::statement::parser::balanced_group;

fn first_group(input: &str) -> IResult<&str, &str> {
    preceded(is_not("("), balanced_group)(input)
}

/// Returns the first balanced argument list that follows a routine name,
/// parentheses included, exactly as the catalog spelled it.
///
/// `MY_PROC(FLOAT, VARCHAR) RETURN VARCHAR` yields `(FLOAT, VARCHAR)`.
/// Text without a name followed by a closed group yields an empty string.
pub fn extract_signature(raw: &str) -> String {
    match first_group(raw) {
        Ok((_, group)) => group.to_string(),
        Err(_) => String::new(),
    }
}
