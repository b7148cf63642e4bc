pub mod ast;
pub mod parser;

pub use ast::{Sql, Statement};
pub use parser::{ParseError, parse_artifact, parse_statement};
